//! Ordering of mixed values.

use super::Mixed;
use rust_decimal::Decimal;
use std::cmp::Ordering;

impl Mixed {
    /// Total order over all values.
    ///
    /// Kinds rank as null < bool < numeric < string < binary < timestamp <
    /// objectId < uuid < link < list < dictionary. Int, Float, Double and
    /// Decimal compare with each other by value; NaN sorts below every other
    /// number.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        let (a, b) = (self.rank(), other.rank());
        if a != b {
            return a.cmp(&b);
        }
        match (self, other) {
            (Mixed::Bool(a), Mixed::Bool(b)) => a.cmp(b),
            (Mixed::Int(a), Mixed::Int(b)) => a.cmp(b),
            (Mixed::Decimal(a), Mixed::Decimal(b)) => a.cmp(b),
            (Mixed::Decimal(a), Mixed::Int(b)) => a.cmp(&Decimal::from(*b)),
            (Mixed::Int(a), Mixed::Decimal(b)) => Decimal::from(*a).cmp(b),
            (Mixed::String(a), Mixed::String(b)) => a.cmp(b),
            (Mixed::Binary(a), Mixed::Binary(b)) => a.cmp(b),
            (Mixed::Timestamp(a), Mixed::Timestamp(b)) => a.cmp(b),
            (Mixed::ObjectId(a), Mixed::ObjectId(b)) => a.cmp(b),
            (Mixed::Uuid(a), Mixed::Uuid(b)) => a.cmp(b),
            (Mixed::Link(a), Mixed::Link(b)) => a.cmp(b),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(x), Some(y)) => cmp_numeric(x, y),
                _ => Ordering::Equal,
            },
        }
    }

    /// Same kind and same value. NaN is identical to NaN.
    ///
    /// Unlike [`Mixed::total_cmp`], `Int(1)` is not identical to `Double(1.0)`.
    #[must_use]
    pub fn is_identical(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
            && self.total_cmp(other) == Ordering::Equal
    }

    fn rank(&self) -> u8 {
        match self {
            Mixed::Null => 0,
            Mixed::Bool(_) => 1,
            Mixed::Int(_) | Mixed::Float(_) | Mixed::Double(_) | Mixed::Decimal(_) => 2,
            Mixed::String(_) => 3,
            Mixed::Binary(_) => 4,
            Mixed::Timestamp(_) => 5,
            Mixed::ObjectId(_) => 6,
            Mixed::Uuid(_) => 7,
            Mixed::Link(_) => 8,
            Mixed::List => 9,
            Mixed::Dictionary => 10,
        }
    }
}

fn cmp_numeric(x: f64, y: f64) -> Ordering {
    match (x.is_nan(), y.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
    }
}
