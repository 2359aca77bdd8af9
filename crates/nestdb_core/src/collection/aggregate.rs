//! Aggregates, sorting and de-duplication over collection values.
//!
//! Nulls, unresolved links and nested collection markers never take part.
//! Sorting is stable: equal values keep their physical order.

use crate::value::{DataType, Mixed};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::cmp::Ordering;

fn candidates(values: &[Mixed]) -> impl Iterator<Item = &Mixed> {
    values
        .iter()
        .filter(|v| !v.is_null() && !v.is_unresolved_link() && v.collection_type().is_none())
}

const fn orderable(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::Int
            | DataType::Float
            | DataType::Double
            | DataType::Decimal
            | DataType::Timestamp
            | DataType::Mixed
    )
}

const fn summable(data_type: DataType) -> bool {
    matches!(
        data_type,
        DataType::Int | DataType::Float | DataType::Double | DataType::Decimal | DataType::Mixed
    )
}

fn has_decimal(data_type: DataType, values: &[Mixed]) -> bool {
    data_type == DataType::Decimal || candidates(values).any(|v| matches!(v, Mixed::Decimal(_)))
}

/// Exact decimal sum of the numeric values and how many there were.
/// `None` on overflow or for a float without a decimal form.
fn decimal_total(values: &[Mixed]) -> Option<(Decimal, u64)> {
    let mut total = Decimal::ZERO;
    let mut count = 0u64;
    for value in candidates(values) {
        let term = match value {
            Mixed::Int(n) => Decimal::from(*n),
            Mixed::Float(f) => Decimal::from_f32(*f)?,
            Mixed::Double(d) => Decimal::from_f64(*d)?,
            Mixed::Decimal(d) => *d,
            _ => continue,
        };
        total = total.checked_add(term)?;
        count += 1;
    }
    Some((total, count))
}

/// Smallest value, or `None` when there is none or the kind has no order.
pub(crate) fn min(data_type: DataType, values: &[Mixed]) -> Option<Mixed> {
    if !orderable(data_type) {
        return None;
    }
    candidates(values)
        .min_by(|a, b| a.total_cmp(b))
        .cloned()
}

/// Largest value, or `None` when there is none or the kind has no order.
pub(crate) fn max(data_type: DataType, values: &[Mixed]) -> Option<Mixed> {
    if !orderable(data_type) {
        return None;
    }
    // max_by returns the last of equal elements; keep the first.
    candidates(values).fold(None, |best: Option<&Mixed>, v| match best {
        Some(b) if b.total_cmp(v) != Ordering::Less => Some(b),
        _ => Some(v),
    })
    .cloned()
}

/// Sum of the numeric values. An empty sum is zero; integer sums wrap.
///
/// Decimals make the result a `Decimal`, otherwise floats make it a `Double`.
pub(crate) fn sum(data_type: DataType, values: &[Mixed]) -> Option<Mixed> {
    if !summable(data_type) {
        return None;
    }
    if has_decimal(data_type, values) {
        return decimal_total(values).map(|(total, _)| Mixed::Decimal(total));
    }
    let mut int_sum: i64 = 0;
    let mut float_sum = 0.0_f64;
    let mut saw_float = matches!(data_type, DataType::Float | DataType::Double);
    for value in candidates(values) {
        match value {
            Mixed::Int(n) => int_sum = int_sum.wrapping_add(*n),
            Mixed::Float(f) => {
                float_sum += f64::from(*f);
                saw_float = true;
            }
            Mixed::Double(d) => {
                float_sum += d;
                saw_float = true;
            }
            _ => {}
        }
    }
    if saw_float {
        #[allow(clippy::cast_precision_loss)]
        let total = float_sum + int_sum as f64;
        Some(Mixed::Double(total))
    } else {
        Some(Mixed::Int(int_sum))
    }
}

/// Mean of the numeric values; `None` when there are none.
///
/// The mean is a `Decimal` when decimals take part, otherwise a `Double`.
pub(crate) fn avg(data_type: DataType, values: &[Mixed]) -> Option<Mixed> {
    if !summable(data_type) {
        return None;
    }
    if has_decimal(data_type, values) {
        let (total, count) = decimal_total(values)?;
        if count == 0 {
            return None;
        }
        return total.checked_div(Decimal::from(count)).map(Mixed::Decimal);
    }
    let numbers: Vec<f64> = candidates(values).filter_map(Mixed::as_f64).collect();
    if numbers.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let count = numbers.len() as f64;
    Some(Mixed::Double(numbers.iter().sum::<f64>() / count))
}

/// Permutation that orders `values`.
pub(crate) fn sort_indices(values: &[Mixed], ascending: bool) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..values.len()).collect();
    indices.sort_by(|&a, &b| {
        let ord = values[a].total_cmp(&values[b]);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    indices
}

/// Indices of the first occurrence of each distinct value.
///
/// With `order` the survivors are sorted, otherwise they stay in physical order.
pub(crate) fn distinct_indices(values: &[Mixed], order: Option<bool>) -> Vec<usize> {
    // Stable, so each run of equal values starts with its first occurrence.
    let mut kept: Vec<usize> = Vec::with_capacity(values.len());
    for ndx in sort_indices(values, true) {
        match kept.last() {
            Some(&last) if values[last].total_cmp(&values[ndx]) == Ordering::Equal => {}
            _ => kept.push(ndx),
        }
    }
    match order {
        None => kept.sort_unstable(),
        Some(true) => {}
        Some(false) => kept.reverse(),
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<Mixed> {
        values.iter().map(|v| Mixed::Int(*v)).collect()
    }

    #[test]
    fn empty_collections_have_no_min_but_zero_sum() {
        assert_eq!(min(DataType::Int, &[]), None);
        assert_eq!(max(DataType::Int, &[Mixed::Null]), None);
        assert_eq!(avg(DataType::Int, &[]), None);
        assert_eq!(sum(DataType::Int, &[]), Some(Mixed::Int(0)));
        assert_eq!(sum(DataType::Double, &[]), Some(Mixed::Double(0.0)));
    }

    #[test]
    fn unsupported_kinds_report_no_value() {
        let strings = vec![Mixed::from("a")];
        assert_eq!(min(DataType::String, &strings), None);
        assert_eq!(sum(DataType::String, &strings), None);
        assert_eq!(avg(DataType::Bool, &[Mixed::Bool(true)]), None);
    }

    #[test]
    fn nulls_are_skipped() {
        let values = vec![Mixed::Int(4), Mixed::Null, Mixed::Int(-2), Mixed::Int(7)];
        assert_eq!(min(DataType::Int, &values), Some(Mixed::Int(-2)));
        assert_eq!(max(DataType::Int, &values), Some(Mixed::Int(7)));
        assert_eq!(sum(DataType::Int, &values), Some(Mixed::Int(9)));
        assert_eq!(avg(DataType::Int, &values), Some(Mixed::Double(3.0)));
    }

    #[test]
    fn integer_sums_wrap() {
        let values = ints(&[i64::MAX, 1]);
        assert_eq!(sum(DataType::Int, &values), Some(Mixed::Int(i64::MIN)));
    }

    #[test]
    fn mixed_sums_widen_to_double() {
        let values = vec![Mixed::Int(1), Mixed::Double(0.5), Mixed::from("x")];
        assert_eq!(sum(DataType::Mixed, &values), Some(Mixed::Double(1.5)));
        assert_eq!(min(DataType::Mixed, &values), Some(Mixed::Double(0.5)));
    }

    #[test]
    fn decimal_aggregates_stay_exact() {
        let tenth = Mixed::Decimal(Decimal::new(1, 1));
        let fifth = Mixed::Decimal(Decimal::new(2, 1));
        let values = vec![tenth.clone(), Mixed::Null, fifth.clone()];
        assert_eq!(sum(DataType::Decimal, &values), Some(Mixed::Decimal(Decimal::new(3, 1))));
        assert_eq!(avg(DataType::Decimal, &values), Some(Mixed::Decimal(Decimal::new(15, 2))));
        assert_eq!(min(DataType::Decimal, &values), Some(tenth));
        assert_eq!(sum(DataType::Decimal, &[]), Some(Mixed::Decimal(Decimal::ZERO)));
        assert_eq!(avg(DataType::Decimal, &[]), None);

        let mixed = vec![Mixed::Int(2), fifth];
        assert_eq!(sum(DataType::Mixed, &mixed), Some(Mixed::Decimal(Decimal::new(22, 1))));
    }

    #[test]
    fn decimal_overflow_has_no_sum() {
        let values = vec![Mixed::Decimal(Decimal::MAX), Mixed::Decimal(Decimal::MAX)];
        assert_eq!(sum(DataType::Decimal, &values), None);
    }

    #[test]
    fn sort_is_stable() {
        let values = vec![Mixed::Int(2), Mixed::Double(1.0), Mixed::Int(1), Mixed::Int(0)];
        assert_eq!(sort_indices(&values, true), vec![3, 1, 2, 0]);
        assert_eq!(sort_indices(&values, false), vec![0, 1, 2, 3]);
    }

    #[test]
    fn distinct_keeps_first_occurrence() {
        let values = ints(&[3, 1, 3, 2, 1]);
        assert_eq!(distinct_indices(&values, None), vec![0, 1, 3]);
        assert_eq!(distinct_indices(&values, Some(true)), vec![1, 3, 0]);
        assert_eq!(distinct_indices(&values, Some(false)), vec![0, 3, 1]);
    }

    #[test]
    fn distinct_treats_equal_numbers_of_any_kind_as_one() {
        let values = vec![Mixed::Double(2.0), Mixed::Int(1), Mixed::Int(2), Mixed::Float(1.0)];
        assert_eq!(distinct_indices(&values, None), vec![0, 1]);
        assert!(distinct_indices(&[], None).is_empty());
    }
}
