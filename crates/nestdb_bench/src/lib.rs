//! Benchmark utilities.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use nestdb_core::{
    ColumnSpec, CoreResult, DataType, Database, Mixed, Obj, TableKey, TableSpec, Transaction,
};
use rand::distributions::Alphanumeric;
use rand::Rng;

/// A write transaction holding one object with a list, a mixed list, a
/// dictionary and a link list.
pub struct BenchDoc {
    /// Open write transaction.
    pub txn: Transaction,
    /// Link target table.
    pub target: TableKey,
    /// The object.
    pub doc: Obj,
}

/// Opens an in-memory database and creates the benchmark schema.
pub fn bench_doc(db: &Database) -> CoreResult<BenchDoc> {
    let txn = db.begin_write()?;
    let target = txn.add_table(TableSpec::new("Target").column(ColumnSpec::new("n", DataType::Int)))?;
    let table = txn.add_table(
        TableSpec::new("Doc")
            .column(ColumnSpec::list("ints", DataType::Int))
            .column(ColumnSpec::list("items", DataType::Mixed))
            .column(ColumnSpec::dictionary("props", DataType::Mixed))
            .column(ColumnSpec::link_list("links", target)),
    )?;
    let doc = txn.create_object(table)?;
    Ok(BenchDoc { txn, target, doc })
}

/// Random scalar values.
pub fn random_values(count: usize) -> Vec<Mixed> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| match rng.gen_range(0..3) {
            0 => Mixed::Int(rng.gen()),
            1 => Mixed::Double(rng.gen()),
            _ => Mixed::String(random_key(12)),
        })
        .collect()
}

/// A random alphanumeric key.
pub fn random_key(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Random insert positions for a list growing from empty.
pub fn random_positions(count: usize) -> Vec<usize> {
    let mut rng = rand::thread_rng();
    (0..count).map(|size| rng.gen_range(0..=size)).collect()
}
