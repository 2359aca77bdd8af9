//! Stress runs for nestdb.
//!
//! One writer appends to a list while reader threads repeatedly advance and
//! check that every snapshot they see is internally consistent.

use nestdb_core::{ColumnSpec, CoreResult, DataType, Database, Mixed, ObjLink, TableSpec};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Result of a stress run.
#[derive(Debug, Clone)]
pub struct StressTestResult {
    /// Commits made by the writer.
    pub commits: usize,
    /// Snapshots checked by readers.
    pub snapshots: usize,
    /// Snapshots that failed a check.
    pub failures: usize,
    /// Total duration.
    pub duration: Duration,
}

impl StressTestResult {
    /// Prints a summary of the run.
    pub fn print_summary(&self, name: &str) {
        println!("\n=== {} ===", name);
        println!("Commits: {}", self.commits);
        println!("Snapshots checked: {}", self.snapshots);
        println!("Failures: {}", self.failures);
        println!("Duration: {:?}", self.duration);
    }
}

/// Configuration for stress runs.
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Number of writer commits.
    pub commits: usize,
    /// Elements appended per commit.
    pub batch: usize,
    /// Number of reader threads.
    pub readers: usize,
}

impl Default for StressConfig {
    fn default() -> Self {
        Self {
            commits: 50,
            batch: 10,
            readers: 4,
        }
    }
}

/// Runs one writer against `config.readers` readers.
///
/// The writer appends `0, 1, 2, ...` to one list, `batch` values per commit.
/// A reader's snapshot passes when the list holds exactly that prefix in a
/// whole number of batches and the invariant checker accepts it.
pub fn run_reader_writer(db: &Database, config: &StressConfig) -> CoreResult<StressTestResult> {
    let txn = db.begin_write()?;
    let table = txn.add_table(TableSpec::new("Log").column(ColumnSpec::list("entries", DataType::Int)))?;
    let owner = txn.create_object(table)?.link();
    let col = txn.col_key(table, "entries")?;
    txn.commit()?;

    let start = Instant::now();
    let done = Arc::new(AtomicBool::new(false));
    let snapshots = Arc::new(AtomicUsize::new(0));
    let failures = Arc::new(AtomicUsize::new(0));
    let batch = config.batch.max(1);

    thread::scope(|scope| -> CoreResult<()> {
        for _ in 0..config.readers {
            let done = Arc::clone(&done);
            let snapshots = Arc::clone(&snapshots);
            let failures = Arc::clone(&failures);
            scope.spawn(move || {
                let reader = match db.begin_read() {
                    Ok(reader) => reader,
                    Err(err) => {
                        warn!(error = %err, "reader failed to start");
                        failures.fetch_add(1, Ordering::SeqCst);
                        return;
                    }
                };
                while !done.load(Ordering::SeqCst) {
                    snapshots.fetch_add(1, Ordering::SeqCst);
                    if !snapshot_is_consistent(&reader, owner, col, batch) {
                        warn!(version = reader.version(), "inconsistent snapshot");
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                    if let Err(err) = reader.advance_read() {
                        warn!(error = %err, "reader failed to advance");
                        failures.fetch_add(1, Ordering::SeqCst);
                    }
                }
            });
        }

        let result = (|| -> CoreResult<()> {
            let mut next = 0i64;
            for _ in 0..config.commits {
                let txn = db.begin_write()?;
                let list = txn.get_object(owner)?.get_list(col)?;
                for _ in 0..batch {
                    list.add(next)?;
                    next += 1;
                }
                let version = txn.commit()?;
                debug!(version, next, "writer committed batch");
            }
            Ok(())
        })();
        done.store(true, Ordering::SeqCst);
        result
    })?;

    let result = StressTestResult {
        commits: config.commits,
        snapshots: snapshots.load(Ordering::SeqCst),
        failures: failures.load(Ordering::SeqCst),
        duration: start.elapsed(),
    };
    info!(
        commits = result.commits,
        snapshots = result.snapshots,
        failures = result.failures,
        "stress run finished"
    );
    Ok(result)
}

fn snapshot_is_consistent(
    reader: &nestdb_core::Transaction,
    owner: ObjLink,
    col: nestdb_core::ColKey,
    batch: usize,
) -> bool {
    let Ok(values) = reader
        .get_object(owner)
        .and_then(|obj| obj.get_list(col))
        .and_then(|list| list.to_vec())
    else {
        return false;
    };
    let prefix = values
        .iter()
        .enumerate()
        .all(|(ndx, v)| *v == Mixed::Int(ndx as i64));
    prefix && values.len() % batch == 0 && reader.verify().is_ok()
}
