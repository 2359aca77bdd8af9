//! Deferred removal of link targets.

use super::{col_key, LinkRewrite};
use crate::error::CoreResult;
use crate::transaction::TxnState;
use crate::types::{ColKey, ObjLink};

#[derive(Debug, Clone, Copy)]
struct Release {
    target: ObjLink,
    origin: ObjLink,
    col: ColKey,
}

/// Accumulates released links and objects to delete.
///
/// Every released link counts as one invocation. Releasing the only owner
/// link of an embedded object queues the object for deletion.
#[derive(Debug, Default)]
pub struct CascadeState {
    released: Vec<Release>,
    doomed: Vec<ObjLink>,
    invocations: u64,
}

impl CascadeState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `origin.col` no longer links to `target`.
    pub fn release(&mut self, target: ObjLink, origin: ObjLink, col: ColKey) {
        self.invocations += 1;
        self.released.push(Release {
            target,
            origin,
            col,
        });
    }

    /// Queues an object for deletion.
    pub fn enqueue(&mut self, obj: ObjLink) {
        if !self.doomed.contains(&obj) {
            self.doomed.push(obj);
        }
    }

    /// Number of released links so far.
    #[must_use]
    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    /// Returns true when nothing is left to process.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.released.is_empty() && self.doomed.is_empty()
    }
}

impl TxnState {
    /// Drains `cascade`: drops backlinks of released links, then deletes
    /// queued objects, until both queues are empty.
    pub(crate) fn remove_recursive(&mut self, cascade: &mut CascadeState) -> CoreResult<()> {
        loop {
            if let Some(release) = cascade.released.pop() {
                self.remove_backlink(release.target, release.origin, release.col, cascade)?;
            } else if let Some(obj) = cascade.doomed.pop() {
                self.delete_row(obj, cascade)?;
            } else {
                break;
            }
        }
        self.cascade_invocations += std::mem::take(&mut cascade.invocations);
        Ok(())
    }

    /// Deletes a live row: releases its outgoing links and erases or nulls
    /// every incoming link.
    fn delete_row(&mut self, obj: ObjLink, cascade: &mut CascadeState) -> CoreResult<()> {
        let Some(row) = self.cluster_mut(obj.table)?.objects.remove(&obj.key) else {
            return Ok(());
        };
        for (ndx, element) in row.values.iter().enumerate() {
            self.release(element, obj, col_key(ndx), cascade)?;
        }
        for backlink in row.backlinks.iter().filter(|b| b.origin != obj) {
            self.rewrite_incoming(backlink.origin, backlink.col, obj, LinkRewrite::Nullify)?;
        }
        self.bump_both();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ObjKey, TableKey};

    fn link(key: i64) -> ObjLink {
        ObjLink::new(TableKey::new(0), ObjKey::new(key))
    }

    #[test]
    fn every_release_counts() {
        let mut cascade = CascadeState::new();
        cascade.release(link(1), link(0), ColKey::new(0));
        cascade.release(link(1), link(0), ColKey::new(0));
        assert_eq!(cascade.invocations(), 2);
        assert!(!cascade.is_empty());
    }

    #[test]
    fn objects_are_queued_once() {
        let mut cascade = CascadeState::new();
        cascade.enqueue(link(4));
        cascade.enqueue(link(4));
        assert_eq!(cascade.doomed.len(), 1);
    }
}
