//! Backlink bookkeeping and rewriting of incoming links.

use super::{CascadeState, LinkRewrite};
use crate::alloc::Element;
use crate::bptree;
use crate::collection::layout::{self, Layout};
use crate::error::{CoreError, CoreResult};
use crate::table::Backlink;
use crate::transaction::TxnState;
use crate::types::{ColKey, ObjLink, Ref};
use crate::value::Mixed;

impl TxnState {
    /// Checks that `link` may be stored.
    ///
    /// Unresolved links and links to embedded objects (unless the caller just
    /// created the object) are rejected.
    pub(crate) fn check_link_target(&self, link: ObjLink, allow_embedded: bool) -> CoreResult<()> {
        if link.is_unresolved() {
            return Err(CoreError::illegal_operation(format!(
                "cannot store unresolved link {link}"
            )));
        }
        if !self.is_live(link)? {
            return Err(CoreError::ObjectNotFound { link });
        }
        if !allow_embedded && self.schema.table(link.table)?.embedded {
            return Err(CoreError::illegal_operation(format!(
                "cannot link to {link}: embedded objects are already managed"
            )));
        }
        Ok(())
    }

    /// Records that `origin.col` links to `target`.
    pub(crate) fn add_backlink(&mut self, target: ObjLink, origin: ObjLink, col: ColKey) -> CoreResult<()> {
        let row = self
            .cluster_mut(target.table)?
            .row_mut(target.key)
            .ok_or(CoreError::ObjectNotFound { link: target })?;
        row.backlinks.push(Backlink { origin, col });
        Ok(())
    }

    /// Adds the backlink for `value` if it is a link.
    pub(crate) fn link_value(&mut self, value: &Mixed, origin: ObjLink, col: ColKey) -> CoreResult<()> {
        if let Mixed::Link(target) = value {
            self.add_backlink(*target, origin, col)?;
        }
        Ok(())
    }

    /// Releases every link stored in `element`, nested collections included.
    pub(crate) fn release(
        &mut self,
        element: &Element,
        origin: ObjLink,
        col: ColKey,
        cascade: &mut CascadeState,
    ) -> CoreResult<()> {
        let mut links = Vec::new();
        self.collect_links(element, &mut links)?;
        for target in links {
            cascade.release(target, origin, col);
        }
        Ok(())
    }

    fn collect_links(&self, element: &Element, out: &mut Vec<ObjLink>) -> CoreResult<()> {
        match element {
            Element::Value(Mixed::Link(link)) => out.push(*link),
            Element::Value(_) => {}
            Element::Nested { top, .. } if top.is_null() => {}
            Element::Nested { kind, top, .. } => {
                let layout = Layout::detect(&self.store, *kind, *top)?;
                let values = layout::values_tree(&self.store, layout, *top)?;
                let mut nested = Vec::new();
                bptree::for_each(&self.store, values, &mut |_, e| {
                    nested.push(e.clone());
                    Ok(true)
                })?;
                for e in &nested {
                    self.collect_links(e, out)?;
                }
            }
        }
        Ok(())
    }

    /// Drops one backlink of `target`.
    ///
    /// A tombstone left without backlinks is purged; an embedded object left
    /// without its owner is queued for deletion.
    pub(crate) fn remove_backlink(
        &mut self,
        target: ObjLink,
        origin: ObjLink,
        col: ColKey,
        cascade: &mut CascadeState,
    ) -> CoreResult<()> {
        if target.table.index() >= self.schema.len() {
            return Ok(());
        }
        let embedded = self.schema.table(target.table)?.embedded;
        let cluster = self.cluster_mut(target.table)?;
        if target.is_unresolved() {
            let key = target.key.resolved();
            if let Some(row) = cluster.tombstones.get_mut(&key) {
                row.remove_backlink(origin, col);
                if row.backlinks.is_empty() {
                    cluster.tombstones.remove(&key);
                }
            }
        } else if let Some(row) = cluster.objects.get_mut(&target.key) {
            row.remove_backlink(origin, col);
            if embedded && row.backlinks.is_empty() {
                cascade.enqueue(target);
            }
        }
        Ok(())
    }

    /// Rewrites one link from `origin.col` to `target`.
    pub(crate) fn rewrite_incoming(
        &mut self,
        origin: ObjLink,
        col: ColKey,
        target: ObjLink,
        action: LinkRewrite,
    ) -> CoreResult<()> {
        let Some(slot) = self.slot(origin, col)? else {
            return Ok(());
        };
        match slot {
            Element::Value(Mixed::Link(link)) if link == target => {
                let replacement = match action {
                    LinkRewrite::Nullify => Mixed::Null,
                    LinkRewrite::Unresolve => Mixed::Link(unresolved(target)),
                };
                self.set_slot(origin, col, Element::Value(replacement))?;
            }
            Element::Nested { kind, top, key } if !top.is_null() => {
                let layout = Layout::detect(&self.store, kind, top)?;
                if let Some(new_top) = self.rewrite_in_collection(layout, top, target, action)? {
                    self.set_slot(origin, col, Element::Nested { kind, top: new_top, key })?;
                }
            }
            _ => {}
        }
        self.bump_both();
        Ok(())
    }

    /// Rewrites the first link to `target` found in the collection at `top`.
    ///
    /// Returns the new top if something changed.
    fn rewrite_in_collection(
        &mut self,
        layout: Layout,
        top: Ref,
        target: ObjLink,
        action: LinkRewrite,
    ) -> CoreResult<Option<Ref>> {
        let values = layout::values_tree(&self.store, layout, top)?;
        let is_target = |e: &Element| matches!(e, Element::Value(Mixed::Link(l)) if *l == target);

        if let Some(ndx) = bptree::find_first(&self.store, values, &mut |e| is_target(e))? {
            let new_values = match (action, layout) {
                (LinkRewrite::Unresolve, _) => bptree::set(
                    &mut self.store,
                    values,
                    ndx,
                    Element::Value(Mixed::Link(unresolved(target))),
                )?,
                (LinkRewrite::Nullify, Layout::Dictionary) => {
                    bptree::set(&mut self.store, values, ndx, Element::NULL)?
                }
                (LinkRewrite::Nullify, Layout::TypedList | Layout::MixedList) => {
                    bptree::erase(&mut self.store, values, ndx)?.0
                }
            };
            return layout::replace_values(&mut self.store, layout, top, new_values).map(Some);
        }

        let mut nested = Vec::new();
        bptree::for_each(&self.store, values, &mut |ndx, e| {
            if let Element::Nested { kind, top, key } = e {
                if !top.is_null() {
                    nested.push((ndx, *kind, *top, *key));
                }
            }
            Ok(true)
        })?;
        for (ndx, kind, child, key) in nested {
            let child_layout = Layout::detect(&self.store, kind, child)?;
            if let Some(new_child) = self.rewrite_in_collection(child_layout, child, target, action)? {
                let values = layout::values_tree(&self.store, layout, top)?;
                let new_values = bptree::set(
                    &mut self.store,
                    values,
                    ndx,
                    Element::Nested {
                        kind,
                        top: new_child,
                        key,
                    },
                )?;
                return layout::replace_values(&mut self.store, layout, top, new_values).map(Some);
            }
        }
        Ok(None)
    }
}

fn unresolved(target: ObjLink) -> ObjLink {
    ObjLink::new(target.table, target.key.get_unresolved())
}
