//! Property tests over the collection accessors.

use nestdb_core::{Config, JsonOutputMode, Mixed, ObjKey};
use nestdb_testkit::prelude::*;
use proptest::prelude::*;

fn int_op_strategy() -> impl Strategy<Value = ListOp> {
    list_op_strategy(int_strategy().prop_map(Mixed::Int))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn mixed_list_matches_vector_model(ops in list_ops_strategy(40)) {
        let f = DocFixture::memory();
        let items = f.items();
        let mut model: Vec<Mixed> = Vec::new();
        for op in &ops {
            let Some(op) = op.resolve(model.len()) else { continue };
            match &op {
                ResolvedListOp::Insert(ndx, v) => items.insert_any(*ndx, v.clone()).unwrap(),
                ResolvedListOp::Set(ndx, v) => {
                    items.set_any(*ndx, v.clone()).unwrap();
                }
                ResolvedListOp::Remove(ndx) => {
                    items.remove(*ndx).unwrap();
                }
                ResolvedListOp::Move(from, to) => items.move_item(*from, *to).unwrap(),
                ResolvedListOp::Swap(a, b) => items.swap(*a, *b).unwrap(),
                ResolvedListOp::Clear => items.clear().unwrap(),
            }
            op.apply_to(&mut model, Mixed::clone);
        }
        prop_assert_eq!(items.to_vec().unwrap(), model.clone());

        let mut replica = ListReplayer::new(items.get_path().unwrap());
        replica.apply_all(f.log.lock().pending());
        prop_assert_eq!(replica.values, model);
        f.txn.verify().unwrap();
    }

    #[test]
    fn two_element_leaves_match_vector_model(ops in list_ops_strategy(60)) {
        let f = DocFixture::with_config(Config::default().max_leaf_size(2));
        let items = f.items();
        let ints = f.ints();
        let mut model: Vec<Mixed> = Vec::new();
        let mut int_model: Vec<i64> = Vec::new();
        for op in &ops {
            if let Some(op) = op.resolve(model.len()) {
                match &op {
                    ResolvedListOp::Insert(ndx, v) => items.insert_any(*ndx, v.clone()).unwrap(),
                    ResolvedListOp::Set(ndx, v) => {
                        items.set_any(*ndx, v.clone()).unwrap();
                    }
                    ResolvedListOp::Remove(ndx) => {
                        items.remove(*ndx).unwrap();
                    }
                    ResolvedListOp::Move(from, to) => items.move_item(*from, *to).unwrap(),
                    ResolvedListOp::Swap(a, b) => items.swap(*a, *b).unwrap(),
                    ResolvedListOp::Clear => items.clear().unwrap(),
                }
                op.apply_to(&mut model, Mixed::clone);
            }
            if let Some(op) = op.resolve(int_model.len()) {
                let int = |v: &Mixed| v.as_int().unwrap_or_default();
                match &op {
                    ResolvedListOp::Insert(ndx, v) => ints.insert_any(*ndx, Mixed::Int(int(v))).unwrap(),
                    ResolvedListOp::Set(ndx, v) => {
                        ints.set_any(*ndx, Mixed::Int(int(v))).unwrap();
                    }
                    ResolvedListOp::Remove(ndx) => {
                        ints.remove(*ndx).unwrap();
                    }
                    ResolvedListOp::Move(from, to) => ints.move_item(*from, *to).unwrap(),
                    ResolvedListOp::Swap(a, b) => ints.swap(*a, *b).unwrap(),
                    ResolvedListOp::Clear => ints.clear().unwrap(),
                }
                op.apply_to(&mut int_model, int);
            }
        }
        prop_assert_eq!(items.to_vec().unwrap(), model.clone());
        for (ndx, expected) in model.iter().enumerate() {
            prop_assert_eq!(&items.get_any(ndx).unwrap(), expected);
        }
        f.txn.verify().unwrap();

        f.txn.commit_and_continue_as_read().unwrap();
        prop_assert_eq!(f.items().to_vec().unwrap(), model);
        let typed = f.doc.get_list_typed::<i64>(f.doc.col_key("ints").unwrap()).unwrap();
        prop_assert_eq!(typed.to_vec().unwrap(), int_model);
        f.txn.verify().unwrap();
    }

    #[test]
    fn int_list_survives_commit(ops in prop::collection::vec(int_op_strategy(), 0..40)) {
        let f = DocFixture::memory();
        let ints = f.ints();
        let mut model: Vec<i64> = Vec::new();
        for op in &ops {
            let Some(op) = op.resolve(model.len()) else { continue };
            match &op {
                ResolvedListOp::Insert(ndx, v) => ints.insert_any(*ndx, v.clone()).unwrap(),
                ResolvedListOp::Set(ndx, v) => {
                    ints.set_any(*ndx, v.clone()).unwrap();
                }
                ResolvedListOp::Remove(ndx) => {
                    ints.remove(*ndx).unwrap();
                }
                ResolvedListOp::Move(from, to) => ints.move_item(*from, *to).unwrap(),
                ResolvedListOp::Swap(a, b) => ints.swap(*a, *b).unwrap(),
                ResolvedListOp::Clear => ints.clear().unwrap(),
            }
            op.apply_to(&mut model, |v| v.as_int().unwrap_or_default());
        }
        f.txn.commit_and_continue_as_read().unwrap();
        let typed = f.doc.get_list_typed::<i64>(f.doc.col_key("ints").unwrap()).unwrap();
        prop_assert_eq!(typed.to_vec().unwrap(), model);
    }

    #[test]
    fn dictionary_keys_stay_sorted_and_unique(ops in dict_ops_strategy(40)) {
        let f = DocFixture::memory();
        let props = f.props();
        let mut model = std::collections::BTreeMap::new();
        for op in &ops {
            match op {
                DictOp::Insert(k, v) => {
                    props.insert(k, v.clone()).unwrap();
                    model.insert(k.clone(), v.clone());
                }
                DictOp::Erase(k) => {
                    prop_assert_eq!(props.try_erase(k).unwrap(), model.remove(k).is_some());
                }
                DictOp::InsertCollection(k, kind) => {
                    props.insert_collection(k, *kind).unwrap();
                    let marker = match kind {
                        nestdb_core::CollectionType::List => Mixed::List,
                        nestdb_core::CollectionType::Dictionary => Mixed::Dictionary,
                    };
                    model.insert(k.clone(), marker);
                }
                DictOp::Clear => {
                    props.clear().unwrap();
                    model.clear();
                }
            }
        }
        let keys = props.keys().unwrap();
        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        let expected: Vec<(String, Mixed)> = model.into_iter().collect();
        prop_assert_eq!(props.to_vec().unwrap(), expected.clone());

        let mut replica = DictReplayer::new(props.get_path().unwrap());
        replica.apply_all(f.log.lock().pending());
        prop_assert_eq!(replica.to_vec(), expected);
        f.txn.verify().unwrap();
    }

    #[test]
    fn link_list_hides_tombstones(
        entries in prop::collection::vec(0usize..6, 0..20),
        mask in tombstone_mask_strategy(6),
    ) {
        let f = DocFixture::memory();
        let targets = f.targets(6);
        let links = f.links();
        for &t in &entries {
            links.add(targets[t].key()).unwrap();
        }
        for (target, &dead) in targets.iter().zip(&mask) {
            if dead {
                target.invalidate().unwrap();
            }
        }

        let visible: Vec<ObjKey> = entries
            .iter()
            .filter(|&&t| !mask[t])
            .map(|&t| targets[t].key())
            .collect();
        prop_assert_eq!(links.size().unwrap(), visible.len());
        prop_assert_eq!(links.to_vec().unwrap(), visible.clone());
        prop_assert_eq!(links.as_list().size().unwrap(), entries.len());
        for ndx in 0..visible.len() {
            let real = links.virtual2real(ndx).unwrap();
            prop_assert_eq!(links.real2virtual(real).unwrap(), ndx);
        }

        let linked_dead = (0..6).filter(|&t| mask[t] && entries.contains(&t)).count();
        prop_assert_eq!(f.txn.tombstone_count(f.tables.target).unwrap(), linked_dead);
        f.txn.verify().unwrap();
    }

    #[test]
    fn removing_owner_cascades_to_embedded(count in 0usize..8) {
        let f = DocFixture::memory();
        let parts = f.parts();
        for ndx in 0..count {
            parts.create_and_insert_linked_object(ndx).unwrap();
        }
        prop_assert_eq!(f.txn.object_count(f.tables.part).unwrap(), count);

        let before = f.txn.cascade_invocations();
        f.doc.remove().unwrap();
        prop_assert_eq!(f.txn.object_count(f.tables.part).unwrap(), 0);
        prop_assert!(f.txn.cascade_invocations() >= before + count as u64);
        prop_assert!(!parts.is_attached());
        f.txn.verify().unwrap();
    }

    #[test]
    fn clearing_embedded_links_cascades_once_per_link(count in 0usize..8) {
        let f = DocFixture::memory();
        let parts = f.parts();
        for ndx in 0..count {
            parts.create_and_insert_linked_object(ndx).unwrap();
        }
        let before = f.txn.cascade_invocations();
        parts.clear().unwrap();
        prop_assert_eq!(f.txn.cascade_invocations() - before, count as u64);
        prop_assert_eq!(f.txn.object_count(f.tables.part).unwrap(), 0);
        f.txn.verify().unwrap();
    }

    #[test]
    fn json_export_parses(ops in list_ops_strategy(20)) {
        let f = DocFixture::memory();
        let items = f.items();
        for op in &ops {
            if let Some(ResolvedListOp::Insert(ndx, v)) = op.resolve(items.size().unwrap()) {
                items.insert_any(ndx, v).unwrap();
            }
        }
        let json = items.to_json(JsonOutputMode::Json).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(parsed.as_array().map(Vec::len), Some(items.size().unwrap()));
    }
}

#[test]
fn rewriting_a_value_does_not_bump_versions() {
    let f = DocFixture::memory();
    let ints = f.ints();
    ints.add(7).unwrap();
    let content = f.txn.content_version();
    let storage = f.txn.storage_version();
    ints.set(0, 7).unwrap();
    assert_eq!(f.txn.content_version(), content);
    ints.set(0, 8).unwrap();
    assert!(f.txn.content_version() > content);
    assert_eq!(f.txn.storage_version(), storage);
}

#[test]
fn nested_accessor_detaches_with_its_entry() {
    let f = DocFixture::memory();
    let items = f.items();
    items.insert_collection(0, nestdb_core::CollectionType::List).unwrap();
    let nested = items.get_list(0).unwrap();
    nested.add(1).unwrap();
    items.insert(0, "before").unwrap();
    assert!(nested.is_attached());
    assert_eq!(nested.size().unwrap(), 1);

    items.remove(1).unwrap();
    assert!(!nested.is_attached());
    assert!(matches!(nested.add(2), Err(nestdb_core::CoreError::NotAttached)));
}

#[test]
fn stress_run_is_consistent() {
    let db = TestDatabase::memory();
    let result = run_reader_writer(&db, &StressConfig::default()).unwrap();
    assert_eq!(result.failures, 0);
}
