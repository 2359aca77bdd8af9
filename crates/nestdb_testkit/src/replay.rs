//! Replays replicated instructions onto plain models.
//!
//! A follower that applies every logged instruction must end up with the
//! same contents as the collection that produced them.

use nestdb_core::{FullPath, Instruction, Mixed};
use std::collections::BTreeMap;

/// Result of replaying one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Replayed {
    /// The instruction changed the model.
    Applied,
    /// The instruction addressed another collection.
    Skipped,
}

/// Model of one list, addressed by its path.
#[derive(Debug, Clone)]
pub struct ListReplayer {
    path: FullPath,
    /// Current contents.
    pub values: Vec<Mixed>,
}

impl ListReplayer {
    /// Starts from an empty list at `path`.
    pub fn new(path: FullPath) -> Self {
        Self {
            path,
            values: Vec::new(),
        }
    }

    /// Applies one instruction.
    ///
    /// # Panics
    ///
    /// Panics when an index is outside the model, which means the log and
    /// the list disagree.
    pub fn apply(&mut self, instruction: &Instruction) -> Replayed {
        match instruction {
            Instruction::ListInsert { path, ndx, value } if *path == self.path => {
                self.values.insert(*ndx, value.clone());
            }
            Instruction::ListSet { path, ndx, value } if *path == self.path => {
                self.values[*ndx] = value.clone();
            }
            Instruction::ListErase { path, ndx } if *path == self.path => {
                self.values.remove(*ndx);
            }
            Instruction::ListMove { path, from, to } if *path == self.path => {
                let value = self.values.remove(*from);
                self.values.insert(*to, value);
            }
            Instruction::ListClear { path, old_size } if *path == self.path => {
                assert_eq!(*old_size, self.values.len(), "list_clear size disagrees");
                self.values.clear();
            }
            _ => return Replayed::Skipped,
        }
        Replayed::Applied
    }

    /// Applies every instruction in order.
    pub fn apply_all<'a>(&mut self, instructions: impl IntoIterator<Item = &'a Instruction>) -> usize {
        instructions
            .into_iter()
            .filter(|i| self.apply(i) == Replayed::Applied)
            .count()
    }
}

/// Model of one dictionary, addressed by its path.
#[derive(Debug, Clone)]
pub struct DictReplayer {
    path: FullPath,
    /// Current contents in key order.
    pub entries: BTreeMap<String, Mixed>,
}

impl DictReplayer {
    /// Starts from an empty dictionary at `path`.
    pub fn new(path: FullPath) -> Self {
        Self {
            path,
            entries: BTreeMap::new(),
        }
    }

    /// Applies one instruction.
    pub fn apply(&mut self, instruction: &Instruction) -> Replayed {
        match instruction {
            Instruction::DictionaryInsert { path, key, value }
            | Instruction::DictionarySet { path, key, value }
                if *path == self.path =>
            {
                self.entries.insert(key.clone(), value.clone());
            }
            Instruction::DictionaryErase { path, key } if *path == self.path => {
                self.entries.remove(key);
            }
            Instruction::CollectionClear { path } if *path == self.path => self.entries.clear(),
            _ => return Replayed::Skipped,
        }
        Replayed::Applied
    }

    /// Applies every instruction in order.
    pub fn apply_all<'a>(&mut self, instructions: impl IntoIterator<Item = &'a Instruction>) -> usize {
        instructions
            .into_iter()
            .filter(|i| self.apply(i) == Replayed::Applied)
            .count()
    }

    /// Entries as pairs, in key order.
    pub fn to_vec(&self) -> Vec<(String, Mixed)> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nestdb_core::{ColKey, ObjKey, TableKey};

    fn path(col: u32) -> FullPath {
        FullPath {
            table: TableKey::new(0),
            obj: ObjKey::new(0),
            col: ColKey::new(col),
            elements: Vec::new(),
        }
    }

    #[test]
    fn list_instructions_rebuild_contents() {
        let mut model = ListReplayer::new(path(1));
        let log = [
            Instruction::ListInsert {
                path: path(1),
                ndx: 0,
                value: Mixed::Int(1),
            },
            Instruction::ListInsert {
                path: path(1),
                ndx: 1,
                value: Mixed::Int(2),
            },
            Instruction::ListInsert {
                path: path(2),
                ndx: 0,
                value: Mixed::Int(9),
            },
            Instruction::ListMove {
                path: path(1),
                from: 1,
                to: 0,
            },
        ];
        assert_eq!(model.apply_all(&log), 3);
        assert_eq!(model.values, vec![Mixed::Int(2), Mixed::Int(1)]);
    }

    #[test]
    fn dictionary_instructions_rebuild_contents() {
        let mut model = DictReplayer::new(path(0));
        model.apply(&Instruction::DictionaryInsert {
            path: path(0),
            key: "b".into(),
            value: Mixed::Int(1),
        });
        model.apply(&Instruction::DictionaryInsert {
            path: path(0),
            key: "a".into(),
            value: Mixed::Int(2),
        });
        model.apply(&Instruction::DictionaryErase {
            path: path(0),
            key: "b".into(),
        });
        assert_eq!(model.to_vec(), vec![("a".to_string(), Mixed::Int(2))]);
    }
}
