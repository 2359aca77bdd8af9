//! Tables and columns.

use crate::error::{CoreError, CoreResult};
use crate::types::{ColKey, TableKey};
use crate::value::{CollectionType, DataType};
use nestdb_codec::Value;
use serde::{Deserialize, Serialize};

/// Definition of one column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within its table.
    pub name: String,
    /// Element kind.
    pub data_type: DataType,
    /// Set for list and dictionary columns.
    pub collection: Option<CollectionType>,
    /// Whether elements may be null.
    pub nullable: bool,
    /// Target table for [`DataType::Link`] columns.
    pub target: Option<TableKey>,
}

impl ColumnSpec {
    /// A scalar column.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            collection: None,
            nullable: data_type == DataType::Mixed,
            target: None,
        }
    }

    /// A list column.
    #[must_use]
    pub fn list(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            collection: Some(CollectionType::List),
            ..Self::new(name, data_type)
        }
    }

    /// A dictionary column with string keys.
    #[must_use]
    pub fn dictionary(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            collection: Some(CollectionType::Dictionary),
            ..Self::new(name, data_type)
        }
    }

    /// A list of links to `target`.
    #[must_use]
    pub fn link_list(name: impl Into<String>, target: TableKey) -> Self {
        Self::list(name, DataType::Link).link_to(target)
    }

    /// Marks elements as nullable.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Sets the link target.
    #[must_use]
    pub fn link_to(mut self, target: TableKey) -> Self {
        self.target = Some(target);
        self
    }

    /// Returns true for list and dictionary columns.
    #[must_use]
    pub const fn is_collection(&self) -> bool {
        self.collection.is_some()
    }

    /// Returns true when the column's values are links.
    #[must_use]
    pub const fn holds_links(&self) -> bool {
        self.data_type.is_link() || matches!(self.data_type, DataType::Mixed)
    }

    fn to_cbor(&self) -> Value {
        Value::Array(vec![
            Value::Text(self.name.clone()),
            Value::Integer(self.data_type.code()),
            Value::Integer(self.collection.map_or(0, CollectionType::code)),
            Value::Bool(self.nullable),
            Value::Integer(self.target.map_or(-1, |t| i64::from(t.0))),
        ])
    }

    fn from_cbor(value: &Value) -> Option<Self> {
        let parts = value.as_array()?;
        let collection = match parts.get(2)?.as_integer()? {
            0 => None,
            code => Some(CollectionType::from_code(code)?),
        };
        let target = match parts.get(4)?.as_integer()? {
            -1 => None,
            key => Some(TableKey::new(u32::try_from(key).ok()?)),
        };
        Some(Self {
            name: parts.first()?.as_text()?.to_string(),
            data_type: DataType::from_code(parts.get(1)?.as_integer()?)?,
            collection,
            nullable: parts.get(3)?.as_bool()?,
            target,
        })
    }
}

/// Definition of one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name, unique within the schema.
    pub name: String,
    /// Embedded objects are owned by exactly one link and die with it.
    pub embedded: bool,
    /// Columns in key order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// A top-level table.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            embedded: false,
            columns: Vec::new(),
        }
    }

    /// An embedded table.
    #[must_use]
    pub fn embedded(name: impl Into<String>) -> Self {
        Self {
            embedded: true,
            ..Self::new(name)
        }
    }

    /// Appends a column.
    #[must_use]
    pub fn column(mut self, column: ColumnSpec) -> Self {
        self.columns.push(column);
        self
    }

    /// Looks up a column by name.
    #[must_use]
    pub fn col_key(&self, name: &str) -> Option<ColKey> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(ColKey::new)
    }
}

/// All tables of a database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    tables: Vec<TableSpec>,
}

impl Schema {
    /// Number of tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when no table exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Looks up a table by name.
    #[must_use]
    pub fn table_key(&self, name: &str) -> Option<TableKey> {
        self.tables
            .iter()
            .position(|t| t.name == name)
            .and_then(|i| u32::try_from(i).ok())
            .map(TableKey::new)
    }

    /// Table definition.
    pub fn table(&self, table: TableKey) -> CoreResult<&TableSpec> {
        self.tables
            .get(table.index())
            .ok_or_else(|| CoreError::schema_mismatch(format!("no table {table}")))
    }

    /// Column definition.
    pub fn column(&self, table: TableKey, col: ColKey) -> CoreResult<&ColumnSpec> {
        self.table(table)?
            .columns
            .get(col.index())
            .ok_or_else(|| CoreError::schema_mismatch(format!("no column {col} in {table}")))
    }

    /// Every table with its key.
    pub fn tables(&self) -> impl Iterator<Item = (TableKey, &TableSpec)> {
        self.tables
            .iter()
            .enumerate()
            .filter_map(|(i, t)| Some((TableKey::new(u32::try_from(i).ok()?), t)))
    }

    /// Adds a table, validating names and link targets.
    pub(crate) fn add_table(&mut self, spec: TableSpec) -> CoreResult<TableKey> {
        if self.table_key(&spec.name).is_some() {
            return Err(CoreError::schema_mismatch(format!(
                "table '{}' already exists",
                spec.name
            )));
        }
        let key = TableKey::new(
            u32::try_from(self.tables.len())
                .map_err(|_| CoreError::schema_mismatch("too many tables"))?,
        );
        for (i, column) in spec.columns.iter().enumerate() {
            if spec.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(CoreError::schema_mismatch(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
            match (column.data_type, column.target) {
                (DataType::Link, Some(target)) if target == key || self.table(target).is_ok() => {}
                (DataType::Link, _) => {
                    return Err(CoreError::schema_mismatch(format!(
                        "link column '{}' needs an existing target table",
                        column.name
                    )))
                }
                (_, Some(_)) => {
                    return Err(CoreError::schema_mismatch(format!(
                        "column '{}' is not a link column",
                        column.name
                    )))
                }
                _ => {}
            }
        }
        self.tables.push(spec);
        Ok(key)
    }

    pub(crate) fn to_cbor(&self) -> Value {
        Value::Array(
            self.tables
                .iter()
                .map(|t| {
                    Value::Array(vec![
                        Value::Text(t.name.clone()),
                        Value::Bool(t.embedded),
                        Value::Array(t.columns.iter().map(ColumnSpec::to_cbor).collect()),
                    ])
                })
                .collect(),
        )
    }

    pub(crate) fn from_cbor(value: &Value) -> Option<Self> {
        let tables = value
            .as_array()?
            .iter()
            .map(|t| {
                let parts = t.as_array()?;
                Some(TableSpec {
                    name: parts.first()?.as_text()?.to_string(),
                    embedded: parts.get(1)?.as_bool()?,
                    columns: parts
                        .get(2)?
                        .as_array()?
                        .iter()
                        .map(ColumnSpec::from_cbor)
                        .collect::<Option<Vec<_>>>()?,
                })
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Self { tables })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        let mut schema = Schema::default();
        let address = schema
            .add_table(TableSpec::embedded("Address").column(ColumnSpec::new("city", DataType::String)))
            .unwrap();
        schema
            .add_table(
                TableSpec::new("Person")
                    .column(ColumnSpec::new("name", DataType::String))
                    .column(ColumnSpec::list("scores", DataType::Int).nullable())
                    .column(ColumnSpec::link_list("homes", address))
                    .column(ColumnSpec::dictionary("extra", DataType::Mixed)),
            )
            .unwrap();
        schema
    }

    #[test]
    fn lookups_by_name() {
        let schema = sample();
        let person = schema.table_key("Person").unwrap();
        let table = schema.table(person).unwrap();
        let homes = table.col_key("homes").unwrap();
        let column = schema.column(person, homes).unwrap();
        assert_eq!(column.collection, Some(CollectionType::List));
        assert_eq!(column.target, schema.table_key("Address"));
        assert!(schema.column(person, ColKey::new(40)).is_err());
        assert_eq!(schema.tables().count(), 2);
    }

    #[test]
    fn persisted_form_round_trips() {
        let schema = sample();
        assert_eq!(Schema::from_cbor(&schema.to_cbor()).unwrap(), schema);
    }

    #[test]
    fn invalid_tables_are_rejected() {
        let mut schema = sample();
        assert!(schema.add_table(TableSpec::new("Person")).is_err());
        assert!(schema
            .add_table(TableSpec::new("Broken").column(ColumnSpec::new("to", DataType::Link)))
            .is_err());
        assert!(schema
            .add_table(
                TableSpec::new("Dup")
                    .column(ColumnSpec::new("a", DataType::Int))
                    .column(ColumnSpec::new("a", DataType::Bool))
            )
            .is_err());
        let next = TableKey::new(u32::try_from(schema.len()).unwrap());
        let tree = schema
            .add_table(TableSpec::new("Tree").column(ColumnSpec::link_list("children", next)))
            .unwrap();
        assert_eq!(tree, next);
    }
}
