//! Read-only schema metadata snapshot
//!
//! Built once from a schema introspector (see `mx-db`) and shared by join
//! inference and the doctor. Table lookups match either the exact name or
//! the unqualified base name, case-insensitively.

use crate::sql_utils::table_base_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Foreign key target declared on a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    /// Referenced table
    pub table: String,
    /// Referenced column
    pub column: String,
}

/// Column metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Database type name
    #[serde(rename = "type", default)]
    pub data_type: String,
    /// Whether NULLs are allowed
    #[serde(default = "crate::serde_helpers::default_true")]
    pub nullable: bool,
    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,
    /// Column-level foreign key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnInfo {
    /// Plain nullable column
    pub fn new(name: &str, data_type: &str) -> Self {
        Self {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable: true,
            primary_key: false,
            foreign_key: None,
        }
    }

    /// Mark as primary key
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Attach a foreign key target
    pub fn references(mut self, table: &str, column: &str) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.to_string(),
            column: column.to_string(),
        });
        self
    }
}

/// Table-level foreign key edge
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForeignKey {
    /// Referencing table
    pub table: String,
    /// Referencing column
    pub column: String,
    /// Referenced table
    pub ref_table: String,
    /// Referenced column
    pub ref_column: String,
}

/// Snapshot of tables, columns, and foreign keys
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMetadata {
    tables: BTreeMap<String, Vec<ColumnInfo>>,
    foreign_keys: Vec<ForeignKey>,
}

impl SchemaMetadata {
    /// Empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a table and its columns
    pub fn add_table(&mut self, name: &str, columns: Vec<ColumnInfo>) {
        self.tables.insert(name.to_string(), columns);
    }

    /// Builder form of [`add_table`](Self::add_table)
    pub fn with_table(mut self, name: &str, columns: Vec<ColumnInfo>) -> Self {
        self.add_table(name, columns);
        self
    }

    /// Add a table-level foreign key
    pub fn add_foreign_key(&mut self, fk: ForeignKey) {
        if !self.foreign_keys.contains(&fk) {
            self.foreign_keys.push(fk);
        }
    }

    /// Table names, sorted
    pub fn table_names(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Whether the snapshot holds no tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn table_key(&self, table: &str) -> Option<&String> {
        if let Some((key, _)) = self.tables.get_key_value(table) {
            return Some(key);
        }
        let wanted = table_base_name(table);
        self.tables
            .keys()
            .find(|k| k.eq_ignore_ascii_case(table) || table_base_name(k).eq_ignore_ascii_case(wanted))
    }

    /// Whether the table is known
    pub fn has_table(&self, table: &str) -> bool {
        self.table_key(table).is_some()
    }

    /// Columns of a table
    pub fn columns(&self, table: &str) -> Option<&[ColumnInfo]> {
        self.table_key(table)
            .and_then(|k| self.tables.get(k))
            .map(Vec::as_slice)
    }

    /// Whether the table has the column
    pub fn has_column(&self, table: &str, column: &str) -> bool {
        self.columns(table)
            .is_some_and(|cols| cols.iter().any(|c| c.name.eq_ignore_ascii_case(column)))
    }

    /// First primary key column of a table
    pub fn primary_key(&self, table: &str) -> Option<&str> {
        self.columns(table)?
            .iter()
            .find(|c| c.primary_key)
            .map(|c| c.name.as_str())
    }

    /// Every FK edge, merging table-level and column-level declarations, sorted
    pub fn foreign_keys(&self) -> Vec<ForeignKey> {
        let mut all = self.foreign_keys.clone();
        for (table, columns) in &self.tables {
            for col in columns {
                if let Some(fk) = &col.foreign_key {
                    let edge = ForeignKey {
                        table: table.clone(),
                        column: col.name.clone(),
                        ref_table: fk.table.clone(),
                        ref_column: fk.column.clone(),
                    };
                    if !all.contains(&edge) {
                        all.push(edge);
                    }
                }
            }
        }
        all.sort();
        all
    }
}
