//! Nested `database → schema → table → columns` view of catalog metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::protected::ProtectedIdentifierSet;

/// One column of a described table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    /// Column name
    pub name: String,
    /// Formatted type, e.g. `integer` or `character varying(20)`
    pub data_type: String,
}

/// Columns of one table in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    /// Columns in ordinal order
    pub columns: Vec<ColumnInfo>,
}

/// A flat catalog row as returned by the introspection query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogColumn {
    /// Current database name
    pub database_name: String,
    /// Schema holding the table
    pub schema_name: String,
    /// Table name
    pub table_name: String,
    /// Column name
    pub column_name: String,
    /// Formatted column type
    pub data_type: String,
}

/// `database → schema → table → {columns}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaHierarchy(pub BTreeMap<String, BTreeMap<String, BTreeMap<String, TableInfo>>>);

impl SchemaHierarchy {
    /// Folds catalog rows into the nested mapping.
    ///
    /// Rows must arrive in ordinal order per table; that order is kept. Protected
    /// table names are skipped even if the query let them through.
    pub fn from_catalog<I>(rows: I, protected: &ProtectedIdentifierSet) -> Self
    where
        I: IntoIterator<Item = CatalogColumn>,
    {
        let mut hierarchy = SchemaHierarchy::default();
        for row in rows {
            if protected.is_protected_table(&row.table_name) {
                continue;
            }
            hierarchy
                .0
                .entry(row.database_name)
                .or_default()
                .entry(row.schema_name)
                .or_default()
                .entry(row.table_name)
                .or_default()
                .columns
                .push(ColumnInfo {
                    name: row.column_name,
                    data_type: row.data_type,
                });
        }
        hierarchy
    }

    /// Looks up one table.
    pub fn table(&self, database: &str, schema: &str, table: &str) -> Option<&TableInfo> {
        self.0.get(database)?.get(schema)?.get(table)
    }

    /// Every table name across all databases and schemas.
    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.0
            .values()
            .flat_map(|schemas| schemas.values())
            .flat_map(|tables| tables.keys())
            .map(String::as_str)
    }

    /// Whether no table was described.
    pub fn is_empty(&self) -> bool {
        self.table_names().next().is_none()
    }
}
