// Schema Module
//
// This module defines the Schema type describing the columns of a relation,
// and the data types records are validated against.

use std::fmt;
use serde::{Serialize, Deserialize};

use super::column::Column;
use crate::query::executor::result::{DataValue, QueryError, QueryResult};

/// Data types supported by the execution layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Integer,
    Float,
    Text,
    Boolean,
}

impl DataType {
    /// Convert a string representation to a DataType
    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_uppercase().as_str() {
            "INT" | "INTEGER" => Ok(DataType::Integer),
            "FLOAT" | "REAL" | "DOUBLE" => Ok(DataType::Float),
            "TEXT" | "VARCHAR" | "CHAR" | "STRING" => Ok(DataType::Text),
            "BOOL" | "BOOLEAN" => Ok(DataType::Boolean),
            _ => Err(format!("Unknown data type: {}", s)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Integer => "INTEGER",
            DataType::Float => "FLOAT",
            DataType::Text => "TEXT",
            DataType::Boolean => "BOOLEAN",
        };
        write!(f, "{}", name)
    }
}

/// Ordered column list of a relation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Schema { columns }
    }

    /// Build a schema from `(name, type)` pairs
    pub fn from_pairs<S: Into<String>>(pairs: impl IntoIterator<Item = (S, DataType)>) -> Self {
        Schema {
            columns: pairs
                .into_iter()
                .map(|(name, data_type)| Column::new(name, data_type))
                .collect(),
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    /// Resolve a column name to its position.
    ///
    /// An exact match wins. Otherwise an unqualified name matches a single
    /// qualified column (`id` finds `users.id`); more than one such match is
    /// ambiguous.
    pub fn column_index(&self, name: &str) -> QueryResult<usize> {
        if let Some(idx) = self.columns.iter().position(|c| c.name() == name) {
            return Ok(idx);
        }

        let suffix = format!(".{}", name);
        let mut candidates = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.name().ends_with(&suffix));

        match (candidates.next(), candidates.next()) {
            (Some((idx, _)), None) => Ok(idx),
            (Some(_), Some(_)) => Err(QueryError::InvalidOperation(format!(
                "Column reference '{}' is ambiguous",
                name
            ))),
            _ => Err(QueryError::ColumnNotFound(name.to_string())),
        }
    }

    /// Schema of `self` followed by `other`, as produced by a join
    pub fn concat(&self, other: &Schema) -> Schema {
        let mut columns = self.columns.clone();
        columns.extend(other.columns.iter().cloned());
        Schema { columns }
    }

    /// Copy of the schema with every column qualified by `prefix`
    pub fn qualified(&self, prefix: &str) -> Schema {
        Schema {
            columns: self.columns.iter().map(|c| c.qualified(prefix)).collect(),
        }
    }

    /// Check arity and value types of a record about to be stored
    pub fn validate(&self, values: &[DataValue]) -> QueryResult<()> {
        if values.len() != self.columns.len() {
            return Err(QueryError::SchemaMismatch(format!(
                "Record has {} values, but schema expects {}",
                values.len(),
                self.columns.len()
            )));
        }

        for (value, column) in values.iter().zip(&self.columns) {
            if value.data_type() != column.data_type() {
                return Err(QueryError::SchemaMismatch(format!(
                    "Column '{}' expects {}, got {}",
                    column.name(),
                    column.data_type(),
                    value.data_type()
                )));
            }
        }
        Ok(())
    }
}
