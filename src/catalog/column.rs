// Column Module
//
// This module defines the Column type that describes one attribute of a relation.

use super::schema::DataType;
use serde::{Serialize, Deserialize};

/// Represents a column in a relation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name
    name: String,
    /// Column data type
    data_type: DataType,
}

impl Column {
    /// Create a new column
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Column {
            name: name.into(),
            data_type,
        }
    }

    /// Get the column name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the column data type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Same column under a `prefix.name` qualified name
    pub fn qualified(&self, prefix: &str) -> Self {
        if self.name.contains('.') {
            return self.clone();
        }
        Column {
            name: format!("{}.{}", prefix, self.name),
            data_type: self.data_type,
        }
    }
}
