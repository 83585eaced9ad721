// Query Result Implementation
//
// This module defines the value, record and error types produced by the
// execution operators.

use std::fmt;
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use serde;
use thiserror::Error;

use crate::catalog::DataType;
use crate::storage::page::PageError;

/// Possible data types for values in a record
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub enum DataValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl DataValue {
    pub fn data_type(&self) -> DataType {
        match self {
            DataValue::Integer(_) => DataType::Integer,
            DataValue::Float(_) => DataType::Float,
            DataValue::Text(_) => DataType::Text,
            DataValue::Boolean(_) => DataType::Boolean,
        }
    }

    // Values of different types order by type rank
    fn type_rank(&self) -> u8 {
        match self {
            DataValue::Boolean(_) => 0,
            DataValue::Integer(_) => 1,
            DataValue::Float(_) => 2,
            DataValue::Text(_) => 3,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            DataValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DataValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for DataValue {}

impl PartialOrd for DataValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DataValue {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataValue::Integer(a), DataValue::Integer(b)) => a.cmp(b),
            (DataValue::Float(a), DataValue::Float(b)) => a.total_cmp(b),
            (DataValue::Text(a), DataValue::Text(b)) => a.cmp(b),
            (DataValue::Boolean(a), DataValue::Boolean(b)) => a.cmp(b),
            (a, b) => a.type_rank().cmp(&b.type_rank()),
        }
    }
}

impl Hash for DataValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            DataValue::Integer(i) => { 1.hash(state); i.hash(state); }
            DataValue::Float(f) => { 2.hash(state); f.to_bits().hash(state); }
            DataValue::Text(s) => { 3.hash(state); s.hash(state); }
            DataValue::Boolean(b) => { 4.hash(state); b.hash(state); }
        }
    }
}

impl fmt::Display for DataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataValue::Integer(i) => write!(f, "{}", i),
            DataValue::Float(fl) => write!(f, "{}", fl),
            DataValue::Text(s) => write!(f, "\"{}\"", s),
            DataValue::Boolean(b) => write!(f, "{}", b),
        }
    }
}

impl From<i64> for DataValue {
    fn from(v: i64) -> Self {
        DataValue::Integer(v)
    }
}

impl From<f64> for DataValue {
    fn from(v: f64) -> Self {
        DataValue::Float(v)
    }
}

impl From<&str> for DataValue {
    fn from(v: &str) -> Self {
        DataValue::Text(v.to_string())
    }
}

impl From<String> for DataValue {
    fn from(v: String) -> Self {
        DataValue::Text(v)
    }
}

impl From<bool> for DataValue {
    fn from(v: bool) -> Self {
        DataValue::Boolean(v)
    }
}

/// A record: the ordered values of one tuple
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct Record {
    values: Vec<DataValue>,
}

impl Record {
    pub fn new(values: Vec<DataValue>) -> Self {
        Record { values }
    }

    pub fn values(&self) -> &[DataValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<DataValue> {
        self.values
    }

    pub fn get(&self, index: usize) -> Option<&DataValue> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`, or an execution error naming the missing position
    pub fn value(&self, index: usize) -> QueryResult<&DataValue> {
        self.values.get(index).ok_or_else(|| {
            QueryError::ExecutionError(format!(
                "Record has {} values, no value at position {}",
                self.values.len(),
                index
            ))
        })
    }

    /// Left values followed by right values
    pub fn concat(&self, other: &Record) -> Record {
        let mut values = Vec::with_capacity(self.values.len() + other.values.len());
        values.extend(self.values.iter().cloned());
        values.extend(other.values.iter().cloned());
        Record { values }
    }

    pub fn serialize(&self) -> QueryResult<Vec<u8>> {
        bincode::serialize(&self.values)
            .map_err(|e| QueryError::StorageError(format!("Failed to serialize record: {}", e)))
    }

    pub fn deserialize(bytes: &[u8]) -> QueryResult<Self> {
        let values: Vec<DataValue> = bincode::deserialize(bytes)
            .map_err(|e| QueryError::StorageError(format!("Failed to deserialize record: {}", e)))?;
        Ok(Record { values })
    }
}

impl From<Vec<DataValue>> for Record {
    fn from(values: Vec<DataValue>) -> Self {
        Record::new(values)
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, value) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", value)?;
        }
        write!(f, ")")
    }
}

/// Represents query execution error
#[derive(Error, Debug)]
pub enum QueryError {
    /// Error from storage layer
    #[error("Storage error: {0}")]
    StorageError(String),
    /// Error during query execution
    #[error("Execution error: {0}")]
    ExecutionError(String),
    /// Table not found
    #[error("Table not found: {0}")]
    TableNotFound(String),
    /// Table already exists
    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),
    /// Column not found
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    /// Record does not fit the relation's schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),
    /// Cursor rewound without a mark
    #[error("Cursor reset without a mark")]
    NoMark,
    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl From<PageError> for QueryError {
    fn from(err: PageError) -> Self {
        QueryError::StorageError(format!("Page error: {}", err))
    }
}

/// Result type for query operations
pub type QueryResult<T> = Result<T, QueryError>;
