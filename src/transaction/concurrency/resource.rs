// Lockable resources
//
// Tables contain pages; a page is identified by its table and page id.

use std::fmt;

use crate::common::types::PageId;

/// An entity that can be locked
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Table(String),
    Page { table: String, page_id: PageId },
}

impl Resource {
    pub fn table(name: impl Into<String>) -> Self {
        Resource::Table(name.into())
    }

    pub fn page(table: impl Into<String>, page_id: PageId) -> Self {
        Resource::Page {
            table: table.into(),
            page_id,
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, Resource::Page { .. })
    }

    /// Name of the table this resource is, or belongs to
    pub fn table_name(&self) -> &str {
        match self {
            Resource::Table(name) => name,
            Resource::Page { table, .. } => table,
        }
    }

    /// The containing table for pages, `None` for tables
    pub fn parent(&self) -> Option<Resource> {
        match self {
            Resource::Table(_) => None,
            Resource::Page { table, .. } => Some(Resource::Table(table.clone())),
        }
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Table(name) => write!(f, "table:{}", name),
            Resource::Page { table, page_id } => write!(f, "page:{}/{}", table, page_id),
        }
    }
}
