pub mod page;
pub mod table;
pub mod store;

// Public exports
pub use page::PageManager;
pub use table::{HeapTable, TableRecordCursor};
pub use store::{HeapStorage, PageCursor, RelationStore, StorageConfig};
