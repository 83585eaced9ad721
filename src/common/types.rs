use std::sync::Arc;
use parking_lot::RwLock;

/// Default page size in bytes (8KB)
pub const DEFAULT_PAGE_SIZE: usize = 8192;

/// Smallest page size a heap table accepts
pub const MIN_PAGE_SIZE: usize = 64;

/// Page ID type
pub type PageId = u32;

/// Transaction ID type
pub type TxnId = u32;

/// Slot index of a record within a page
pub type SlotId = u32;

/// Page structure
#[derive(Debug, Clone)]
pub struct Page {
    pub data: Box<[u8]>,
    pub page_id: PageId,
}

impl Page {
    pub fn new(page_id: PageId, page_size: usize) -> Self {
        Self {
            data: vec![0; page_size].into_boxed_slice(),
            page_id,
        }
    }

    /// Size of the page buffer in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

/// Smart pointer to a page
pub type PagePtr = Arc<RwLock<Page>>;
