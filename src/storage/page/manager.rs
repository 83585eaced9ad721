use crate::common::types::{Page, SlotId};
use crate::storage::page::header::PageHeader;
use crate::storage::page::error::PageError;
use crate::storage::page::layout::{slot_position, RecordLocation, HEADER_SIZE, RECORD_OFFSET_SIZE};

/// Slotted page access.
///
/// Record bytes are appended after the header; the slot array of
/// `RecordLocation`s grows backwards from the end of the page.
pub struct PageManager {}

impl Default for PageManager {
    fn default() -> Self {
        Self::new()
    }
}

impl PageManager {
    pub fn new() -> Self {
        Self {}
    }

    pub fn init_page(&self, page: &mut Page) {
        let header = PageHeader::new(page.size());
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());
    }

    /// Largest record a page of `page_size` bytes can hold
    pub fn max_record_size(page_size: usize) -> usize {
        page_size.saturating_sub(HEADER_SIZE + RECORD_OFFSET_SIZE)
    }

    pub fn insert_record(&self, page: &mut Page, data: &[u8]) -> Result<SlotId, PageError> {
        if data.len() > Self::max_record_size(page.size()) {
            return Err(PageError::RecordTooLarge(data.len()));
        }

        let mut header = self.get_header(page);

        // Record size plus the slot entry for the record
        let record_size = data.len() as u32;
        let total_space_needed = record_size + RECORD_OFFSET_SIZE as u32;
        if header.free_space_size < total_space_needed {
            return Err(PageError::InsufficientSpace);
        }

        let slot = header.record_count;
        let slot_pos = slot_position(page.size(), slot);
        let record_loc = RecordLocation {
            offset: header.free_space_offset,
            length: record_size,
        };

        let data_start = header.free_space_offset as usize;
        page.data[data_start..data_start + data.len()].copy_from_slice(data);
        page.data[slot_pos..slot_pos + RECORD_OFFSET_SIZE].copy_from_slice(&record_loc.to_bytes());

        header.free_space_offset += record_size;
        header.free_space_size -= total_space_needed;
        header.record_count += 1;
        page.data[0..HEADER_SIZE].copy_from_slice(&header.to_bytes());

        Ok(slot)
    }

    pub fn get_record(&self, page: &Page, slot: SlotId) -> Result<Vec<u8>, PageError> {
        let header = self.get_header(page);
        if slot >= header.record_count {
            return Err(PageError::InvalidSlot(slot));
        }

        let loc = self.get_record_location(page, slot);
        let start = loc.offset as usize;
        let end = start + loc.length as usize;
        Ok(page.data[start..end].to_vec())
    }

    /// Raw bytes of every record on the page, in slot order
    pub fn get_records(&self, page: &Page) -> Result<Vec<Vec<u8>>, PageError> {
        let header = self.get_header(page);
        (0..header.record_count)
            .map(|slot| self.get_record(page, slot))
            .collect()
    }

    pub fn get_header(&self, page: &Page) -> PageHeader {
        PageHeader::from_bytes(&page.data[0..HEADER_SIZE])
    }

    pub fn record_count(&self, page: &Page) -> u32 {
        self.get_header(page).record_count
    }

    pub fn get_free_space(&self, page: &Page) -> u32 {
        self.get_header(page).free_space_size
    }

    // Get record location from slot
    fn get_record_location(&self, page: &Page, slot: SlotId) -> RecordLocation {
        let pos = slot_position(page.size(), slot);
        RecordLocation::from_bytes(&page.data[pos..pos + RECORD_OFFSET_SIZE])
    }
}
