use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageError {
    #[error("Not enough space in page")]
    InsufficientSpace,
    #[error("Record of {0} bytes can never fit in a page")]
    RecordTooLarge(usize),
    #[error("Invalid slot {0}")]
    InvalidSlot(u32),
}
