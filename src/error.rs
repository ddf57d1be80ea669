use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("page {logical_page_id} corrupt: {reason}")]
    PageCorrupt {
        logical_page_id: u32,
        reason: &'static str,
    },

    #[error("key not found")]
    NotFound,

    #[error("end of iteration")]
    EndOfIteration,
}
