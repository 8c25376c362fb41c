use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StampError {
    /// Geometry was requested before the page finished rendering
    #[error("Page geometry not ready: {0}")]
    NotReady(&'static str),

    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Page {page} is out of range (document has {count} pages)")]
    PageOutOfRange { page: usize, count: usize },

    #[error("Failed to embed image: {0}")]
    Embed(String),

    #[error("Serialization error: {0}")]
    Serialize(String),

    #[error("No overlays to apply")]
    NoOverlays,

    #[error("A commit is already in progress")]
    CommitInProgress,

    #[error("Document changed while the commit was running")]
    StaleCommit,

    #[error("Document handle error: {0}")]
    Handle(String),
}
