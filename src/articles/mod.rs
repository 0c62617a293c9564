pub mod export;
pub mod service;

pub use export::{ExportError, ExportFormat};
pub use service::ArticleService;
