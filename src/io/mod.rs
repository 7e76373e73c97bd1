//! Background population of table models.

pub mod async_loader;

// Re-export commonly used types
pub use async_loader::{AsyncTableLoader, LoadResult, LoadingState};
