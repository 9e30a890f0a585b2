//! Postgres persistence for collected news: cursor recomputation, batch
//! writes with per-item accounting, date-window retrieval and pgvector
//! similarity search.

mod search;
mod store;

pub use search::SearchHit;
pub use store::{BacklogRow, NewsRecord, NewsStore, WriteReport};
