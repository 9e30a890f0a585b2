pub mod config;
pub mod error;
pub mod timewindow;
pub mod types;

pub use config::Config;
pub use error::NewslineError;
pub use timewindow::{resolve_window, TimeMode, TimeWindowError};
pub use types::{
    external_id_from_url, Category, EnrichedPost, RawPost, Source, SourceCursor, EMBEDDING_DIM,
};
