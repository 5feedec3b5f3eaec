//! Utils Module
pub mod logging;
pub mod truncate;

pub use truncate::{preview, truncate_chars};
