//! Product review scraper.
//!
//! Harvests the reviews of one marketplace product page by page, pacing the
//! requests so the site doesn't block us, and sorts negative reviews into
//! topical buckets by keyword.

mod error;
mod macros;

pub mod analyze;
pub mod categorize;
pub mod config;
pub mod output;
pub mod pacing;
pub mod parse;
pub mod process;
pub mod report;
pub mod request;
pub mod store;

pub use error::{Error, Result};
pub use parse::Review;
