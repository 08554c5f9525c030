//! Client-side views of the digest backend.
//!
//! - [`directory`] - the subscribed sources and their unread metadata
//! - [`digest`] - the category-grouped entries of one selected date
//! - [`types`] - wire/data types shared by both
//!
//! Both views are only ever replaced by full server responses. The
//! [`Controller`](crate::controller::Controller) decides when each one is
//! refreshed.

pub mod digest;
pub mod directory;
mod error;
mod types;

pub use digest::{Applied, DigestState, DigestView, Generations};
pub use directory::SourceDirectory;
pub use error::{CreateError, FetchError};
pub use types::{
    CategoryGroup, Digest, DraftError, Entry, IngestReport, Source, SourceDraft, DEFAULT_CATEGORY,
};
