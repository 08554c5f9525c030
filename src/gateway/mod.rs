//! Request gateway for the digest backend.
//!
//! All outbound HTTP goes through [`Gateway`], which gives every call the same
//! shape (`method, path, body? -> JSON`) and sorts failures into three
//! classes ([`ErrorKind`]): transport, status and parse.
//!
//! # Example
//!
//! ```ignore
//! use rss_digest::gateway::{Gateway, DEFAULT_TIMEOUT};
//!
//! let gw = Gateway::new(url::Url::parse("http://localhost:8000")?, DEFAULT_TIMEOUT, None)?;
//! let health = gw.health().await?;
//! ```

mod client;
mod error;

pub use client::{Gateway, Health, DEFAULT_TIMEOUT, MAX_BODY_SIZE};
pub use error::{ErrorKind, GatewayError};
pub use reqwest::Method;
