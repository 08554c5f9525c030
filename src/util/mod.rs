//! Small helpers shared by the gateway, config and rendering.
//!
//! - **URL validation**: backend base URL, feed URLs, loopback detection
//! - **Text**: display width, truncation, control-character stripping

mod text;
mod url_validator;

pub use text::{display_width, strip_control_chars, truncate_to_width};
pub use url_validator::{is_loopback, validate_api_base, validate_feed_url, UrlValidationError};
