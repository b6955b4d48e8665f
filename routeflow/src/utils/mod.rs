//! Small shared helpers: timestamps and message redaction.

mod redact;
pub mod timestamps;

pub use redact::{redact_secrets, sanitize_message};
pub use timestamps::{duration_ms, elapsed_ms, iso_timestamp};
