//! Logging setup.
//!
//! Library code only emits `tracing` events and spans; binaries and tests
//! opt into output with [`init_tracing`].

mod logging;

pub use logging::{init_tracing, LogFormat};
