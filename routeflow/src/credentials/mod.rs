//! Upstream credentials and the pool of working ones.
//!
//! Candidates are probed concurrently at the start of each request; the
//! order-preserving working subset is what one-shot stages rotate through.

mod credential;
mod pool;
mod probe;

pub use credential::{Credential, CredentialSet};
pub use pool::{CredentialPool, CredentialPoolManager, CredentialStatus, ProbeReport};
pub use probe::{CredentialProbe, FailureReason, ProbeOutcome, StreamingHealthProbe};

#[cfg(test)]
pub use probe::MockCredentialProbe;
