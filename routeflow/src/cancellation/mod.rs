//! Cooperative cancellation of a running request.

mod token;

pub use token::CancellationToken;
