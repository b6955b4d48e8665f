//! Credential values and how candidates are loaded.

use sha2::{Digest, Sha256};
use std::fmt;

const MASK_SUFFIX: usize = 4;

/// An opaque upstream access key.
///
/// The secret is never printed; `Debug` shows the label and masked suffix only.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential {
    label: String,
    secret: String,
}

impl Credential {
    /// Creates a credential.
    #[must_use]
    pub fn new(label: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            secret: secret.into(),
        }
    }

    /// Returns the label, e.g. the environment variable it came from.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the raw secret.
    #[must_use]
    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Returns true if no secret is configured.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.secret.trim().is_empty()
    }

    /// Returns the last four characters prefixed with `...`.
    ///
    /// Secrets shorter than twice the suffix are masked to `...` alone.
    #[must_use]
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.secret.chars().collect();
        if chars.len() < MASK_SUFFIX * 2 {
            return "...".to_string();
        }
        let tail: String = chars[chars.len() - MASK_SUFFIX..].iter().collect();
        format!("...{tail}")
    }

    /// Returns a short SHA-256 fingerprint of the secret.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.secret.as_bytes());
        hex::encode(&digest[..4])
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("label", &self.label)
            .field("secret", &self.masked())
            .finish()
    }
}

/// An ordered list of candidate credentials.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialSet {
    candidates: Vec<Credential>,
}

impl CredentialSet {
    /// Creates a set from explicit candidates.
    #[must_use]
    pub fn new(candidates: Vec<Credential>) -> Self {
        Self { candidates }
    }

    /// Loads `PREFIX_1` through `PREFIX_{count}` from the environment.
    ///
    /// Unset variables become blank candidates so the probe can report them
    /// as missing.
    #[must_use]
    pub fn from_env(prefix: &str, count: usize) -> Self {
        Self::from_lookup(prefix, count, |name| std::env::var(name).ok())
    }

    /// Loads numbered candidates through an arbitrary lookup.
    #[must_use]
    pub fn from_lookup<F>(prefix: &str, count: usize, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let candidates = (1..=count)
            .map(|i| {
                let name = format!("{prefix}_{i}");
                let secret = lookup(&name).unwrap_or_default();
                Credential::new(name, secret)
            })
            .collect();
        Self { candidates }
    }

    /// Returns the candidates in order.
    #[must_use]
    pub fn candidates(&self) -> &[Credential] {
        &self.candidates
    }

    /// Returns the number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Returns true if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

impl From<Vec<Credential>> for CredentialSet {
    fn from(candidates: Vec<Credential>) -> Self {
        Self::new(candidates)
    }
}
