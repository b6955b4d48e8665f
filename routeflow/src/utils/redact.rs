//! Scrubbing credential material out of error messages.

use regex::Regex;
use std::sync::OnceLock;

use crate::credentials::Credential;

const REDACTED: &str = "[REDACTED]";

fn patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"AIza[0-9A-Za-z_\-]{20,}",
            r"(?i)bearer\s+[0-9A-Za-z._\-]+",
            r"(?i)(api[_-]?key|key|token)=([^&\s]+)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Replaces anything that looks like a key or bearer token.
#[must_use]
pub fn sanitize_message(message: &str) -> String {
    patterns().iter().fold(message.to_string(), |text, re| {
        re.replace_all(&text, |caps: &regex::Captures<'_>| match caps.get(1) {
            Some(name) if caps.len() > 2 => format!("{}={REDACTED}", name.as_str()),
            _ => REDACTED.to_string(),
        })
        .into_owned()
    })
}

/// Sanitizes `message` and replaces any known secret with its masked form.
#[must_use]
pub fn redact_secrets<'a, I>(message: &str, credentials: I) -> String
where
    I: IntoIterator<Item = &'a Credential>,
{
    let text = credentials
        .into_iter()
        .filter(|c| !c.is_blank())
        .fold(message.to_string(), |text, c| text.replace(c.secret(), &c.masked()));
    sanitize_message(&text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_secret_is_masked() {
        let cred = Credential::new("KEY_1", "sk-live-123456789");
        let out = redact_secrets("request with sk-live-123456789 failed", [&cred]);
        assert_eq!(out, "request with ...6789 failed");
    }

    #[test]
    fn test_short_secret_not_echoed() {
        let cred = Credential::new("KEY_1", "s3cr");
        let out = redact_secrets("upstream rejected s3cr", [&cred]);
        assert_eq!(out, "upstream rejected ...");
        assert!(!out.contains("s3cr"));
    }

    #[test]
    fn test_google_style_key_redacted() {
        let out = sanitize_message("bad key AIzaSyA1234567890abcdefghijkLMNOP");
        assert_eq!(out, "bad key [REDACTED]");
    }

    #[test]
    fn test_query_param_redacted() {
        let out = sanitize_message("GET /v1/models?key=abc123&alt=sse returned 403");
        assert_eq!(out, "GET /v1/models?key=[REDACTED]&alt=sse returned 403");
    }

    #[test]
    fn test_bearer_redacted() {
        let out = sanitize_message("Authorization: Bearer eyJhbGciOi.payload");
        assert_eq!(out, "Authorization: [REDACTED]");
    }

    #[test]
    fn test_plain_message_unchanged() {
        assert_eq!(sanitize_message("quota exceeded"), "quota exceeded");
    }
}
