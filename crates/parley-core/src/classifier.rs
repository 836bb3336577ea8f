//! Classify provider failures into failover decisions
//!
//! Provider error text is not a stable contract, so this is a keyword
//! heuristic. It is the only place that looks at error wording; extend the
//! tables here rather than matching strings elsewhere.

use crate::providers::ProviderError;

/// How the dispatcher should treat a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Usage allowance or rate limit hit. Another provider may answer.
    Quota,
    /// Network trouble, timeouts, overloaded upstream. Another provider may answer.
    Transient,
    /// Bad credentials or a malformed request. Retrying elsewhere won't help.
    Fatal,
    /// Not recognized. Treated like `Fatal`.
    Unknown,
}

impl ErrorClass {
    /// Whether this failure moves the dispatcher on to the next provider
    pub fn should_failover(self) -> bool {
        matches!(self, Self::Quota | Self::Transient)
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quota => write!(f, "quota"),
            Self::Transient => write!(f, "transient"),
            Self::Fatal => write!(f, "fatal"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

const QUOTA_PATTERNS: &[&str] = &[
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "requests per day",
    "requests per minute",
    "tokens per minute",
    "free tier",
    "free_tier",
    "billing details",
    "insufficient_quota",
    "resourceexhausted",
    "resource_exhausted",
    "resource has been exhausted",
    "usage limit",
];

const FATAL_PATTERNS: &[&str] = &[
    "unauthorized",
    "forbidden",
    "invalid api key",
    "invalid_api_key",
    "invalid x-api-key",
    "api key not valid",
    "incorrect api key",
    "authentication",
    "permission denied",
    "permission_denied",
    "bad request",
    "invalid_request",
    "malformed",
];

const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "connection reset",
    "connection refused",
    "connection closed",
    "connection failed",
    "failed to send request",
    "broken pipe",
    "temporarily unavailable",
    "service unavailable",
    "bad gateway",
    "gateway timeout",
    "internal server error",
    "overloaded",
    "try again later",
];

/// Status codes that show up inside error text from SDK-style wrappers
const QUOTA_CODES: &[&str] = &["429"];
const FATAL_CODES: &[&str] = &["401", "403"];

/// Map a raw provider failure to an [`ErrorClass`].
///
/// Quota wins over everything: a 429 status or quota vocabulary anywhere in
/// the message. Some backends report rate limits as 403 or 413, so the
/// message is checked before the status. Otherwise a status code decides,
/// and without one the message is matched for auth/request vocabulary, then
/// network vocabulary.
pub fn classify(err: &ProviderError) -> ErrorClass {
    let msg = err.message.to_lowercase();

    if err.status == Some(429)
        || QUOTA_PATTERNS.iter().any(|p| msg.contains(p))
        || mentions_code(&msg, QUOTA_CODES)
    {
        return ErrorClass::Quota;
    }

    if let Some(status) = err.status {
        if let Some(class) = classify_status(status) {
            return class;
        }
    }

    if FATAL_PATTERNS.iter().any(|p| msg.contains(p)) || mentions_code(&msg, FATAL_CODES) {
        return ErrorClass::Fatal;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| msg.contains(p)) {
        return ErrorClass::Transient;
    }
    ErrorClass::Unknown
}

fn classify_status(status: u16) -> Option<ErrorClass> {
    match status {
        429 => Some(ErrorClass::Quota),
        408 => Some(ErrorClass::Transient),
        400..=499 => Some(ErrorClass::Fatal),
        500..=599 => Some(ErrorClass::Transient),
        _ => None,
    }
}

/// Whole-token match, so "14290 tokens" is not a 429
fn mentions_code(msg: &str, codes: &[&str]) -> bool {
    msg.split(|c: char| !c.is_ascii_alphanumeric())
        .any(|token| codes.contains(&token))
}
