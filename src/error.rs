//! Error-kind taxonomy for the two call sites (transport, patcher) where a
//! caller needs to branch on *what kind* of failure happened, not just that
//! one did. Everywhere else a bare `anyhow::Error` carries enough context,
//! matching the teacher crate's general style.

use std::fmt;

/// Failure classification for an LLM transport round-trip (C8).
#[derive(Debug)]
pub enum TransportError {
    /// The request exceeded its configured timeout before a response arrived.
    Timeout,
    /// A transient failure (429, 5xx, connection reset) worth retrying.
    Retryable(String),
    /// A failure the retry loop should not keep hammering (4xx other than
    /// 429, malformed request, auth failure).
    Fatal(String),
    /// The caller's cancellation signal fired before completion.
    Cancelled,
    /// The response body could not be parsed into a usable fix.
    Malformed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Retryable(msg) => write!(f, "retryable transport error: {msg}"),
            TransportError::Fatal(msg) => write!(f, "fatal transport error: {msg}"),
            TransportError::Cancelled => write!(f, "request cancelled"),
            TransportError::Malformed(msg) => write!(f, "malformed response: {msg}"),
        }
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Retryable(_) | TransportError::Timeout)
    }
}

/// Failure classification for applying a patch to disk (C9).
#[derive(Debug)]
pub enum PatchError {
    /// The target path escapes the configured root directory.
    PathUnsafe(String),
    /// The file on disk no longer matches the lines the fix expects to
    /// replace.
    ContentMismatch(String),
    /// The file's content hash changed between context capture and apply.
    StaleFile(String),
    /// Any other I/O failure (permissions, missing file, disk full).
    Io(String),
}

impl fmt::Display for PatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchError::PathUnsafe(msg) => write!(f, "unsafe path: {msg}"),
            PatchError::ContentMismatch(msg) => write!(f, "content mismatch: {msg}"),
            PatchError::StaleFile(msg) => write!(f, "stale file: {msg}"),
            PatchError::Io(msg) => write!(f, "io failure: {msg}"),
        }
    }
}

impl std::error::Error for PatchError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_retryable_classification() {
        assert!(TransportError::Timeout.is_retryable());
        assert!(TransportError::Retryable("429".into()).is_retryable());
        assert!(!TransportError::Fatal("400".into()).is_retryable());
        assert!(!TransportError::Cancelled.is_retryable());
    }

    #[test]
    fn test_patch_error_display() {
        let err = PatchError::PathUnsafe("../etc/passwd".into());
        assert_eq!(err.to_string(), "unsafe path: ../etc/passwd");
    }
}
