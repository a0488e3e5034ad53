//! Feedback tokens.
//!
//! The receiver answers every frame attempt with one raw, unframed token.
//! `OK` accepts the frame; `RETRY` asks the sender to transmit it again.

/// Token acknowledging a frame.
pub const OK: &[u8] = b"OK";

/// Token rejecting a frame.
pub const RETRY: &[u8] = b"RETRY";

/// A feedback token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feedback {
    Ok,
    Retry,
}

/// Classification of bytes read back while waiting for a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenMatch {
    /// The bytes are exactly one token.
    Complete(Feedback),
    /// The bytes are a proper prefix of a token; keep reading.
    Partial,
    /// The bytes can no longer become a token.
    Unrecognized,
}

impl Feedback {
    pub fn as_bytes(self) -> &'static [u8] {
        match self {
            Feedback::Ok => OK,
            Feedback::Retry => RETRY,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Feedback::Ok => "OK",
            Feedback::Retry => "RETRY",
        }
    }

    /// Exact token match.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        match bytes {
            OK => Some(Feedback::Ok),
            RETRY => Some(Feedback::Retry),
            _ => None,
        }
    }

    /// Classify an accumulated read.
    pub fn classify(bytes: &[u8]) -> TokenMatch {
        if let Some(token) = Self::from_bytes(bytes) {
            return TokenMatch::Complete(token);
        }
        if OK.starts_with(bytes) || RETRY.starts_with(bytes) {
            return TokenMatch::Partial;
        }
        TokenMatch::Unrecognized
    }
}

impl std::fmt::Display for Feedback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_roundtrip() {
        assert_eq!(Feedback::from_bytes(b"OK"), Some(Feedback::Ok));
        assert_eq!(Feedback::from_bytes(b"RETRY"), Some(Feedback::Retry));
        assert_eq!(Feedback::Ok.as_bytes(), b"OK");
        assert_eq!(Feedback::Retry.to_string(), "RETRY");
    }

    #[test]
    fn near_misses_are_not_tokens() {
        assert_eq!(Feedback::from_bytes(b"ok"), None);
        assert_eq!(Feedback::from_bytes(b"OK\n"), None);
        assert_eq!(Feedback::from_bytes(b"RETR"), None);
    }

    #[test]
    fn classify_partial_reads() {
        assert_eq!(Feedback::classify(b""), TokenMatch::Partial);
        assert_eq!(Feedback::classify(b"O"), TokenMatch::Partial);
        assert_eq!(Feedback::classify(b"RET"), TokenMatch::Partial);
        assert_eq!(
            Feedback::classify(b"RETRY"),
            TokenMatch::Complete(Feedback::Retry)
        );
    }

    #[test]
    fn classify_garbage() {
        assert_eq!(Feedback::classify(b"X"), TokenMatch::Unrecognized);
        assert_eq!(Feedback::classify(b"OKAY"), TokenMatch::Unrecognized);
        assert_eq!(Feedback::classify(b"RETRYRETRY"), TokenMatch::Unrecognized);
    }
}
