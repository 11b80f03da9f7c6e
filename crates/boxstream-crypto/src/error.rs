use thiserror::Error;

pub type BoxStreamResult<T> = Result<T, BoxStreamError>;

#[derive(Debug, Error)]
pub enum BoxStreamError {
    #[error(
        "key material must be a 56-byte secret or a 32-byte key with a 24-byte nonce \
         (got {key_len}-byte key, nonce {nonce_len:?})"
    )]
    InvalidKeyMaterial {
        key_len: usize,
        nonce_len: Option<usize>,
    },

    #[error("key material is not valid base64: {0}")]
    InvalidKeyEncoding(#[from] base64::DecodeError),

    #[error("cannot split into zero (or smaller) length buffers")]
    InvalidSplitSize,

    #[error("box-stream session has already ended")]
    SessionEnded,

    #[error("unexpected hangup")]
    UnexpectedHangup,

    #[error("stream truncated: expected {expected} bytes, got {received}")]
    Truncated { expected: usize, received: usize },

    #[error("invalid header")]
    InvalidHeader,

    #[error("invalid packet")]
    InvalidPacket,

    #[error("aborted: {0}")]
    Aborted(String),

    #[error("cipher failure: {0}")]
    Cipher(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BoxStreamError {
    /// True for authentication failures on a sealed record.
    pub fn is_tamper(&self) -> bool {
        matches!(self, Self::InvalidHeader | Self::InvalidPacket)
    }

    /// True when the transport closed before a record was complete.
    pub fn is_truncation(&self) -> bool {
        matches!(self, Self::UnexpectedHangup | Self::Truncated { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_wire_diagnostics() {
        assert_eq!(BoxStreamError::UnexpectedHangup.to_string(), "unexpected hangup");
        assert_eq!(BoxStreamError::InvalidHeader.to_string(), "invalid header");
        assert_eq!(BoxStreamError::InvalidPacket.to_string(), "invalid packet");
        assert_eq!(
            BoxStreamError::Aborted("intentional".into()).to_string(),
            "aborted: intentional"
        );
    }

    #[test]
    fn classification() {
        assert!(BoxStreamError::InvalidPacket.is_tamper());
        assert!(!BoxStreamError::InvalidPacket.is_truncation());
        assert!(BoxStreamError::Truncated {
            expected: 34,
            received: 3
        }
        .is_truncation());
        assert!(!BoxStreamError::SessionEnded.is_tamper());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<BoxStreamError>();
    }
}
