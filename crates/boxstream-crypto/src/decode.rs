//! Decode engine: byte stream → plaintext chunks
//!
//! State machine (one live nonce counter, stepped in lockstep with the encoder):
//! ```text
//! Reading:
//!   read 34 bytes        clean close        → Ended(Failed)    UnexpectedHangup
//!                        partial / error    → Ended(Failed)    Truncated / Io
//!   open(counter)        fails              → Ended(Failed)    InvalidHeader
//!                        all zeros          → Ended(Terminated)
//!   counter += 1; read len bytes
//!                        close / error      → Ended(Failed)    Truncated / Io
//!   open_detached(tag, body, counter)
//!                        fails              → Ended(Failed)    InvalidPacket
//!   counter += 1; yield chunk              → Reading
//! ```
//! An abort at any point moves to `Ended(Aborted)` and every later call
//! reports the abort reason.

use bytes::Bytes;
use futures::Stream;
use tokio::io::AsyncRead;
use tracing::{debug, trace, warn};

use crate::cipher::{Cipher, CipherSuite, SecretBox};
use crate::error::{BoxStreamError, BoxStreamResult};
use crate::keys::KeyMaterial;
use crate::nonce::NonceCursor;
use crate::reader::{AbortHandle, Exact, ExactReader};
use crate::{NonceBytes, HEADER_PLAIN_SIZE, HEADER_SIZE, TAG_SIZE};

/// Why a decode session stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndReason {
    /// Terminal record observed
    Terminated,
    /// Fatal transport or authentication failure, already reported
    Failed,
    /// Caller-initiated cancellation
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeState {
    /// Awaiting the next header
    Reading,
    Ended(EndReason),
}

/// Stateful decoder for one direction of a box-stream session.
pub struct BoxStreamDecoder<R, C: SecretBox = Cipher> {
    reader: ExactReader<R>,
    cipher: C,
    nonce: NonceCursor,
    state: DecodeState,
    chunks: u64,
}

impl<R: AsyncRead + Unpin> BoxStreamDecoder<R> {
    /// Decoder using the default suite (XSalsa20-Poly1305).
    pub fn new(inner: R, material: &KeyMaterial) -> Self {
        Self::with_suite(inner, material, CipherSuite::default())
    }

    pub fn with_suite(inner: R, material: &KeyMaterial, suite: CipherSuite) -> Self {
        Self::with_cipher(inner, Cipher::new(suite, material.key()), *material.nonce())
    }
}

impl<R: AsyncRead + Unpin, C: SecretBox> BoxStreamDecoder<R, C> {
    /// Decoder over an already-keyed cipher, seeded with `nonce`.
    pub fn with_cipher(inner: R, cipher: C, nonce: NonceBytes) -> Self {
        Self {
            reader: ExactReader::new(inner),
            cipher,
            nonce: NonceCursor::new(nonce),
            state: DecodeState::Reading,
            chunks: 0,
        }
    }

    pub fn state(&self) -> &DecodeState {
        &self.state
    }

    /// Give back the transport. Bytes already buffered are discarded.
    pub fn into_inner(self) -> R {
        self.reader.into_inner()
    }

    /// Number of chunks yielded so far.
    pub fn chunks(&self) -> u64 {
        self.chunks
    }

    /// Handle for cancelling this decoder from another task.
    pub fn abort_handle(&self) -> AbortHandle {
        self.reader.abort_handle()
    }

    /// Cancel the session; pending and future reads report `reason`.
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.reader.abort(reason.clone());
        if let Some(reason) = self.reader.abort_reason() {
            self.state = DecodeState::Ended(EndReason::Aborted(reason));
        }
    }

    /// Next plaintext chunk, `Ok(None)` after the terminal record.
    ///
    /// A fatal error is returned once; later calls fail with `SessionEnded`.
    pub async fn next_chunk(&mut self) -> BoxStreamResult<Option<Bytes>> {
        if let Some(reason) = self.reader.abort_reason() {
            self.state = DecodeState::Ended(EndReason::Aborted(reason.clone()));
            return Err(BoxStreamError::Aborted(reason));
        }

        match self.state {
            DecodeState::Reading => {}
            DecodeState::Ended(EndReason::Terminated) => return Ok(None),
            DecodeState::Ended(_) => return Err(BoxStreamError::SessionEnded),
        }

        match self.read_record().await {
            Ok(Some(chunk)) => {
                self.chunks += 1;
                Ok(Some(chunk))
            }
            Ok(None) => {
                debug!(chunks = self.chunks, "box-stream terminated cleanly");
                self.state = DecodeState::Ended(EndReason::Terminated);
                Ok(None)
            }
            Err(err) => {
                warn!(chunks = self.chunks, error = %err, "box-stream decode failed");
                self.state = DecodeState::Ended(match &err {
                    BoxStreamError::Aborted(reason) => EndReason::Aborted(reason.clone()),
                    _ => EndReason::Failed,
                });
                Err(err)
            }
        }
    }

    /// Append every remaining chunk to `out`, returning the bytes added.
    ///
    /// On error, `out` still holds everything authenticated before the failure.
    pub async fn read_to_end(&mut self, out: &mut Vec<u8>) -> BoxStreamResult<usize> {
        let start = out.len();
        while let Some(chunk) = self.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }
        Ok(out.len() - start)
    }

    /// Consume the decoder as a stream that ends after the terminal record
    /// or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = BoxStreamResult<Bytes>> {
        futures::stream::unfold(Some(self), |decoder| async move {
            let mut decoder = decoder?;
            match decoder.next_chunk().await {
                Ok(Some(chunk)) => Some((Ok(chunk), Some(decoder))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    async fn read_record(&mut self) -> BoxStreamResult<Option<Bytes>> {
        let sealed_header = match self.reader.read_exact(HEADER_SIZE).await? {
            Exact::Filled(bytes) => bytes,
            Exact::Closed => return Err(BoxStreamError::UnexpectedHangup),
        };

        let header = self
            .cipher
            .open(self.nonce.peek(), &sealed_header)
            .map_err(|_| BoxStreamError::InvalidHeader)?;

        if header.iter().all(|&b| b == 0) {
            return Ok(None);
        }

        let len = u16::from_be_bytes([header[0], header[1]]) as usize;
        let mut tag = [0u8; TAG_SIZE];
        tag.copy_from_slice(&header[2..HEADER_PLAIN_SIZE]);

        let body_nonce = self.nonce.consume_next();
        let mut body = match self.reader.read_exact(len).await? {
            Exact::Filled(bytes) => bytes,
            Exact::Closed => {
                return Err(BoxStreamError::Truncated {
                    expected: len,
                    received: 0,
                })
            }
        };

        self.cipher
            .open_in_place_detached(&body_nonce, &mut body, &tag)
            .map_err(|_| BoxStreamError::InvalidPacket)?;

        self.nonce.advance();
        trace!(len, "opened record pair");
        Ok(Some(body.freeze()))
    }
}

impl<R, C: SecretBox> std::fmt::Debug for BoxStreamDecoder<R, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStreamDecoder")
            .field("state", &self.state)
            .field("chunks", &self.chunks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_all, BoxStreamEncoder};
    use crate::nonce::increment;

    fn material() -> KeyMaterial {
        KeyMaterial::from_label("decode tests")
    }

    #[tokio::test]
    async fn decodes_chunks_in_order() {
        let stream = encode_all(&material(), ["alpha", "beta", "gamma"]).unwrap();
        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());

        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), "alpha");
        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), "beta");
        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), "gamma");
        assert!(decoder.next_chunk().await.unwrap().is_none());
        assert_eq!(decoder.state(), &DecodeState::Ended(EndReason::Terminated));
        assert_eq!(decoder.chunks(), 3);
    }

    #[tokio::test]
    async fn clean_end_is_sticky() {
        let stream = encode_all(&material(), Vec::<&[u8]>::new()).unwrap();
        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(decoder.next_chunk().await.unwrap().is_none());
        assert!(decoder.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_terminal_record_is_hangup() {
        let mut stream = encode_all(&material(), ["only"]).unwrap();
        stream.truncate(stream.len() - HEADER_SIZE);

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert_eq!(decoder.next_chunk().await.unwrap().unwrap(), "only");
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::UnexpectedHangup)
        ));
        assert_eq!(decoder.state(), &DecodeState::Ended(EndReason::Failed));
    }

    #[tokio::test]
    async fn fatal_error_is_reported_once() {
        let mut stream = encode_all(&material(), ["payload"]).unwrap();
        stream[0] ^= 0x80;

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::InvalidHeader)
        ));
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::SessionEnded)
        ));
    }

    #[tokio::test]
    async fn tampered_body_is_invalid_packet() {
        let mut stream = encode_all(&material(), ["payload"]).unwrap();
        stream[HEADER_SIZE + 1] ^= 0x01;

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::InvalidPacket)
        ));
    }

    #[tokio::test]
    async fn body_cut_short_is_truncation() {
        let mut stream = encode_all(&material(), ["a longer payload"]).unwrap();
        stream.truncate(HEADER_SIZE + 4);

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::Truncated {
                expected: 16,
                received: 4
            })
        ));
    }

    #[tokio::test]
    async fn body_missing_entirely_is_truncation() {
        let mut stream = encode_all(&material(), ["payload"]).unwrap();
        stream.truncate(HEADER_SIZE);

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::Truncated {
                expected: 7,
                received: 0
            })
        ));
    }

    #[tokio::test]
    async fn wrong_key_fails_on_first_header() {
        let stream = encode_all(&material(), ["payload"]).unwrap();
        let other = KeyMaterial::from_label("someone else");
        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &other);
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::InvalidHeader)
        ));
    }

    #[tokio::test]
    async fn shifted_nonce_fails_on_first_header() {
        let material = material();
        let stream = encode_all(&material, ["payload"]).unwrap();

        let mut nonce = *material.nonce();
        increment(&mut nonce);
        let shifted = KeyMaterial::from_parts(material.key(), &nonce).unwrap();

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &shifted);
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::InvalidHeader)
        ));
    }

    #[tokio::test]
    async fn abort_before_reading() {
        let stream = encode_all(&material(), ["payload"]).unwrap();
        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        decoder.abort("caller gave up");

        match decoder.next_chunk().await {
            Err(BoxStreamError::Aborted(reason)) => assert_eq!(reason, "caller gave up"),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(
            decoder.state(),
            &DecodeState::Ended(EndReason::Aborted("caller gave up".into()))
        );
    }

    #[tokio::test]
    async fn abort_after_clean_end_still_reports_abort() {
        let stream = encode_all(&material(), Vec::<&[u8]>::new()).unwrap();
        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        assert!(decoder.next_chunk().await.unwrap().is_none());
        decoder.abort("late");
        assert!(matches!(
            decoder.next_chunk().await,
            Err(BoxStreamError::Aborted(_))
        ));
    }

    #[tokio::test]
    async fn read_to_end_keeps_partial_output() {
        let mut encoder = BoxStreamEncoder::new(&material());
        let mut stream = Vec::new();
        for record in encoder.encode(b"kept").unwrap() {
            stream.extend_from_slice(&record);
        }

        let mut decoder = BoxStreamDecoder::new(stream.as_slice(), &material());
        let mut out = Vec::new();
        let err = decoder.read_to_end(&mut out).await.unwrap_err();
        assert!(err.is_truncation());
        assert_eq!(out, b"kept");
    }

    #[tokio::test]
    async fn xchacha_suite_roundtrip() {
        let material = material();
        let mut encoder = BoxStreamEncoder::with_suite(&material, CipherSuite::XChaCha20Poly1305);
        let mut stream = Vec::new();
        for record in encoder.encode(b"other suite").unwrap() {
            stream.extend_from_slice(&record);
        }
        stream.extend_from_slice(&encoder.finish().unwrap());

        let mut decoder =
            BoxStreamDecoder::with_suite(stream.as_slice(), &material, CipherSuite::XChaCha20Poly1305);
        let mut out = Vec::new();
        decoder.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"other suite");

        // the default suite must refuse it
        let mut wrong = BoxStreamDecoder::new(stream.as_slice(), &material);
        assert!(matches!(
            wrong.next_chunk().await,
            Err(BoxStreamError::InvalidHeader)
        ));
    }
}
