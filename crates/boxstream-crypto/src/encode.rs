//! Encode engine: plaintext chunks → header/body record pairs
//!
//! For every piece (≤ [`MAX_CHUNK_SIZE`]) of every non-empty chunk:
//! ```text
//! body_nonce   = body counter + 1            (seed+1, seed+3, ...)
//! body         = seal(piece, body_nonce)     → tag, ciphertext
//! header       = seal(len_be16 || tag, header counter)   (seed, seed+2, ...)
//! emit header (34 bytes), then ciphertext (len bytes)
//! header counter += 2, body counter += 1
//! ```
//! [`BoxStreamEncoder::finish`] seals 18 zero bytes under the next header
//! nonce as the terminal record. An aborted session never emits one.

use bytes::Bytes;
use tracing::{debug, trace};

use crate::cipher::{Cipher, CipherSuite, SecretBox};
use crate::error::{BoxStreamError, BoxStreamResult};
use crate::keys::KeyMaterial;
use crate::nonce::NonceCursor;
use crate::split::split;
use crate::{NonceBytes, HEADER_PLAIN_SIZE, MAX_CHUNK_SIZE};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EncodeState {
    Open,
    Finished,
    Aborted,
}

/// Stateful encoder for one direction of a box-stream session.
pub struct BoxStreamEncoder<C: SecretBox = Cipher> {
    cipher: C,
    header_nonce: NonceCursor,
    body_nonce: NonceCursor,
    state: EncodeState,
    pieces: u64,
}

impl BoxStreamEncoder {
    /// Encoder using the default suite (XSalsa20-Poly1305).
    pub fn new(material: &KeyMaterial) -> Self {
        Self::with_suite(material, CipherSuite::default())
    }

    pub fn with_suite(material: &KeyMaterial, suite: CipherSuite) -> Self {
        Self::with_cipher(Cipher::new(suite, material.key()), *material.nonce())
    }
}

impl<C: SecretBox> BoxStreamEncoder<C> {
    /// Encoder over an already-keyed cipher, seeded with `nonce`.
    pub fn with_cipher(cipher: C, nonce: NonceBytes) -> Self {
        Self {
            cipher,
            header_nonce: NonceCursor::new(nonce),
            body_nonce: NonceCursor::new(nonce),
            state: EncodeState::Open,
            pieces: 0,
        }
    }

    /// Encode one plaintext chunk, returning its records in wire order.
    ///
    /// A zero-length chunk produces no records.
    pub fn encode(&mut self, chunk: &[u8]) -> BoxStreamResult<Vec<Bytes>> {
        self.ensure_open()?;

        if chunk.is_empty() {
            return Ok(Vec::new());
        }

        let pieces = split(chunk, MAX_CHUNK_SIZE)?;
        let mut records = Vec::with_capacity(pieces.len() * 2);
        for piece in pieces {
            if let Err(e) = self.seal_piece(piece, &mut records) {
                // nonce counters may have diverged; never seal under them again
                self.state = EncodeState::Aborted;
                return Err(e);
            }
        }
        Ok(records)
    }

    /// Encode the UTF-8 bytes of `text`.
    ///
    /// Emptiness is judged on the encoded byte length.
    pub fn encode_str(&mut self, text: &str) -> BoxStreamResult<Vec<Bytes>> {
        self.encode(text.as_bytes())
    }

    /// End the session gracefully, returning the terminal record.
    pub fn finish(&mut self) -> BoxStreamResult<Bytes> {
        self.ensure_open()?;

        let terminal = self
            .cipher
            .seal(self.header_nonce.peek(), &[0u8; HEADER_PLAIN_SIZE])?;
        self.state = EncodeState::Finished;
        debug!(pieces = self.pieces, "box-stream encoder finished");
        Ok(Bytes::from(terminal))
    }

    /// End the session without a terminal record.
    pub fn abort(&mut self) {
        if self.state == EncodeState::Open {
            debug!(pieces = self.pieces, "box-stream encoder aborted");
            self.state = EncodeState::Aborted;
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == EncodeState::Open
    }

    /// Number of header/body pairs emitted so far.
    pub fn pieces(&self) -> u64 {
        self.pieces
    }

    fn ensure_open(&self) -> BoxStreamResult<()> {
        match self.state {
            EncodeState::Open => Ok(()),
            EncodeState::Finished | EncodeState::Aborted => Err(BoxStreamError::SessionEnded),
        }
    }

    fn seal_piece(&mut self, piece: &[u8], records: &mut Vec<Bytes>) -> BoxStreamResult<()> {
        let body_nonce = self.body_nonce.consume_next();
        let mut body = piece.to_vec();
        let tag = self.cipher.seal_in_place_detached(&body_nonce, &mut body)?;

        // split() caps pieces at MAX_CHUNK_SIZE, well inside u16
        let len = piece.len() as u16;
        let mut header = [0u8; HEADER_PLAIN_SIZE];
        header[..2].copy_from_slice(&len.to_be_bytes());
        header[2..].copy_from_slice(&tag);
        let sealed_header = self.cipher.seal(self.header_nonce.peek(), &header)?;

        records.push(Bytes::from(sealed_header));
        records.push(Bytes::from(body));

        self.header_nonce.advance();
        self.header_nonce.advance();
        self.body_nonce.advance();
        self.pieces += 1;

        trace!(len, "sealed record pair");
        Ok(())
    }
}

impl<C: SecretBox> std::fmt::Debug for BoxStreamEncoder<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxStreamEncoder")
            .field("state", &self.state)
            .field("pieces", &self.pieces)
            .finish_non_exhaustive()
    }
}

/// Encode `chunks` into a complete stream, terminal record included.
pub fn encode_all<I, T>(material: &KeyMaterial, chunks: I) -> BoxStreamResult<Vec<u8>>
where
    I: IntoIterator<Item = T>,
    T: AsRef<[u8]>,
{
    let mut encoder = BoxStreamEncoder::new(material);
    let mut out = Vec::new();
    for chunk in chunks {
        for record in encoder.encode(chunk.as_ref())? {
            out.extend_from_slice(&record);
        }
    }
    out.extend_from_slice(&encoder.finish()?);
    Ok(out)
}
