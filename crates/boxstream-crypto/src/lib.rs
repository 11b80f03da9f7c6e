//! boxstream-crypto: streaming authenticated encryption ("box-stream")
//!
//! Turns a sequence of plaintext chunks into independently-decryptable,
//! tamper-evident, order-sensitive records, and back again.
//!
//! Wire format:
//! ```text
//! stream     := (header body)* terminator
//! header     := seal(len:u16-BE ++ body_tag:16B, header_nonce)   34 bytes
//! body       := ciphertext of the chunk, tag stripped             len bytes
//! terminator := seal(0u8 x 18, header_nonce)                      34 bytes
//! ```
//!
//! Nonce schedule (one 24-byte big-endian counter seeded from the key material):
//! headers use seed, seed+2, seed+4, ... and bodies use seed+1, seed+3, ...
//!
//! Chunks larger than [`MAX_CHUNK_SIZE`] are split transparently.

pub mod cipher;
pub mod decode;
pub mod encode;
pub mod error;
pub mod io;
pub mod kdf;
pub mod keys;
pub mod nonce;
pub mod reader;
pub mod split;

pub use cipher::{Cipher, CipherSuite, SecretBox};
pub use decode::{BoxStreamDecoder, DecodeState, EndReason};
pub use encode::{encode_all, BoxStreamEncoder};
pub use error::{BoxStreamError, BoxStreamResult};
pub use io::BoxStreamWriter;
pub use kdf::{derive_from_passphrase, KdfParams};
pub use keys::{Direction, KeyMaterial};
pub use nonce::{increment, NonceCursor};
pub use reader::{AbortHandle, Exact, ExactReader};
pub use split::split;

/// Size of a secret-box key (256-bit)
pub const KEY_SIZE: usize = 32;

/// Size of a secret-box nonce (192-bit)
pub const NONCE_SIZE: usize = 24;

/// Size of a Poly1305 authentication tag
pub const TAG_SIZE: usize = 16;

/// Size of a combined secret: key followed by the initial nonce
pub const SECRET_SIZE: usize = KEY_SIZE + NONCE_SIZE;

/// Plaintext header: 2-byte big-endian length followed by the body tag
pub const HEADER_PLAIN_SIZE: usize = 2 + TAG_SIZE;

/// Sealed header as it appears on the wire
pub const HEADER_SIZE: usize = HEADER_PLAIN_SIZE + TAG_SIZE;

/// Largest plaintext carried by a single body record
pub const MAX_CHUNK_SIZE: usize = 4 * 1024;

/// Raw nonce bytes
pub type NonceBytes = [u8; NONCE_SIZE];

/// Raw authentication tag bytes
pub type TagBytes = [u8; TAG_SIZE];
