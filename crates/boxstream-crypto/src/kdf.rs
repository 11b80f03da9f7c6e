//! Key derivation: Argon2id passphrase → 56-byte box-stream secret

use argon2::{Algorithm, Argon2, Params, Version};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroize;

use crate::error::{BoxStreamError, BoxStreamResult};
use crate::keys::KeyMaterial;
use crate::SECRET_SIZE;

/// Argon2id parameters for KDF
#[derive(Debug, Clone)]
pub struct KdfParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub mem_cost_kib: u32,
    /// Time cost / iterations (default: 3)
    pub time_cost: u32,
    /// Parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            mem_cost_kib: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Derive key material (key + initial nonce) from a passphrase and salt using Argon2id.
///
/// Both ends of a direction must use the same passphrase, salt and params.
pub fn derive_from_passphrase(
    passphrase: &SecretString,
    salt: &[u8; 16],
    params: &KdfParams,
) -> BoxStreamResult<KeyMaterial> {
    let argon2_params = Params::new(
        params.mem_cost_kib,
        params.time_cost,
        params.parallelism,
        Some(SECRET_SIZE),
    )
    .map_err(|e| BoxStreamError::Cipher(format!("invalid Argon2id params: {e}")))?;

    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut secret = [0u8; SECRET_SIZE];
    argon2
        .hash_password_into(passphrase.expose_secret().as_bytes(), salt, &mut secret)
        .map_err(|e| BoxStreamError::Cipher(format!("Argon2id KDF failed: {e}")))?;

    let material = KeyMaterial::from_secret(&secret);
    secret.zeroize();
    material
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams {
            mem_cost_kib: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }

    #[test]
    fn test_kdf_deterministic() {
        let passphrase = SecretString::from("test-passphrase-123");
        let salt = [1u8; 16];

        let a = derive_from_passphrase(&passphrase, &salt, &fast_params()).unwrap();
        let b = derive_from_passphrase(&passphrase, &salt, &fast_params()).unwrap();

        assert_eq!(a.to_secret(), b.to_secret(), "KDF must be deterministic");
    }

    #[test]
    fn test_kdf_different_passphrases() {
        let salt = [1u8; 16];

        let a = derive_from_passphrase(&SecretString::from("passphrase-a"), &salt, &fast_params())
            .unwrap();
        let b = derive_from_passphrase(&SecretString::from("passphrase-b"), &salt, &fast_params())
            .unwrap();

        assert_ne!(a.to_secret(), b.to_secret());
    }

    #[test]
    fn test_kdf_different_salts() {
        let passphrase = SecretString::from("same-passphrase");

        let a = derive_from_passphrase(&passphrase, &[1u8; 16], &fast_params()).unwrap();
        let b = derive_from_passphrase(&passphrase, &[2u8; 16], &fast_params()).unwrap();

        assert_ne!(a.to_secret(), b.to_secret());
    }

    #[test]
    fn test_kdf_rejects_bad_params() {
        let params = KdfParams {
            mem_cost_kib: 1,
            time_cost: 0,
            parallelism: 0,
        };
        let result = derive_from_passphrase(&SecretString::from("x"), &[0u8; 16], &params);
        assert!(result.is_err());
    }
}
