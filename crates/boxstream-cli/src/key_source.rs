//! Resolve the box-stream secret from flags, config, or a passphrase.
//!
//! Precedence: `--key-file` > `[key].secret_file` > `--label` > `[key].label`
//! > `BOXSTREAM_PASSPHRASE` with `[key].kdf_salt`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use boxstream_core::config::KeyConfig;
use boxstream_core::expand_tilde;
use boxstream_crypto::{derive_from_passphrase, KdfParams, KeyMaterial};

/// Key-related command-line overrides.
#[derive(Debug, Default, Clone, clap::Args)]
pub struct KeyArgs {
    /// File holding a base64 56-byte secret (see `boxstream keygen`)
    #[arg(long, short = 'k', global = true)]
    pub key_file: Option<PathBuf>,

    /// Derive the secret from a label (SHA-512). Not secret; tests and demos only.
    #[arg(long, global = true)]
    pub label: Option<String>,
}

pub fn resolve(
    args: &KeyArgs,
    config: &KeyConfig,
    passphrase: Option<SecretString>,
) -> Result<KeyMaterial> {
    if let Some(path) = args.key_file.as_deref().or(config.secret_file.as_deref()) {
        debug!(path = %path.display(), "loading secret from file");
        return read_secret_file(path);
    }

    if let Some(label) = args.label.as_deref().or(config.label.as_deref()) {
        warn!("using label-derived key material; labels are not secret");
        return Ok(KeyMaterial::from_label(label));
    }

    if let Some(passphrase) = passphrase {
        let salt = config
            .salt()?
            .context("BOXSTREAM_PASSPHRASE is set but key.kdf_salt is missing from the config")?;
        let params = KdfParams {
            mem_cost_kib: config.argon2_mem_cost_kib,
            time_cost: config.argon2_time_cost,
            parallelism: config.argon2_parallelism,
        };
        debug!("deriving secret from passphrase (Argon2id)");
        return derive_from_passphrase(&passphrase, &salt, &params)
            .context("deriving key from passphrase");
    }

    anyhow::bail!(
        "no key material configured\n\
         Use --key-file, --label, set key.secret_file or key.label in the config,\n\
         or export BOXSTREAM_PASSPHRASE with key.kdf_salt set."
    )
}

pub fn read_secret_file(path: &Path) -> Result<KeyMaterial> {
    let path = expand_tilde(path);
    let encoded = std::fs::read_to_string(&path)
        .with_context(|| format!("reading secret file: {}", path.display()))?;
    KeyMaterial::from_base64(&encoded)
        .with_context(|| format!("parsing secret file: {}", path.display()))
}
