use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Default location of the config file
pub const DEFAULT_CONFIG_PATH: &str = "~/.config/boxstream/config.toml";

/// Top-level configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BoxStreamConfig {
    pub log: LogConfig,
    pub key: KeyConfig,
    pub stream: StreamConfig,
    pub net: NetConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level or EnvFilter directive (default: info)
    pub level: String,
    /// Log format: "text" or "json"
    pub format: LogFormat,
}

/// Where the box-stream secret comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// File holding a base64 56-byte secret
    pub secret_file: Option<PathBuf>,
    /// Derive the secret from a label (SHA-512). For tests and demos only.
    pub label: Option<String>,
    /// Base64 16-byte salt for passphrase derivation
    pub kdf_salt: Option<String>,
    /// Argon2id memory cost in KiB (default: 65536 = 64 MiB)
    pub argon2_mem_cost_kib: u32,
    /// Argon2id time cost (iterations, default: 3)
    pub argon2_time_cost: u32,
    /// Argon2id parallelism (default: 4)
    pub argon2_parallelism: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Cipher suite: "xsalsa20poly1305" or "xchacha20poly1305"
    pub suite: String,
    /// Bytes read from the input per encoded chunk (default: 65536)
    pub read_buffer: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetConfig {
    /// Address `serve` binds to
    pub listen: String,
    /// Address `connect` dials
    pub connect: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: LogFormat::Text,
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            secret_file: None,
            label: None,
            kdf_salt: None,
            argon2_mem_cost_kib: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            suite: "xsalsa20poly1305".into(),
            read_buffer: 64 * 1024,
        }
    }
}

impl Default for NetConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:3000".into(),
            connect: "127.0.0.1:3000".into(),
        }
    }
}

impl KeyConfig {
    /// Decoded `kdf_salt`, if set.
    pub fn salt(&self) -> CoreResult<Option<[u8; 16]>> {
        let Some(encoded) = &self.kdf_salt else {
            return Ok(None);
        };
        let raw = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| CoreError::Config(format!("key.kdf_salt is not base64: {e}")))?;
        let salt: [u8; 16] = raw.as_slice().try_into().map_err(|_| {
            CoreError::Config(format!("key.kdf_salt must be 16 bytes, got {}", raw.len()))
        })?;
        Ok(Some(salt))
    }
}

impl BoxStreamConfig {
    /// Reject values that parse but cannot be used.
    pub fn validate(&self) -> CoreResult<()> {
        if self.stream.read_buffer == 0 {
            return Err(CoreError::Config("stream.read_buffer must be > 0".into()));
        }
        if self.key.argon2_time_cost == 0 || self.key.argon2_parallelism == 0 {
            return Err(CoreError::Config(
                "key.argon2_time_cost and key.argon2_parallelism must be > 0".into(),
            ));
        }
        self.key.salt()?;
        Ok(())
    }
}

/// Expand `~` in path to the user's home directory
pub fn expand_tilde(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match std::env::var_os("HOME") {
            Some(home) => PathBuf::from(home).join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}

/// Load and validate the config at `path`; a missing file yields defaults.
///
/// Runs before logging is configured, so callers report the missing file.
pub fn load_config(path: &Path) -> CoreResult<BoxStreamConfig> {
    let path = expand_tilde(path);
    let config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        toml::from_str(&content)?
    } else {
        BoxStreamConfig::default()
    };
    config.validate()?;
    Ok(config)
}
