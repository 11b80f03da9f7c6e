//! boxstream: streaming authenticated encryption from the command line
//!
//! Commands:
//!   keygen [--out FILE]     - generate a random 56-byte secret (base64)
//!   seal                    - encrypt stdin to stdout as a box-stream
//!   open                    - decrypt a box-stream from stdin to stdout
//!   serve [--listen ADDR]   - duplex JSON-lines demo, accepting side
//!   connect [--addr ADDR]   - duplex JSON-lines demo, dialing side
//!   config show             - display current configuration

mod key_source;
mod lines;
mod net;
mod pipe;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use secrecy::SecretString;
use serde_json::Value;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use boxstream_core::config::{BoxStreamConfig, DEFAULT_CONFIG_PATH};
use boxstream_core::{expand_tilde, load_config};
use boxstream_crypto::{CipherSuite, KeyMaterial};

use crate::key_source::KeyArgs;

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "boxstream",
    version,
    about = "Streaming authenticated encryption",
    long_about = "boxstream: seal and open box-streams, chunked, order-sensitive \
                  authenticated encryption over byte streams"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "BOXSTREAM_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides [log].level
    #[arg(long, env = "BOXSTREAM_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides [log].format
    #[arg(long, env = "BOXSTREAM_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    /// Cipher suite (xsalsa20poly1305, xchacha20poly1305); overrides [stream].suite
    #[arg(long, global = true)]
    suite: Option<String>,

    #[command(flatten)]
    key: KeyArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate a random secret (32-byte key + 24-byte nonce, base64)
    Keygen {
        /// Write the secret here (mode 0600) instead of stdout
        #[arg(long, short = 'o')]
        out: Option<PathBuf>,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Encrypt stdin to stdout
    Seal,

    /// Decrypt stdin to stdout; exits non-zero on tampering or truncation
    Open,

    /// Accept connections and exchange JSON values over box-streams
    Serve {
        /// Address to bind (default: [net].listen)
        #[arg(long, short = 'l')]
        listen: Option<String>,
        /// Values to send to each peer (JSON, or bare strings)
        #[arg(long = "send", default_values_t = ["a".to_string(), "b".to_string(), "c".to_string()])]
        send: Vec<String>,
        /// Exit after the first connection
        #[arg(long)]
        once: bool,
    },

    /// Connect to a server and exchange JSON values over box-streams
    Connect {
        /// Address to dial (default: [net].connect)
        #[arg(long, short = 'a')]
        addr: Option<String>,
        /// Values to send (JSON, or bare strings)
        #[arg(long = "send", default_values_t = ["1".to_string(), "2".to_string(), "3".to_string()])]
        send: Vec<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    init_logging(&cli, &config);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "boxstream starting"
    );
    if let Some(missing) = missing_config(&cli.config) {
        warn!("config file not found: {}  (using defaults)", missing.display());
    }

    match &cli.command {
        Commands::Keygen { out, force } => cmd_keygen(out.as_deref(), *force),
        Commands::Seal => {
            let (material, suite) = session_params(&cli, &config)?;
            pipe::seal(
                tokio::io::stdin(),
                tokio::io::stdout(),
                &material,
                suite,
                config.stream.read_buffer,
            )
            .await?;
            Ok(())
        }
        Commands::Open => {
            let (material, suite) = session_params(&cli, &config)?;
            pipe::open(tokio::io::stdin(), tokio::io::stdout(), &material, suite).await?;
            Ok(())
        }
        Commands::Serve { listen, send, once } => {
            let (material, suite) = session_params(&cli, &config)?;
            let addr = listen.as_deref().unwrap_or(&config.net.listen);
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            net::serve(listener, material, suite, parse_values(send), *once).await
        }
        Commands::Connect { addr, send } => {
            let (material, suite) = session_params(&cli, &config)?;
            let addr = addr.as_deref().unwrap_or(&config.net.connect);
            let received = net::connect(addr, &material, suite, &parse_values(send))
                .await
                .with_context(|| format!("session with {addr}"))?;
            net::report("client", &received)
        }
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(cli: &Cli, config: &BoxStreamConfig) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = cli.log.as_deref().unwrap_or(&config.log.level);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = match cli.log_format {
        Some(LogFormat::Json) => true,
        Some(LogFormat::Text) => false,
        None => config.log.format == boxstream_core::LogFormat::Json,
    };

    // stdout carries stream data; logs always go to stderr
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

/// The resolved config path, if no file exists there.
fn missing_config(path: &Path) -> Option<PathBuf> {
    let resolved = expand_tilde(path);
    (!resolved.exists()).then_some(resolved)
}

/// Key material and cipher suite for a session, from flags and config.
fn session_params(cli: &Cli, config: &BoxStreamConfig) -> Result<(KeyMaterial, CipherSuite)> {
    let suite_name = cli.suite.as_deref().unwrap_or(&config.stream.suite);
    let suite: CipherSuite = suite_name.parse().map_err(anyhow::Error::msg)?;

    let passphrase = std::env::var("BOXSTREAM_PASSPHRASE")
        .ok()
        .map(SecretString::from);
    let material = key_source::resolve(&cli.key, &config.key, passphrase)?;
    Ok((material, suite))
}

/// Each argument as JSON if it parses, otherwise as a plain string.
fn parse_values(args: &[String]) -> Vec<Value> {
    args.iter()
        .map(|arg| serde_json::from_str(arg).unwrap_or_else(|_| Value::String(arg.clone())))
        .collect()
}

// ── `boxstream keygen` ────────────────────────────────────────────────────────

fn cmd_keygen(out: Option<&Path>, force: bool) -> Result<()> {
    let encoded = KeyMaterial::generate().to_base64();

    let Some(path) = out else {
        println!("{encoded}");
        return Ok(());
    };

    let path = expand_tilde(path);
    if path.exists() && !force {
        anyhow::bail!(
            "refusing to overwrite {} (use --force)",
            path.display()
        );
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating directory: {}", parent.display()))?;
    }

    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options
        .open(&path)
        .with_context(|| format!("creating secret file: {}", path.display()))?;
    writeln!(file, "{encoded}")
        .with_context(|| format!("writing secret file: {}", path.display()))?;

    info!(path = %path.display(), "secret written");
    eprintln!("wrote {}", path.display());
    Ok(())
}

// ── `boxstream config show` ───────────────────────────────────────────────────

fn cmd_config_show(config: &BoxStreamConfig, config_path: &Path) -> Result<()> {
    let resolved = expand_tilde(config_path);
    if resolved.exists() {
        println!("# Configuration from: {}", resolved.display());
    } else {
        println!(
            "# Configuration: defaults (no file at {})",
            resolved.display()
        );
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}
