//! Layered configuration: config file, then `SCRIBE__*` environment
//! variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use zeroize::Zeroizing;

use scribe_core::network::NetworkParams;
use scribe_rpc::RpcConfig;
use scribe_rpc::config::DEFAULT_TIMEOUT;
use scribe_wallet::EmbedConfig;

/// `~/.config/scribe/config.toml` or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("scribe").join("config.toml"))
}

/// Load the embedding configuration.
///
/// An explicit `path` must exist; the default path is optional.
pub fn load_embed_config(path: Option<&Path>) -> Result<EmbedConfig> {
    let mut builder = Config::builder();
    match path {
        Some(p) => builder = builder.add_source(File::from(p).required(true)),
        None => {
            if let Some(p) = default_config_path() {
                builder = builder.add_source(File::from(p).required(false));
            }
        }
    }
    builder = builder.add_source(
        Environment::with_prefix("SCRIBE")
            .separator("__")
            .try_parsing(true),
    );

    builder
        .build()
        .context("Failed to read configuration")?
        .try_deserialize()
        .context("Invalid configuration")
}

/// Command-line settings that win over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub chunk_size: Option<usize>,
    /// `Some(false)` turns off encoding enabled in the config file.
    pub address_encoding: Option<bool>,
    pub network: Option<String>,
}

pub fn apply_overrides(config: &mut EmbedConfig, overrides: &Overrides) -> Result<()> {
    if let Some(size) = overrides.chunk_size {
        config.chunk_size = size;
    }
    if let Some(enabled) = overrides.address_encoding {
        config.use_address_encoding = enabled;
    }
    if let Some(name) = &overrides.network {
        match NetworkParams::from_name(name) {
            Some(net) => config.network = net,
            None => bail!("Unknown network {name:?}"),
        }
    }
    Ok(())
}

/// Resolve node credentials from flags, then `SCRIBE_RPC_*` variables,
/// prompting for the password as a last resort.
pub fn rpc_config(
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
) -> Result<RpcConfig> {
    let url = url
        .or_else(|| std::env::var("SCRIBE_RPC_URL").ok())
        .context("Node URL required: pass --rpc-url or set SCRIBE_RPC_URL")?;
    let user = user
        .or_else(|| std::env::var("SCRIBE_RPC_USER").ok())
        .context("RPC user required: pass --rpc-user or set SCRIBE_RPC_USER")?;
    let password = match password.or_else(|| std::env::var("SCRIBE_RPC_PASSWORD").ok()) {
        Some(p) => Zeroizing::new(p),
        None => prompt_password("RPC password")?,
    };
    Ok(RpcConfig {
        url,
        user,
        password,
        timeout: DEFAULT_TIMEOUT,
    })
}

fn prompt_password(prompt: &str) -> Result<Zeroizing<String>> {
    rpassword::prompt_password(format!("{}: ", prompt))
        .map(Zeroizing::new)
        .context("Failed to read password")
}
