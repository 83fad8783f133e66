//! Scribe command-line tool.
//!
//! Splits a message or a file into chunks, builds one transaction per chunk
//! funded from a single address, has the node sign each one and broadcasts
//! it before building the next.

mod settings;
mod submit;

use std::path::PathBuf;
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::{error, info};

use scribe_codec::{ChunkVariant, MessageContext};
use scribe_core::traits::LedgerClient;
use scribe_rpc::JsonRpcLedger;
use scribe_wallet::{DryRunLedger, EmbedRequest, embed};

use crate::settings::{Overrides, apply_overrides, load_embed_config, rpc_config};
use crate::submit::{RetryPolicy, sign_and_send};

/// Scribe: write messages and files into a UTXO ledger.
#[derive(Parser, Debug)]
#[command(name = "scribe", version, about = "Embed data into a UTXO ledger, one chunk per transaction")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(ClapArgs, Debug)]
struct GlobalOpts {
    /// Config file (default: <config dir>/scribe/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Funding address; receives all change (or set SCRIBE_ADDRESS)
    #[arg(long, global = true)]
    address: Option<String>,

    /// Node JSON-RPC URL (or set SCRIBE_RPC_URL)
    #[arg(long, global = true)]
    rpc_url: Option<String>,

    /// Node RPC user (or set SCRIBE_RPC_USER)
    #[arg(long, global = true)]
    rpc_user: Option<String>,

    /// Node RPC password (or set SCRIBE_RPC_PASSWORD; prompted otherwise)
    #[arg(long, global = true)]
    rpc_password: Option<String>,

    /// Network preset: stronghands, bitcoin, bitcoin-testnet
    #[arg(long, global = true)]
    network: Option<String>,

    /// Bytes per chunk, header included
    #[arg(long, global = true)]
    chunk_size: Option<usize>,

    /// Encode data as pseudo addresses instead of OP_RETURN
    /// (`--address-encoding=false` overrides the config file)
    #[arg(
        long,
        global = true,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true"
    )]
    address_encoding: Option<bool>,

    /// Chunk nonces already on the ledger (comma-separated)
    #[arg(long, global = true, value_delimiter = ',')]
    skip: Vec<u32>,

    /// Print unsigned transactions instead of signing and broadcasting
    #[arg(long, global = true)]
    dry_run: bool,

    /// Attempts per sign or broadcast call before giving up
    #[arg(long, global = true, default_value_t = 5)]
    max_attempts: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed a short chat message.
    Message(MessageArgs),
    /// Embed a file.
    File(FileArgs),
}

#[derive(ClapArgs, Debug)]
struct MessageArgs {
    /// Message text
    text: String,

    /// Top-level scope id (server)
    #[arg(long, default_value_t = 0)]
    scope_id: u64,

    /// Sub-scope id (channel)
    #[arg(long, default_value_t = 0)]
    sub_scope_id: u64,

    /// Author id
    #[arg(long, default_value_t = 0)]
    principal_id: u64,

    /// Message id
    #[arg(long)]
    message_id: u64,
}

#[derive(ClapArgs, Debug)]
struct FileArgs {
    /// File to embed
    path: PathBuf,

    /// Name stored with the data (default: the file's own name)
    #[arg(long)]
    name: Option<String>,
}

impl Command {
    /// Payload and framing for this command.
    fn into_payload(self) -> Result<(Bytes, ChunkVariant)> {
        match self {
            Command::Message(args) => {
                let ctx = MessageContext {
                    scope_id: args.scope_id,
                    sub_scope_id: args.sub_scope_id,
                    principal_id: args.principal_id,
                    message_id: args.message_id,
                };
                Ok((Bytes::from(args.text), ChunkVariant::InlineMessage(ctx)))
            }
            Command::File(args) => {
                let filename = match args.name {
                    Some(n) => n,
                    None => args
                        .path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .context("File path has no usable name; pass --name")?
                        .to_string(),
                };
                let data = std::fs::read(&args.path)
                    .with_context(|| format!("Failed to read {}", args.path.display()))?;
                Ok((Bytes::from(data), ChunkVariant::FileBlob { filename }))
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(&cli.opts.log_level, &cli.opts.log_format);

    if let Err(e) = run(cli).await {
        error!("{e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let Cli { command, opts } = cli;

    let mut config = load_embed_config(opts.config.as_deref())?;
    apply_overrides(
        &mut config,
        &Overrides {
            chunk_size: opts.chunk_size,
            address_encoding: opts.address_encoding,
            network: opts.network.clone(),
        },
    )?;

    let address = opts
        .address
        .or_else(|| std::env::var("SCRIBE_ADDRESS").ok())
        .context("Funding address required: pass --address or set SCRIBE_ADDRESS")?;

    let rpc = rpc_config(opts.rpc_url, opts.rpc_user, opts.rpc_password)?;
    let ledger = JsonRpcLedger::connect(&rpc, config.network.clone())
        .context("Failed to set up RPC client")?;

    // Dry runs chain each draft from the previous one's change.
    let preview = DryRunLedger::new(&ledger, &config.network, &address)?;
    let client: &dyn LedgerClient = if opts.dry_run { &preview } else { &ledger };

    let (payload, variant) = command.into_payload()?;
    let request = EmbedRequest::new(payload, variant, address).suppress(opts.skip);

    info!(
        network = %config.network.name,
        chunk_size = config.chunk_size,
        dry_run = opts.dry_run,
        "Scribe v{}",
        env!("CARGO_PKG_VERSION")
    );

    let retry = RetryPolicy {
        max_attempts: opts.max_attempts.max(1),
        base_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(30),
    };

    let mut embedder = embed(config, client, request).await?;
    while let Some(tx) = embedder.next_transaction().await? {
        if opts.dry_run {
            preview.send_raw_transaction(&tx.tx_hex).await?;
            println!("{} {}", tx.nonce, tx.tx_hex);
            continue;
        }
        let txid = sign_and_send(&ledger, &tx.tx_hex, &retry)
            .await
            .with_context(|| {
                format!(
                    "Chunk {} was not broadcast; rerun with --skip for the chunks already sent",
                    tx.nonce
                )
            })?;
        println!("{} {}", tx.nonce, txid);
    }

    info!(
        emitted = embedder.emitted(),
        skipped = embedder.skipped(),
        total = embedder.total_chunks(),
        "done"
    );
    Ok(())
}

/// Initialize tracing subscriber with the given log level and output format.
///
/// Pass `format = "json"` for structured JSON output. Any other value
/// defaults to human-readable text. Logs go to stderr so stdout carries
/// only transaction ids.
fn init_logging(level_str: &str, format: &str) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level_str));

    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true).with_writer(std::io::stderr))
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::io::Write;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_message_command() {
        let cli = Cli::try_parse_from([
            "scribe",
            "message",
            "hello",
            "--message-id",
            "9",
            "--skip",
            "0,2",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.opts.skip, vec![0, 2]);
        assert!(cli.opts.dry_run);
        let (payload, variant) = cli.command.into_payload().unwrap();
        assert_eq!(&payload[..], b"hello");
        match variant {
            ChunkVariant::InlineMessage(ctx) => assert_eq!(ctx.message_id, 9),
            other => panic!("unexpected variant {other:?}"),
        }
    }

    #[test]
    fn address_encoding_flag_is_tri_state() {
        let unset = Cli::try_parse_from(["scribe", "message", "hi", "--message-id", "1"]).unwrap();
        assert_eq!(unset.opts.address_encoding, None);

        let on = Cli::try_parse_from(["scribe", "--address-encoding", "message", "hi", "--message-id", "1"])
            .unwrap();
        assert_eq!(on.opts.address_encoding, Some(true));

        let off = Cli::try_parse_from([
            "scribe",
            "message",
            "hi",
            "--message-id",
            "1",
            "--address-encoding=false",
        ])
        .unwrap();
        assert_eq!(off.opts.address_encoding, Some(false));
    }

    #[test]
    fn file_command_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(b"contents")
            .unwrap();
        let cli = Cli::try_parse_from(["scribe", "file", path.to_str().unwrap()]).unwrap();
        let (payload, variant) = cli.command.into_payload().unwrap();
        assert_eq!(&payload[..], b"contents");
        assert_eq!(
            variant,
            ChunkVariant::FileBlob {
                filename: "notes.txt".into()
            }
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let cli = Cli::try_parse_from(["scribe", "file", "/nonexistent/scribe-test"]).unwrap();
        assert!(cli.command.into_payload().is_err());
    }
}
