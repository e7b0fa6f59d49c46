//! Ledger mirror command line.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use mirror_fingerprint::FingerprintOptions;
use mirror_migrate::{resolve_address, MigrateConfig, Migrator};
use mirror_remote::RpcLedgerClient;
use mirror_snapshot::HashMode;
use mirror_store_lmdb::LmdbEnvironment;
use mirror_types::{Address, NetworkId};
use mirror_utils::LogFormat;

#[derive(Parser)]
#[command(name = "mirror", about = "Back up and restore ledger contract state")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "MIRROR_CONFIG")]
    config: Option<PathBuf>,

    /// JSON-RPC endpoint of the ledger service.
    #[arg(long, env = "MIRROR_RPC_URL")]
    rpc_url: Option<String>,

    /// Network the contracts live on: "live", "test", or "dev".
    #[arg(long, env = "MIRROR_NETWORK")]
    network: Option<NetworkId>,

    /// Directory for snapshot artifacts and migration reports.
    #[arg(long, env = "MIRROR_BACKUP_DIR")]
    backup_dir: Option<PathBuf>,

    /// LMDB directory of the deployment lookup store.
    #[arg(long, env = "MIRROR_STORE_DIR")]
    store_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "MIRROR_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "MIRROR_LOG_FORMAT")]
    log_format: Option<String>,

    /// Read ledger entries one at a time.
    #[arg(long, env = "MIRROR_SERIAL_READS")]
    serial_reads: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Extract a contract's state and write a snapshot artifact.
    Backup {
        /// Address of the source contract.
        #[arg(long, conflicts_with_all = ["source_name", "source_version"])]
        source: Option<Address>,

        /// Resolve the source through the lookup store by name...
        #[arg(long, requires = "source_version")]
        source_name: Option<String>,

        /// ...and version.
        #[arg(long, requires = "source_name")]
        source_version: Option<String>,

        /// "offchain" (default) or "onchain".
        #[arg(long, default_value = "offchain")]
        hash_mode: HashMode,

        /// Reuse fee schedules from the previous snapshot of this source.
        #[arg(long)]
        refresh: bool,
    },

    /// Replay a stored snapshot into a target contract and verify it.
    Restore {
        /// Address whose snapshot is replayed.
        #[arg(long)]
        source: Address,

        /// Address of the target contract.
        #[arg(long)]
        target: Address,

        /// Must match the mode the snapshot was taken in.
        #[arg(long, default_value = "offchain")]
        hash_mode: HashMode,
    },

    /// Recompute the offchain fingerprint of a stored snapshot.
    Fingerprint {
        #[arg(long)]
        source: Address,

        /// Leave this global token out of the fold. Repeatable.
        #[arg(long = "exclude-global-token", value_name = "ST_ID")]
        excluded_global_tokens: Vec<u64>,

        /// Fold only the first N whitelist entries.
        #[arg(long)]
        whitelist_limit: Option<usize>,
    },
}

fn load_config(cli: &Cli) -> anyhow::Result<MigrateConfig> {
    let mut config = match &cli.config {
        Some(path) => MigrateConfig::from_toml_file(path)?,
        None => MigrateConfig::default(),
    };
    if let Some(network) = cli.network {
        config.network = network;
    }
    if let Some(url) = &cli.rpc_url {
        config.rpc_url = Some(url.clone());
    }
    if let Some(dir) = &cli.backup_dir {
        config.backup_dir = dir.clone();
    }
    if let Some(dir) = &cli.store_dir {
        config.store_dir = dir.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.log_format = format.clone();
    }
    config.serial_reads |= cli.serial_reads;
    Ok(config)
}

async fn run(cli: Cli, config: MigrateConfig) -> anyhow::Result<()> {
    match cli.command {
        Command::Backup {
            source,
            source_name,
            source_version,
            hash_mode,
            refresh,
        } => {
            let url = config.require_rpc_url()?;
            let env = LmdbEnvironment::open_default(&config.store_dir)
                .with_context(|| format!("opening lookup store {}", config.store_dir.display()))?;
            let store = env.contract_store();

            let address = match (source, source_name, source_version) {
                (Some(address), _, _) => address,
                (None, Some(name), Some(version)) => {
                    resolve_address(&store, config.network, &name, &version)?
                }
                _ => anyhow::bail!("pass --source or --source-name with --source-version"),
            };

            let client = RpcLedgerClient::new(url, address);
            let snapshot = Migrator::new(&config)
                .with_store(&store)
                .refresh(refresh)
                .backup(&client, address, hash_mode)
                .await?;
            println!("{} {}", snapshot.ledger_hash, snapshot.summary());
        }
        Command::Restore {
            source,
            target,
            hash_mode,
        } => {
            let url = config.require_rpc_url()?;
            let env = LmdbEnvironment::open_default(&config.store_dir)
                .with_context(|| format!("opening lookup store {}", config.store_dir.display()))?;
            let store = env.contract_store();

            let client = RpcLedgerClient::new(url, target);
            let report = Migrator::new(&config)
                .with_store(&store)
                .restore(source, &client, target, hash_mode)
                .await?;
            println!("{}", report.hash_target);
        }
        Command::Fingerprint {
            source,
            excluded_global_tokens,
            whitelist_limit,
        } => {
            let mut options =
                FingerprintOptions::default().excluding_global_tokens(excluded_global_tokens);
            if let Some(limit) = whitelist_limit {
                options = options.whitelist_limit(limit);
            }
            let check = Migrator::new(&config).verify_artifact(source, &options)?;
            println!("{}", check.computed);
            if check.matches() == Some(false) {
                anyhow::bail!(
                    "artifact records {} but its data hashes to {}",
                    check.recorded,
                    check.computed
                );
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            mirror_utils::init_tracing();
            tracing::error!("{e:#}");
            return ExitCode::FAILURE;
        }
    };
    mirror_utils::init_tracing_with(&config.log_level, LogFormat::parse(&config.log_format));
    tracing::info!(network = %config.network, "mirror starting");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
