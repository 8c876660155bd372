use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use blockchain::chain::ChildChain;
use blockchain::parent_chain::{LocalParentChain, ParentChain};
use crypto::ecdsa::{Keypair, SecretKey};
use storage::{MemStore, SledDB};
use types::config::{EnvironmentConfig, StorageKind};

use crate::{Level, RunArgs};

const NODE_LOG_TARGET: &str = "node";

pub(crate) fn run(args: &RunArgs) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async { _start_node(args).await })
}

pub(crate) fn keygen() -> Result<()> {
    let keypair = Keypair::generate(&mut rand::rngs::OsRng);
    println!("secret:  {}", hex::encode(keypair.secret.to_bytes()));
    println!("address: {:?}", keypair.address());
    Ok(())
}

fn default_datadir() -> PathBuf {
    directories::ProjectDirs::from("org", "plasma", "childchain")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("childchain"))
}

pub(crate) fn datadir(config: &EnvironmentConfig) -> PathBuf {
    config
        .datadir
        .as_ref()
        .map(PathBuf::from)
        .unwrap_or_else(default_datadir)
}

fn init_logging(datadir: &Path, log_level: Level) -> Result<()> {
    let debug_log = Arc::new(File::create(datadir.join("debug.log"))?);

    let mk_writer = std::io::stderr.with_max_level(tracing::Level::ERROR).or_else(
        std::io::stdout
            .with_max_level(log_level.into())
            .and(debug_log.with_max_level(tracing::Level::DEBUG)),
    );

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(mk_writer)
        .init();
    Ok(())
}

async fn _start_node(args: &RunArgs) -> Result<()> {
    // the datadir comes from the config, logging needs the datadir
    let (mut env, read_error) = load_environment(args)?;
    let datadir = datadir(&env);
    std::fs::create_dir_all(&datadir)?;
    init_logging(&datadir, args.log_level)?;
    finish_environment(&mut env, read_error);

    let operator = match &env.operator_key {
        Some(key) => SecretKey::from_hex(key)?,
        None => {
            let keypair = Keypair::generate(&mut rand::rngs::OsRng);
            warn!(target: NODE_LOG_TARGET, address = ?keypair.address(), "No operator key configured, using an ephemeral key");
            keypair.secret
        }
    };

    // the RPC parent chain client is external; run against the local one
    let parent: Arc<dyn ParentChain> = Arc::new(LocalParentChain::new());
    let chain = open_chain(&env, &datadir, parent, operator)?;

    let (shutdown_sender, shutdown) = tokio::sync::watch::channel(false);
    let handles = chain.start(shutdown);
    info!(target: NODE_LOG_TARGET, datadir = ?datadir, storage = ?env.storage, "Child chain running");

    tokio::signal::ctrl_c().await?;
    info!(target: NODE_LOG_TARGET, "Shutting down");
    shutdown_sender.send(true)?;
    for handle in handles {
        handle.await?;
    }
    Ok(())
}

fn open_chain(
    env: &EnvironmentConfig,
    datadir: &Path,
    parent: Arc<dyn ParentChain>,
    operator: SecretKey,
) -> Result<ChildChain> {
    match env.storage {
        StorageKind::Memory => {
            ChildChain::initialize(Arc::new(MemStore::new()), parent, operator, env)
        }
        StorageKind::Sled => ChildChain::initialize(
            Arc::new(SledDB::new(datadir.join("chain"))?),
            parent,
            operator,
            env,
        ),
        #[cfg(feature = "rocksdb")]
        StorageKind::Rocksdb => ChildChain::initialize(
            Arc::new(storage::rocks::RocksDB::new(datadir.join("chain"))?),
            parent,
            operator,
            env,
        ),
        #[cfg(not(feature = "rocksdb"))]
        StorageKind::Rocksdb => {
            anyhow::bail!("rocksdb storage requires the `rocksdb` feature")
        }
    }
}

pub(crate) fn setup_environment(args: &RunArgs) -> Result<EnvironmentConfig> {
    let (mut config, read_error) = load_environment(args)?;
    finish_environment(&mut config, read_error);
    Ok(config)
}

/// Logs why the config file was skipped and repairs invalid settings.
fn finish_environment(config: &mut EnvironmentConfig, read_error: Option<anyhow::Error>) {
    if let Some(error) = read_error {
        warn!(target: NODE_LOG_TARGET, error = ?error, "failed to read config file, reverting to application default");
    }
    config.sanitize();
}

/// Config file with the CLI overrides applied, not sanitized yet. Also
/// returns the error that kept the default config file from loading.
pub(crate) fn load_environment(
    args: &RunArgs,
) -> Result<(EnvironmentConfig, Option<anyhow::Error>)> {
    let mut config = EnvironmentConfig::default();
    let mut read_error = None;

    if let Some(datadir) = &args.datadir {
        config.datadir = Some(datadir.to_string_lossy().to_string());
    }

    if let Some(config_file_path) = &args.config_file {
        let config_file = OpenOptions::new()
            .read(true)
            .open(config_file_path.as_path())?;
        config = serde_json::from_reader(config_file)?;
    } else {
        let res: Result<EnvironmentConfig, _> = OpenOptions::new()
            .read(true)
            .open(datadir(&config).join("config.json"))
            .map_err(|e| anyhow::anyhow!("{}", e))
            .and_then(|config_file| {
                serde_json::from_reader(config_file).map_err(|e| anyhow::anyhow!("{}", e))
            });

        match res {
            Ok(c) => {
                config = c;
            }
            Err(error) => {
                read_error = Some(error);
            }
        }
    }

    if let Some(datadir) = &args.datadir {
        config.datadir = Some(datadir.to_string_lossy().to_string());
    }

    if let Some(storage) = args.storage {
        config.storage = storage;
    }

    if let Some(block_step) = args.block_step {
        config.block_step = block_step;
    }

    if let Some(max_block_transactions) = args.max_block_transactions {
        config.max_block_transactions = max_block_transactions;
    }

    if let Some(operator_key) = &args.operator_key {
        config.operator_key = Some(operator_key.clone());
    }

    Ok((config, read_error))
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::Mutex;

    use tempdir::TempDir;

    use super::*;

    fn args(datadir: PathBuf) -> RunArgs {
        RunArgs {
            datadir: Some(datadir),
            config_file: None,
            storage: None,
            block_step: None,
            max_block_transactions: None,
            operator_key: None,
            log_level: Level::Info,
        }
    }

    #[test]
    fn cli_overrides_config_file() {
        let dir = TempDir::new("childchain-node").unwrap();
        std::fs::write(
            dir.path().join("config.json"),
            r#"{"storage": "memory", "block_step": 10, "max_block_transactions": 0}"#,
        )
        .unwrap();
        let mut run_args = args(dir.path().to_path_buf());
        run_args.block_step = Some(20);

        let env = setup_environment(&run_args).unwrap();
        assert_eq!(env.storage, StorageKind::Memory);
        assert_eq!(env.block_step, 20);
        assert_eq!(env.max_block_transactions, types::MAX_BLOCK_TRANSACTIONS);
        assert_eq!(datadir(&env), dir.path().to_path_buf());
    }

    #[test]
    fn missing_config_uses_defaults() {
        let dir = TempDir::new("childchain-node").unwrap();
        let env = setup_environment(&args(dir.path().to_path_buf())).unwrap();
        assert_eq!(env.storage, StorageKind::Sled);
        assert_eq!(env.block_step, 1000);
    }

    #[test]
    fn opens_sled_chain_in_datadir() {
        let dir = TempDir::new("childchain-node").unwrap();
        let env = setup_environment(&args(dir.path().to_path_buf())).unwrap();
        let operator = Keypair::generate(&mut rand::rngs::OsRng).secret;
        let parent: Arc<dyn ParentChain> = Arc::new(LocalParentChain::new());
        let chain = open_chain(&env, dir.path(), parent, operator).unwrap();
        assert_eq!(chain.last_block_number().unwrap(), 0);
        assert!(dir.path().join("chain").exists());
    }

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn loading_leaves_repairs_for_later() {
        let dir = TempDir::new("childchain-node").unwrap();
        let mut run_args = args(dir.path().to_path_buf());
        run_args.max_block_transactions = Some(0);

        let (config, read_error) = load_environment(&run_args).unwrap();
        assert_eq!(config.max_block_transactions, 0);
        assert!(read_error.is_some());
    }

    #[test]
    fn environment_warnings_reach_the_subscriber() {
        let dir = TempDir::new("childchain-node").unwrap();
        let mut run_args = args(dir.path().to_path_buf());
        run_args.block_step = Some(0);
        let (mut config, read_error) = load_environment(&run_args).unwrap();

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            finish_environment(&mut config, read_error)
        });

        let logged = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(logged.contains("failed to read config file"));
        assert!(logged.contains("Sanitizing invalid block step"));
        assert_eq!(config.block_step, 1000);
    }
}
