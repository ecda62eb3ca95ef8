//! relay-server entry point.
//!
//! Startup order:
//! 1. Parse flags and load `.env` files and `settings.toml`.
//! 2. Initialise tracing.
//! 3. Open the store (SQLite unless `--in-memory`).
//! 4. Build the vendor registry, orchestrator and session validator.
//! 5. Serve HTTP until SIGINT or SIGTERM.
//!
//! `relay-server set-key <vendor>` seals an API key into `settings.toml`
//! and exits without serving.

mod auth;
mod error;
mod logging;
mod routes;
mod state;

use clap::{Parser, Subcommand};
use config::{PathManager, Settings};
use llm::{ModelRegistry, ProviderConfig, Vendor};
use relay_core::{
    AttachmentMaterializer, CancellationRegistry, ChatStore, FsBlobReader, MemoryStore,
    Orchestrator, SqliteStore, StaticSessionValidator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "relay-server", version, about = "Streaming LLM chat relay")]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:3000
    #[arg(long, env = "RELAY_BIND")]
    bind: Option<String>,

    /// SQLite database file
    #[arg(long, env = "RELAY_DATABASE")]
    database: Option<PathBuf>,

    /// Root directory for settings, logs, uploads and the database
    #[arg(long, env = "RELAY_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Keep everything in memory (nothing survives a restart)
    #[arg(long, env = "RELAY_IN_MEMORY")]
    in_memory: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seal a vendor API key into settings.toml
    SetKey {
        /// openai, anthropic, gemini or groq
        vendor: Vendor,

        /// The key to store
        #[arg(long, env = "RELAY_API_KEY", hide_env_values = true)]
        key: String,
    },
}

/// Seal `key` for `vendor` into the settings file at `path`, keeping
/// everything else in it. A file that exists but does not parse is left
/// alone.
fn store_api_key(path: &Path, vendor: Vendor, key: &str) -> anyhow::Result<()> {
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("API key must not be empty");
    }
    let mut settings = if path.exists() {
        Settings::load_from(path).map_err(anyhow::Error::msg)?
    } else {
        Settings::default()
    };
    settings
        .set_api_key(vendor.name(), key)
        .map_err(anyhow::Error::msg)?;
    settings.save_to(path).map_err(anyhow::Error::msg)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    config::load_env_file();
    if let Some(dir) = cli.data_dir.clone() {
        PathManager::set_data_dir(dir);
    }
    if let Err(e) = PathManager::ensure_dirs_exist() {
        eprintln!("[relay] Failed to create data directories: {}", e);
    }

    if let Some(Command::SetKey { vendor, key }) = cli.command {
        let path = PathManager::settings_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine settings path"))?;
        store_api_key(&path, vendor, &key)?;
        println!("Stored {} API key in {}", vendor.name(), path.display());
        return Ok(());
    }

    let settings = Settings::load();

    let _log_guard = logging::init_logging();
    info!(version = env!("CARGO_PKG_VERSION"), "relay-server starting");

    let store: Arc<dyn ChatStore> = if cli.in_memory {
        info!("using in-memory store");
        Arc::new(MemoryStore::new())
    } else {
        let path = cli
            .database
            .clone()
            .or_else(|| settings.database_path())
            .ok_or_else(|| anyhow::anyhow!("could not determine database path"))?;
        let store = SqliteStore::open(&path)?;
        info!(path = %path.display(), "database ready");
        Arc::new(store)
    };

    let models = ModelRegistry::new(|vendor| {
        ProviderConfig::new(
            settings.api_key(vendor.name(), vendor.api_key_env()),
            settings.base_url(vendor.name(), vendor.base_url_env()),
        )
    });

    let public_dir = settings
        .uploads_dir()
        .and_then(|uploads| uploads.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("public"));
    let public_base_url = settings.server.public_base_url.clone();
    let materializer =
        AttachmentMaterializer::new(Arc::new(FsBlobReader::new(public_dir)), public_base_url.clone());

    let sessions = StaticSessionValidator::new(&settings.sessions);
    if sessions.is_empty() {
        warn!("no sessions configured; every API request will be rejected");
    }

    let state = Arc::new(AppState {
        orchestrator: Orchestrator::new(
            store,
            Arc::new(models),
            Arc::new(CancellationRegistry::new()),
            Arc::new(materializer),
        ),
        sessions: Arc::new(sessions),
    });

    let app = routes::build(state, public_base_url.as_deref());
    let bind = cli.bind.unwrap_or_else(|| settings.server.bind_address.clone());
    let listener = tokio::net::TcpListener::bind(bind.as_str()).await?;
    info!(addr = %bind, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("relay-server stopped");
    Ok(())
}

/// Resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_set_key() {
        let cli = Cli::try_parse_from(["relay-server", "set-key", "groq", "--key", "gsk-1"]).unwrap();
        match cli.command {
            Some(Command::SetKey { vendor, key }) => {
                assert_eq!(vendor, Vendor::Groq);
                assert_eq!(key, "gsk-1");
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["relay-server", "set-key", "mistral", "--key", "k"]).is_err());
        assert!(Cli::try_parse_from(["relay-server"]).unwrap().command.is_none());
    }

    #[test]
    fn test_store_api_key_keeps_other_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(
            &path,
            "[[sessions]]\ntoken = \"abc\"\nuser_id = \"user-1\"\n",
        )
        .unwrap();

        store_api_key(&path, Vendor::Anthropic, "  sk-ant-1  ").unwrap();

        let settings = Settings::load_from(&path).unwrap();
        assert_eq!(settings.sessions.len(), 1);
        assert_eq!(
            settings
                .api_key("anthropic", "RELAY_TEST_UNSET_ANTHROPIC_KEY")
                .as_deref(),
            Some("sk-ant-1")
        );
    }

    #[test]
    fn test_store_api_key_rejects_blank_and_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        assert!(store_api_key(&path, Vendor::OpenAI, "   ").is_err());
        assert!(!path.exists());

        std::fs::write(&path, "not = [valid").unwrap();
        assert!(store_api_key(&path, Vendor::OpenAI, "sk-1").is_err());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not = [valid");
    }
}
