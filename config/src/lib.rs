pub mod crypto;
pub mod paths;
pub mod settings;

pub use paths::PathManager;
pub use settings::{ServerSettings, SessionEntry, Settings, StorageSettings, VendorSettings};

/// Load environment variables from .env files.
/// First loads from ~/.env (home directory), then from ./.env (working directory).
/// Values already present in the process environment are never overwritten,
/// so the working directory file only fills in what the home file left unset.
pub fn load_env_file() {
    dotenv::dotenv().ok();

    if let Some(home) = dirs::home_dir() {
        dotenv::from_path(home.join(".env")).ok();
    }
}
