use crate::models::{Account, AppConfig};
use anyhow::{Context, Result, bail};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, Environment, File, FileFormat};
use indexmap::IndexMap;
use std::fs;

/// Default data directory, relative to the working directory.
pub const DEFAULT_DATA_DIR: &str = "MagicMimi Data";

/// Prefix of environment variables that override `Settings.yaml`
/// (e.g. `MAGICMIMI__SCAN__INTERVAL_MS=250`).
pub const ENV_PREFIX: &str = "MAGICMIMI";

/// Ordered account store as persisted in `Accounts.yaml`.
pub type Accounts = IndexMap<String, Account>;

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two files in the data directory:
/// - Settings (`Settings.yaml`): API endpoints, scan timings, capture sources
/// - Accounts (`Accounts.yaml`): named credentials, in insertion order
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    settings_path: Utf8PathBuf,
    accounts_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "MagicMimi Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            settings_path: config_dir.join("Settings.yaml"),
            accounts_path: config_dir.join("Accounts.yaml"),
            config_dir,
        })
    }

    /// Load settings, layering `MAGICMIMI__*` environment variables over the file.
    ///
    /// A missing file yields the defaults (plus any overrides).
    pub fn load_app_config(&self) -> Result<AppConfig> {
        self.load_app_config_with(Self::env_overrides())
    }

    fn env_overrides() -> Environment {
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn load_app_config_with(&self, env: Environment) -> Result<AppConfig> {
        if !self.settings_path.exists() {
            tracing::warn!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
        }

        let layered = Config::builder()
            .add_source(
                File::new(self.settings_path.as_str(), FileFormat::Yaml).required(false),
            )
            .add_source(env)
            .build()
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let config: AppConfig = layered
            .try_deserialize()
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(config)
    }

    /// Save the settings file.
    pub fn save_app_config(&self, config: &AppConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Load the account store.
    ///
    /// # Returns
    /// The stored accounts, or an empty store if the file doesn't exist
    pub fn load_accounts(&self) -> Result<Accounts> {
        if !self.accounts_path.exists() {
            tracing::warn!(
                "Accounts file not found at {}, starting with no accounts",
                self.accounts_path
            );
            return Ok(Accounts::new());
        }

        let file_contents = fs::read_to_string(&self.accounts_path)
            .with_context(|| format!("Failed to read accounts: {}", self.accounts_path))?;

        // An emptied file parses as null rather than an empty map
        if file_contents.trim().is_empty() {
            return Ok(Accounts::new());
        }

        let accounts: Accounts = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse accounts: {}", self.accounts_path))?;

        tracing::info!(
            "Loaded {} account(s) from {}",
            accounts.len(),
            self.accounts_path
        );
        Ok(accounts)
    }

    /// Save the account store.
    pub fn save_accounts(&self, accounts: &Accounts) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(accounts).context("Failed to serialize accounts to YAML")?;

        fs::write(&self.accounts_path, yaml_string)
            .with_context(|| format!("Failed to write accounts: {}", self.accounts_path))?;

        tracing::info!(
            "Saved {} account(s) to {}",
            accounts.len(),
            self.accounts_path
        );
        Ok(())
    }

    /// Add a named account and persist the store.
    ///
    /// Fails if an account with the same name already exists.
    pub fn add_account(&self, name: &str, account: Account) -> Result<()> {
        let mut accounts = self.load_accounts()?;
        if accounts.contains_key(name) {
            bail!("Account '{}' already exists", name);
        }

        tracing::info!("Adding account '{}' ({})", name, account.masked_uid());
        accounts.insert(name.to_string(), account);
        self.save_accounts(&accounts)
    }

    /// Remove a named account and persist the store.
    ///
    /// # Returns
    /// The removed account
    pub fn remove_account(&self, name: &str) -> Result<Account> {
        let mut accounts = self.load_accounts()?;
        let Some(account) = accounts.shift_remove(name) else {
            bail!("Account '{}' not found", name);
        };

        self.save_accounts(&accounts)?;
        tracing::info!("Removed account '{}'", name);
        Ok(account)
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }

    pub fn accounts_path(&self) -> &Utf8Path {
        &self.accounts_path
    }
}
