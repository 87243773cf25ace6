use crate::{
    sentinel::MAX_CONCURRENT_EVENTS,
    types::{ProofOutcome, SentinelConfig, SentinelError},
};
use clap::{Arg, ArgMatches, Command};
use config::{Config, Environment, File, FileFormat};
use intent::DELIMITER;
use log::{info, warn};
use std::{collections::HashSet, path::Path};

const DEFAULTS: &str = r#"
[sentinel]
name = "Sentinel"

[proof]
schema_ref = "cbdc-cb-credential"

[processing]
max_concurrent_events = 32
channel_capacity = 1024

[monitoring]
log_level = "info"

[simulation]
respond_after_ms = 250
"#;

/// Configuration builder for the sentinel
pub struct ConfigBuilder {
    config: Config,
}

/// CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_file: Option<String>,
    pub log_level: Option<String>,
    pub schema_ref: Option<String>,
    pub auto_outcome: Option<String>,
}

impl CliArgs {
    pub fn command() -> Command {
        Command::new("cbdc-sentinel")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Gates CBDC transfers on credential proofs from both parties")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .env("SENTINEL_CONFIG_FILE"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("schema-ref")
                    .long("schema-ref")
                    .value_name("REF")
                    .help("Credential definition requested from both parties"),
            )
            .arg(
                Arg::new("auto-outcome")
                    .long("auto-outcome")
                    .value_name("STATE")
                    .help("Answer every proof request with this state (done, declined, abandoned)"),
            )
    }

    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_file: matches.get_one::<String>("config").cloned(),
            log_level: matches.get_one::<String>("log-level").cloned(),
            schema_ref: matches.get_one::<String>("schema-ref").cloned(),
            auto_outcome: matches.get_one::<String>("auto-outcome").cloned(),
        }
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    /// Load configuration from the command line and every layer below it
    pub fn load() -> Result<SentinelConfig, SentinelError> {
        let cli_args = CliArgs::from_matches(&CliArgs::command().get_matches());
        Self::load_with(&cli_args)
    }

    /// Layers, lowest precedence first: defaults, config file, environment,
    /// CLI arguments.
    pub fn load_with(cli_args: &CliArgs) -> Result<SentinelConfig, SentinelError> {
        let mut builder = ConfigBuilder::new();

        builder.load_defaults()?;

        if let Some(config_file) = &cli_args.config_file {
            builder.load_file(config_file)?;
        } else {
            builder.try_load_default_files()?;
        }

        builder.load_environment()?;
        builder.apply_cli_overrides(cli_args)?;

        let config: SentinelConfig = builder.config.clone().try_deserialize().map_err(|e| {
            SentinelError::ConfigError(format!("Configuration parsing error: {}", e))
        })?;

        builder.validate_config(&config)?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    fn load_defaults(&mut self) -> Result<(), SentinelError> {
        self.config = Config::builder()
            .add_source(File::from_str(DEFAULTS, FileFormat::Toml))
            .build()
            .map_err(|e| SentinelError::ConfigError(format!("Default config error: {}", e)))?;
        Ok(())
    }

    fn load_file(&mut self, path: &str) -> Result<(), SentinelError> {
        if !Path::new(path).exists() {
            return Err(SentinelError::ConfigError(format!(
                "Config file not found: {}",
                path
            )));
        }

        info!("Loading configuration from: {}", path);

        self.config = Config::builder()
            .add_source(self.config.clone())
            .add_source(File::new(path, FileFormat::Toml))
            .build()
            .map_err(|e| SentinelError::ConfigError(format!("Config file error: {}", e)))?;
        Ok(())
    }

    fn try_load_default_files(&mut self) -> Result<(), SentinelError> {
        for path in ["./sentinel.toml", "./config.toml"] {
            if Path::new(path).exists() {
                info!("Found default config file: {}", path);
                return self.load_file(path);
            }
        }

        warn!("No default config file found, using defaults and environment variables");
        Ok(())
    }

    fn load_environment(&mut self) -> Result<(), SentinelError> {
        self.config = Config::builder()
            .add_source(self.config.clone())
            .add_source(
                Environment::with_prefix("SENTINEL")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .map_err(|e| SentinelError::ConfigError(format!("Environment config error: {}", e)))?;
        Ok(())
    }

    fn apply_cli_overrides(&mut self, cli_args: &CliArgs) -> Result<(), SentinelError> {
        let overrides = [
            ("monitoring.log_level", &cli_args.log_level),
            ("proof.schema_ref", &cli_args.schema_ref),
            ("simulation.auto_outcome", &cli_args.auto_outcome),
        ];

        let mut builder = Config::builder().add_source(self.config.clone());
        for (key, value) in overrides {
            if let Some(value) = value {
                builder = builder.set_override(key, value.as_str()).map_err(|e| {
                    SentinelError::ConfigError(format!("CLI override error: {}", e))
                })?;
            }
        }

        self.config = builder
            .build()
            .map_err(|e| SentinelError::ConfigError(format!("CLI config build error: {}", e)))?;
        Ok(())
    }

    fn validate_config(&self, config: &SentinelConfig) -> Result<(), SentinelError> {
        if config.proof.schema_ref.trim().is_empty() {
            return Err(SentinelError::ConfigError(
                "Proof schema reference is required".to_string(),
            ));
        }

        if config.processing.max_concurrent_events == 0 {
            return Err(SentinelError::ConfigError(
                "Max concurrent events must be greater than 0".to_string(),
            ));
        }

        if config.processing.max_concurrent_events > MAX_CONCURRENT_EVENTS {
            return Err(SentinelError::ConfigError(format!(
                "Max concurrent events must be at most {}",
                MAX_CONCURRENT_EVENTS
            )));
        }

        if config.processing.channel_capacity == 0 {
            return Err(SentinelError::ConfigError(
                "Channel capacity must be greater than 0".to_string(),
            ));
        }

        let mut addresses = HashSet::new();
        for party in &config.parties {
            if party.address.is_empty() || party.address.contains(DELIMITER) {
                return Err(SentinelError::ConfigError(format!(
                    "Invalid party address: {:?}",
                    party.address
                )));
            }
            if !addresses.insert(party.address.as_str()) {
                return Err(SentinelError::ConfigError(format!(
                    "Duplicate party address: {}",
                    party.address
                )));
            }
        }

        if let Some(state) = &config.simulation.auto_outcome {
            if let ProofOutcome::Other(_) = ProofOutcome::from(state.clone()) {
                return Err(SentinelError::ConfigError(format!(
                    "Unknown auto outcome: {}",
                    state
                )));
            }
        }

        info!("Configuration validation passed");
        Ok(())
    }
}

/// Load configuration with sensible defaults
pub fn load_config() -> Result<SentinelConfig, SentinelError> {
    ConfigBuilder::load()
}

/// Create a sample configuration file
pub fn create_sample_config() -> String {
    r#"# CBDC Sentinel Configuration
# Copy this file to sentinel.toml and update the values

[sentinel]
# Name used in log lines
name = "Sentinel"

[proof]
# Credential definition both parties must prove against
schema_ref = "YOUR_CREDENTIAL_DEFINITION_ID"

[processing]
# Maximum events processed at the same time
max_concurrent_events = 32
# Capacity of the inbound message and outcome channels
channel_capacity = 1024

[monitoring]
# Log level (trace, debug, info, warn, error)
log_level = "info"

[simulation]
# Answer every proof request with this state (done, declined, abandoned)
# auto_outcome = "done"
# Delay before the simulated answer in milliseconds
respond_after_ms = 250

# Registered addresses and, when connected, their session
[[parties]]
address = "alice-wallet"
label = "Alice"
session = "conn-alice"

[[parties]]
address = "bob-wallet"
label = "Bob"
session = "conn-bob"
"#
    .to_string()
}
