use config::{Config, ConfigError, Environment, File};
use miner::{PreemptionPolicy, ShortBatchPolicy, WorkerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

/// Config file looked up in the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "medchain.toml";

/// Prefix of environment overrides, e.g. `MEDCHAIN_MINING__DIFFICULTY=4`
pub const ENV_PREFIX: &str = "MEDCHAIN";

/// Highest accepted difficulty; beyond this a round effectively never ends
pub const MAX_DIFFICULTY: u32 = 16;

#[derive(Debug, Error)]
pub enum ConfigValidationError {
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct NodeConfig {
    pub mining: MiningConfig,
    pub simulation: SimulationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MiningConfig {
    /// Competing workers per round
    pub workers: usize,
    /// Leading zero hex digits required of a block hash
    pub difficulty: u32,
    /// Valid reports required per block
    pub block_size: usize,
    /// Entries drained from the pool per attempt
    pub pull_size: usize,
    #[serde(with = "duration_ms")]
    pub backoff: Duration,
    pub preemption_policy: PreemptionPolicy,
    /// Fate of verified reports from a batch with too few of them
    pub short_batch_policy: ShortBatchPolicy,
    /// Wall-clock bound on a single round
    #[serde(
        default,
        with = "duration_ms::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub round_timeout: Option<Duration>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SimulationConfig {
    pub patients: usize,
    pub doctors: usize,
    /// Rounds to run before exiting; unbounded when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rounds: Option<u64>,
    #[serde(with = "duration_ms")]
    pub report_interval_min: Duration,
    #[serde(with = "duration_ms")]
    pub report_interval_max: Duration,
    #[serde(with = "duration_ms")]
    pub round_pause: Duration,
    /// Prompt for patient history queries on stdin
    pub interactive: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub thread_ids: bool,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            difficulty: 3,
            block_size: 10,
            pull_size: 20,
            backoff: Duration::from_millis(500),
            preemption_policy: PreemptionPolicy::Drop,
            short_batch_policy: ShortBatchPolicy::Drop,
            round_timeout: None,
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            patients: 10,
            doctors: 3,
            rounds: None,
            report_interval_min: Duration::from_millis(1_000),
            report_interval_max: Duration::from_millis(2_000),
            round_pause: Duration::from_millis(1_000),
            interactive: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            thread_ids: true,
        }
    }
}

impl MiningConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.workers == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "mining.workers must be >= 1".to_string(),
            ));
        }
        if self.difficulty == 0 || self.difficulty > MAX_DIFFICULTY {
            return Err(ConfigValidationError::InvalidRange(format!(
                "mining.difficulty must be between 1 and {MAX_DIFFICULTY}, got {}",
                self.difficulty
            )));
        }
        if self.block_size == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "mining.block_size must be >= 1".to_string(),
            ));
        }
        if self.pull_size < self.block_size {
            return Err(ConfigValidationError::InvalidRange(format!(
                "mining.pull_size ({}) cannot be smaller than mining.block_size ({})",
                self.pull_size, self.block_size
            )));
        }
        if matches!(self.round_timeout, Some(t) if t.is_zero()) {
            return Err(ConfigValidationError::InvalidValue(
                "mining.round_timeout must be > 0 when set".to_string(),
            ));
        }

        let cpus = num_cpus::get();
        if self.workers > cpus {
            warn!(
                workers = self.workers,
                cpus, "More mining workers than CPUs; workers will share cores"
            );
        }
        Ok(())
    }

    /// Per-worker settings derived from this section
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            block_size: self.block_size,
            pull_size: self.pull_size,
            difficulty: self.difficulty,
            backoff: self.backoff,
            preemption_policy: self.preemption_policy,
            short_batch_policy: self.short_batch_policy,
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.patients == 0 || self.doctors == 0 {
            return Err(ConfigValidationError::InvalidValue(
                "simulation.patients and simulation.doctors must be >= 1".to_string(),
            ));
        }
        if self.report_interval_min > self.report_interval_max {
            return Err(ConfigValidationError::InvalidRange(
                "simulation.report_interval_min cannot exceed simulation.report_interval_max"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| {
                ConfigValidationError::InvalidValue(format!(
                    "logging.level '{}' is not a valid filter: {e}",
                    self.level
                ))
            })
    }
}

impl NodeConfig {
    /// Load defaults, then the config file, then environment overrides.
    ///
    /// An explicit `path` must exist. Without one, `medchain.toml` in the
    /// working directory is used if present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match path {
            Some(path) => {
                info!("Loading configuration from: {:?}", path);
                builder = builder.add_source(File::from(path).required(true));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                } else {
                    info!("No configuration file found, using defaults");
                }
                builder = builder.add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: NodeConfig = builder.build()?.try_deserialize()?;
        if let Err(e) = config.validate() {
            return Err(ConfigError::Message(format!(
                "Configuration validation error: {e}"
            )));
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.mining.validate()?;
        self.simulation.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Write the default configuration as TOML
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let toml = toml::to_string_pretty(&Self::default())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml)?;
        info!("Created default configuration file at {:?}", path);
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};
        use std::time::Duration;

        pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match duration {
                Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
        where
            D: Deserializer<'de>,
        {
            Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn toml_file(contents: &str) -> NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = NodeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mining.workers, 5);
        assert_eq!(config.mining.difficulty, 3);
        assert_eq!(config.mining.block_size, 10);
        assert_eq!(config.simulation.patients, 10);
        assert_eq!(config.simulation.doctors, 3);
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let file = toml_file(
            r#"
            [mining]
            difficulty = 2
            block_size = 3
            pull_size = 6
            backoff = 50
            preemption_policy = "requeue"
            short_batch_policy = "requeue"
            round_timeout = 30000

            [simulation]
            rounds = 4
            "#,
        );

        let config = NodeConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.mining.difficulty, 2);
        assert_eq!(config.mining.block_size, 3);
        assert_eq!(config.mining.backoff, Duration::from_millis(50));
        assert_eq!(config.mining.preemption_policy, PreemptionPolicy::Requeue);
        assert_eq!(config.mining.short_batch_policy, ShortBatchPolicy::Requeue);
        assert_eq!(config.mining.round_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.simulation.rounds, Some(4));
        // Untouched sections keep their defaults
        assert_eq!(config.mining.workers, 5);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let file = toml_file(
            r#"
            [mining]
            block_size = 10
            pull_size = 5
            "#,
        );
        let err = NodeConfig::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("pull_size"));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(NodeConfig::load(Some(dir.path().join("absent.toml").as_path())).is_err());
    }

    #[test]
    fn test_write_default_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("conf").join("medchain.toml");
        NodeConfig::write_default(&path).unwrap();

        let config = NodeConfig::load(Some(path.as_path())).unwrap();
        assert_eq!(config.mining.pull_size, 20);
        assert_eq!(config.simulation.round_pause, Duration::from_secs(1));
        assert!(config.mining.round_timeout.is_none());
    }

    #[test]
    fn test_validation_errors() {
        let mut config = NodeConfig::default();
        config.mining.difficulty = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigValidationError::InvalidRange(_))
        ));

        let mut config = NodeConfig::default();
        config.mining.workers = 0;
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.simulation.report_interval_min = Duration::from_secs(3);
        assert!(config.validate().is_err());

        let mut config = NodeConfig::default();
        config.logging.level = "medchain=loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_worker_config_mirrors_mining_section() {
        let mining = MiningConfig {
            difficulty: 4,
            preemption_policy: PreemptionPolicy::Requeue,
            ..MiningConfig::default()
        };
        let worker = mining.worker_config();
        assert_eq!(worker.difficulty, 4);
        assert_eq!(worker.block_size, 10);
        assert_eq!(worker.pull_size, 20);
        assert_eq!(worker.preemption_policy, PreemptionPolicy::Requeue);
        assert_eq!(worker.short_batch_policy, ShortBatchPolicy::Drop);
    }
}
