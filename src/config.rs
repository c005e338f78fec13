//! Stage configuration loader.
//!
//! A single YAML file describes the codec, the transform chain, the worker
//! pool and the NATS connection. Every key is optional.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::codec::{Codec, Format};
use crate::nats::NatsConfig;
use crate::stage::RecordTransformStage;
use crate::transform_registry::{TransformArgs, TransformError, TransformRegistry};
use crate::transforms::Chain;
use crate::worker::WorkerConfig;

/// Stage built from configuration.
pub type ConfiguredStage = RecordTransformStage<Chain, Box<dyn Codec>>;

/// Error type for configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io { path: PathBuf, source: std::io::Error },
    /// The YAML is malformed or has wrong types
    Parse(serde_yaml::Error),
    /// A transform in the list could not be built
    Transform { index: usize, name: String, error: TransformError },
    /// A value is out of range
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "Failed to read config file {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "Failed to parse YAML: {}", e),
            ConfigError::Transform { index, name, error } => {
                write!(f, "Transform #{} ({}): {}", index + 1, name, error)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
            ConfigError::Transform { error, .. } => Some(error),
            ConfigError::Invalid(_) => None,
        }
    }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(err: serde_yaml::Error) -> Self {
        ConfigError::Parse(err)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodecSettings {
    pub format: Format,
    pub pretty: bool,
}

/// One entry of the `transforms` list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformStep {
    pub transform: String,
    #[serde(default)]
    pub args: TransformArgs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub threads: usize,
    pub poll_interval_ms: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            threads: 1,
            poll_interval_ms: 100,
        }
    }
}

impl WorkerSettings {
    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            stop_when_idle: false,
            threads: self.threads,
        }
    }
}

/// Top-level configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub codec: CodecSettings,
    /// Applied in order; empty means identity
    pub transforms: Vec<TransformStep>,
    pub worker: WorkerSettings,
    pub nats: NatsConfig,
}

impl StageConfig {
    /// Load stage configuration from a YAML file.
    ///
    /// # Arguments
    /// * `path` - Path to the YAML file
    ///
    /// # Errors
    /// Returns error if the file can't be read, is not valid YAML, or has
    /// out-of-range values. Transform names are checked later, by
    /// [`StageConfig::build_stage`].
    ///
    /// # Example
    /// ```ignore
    /// use flowstep::{StageConfig, TransformRegistry};
    ///
    /// let config = StageConfig::load_from_file("flowstep.yaml")?;
    /// let stage = config.build_stage(&TransformRegistry::with_builtins())?;
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let config = Self::from_yaml_str(&contents)?;
        tracing::debug!(
            "Loaded config {} with {} transform(s)",
            path.display(),
            config.transforms.len()
        );
        Ok(config)
    }

    /// Parse configuration from a YAML string. An empty document yields the
    /// defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: StageConfig = if yaml.trim().is_empty() {
            StageConfig::default()
        } else {
            serde_yaml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker.threads == 0 {
            return Err(ConfigError::Invalid("worker.threads must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Build the transform chain, failing on the first unknown transform or
    /// invalid arguments.
    pub fn build_chain(&self, registry: &TransformRegistry) -> Result<Chain, ConfigError> {
        let mut chain = Chain::new();
        for (index, step) in self.transforms.iter().enumerate() {
            let transform = registry
                .build(&step.transform, &step.args)
                .map_err(|error| ConfigError::Transform {
                    index,
                    name: step.transform.clone(),
                    error,
                })?;
            chain.push(transform);
        }
        Ok(chain)
    }

    /// Build the configured stage.
    pub fn build_stage(&self, registry: &TransformRegistry) -> Result<ConfiguredStage, ConfigError> {
        let chain = self.build_chain(registry)?;
        tracing::info!(
            "Stage ready: codec={}, transforms=[{}]",
            self.codec.format.codec(self.codec.pretty).name(),
            chain.step_names().join(", ")
        );
        Ok(RecordTransformStage::new(chain).with_codec(self.codec.format.codec(self.codec.pretty)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    const EXAMPLE: &str = r#"
codec:
  format: json
  pretty: false
transforms:
  - transform: convert_key_case
    args: { case: lower }
  - transform: add_field
    args:
      field: label
      template: "${name}-${id}"
worker:
  threads: 2
  poll_interval_ms: 50
nats:
  url: nats://queue:4222
  stream: AUDIT
"#;

    #[test]
    fn test_parse_full_config() {
        let config = StageConfig::from_yaml_str(EXAMPLE).unwrap();

        assert_eq!(config.codec.format, Format::Json);
        assert_eq!(config.transforms.len(), 2);
        assert_eq!(config.transforms[0].transform, "convert_key_case");
        assert_eq!(config.worker.threads, 2);
        assert_eq!(config.worker.worker_config().poll_interval, Duration::from_millis(50));
        assert_eq!(config.nats.url, "nats://queue:4222");
        assert_eq!(config.nats.stream_name, "AUDIT");
        assert_eq!(config.nats.subject_prefix, "records");
    }

    #[test]
    fn test_empty_config_is_identity() {
        let config = StageConfig::from_yaml_str("").unwrap();
        let stage = config.build_stage(&TransformRegistry::with_builtins()).unwrap();
        let host = InMemoryHost::new();
        host.enqueue(r#"{"A": 1}"#);

        let attempt = stage.process(&host).unwrap();

        assert!(attempt.succeeded());
        assert_eq!(host.succeeded()[0].content, br#"{"A":1}"#.to_vec());
    }

    #[test]
    fn test_configured_chain_runs() {
        let config = StageConfig::from_yaml_str(EXAMPLE).unwrap();
        let stage = config.build_stage(&TransformRegistry::with_builtins()).unwrap();
        let host = InMemoryHost::new();
        host.enqueue(r#"{"NAME": "x", "ID": 7}"#);

        stage.process(&host).unwrap();

        assert_eq!(
            host.succeeded()[0].content,
            br#"{"name":"x","id":7,"label":"x-7"}"#.to_vec()
        );
    }

    #[test]
    fn test_unknown_transform_is_rejected() {
        let config = StageConfig::from_yaml_str("transforms:\n  - transform: nope\n").unwrap();

        let err = config.build_stage(&TransformRegistry::with_builtins()).unwrap_err();

        assert!(matches!(err, ConfigError::Transform { index: 0, .. }));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn test_zero_threads_is_invalid() {
        let result = StageConfig::from_yaml_str("worker:\n  threads: 0\n");

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_wrong_types_are_parse_errors() {
        let result = StageConfig::from_yaml_str("transforms: 5\n");

        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
