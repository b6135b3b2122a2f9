use crate::harness::StreamParams;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub recognizer_service: RecognizerServiceConfig,
    #[serde(default)]
    pub benchmark: BenchmarkConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

#[derive(Debug, Deserialize, Clone)]
pub struct RecognizerServiceConfig {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub compression: Compression,
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl RecognizerServiceConfig {
    pub fn get_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn get_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

fn default_max_message_size() -> usize {
    16 * 1024 * 1024
}

fn default_connect_timeout_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    10
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BenchmarkConfig {
    #[serde(default = "default_unary_repetitions")]
    pub unary_repetitions: u32,
    #[serde(default = "default_pose_count")]
    pub pose_count: i32,
    #[serde(default = "default_recognize_images")]
    pub recognize_images: usize,
    #[serde(default)]
    pub sweep: SweepConfig,
}

fn default_unary_repetitions() -> u32 {
    10
}

fn default_pose_count() -> i32 {
    100
}

fn default_recognize_images() -> usize {
    10
}

impl Default for BenchmarkConfig {
    fn default() -> Self {
        Self {
            unary_repetitions: default_unary_repetitions(),
            pose_count: default_pose_count(),
            recognize_images: default_recognize_images(),
            sweep: SweepConfig::default(),
        }
    }
}

/// Payload sizes, item counts and delays whose combinations are each run
/// as a separate `Benchmark` stream.
#[derive(Debug, Deserialize, Clone)]
pub struct SweepConfig {
    pub sizes: Vec<i32>,
    pub counts: Vec<i32>,
    pub delays_ms: Vec<i64>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            sizes: vec![1024],
            counts: vec![100],
            delays_ms: vec![0],
        }
    }
}

impl SweepConfig {
    pub fn runs(&self) -> Vec<StreamParams> {
        self.sizes
            .iter()
            .flat_map(|&size| {
                self.counts.iter().flat_map(move |&count| {
                    self.delays_ms.iter().map(move |&delay_ms| StreamParams {
                        size,
                        count,
                        delay_ms,
                    })
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Production => "production",
        }
    }
}

impl TryFrom<String> for Environment {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            other => Err(format!(
                "{} is not a supported environment. Use either `local` or `production`.",
                other
            )),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub enum LogLevel {
    Debug,
    Info,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

impl TryFrom<String> for LogLevel {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            other => Err(format!(
                "{} is not a supported minimum log level. Use either `debug` or `info`.",
                other
            )),
        }
    }
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let configuration_directory = base_path.join("configuration");

    let environment: Environment = std::env::var("APP_ENVIRONMENT")
        .unwrap_or_else(|_| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(config::File::from(
            configuration_directory.join(format!("{}.yaml", environment.as_str())),
        ))
        .add_source(
            config::Environment::with_prefix("BENCH")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sweep_runs_cover_every_combination() {
        let sweep = SweepConfig {
            sizes: vec![1024, 4096],
            counts: vec![5, 50],
            delays_ms: vec![0, 10, 100],
        };

        let runs = sweep.runs();

        assert_eq!(runs.len(), 12);
        assert_eq!(
            runs[0],
            StreamParams {
                size: 1024,
                count: 5,
                delay_ms: 0
            }
        );
        assert_eq!(
            runs[11],
            StreamParams {
                size: 4096,
                count: 50,
                delay_ms: 100
            }
        );
    }

    #[test]
    fn test_empty_axis_yields_no_runs() {
        let sweep = SweepConfig {
            sizes: vec![1024],
            counts: vec![],
            delays_ms: vec![0],
        };

        assert!(sweep.runs().is_empty());
    }

    #[test]
    fn test_address_has_scheme() {
        let config = RecognizerServiceConfig {
            host: "localhost".to_string(),
            port: 50051,
            compression: Compression::Gzip,
            max_message_size: default_max_message_size(),
            connect_timeout_ms: default_connect_timeout_ms(),
            max_retries: default_max_retries(),
        };

        assert_eq!(config.get_address(), "http://localhost:50051");
        assert_eq!(config.get_connect_timeout(), Duration::from_secs(1));
    }
}
