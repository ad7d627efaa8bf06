use serde::Deserialize;
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_MODEL_CANDIDATES: [&str; 3] = [
    "tb_model_balanced.onnx",
    "tb_model_final_balanced.onnx",
    "tb_model.onnx",
];

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(
        default = "default_log_level",
        deserialize_with = "deserialize_log_level"
    )]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub gradcam: GradCamConfig,
}

fn deserialize_log_level<'de, D>(deserializer: D) -> Result<LogLevel, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.try_into().map_err(serde::de::Error::custom)
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl ServerConfig {
    pub fn get_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub model_dir: PathBuf,
    /// Tried in order; the first file that loads is served.
    #[serde(default = "default_candidates")]
    pub candidates: Vec<String>,
    #[serde(default)]
    pub intra_threads: Option<usize>,
}

fn default_candidates() -> Vec<String> {
    DEFAULT_MODEL_CANDIDATES
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl ModelConfig {
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        self.candidates
            .iter()
            .map(|c| self.model_dir.join(c))
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GradCamConfig {
    #[serde(default = "default_backbone")]
    pub backbone: String,
    #[serde(default = "default_layer")]
    pub layer: String,
    #[serde(default = "default_alpha")]
    pub alpha: f32,
}

impl Default for GradCamConfig {
    fn default() -> Self {
        Self {
            backbone: default_backbone(),
            layer: default_layer(),
            alpha: default_alpha(),
        }
    }
}

fn default_backbone() -> String {
    "densenet121".to_string()
}

fn default_layer() -> String {
    "conv5_block16_concat".to_string()
}

fn default_alpha() -> f32 {
    crate::gradcam::DEFAULT_ALPHA
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

#[derive(Debug, Deserialize, Clone, PartialEq)]
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
    let base_path = std::env::current_dir().expect("Failed to determine the current directory");
    let env: HashMap<String, String> = std::env::vars().collect();

    load_configuration(&base_path.join("configuration"), &env)
}

/// Layers `base.yaml`, the `APP_ENVIRONMENT` file, `APP_`-prefixed variables
/// and finally `PORT` from `env`.
pub fn load_configuration(
    configuration_directory: &Path,
    env: &HashMap<String, String>,
) -> Result<Config, config::ConfigError> {
    let environment: Environment = env
        .get("APP_ENVIRONMENT")
        .cloned()
        .unwrap_or_else(|| "local".into())
        .try_into()
        .map_err(config::ConfigError::Message)?;

    let app_vars: config::Map<String, String> = env
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    let config = config::Config::builder()
        .set_default("server.port", DEFAULT_PORT as i64)?
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__")
                .source(Some(app_vars)),
        )
        // The deployment contract only knows about a bare `PORT`.
        .set_override_option("server.port", env.get("PORT").cloned())?
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;

    Ok(config)
}
