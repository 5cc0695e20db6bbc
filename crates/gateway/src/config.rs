use common::{Environment, LogLevel};
use config::ConfigError;
use inference::InferenceConfig;
use serde::{Deserialize, Deserializer};

pub const ENV_PREFIX: &str = "DETECTOR";
pub const DEFAULT_ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png,bmp,tiff,webp";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log_level: LogLevel,
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub model_path: String,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub input_size: u32,
    pub max_upload_size_mb: u64,
    pub max_dimension: u32,
    #[serde(deserialize_with = "extension_list")]
    pub allowed_extensions: Vec<String>,
    /// 0 means one worker per available core.
    pub inference_workers: usize,
    pub model_load_retries: u32,
    #[serde(default)]
    pub otel_endpoint: Option<String>,
}

impl Settings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        (self.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
    }

    pub fn workers(&self) -> usize {
        match self.inference_workers {
            0 => inference::config::default_workers(),
            n => n,
        }
    }

    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            model_path: self.model_path.clone(),
            input_size: (self.input_size, self.input_size),
            confidence_threshold: self.confidence_threshold,
            iou_threshold: self.iou_threshold,
            workers: self.workers(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let unit_range = 0.0..=1.0;
        if !unit_range.contains(&self.confidence_threshold) {
            return Err(invalid(format!(
                "confidence_threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !unit_range.contains(&self.iou_threshold) {
            return Err(invalid(format!(
                "iou_threshold must be within [0, 1], got {}",
                self.iou_threshold
            )));
        }
        if self.max_dimension == 0 {
            return Err(invalid("max_dimension must be positive".to_string()));
        }
        if self.input_size == 0 {
            return Err(invalid("input_size must be positive".to_string()));
        }
        if self.max_upload_size_mb == 0 {
            return Err(invalid("max_upload_size_mb must be positive".to_string()));
        }
        if self.allowed_extensions.is_empty() {
            return Err(invalid("allowed_extensions must name at least one extension".to_string()));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Message(message)
}

/// Accepts `"jpg, .PNG"` as well as a list, trimming dots, case and blanks.
fn extension_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Joined(String),
        List(Vec<String>),
    }

    let items = match Raw::deserialize(deserializer)? {
        Raw::Joined(s) => s.split(',').map(str::to_string).collect(),
        Raw::List(v) => v,
    };

    let mut extensions: Vec<String> = items
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();
    extensions.dedup();
    Ok(extensions)
}

pub fn get_configuration() -> Result<Settings, ConfigError> {
    build_configuration(None)
}

/// Build settings from defaults plus `DETECTOR_*` variables. `overrides`
/// replaces the process environment when given.
pub fn build_configuration(
    overrides: Option<config::Map<String, String>>,
) -> Result<Settings, ConfigError> {
    let settings = config::Config::builder()
        .set_default("log_level", "info")?
        .set_default("environment", "development")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", 8000)?
        .set_default("model_path", "models/yolov8n.onnx")?
        .set_default("confidence_threshold", 0.5)?
        .set_default("iou_threshold", 0.45)?
        .set_default("input_size", 640)?
        .set_default("max_upload_size_mb", 10)?
        .set_default("max_dimension", preprocess::DEFAULT_MAX_DIMENSION as i64)?
        .set_default("allowed_extensions", DEFAULT_ALLOWED_EXTENSIONS)?
        .set_default("inference_workers", 0)?
        .set_default("model_load_retries", 3)?
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(overrides),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    settings.validate()?;

    Ok(settings)
}
