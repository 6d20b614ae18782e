use crate::core::hrv::{ArtifactFilter, RrWindow};
use crate::domain::model::HrvFeatures;
use crate::utils::error::{Result, SwipError};
use crate::utils::validation::{self, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::OnceLock;

pub const OUTPUT_FORMATS: [&str; 2] = ["csv", "json"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwipConfig {
    pub model: ModelConfig,
    pub input: Option<InputConfig>,
    pub output: Option<OutputConfig>,
    #[serde(default)]
    pub hrv: HrvConfig,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    pub sidecar: String,
    #[serde(default = "default_true")]
    pub verify_checksum: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    pub path: String,
    /// Column holding the row id; rows are numbered when absent.
    pub id_column: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub path: String,
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HrvConfig {
    #[serde(default = "default_min_rr")]
    pub min_rr_ms: f64,
    #[serde(default = "default_max_rr")]
    pub max_rr_ms: f64,
    #[serde(default = "default_min_beats")]
    pub min_beats: usize,
    #[serde(default = "default_window")]
    pub window_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: Option<String>,
    #[serde(default)]
    pub json: bool,
}

fn default_true() -> bool {
    true
}

fn default_formats() -> Vec<String> {
    vec!["csv".to_string()]
}

fn default_min_rr() -> f64 {
    300.0
}

fn default_max_rr() -> f64 {
    2000.0
}

fn default_min_beats() -> usize {
    3
}

fn default_window() -> f64 {
    60.0
}

impl Default for HrvConfig {
    fn default() -> Self {
        Self {
            min_rr_ms: default_min_rr(),
            max_rr_ms: default_max_rr(),
            min_beats: default_min_beats(),
            window_seconds: default_window(),
        }
    }
}

impl HrvConfig {
    pub fn artifact_filter(&self) -> ArtifactFilter {
        ArtifactFilter {
            min_rr_ms: self.min_rr_ms,
            max_rr_ms: self.max_rr_ms,
            min_beats: self.min_beats,
        }
    }

    pub fn window(&self) -> RrWindow {
        RrWindow::new(self.window_seconds, self.artifact_filter())
    }

    /// Features over the most recent `window_seconds` of clean beats.
    pub fn windowed_features(&self, rr_ms: &[f64]) -> Result<HrvFeatures> {
        let mut window = self.window();
        let accepted = window.extend(rr_ms.iter().copied());
        tracing::debug!(
            "{} of {} beats accepted, {} kept in a {}s window",
            accepted,
            rr_ms.len(),
            window.len(),
            self.window_seconds
        );
        window.features()
    }
}

fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid env var pattern"))
}

impl SwipConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed = Self::substitute_env_vars(content);
        let config = toml::from_str(&processed)?;
        Ok(config)
    }

    /// Replaces `${VAR}` with the environment value; unset variables stay as written.
    fn substitute_env_vars(content: &str) -> String {
        env_var_pattern()
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn output_formats(&self) -> Vec<String> {
        self.output
            .as_ref()
            .map(|o| o.formats.clone())
            .unwrap_or_else(default_formats)
    }

    pub fn log_level(&self) -> Option<&str> {
        self.logging.as_ref().and_then(|l| l.level.as_deref())
    }

    pub fn log_json(&self) -> bool {
        self.logging.as_ref().map(|l| l.json).unwrap_or(false)
    }
}

impl Validate for SwipConfig {
    fn validate(&self) -> Result<()> {
        validation::validate_path("model.path", &self.model.path)?;
        validation::validate_path("model.sidecar", &self.model.sidecar)?;

        if let Some(input) = &self.input {
            validation::validate_path("input.path", &input.path)?;
            validation::validate_file_extension("input.path", &input.path, &["csv"])?;
        }

        if let Some(output) = &self.output {
            validation::validate_path("output.path", &output.path)?;
            validation::validate_allowed_values("output.formats", &output.formats, &OUTPUT_FORMATS)?;
        }

        validation::validate_range("hrv.min_rr_ms", self.hrv.min_rr_ms, 0.0, 10_000.0)?;
        validation::validate_range("hrv.max_rr_ms", self.hrv.max_rr_ms, 0.0, 10_000.0)?;
        if self.hrv.min_rr_ms >= self.hrv.max_rr_ms {
            return Err(SwipError::ConfigValidationError {
                field: "hrv".to_string(),
                message: format!(
                    "min_rr_ms ({}) must be below max_rr_ms ({})",
                    self.hrv.min_rr_ms, self.hrv.max_rr_ms
                ),
            });
        }
        validation::validate_positive_number("hrv.min_beats", self.hrv.min_beats, 3)?;
        if !(self.hrv.window_seconds.is_finite() && self.hrv.window_seconds > 0.0) {
            return Err(SwipError::InvalidConfigValueError {
                field: "hrv.window_seconds".to_string(),
                value: self.hrv.window_seconds.to_string(),
                reason: "Window must be a positive number of seconds".to_string(),
            });
        }

        Ok(())
    }
}
