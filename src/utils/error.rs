use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwipError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Sidecar metadata not found: {path}")]
    SidecarNotFound { path: String },

    #[error("Model not found: {path}")]
    ModelNotFound { path: String },

    #[error("Invalid model: {message}")]
    InvalidModel { message: String },

    #[error("Missing feature '{name}'. Need: {expected:?}")]
    MissingFeature { name: String, expected: Vec<String> },

    #[error("Invalid value for feature '{name}': {reason}")]
    InvalidFeature { name: String, reason: String },

    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("Insufficient data: {message}")]
    InsufficientData { message: String },

    #[error("Inference error: {message}")]
    InferenceError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Io,
    Configuration,
    Model,
    Input,
    Integrity,
    Inference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SwipError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SwipError::IoError(_) => ErrorCategory::Io,
            SwipError::SerializationError(_)
            | SwipError::CsvError(_)
            | SwipError::MissingFeature { .. }
            | SwipError::InvalidFeature { .. }
            | SwipError::InsufficientData { .. } => ErrorCategory::Input,
            SwipError::TomlError(_)
            | SwipError::ConfigError { .. }
            | SwipError::ConfigValidationError { .. }
            | SwipError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            SwipError::SidecarNotFound { .. }
            | SwipError::ModelNotFound { .. }
            | SwipError::InvalidModel { .. } => ErrorCategory::Model,
            SwipError::ChecksumMismatch { .. } => ErrorCategory::Integrity,
            SwipError::InferenceError { .. } => ErrorCategory::Inference,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Input => ErrorSeverity::Medium,
            ErrorCategory::Configuration | ErrorCategory::Model | ErrorCategory::Inference => {
                ErrorSeverity::High
            }
            ErrorCategory::Io | ErrorCategory::Integrity => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            SwipError::IoError(_) => "Check that the file exists and is readable".to_string(),
            SwipError::SerializationError(_) => "Check that the JSON document is well formed".to_string(),
            SwipError::CsvError(_) => "Check the CSV header and column counts".to_string(),
            SwipError::TomlError(_)
            | SwipError::ConfigError { .. }
            | SwipError::ConfigValidationError { .. }
            | SwipError::InvalidConfigValueError { .. } => {
                "Review the configuration file against the documented keys".to_string()
            }
            SwipError::SidecarNotFound { path } => {
                format!("Place the sidecar metadata at {} or pass --sidecar", path)
            }
            SwipError::ModelNotFound { path } => {
                format!("Place the model file at {} or pass --model", path)
            }
            SwipError::InvalidModel { .. } => "Re-export the model from the training pipeline".to_string(),
            SwipError::MissingFeature { expected, .. } => {
                format!("Provide all features: {}", expected.join(", "))
            }
            SwipError::InvalidFeature { .. } => "Feature values must be finite numbers".to_string(),
            SwipError::ChecksumMismatch { .. } => {
                "The model file does not match its sidecar; download both again".to_string()
            }
            SwipError::InsufficientData { .. } => "Collect more beats before requesting features".to_string(),
            SwipError::InferenceError { .. } => "Check that the model and sidecar belong together".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Io => format!("Could not access a file: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Model => format!("Model could not be loaded: {}", self),
            ErrorCategory::Input => format!("Input rejected: {}", self),
            ErrorCategory::Integrity => format!("Integrity check failed: {}", self),
            ErrorCategory::Inference => format!("Inference failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, SwipError>;
