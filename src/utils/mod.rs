pub mod error;
pub mod integrity;
pub mod logger;
pub mod validation;
