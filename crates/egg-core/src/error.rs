use thiserror::Error;

#[derive(Debug, Error)]
pub enum EggError {
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EggError {
    /// Short error code string, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            EggError::Config(_) => "CONFIG_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, EggError>;
