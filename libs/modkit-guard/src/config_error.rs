use modkit_ability::AbilityConfigError;
use thiserror::Error;

/// Errors raised while loading or validating guard configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load guard configuration: {0}")]
    Load(Box<figment::Error>),

    #[error("invalid ability configuration: {0}")]
    Ability(#[from] AbilityConfigError),

    #[error("`{0}` must not be empty")]
    EmptyValue(&'static str),

    #[error("invalid credential header name: {0}")]
    InvalidHeader(String),

    #[error("`{0}` and `{1}` cannot both be configured")]
    Conflict(&'static str, &'static str),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}
