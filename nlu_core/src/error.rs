use std::path::PathBuf;

use thiserror::Error;

/// Bad or incomplete configuration. Aborts prompt construction before any model call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required value `{field}` is empty")]
    EmptyField { field: &'static str },
    #[error("rendered prompt still contains unresolved placeholder `{placeholder}`")]
    UnresolvedPlaceholder { placeholder: String },
    #[error("persona profile `{profile}` not found")]
    ProfileNotFound { profile: String },
    #[error("persona profiles are invalid: {0}")]
    InvalidProfiles(String),
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("internal error: {0}")]
    Internal(String),
}

impl RenderError {
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
