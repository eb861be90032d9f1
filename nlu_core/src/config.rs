//! Settings value handed to the registry and the renderer
//!
//! Loaded once at startup from TOML and optional `NLU_*` variables. The
//! variables are passed in explicitly; nothing in this crate reads the process
//! environment on its own.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const ENV_ENTITIES: &str = "NLU_ENTITY";
pub const ENV_INTENT_LIST: &str = "NLU_INTENT";
pub const ENV_REQUIRED_PREFIX: &str = "NLU_REQUIRED_";

const DEFAULT_ENTITIES: &str = "product,quantity,brand,price,color,model,spec,budget,warranty,delivery";
const DEFAULT_INTENT_LIST: &str = "greet:0.1, purchase_intent:0.8, inquiry_intent:0.7, support_intent:0.6, complain_intent:0.6, complaint:0.5, cancel_order:0.4, ask_price:0.6, compare_product:0.5, delivery_issue:0.7";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NluConfig {
    /// Entity vocabulary the model may emit
    pub entities: Vec<String>,
    /// `name:priority` pairs shown to the intent classifier
    pub intent_list: String,
    pub persona: PersonaConfig,
    /// Intent name to the slots it needs, in the order they should be asked for
    pub required_keys: BTreeMap<String, Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersonaConfig {
    pub brand_name: String,
    pub channel: String,
    pub target_segments: String,
    pub mbti_type: String,
}

impl Default for NluConfig {
    fn default() -> Self {
        Self {
            entities: split_csv(DEFAULT_ENTITIES),
            intent_list: DEFAULT_INTENT_LIST.to_string(),
            persona: PersonaConfig::default(),
            required_keys: BTreeMap::new(),
        }
    }
}

impl Default for PersonaConfig {
    fn default() -> Self {
        Self {
            brand_name: "Chative Brand".to_string(),
            channel: "Online Storefront".to_string(),
            target_segments: "Young Professionals seeking lifestyle upgrades".to_string(),
            mbti_type: "EXPERT".to_string(),
        }
    }
}

impl NluConfig {
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|source| ConfigError::ParseFile {
            path: origin.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw, path)?;
        debug!(
            path = %path.display(),
            intents = config.required_keys.len(),
            "loaded nlu config"
        );
        Ok(config)
    }

    /// Apply `NLU_ENTITY`, `NLU_INTENT` and `NLU_REQUIRED_<INTENT>` overrides.
    ///
    /// Required-key variables replace any file entry for the same normalized
    /// intent name. Blank values are ignored.
    pub fn with_env_overrides<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let (key, value) = (key.as_ref(), value.as_ref());
            if value.trim().is_empty() {
                continue;
            }

            if key == ENV_ENTITIES {
                self.entities = split_csv(value);
            } else if key == ENV_INTENT_LIST {
                self.intent_list = value.trim().to_string();
            } else if let Some(intent) = key.strip_prefix(ENV_REQUIRED_PREFIX) {
                let intent = crate::registry::normalize_intent_name(intent);
                if intent.is_empty() {
                    continue;
                }
                self.required_keys
                    .retain(|name, _| crate::registry::normalize_intent_name(name) != intent);
                self.required_keys.insert(intent, split_csv(value));
            }
        }
        self
    }
}

/// Split a comma-separated list, trimming items and dropping blanks
pub fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
