//! Required-keys registry
//!
//! Maps an intent name to the ordered slots that must be filled before the
//! intent can be acted on. Built once from [`NluConfig`] and read-only after.

use ahash::AHashMap;

use crate::config::NluConfig;

/// Canonical registry key: trimmed, spaces and hyphens as `_`, uppercase.
///
/// `"ask price"`, `"ask-price"` and `"ASK_PRICE"` all resolve the same entry.
pub fn normalize_intent_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other,
        })
        .collect::<String>()
        .to_uppercase()
}

#[derive(Debug, Clone, Default)]
pub struct RequiredKeysRegistry {
    entries: AHashMap<String, Vec<String>>,
}

impl RequiredKeysRegistry {
    pub fn from_config(config: &NluConfig) -> Self {
        Self::from_entries(
            config
                .required_keys
                .iter()
                .map(|(name, keys)| (name.as_str(), keys.as_slice())),
        )
    }

    /// Build from `(intent, keys)` pairs. Later duplicates of a normalized name win.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [String])>,
    {
        let entries: AHashMap<String, Vec<String>> = entries
            .into_iter()
            .map(|(name, keys)| {
                let keys: Vec<String> = keys
                    .iter()
                    .map(|k| k.trim())
                    .filter(|k| !k.is_empty())
                    .map(str::to_string)
                    .collect();
                (normalize_intent_name(name), keys)
            })
            .filter(|(name, _)| !name.is_empty())
            .collect();
        Self { entries }
    }

    /// Slots for `intent_name` in configured order; empty when nothing is configured.
    pub fn required_keys_for(&self, intent_name: &str) -> Vec<String> {
        let key = normalize_intent_name(intent_name);
        if key.is_empty() {
            return Vec::new();
        }
        self.entries.get(&key).cloned().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
