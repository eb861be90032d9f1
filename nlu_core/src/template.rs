//! Prompt rendering
//!
//! Fills the embedded prompt templates from caller context and checks that
//! every template marker resolved before the prompt is sent anywhere. The grammar tokens the model
//! is told to emit come from [`crate::protocol`], so the prompt and the parser
//! always agree on delimiters.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::config::{NluConfig, PersonaConfig};
use crate::error::{ConfigError, RenderError};
use crate::protocol::{COMPLETION_DELIMITER, RECORD_DELIMITER, TUPLE_DELIMITER};
use crate::registry::RequiredKeysRegistry;

const ENTITY_TEMPLATE: &str = include_str!("../templates/entity_system.txt");
const INTENT_TEMPLATE: &str = include_str!("../templates/intent_system.txt");
const PERSONA_TEMPLATE: &str = include_str!("../templates/persona_system.txt");
const PERSONA_PROFILES: &str = include_str!("../templates/mbti.json");

const UNRESOLVED_MARKER: &str = "{{";
const EMPTY_REQUIRED_KEYS: &str = "none";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

/// Hook that turns rendered prompt text into chat messages
pub trait MessageFormatter: Send + Sync {
    fn format(&self, prompt: String) -> Vec<Message>;
}

/// Wraps the prompt into a single system message
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemMessageFormatter;

impl MessageFormatter for SystemMessageFormatter {
    fn format(&self, prompt: String) -> Vec<Message> {
        vec![Message {
            role: Role::System,
            content: prompt,
        }]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplates {
    pub entity: String,
    pub intent: String,
    pub persona: String,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            entity: ENTITY_TEMPLATE.to_string(),
            intent: INTENT_TEMPLATE.to_string(),
            persona: PERSONA_TEMPLATE.to_string(),
        }
    }
}

/// Persona descriptions keyed by uppercase type name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonaProfiles {
    profiles: BTreeMap<String, String>,
}

impl PersonaProfiles {
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_json(PERSONA_PROFILES)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let parsed: BTreeMap<String, String> =
            serde_json::from_str(raw).map_err(|e| ConfigError::InvalidProfiles(e.to_string()))?;
        Ok(Self {
            profiles: parsed
                .into_iter()
                .map(|(name, text)| (name.trim().to_uppercase(), text))
                .collect(),
        })
    }

    pub fn get(&self, profile: &str) -> Option<&str> {
        self.profiles.get(&profile.trim().to_uppercase()).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

/// Context for the entity-extraction prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPromptContext {
    pub intent_name: String,
    pub required_keys: Vec<String>,
    pub allowed_entities: Vec<String>,
    pub user_message: String,
    pub language: String,
}

impl EntityPromptContext {
    /// Context for `intent_name` using the configured vocabulary and the registry's slots
    pub fn for_intent(
        config: &NluConfig,
        registry: &RequiredKeysRegistry,
        intent_name: &str,
        user_message: &str,
        language: &str,
    ) -> Self {
        Self {
            intent_name: intent_name.to_string(),
            required_keys: registry.required_keys_for(intent_name),
            allowed_entities: config.entities.clone(),
            user_message: user_message.to_string(),
            language: language.to_string(),
        }
    }
}

/// Context for the intent-classification prompt
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentPromptContext {
    pub intent_list_csv: String,
}

impl From<&NluConfig> for IntentPromptContext {
    fn from(config: &NluConfig) -> Self {
        Self {
            intent_list_csv: config.intent_list.clone(),
        }
    }
}

pub struct PromptRenderer {
    templates: PromptTemplates,
    profiles: PersonaProfiles,
    formatter: Box<dyn MessageFormatter>,
}

impl PromptRenderer {
    /// Renderer over the embedded templates and persona profiles
    pub fn new() -> Result<Self, ConfigError> {
        Ok(Self::with_parts(PromptTemplates::default(), PersonaProfiles::embedded()?))
    }

    pub fn with_parts(templates: PromptTemplates, profiles: PersonaProfiles) -> Self {
        Self {
            templates,
            profiles,
            formatter: Box::new(SystemMessageFormatter),
        }
    }

    pub fn with_formatter(mut self, formatter: impl MessageFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    pub fn profiles(&self) -> &PersonaProfiles {
        &self.profiles
    }

    /// Render the entity-extraction prompt.
    ///
    /// Context values are inserted verbatim, braces included; only markers
    /// written in the template itself must all resolve.
    pub fn render_entity_prompt(&self, ctx: &EntityPromptContext) -> Result<String, RenderError> {
        let intent_name = required("intent_name", &ctx.intent_name)?;
        let user_message = required("user_message", &ctx.user_message)?;
        let language = required("language", &ctx.language)?;

        // Sorted so identical input always renders the identical prompt.
        let allowed: BTreeSet<&str> = ctx
            .allowed_entities
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .collect();
        if allowed.is_empty() {
            return Err(ConfigError::EmptyField { field: "allowed_entities" }.into());
        }
        let allowed_csv = allowed.into_iter().collect::<Vec<_>>().join(",");

        let required_keys: Vec<&str> = ctx
            .required_keys
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        let required_csv = if required_keys.is_empty() {
            EMPTY_REQUIRED_KEYS.to_string()
        } else {
            required_keys.join(",")
        };

        let content = substitute(
            &self.templates.entity,
            &[
                ("intent_name", intent_name),
                ("required_keys_csv", required_csv.as_str()),
                ("allowed_entities_csv", allowed_csv.as_str()),
                ("user_message", user_message),
                ("language", language),
            ],
        )?;
        self.wrap("entity", content)
    }

    pub fn render_intent_prompt(&self, ctx: &IntentPromptContext) -> Result<String, RenderError> {
        let intent_list = required("intent_list_csv", &ctx.intent_list_csv)?;
        let content = substitute(&self.templates.intent, &[("intent_list", intent_list)])?;
        self.wrap("intent", content)
    }

    pub fn render_persona_prompt(&self, ctx: &PersonaConfig) -> Result<String, RenderError> {
        let brand_name = required("brand_name", &ctx.brand_name)?;
        let channel = required("channel", &ctx.channel)?;
        let target_segments = required("target_segments", &ctx.target_segments)?;
        let mbti_type = required("mbti_type", &ctx.mbti_type)?.to_uppercase();

        let profile = self
            .profiles
            .get(&mbti_type)
            .ok_or_else(|| ConfigError::ProfileNotFound { profile: mbti_type.clone() })?;

        let content = substitute(
            &self.templates.persona,
            &[
                ("BRAND_NAME", brand_name),
                ("CHANNEL", channel),
                ("TARGET_SEGMENTS", target_segments),
                ("MBTI_TYPE", mbti_type.as_str()),
                ("MBTI", profile.trim()),
            ],
        )?;
        self.wrap("persona", content)
    }

    fn wrap(&self, flavor: &'static str, content: String) -> Result<String, RenderError> {
        match self.formatter.format(content).into_iter().next() {
            Some(message) => {
                debug!(flavor, chars = message.content.len(), "rendered prompt");
                Ok(message.content)
            }
            None => {
                error!(flavor, "message formatter returned no messages");
                Err(RenderError::Internal(format!("{flavor} prompt: formatter returned no messages")))
            }
        }
    }
}

fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ConfigError::EmptyField { field });
    }
    Ok(value)
}

const GRAMMAR_BINDINGS: [(&str, &str); 3] = [
    ("record_delimiter", RECORD_DELIMITER),
    ("tuple_delimiter", TUPLE_DELIMITER),
    ("completion_delimiter", COMPLETION_DELIMITER),
];

fn placeholder_pattern() -> &'static Regex {
    static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();
    PLACEHOLDER
        .get_or_init(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("Invalid regex pattern"))
}

fn lookup<'v>(bindings: &[(&str, &'v str)], name: &str) -> Option<&'v str> {
    bindings
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, value)| *value)
}

/// Replace `{{name}}` markers in one pass.
///
/// The leftover-marker check runs on the template with its known markers
/// removed, before any value goes in, so a value may itself contain braces.
/// Single pass means a substituted value is never expanded. Grammar
/// delimiters are always available to every template.
fn substitute(template: &str, values: &[(&str, &str)]) -> Result<String, ConfigError> {
    let pattern = placeholder_pattern();
    let mut bindings: Vec<(&str, &str)> = values.to_vec();
    bindings.extend_from_slice(&GRAMMAR_BINDINGS);

    let skeleton = pattern.replace_all(template, |caps: &Captures| match lookup(&bindings, &caps[1]) {
        Some(_) => String::new(),
        None => caps[0].to_string(),
    });
    if let Some(at) = skeleton.find(UNRESOLVED_MARKER) {
        let placeholder = pattern
            .find(&skeleton[at..])
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNRESOLVED_MARKER.to_string());
        warn!(%placeholder, "unresolved placeholder in prompt template");
        return Err(ConfigError::UnresolvedPlaceholder { placeholder });
    }

    let rendered = pattern.replace_all(template, |caps: &Captures| {
        lookup(&bindings, &caps[1])
            .map(str::to_string)
            .unwrap_or_else(|| caps[0].to_string())
    });
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> PromptRenderer {
        PromptRenderer::new().unwrap()
    }

    fn entity_ctx() -> EntityPromptContext {
        EntityPromptContext {
            intent_name: "ask_price".to_string(),
            required_keys: vec!["product".to_string(), "brand".to_string()],
            allowed_entities: vec!["product".to_string(), "brand".to_string(), "price".to_string()],
            user_message: "how much is the iPhone 15?".to_string(),
            language: "eng".to_string(),
        }
    }

    #[test]
    fn test_render_entity_prompt() {
        let prompt = renderer().render_entity_prompt(&entity_ctx()).unwrap();
        assert!(!prompt.contains("{{"));
        assert!(prompt.contains("how much is the iPhone 15?"));
        assert!(prompt.contains("brand,price,product"));
        assert!(prompt.contains("product,brand"));
        assert!(prompt.contains("(entity<||>"));
        assert!(prompt.contains("<|COMPLETE|>"));
    }

    #[test]
    fn test_allowed_entities_deduplicated() {
        let mut ctx = entity_ctx();
        ctx.allowed_entities = vec!["brand".to_string(), "price".to_string(), " brand ".to_string()];
        let prompt = renderer().render_entity_prompt(&ctx).unwrap();
        assert!(prompt.contains("brand,price\n"));
        assert_eq!(prompt.matches("brand,price").count(), 1);
    }

    #[test]
    fn test_entity_render_is_deterministic() {
        let mut ctx = entity_ctx();
        ctx.allowed_entities = vec!["warranty", "color", "brand", "model", "delivery"]
            .into_iter()
            .map(String::from)
            .collect();
        let r = renderer();
        assert_eq!(r.render_entity_prompt(&ctx).unwrap(), r.render_entity_prompt(&ctx).unwrap());
    }

    #[test]
    fn test_empty_required_keys_render_none() {
        let mut ctx = entity_ctx();
        ctx.required_keys.clear();
        let prompt = renderer().render_entity_prompt(&ctx).unwrap();
        assert!(prompt.contains("-Required keys for this intent-\nnone\n"));
    }

    #[test]
    fn test_blank_fields_rejected() {
        let r = renderer();
        for field in ["intent_name", "user_message", "language", "allowed_entities"] {
            let mut ctx = entity_ctx();
            match field {
                "intent_name" => ctx.intent_name = "  ".to_string(),
                "user_message" => ctx.user_message = "\n".to_string(),
                "language" => ctx.language = String::new(),
                _ => ctx.allowed_entities = vec![" ".to_string()],
            }
            match r.render_entity_prompt(&ctx) {
                Err(RenderError::Config(ConfigError::EmptyField { field: f })) => assert_eq!(f, field),
                other => panic!("Expected empty-field error for {}, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_render_intent_prompt() {
        let r = renderer();
        let prompt = r
            .render_intent_prompt(&IntentPromptContext::from(&NluConfig::default()))
            .unwrap();
        assert!(prompt.contains("purchase_intent:0.8"));
        assert!(prompt.contains("{\"source\":\"config\"}##"));
        assert!(!prompt.contains("{{"));

        let err = r
            .render_intent_prompt(&IntentPromptContext { intent_list_csv: " ".to_string() })
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_render_persona_prompt() {
        let persona = PersonaConfig {
            mbti_type: "expert".to_string(),
            ..PersonaConfig::default()
        };
        let prompt = renderer().render_persona_prompt(&persona).unwrap();
        assert!(prompt.contains("Chative Brand"));
        assert!(prompt.contains("Persona: EXPERT"));
        assert!(prompt.contains("Knowledgeable and precise"));
    }

    #[test]
    fn test_unknown_persona_profile() {
        let persona = PersonaConfig {
            mbti_type: "xyzw".to_string(),
            ..PersonaConfig::default()
        };
        match renderer().render_persona_prompt(&persona) {
            Err(RenderError::Config(ConfigError::ProfileNotFound { profile })) => assert_eq!(profile, "XYZW"),
            other => panic!("Expected missing profile, got {:?}", other),
        }
    }

    #[test]
    fn test_unresolved_placeholder_rejected() {
        let templates = PromptTemplates {
            intent: "Intents: {{intent_list}}\nTone: {{ tone }}".to_string(),
            ..PromptTemplates::default()
        };
        let r = PromptRenderer::with_parts(templates, PersonaProfiles::embedded().unwrap());
        match r.render_intent_prompt(&IntentPromptContext { intent_list_csv: "greet:0.1".to_string() }) {
            Err(RenderError::Config(ConfigError::UnresolvedPlaceholder { placeholder })) => {
                assert_eq!(placeholder, "{{ tone }}")
            }
            other => panic!("Expected unresolved placeholder, got {:?}", other),
        }
    }

    #[test]
    fn test_braces_in_user_message_kept_verbatim() {
        let mut ctx = entity_ctx();
        ctx.user_message = "price of {{ item }} template book? my language is {{language}}".to_string();
        let prompt = renderer().render_entity_prompt(&ctx).unwrap();
        assert!(prompt.contains("Message: price of {{ item }} template book? my language is {{language}}\n"));
        assert!(prompt.contains("-Customer language-\neng\n"));
    }

    #[test]
    fn test_stray_marker_in_template_rejected() {
        let templates = PromptTemplates {
            intent: "Intents: {{intent_list}}\nBroken: {{".to_string(),
            ..PromptTemplates::default()
        };
        let r = PromptRenderer::with_parts(templates, PersonaProfiles::embedded().unwrap());
        match r.render_intent_prompt(&IntentPromptContext { intent_list_csv: "greet:0.1".to_string() }) {
            Err(RenderError::Config(ConfigError::UnresolvedPlaceholder { placeholder })) => {
                assert_eq!(placeholder, "{{")
            }
            other => panic!("Expected unresolved placeholder, got {:?}", other),
        }
    }

    struct Silent;

    impl MessageFormatter for Silent {
        fn format(&self, _prompt: String) -> Vec<Message> {
            Vec::new()
        }
    }

    #[test]
    fn test_empty_formatter_is_internal_error() {
        let r = renderer().with_formatter(Silent);
        let err = r.render_entity_prompt(&entity_ctx()).unwrap_err();
        assert!(matches!(err, RenderError::Internal(_)));
    }

    #[test]
    fn test_persona_profiles_parse() {
        let profiles = PersonaProfiles::from_json(r#"{"calm": "Slow and steady."}"#).unwrap();
        assert_eq!(profiles.get("Calm"), Some("Slow and steady."));
        assert!(PersonaProfiles::from_json("[]").is_err());
    }
}
