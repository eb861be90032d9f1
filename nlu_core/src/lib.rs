//! NLU core - protocol parser and slot-filling validator for model completions
//!
//! Renders the prompts that instruct a generative model to answer in a
//! delimiter-based record format, parses the completion back into typed
//! intents, languages and entities, and works out which required slots are
//! still unfilled.

pub mod config;
pub mod error;
pub mod parser;
pub mod protocol;
pub mod registry;
pub mod slots;
pub mod template;
pub mod types;

pub use config::{NluConfig, PersonaConfig};
pub use error::{ConfigError, RenderError};
pub use parser::*;
pub use registry::{normalize_intent_name, RequiredKeysRegistry};
pub use slots::{entities_by_type, missing_keys, SATISFY_THRESHOLD};
pub use template::{
    EntityPromptContext, IntentPromptContext, Message, MessageFormatter, PersonaProfiles,
    PromptRenderer, PromptTemplates, Role, SystemMessageFormatter,
};
pub use types::*;

// Python bindings
#[cfg(feature = "extension-module")]
pub mod py;

#[cfg(feature = "extension-module")]
use pyo3::prelude::*;

#[cfg(feature = "extension-module")]
#[pymodule]
fn nlu_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    use py::*;
    m.add_class::<PyRequiredKeys>()?;
    m.add_function(wrap_pyfunction!(py_parse_entity_output, m)?)?;
    m.add_function(wrap_pyfunction!(py_parse_intent_output, m)?)?;
    m.add_function(wrap_pyfunction!(py_missing_keys, m)?)?;
    Ok(())
}
