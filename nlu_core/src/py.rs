//! Python bindings for the parser and validator using PyO3

use std::collections::HashMap;

use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::parser::{parse_entity_output, parse_intent_output};
use crate::registry::RequiredKeysRegistry;
use crate::types::{EntitySpan, Meta};

fn meta_json(meta: &Meta) -> PyResult<String> {
    serde_json::to_string(meta).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Failed to serialize meta: {}", e))
    })
}

fn entity_dict<'py>(py: Python<'py>, e: &EntitySpan) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new_bound(py);
    dict.set_item("type", &e.entity_type)?;
    dict.set_item("raw", &e.raw)?;
    dict.set_item("start", e.start)?;
    dict.set_item("end", e.end)?;
    dict.set_item("confidence", e.confidence)?;
    Ok(dict)
}

/// Parse an entity-extraction completion (never raises on malformed text)
#[pyfunction]
#[pyo3(name = "parse_entity_output")]
pub fn py_parse_entity_output<'py>(py: Python<'py>, raw: &str) -> PyResult<Bound<'py, PyDict>> {
    let output = parse_entity_output(raw);

    let entities = output
        .entities
        .iter()
        .map(|e| entity_dict(py, e))
        .collect::<PyResult<Vec<_>>>()?;

    let dict = PyDict::new_bound(py);
    dict.set_item("entities", entities)?;
    dict.set_item("missing", output.missing)?;
    dict.set_item("language", output.language)?;
    Ok(dict)
}

/// Parse an intent-classification completion. Meta maps come back as JSON strings.
#[pyfunction]
#[pyo3(name = "parse_intent_output")]
pub fn py_parse_intent_output<'py>(py: Python<'py>, raw: &str) -> PyResult<Bound<'py, PyDict>> {
    let output = parse_intent_output(raw);

    let intents = output
        .intents
        .iter()
        .map(|i| -> PyResult<Bound<'py, PyDict>> {
            let dict = PyDict::new_bound(py);
            dict.set_item("name", &i.name)?;
            dict.set_item("confidence", i.confidence)?;
            dict.set_item("priority_score", i.priority)?;
            dict.set_item("meta", meta_json(&i.meta)?)?;
            Ok(dict)
        })
        .collect::<PyResult<Vec<_>>>()?;

    let languages = output
        .languages
        .iter()
        .map(|l| -> PyResult<Bound<'py, PyDict>> {
            let dict = PyDict::new_bound(py);
            dict.set_item("code", &l.code)?;
            dict.set_item("confidence", l.confidence)?;
            dict.set_item("primary_flag", l.primary_flag)?;
            dict.set_item("meta", meta_json(&l.meta)?)?;
            Ok(dict)
        })
        .collect::<PyResult<Vec<_>>>()?;

    let dict = PyDict::new_bound(py);
    dict.set_item("intents", intents)?;
    dict.set_item("languages", languages)?;
    Ok(dict)
}

/// Parse an entity completion and return the required keys it leaves unfilled
#[pyfunction]
#[pyo3(name = "missing_keys")]
pub fn py_missing_keys(raw: &str, required: Vec<String>) -> Vec<String> {
    parse_entity_output(raw).missing_keys(&required)
}

/// Python wrapper for the required-keys registry
#[pyclass(name = "RequiredKeys")]
pub struct PyRequiredKeys {
    registry: RequiredKeysRegistry,
}

#[pymethods]
impl PyRequiredKeys {
    /// Build from a dict of intent name to list of slot keys
    #[new]
    fn new(entries: HashMap<String, Vec<String>>) -> Self {
        Self {
            registry: RequiredKeysRegistry::from_entries(
                entries.iter().map(|(name, keys)| (name.as_str(), keys.as_slice())),
            ),
        }
    }

    fn required_keys_for(&self, intent_name: &str) -> Vec<String> {
        self.registry.required_keys_for(intent_name)
    }

    fn __len__(&self) -> usize {
        self.registry.len()
    }
}
