// src/core/proof/extractor.rs
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::ProofShapeError;
use crate::agent::types::ProofRequestSpec;

const REQUESTED_PROOF: [&str; 3] = ["pres", "indy", "requested_proof"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeValue {
    Known(String),
    Unknown,
}

impl AttributeValue {
    pub fn as_known(&self) -> Option<&str> {
        match self {
            AttributeValue::Known(value) => Some(value),
            AttributeValue::Unknown => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Known(value) => f.write_str(value),
            AttributeValue::Unknown => f.write_str("Unknown"),
        }
    }
}

/// What a finished presentation disclosed. Predicates only ever carry a
/// satisfaction flag; the underlying value is never part of the proof.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VerifiedAttributes {
    pub attributes: BTreeMap<String, AttributeValue>,
    pub predicates: BTreeMap<String, bool>,
}

impl VerifiedAttributes {
    pub fn attribute(&self, name: &str) -> &AttributeValue {
        self.attributes.get(name).unwrap_or(&AttributeValue::Unknown)
    }

    pub fn predicate_satisfied(&self, referent: &str) -> bool {
        self.predicates.get(referent).copied().unwrap_or(false)
    }
}

/// Pulls every requested attribute and predicate out of a presentation's
/// `by_format` payload. Missing or mistyped fields yield `Unknown`/`false`.
pub fn extract(presentation: &Value, spec: &ProofRequestSpec) -> VerifiedAttributes {
    let requested_proof = match walk(presentation, &REQUESTED_PROOF) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!("Presentation has no requested_proof: {}", e);
            None
        }
    };

    let mut extracted = VerifiedAttributes::default();

    for (group, request) in &spec.requested_attributes {
        for name in &request.names {
            let value = match requested_proof {
                Some(proof) => revealed_value(proof, group, name).unwrap_or_else(|e| {
                    debug!(group = %group, attribute = %name, "Attribute not revealed: {}", e);
                    AttributeValue::Unknown
                }),
                None => AttributeValue::Unknown,
            };
            extracted.attributes.insert(name.clone(), value);
        }
    }

    for referent in spec.requested_predicates.keys() {
        let satisfied = requested_proof
            .map(|proof| walk(proof, &["predicates", referent.as_str()]).is_ok())
            .unwrap_or(false);
        extracted.predicates.insert(referent.clone(), satisfied);
    }

    extracted
}

/// Grouped reveals live under `revealed_attr_groups.<group>.values.<name>.raw`;
/// single-attribute reveals under `revealed_attrs.<group>.raw`.
fn revealed_value(
    requested_proof: &Value,
    group: &str,
    name: &str,
) -> Result<AttributeValue, ProofShapeError> {
    let raw = match walk(requested_proof, &["revealed_attr_groups", group, "values", name, "raw"]) {
        Ok(raw) => raw,
        Err(grouped) => walk(requested_proof, &["revealed_attrs", group, "raw"]).map_err(|_| grouped)?,
    };

    match raw {
        Value::String(value) => Ok(AttributeValue::Known(value.clone())),
        _ => Err(ProofShapeError::UnexpectedType(format!("{group}.{name}.raw"))),
    }
}

fn walk<'a>(root: &'a Value, path: &[&str]) -> Result<&'a Value, ProofShapeError> {
    let mut current = root;
    for (depth, key) in path.iter().enumerate() {
        let object = match current.as_object() {
            Some(object) => object,
            None => return Err(ProofShapeError::UnexpectedType(path[..depth].join("."))),
        };
        current = match object.get(*key) {
            Some(next) => next,
            None => return Err(ProofShapeError::MissingField(path[..=depth].join("."))),
        };
    }
    Ok(current)
}
