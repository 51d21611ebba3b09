//! Views over knowledge graph (v3 API) payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};

pub const INSTANCE_ID_PREFIX: &str = "https://kg.ebrains.eu/api/instances/";
pub const META_VOCAB_PREFIX: &str = "https://core.kg.ebrains.eu/vocab/meta/";

const META_USER: &str = "https://core.kg.ebrains.eu/vocab/meta/user";
const META_SPACE: &str = "https://core.kg.ebrains.eu/vocab/meta/space";
const META_REVISION: &str = "https://core.kg.ebrains.eu/vocab/meta/revision";
const SCHEMA_IDENTIFIER: &str = "http://schema.org/identifier";
const SCHEMA_NAME: &str = "http://schema.org/name";
pub const SCHEMA_ALTERNATE_NAME: &str = "http://schema.org/alternateName";

/// Instance stage in the graph store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    InProgress,
    Released,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::InProgress => "IN_PROGRESS",
            Stage::Released => "RELEASED",
        }
    }

    /// `UNRELEASED` instances are read from the draft stage, everything else
    /// from the released stage.
    pub fn from_release_status(status: &str) -> Self {
        if status == "UNRELEASED" {
            Stage::InProgress
        } else {
            Stage::Released
        }
    }
}

/// Canonical view of a graph instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KgInstance {
    pub id: Uuid,
    pub creator: Uuid,
    #[serde(rename = "type")]
    pub types: Vec<String>,
    pub space: String,
    pub revision: String,
    pub data: Map<String, Value>,
}

impl KgInstance {
    /// Split the graph-store envelope fields from the instance content.
    /// A payload missing the envelope fields counts as an empty answer.
    pub fn from_kg_response(value: Value) -> GatewayResult<Self> {
        let Value::Object(mut data) = value else {
            return Err(GatewayError::NoData);
        };

        data.remove(SCHEMA_IDENTIFIER);
        let id = data
            .remove("@id")
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or(GatewayError::NoData)
            .and_then(|at_id| instance_id_from(&at_id))?;
        let creator = data
            .remove(META_USER)
            .and_then(|user| user.get("@id").and_then(Value::as_str).map(str::to_owned))
            .ok_or(GatewayError::NoData)
            .and_then(|at_id| instance_id_from(&at_id))?;
        let types = match data.remove("@type") {
            Some(Value::Array(items)) => items
                .into_iter()
                .filter_map(|v| v.as_str().map(str::to_owned))
                .collect(),
            Some(Value::String(single)) => vec![single],
            _ => return Err(GatewayError::NoData),
        };
        let space = take_string(&mut data, META_SPACE)?;
        let revision = take_string(&mut data, META_REVISION)?;

        Ok(Self {
            id,
            creator,
            types,
            space,
            revision,
            data,
        })
    }
}

fn take_string(data: &mut Map<String, Value>, key: &str) -> GatewayResult<String> {
    match data.remove(key) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => Ok(other.to_string()),
        None => Err(GatewayError::NoData),
    }
}

/// Extract the instance UUID from an `@id` IRI (or a bare id)
pub fn instance_id_from(at_id: &str) -> GatewayResult<Uuid> {
    let raw = at_id.strip_prefix(INSTANCE_ID_PREFIX).unwrap_or(at_id);
    Uuid::parse_str(raw).map_err(|_| GatewayError::NoData)
}

/// Remove graph-store managed vocabulary before writing an instance
pub fn strip_meta_vocabulary(content: Value) -> Value {
    match content {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !key.starts_with(META_VOCAB_PREFIX))
                .collect(),
        ),
        other => other,
    }
}

/// Space as listed by the graph store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSpace {
    pub name: String,
}

impl GraphSpace {
    pub fn from_kg_data(value: &Value) -> Option<Self> {
        value.get(SCHEMA_NAME).and_then(Value::as_str).map(|name| Self {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kg_payload(id: Uuid, creator: Uuid) -> Value {
        json!({
            "@id": format!("{INSTANCE_ID_PREFIX}{id}"),
            "@type": ["https://openminds.ebrains.eu/core/Person"],
            "http://schema.org/identifier": [format!("{INSTANCE_ID_PREFIX}{id}")],
            "https://core.kg.ebrains.eu/vocab/meta/user": {"@id": format!("{INSTANCE_ID_PREFIX}{creator}")},
            "https://core.kg.ebrains.eu/vocab/meta/space": "collab-hdc-project",
            "https://core.kg.ebrains.eu/vocab/meta/revision": "_abc123",
            "https://openminds.ebrains.eu/vocab/givenName": "Jane"
        })
    }

    #[test]
    fn test_instance_view_separates_envelope_from_content() {
        let (id, creator) = (Uuid::new_v4(), Uuid::new_v4());
        let instance = KgInstance::from_kg_response(kg_payload(id, creator)).unwrap();

        assert_eq!(instance.id, id);
        assert_eq!(instance.creator, creator);
        assert_eq!(instance.space, "collab-hdc-project");
        assert_eq!(instance.revision, "_abc123");
        assert_eq!(instance.data.len(), 1);
        assert_eq!(
            instance.data["https://openminds.ebrains.eu/vocab/givenName"],
            json!("Jane")
        );
    }

    #[test]
    fn test_malformed_payload_is_no_data() {
        assert_eq!(
            KgInstance::from_kg_response(json!({"@id": "not-a-uuid"})),
            Err(GatewayError::NoData)
        );
        assert_eq!(KgInstance::from_kg_response(json!([])), Err(GatewayError::NoData));
    }

    #[test]
    fn test_strip_meta_vocabulary() {
        let cleaned = strip_meta_vocabulary(kg_payload(Uuid::new_v4(), Uuid::new_v4()));
        let keys: Vec<&String> = cleaned.as_object().unwrap().keys().collect();
        assert!(keys.iter().all(|k| !k.starts_with(META_VOCAB_PREFIX)));
        assert!(cleaned.get("@id").is_some());
    }

    #[test]
    fn test_stage_from_release_status() {
        assert_eq!(Stage::from_release_status("UNRELEASED"), Stage::InProgress);
        assert_eq!(Stage::from_release_status("RELEASED"), Stage::Released);
        assert_eq!(Stage::from_release_status("HAS_CHANGED"), Stage::Released);
    }
}
