//! Typed entities
//!
//! Strongly-typed views of the six record kinds. Each converts to and from a
//! field map through serde, so the typed API and the field-map API share one
//! storage path.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::schema::EntityKind;
use crate::storage::{ListFilter, Result, Store, StorageError};
use crate::value::{FieldMap, field_map_from_json, field_map_to_json};

/// A record kind with a typed representation
pub trait Entity: Serialize + DeserializeOwned {
    const KIND: EntityKind;

    fn to_fields(&self) -> Result<FieldMap> {
        let json = serde_json::to_value(self)
            .map_err(|e| StorageError::InvalidInput(e.to_string()))?;
        field_map_from_json(json)
            .ok_or_else(|| StorageError::InvalidInput(format!("{} is not an object", Self::KIND)))
    }

    fn from_fields(fields: &FieldMap) -> Result<Self> {
        serde_json::from_value(field_map_to_json(fields)).map_err(|e| StorageError::DecodeFailure {
            field: Self::KIND.to_string(),
            message: e.to_string(),
        })
    }
}

/// One observed stretch of application focus
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub app_name: String,
    #[serde(default)]
    pub window_title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub duration: Option<f64>,
    #[serde(default)]
    pub is_idle: Option<bool>,
}

/// A saved "where was I" snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    #[serde(default)]
    pub what_i_was_doing: Option<String>,
    #[serde(default)]
    pub why_i_was_doing_it: Option<String>,
    #[serde(default)]
    pub next_steps: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub dirty_files: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A recorded decision and its reasoning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub choice: Option<String>,
    #[serde(default)]
    pub rationale: Option<String>,
    #[serde(default)]
    pub outcome: Option<String>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub insight_type: Option<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub is_dismissed: Option<bool>,
    #[serde(default)]
    pub related_activity_ids: Vec<String>,
}

/// One prompt/response exchange with an AI provider
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInteraction {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub prompt: String,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub context_summary: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub tokens_used: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub is_bookmarked: Option<bool>,
}

/// Indexed text of a source file or document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentIndexEntry {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    pub file_path: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub file_hash: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl Entity for Activity {
    const KIND: EntityKind = EntityKind::Activity;
}

impl Entity for ContextSnapshot {
    const KIND: EntityKind = EntityKind::ContextSnapshot;
}

impl Entity for Decision {
    const KIND: EntityKind = EntityKind::Decision;
}

impl Entity for Insight {
    const KIND: EntityKind = EntityKind::Insight;
}

impl Entity for AiInteraction {
    const KIND: EntityKind = EntityKind::AiInteraction;
}

impl Entity for ContentIndexEntry {
    const KIND: EntityKind = EntityKind::ContentIndex;
}

impl Store {
    /// Insert a typed record, returning its id.
    pub fn insert_entity<E: Entity>(&mut self, entity: &E) -> Option<String> {
        match entity.to_fields() {
            Ok(fields) => self.insert(E::KIND, fields),
            Err(e) => {
                tracing::warn!(kind = %E::KIND, error = %e, "Could not convert entity");
                None
            }
        }
    }

    pub fn get_entity<E: Entity>(&mut self, id: &str) -> Option<E> {
        let fields = self.get(E::KIND, id)?;
        match E::from_fields(&fields) {
            Ok(entity) => Some(entity),
            Err(e) => {
                tracing::warn!(kind = %E::KIND, id, error = %e, "Could not decode entity");
                None
            }
        }
    }

    /// Typed [`Store::list`]; rows that fail to decode are skipped.
    pub fn list_entities<E: Entity>(&mut self, filter: &ListFilter, limit: usize) -> Vec<E> {
        self.list(E::KIND, filter, limit)
            .iter()
            .filter_map(|fields| match E::from_fields(fields) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(kind = %E::KIND, error = %e, "Skipping undecodable row");
                    None
                }
            })
            .collect()
    }
}
