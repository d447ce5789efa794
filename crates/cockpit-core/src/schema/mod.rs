//! Schema Module
//!
//! Static map of the producer-owned tables:
//! - One [`TableSpec`] per entity kind, naming its table, shadow table and columns
//! - Field-key to column bindings with declared types
//! - Runtime entity-tag discovery and live-schema validation (see [`introspect`])
//!
//! Table and column identifiers used in SQL come only from this catalogue,
//! never from caller input.

pub mod introspect;

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Value as SqlValue;
use serde::{Deserialize, Serialize};

use crate::value::Value;

pub use introspect::{SchemaIntrospector, SchemaReport, TableStatus};

/// Integer primary key column of every producer table
pub const PK_COLUMN: &str = "Z_PK";
/// Polymorphic entity tag column
pub const ENT_COLUMN: &str = "Z_ENT";
/// Optimistic-locking counter column
pub const OPT_COLUMN: &str = "Z_OPT";
/// UUID text identifier column
pub const ID_COLUMN: &str = "ZID";
/// Reference-epoch seconds column
pub const TIMESTAMP_COLUMN: &str = "ZTIMESTAMP";
/// Metadata table mapping entity names to tags
pub const PRIMARY_KEY_TABLE: &str = "Z_PRIMARYKEY";

// ============================================================================
// ENTITY KINDS
// ============================================================================

/// The record kinds stored by the producer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Activity,
    ContextSnapshot,
    Decision,
    Insight,
    AiInteraction,
    ContentIndex,
}

impl EntityKind {
    /// Every kind, including the search-only content index
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Activity,
        EntityKind::ContextSnapshot,
        EntityKind::Decision,
        EntityKind::Insight,
        EntityKind::AiInteraction,
        EntityKind::ContentIndex,
    ];

    /// The kinds that own a full-text shadow table
    pub const SEARCHABLE: [EntityKind; 5] = [
        EntityKind::Activity,
        EntityKind::ContextSnapshot,
        EntityKind::Decision,
        EntityKind::Insight,
        EntityKind::AiInteraction,
    ];

    pub fn spec(self) -> &'static TableSpec {
        match self {
            EntityKind::Activity => &ACTIVITY,
            EntityKind::ContextSnapshot => &CONTEXT_SNAPSHOT,
            EntityKind::Decision => &DECISION,
            EntityKind::Insight => &INSIGHT,
            EntityKind::AiInteraction => &AI_INTERACTION,
            EntityKind::ContentIndex => &CONTENT_INDEX,
        }
    }

    /// Entity name as registered in `Z_PRIMARYKEY.Z_NAME`
    pub fn entity_name(self) -> &'static str {
        self.spec().entity_name
    }

    /// Wire name used by the gateway (`contextSnapshot`, `aiInteraction`, ...)
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Activity => "activity",
            EntityKind::ContextSnapshot => "contextSnapshot",
            EntityKind::Decision => "decision",
            EntityKind::Insight => "insight",
            EntityKind::AiInteraction => "aiInteraction",
            EntityKind::ContentIndex => "contentIndex",
        }
    }

    pub fn is_searchable(self) -> bool {
        self.spec().fts_table.is_some()
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "activity" | "activities" => Ok(EntityKind::Activity),
            "contextsnapshot" | "contextsnapshots" | "snapshot" | "snapshots" => {
                Ok(EntityKind::ContextSnapshot)
            }
            "decision" | "decisions" => Ok(EntityKind::Decision),
            "insight" | "insights" => Ok(EntityKind::Insight),
            "aiinteraction" | "aiinteractions" | "interaction" | "interactions" => {
                Ok(EntityKind::AiInteraction)
            }
            "contentindex" | "content" | "contents" => Ok(EntityKind::ContentIndex),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

// ============================================================================
// COLUMN AND TABLE SPECS
// ============================================================================

/// Declared type of a mapped column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Text,
    Integer,
    Double,
    Bool,
    /// JSON array of strings stored in a BLOB
    StringList,
}

impl FieldType {
    /// Column type the producer framework declares for this field
    pub fn sql_type(self) -> &'static str {
        match self {
            FieldType::Text => "VARCHAR",
            FieldType::Integer | FieldType::Bool => "INTEGER",
            FieldType::Double => "FLOAT",
            FieldType::StringList => "BLOB",
        }
    }
}

/// Binding of one field key to one producer column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Field-map key
    pub field: &'static str,
    /// Producer column name
    pub column: &'static str,
    pub ty: FieldType,
    /// Included in the shadow table
    pub searchable: bool,
    /// Must be present and non-blank on insert
    pub required: bool,
}

impl ColumnSpec {
    const fn new(field: &'static str, column: &'static str, ty: FieldType) -> Self {
        Self {
            field,
            column,
            ty,
            searchable: false,
            required: false,
        }
    }

    const fn text(field: &'static str, column: &'static str) -> Self {
        Self::new(field, column, FieldType::Text)
    }

    const fn searchable(self) -> Self {
        Self {
            searchable: true,
            ..self
        }
    }

    const fn required(self) -> Self {
        Self {
            required: true,
            ..self
        }
    }

    /// Coerce a field value into what this column stores.
    pub fn to_sql(&self, value: &Value) -> Result<SqlValue, String> {
        let mismatch = || format!("field '{}' cannot hold {:?}", self.field, value);
        Ok(match (self.ty, value) {
            (_, Value::Null) => SqlValue::Null,
            (FieldType::Text, Value::Text(s)) => SqlValue::Text(s.clone()),
            (FieldType::Text, Value::Int(i)) => SqlValue::Text(i.to_string()),
            (FieldType::Text, Value::Double(d)) => SqlValue::Text(d.to_string()),
            (FieldType::Text, Value::Bool(b)) => SqlValue::Text(b.to_string()),
            (FieldType::Integer, Value::Text(s)) => {
                SqlValue::Integer(s.trim().parse().map_err(|_| mismatch())?)
            }
            (FieldType::Integer, other) => SqlValue::Integer(other.as_i64().ok_or_else(mismatch)?),
            (FieldType::Double, Value::Text(s)) => {
                SqlValue::Real(s.trim().parse().map_err(|_| mismatch())?)
            }
            (FieldType::Double, other) => SqlValue::Real(other.as_f64().ok_or_else(mismatch)?),
            (FieldType::Bool, Value::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "1" => SqlValue::Integer(1),
                "false" | "no" | "0" => SqlValue::Integer(0),
                _ => return Err(mismatch()),
            },
            (FieldType::Bool, other) => {
                SqlValue::Integer(i64::from(other.as_bool().ok_or_else(mismatch)?))
            }
            (FieldType::StringList, Value::StringArray(items)) => {
                SqlValue::Blob(serde_json::to_vec(items).map_err(|e| e.to_string())?)
            }
            (FieldType::StringList, Value::Bytes(bytes)) => SqlValue::Blob(bytes.clone()),
            (FieldType::StringList, Value::Text(s)) => {
                let items: Vec<String> =
                    serde_json::from_str(s).unwrap_or_else(|_| vec![s.clone()]);
                SqlValue::Blob(serde_json::to_vec(&items).map_err(|e| e.to_string())?)
            }
            _ => return Err(mismatch()),
        })
    }
}

/// Static description of one producer table and its shadow index
#[derive(Debug)]
pub struct TableSpec {
    pub kind: EntityKind,
    /// Name registered in `Z_PRIMARYKEY`
    pub entity_name: &'static str,
    pub table: &'static str,
    /// Full-text shadow table, if the kind is ranked-searchable
    pub fts_table: Option<&'static str>,
    pub columns: &'static [ColumnSpec],
    /// SQL condition over primary columns a row must meet to be searched
    pub search_predicate: Option<&'static str>,
}

impl TableSpec {
    pub fn column_for_field(&self, field: &str) -> Option<&'static ColumnSpec> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn field_for_column(&self, column: &str) -> Option<&'static ColumnSpec> {
        self.columns
            .iter()
            .find(|c| c.column.eq_ignore_ascii_case(column))
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> + '_ {
        self.columns.iter().filter(|c| c.searchable)
    }

    /// Every text column; the substring scan matches against these
    pub fn text_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> + '_ {
        self.columns.iter().filter(|c| c.ty == FieldType::Text)
    }

    pub fn required_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> + '_ {
        self.columns.iter().filter(|c| c.required)
    }

    /// `AND (<predicate>)` for the row-eligibility condition, or nothing.
    pub fn predicate_clause(&self) -> String {
        match self.search_predicate {
            Some(predicate) => format!(" AND ({})", predicate),
            None => String::new(),
        }
    }
}

// ============================================================================
// CATALOGUE
// ============================================================================

static ACTIVITY_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::text("appName", "ZAPPNAME").searchable().required(),
    ColumnSpec::text("windowTitle", "ZWINDOWTITLE").searchable(),
    ColumnSpec::text("url", "ZURL").searchable(),
    ColumnSpec::text("filePath", "ZFILEPATH").searchable(),
    ColumnSpec::text("projectPath", "ZPROJECTPATH").searchable(),
    ColumnSpec::text("category", "ZCATEGORY"),
    ColumnSpec::new("duration", "ZDURATION", FieldType::Double),
    ColumnSpec::new("isIdle", "ZISIDLE", FieldType::Bool),
];

static CONTEXT_SNAPSHOT_COLUMNS: [ColumnSpec; 9] = [
    ColumnSpec::text("title", "ZTITLE").searchable().required(),
    ColumnSpec::text("whatIWasDoing", "ZWHATIWASDOING").searchable(),
    ColumnSpec::text("whyIWasDoingIt", "ZWHYIWASDOINGIT").searchable(),
    ColumnSpec::text("nextSteps", "ZNEXTSTEPS").searchable(),
    ColumnSpec::text("notes", "ZNOTES").searchable(),
    ColumnSpec::text("projectPath", "ZPROJECTPATH"),
    ColumnSpec::text("gitBranch", "ZGITBRANCH"),
    ColumnSpec::new("dirtyFiles", "ZDIRTYFILES", FieldType::StringList),
    ColumnSpec::new("tags", "ZTAGS", FieldType::StringList),
];

static DECISION_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::text("title", "ZTITLE").searchable().required(),
    ColumnSpec::text("context", "ZCONTEXT").searchable(),
    ColumnSpec::text("choice", "ZCHOICE").searchable(),
    ColumnSpec::text("rationale", "ZRATIONALE").searchable(),
    ColumnSpec::text("outcome", "ZOUTCOME").searchable(),
    ColumnSpec::text("projectPath", "ZPROJECTPATH"),
    ColumnSpec::text("status", "ZSTATUS"),
    ColumnSpec::new("tags", "ZTAGS", FieldType::StringList),
];

static INSIGHT_COLUMNS: [ColumnSpec; 6] = [
    ColumnSpec::text("title", "ZTITLE").searchable().required(),
    ColumnSpec::text("content", "ZCONTENT").searchable(),
    ColumnSpec::text("insightType", "ZINSIGHTTYPE"),
    ColumnSpec::new("confidence", "ZCONFIDENCE", FieldType::Double),
    ColumnSpec::new("isDismissed", "ZISDISMISSED", FieldType::Bool),
    ColumnSpec::new("relatedActivityIds", "ZRELATEDACTIVITYIDS", FieldType::StringList),
];

static AI_INTERACTION_COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec::text("prompt", "ZPROMPT").searchable().required(),
    ColumnSpec::text("response", "ZRESPONSE").searchable(),
    ColumnSpec::text("contextSummary", "ZCONTEXTSUMMARY").searchable(),
    ColumnSpec::text("provider", "ZPROVIDER"),
    ColumnSpec::text("model", "ZMODEL"),
    ColumnSpec::new("tokensUsed", "ZTOKENSUSED", FieldType::Integer),
    ColumnSpec::text("status", "ZSTATUS"),
    ColumnSpec::new("isBookmarked", "ZISBOOKMARKED", FieldType::Bool),
];

static CONTENT_INDEX_COLUMNS: [ColumnSpec; 6] = [
    ColumnSpec::text("filePath", "ZFILEPATH").searchable().required(),
    ColumnSpec::text("title", "ZTITLE").searchable(),
    ColumnSpec::text("content", "ZCONTENT").searchable(),
    ColumnSpec::text("contentType", "ZCONTENTTYPE"),
    ColumnSpec::text("fileHash", "ZFILEHASH"),
    ColumnSpec::text("status", "ZSTATUS"),
];

static ACTIVITY: TableSpec = TableSpec {
    kind: EntityKind::Activity,
    entity_name: "Activity",
    table: "ZACTIVITY",
    fts_table: Some("activity_fts"),
    columns: &ACTIVITY_COLUMNS,
    search_predicate: None,
};

static CONTEXT_SNAPSHOT: TableSpec = TableSpec {
    kind: EntityKind::ContextSnapshot,
    entity_name: "ContextSnapshot",
    table: "ZCONTEXTSNAPSHOT",
    fts_table: Some("snapshot_fts"),
    columns: &CONTEXT_SNAPSHOT_COLUMNS,
    search_predicate: None,
};

static DECISION: TableSpec = TableSpec {
    kind: EntityKind::Decision,
    entity_name: "Decision",
    table: "ZDECISION",
    fts_table: Some("decision_fts"),
    columns: &DECISION_COLUMNS,
    search_predicate: None,
};

static INSIGHT: TableSpec = TableSpec {
    kind: EntityKind::Insight,
    entity_name: "Insight",
    table: "ZINSIGHT",
    fts_table: Some("insight_fts"),
    columns: &INSIGHT_COLUMNS,
    search_predicate: Some("COALESCE(ZISDISMISSED, 0) = 0"),
};

static AI_INTERACTION: TableSpec = TableSpec {
    kind: EntityKind::AiInteraction,
    entity_name: "AIInteraction",
    table: "ZAIINTERACTION",
    fts_table: Some("ai_interaction_fts"),
    columns: &AI_INTERACTION_COLUMNS,
    search_predicate: Some("COALESCE(ZSTATUS, '') <> 'failed'"),
};

static CONTENT_INDEX: TableSpec = TableSpec {
    kind: EntityKind::ContentIndex,
    entity_name: "ContentIndex",
    table: "ZCONTENTINDEX",
    fts_table: None,
    columns: &CONTENT_INDEX_COLUMNS,
    search_predicate: Some("COALESCE(ZSTATUS, '') <> 'failed'"),
};
