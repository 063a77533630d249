// Alert data types.
//
// An Alert is kept as the raw key-value record the feed sent. Only a handful
// of fields are interpreted (uuid, type, reportBy, location); everything else
// rides along so the Unknown renderer can dump it verbatim.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Feed field holding the dedup identifier.
pub const ID_FIELD: &str = "uuid";
/// Feed field holding the category tag.
pub const TYPE_FIELD: &str = "type";

/// One raw record from the alert feed. Identity is the `uuid` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Alert {
    fields: Map<String, Value>,
}

impl Alert {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Build an alert from a JSON value. Anything that isn't an object is rejected.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Some(Self { fields }),
            _ => None,
        }
    }

    /// The dedup identifier, if present and a non-empty string.
    pub fn id(&self) -> Option<&str> {
        self.str_field(ID_FIELD).filter(|s| !s.is_empty())
    }

    /// The raw category tag, if present and a non-empty string.
    pub fn tag(&self) -> Option<&str> {
        self.str_field(TYPE_FIELD).filter(|s| !s.is_empty())
    }

    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }
}

/// The closed set of categories an alert can fall into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Comment,
    Police,
    Jam,
    Accident,
    Unknown,
}

impl AlertCategory {
    pub const ALL: [AlertCategory; 5] = [
        AlertCategory::Comment,
        AlertCategory::Police,
        AlertCategory::Jam,
        AlertCategory::Accident,
        AlertCategory::Unknown,
    ];

    /// Map a feed tag to a category. Tags match exactly as the feed sends
    /// them; anything else is `Unknown`, never an error.
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "CHIT_CHAT" => AlertCategory::Comment,
            "POLICE" | "POLICEMAN" => AlertCategory::Police,
            "JAM" => AlertCategory::Jam,
            "ACCIDENT" => AlertCategory::Accident,
            _ => AlertCategory::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::Comment => "comment",
            AlertCategory::Police => "police",
            AlertCategory::Jam => "jam",
            AlertCategory::Accident => "accident",
            AlertCategory::Unknown => "unknown",
        }
    }

    /// Parse the lowercase name produced by `as_str` (used by config lists).
    pub fn parse_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for AlertCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable rendering of one alert, ready for a push sink or stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNotification {
    pub kind: AlertCategory,
    pub text: String,
}
