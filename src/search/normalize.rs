//! Result normalization
//!
//! Converts engine-native hits into canonical records. This is a structural
//! passthrough: hits are never dropped, reordered or deduplicated, and the
//! engine's total is reported as-is even when it exceeds the hits returned.

use crate::models::{Conversation, Message, MessageHit};
use crate::search::error::{SearchError, SearchResult};
use crate::search::schema::Entity;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Engine search response envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSearchResponse {
    pub hits: RawHits,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHits {
    #[serde(default)]
    pub total: Option<RawTotal>,

    #[serde(default)]
    pub hits: Vec<RawHit>,
}

impl RawHits {
    /// Engine-reported match count; falls back to the page length when the
    /// engine omitted totals
    pub fn total_count(&self) -> u64 {
        match self.total {
            Some(RawTotal::Count(n)) => n,
            Some(RawTotal::Tracked { value, .. }) => value,
            None => self.hits.len() as u64,
        }
    }
}

/// `hits.total` is an object on current engines and a bare number on older ones
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum RawTotal {
    Count(u64),
    Tracked {
        value: u64,
        #[serde(default)]
        relation: Option<String>,
    },
}

/// A single engine hit
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawHit {
    #[serde(rename = "_id", default)]
    pub id: Option<String>,

    #[serde(rename = "_score", default)]
    pub score: Option<f64>,

    #[serde(rename = "_source", default)]
    pub source: Value,

    /// Highlighted fragments keyed by field name
    #[serde(default)]
    pub highlight: Option<HashMap<String, Vec<String>>>,
}

impl RawHit {
    fn fragment(&self, field: &str) -> Option<String> {
        self.highlight
            .as_ref()
            .and_then(|h| h.get(field))
            .and_then(|fragments| fragments.first())
            .cloned()
    }
}

/// A canonical search result record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum SearchRecord {
    Conversation(Conversation),
    Message(MessageHit),
}

impl SearchRecord {
    pub fn id(&self) -> &str {
        match self {
            SearchRecord::Conversation(c) => &c.id,
            SearchRecord::Message(m) => &m.message.id,
        }
    }

    pub fn as_message(&self) -> Option<&MessageHit> {
        match self {
            SearchRecord::Message(m) => Some(m),
            SearchRecord::Conversation(_) => None,
        }
    }

    pub fn as_conversation(&self) -> Option<&Conversation> {
        match self {
            SearchRecord::Conversation(c) => Some(c),
            SearchRecord::Message(_) => None,
        }
    }
}

/// Normalized search response returned at the API boundary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub hits: Vec<SearchRecord>,

    /// Engine-reported match count; may exceed `hits.len()`
    pub total: u64,
}

/// Convert engine hits for `target` into canonical records
pub fn normalize(target: Entity, hits: Vec<RawHit>, total: u64) -> SearchResult<SearchResponse> {
    let records = hits
        .into_iter()
        .enumerate()
        .map(|(position, hit)| normalize_hit(target, position, hit))
        .collect::<SearchResult<Vec<_>>>()?;

    Ok(SearchResponse {
        hits: records,
        total,
    })
}

/// Convenience wrapper over [`normalize`] for a whole engine response
pub fn normalize_response(target: Entity, raw: RawSearchResponse) -> SearchResult<SearchResponse> {
    let total = raw.hits.total_count();
    normalize(target, raw.hits.hits, total)
}

fn normalize_hit(target: Entity, position: usize, hit: RawHit) -> SearchResult<SearchRecord> {
    let malformed = |reason: serde_json::Error| SearchError::MalformedHit {
        id: hit
            .id
            .clone()
            .unwrap_or_else(|| format!("#{}", position)),
        reason: reason.to_string(),
    };

    match target {
        Entity::Conversation => {
            let conversation: Conversation =
                serde_json::from_value(hit.source.clone()).map_err(malformed)?;
            Ok(SearchRecord::Conversation(conversation))
        }
        Entity::Message => {
            let message: Message = serde_json::from_value(hit.source.clone()).map_err(malformed)?;
            Ok(SearchRecord::Message(MessageHit {
                message,
                highlighted: hit.fragment("text"),
            }))
        }
    }
}
