//! Common test utilities for search testing
//!
//! [`FakeIndex`] is an in-memory [`IndexBackend`] that evaluates the subset
//! of query DSL the compiler emits, so search behavior can be checked end to
//! end without a running cluster.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex};
use threadseek::models::{parse_timestamp, AttachmentType, Conversation, Message, Participant};
use threadseek::search::{
    BulkDocument, IndexBackend, IndexConfig, RawSearchResponse, SearchError, SearchResult,
    SearchService,
};

#[derive(Default)]
struct StoredIndex {
    mappings: Value,
    docs: BTreeMap<String, Value>,
}

/// In-memory stand-in for the search cluster
#[derive(Default)]
pub struct FakeIndex {
    indices: Mutex<BTreeMap<String, StoredIndex>>,
    searches: Mutex<Vec<(String, Value)>>,
    unreachable: AtomicBool,
    reject_create: Mutex<Option<String>>,
}

impl FakeIndex {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fake with both default indices created and populated with `docs`
    pub fn with_documents(conversations: &[Conversation], messages: &[Message]) -> Arc<Self> {
        let fake = Self::new();
        fake.put_all("conversations", conversations, |c| c.id.clone());
        fake.put_all("messages", messages, |m| m.id.clone());
        fake
    }

    pub fn put_all<T: serde::Serialize>(
        &self,
        index: &str,
        items: &[T],
        id: impl Fn(&T) -> String,
    ) {
        let mut indices = self.indices.lock().unwrap();
        let stored = indices.entry(index.to_string()).or_default();
        for item in items {
            stored.docs.insert(id(item), serde_json::to_value(item).unwrap());
        }
    }

    /// Store a raw source document, bypassing serialization
    pub fn put_raw(&self, index: &str, id: &str, source: Value) {
        let mut indices = self.indices.lock().unwrap();
        indices
            .entry(index.to_string())
            .or_default()
            .docs
            .insert(id.to_string(), source);
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, AtomicOrdering::SeqCst);
    }

    /// Make `create_index` fail for one index name
    pub fn reject_create(&self, index: &str) {
        *self.reject_create.lock().unwrap() = Some(index.to_string());
    }

    pub fn create_mapping(&self, index: &str, mappings: Value) {
        let mut indices = self.indices.lock().unwrap();
        indices.entry(index.to_string()).or_default().mappings = mappings;
    }

    pub fn doc_count(&self, index: &str) -> usize {
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map_or(0, |i| i.docs.len())
    }

    pub fn has_index(&self, index: &str) -> bool {
        self.indices.lock().unwrap().contains_key(index)
    }

    /// Every `(index, body)` pair searched so far
    pub fn searches(&self) -> Vec<(String, Value)> {
        self.searches.lock().unwrap().clone()
    }

    pub fn last_search(&self) -> Option<(String, Value)> {
        self.searches.lock().unwrap().last().cloned()
    }

    fn check_reachable(&self) -> SearchResult<()> {
        if self.unreachable.load(AtomicOrdering::SeqCst) {
            Err(SearchError::IndexUnavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IndexBackend for FakeIndex {
    async fn search(&self, index: &str, body: &Value) -> SearchResult<RawSearchResponse> {
        self.check_reachable()?;
        self.searches
            .lock()
            .unwrap()
            .push((index.to_string(), body.clone()));

        let indices = self.indices.lock().unwrap();
        let stored = indices
            .get(index)
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))?;

        let mut matched: Vec<(&String, &Value)> = stored
            .docs
            .iter()
            .filter(|(_, doc)| matches(&body["query"], doc))
            .collect();

        if let Some(sort) = body["sort"].as_array() {
            matched.sort_by(|a, b| compare(sort, a.1, b.1));
        }

        let total = matched.len();
        if let Some(size) = body["size"].as_u64() {
            matched.truncate(size as usize);
        }

        let hits: Vec<Value> = matched
            .into_iter()
            .map(|(id, doc)| {
                let mut hit = json!({ "_id": id, "_score": 1.0, "_source": doc });
                if let Some(highlight) = highlight(body, doc) {
                    hit["highlight"] = highlight;
                }
                hit
            })
            .collect();

        Ok(serde_json::from_value(json!({
            "hits": { "total": { "value": total, "relation": "eq" }, "hits": hits }
        }))
        .unwrap())
    }

    async fn bulk_index(&self, index: &str, documents: &[BulkDocument]) -> SearchResult<usize> {
        self.check_reachable()?;
        let mut indices = self.indices.lock().unwrap();
        let stored = indices.entry(index.to_string()).or_default();
        for doc in documents {
            stored.docs.insert(doc.id.clone(), doc.document.clone());
        }
        Ok(documents.len())
    }

    async fn index_exists(&self, index: &str) -> SearchResult<bool> {
        self.check_reachable()?;
        Ok(self.has_index(index))
    }

    async fn create_index(&self, index: &str, body: &Value) -> SearchResult<Value> {
        self.check_reachable()?;
        if self.reject_create.lock().unwrap().as_deref() == Some(index) {
            return Err(SearchError::Provisioning {
                index: index.to_string(),
                message: "resource_already_exists_exception".to_string(),
            });
        }
        self.create_mapping(index, body["mappings"].clone());
        Ok(json!({ "acknowledged": true, "index": index }))
    }

    async fn delete_index(&self, index: &str) -> SearchResult<()> {
        self.check_reachable()?;
        self.indices
            .lock()
            .unwrap()
            .remove(index)
            .map(|_| ())
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))
    }

    async fn get_mapping(&self, index: &str) -> SearchResult<Value> {
        self.check_reachable()?;
        self.indices
            .lock()
            .unwrap()
            .get(index)
            .map(|i| i.mappings.clone())
            .ok_or_else(|| SearchError::IndexNotFound(index.to_string()))
    }

    async fn ping(&self) -> bool {
        self.check_reachable().is_ok()
    }

    async fn health(&self) -> SearchResult<Value> {
        self.check_reachable()?;
        Ok(json!({ "cluster_name": "fake", "status": "green" }))
    }

    async fn info(&self) -> SearchResult<Value> {
        self.check_reachable()?;
        Ok(json!({ "name": "fake-node", "version": { "number": "2.11.0" } }))
    }
}

fn matches(query: &Value, doc: &Value) -> bool {
    let Some((kind, clause)) = query.as_object().and_then(|q| q.iter().next()) else {
        return true;
    };

    match kind.as_str() {
        "match_all" => true,
        "bool" => {
            let all = |key: &str| {
                clause[key]
                    .as_array()
                    .map_or(true, |cs| cs.iter().all(|c| matches(c, doc)))
            };
            all("must") && all("filter")
        }
        "term" => {
            let (field, value) = single_entry(clause);
            let field = field.strip_suffix(".keyword").unwrap_or(field);
            match &doc[field] {
                Value::Array(items) => items.contains(value),
                other => other == value,
            }
        }
        "range" => {
            let (field, bounds) = single_entry(clause);
            let Some(date) = doc[field].as_str().and_then(|d| parse_timestamp(d).ok()) else {
                return false;
            };
            let bound = |op: &str| bounds[op].as_str().map(|b| parse_timestamp(b).unwrap());
            bound("gt").map_or(true, |b| date > b)
                && bound("gte").map_or(true, |b| date >= b)
                && bound("lt").map_or(true, |b| date < b)
                && bound("lte").map_or(true, |b| date <= b)
        }
        "multi_match" => {
            let terms = tokens(clause["query"].as_str().unwrap_or_default());
            let fields: Vec<&str> = clause["fields"]
                .as_array()
                .unwrap()
                .iter()
                .map(|f| f.as_str().unwrap().split('^').next().unwrap())
                .collect();
            fields.iter().any(|field| {
                doc[*field]
                    .as_str()
                    .is_some_and(|text| {
                        tokens(text).iter().any(|w| terms.iter().any(|t| fuzzy_eq(t, w)))
                    })
            })
        }
        other => panic!("fake index does not understand '{}' clauses", other),
    }
}

fn single_entry(clause: &Value) -> (&str, &Value) {
    let (k, v) = clause.as_object().unwrap().iter().next().unwrap();
    (k.as_str(), v)
}

fn compare(sort: &[Value], a: &Value, b: &Value) -> Ordering {
    for key in sort {
        let (field, spec) = single_entry(key);
        let ordering = if field == "date" {
            let date = |d: &Value| d[field].as_str().and_then(|s| parse_timestamp(s).ok());
            date(a).cmp(&date(b))
        } else {
            a[field].as_str().cmp(&b[field].as_str())
        };
        let ordering = if spec["order"] == "desc" {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn highlight(body: &Value, doc: &Value) -> Option<Value> {
    let spec = body.get("highlight")?;
    let terms = tokens(body.pointer("/query/bool/must/0/multi_match/query")?.as_str()?);
    let pre = spec["pre_tags"][0].as_str()?;
    let post = spec["post_tags"][0].as_str()?;

    let mut fragments = Map::new();
    for field in spec["fields"].as_object()?.keys() {
        let Some(text) = doc[field].as_str() else { continue };
        let mut marked = false;
        let fragment = text
            .split(' ')
            .map(|word| {
                let bare = word.trim_matches(|c: char| !c.is_alphanumeric());
                if terms.iter().any(|t| fuzzy_eq(t, &bare.to_lowercase())) && !bare.is_empty() {
                    marked = true;
                    word.replacen(bare, &format!("{}{}{}", pre, bare, post), 1)
                } else {
                    word.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        if marked {
            fragments.insert(field.clone(), json!([fragment]));
        }
    }
    (!fragments.is_empty()).then(|| Value::Object(fragments))
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Edit-distance match with the engine's AUTO thresholds
fn fuzzy_eq(term: &str, word: &str) -> bool {
    let allowed = match term.chars().count() {
        0..=2 => 0,
        3..=5 => 1,
        _ => 2,
    };
    levenshtein(term, word) <= allowed
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current.push((prev[j] + cost).min(prev[j + 1] + 1).min(current[j] + 1));
        }
        prev = current;
    }
    prev[b.len()]
}

/// 2024-01-17 at the given time, UTC
pub fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 17, hour, minute, 0).unwrap()
}

pub fn message(
    id: &str,
    conversation_id: &str,
    handle: &str,
    text: &str,
    date: DateTime<Utc>,
) -> Message {
    Message {
        id: id.to_string(),
        conversation_id: conversation_id.to_string(),
        username: handle.trim_end_matches(char::is_numeric).to_string(),
        handle: handle.to_string(),
        text: text.to_string(),
        date,
        mentions: BTreeSet::new(),
        attachment_type: None,
        pinned: false,
    }
}

pub fn conversation(
    id: &str,
    handle: &str,
    other: &str,
    last_message: &str,
    date: DateTime<Utc>,
) -> Conversation {
    let username = |h: &str| h.trim_end_matches(char::is_numeric).to_string();
    Conversation {
        id: id.to_string(),
        username: username(handle),
        handle: handle.to_string(),
        last_message: last_message.to_string(),
        date,
        participants: vec![
            Participant::new(username(handle), handle),
            Participant::new(username(other), other),
        ],
    }
}

/// Two short threads between sarah123, john456 and emma789
pub fn sample_conversations() -> Vec<Conversation> {
    vec![
        conversation("1", "sarah123", "john456", "Yes, let's meet at the coffee shop!", at(11, 30)),
        conversation("2", "sarah123", "emma789", "The project deadline is next week", at(14, 45)),
    ]
}

pub fn sample_messages() -> Vec<Message> {
    let mut greeting = message("1", "1", "sarah123", "Hey, how are you?", at(10, 0));
    greeting.pinned = true;

    let mut reply = message("2", "1", "john456", "I'm good! How about you?", at(10, 5));
    reply.mentions.insert("sarah123".to_string());

    let mut poster = message("3", "1", "sarah123", "Check out this movie poster", at(10, 10));
    poster.attachment_type = Some(AttachmentType::Image);
    poster.mentions.insert("john456".to_string());

    let coffee_text = "Want to grab coffee and talk about it?";
    let mut coffee = message("4", "1", "john456", coffee_text, at(11, 30));
    coffee.pinned = true;

    let mut spec = message("5", "2", "emma789", "Here is the project spec", at(14, 30));
    spec.attachment_type = Some(AttachmentType::File);
    spec.mentions.insert("sarah123".to_string());

    let deadline_text = "The project deadline is next week";
    let mut deadline = message("6", "2", "sarah123", deadline_text, at(14, 45));
    deadline.mentions.insert("emma789".to_string());

    vec![greeting, reply, poster, coffee, spec, deadline]
}

/// Search service over a fake populated with the sample data
pub fn sample_service() -> (Arc<FakeIndex>, SearchService) {
    let fake = FakeIndex::with_documents(&sample_conversations(), &sample_messages());
    let service = SearchService::new(fake.clone(), IndexConfig::default());
    (fake, service)
}

/// Ids of hits in result order
pub fn ids(response: &threadseek::search::SearchResponse) -> Vec<String> {
    response.hits.iter().map(|h| h.id().to_string()).collect()
}
