//! Search requests and the query compiler
//!
//! [`QueryCompiler::compile`] turns an application-level [`SearchRequest`]
//! into a [`CompiledSearch`]: a boolean query document plus sort, highlight
//! and size directives, addressed to one [`Entity`] index. Compilation is
//! pure; nothing here touches the network.

use crate::models::{format_timestamp, parse_timestamp, to_millis, AttachmentType};
use crate::search::error::{SearchError, SearchResult};
use crate::search::schema::{Entity, EntitySchema};
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// Conversations are a sidebar preview, never paginated
pub const CONVERSATION_RESULT_LIMIT: usize = 20;

/// Markers wrapped around matched spans in highlight fragments
pub const HIGHLIGHT_PRE_TAG: &str = "<strong>";
pub const HIGHLIGHT_POST_TAG: &str = "</strong>";

const CONVERSATION_MATCH_FIELDS: &[BoostedField] = &[
    BoostedField::boosted("username", 2),
    BoostedField::plain("handle"),
    BoostedField::plain("lastMessage"),
];

const MESSAGE_MATCH_FIELDS: &[BoostedField] = &[
    BoostedField::boosted("text", 2),
    BoostedField::plain("username"),
    BoostedField::plain("handle"),
];

const HIGHLIGHT_FIELDS: &[&str] = &["text", "lastMessage"];

/// Which entity a search targets
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SearchType {
    Conversation,
    #[default]
    Message,
}

impl SearchType {
    pub fn entity(self) -> Entity {
        match self {
            SearchType::Conversation => Entity::Conversation,
            SearchType::Message => Entity::Message,
        }
    }
}

/// Structured message filters.
///
/// Every field is optional and an absent field imposes no constraint. Blank
/// strings are read as absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchFilters {
    /// Author handle, exact match
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub from: Option<String>,

    /// A handle that must be among the message's mentions
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub mentions: Option<String>,

    /// Required attachment type
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub has: Option<AttachmentType>,

    /// Strictly earlier than this instant
    #[serde(
        default,
        deserialize_with = "blank_as_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub before: Option<DateTime<Utc>>,

    /// Strictly later than this instant
    #[serde(
        default,
        deserialize_with = "blank_as_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub after: Option<DateTime<Utc>>,

    /// Exactly this instant.
    ///
    /// Compiled as the collapsed range `during <= date <= during`, so it does
    /// not mean "on this day". Callers wanting a calendar day must send
    /// `after`/`before` bounds instead.
    #[serde(
        default,
        deserialize_with = "blank_as_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub during: Option<DateTime<Utc>>,

    /// `Some(true)` restricts to pinned messages; `false` is not "unpinned only"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinned: Option<bool>,
}

impl SearchFilters {
    pub fn with_from(mut self, handle: impl Into<String>) -> Self {
        self.from = Some(handle.into());
        self
    }

    pub fn with_mention(mut self, handle: impl Into<String>) -> Self {
        self.mentions = Some(handle.into());
        self
    }

    pub fn with_attachment(mut self, kind: AttachmentType) -> Self {
        self.has = Some(kind);
        self
    }

    pub fn with_before(mut self, ts: DateTime<Utc>) -> Self {
        self.before = Some(ts);
        self
    }

    pub fn with_after(mut self, ts: DateTime<Utc>) -> Self {
        self.after = Some(ts);
        self
    }

    pub fn with_during(mut self, ts: DateTime<Utc>) -> Self {
        self.during = Some(ts);
        self
    }

    pub fn pinned_only(mut self) -> Self {
        self.pinned = Some(true);
        self
    }

    /// Date bounds implied by `before`, `after` and `during`, at the
    /// millisecond precision they are rendered with
    pub fn date_bounds(&self) -> DateBounds {
        let during = self.during.map(to_millis);
        DateBounds {
            lt: self.before.map(to_millis),
            gt: self.after.map(to_millis),
            gte: during,
            lte: during,
        }
    }
}

/// An application-level search request
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Free text; blank means "no text constraint"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,

    #[serde(default)]
    pub search_type: SearchType,

    #[serde(default, deserialize_with = "null_as_default")]
    pub filters: SearchFilters,

    /// Restrict a message search to one thread
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub conversation_id: Option<String>,
}

impl SearchRequest {
    /// Message search for the given text
    pub fn messages(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            search_type: SearchType::Message,
            ..Default::default()
        }
    }

    /// Conversation search for the given text
    pub fn conversations(query: impl Into<String>) -> Self {
        Self {
            query: Some(query.into()),
            search_type: SearchType::Conversation,
            ..Default::default()
        }
    }

    pub fn with_filters(mut self, filters: SearchFilters) -> Self {
        self.filters = filters;
        self
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    /// The query text, or `None` when empty or whitespace-only
    pub fn query_text(&self) -> Option<&str> {
        self.query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// A field reference with an optional relevance multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoostedField {
    pub field: &'static str,
    pub boost: Option<u32>,
}

impl BoostedField {
    pub const fn plain(field: &'static str) -> Self {
        Self { field, boost: None }
    }

    pub const fn boosted(field: &'static str, boost: u32) -> Self {
        Self {
            field,
            boost: Some(boost),
        }
    }
}

impl fmt::Display for BoostedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.boost {
            Some(boost) => write!(f, "{}^{}", self.field, boost),
            None => f.write_str(self.field),
        }
    }
}

/// Typo tolerance for fuzzy matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fuzziness {
    /// Edit distance scaled to term length by the engine
    Auto,
}

impl Fuzziness {
    fn as_str(&self) -> &'static str {
        match self {
            Fuzziness::Auto => "AUTO",
        }
    }
}

/// Bounds of a date range clause; unset sides are open
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub gt: Option<DateTime<Utc>>,
    pub gte: Option<DateTime<Utc>>,
    pub lt: Option<DateTime<Utc>>,
    pub lte: Option<DateTime<Utc>>,
}

impl DateBounds {
    pub fn is_unbounded(&self) -> bool {
        self.gt.is_none() && self.gte.is_none() && self.lt.is_none() && self.lte.is_none()
    }

    /// Whether an instant satisfies every bound
    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        self.gt.map_or(true, |b| *ts > b)
            && self.gte.map_or(true, |b| *ts >= b)
            && self.lt.map_or(true, |b| *ts < b)
            && self.lte.map_or(true, |b| *ts <= b)
    }

    fn to_json(&self) -> Value {
        let mut bounds = Map::new();
        let ops = [
            ("gt", self.gt),
            ("gte", self.gte),
            ("lt", self.lt),
            ("lte", self.lte),
        ];
        for (op, bound) in ops {
            if let Some(ts) = bound {
                bounds.insert(op.to_string(), Value::String(format_timestamp(&ts)));
            }
        }
        Value::Object(bounds)
    }
}

/// A node of the compiled boolean query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryClause {
    MatchAll,
    MultiMatch {
        query: String,
        fields: Vec<BoostedField>,
        fuzziness: Fuzziness,
    },
    Term {
        field: String,
        value: Value,
    },
    Range {
        field: String,
        bounds: DateBounds,
    },
    /// `must` clauses score; `filter` clauses only include or exclude
    Bool {
        must: Vec<QueryClause>,
        filter: Vec<QueryClause>,
    },
}

impl QueryClause {
    /// Render as engine query DSL
    pub fn to_json(&self) -> Value {
        match self {
            QueryClause::MatchAll => json!({ "match_all": {} }),
            QueryClause::MultiMatch {
                query,
                fields,
                fuzziness,
            } => json!({
                "multi_match": {
                    "query": query,
                    "fields": fields.iter().map(ToString::to_string).collect::<Vec<_>>(),
                    "fuzziness": fuzziness.as_str(),
                }
            }),
            QueryClause::Term { field, value } => {
                let mut term = Map::new();
                term.insert(field.clone(), value.clone());
                json!({ "term": term })
            }
            QueryClause::Range { field, bounds } => {
                let mut range = Map::new();
                range.insert(field.clone(), bounds.to_json());
                json!({ "range": range })
            }
            QueryClause::Bool { must, filter } => json!({
                "bool": {
                    "must": must.iter().map(QueryClause::to_json).collect::<Vec<_>>(),
                    "filter": filter.iter().map(QueryClause::to_json).collect::<Vec<_>>(),
                }
            }),
        }
    }
}

impl Serialize for QueryClause {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Sort order for search results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// One sort key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortField {
    pub field: &'static str,
    pub order: SortOrder,
}

impl SortField {
    fn to_json(self) -> Value {
        let mut key = Map::new();
        key.insert(self.field.to_string(), json!({ "order": self.order.as_str() }));
        Value::Object(key)
    }
}

/// Newest first; equal dates fall back to ascending id so paging is stable
pub const DEFAULT_SORT: &[SortField] = &[
    SortField {
        field: "date",
        order: SortOrder::Descending,
    },
    SortField {
        field: "id",
        order: SortOrder::Ascending,
    },
];

/// Rendering hint asking the engine for marked-up fragments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightSpec {
    pub fields: Vec<&'static str>,
    pub pre_tag: &'static str,
    pub post_tag: &'static str,
}

impl Default for HighlightSpec {
    fn default() -> Self {
        Self {
            fields: HIGHLIGHT_FIELDS.to_vec(),
            pre_tag: HIGHLIGHT_PRE_TAG,
            post_tag: HIGHLIGHT_POST_TAG,
        }
    }
}

impl HighlightSpec {
    fn to_json(&self) -> Value {
        let fields: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.to_string(), json!({})))
            .collect();
        json!({
            "fields": fields,
            "pre_tags": [self.pre_tag],
            "post_tags": [self.post_tag],
        })
    }
}

/// Output of the compiler, ready to send to the target index
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSearch {
    pub target: Entity,
    pub query: QueryClause,
    pub sort: Vec<SortField>,
    pub highlight: Option<HighlightSpec>,
    /// `None` leaves the result count to the engine default
    pub size: Option<usize>,
}

impl CompiledSearch {
    /// Full search request body
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("query".to_string(), self.query.to_json());
        body.insert(
            "sort".to_string(),
            Value::Array(self.sort.iter().map(|s| s.to_json()).collect()),
        );
        if let Some(ref highlight) = self.highlight {
            body.insert("highlight".to_string(), highlight.to_json());
        }
        if let Some(size) = self.size {
            body.insert("size".to_string(), json!(size));
        }
        Value::Object(body)
    }
}

/// Compiles search requests into engine queries
#[derive(Debug, Clone)]
pub struct QueryCompiler {
    highlighting: bool,
}

impl Default for QueryCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryCompiler {
    pub fn new() -> Self {
        Self { highlighting: true }
    }

    /// Enable/disable highlight directives; never affects matching or order
    pub fn with_highlighting(mut self, enabled: bool) -> Self {
        self.highlighting = enabled;
        self
    }

    pub fn compile(&self, request: &SearchRequest) -> SearchResult<CompiledSearch> {
        match request.search_type {
            SearchType::Conversation => self.compile_conversations(request),
            SearchType::Message => self.compile_messages(request),
        }
    }

    /// Conversations are browsed, not filtered: filters and conversation
    /// scope are ignored here.
    fn compile_conversations(&self, request: &SearchRequest) -> SearchResult<CompiledSearch> {
        let schema = Entity::Conversation.schema();

        let query = match request.query_text() {
            Some(text) => fuzzy_match(schema, text, CONVERSATION_MATCH_FIELDS)?,
            None => QueryClause::MatchAll,
        };

        Ok(CompiledSearch {
            target: Entity::Conversation,
            query,
            sort: DEFAULT_SORT.to_vec(),
            highlight: None,
            size: Some(CONVERSATION_RESULT_LIMIT),
        })
    }

    fn compile_messages(&self, request: &SearchRequest) -> SearchResult<CompiledSearch> {
        let schema = Entity::Message.schema();
        let filters = &request.filters;

        let mut must = Vec::new();
        if let Some(text) = request.query_text() {
            must.push(fuzzy_match(schema, text, MESSAGE_MATCH_FIELDS)?);
        }

        let mut filter = Vec::new();

        if let Some(ref conversation_id) = request.conversation_id {
            filter.push(term(schema, "conversationId", json!(conversation_id))?);
        }

        if let Some(ref handle) = filters.from {
            filter.push(term(schema, "handle", json!(handle))?);
        }

        if let Some(ref mention) = filters.mentions {
            filter.push(term(schema, "mentions", json!(mention))?);
        }

        if let Some(kind) = filters.has {
            filter.push(term(schema, "attachmentType", json!(kind.to_string()))?);
        }

        let bounds = filters.date_bounds();
        if !bounds.is_unbounded() {
            if !schema.is_date("date") {
                return Err(SearchError::QueryConstruction(
                    "field 'date' is not declared as a date".to_string(),
                ));
            }
            filter.push(QueryClause::Range {
                field: "date".to_string(),
                bounds,
            });
        }

        if filters.pinned == Some(true) {
            filter.push(term(schema, "pinned", json!(true))?);
        }

        Ok(CompiledSearch {
            target: Entity::Message,
            query: QueryClause::Bool { must, filter },
            sort: DEFAULT_SORT.to_vec(),
            highlight: self.highlighting.then(HighlightSpec::default),
            size: None,
        })
    }
}

fn fuzzy_match(
    schema: &EntitySchema,
    text: &str,
    fields: &[BoostedField],
) -> SearchResult<QueryClause> {
    if let Some(bad) = fields.iter().find(|f| !schema.is_full_text(f.field)) {
        return Err(SearchError::QueryConstruction(format!(
            "field '{}' of {} is not full-text indexed",
            bad.field, schema.entity
        )));
    }

    Ok(QueryClause::MultiMatch {
        query: text.to_string(),
        fields: fields.to_vec(),
        fuzziness: Fuzziness::Auto,
    })
}

fn term(schema: &EntitySchema, field: &str, value: Value) -> SearchResult<QueryClause> {
    let target = schema.exact_field(field).ok_or_else(|| {
        SearchError::QueryConstruction(format!(
            "field '{}' of {} has no exact-match representation",
            field, schema.entity
        ))
    })?;

    Ok(QueryClause::Term {
        field: target,
        value,
    })
}

fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(de::Error::custom),
    }
}

fn blank_as_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_timestamp(value).map(Some).map_err(de::Error::custom),
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
