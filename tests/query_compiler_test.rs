//! Tests for the compiled query documents sent to the engine

mod common;

use common::at;
use serde_json::{json, Value};
use threadseek::models::AttachmentType;
use threadseek::search::*;

fn compile(request: &SearchRequest) -> CompiledSearch {
    QueryCompiler::new().compile(request).unwrap()
}

fn filters_of(body: &Value) -> Vec<Value> {
    body["query"]["bool"]["filter"].as_array().unwrap().clone()
}

#[test]
fn test_empty_conversation_query_matches_all() {
    let compiled = compile(&SearchRequest::conversations(""));
    assert_eq!(compiled.target, Entity::Conversation);

    let body = compiled.body();
    assert_eq!(body["query"], json!({ "match_all": {} }));
    assert_eq!(body["size"], json!(CONVERSATION_RESULT_LIMIT));
    assert_eq!(body["sort"][0], json!({ "date": { "order": "desc" } }));
    assert!(body.get("highlight").is_none());
}

#[test]
fn test_conversation_text_query_is_fuzzy_and_boosted() {
    let body = compile(&SearchRequest::conversations("sara")).body();
    assert_eq!(
        body["query"],
        json!({
            "multi_match": {
                "query": "sara",
                "fields": ["username^2", "handle", "lastMessage"],
                "fuzziness": "AUTO"
            }
        })
    );
}

#[test]
fn test_conversation_search_ignores_message_filters() {
    let request = SearchRequest::conversations("")
        .with_filters(SearchFilters::default().with_from("sarah123").pinned_only())
        .in_conversation("1");
    assert_eq!(compile(&request).query, QueryClause::MatchAll);
}

#[test]
fn test_empty_message_query_has_no_constraints() {
    let body = compile(&SearchRequest::messages("  ")).body();
    assert_eq!(body["query"], json!({ "bool": { "must": [], "filter": [] } }));
    assert!(body.get("size").is_none());
    assert_eq!(
        body["sort"],
        json!([{ "date": { "order": "desc" } }, { "id": { "order": "asc" } }])
    );
}

#[test]
fn test_message_text_query() {
    let body = compile(&SearchRequest::messages("deadline")).body();
    assert_eq!(
        body["query"]["bool"]["must"],
        json!([{
            "multi_match": {
                "query": "deadline",
                "fields": ["text^2", "username", "handle"],
                "fuzziness": "AUTO"
            }
        }])
    );
}

#[test]
fn test_message_highlight_directive() {
    let body = compile(&SearchRequest::messages("deadline")).body();
    assert_eq!(
        body["highlight"],
        json!({
            "fields": { "text": {}, "lastMessage": {} },
            "pre_tags": ["<strong>"],
            "post_tags": ["</strong>"]
        })
    );

    let plain = QueryCompiler::new()
        .with_highlighting(false)
        .compile(&SearchRequest::messages("deadline"))
        .unwrap();
    assert!(plain.highlight.is_none());
    assert!(plain.body().get("highlight").is_none());
}

#[test]
fn test_highlighting_does_not_change_query_or_sort() {
    let request = SearchRequest::messages("coffee")
        .with_filters(SearchFilters::default().with_from("john456"));
    let with = QueryCompiler::new().compile(&request).unwrap();
    let without = QueryCompiler::new().with_highlighting(false).compile(&request).unwrap();

    assert_eq!(with.query, without.query);
    assert_eq!(with.sort, without.sort);
    assert_eq!(with.size, without.size);
}

#[test]
fn test_filters_target_exact_fields() {
    let request = SearchRequest::messages("")
        .with_filters(
            SearchFilters::default()
                .with_from("sarah123")
                .with_mention("john456")
                .with_attachment(AttachmentType::Link)
                .pinned_only(),
        )
        .in_conversation("1");

    let filters = filters_of(&compile(&request).body());
    assert_eq!(
        filters,
        vec![
            json!({ "term": { "conversationId": "1" } }),
            json!({ "term": { "handle.keyword": "sarah123" } }),
            json!({ "term": { "mentions.keyword": "john456" } }),
            json!({ "term": { "attachmentType": "link" } }),
            json!({ "term": { "pinned": true } }),
        ]
    );
}

#[test]
fn test_before_and_after_are_strict() {
    let request = SearchRequest::messages("").with_filters(
        SearchFilters::default()
            .with_after(at(10, 0))
            .with_before(at(12, 0)),
    );

    let filters = filters_of(&compile(&request).body());
    assert_eq!(
        filters,
        vec![json!({ "range": { "date": {
            "gt": "2024-01-17T10:00:00.000Z",
            "lt": "2024-01-17T12:00:00.000Z"
        } } })]
    );
}

#[test]
fn test_during_collapses_to_an_instant() {
    let request =
        SearchRequest::messages("").with_filters(SearchFilters::default().with_during(at(14, 45)));

    let filters = filters_of(&compile(&request).body());
    assert_eq!(
        filters,
        vec![json!({ "range": { "date": {
            "gte": "2024-01-17T14:45:00.000Z",
            "lte": "2024-01-17T14:45:00.000Z"
        } } })]
    );
}

#[test]
fn test_all_date_filters_share_one_range() {
    let request = SearchRequest::messages("").with_filters(
        SearchFilters::default()
            .with_after(at(9, 0))
            .with_before(at(18, 0))
            .with_during(at(12, 0)),
    );

    let filters = filters_of(&compile(&request).body());
    assert_eq!(filters.len(), 1);
    let bounds = &filters[0]["range"]["date"];
    assert_eq!(bounds.as_object().unwrap().len(), 4);
}

#[test]
fn test_request_json_compiles_like_builder() {
    let from_json: SearchRequest = serde_json::from_value(json!({
        "query": "movie",
        "searchType": "message",
        "conversationId": "1",
        "filters": { "from": "sarah123", "has": "image", "pinned": false, "mentions": "" }
    }))
    .unwrap();

    let built = SearchRequest::messages("movie")
        .with_filters(
            SearchFilters::default()
                .with_from("sarah123")
                .with_attachment(AttachmentType::Image),
        )
        .in_conversation("1");

    assert_eq!(compile(&from_json).body(), compile(&built).body());
}

#[test]
fn test_sub_millisecond_dates_match_rendered_range() {
    let request: SearchRequest = serde_json::from_value(json!({
        "searchType": "message",
        "filters": {
            "during": "2024-01-17T12:00:00.000500Z",
            "before": "2024-01-17T13:00:00.000900Z"
        }
    }))
    .unwrap();

    let filters = filters_of(&compile(&request).body());
    assert_eq!(
        filters,
        vec![json!({ "range": { "date": {
            "gte": "2024-01-17T12:00:00.000Z",
            "lte": "2024-01-17T12:00:00.000Z",
            "lt": "2024-01-17T13:00:00.000Z"
        } } })]
    );

    let bounds = request.filters.date_bounds();
    assert!(bounds.contains(&at(12, 0)));
    assert!(!bounds.contains(&at(13, 0)));
}

#[test]
fn test_builder_dates_are_truncated_to_milliseconds() {
    let noon = at(12, 0) + chrono::Duration::microseconds(250);
    let request =
        SearchRequest::messages("").with_filters(SearchFilters::default().with_during(noon));

    let bounds = request.filters.date_bounds();
    assert_eq!(bounds.gte, Some(at(12, 0)));
    assert!(bounds.contains(&at(12, 0)));
}
