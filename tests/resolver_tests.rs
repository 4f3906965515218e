//! Resolver Tests
//!
//! Cross-document resolution through the single-flight cache.

use std::sync::Arc;
use std::time::Duration;

use schema_typegen::error::ResolutionCause;
use schema_typegen::resolve::DocumentCache;
use schema_typegen::{
    build, parse_str, resolve, GenerationSettings, LoadError, MemoryLoader, ResolutionSession, SchemaDialect,
    TypeReference,
};

const COMMON: &str = r#"{"definitions":{
    "Id":{"type":"string","format":"uuid"},
    "Money":{"type":"object","properties":{"amount":{"type":"number"},"currency":{"type":"string"}},"required":["amount"]}}}"#;

const ORDER: &str = r#"{"title":"Order","type":"object","properties":{
    "id":{"$ref":"common.json#/definitions/Id"},
    "total":{"$ref":"common.json#/definitions/Money"},
    "customer":{"$ref":"customer.json"}}}"#;

const CUSTOMER: &str = r#"{"title":"Customer","type":"object","properties":{
    "id":{"$ref":"common.json#/definitions/Id"},
    "credit":{"$ref":"common.json#/definitions/Money"}}}"#;

fn loader() -> MemoryLoader {
    MemoryLoader::new()
        .with_document("file:///api/common.json", COMMON)
        .with_document("file:///api/customer.json", CUSTOMER)
}

#[tokio::test]
async fn test_external_documents_loaded_once() {
    let loader = Arc::new(loader());
    let doc = parse_str(ORDER, "file:///api/order.json").unwrap();
    let resolved = resolve(doc, loader.clone()).await.unwrap();

    // common.json is reached from two documents but fetched once
    assert_eq!(loader.load_count(), 2);
    assert_eq!(resolved.documents().len(), 3);

    let root = resolved.node(resolved.root()).unwrap();
    let customer = resolved.node(resolved.canonical(root.properties["customer"])).unwrap();
    assert_eq!(
        resolved.canonical(root.properties["total"]),
        resolved.canonical(customer.properties["credit"])
    );
    assert_eq!(
        resolved.location(resolved.canonical(root.properties["id"])),
        "file:///api/common.json#/definitions/Id"
    );
}

#[tokio::test]
async fn test_cross_document_model_shares_types() {
    let doc = parse_str(ORDER, "file:///api/order.json").unwrap();
    let resolved = resolve(doc, Arc::new(loader())).await.unwrap();
    let m = build(&resolved, &GenerationSettings::default()).unwrap();

    let money = m.by_name("Money").unwrap();
    let order = m.by_name("Order").unwrap();
    let customer = m.by_name("Customer").unwrap();
    assert_eq!(order.property("total").unwrap().type_ref, TypeReference::Generated(money.id));
    assert_eq!(customer.property("credit").unwrap().type_ref, TypeReference::Generated(money.id));
    assert_eq!(m.iter().filter(|t| t.name.starts_with("Money")).count(), 1);
}

#[tokio::test]
async fn test_concurrent_sessions_single_flight() {
    let loader = Arc::new(loader().with_delay(Duration::from_millis(20)));
    let cache = Arc::new(DocumentCache::new(loader.clone(), SchemaDialect::Draft7));

    let a = parse_str(ORDER, "file:///api/order.json").unwrap();
    let b = parse_str(CUSTOMER, "file:///api/customer.json").unwrap();
    let (a, b) = tokio::join!(
        ResolutionSession::new(cache.clone()).resolve(a),
        ResolutionSession::new(cache.clone()).resolve(b),
    );
    a.unwrap();
    b.unwrap();

    // common.json once, customer.json once (for the order session)
    assert_eq!(loader.load_count(), 2);
}

#[tokio::test]
async fn test_missing_document_reported_per_pointer() {
    let doc = parse_str(
        r#"{"properties":{"a":{"$ref":"absent.json#/definitions/X"},"b":{"$ref":"absent.json#/definitions/Y"}}}"#,
        "file:///api/main.json",
    )
    .unwrap();
    let loader = Arc::new(MemoryLoader::new());
    let errors = resolve(doc, loader.clone()).await.unwrap_err();

    assert_eq!(errors.len(), 2);
    assert_eq!(loader.load_count(), 1);
    let a = errors.for_pointer("file:///api/main.json#/properties/a").unwrap();
    assert!(matches!(a.cause, ResolutionCause::Load(LoadError::NotFound(_))));
}

#[tokio::test]
async fn test_timeout_leaves_cache_usable() {
    let slow = Arc::new(
        MemoryLoader::new()
            .with_document("file:///api/common.json", COMMON)
            .with_delay(Duration::from_millis(200)),
    );
    let cache = Arc::new(DocumentCache::new(slow.clone(), SchemaDialect::Draft7).with_timeout(Duration::from_millis(10)));

    let doc = parse_str(r#"{"properties":{"id":{"$ref":"common.json#/definitions/Id"}}}"#, "file:///api/a.json").unwrap();
    let errors = ResolutionSession::new(cache.clone()).resolve(doc).await.unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e.cause, ResolutionCause::Load(LoadError::Timeout(_)))));

    // Nothing was memoized for the timed-out load; local work still resolves.
    let local = parse_str(r##"{"properties":{"x":{"$ref":"#/definitions/X"}},"definitions":{"X":{}}}"##, "file:///api/b.json").unwrap();
    assert!(ResolutionSession::new(cache.clone()).resolve(local).await.is_ok());

    let retry = parse_str(r#"{"properties":{"id":{"$ref":"common.json#/definitions/Id"}}}"#, "file:///api/c.json").unwrap();
    let _ = ResolutionSession::new(cache).resolve(retry).await;
    assert_eq!(slow.load_count(), 2);
}
