//! Ensemble aggregation through the aggregation service

mod common;

use common::{ensemble, explorer, Doc, FakeBackend};
use serde_json::json;
use sumo_explorer::search::{Filter, SearchContext};
use sumo_explorer::{Explorer, ExplorerError};

fn two_iterations() -> Vec<Doc> {
    let mut docs = vec![Doc::case("case-a", "drogon_ahm")];
    for iteration in ["iter-0", "iter-1"] {
        docs.extend(
            ensemble("case-a", iteration, "VOLANTIS", 50)
                .into_iter()
                .map(|doc| doc.set("access.asset.name", "Drogon")),
        );
    }
    docs
}

async fn members(explorer: &Explorer, iteration: Option<&str>) -> SearchContext {
    explorer
        .context()
        .surfaces()
        .filter(
            &Filter::new()
                .uuid("case-a")
                .name("VOLANTIS")
                .maybe("iteration", iteration),
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_mixed_iterations_conflict() {
    let backend = FakeBackend::new(two_iterations());
    let explorer = explorer(&backend);
    let context = members(&explorer, None).await;

    let err = context.aggregator().aggregate(None, "mean").await.unwrap_err();

    match err {
        ExplorerError::Conflict { fields } => assert_eq!(fields, vec!["iteration".to_string()]),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert!(backend.aggregate_requests().is_empty());
}

#[tokio::test]
async fn test_partially_missing_field_conflicts() {
    let mut docs = vec![Doc::case("case-a", "drogon_ahm")];
    docs.extend(
        ensemble("case-a", "iter-0", "VOLANTIS", 10)
            .into_iter()
            .enumerate()
            .map(|(i, doc)| if i == 3 { doc.unset("data.tagname") } else { doc }),
    );
    let backend = FakeBackend::new(docs);
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    let err = context.aggregator().aggregate(None, "mean").await.unwrap_err();

    match err {
        ExplorerError::Conflict { fields } => assert_eq!(fields, vec!["tagname".to_string()]),
        other => panic!("expected a conflict, got {:?}", other),
    }
    assert!(backend.aggregate_requests().is_empty());
}

#[tokio::test]
async fn test_field_absent_from_every_member_is_homogeneous() {
    let docs: Vec<Doc> = ensemble("case-a", "iter-0", "VOLANTIS", 5)
        .into_iter()
        .map(|doc| doc.unset("data.content"))
        .collect();
    let backend = FakeBackend::new(docs);
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    assert!(context.aggregator().check().await.is_ok());
}

#[tokio::test]
async fn test_aggregate_one_operation() {
    let backend = FakeBackend::new(two_iterations());
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    let object = context.aggregator().aggregate(None, "mean").await.unwrap();

    let surface = object.as_surface().expect("a surface");
    let document = surface.document();
    assert_eq!(document.get_str("fmu.aggregation.operation"), Some("mean"));
    assert_eq!(document.get_str("fmu.aggregation.id"), Some(object.id()));
    let realizations = document
        .get_property("fmu.aggregation.realization_ids")
        .and_then(|v| v.as_array())
        .expect("realization ids");
    assert_eq!(realizations.len(), 50);
    assert!(document.get_property("fmu.realization").is_none());
    assert!(document.get_property("_sumo").is_none());
    assert!(document.get_property("access").is_none());
    assert_eq!(document.get_str("fmu.case.uuid"), Some("case-a"));
    assert_eq!(surface.name(), Some("VOLANTIS"));

    assert_eq!(&object.blob().await.unwrap()[..], b"mean:50");
    assert_eq!(backend.blob_fetches(), 0);

    let requests = backend.aggregate_requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["operation"], json!(["mean"]));
    assert_eq!(requests[0]["object_ids"].as_array().map(Vec::len), Some(50));
    assert!(requests[0].get("columns").is_none());
}

#[tokio::test]
async fn test_aggregate_many_unpacks_archive() {
    let backend = FakeBackend::new(two_iterations());
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-1")).await;

    let objects = context
        .aggregator()
        .aggregate_many(None, &["p10", "p90"])
        .await
        .unwrap();

    assert_eq!(objects.len(), 2);
    assert_ne!(objects[0].id(), objects[1].id());
    for (object, op) in objects.iter().zip(["p10", "p90"]) {
        assert_eq!(object.document().get_str("fmu.aggregation.operation"), Some(op));
        let blob = object.blob().await.unwrap();
        assert_eq!(&blob[..], format!("{}:50", op).as_bytes());
    }
    assert_eq!(backend.aggregate_requests().len(), 1);
}

#[tokio::test]
async fn test_columns_are_forwarded() {
    let docs = two_iterations()
        .into_iter()
        .map(|doc| doc.set("data.spec.columns", json!(["FOPT", "FGPT"])))
        .collect();
    let backend = FakeBackend::new(docs);
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;
    let columns = vec!["FOPT".to_string()];

    let object = context
        .aggregator()
        .aggregate(Some(columns.as_slice()), "collection")
        .await
        .unwrap();

    assert_eq!(
        object.document().get_property("data.spec.columns"),
        Some(&json!(["FOPT"]))
    );
    assert_eq!(backend.aggregate_requests()[0]["columns"], json!(["FOPT"]));
}

#[tokio::test]
async fn test_missing_realization_is_rejected() {
    let mut docs = two_iterations();
    docs.push(Doc::surface("orphan", "case-a", "iter-0", "VOLANTIS", 0).unset("fmu.realization"));
    let backend = FakeBackend::new(docs);
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    let err = context.aggregator().aggregate(None, "mean").await.unwrap_err();

    assert!(matches!(err, ExplorerError::Composition(ref m) if m.contains("realization")));
    assert!(backend.aggregate_requests().is_empty());
}

#[tokio::test]
async fn test_existing_aggregates_are_rejected() {
    let mut docs = two_iterations();
    docs.push(
        Doc::surface("agg-mean", "case-a", "iter-0", "VOLANTIS", 0)
            .set("fmu.aggregation.operation", "mean"),
    );
    let backend = FakeBackend::new(docs);
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    let err = context.aggregator().aggregate(None, "mean").await.unwrap_err();

    assert_eq!(err.error_code(), "COMPOSITION_ERROR");
    assert!(err.to_string().contains("already aggregates"));
}

#[tokio::test]
async fn test_empty_selection_is_rejected() {
    let backend = FakeBackend::new(two_iterations());
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-9")).await;

    let err = context.aggregator().aggregate(None, "mean").await.unwrap_err();
    assert!(matches!(err, ExplorerError::Composition(_)));
}

#[tokio::test]
async fn test_unknown_operation_fails_before_network() {
    let backend = FakeBackend::new(two_iterations());
    let explorer = explorer(&backend);
    let context = members(&explorer, Some("iter-0")).await;

    let err = context
        .aggregator()
        .aggregate(None, "median")
        .await
        .unwrap_err();

    assert!(matches!(err, ExplorerError::Configuration(ref m) if m.contains("median")));
    assert_eq!(backend.searches(), 0);
    assert!(backend.aggregate_requests().is_empty());
}
