use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::*;
use crate::model::MemoryModel;

fn ok_source(name: &str) -> EngineSource {
    EngineSource::new(name, || async { Ok(Box::new(MemoryModel::new()) as Box<dyn ObjectModel>) })
}

fn failing_source(name: &str) -> EngineSource {
    let msg = name.to_owned();
    EngineSource::new(name, move || {
        let msg = msg.clone();
        async move { Err(LoadError::SourceFailed(msg)) }
    })
}

fn hanging_source(name: &str) -> EngineSource {
    EngineSource::new(name, || async {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(Box::new(MemoryModel::new()) as Box<dyn ObjectModel>)
    })
}

#[tokio::test]
async fn first_healthy_source_wins() {
    let model = load_engine(vec![ok_source("primary"), ok_source("fallback")], Duration::from_millis(100)).await;
    assert!(model.is_ok());
}

#[tokio::test]
async fn failure_falls_over_to_next_source() {
    let model = load_engine(vec![failing_source("cdn"), ok_source("bundled")], Duration::from_millis(100)).await;
    assert!(model.is_ok());
}

#[tokio::test]
async fn timeout_falls_over_to_next_source() {
    let model = load_engine(vec![hanging_source("slow"), ok_source("bundled")], Duration::from_millis(50)).await;
    assert!(model.is_ok());
}

#[tokio::test]
async fn exhaustion_is_an_error() {
    let err = load_engine(vec![failing_source("a"), failing_source("b")], Duration::from_millis(50))
        .await
        .map(|_| ())
        .unwrap_err();
    assert!(matches!(err, LoadError::Exhausted));
    assert_eq!(err.error_code(), "E_ENGINE_EXHAUSTED");
    assert_eq!(err.severity(), Severity::Fatal);
}

#[tokio::test]
async fn later_sources_are_not_tried_after_success() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let counting = EngineSource::new("counting", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        async { Ok(Box::new(MemoryModel::new()) as Box<dyn ObjectModel>) }
    });
    let never = Arc::clone(&calls);
    let should_not_run = EngineSource::new("unused", move || {
        never.fetch_add(100, Ordering::SeqCst);
        async { Ok(Box::new(MemoryModel::new()) as Box<dyn ObjectModel>) }
    });

    load_engine(vec![counting, should_not_run], Duration::from_millis(100)).await.map(|_| ()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn empty_source_list_is_exhausted() {
    let err = load_engine(Vec::new(), Duration::from_millis(10)).await.map(|_| ()).unwrap_err();
    assert!(matches!(err, LoadError::Exhausted));
}
