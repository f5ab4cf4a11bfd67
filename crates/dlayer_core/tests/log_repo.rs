mod support;

use dlayer_core::driver::Filter;
use dlayer_core::envelope::NOT_FOUND_CODE;
use dlayer_core::repo::record_repo::NEWEST_FIRST;
use dlayer_core::{
    LogAccessor, LogEntry, LogRepository, OpResult, Record, Repository, ResultStream,
    DEFAULT_STREAM_CAPACITY,
};
use futures::StreamExt;
use serde_json::json;
use support::{log_doc, FakeDriver};
use uuid::Uuid;

fn repo(driver: &FakeDriver) -> LogRepository {
    LogRepository::new(driver.database())
}

async fn drain(stream: ResultStream<LogEntry>) -> Vec<OpResult<LogEntry>> {
    stream.collect_all().await
}

#[tokio::test]
async fn find_many_without_matches_emits_single_not_found() {
    let driver = FakeDriver::new();
    let filter = Filter::All.field("id", "X");

    let results = drain(repo(&driver).get_logs(filter, 0)).await;

    assert_eq!(results.len(), 1);
    let err = results[0].error().expect("error result");
    assert_eq!(err.code(), NOT_FOUND_CODE);
    assert!(results[0].value().is_none());
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_many_emits_every_match_in_cursor_order() {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();
    let driver = FakeDriver::with_docs(vec![
        log_doc(first, json!({"msg": "one"})),
        log_doc(second, json!({"msg": "two"})),
    ]);

    let results = drain(repo(&driver).get_logs(Filter::All, 0)).await;

    let ids: Vec<_> = results
        .iter()
        .map(|result| {
            assert!(result.is_ok(), "unexpected error: {result}");
            result.value().and_then(|entry| entry.id)
        })
        .collect();
    assert_eq!(ids, vec![Some(first), Some(second)]);
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_many_sorts_newest_first_and_limits_only_when_positive() {
    let driver = FakeDriver::with_docs(vec![log_doc(Uuid::new_v4(), json!("a"))]);

    drain(repo(&driver).get_logs(Filter::All, 0)).await;
    {
        let state = driver.state.lock();
        assert_eq!(state.last_sort, vec![NEWEST_FIRST.to_string()]);
        assert_eq!(state.last_limit, None);
        assert_eq!(state.collections.last().map(String::as_str), Some("logs"));
    }

    drain(repo(&driver).get_logs(Filter::All, 5)).await;
    assert_eq!(driver.state.lock().last_limit, Some(5));
}

#[tokio::test]
async fn find_many_limit_truncates_results() {
    let docs = (0..4)
        .map(|n| log_doc(Uuid::new_v4(), json!({ "n": n })))
        .collect();
    let driver = FakeDriver::with_docs(docs);

    let results = drain(repo(&driver).get_logs(Filter::All, 2)).await;
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(OpResult::is_ok));
}

#[tokio::test]
async fn find_many_appends_one_error_when_cursor_fails() {
    let driver = FakeDriver::with_docs(vec![
        log_doc(Uuid::new_v4(), json!(1)),
        log_doc(Uuid::new_v4(), json!(2)),
    ]);
    driver.set_cursor_error("connection reset");

    let results = drain(repo(&driver).get_logs(Filter::All, 0)).await;

    assert_eq!(results.len(), 3);
    assert!(results[0].is_ok());
    assert!(results[1].is_ok());
    let err = results[2].error().expect("trailing error");
    assert_eq!(err.code(), 500);
    assert!(err.to_string().contains("connection reset"));
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_many_reports_cursor_error_instead_of_not_found() {
    let driver = FakeDriver::new();
    driver.set_cursor_error("query failed");

    let results = drain(repo(&driver).get_logs(Filter::All, 0)).await;

    assert_eq!(results.len(), 1);
    let err = results[0].error().expect("error result");
    assert!(!err.is_not_found());
    assert!(err.to_string().contains("query failed"));
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_many_stops_at_first_undecodable_record() {
    let mut broken = log_doc(Uuid::new_v4(), json!("bad"));
    broken.insert("ts".to_string(), json!("not a timestamp"));
    let driver = FakeDriver::with_docs(vec![
        log_doc(Uuid::new_v4(), json!("ok")),
        broken,
        log_doc(Uuid::new_v4(), json!("never")),
    ]);

    let results = drain(repo(&driver).get_logs(Filter::All, 0)).await;

    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(results[1].is_err());
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_by_id_emits_one_value_for_stored_id() {
    let id = Uuid::new_v4();
    let driver = FakeDriver::with_docs(vec![
        log_doc(Uuid::new_v4(), json!("other")),
        log_doc(id, json!("wanted")),
    ]);

    let results = drain(repo(&driver).get_log_by_id(id)).await;

    assert_eq!(results.len(), 1);
    let entry = results[0].value().expect("value result");
    assert_eq!(entry.id, Some(id));
    assert_eq!(entry.entry, Some(json!("wanted")));
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_by_id_emits_one_not_found_for_missing_id() {
    let driver = FakeDriver::with_docs(vec![log_doc(Uuid::new_v4(), json!("other"))]);

    let results = drain(repo(&driver).get_log_by_id(Uuid::new_v4())).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].error().is_some_and(|err| err.is_not_found()));
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn find_by_id_reports_cursor_error_instead_of_not_found() {
    let driver = FakeDriver::new();
    driver.set_cursor_error("lookup failed");

    let results = drain(repo(&driver).get_log_by_id(Uuid::new_v4())).await;

    assert_eq!(results.len(), 1);
    let err = results[0].error().expect("error result");
    assert_eq!(err.code(), 500);
    assert!(err.to_string().contains("lookup failed"));
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[tokio::test]
async fn save_assigns_new_id_when_unset() {
    let driver = FakeDriver::new();

    let results = drain(repo(&driver).save_log(LogEntry::new(json!({"msg": "hi"})))).await;

    assert_eq!(results.len(), 1);
    let saved = results[0].value().expect("saved entry");
    let id = saved.id.expect("assigned id");
    assert!(!id.is_nil());
    assert_eq!(driver.stored_ids(), vec![id]);
    assert_eq!(driver.counters.removes(), 0);
}

#[tokio::test]
async fn save_replaces_nil_id() {
    let driver = FakeDriver::new();
    let mut entry = LogEntry::new(json!("nil"));
    entry.set_id(Uuid::nil());

    let results = drain(repo(&driver).save_log(entry)).await;

    let id = results[0].value().and_then(|entry| entry.id).expect("id");
    assert!(!id.is_nil());
    assert_eq!(driver.counters.removes(), 0);
}

#[tokio::test]
async fn saving_same_id_twice_keeps_one_record() {
    let driver = FakeDriver::new();
    let repo = repo(&driver);
    let mut entry = LogEntry::new(json!({"msg": "same"}));
    entry.id = Some(Uuid::new_v4());

    drain(repo.save_log(entry.clone())).await;
    let results = drain(repo.save_log(entry.clone())).await;

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].value(), Some(&entry));
    assert_eq!(driver.stored_ids(), vec![entry.id.unwrap()]);
    assert_eq!(driver.counters.removes(), 2);
}

#[tokio::test]
async fn save_skips_insert_when_removal_fails() {
    let driver = FakeDriver::new();
    driver.set_remove_error("remove failed");
    let mut entry = LogEntry::new(json!("x"));
    entry.id = Some(Uuid::new_v4());

    let results = drain(repo(&driver).save_log(entry)).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].error().is_some_and(|err| err.to_string().contains("remove failed")));
    assert_eq!(driver.counters.inserts(), 0);
}

#[tokio::test]
async fn save_reports_insert_failure_once() {
    let driver = FakeDriver::new();
    driver.set_insert_error("disk full");

    let results = drain(repo(&driver).save_log(LogEntry::new(json!("x")))).await;

    assert_eq!(results.len(), 1);
    assert!(results[0].is_err());
    assert_eq!(driver.counters.inserts(), 1);
}

#[tokio::test]
async fn saved_entry_round_trips_through_find_by_id() {
    let driver = FakeDriver::new();
    let repo = repo(&driver);

    let saved = drain(repo.save_log(LogEntry::new(json!({"level": "info", "n": 3}))))
        .await
        .remove(0)
        .into_result()
        .unwrap();
    let loaded = drain(repo.get_log_by_id(saved.id.unwrap()))
        .await
        .remove(0)
        .into_result()
        .unwrap();

    assert_eq!(loaded, saved);
}

#[tokio::test]
async fn dropped_stream_stops_producer_and_closes_cursor() {
    let docs = (0..1_000)
        .map(|n| log_doc(Uuid::new_v4(), json!({ "n": n })))
        .collect();
    let driver = FakeDriver::with_docs(docs);
    let repo = repo(&driver).with_capacity(1);

    let mut stream = repo.get_logs(Filter::All, 0);
    assert!(stream.next().await.is_some_and(|result| result.is_ok()));
    drop(stream);

    assert_eq!(driver.wait_for_closes(1).await, 1);
    assert!(driver.counters.advances() < 1_000);
}

#[tokio::test]
async fn closed_stream_stops_producer_and_closes_cursor() {
    let docs = (0..1_000)
        .map(|n| log_doc(Uuid::new_v4(), json!({ "n": n })))
        .collect();
    let driver = FakeDriver::with_docs(docs);
    let repo = repo(&driver).with_capacity(1);

    let mut stream = repo.get_logs(Filter::All, 0);
    assert!(stream.next().await.is_some_and(|result| result.is_ok()));
    stream.close();

    assert_eq!(driver.wait_for_closes(1).await, 1);
    assert!(driver.counters.advances() < 1_000);

    let mut leftover = 0;
    while stream.next().await.is_some() {
        leftover += 1;
    }
    assert!(leftover <= 1);
    assert_eq!(driver.counters.closes(), 1);
}

#[tokio::test]
async fn result_stream_works_with_stream_combinators() {
    let driver = FakeDriver::with_docs(vec![
        log_doc(Uuid::new_v4(), json!(1)),
        log_doc(Uuid::new_v4(), json!(2)),
        log_doc(Uuid::new_v4(), json!(3)),
    ]);

    let payloads: Vec<_> = repo(&driver)
        .get_logs(Filter::All, 0)
        .filter_map(|result| async move { result.into_result().ok().and_then(|entry| entry.entry) })
        .collect()
        .await;

    assert_eq!(payloads, vec![json!(1), json!(2), json!(3)]);
    assert_eq!(driver.wait_for_closes(1).await, 1);
}

#[test]
fn capacity_defaults_and_has_a_floor_of_one() {
    let driver = FakeDriver::new();
    let records: Repository<LogEntry> = Repository::new(driver.database());

    assert_eq!(records.capacity(), DEFAULT_STREAM_CAPACITY);
    assert_eq!(records.clone().with_capacity(8).capacity(), 8);
    assert_eq!(records.with_capacity(0).capacity(), 1);
}

#[tokio::test]
async fn bounded_stream_applies_back_pressure() {
    let docs = (0..10)
        .map(|n| log_doc(Uuid::new_v4(), json!({ "n": n })))
        .collect();
    let driver = FakeDriver::with_docs(docs);
    let repo = repo(&driver).with_capacity(2);

    let stream = repo.get_logs(Filter::All, 0);
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // Two buffered results plus the one the producer is blocked on.
    assert!(driver.counters.advances() <= 3);
    assert_eq!(driver.counters.closes(), 0);

    assert_eq!(stream.collect_all().await.len(), 10);
    assert_eq!(driver.wait_for_closes(1).await, 1);
}
