use chrono::{NaiveDate, NaiveDateTime};
use domain::{ObservationRequest, ObservationResult, Patient, Specimen};
use lis_storage::{InMemoryResultStore, ResultStore};

fn at(hour: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 4)
        .and_then(|date| date.and_hms_opt(hour, 0, 0))
        .expect("valid time")
}

fn specimen(barcode: &str, codes: &[&str]) -> Specimen {
    Specimen {
        barcode: barcode.to_string(),
        observation_results: codes
            .iter()
            .map(|code| ObservationResult {
                test_code: code.to_string(),
                values: vec!["1.0".into()],
                ..ObservationResult::default()
            })
            .collect(),
        observation_requests: codes
            .iter()
            .map(|code| ObservationRequest {
                test_code: code.to_string(),
                ..ObservationRequest::default()
            })
            .collect(),
    }
}

fn patient(id: &str) -> Patient {
    Patient {
        id: id.to_string(),
        first_name: "Ana".into(),
        ..Patient::default()
    }
}

#[tokio::test]
async fn saved_results_are_pending() {
    let store = InMemoryResultStore::new();
    let saved = store
        .save_specimen(&patient("P1"), &specimen("S1", &["GLU", "CHOL"]), at(8))
        .await
        .expect("save");
    assert_eq!(saved, 2);

    let pending = store.pending_sync().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].barcode, "S1");
    assert_eq!(pending[0].results.len(), 2);
    assert_eq!(pending[0].patient.id, "P1");
}

#[tokio::test]
async fn same_barcode_is_merged() {
    let store = InMemoryResultStore::new();
    store
        .save_specimen(&patient("P1"), &specimen("S1", &["GLU"]), at(8))
        .await
        .expect("save");
    store
        .save_specimen(&Patient::default(), &specimen("S1", &["GLU", "UREA"]), at(9))
        .await
        .expect("save");

    let record = store
        .find_by_barcode("S1")
        .await
        .expect("query")
        .expect("record");
    assert_eq!(record.results.len(), 3);
    assert_eq!(record.requests.len(), 2);
    // 空患者信息不覆盖已有患者
    assert_eq!(record.patient.id, "P1");
    assert_eq!(record.updated_at, at(9));
}

#[tokio::test]
async fn mark_synced_keeps_partial_progress() {
    let store = InMemoryResultStore::new();
    store
        .save_specimen(&patient("P1"), &specimen("S1", &["GLU"]), at(8))
        .await
        .expect("save");
    store
        .save_specimen(&patient("P2"), &specimen("S2", &["HGB", "WBC"]), at(8))
        .await
        .expect("save");

    let pending = store.pending_sync().await.expect("pending");
    let s2 = pending
        .iter()
        .find(|record| record.barcode == "S2")
        .expect("S2 pending");
    let updated = store
        .mark_synced(&s2.result_ids(), at(10))
        .await
        .expect("mark");
    assert_eq!(updated, 2);

    let pending = store.pending_sync().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].barcode, "S1");

    let again = store
        .mark_synced(&s2.result_ids(), at(11))
        .await
        .expect("mark");
    assert_eq!(again, 0);
    assert_eq!(store.result_count(), 3);
}

#[tokio::test]
async fn new_results_on_synced_specimen_are_pending_again() {
    let store = InMemoryResultStore::new();
    store
        .save_specimen(&patient("P1"), &specimen("S1", &["GLU"]), at(8))
        .await
        .expect("save");
    let ids = store.pending_sync().await.expect("pending")[0].result_ids();
    store.mark_synced(&ids, at(9)).await.expect("mark");
    assert!(store.pending_sync().await.expect("pending").is_empty());

    store
        .save_specimen(&patient("P1"), &specimen("S1", &["UREA"]), at(10))
        .await
        .expect("save");
    let pending = store.pending_sync().await.expect("pending");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].results.len(), 1);
    assert_eq!(pending[0].results[0].result.test_code, "UREA");
}

#[tokio::test]
async fn empty_barcode_is_rejected() {
    let store = InMemoryResultStore::new();
    let result = store
        .save_specimen(&patient("P1"), &specimen("", &["GLU"]), at(8))
        .await;
    assert!(result.is_err());
    assert_eq!(store.result_count(), 0);
}
