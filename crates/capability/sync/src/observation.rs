//! 检验结果外发任务
//!
//! 每个含待同步结果的标本一次 POST；只有 2xx 的标本被标记已同步，
//! 单个标本失败不影响其余标本，已成功的部分在出错返回前落库。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::Sex;
use lis_storage::{ResultId, ResultStore, SpecimenRecord};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::job::SyncJob;
use crate::upstream::{UpstreamClient, ensure_success};

/// 任务名
pub const OBSERVATION_RESULT_JOB: &str = "observation-result";

const RESULTS_PATH: &str = "/protected/observation-result/";
/// 分析仪写入的结果
const ADDED_BY_ANALYZER: &str = "Analyzer";

#[derive(Debug, Serialize)]
struct ResultPayload<'a> {
    id: String,
    lab_id: &'a str,
    order_id: &'a str,
    completed_at: NaiveDateTime,
    is_verified: bool,
    patient: PatientPayload<'a>,
    items: Vec<ResultItemPayload<'a>>,
}

#[derive(Debug, Serialize)]
struct PatientPayload<'a> {
    patient_id: String,
    lab_id: &'a str,
    first_name: &'a str,
    last_name: &'a str,
    gender: &'static str,
    birthdate: Option<chrono::NaiveDate>,
    address: &'a str,
}

#[derive(Debug, Serialize)]
struct ResultItemPayload<'a> {
    id: String,
    code: String,
    value: &'a str,
    unit: &'a str,
    reference_range: &'a str,
    flag: &'a str,
    added_by: &'static str,
}

fn gender(sex: Sex) -> &'static str {
    match sex {
        Sex::Male => "M",
        Sex::Female => "F",
        Sex::Other | Sex::Unknown => "",
    }
}

fn build_payload<'a>(lab_id: &'a str, record: &'a SpecimenRecord) -> ResultPayload<'a> {
    let items = record
        .results
        .iter()
        .map(|item| ResultItemPayload {
            id: format!(
                "{lab_id}ItemTEST{}{}",
                item.result.test_code, record.barcode
            ),
            code: format!("{lab_id}|{}", item.result.test_code),
            value: item.result.values.first().map(String::as_str).unwrap_or(""),
            unit: &item.result.unit,
            reference_range: &item.result.reference_range,
            flag: &item.result.abnormal_flag,
            added_by: ADDED_BY_ANALYZER,
        })
        .collect();

    ResultPayload {
        id: format!("{lab_id}ORD{}", record.barcode),
        lab_id,
        order_id: &record.barcode,
        completed_at: record.updated_at,
        is_verified: false,
        patient: PatientPayload {
            patient_id: format!("{lab_id}PAT{}", record.patient.id),
            lab_id,
            first_name: &record.patient.first_name,
            last_name: &record.patient.last_name,
            gender: gender(record.patient.sex),
            birthdate: record.patient.birthdate,
            address: &record.patient.address,
        },
        items,
    }
}

/// 检验结果同步任务。
pub struct ObservationResultSync {
    store: Arc<dyn ResultStore>,
    client: UpstreamClient,
    interval: Duration,
}

impl ObservationResultSync {
    pub fn new(store: Arc<dyn ResultStore>, client: UpstreamClient, interval: Duration) -> Self {
        Self {
            store,
            client,
            interval,
        }
    }

    async fn send(&self, record: &SpecimenRecord) -> Result<(), SyncError> {
        let payload = build_payload(&self.client.upstream().lab_id, record);
        let response = self.client.post(RESULTS_PATH).json(&payload).send().await?;
        ensure_success(response).await?;
        Ok(())
    }

    async fn mark(&self, ids: &[ResultId]) -> Result<(), SyncError> {
        if ids.is_empty() {
            return Ok(());
        }
        let now = chrono::Local::now().naive_local();
        let updated = self.store.mark_synced(ids, now).await?;
        info!(target: "lis.sync", job = OBSERVATION_RESULT_JOB, results = updated, "results_marked_synced");
        Ok(())
    }
}

#[async_trait]
impl SyncJob for ObservationResultSync {
    fn name(&self) -> &str {
        OBSERVATION_RESULT_JOB
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn run(&self) -> Result<(), SyncError> {
        let pending = self.store.pending_sync().await?;
        if pending.is_empty() {
            debug!(target: "lis.sync", job = OBSERVATION_RESULT_JOB, "nothing_to_sync");
            return Ok(());
        }

        let mut synced = Vec::new();
        for record in &pending {
            match self.send(record).await {
                Ok(()) => synced.extend(record.result_ids()),
                Err(SyncError::Status { status, body }) => {
                    warn!(
                        target: "lis.sync",
                        job = OBSERVATION_RESULT_JOB,
                        barcode = %record.barcode,
                        status,
                        body = %body,
                        "specimen_rejected"
                    );
                }
                Err(err) => {
                    // 传输层失败：保存已成功部分后交由重试
                    self.mark(&synced).await?;
                    return Err(err);
                }
            }
        }
        self.mark(&synced).await
    }
}
