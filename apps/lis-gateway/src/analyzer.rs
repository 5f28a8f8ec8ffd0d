//! 流水线下游端口：结果写入存储，申请查询按条码回查。

use std::sync::Arc;

use async_trait::async_trait;
use domain::{CanonicalMessage, Specimen};
use lis_pipeline::{AnalyzerPort, PortError};
use lis_storage::ResultStore;
use tracing::{info, warn};

/// 以结果存储为后端的 `AnalyzerPort`。
pub struct StoreAnalyzerPort {
    store: Arc<dyn ResultStore>,
}

impl StoreAnalyzerPort {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AnalyzerPort for StoreAnalyzerPort {
    async fn process_oru_r01(&self, message: CanonicalMessage) -> Result<(), PortError> {
        let received_at = chrono::Local::now().naive_local();
        let mut saved = 0;
        for specimen in &message.specimens {
            if specimen.barcode.is_empty() {
                warn!(
                    target: "lis.pipeline",
                    control_id = %message.header.control_id,
                    results = specimen.observation_results.len(),
                    "specimen_without_barcode_skipped"
                );
                continue;
            }
            saved += self
                .store
                .save_specimen(&message.patient, specimen, received_at)
                .await
                .map_err(|err| PortError::new(err.to_string()))?;
        }
        info!(
            target: "lis.pipeline",
            control_id = %message.header.control_id,
            sender = %message.header.sending_application,
            results = saved,
            "results_stored"
        );
        Ok(())
    }

    /// 只返回已知条码的标本；申请列表优先取存储中的记录。
    async fn process_orm_o01(&self, message: CanonicalMessage) -> Result<Vec<Specimen>, PortError> {
        let mut specimens = Vec::new();
        for requested in &message.specimens {
            let record = self
                .store
                .find_by_barcode(&requested.barcode)
                .await
                .map_err(|err| PortError::new(err.to_string()))?;
            let Some(record) = record else {
                warn!(target: "lis.pipeline", barcode = %requested.barcode, "order_barcode_unknown");
                continue;
            };
            let observation_requests = if record.requests.is_empty() {
                requested.observation_requests.clone()
            } else {
                record.requests
            };
            specimens.push(Specimen {
                barcode: record.barcode,
                observation_results: Vec::new(),
                observation_requests,
            });
        }
        Ok(specimens)
    }
}
