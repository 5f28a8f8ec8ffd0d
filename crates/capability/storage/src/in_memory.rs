//! 结果存储内存实现
//!
//! 使用 `RwLock<HashMap>` 保存标本，进程重启即丢失。

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use domain::{Patient, Specimen};

use crate::error::StorageError;
use crate::models::{ResultId, ResultRecord, SpecimenRecord};
use crate::traits::ResultStore;

/// 结果内存存储
pub struct InMemoryResultStore {
    specimens: RwLock<HashMap<String, SpecimenRecord>>,
    next_id: AtomicU64,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self {
            specimens: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// 当前累计的结果条数（用于测试）
    pub fn result_count(&self) -> usize {
        self.specimens
            .read()
            .map(|specimens| specimens.values().map(|record| record.results.len()).sum())
            .unwrap_or(0)
    }
}

impl Default for InMemoryResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn save_specimen(
        &self,
        patient: &Patient,
        specimen: &Specimen,
        received_at: NaiveDateTime,
    ) -> Result<usize, StorageError> {
        if specimen.barcode.is_empty() {
            return Err(StorageError::new("specimen barcode is empty"));
        }
        let mut specimens = self
            .specimens
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let record = specimens
            .entry(specimen.barcode.clone())
            .or_insert_with(|| SpecimenRecord {
                barcode: specimen.barcode.clone(),
                patient: patient.clone(),
                requests: Vec::new(),
                results: Vec::new(),
                updated_at: received_at,
            });

        if *patient != Patient::default() {
            record.patient = patient.clone();
        }
        for request in &specimen.observation_requests {
            if !record
                .requests
                .iter()
                .any(|known| known.test_code == request.test_code)
            {
                record.requests.push(request.clone());
            }
        }
        for result in &specimen.observation_results {
            record.results.push(ResultRecord {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                result: result.clone(),
                received_at,
                synced_at: None,
            });
        }
        record.updated_at = received_at;
        Ok(specimen.observation_results.len())
    }

    async fn find_by_barcode(
        &self,
        barcode: &str,
    ) -> Result<Option<SpecimenRecord>, StorageError> {
        let specimens = self
            .specimens
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(specimens.get(barcode).cloned())
    }

    async fn pending_sync(&self) -> Result<Vec<SpecimenRecord>, StorageError> {
        let specimens = self
            .specimens
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut pending: Vec<SpecimenRecord> = specimens
            .values()
            .filter(|record| record.results.iter().any(ResultRecord::is_pending))
            .map(|record| {
                let mut record = record.clone();
                record.results.retain(ResultRecord::is_pending);
                record
            })
            .collect();
        pending.sort_by(|a, b| a.barcode.cmp(&b.barcode));
        Ok(pending)
    }

    async fn mark_synced(
        &self,
        ids: &[ResultId],
        synced_at: NaiveDateTime,
    ) -> Result<usize, StorageError> {
        let mut specimens = self
            .specimens
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut updated = 0;
        for record in specimens.values_mut() {
            for result in record.results.iter_mut() {
                if result.is_pending() && ids.contains(&result.id) {
                    result.synced_at = Some(synced_at);
                    updated += 1;
                }
            }
        }
        Ok(updated)
    }
}
