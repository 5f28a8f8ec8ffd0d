//! 检验结果公开链接。

use tracing::{info, warn};

use crate::error::SyncError;
use crate::upstream::{UpstreamClient, ensure_success};

/// 向上游申请标本结果的公开访问链接。
#[derive(Debug, Clone)]
pub struct ResultLinkService {
    client: UpstreamClient,
}

impl ResultLinkService {
    pub fn new(client: UpstreamClient) -> Self {
        Self { client }
    }

    /// `POST /unauthenticated/observation-result/generate/{lab_id}ORD{barcode}`，
    /// 返回响应 JSON 的 `data` 字段；缺少该字段时返回空串。
    pub async fn generate(&self, barcode: &str) -> Result<String, SyncError> {
        let result_id = self.client.upstream().result_id(barcode);
        let path = format!("/unauthenticated/observation-result/generate/{result_id}");
        let response = self
            .client
            .post(&path)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|err| SyncError::InvalidResponse(err.to_string()))?;

        let link = match body.get("data") {
            Some(serde_json::Value::String(link)) => link.clone(),
            Some(serde_json::Value::Null) | None => {
                warn!(target: "lis.sync", barcode, "result_link_missing_data");
                String::new()
            }
            Some(other) => other.to_string(),
        };
        info!(target: "lis.sync", barcode, result_id = %result_id, "result_link_generated");
        Ok(link)
    }
}
