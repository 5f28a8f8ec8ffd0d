//! 上游服务地址与带鉴权头的 HTTP 客户端。

use std::sync::Arc;
use std::time::Duration;

use reqwest::RequestBuilder;

use crate::error::SyncError;

/// 鉴权头名称
pub const API_KEY_HEADER: &str = "X-API-Key";

/// 上游服务配置。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    /// 主机名（按 HTTPS 访问），或带协议的完整地址
    pub base_url: String,
    pub api_key: String,
    pub lab_id: String,
}

impl Upstream {
    /// 拼接路径；`path` 以 `/` 开头。
    pub fn url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if base.starts_with("http://") || base.starts_with("https://") {
            format!("{base}{path}")
        } else {
            format!("https://{base}{path}")
        }
    }

    /// 外部结果 ID：`{lab_id}ORD{barcode}`
    pub fn result_id(&self, barcode: &str) -> String {
        format!("{}ORD{}", self.lab_id, barcode)
    }
}

/// 上游 HTTP 客户端，所有请求带 `X-API-Key`。
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    upstream: Arc<Upstream>,
}

impl UpstreamClient {
    pub fn new(upstream: Arc<Upstream>, timeout: Duration) -> Result<Self, SyncError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, upstream })
    }

    pub fn upstream(&self) -> &Upstream {
        &self.upstream
    }

    pub fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(self.upstream.url(path))
            .header(API_KEY_HEADER, &self.upstream.api_key)
    }

    pub fn post(&self, path: &str) -> RequestBuilder {
        self.http
            .post(self.upstream.url(path))
            .header(API_KEY_HEADER, &self.upstream.api_key)
    }
}

/// 非 2xx 响应转为 `SyncError::Status`。
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SyncError::Status {
        status: status.as_u16(),
        body,
    })
}
