//! 网关运行配置加载。
//!
//! 环境变量（`LIS_*`）提供运行参数，设备列表来自 JSON 文件。

use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::time::Duration;

use domain::Device;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
    #[error("read devices file {path} failed: {message}")]
    Devices { path: String, message: String },
}

/// 外发同步配置（`LIS_SYNC_ENABLED` 关闭时不读取）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// 上游主机名，按 HTTPS 访问
    pub base_url: String,
    pub api_key: String,
    pub lab_id: String,
    pub observation_interval_seconds: u64,
    pub queue_capacity: usize,
    pub retry_max_attempts: u32,
    pub retry_delay_ms: u64,
    pub job_deadline_seconds: u64,
    pub health_interval_seconds: u64,
    pub health_timeout_seconds: u64,
    pub http_timeout_seconds: u64,
}

impl SyncConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            base_url: read_required("LIS_SYNC_BASE_URL")?,
            api_key: read_required("LIS_SYNC_API_KEY")?,
            lab_id: read_required("LIS_LAB_ID")?,
            observation_interval_seconds: read_positive_u64("LIS_SYNC_RESULT_INTERVAL_SECONDS", 10)?,
            queue_capacity: read_positive_u64("LIS_SYNC_QUEUE_SIZE", 10)? as usize,
            retry_max_attempts: read_positive_u32("LIS_SYNC_RETRY_MAX_ATTEMPTS", 10)?,
            retry_delay_ms: read_u64_with_default("LIS_SYNC_RETRY_DELAY_MS", 1000)?,
            job_deadline_seconds: read_positive_u64("LIS_SYNC_DEADLINE_SECONDS", 120)?,
            health_interval_seconds: read_positive_u64("LIS_HEALTH_INTERVAL_SECONDS", 10)?,
            health_timeout_seconds: read_positive_u64("LIS_HEALTH_TIMEOUT_SECONDS", 5)?,
            http_timeout_seconds: read_positive_u64("LIS_SYNC_HTTP_TIMEOUT_SECONDS", 10)?,
        })
    }

    pub fn observation_interval(&self) -> Duration {
        Duration::from_secs(self.observation_interval_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_seconds)
    }

    pub fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_seconds)
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.health_timeout_seconds)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_seconds)
    }
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    /// 设备列表 JSON 文件；未设置时不启动任何设备服务
    pub devices_file: Option<String>,
    /// 设备文件重读周期
    pub devices_reload_seconds: u64,
    pub sync: Option<SyncConfig>,
}

impl AppConfig {
    /// 从环境变量读取配置。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = env::var("LIS_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:8214".to_string());
        let devices_file = read_optional("LIS_DEVICES_FILE");
        let devices_reload_seconds = read_positive_u64("LIS_DEVICES_RELOAD_SECONDS", 30)?;
        let sync = if read_bool_with_default("LIS_SYNC_ENABLED", true)? {
            Some(SyncConfig::from_env()?)
        } else {
            None
        };

        Ok(Self {
            http_addr,
            devices_file,
            devices_reload_seconds,
            sync,
        })
    }

    pub fn devices_reload_interval(&self) -> Duration {
        Duration::from_secs(self.devices_reload_seconds)
    }

    /// 读取设备列表；未配置文件时返回空列表。
    pub fn load_devices(&self) -> Result<Vec<Device>, ConfigError> {
        match &self.devices_file {
            Some(path) => load_devices(path),
            None => Ok(Vec::new()),
        }
    }
}

/// 从 JSON 文件读取设备列表（数组），设备 ID 不可重复。
pub fn load_devices(path: impl AsRef<Path>) -> Result<Vec<Device>, ConfigError> {
    let path = path.as_ref();
    let devices_error = |message: String| ConfigError::Devices {
        path: path.display().to_string(),
        message,
    };
    let raw = std::fs::read_to_string(path).map_err(|err| devices_error(err.to_string()))?;
    let devices: Vec<Device> =
        serde_json::from_str(&raw).map_err(|err| devices_error(err.to_string()))?;

    let mut seen = HashSet::new();
    for device in &devices {
        if !seen.insert(device.id) {
            return Err(devices_error(format!("duplicate device id {}", device.id)));
        }
    }
    Ok(devices)
}

fn read_required(key: &str) -> Result<String, ConfigError> {
    read_optional(key).ok_or_else(|| ConfigError::Missing(key.to_string()))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_positive_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = read_u64_with_default(key, default)?;
    if value == 0 {
        return Err(ConfigError::Invalid(key.to_string(), value.to_string()));
    }
    Ok(value)
}

fn read_positive_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    let value = read_positive_u64(key, u64::from(default))?;
    u32::try_from(value).map_err(|_| ConfigError::Invalid(key.to_string(), value.to_string()))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

/// 未设置或为空时取默认值；无法识别的取值报错。
fn read_bool_with_default(key: &str, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = read_optional(key) else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::Invalid(key.to_string(), value)),
    }
}
