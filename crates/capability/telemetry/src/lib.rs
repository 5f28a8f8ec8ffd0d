//! 追踪、请求 ID 与网关计数器。

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 流水线失败阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Frame,
    Decode,
    Mapping,
    Process,
    Encode,
}

/// 基础指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_acked: u64,
    pub frame_failures: u64,
    pub decode_failures: u64,
    pub mapping_failures: u64,
    pub process_failures: u64,
    pub encode_failures: u64,
    pub pings_answered: u64,
    pub quirk_rewrites: u64,
    pub process_latency_ms_total: u64,
    pub process_latency_ms_count: u64,
    pub sync_success: u64,
    pub sync_failure: u64,
    pub sync_retries: u64,
    pub sync_ticks_dropped: u64,
    pub health_failures: u64,
}

/// 网关计数器。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    messages_acked: AtomicU64,
    frame_failures: AtomicU64,
    decode_failures: AtomicU64,
    mapping_failures: AtomicU64,
    process_failures: AtomicU64,
    encode_failures: AtomicU64,
    pings_answered: AtomicU64,
    quirk_rewrites: AtomicU64,
    process_latency_ms_total: AtomicU64,
    process_latency_ms_count: AtomicU64,
    sync_success: AtomicU64,
    sync_failure: AtomicU64,
    sync_retries: AtomicU64,
    sync_ticks_dropped: AtomicU64,
    health_failures: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_acked: AtomicU64::new(0),
            frame_failures: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            mapping_failures: AtomicU64::new(0),
            process_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            pings_answered: AtomicU64::new(0),
            quirk_rewrites: AtomicU64::new(0),
            process_latency_ms_total: AtomicU64::new(0),
            process_latency_ms_count: AtomicU64::new(0),
            sync_success: AtomicU64::new(0),
            sync_failure: AtomicU64::new(0),
            sync_retries: AtomicU64::new(0),
            sync_ticks_dropped: AtomicU64::new(0),
            health_failures: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_acked: self.messages_acked.load(Ordering::Relaxed),
            frame_failures: self.frame_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            mapping_failures: self.mapping_failures.load(Ordering::Relaxed),
            process_failures: self.process_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            pings_answered: self.pings_answered.load(Ordering::Relaxed),
            quirk_rewrites: self.quirk_rewrites.load(Ordering::Relaxed),
            process_latency_ms_total: self.process_latency_ms_total.load(Ordering::Relaxed),
            process_latency_ms_count: self.process_latency_ms_count.load(Ordering::Relaxed),
            sync_success: self.sync_success.load(Ordering::Relaxed),
            sync_failure: self.sync_failure.load(Ordering::Relaxed),
            sync_retries: self.sync_retries.load(Ordering::Relaxed),
            sync_ticks_dropped: self.sync_ticks_dropped.load(Ordering::Relaxed),
            health_failures: self.health_failures.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录收到的仪器报文数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录已生成 ACK 的报文数。
pub fn record_message_acked() {
    metrics().messages_acked.fetch_add(1, Ordering::Relaxed);
}

/// 按阶段记录流水线失败。
pub fn record_pipeline_failure(stage: FailureStage) {
    let metrics = metrics();
    let counter = match stage {
        FailureStage::Frame => &metrics.frame_failures,
        FailureStage::Decode => &metrics.decode_failures,
        FailureStage::Mapping => &metrics.mapping_failures,
        FailureStage::Process => &metrics.process_failures,
        FailureStage::Encode => &metrics.encode_failures,
    };
    counter.fetch_add(1, Ordering::Relaxed);
}

/// 记录心跳应答次数。
pub fn record_ping_answered() {
    metrics().pings_answered.fetch_add(1, Ordering::Relaxed);
}

/// 记录字段修正次数。
pub fn record_quirk_rewrite() {
    metrics().quirk_rewrites.fetch_add(1, Ordering::Relaxed);
}

/// 记录单条报文处理耗时（毫秒）。
pub fn record_process_latency_ms(latency_ms: u64) {
    let metrics = metrics();
    metrics
        .process_latency_ms_total
        .fetch_add(latency_ms, Ordering::Relaxed);
    metrics
        .process_latency_ms_count
        .fetch_add(1, Ordering::Relaxed);
}

/// 记录同步任务成功次数。
pub fn record_sync_success() {
    metrics().sync_success.fetch_add(1, Ordering::Relaxed);
}

/// 记录同步任务失败次数（重试耗尽或超时）。
pub fn record_sync_failure() {
    metrics().sync_failure.fetch_add(1, Ordering::Relaxed);
}

/// 记录同步重试次数。
pub fn record_sync_retry() {
    metrics().sync_retries.fetch_add(1, Ordering::Relaxed);
}

/// 记录因队列已满被丢弃的调度次数。
pub fn record_sync_tick_dropped() {
    metrics().sync_ticks_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录健康检查失败次数。
pub fn record_health_failure() {
    metrics().health_failures.fetch_add(1, Ordering::Relaxed);
}
