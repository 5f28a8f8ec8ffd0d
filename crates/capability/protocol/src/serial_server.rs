//! 串口设备服务
//!
//! 8N1 打开串口，阻塞读线程把数据块经通道转发给异步会话；
//! 会话用 `IdleAssembler` 按 300 ms 静默切分报文。

use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{DeviceId, ServerState};
use lis_pipeline::{AckDelivery, ProtocolPipeline};
use serialport::{DataBits, Parity, SerialPort, StopBits};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ProtocolError;
use crate::framing::IdleAssembler;
use crate::server::{DeviceServer, StateCell};

/// 静默多久视为一条报文结束
pub const SERIAL_IDLE: Duration = Duration::from_millis(300);
/// 最后一次收到数据后保持 `Connect` 的时长
pub const SERIAL_CONNECT_WINDOW: Duration = Duration::from_secs(10);

const READ_TIMEOUT: Duration = Duration::from_millis(100);
const CHANNEL_CAPACITY: usize = 64;

type SharedPort = Arc<Mutex<Box<dyn SerialPort>>>;

/// 会话活动记录，用于推导 `Connect` / `Serving`。
#[derive(Debug)]
pub struct SessionActivity {
    accumulating: AtomicBool,
    last_chunk: Mutex<Option<Instant>>,
}

impl SessionActivity {
    pub fn new() -> Self {
        Self {
            accumulating: AtomicBool::new(false),
            last_chunk: Mutex::new(None),
        }
    }

    fn record_chunk(&self) {
        self.accumulating.store(true, Ordering::SeqCst);
        if let Ok(mut last) = self.last_chunk.lock() {
            *last = Some(Instant::now());
        }
    }

    fn record_dispatch(&self) {
        self.accumulating.store(false, Ordering::SeqCst);
    }

    /// 组帧中，或距最后一块数据不足 10 秒。
    pub fn is_connected(&self) -> bool {
        if self.accumulating.load(Ordering::SeqCst) {
            return true;
        }
        self.last_chunk
            .lock()
            .ok()
            .and_then(|last| *last)
            .is_some_and(|last| last.elapsed() < SERIAL_CONNECT_WINDOW)
    }
}

impl Default for SessionActivity {
    fn default() -> Self {
        Self::new()
    }
}

/// 串口会话主循环：收块 → 组帧 → 静默到期即回调。
///
/// 通道关闭或取消时结束；结束前未到期的缓冲被丢弃。
pub async fn run_idle_session<F, Fut>(
    mut chunks: mpsc::Receiver<Vec<u8>>,
    idle: Duration,
    activity: Arc<SessionActivity>,
    cancel: CancellationToken,
    mut on_frame: F,
) where
    F: FnMut(Vec<u8>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut assembler = IdleAssembler::new(idle);
    loop {
        let deadline = assembler.deadline();
        let due = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = chunks.recv() => match chunk {
                Some(chunk) => {
                    activity.record_chunk();
                    if let Err(err) = assembler.push(&chunk, Instant::now()) {
                        activity.record_dispatch();
                        warn!(target: "lis.protocol", error = %err, "serial_frame_discarded");
                    }
                }
                None => break,
            },
            _ = due => {
                if let Some(frame) = assembler.take_due(Instant::now()) {
                    activity.record_dispatch();
                    on_frame(frame).await;
                }
            }
        }
    }
}

/// 串口读线程与会话任务。
///
/// `shutdown` 返回时两者都已退出，读写端口句柄均已释放，可立即重新打开同一端口。
#[derive(Debug)]
pub struct SerialWorkers {
    stop: Arc<AtomicBool>,
    cancel: CancellationToken,
    reader: Option<std::thread::JoinHandle<()>>,
    session: Option<tokio::task::JoinHandle<()>>,
}

impl SerialWorkers {
    pub fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
            reader: None,
            session: None,
        }
    }

    /// 读线程轮询的停止标志
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn set_reader(&mut self, reader: std::thread::JoinHandle<()>) {
        self.reader = Some(reader);
    }

    pub fn set_session(&mut self, session: tokio::task::JoinHandle<()>) {
        self.session = Some(session);
    }

    /// 通知停止并等待会话任务与读线程退出。
    pub async fn shutdown(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.cancel.cancel();
        if let Some(session) = self.session.take() {
            if let Err(err) = session.await {
                warn!(target: "lis.protocol", error = %err, "serial_session_join_failed");
            }
        }
        if let Some(reader) = self.reader.take() {
            match tokio::task::spawn_blocking(move || reader.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!(target: "lis.protocol", "serial_reader_panicked"),
                Err(err) => {
                    warn!(target: "lis.protocol", error = %err, "serial_reader_join_failed")
                }
            }
        }
    }
}

impl Default for SerialWorkers {
    fn default() -> Self {
        Self::new()
    }
}

/// 串口设备服务。
pub struct SerialServer {
    device_id: DeviceId,
    baud_rate: u32,
    pipeline: ProtocolPipeline,
    port_name: RwLock<String>,
    port: Mutex<Option<Box<dyn SerialPort>>>,
    state: Arc<StateCell>,
    activity: Arc<SessionActivity>,
    workers: Mutex<Option<SerialWorkers>>,
}

impl SerialServer {
    pub fn new(
        device_id: DeviceId,
        port_name: &str,
        baud_rate: u32,
        pipeline: ProtocolPipeline,
    ) -> Self {
        Self {
            device_id,
            baud_rate,
            pipeline,
            port_name: RwLock::new(port_name.to_string()),
            port: Mutex::new(None),
            state: Arc::new(StateCell::new(ServerState::Stopped)),
            activity: Arc::new(SessionActivity::new()),
            workers: Mutex::new(None),
        }
    }

    fn port_name(&self) -> String {
        self.port_name
            .read()
            .map(|name| name.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeviceServer for SerialServer {
    fn device_id(&self) -> DeviceId {
        self.device_id
    }

    fn set_port(&self, port: &str) {
        if let Ok(mut name) = self.port_name.write() {
            *name = port.to_string();
        }
    }

    async fn start(&self) -> Result<(), ProtocolError> {
        let name = self.port_name();
        let port = serialport::new(&name, self.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .timeout(READ_TIMEOUT)
            .open()?;
        info!(target: "lis.protocol", device_id = self.device_id, port = %name, baud_rate = self.baud_rate, "serial_server_started");

        if let Ok(mut slot) = self.port.lock() {
            *slot = Some(port);
        }
        Ok(())
    }

    fn serve(&self) -> Result<(), ProtocolError> {
        let reader = self
            .port
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(ProtocolError::NotStarted)?;
        let writer: SharedPort = Arc::new(Mutex::new(reader.try_clone()?));
        let mut workers = SerialWorkers::new();
        let cancel = workers.cancel_token();
        let stop = workers.stop_flag();

        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let device_id = self.device_id;
        workers.set_reader(std::thread::spawn(move || {
            read_blocking(device_id, reader, tx, stop)
        }));

        self.state.set(ServerState::Serving);
        let pipeline = self.pipeline.clone();
        let state = Arc::clone(&self.state);
        let activity = Arc::clone(&self.activity);
        workers.set_session(tokio::spawn(async move {
            run_idle_session(rx, SERIAL_IDLE, activity, cancel, |frame| {
                dispatch(device_id, pipeline.clone(), Arc::clone(&writer), frame)
            })
            .await;
            state.set(ServerState::Stopped);
            debug!(target: "lis.protocol", device_id, "serial_session_exited");
        }));

        let previous = self
            .workers
            .lock()
            .map_err(|_| ProtocolError::NotStarted)?
            .replace(workers);
        if let Some(previous) = previous {
            previous.stop.store(true, Ordering::SeqCst);
            previous.cancel.cancel();
        }
        Ok(())
    }

    fn state(&self) -> ServerState {
        match self.state.get() {
            ServerState::Stopped => ServerState::Stopped,
            _ if self.activity.is_connected() => ServerState::Connect,
            _ => ServerState::Serving,
        }
    }

    async fn stop(&self) -> Result<(), ProtocolError> {
        self.state.set(ServerState::Stopped);
        if let Ok(mut slot) = self.port.lock() {
            slot.take();
        }
        let workers = self.workers.lock().ok().and_then(|mut slot| slot.take());
        if let Some(workers) = workers {
            workers.shutdown().await;
        }
        info!(target: "lis.protocol", device_id = self.device_id, "serial_server_stopped");
        Ok(())
    }
}

/// 阻塞读线程：超时视为无数据，继续轮询直到停止标志置位或通道关闭。
fn read_blocking(
    device_id: DeviceId,
    mut port: Box<dyn SerialPort>,
    tx: mpsc::Sender<Vec<u8>>,
    stop: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 1024];
    while !stop.load(Ordering::SeqCst) {
        match port.read(&mut buf) {
            Ok(0) => continue,
            Ok(n) => {
                if tx.blocking_send(buf[..n].to_vec()).is_err() {
                    break;
                }
            }
            Err(err) if err.kind() == ErrorKind::TimedOut => continue,
            Err(err) => {
                error!(target: "lis.protocol", device_id, error = %err, "serial_read_failed");
                break;
            }
        }
    }
    debug!(target: "lis.protocol", device_id, "serial_reader_exited");
}

async fn dispatch(
    device_id: DeviceId,
    pipeline: ProtocolPipeline,
    writer: SharedPort,
    frame: Vec<u8>,
) {
    debug!(target: "lis.protocol", device_id, bytes = frame.len(), "serial_frame_assembled");
    let Ok(ack) = pipeline.handle(&frame).await else {
        return;
    };
    match pipeline.profile().ack.delivery {
        AckDelivery::LogOnly => {
            info!(target: "lis.protocol", device_id, ack = %String::from_utf8_lossy(&ack), "serial_ack_logged");
        }
        AckDelivery::Reply => {
            let written = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
                let mut port = writer
                    .lock()
                    .map_err(|_| std::io::Error::other("serial writer lock poisoned"))?;
                port.write_all(&ack)?;
                port.flush()
            })
            .await;
            match written {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(target: "lis.protocol", device_id, error = %err, "serial_ack_write_failed")
                }
                Err(err) => {
                    warn!(target: "lis.protocol", device_id, error = %err, "serial_ack_write_failed")
                }
            }
        }
    }
}
