//! TCP 设备服务
//!
//! 监听 `0.0.0.0:{port}`，每个连接一个任务，每个连接处理一条报文：
//!
//! ```text
//! accept ─▶ [pinger] ─▶ 读帧（MLLP / 原始）─▶ ProtocolPipeline ─▶ 回写 ACK ─▶ 关闭
//! ```
//!
//! 连接表每 2 秒清理一次，超过 10 秒无活动的连接被强制关闭。

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::{DeviceId, ServerState};
use lis_pipeline::{Framing, ProtocolPipeline};
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::ProtocolError;
use crate::framing::{MAX_FRAME_BYTES, read_mllp_frame, read_raw_frame, wrap_mllp};
use crate::pinger::answer_ping;
use crate::server::{DeviceServer, StateCell, parse_port};

/// TCP 服务计时参数。
#[derive(Debug, Clone, Copy)]
pub struct TcpTiming {
    /// 连接表清理周期
    pub cleanup_interval: Duration,
    /// 超过该时长无活动的连接视为失效
    pub stale_after: Duration,
    /// accept 失败后的退避
    pub accept_backoff: Duration,
    /// 原始分帧的静默结束时长
    pub raw_idle: Duration,
}

impl Default for TcpTiming {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(2),
            stale_after: Duration::from_secs(10),
            accept_backoff: Duration::from_secs(1),
            raw_idle: Duration::from_millis(300),
        }
    }
}

#[derive(Debug)]
struct ConnectionInfo {
    last_activity: Instant,
    cancel: CancellationToken,
}

struct TcpShared {
    device_id: DeviceId,
    pipeline: ProtocolPipeline,
    timing: TcpTiming,
    state: StateCell,
    connections: Mutex<HashMap<SocketAddr, ConnectionInfo>>,
}

impl TcpShared {
    fn track(&self, peer: SocketAddr, cancel: CancellationToken) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.insert(
                peer,
                ConnectionInfo {
                    last_activity: Instant::now(),
                    cancel,
                },
            );
        }
        self.state.set_if_running(ServerState::Connect);
    }

    fn touch(&self, peer: &SocketAddr) {
        if let Ok(mut connections) = self.connections.lock() {
            if let Some(info) = connections.get_mut(peer) {
                info.last_activity = Instant::now();
            }
        }
    }

    fn untrack(&self, peer: &SocketAddr) {
        if let Ok(mut connections) = self.connections.lock() {
            connections.remove(peer);
        }
        self.refresh_state();
    }

    fn refresh_state(&self) {
        let tracked = self
            .connections
            .lock()
            .map(|connections| connections.len())
            .unwrap_or(0);
        let state = if tracked > 0 {
            ServerState::Connect
        } else {
            ServerState::Serving
        };
        self.state.set_if_running(state);
    }

    /// 关闭并移除失效连接。
    fn cleanup(&self) {
        let stale_after = self.timing.stale_after;
        if let Ok(mut connections) = self.connections.lock() {
            connections.retain(|peer, info| {
                let stale = info.last_activity.elapsed() > stale_after;
                if stale {
                    info!(target: "lis.protocol", device_id = self.device_id, peer = %peer, "stale_connection_removed");
                    info.cancel.cancel();
                }
                !stale
            });
        }
        self.refresh_state();
    }

    fn close_all(&self) {
        if let Ok(mut connections) = self.connections.lock() {
            for (peer, info) in connections.drain() {
                debug!(target: "lis.protocol", device_id = self.device_id, peer = %peer, "connection_closed_on_stop");
                info.cancel.cancel();
            }
        }
    }
}

/// TCP 设备服务。
pub struct TcpServer {
    shared: Arc<TcpShared>,
    port: RwLock<String>,
    listener: Mutex<Option<TcpListener>>,
    local_port: Mutex<Option<u16>>,
    cancel: Mutex<CancellationToken>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
}

impl TcpServer {
    pub fn new(device_id: DeviceId, port: &str, pipeline: ProtocolPipeline) -> Self {
        Self::with_timing(device_id, port, pipeline, TcpTiming::default())
    }

    pub fn with_timing(
        device_id: DeviceId,
        port: &str,
        pipeline: ProtocolPipeline,
        timing: TcpTiming,
    ) -> Self {
        Self {
            shared: Arc::new(TcpShared {
                device_id,
                pipeline,
                timing,
                state: StateCell::new(ServerState::Stopped),
                connections: Mutex::new(HashMap::new()),
            }),
            port: RwLock::new(port.to_string()),
            listener: Mutex::new(None),
            local_port: Mutex::new(None),
            cancel: Mutex::new(CancellationToken::new()),
            accept_task: Mutex::new(None),
        }
    }

    /// 实际监听端口（配置为 `0` 时由系统分配）。
    pub fn local_port(&self) -> Option<u16> {
        self.local_port.lock().ok().and_then(|port| *port)
    }

    /// 当前跟踪的连接数。
    pub fn connection_count(&self) -> usize {
        self.shared
            .connections
            .lock()
            .map(|connections| connections.len())
            .unwrap_or(0)
    }

    fn configured_port(&self) -> String {
        self.port
            .read()
            .map(|port| port.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DeviceServer for TcpServer {
    fn device_id(&self) -> DeviceId {
        self.shared.device_id
    }

    fn set_port(&self, port: &str) {
        if let Ok(mut current) = self.port.write() {
            *current = port.to_string();
        }
    }

    async fn start(&self) -> Result<(), ProtocolError> {
        let port = parse_port(&self.configured_port())?;
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ProtocolError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let bound = listener.local_addr()?.port();
        info!(target: "lis.protocol", device_id = self.shared.device_id, addr = %addr, port = bound, "tcp_server_started");

        if let Ok(mut slot) = self.local_port.lock() {
            *slot = Some(bound);
        }
        if let Ok(mut slot) = self.listener.lock() {
            *slot = Some(listener);
        }
        if let Ok(mut cancel) = self.cancel.lock() {
            *cancel = CancellationToken::new();
        }
        Ok(())
    }

    fn serve(&self) -> Result<(), ProtocolError> {
        let listener = self
            .listener
            .lock()
            .ok()
            .and_then(|mut slot| slot.take())
            .ok_or(ProtocolError::NotStarted)?;
        let cancel = self
            .cancel
            .lock()
            .map(|token| token.clone())
            .map_err(|_| ProtocolError::NotStarted)?;

        self.shared.state.set(ServerState::Serving);
        let accept = tokio::spawn(accept_loop(Arc::clone(&self.shared), listener, cancel.clone()));
        tokio::spawn(cleanup_loop(Arc::clone(&self.shared), cancel));
        if let Ok(mut slot) = self.accept_task.lock() {
            *slot = Some(accept);
        }
        Ok(())
    }

    fn state(&self) -> ServerState {
        self.shared.state.get()
    }

    async fn stop(&self) -> Result<(), ProtocolError> {
        self.shared.state.set(ServerState::Stopped);
        if let Ok(cancel) = self.cancel.lock() {
            cancel.cancel();
        }
        if let Ok(mut slot) = self.listener.lock() {
            slot.take();
        }
        self.shared.close_all();
        // 等待 accept 循环释放监听端口，之后可立即在同一端口重启
        let accept = self.accept_task.lock().ok().and_then(|mut slot| slot.take());
        if let Some(accept) = accept {
            if let Err(err) = accept.await {
                warn!(target: "lis.protocol", device_id = self.shared.device_id, error = %err, "accept_loop_join_failed");
            }
        }
        info!(target: "lis.protocol", device_id = self.shared.device_id, "tcp_server_stopped");
        Ok(())
    }
}

async fn accept_loop(shared: Arc<TcpShared>, listener: TcpListener, cancel: CancellationToken) {
    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };
        match accepted {
            Ok((stream, peer)) => {
                info!(target: "lis.protocol", device_id = shared.device_id, peer = %peer, "connection_accepted");
                let token = cancel.child_token();
                shared.track(peer, token.clone());
                tokio::spawn(handle_connection(Arc::clone(&shared), stream, peer, token));
            }
            Err(err) => {
                error!(target: "lis.protocol", device_id = shared.device_id, error = %err, "accept_failed");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(shared.timing.accept_backoff) => {}
                }
            }
        }
    }
    shared.state.set(ServerState::Stopped);
    debug!(target: "lis.protocol", device_id = shared.device_id, "accept_loop_exited");
}

async fn cleanup_loop(shared: Arc<TcpShared>, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval(shared.timing.cleanup_interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => shared.cleanup(),
        }
    }
}

async fn handle_connection(
    shared: Arc<TcpShared>,
    stream: TcpStream,
    peer: SocketAddr,
    cancel: CancellationToken,
) {
    let result = tokio::select! {
        _ = cancel.cancelled() => Ok(()),
        result = serve_connection(&shared, stream, peer) => result,
    };
    if let Err(err) = result {
        warn!(target: "lis.protocol", device_id = shared.device_id, peer = %peer, error = %err, "connection_failed");
    }
    shared.untrack(&peer);
    debug!(target: "lis.protocol", device_id = shared.device_id, peer = %peer, "connection_closed");
}

async fn serve_connection(
    shared: &TcpShared,
    mut stream: TcpStream,
    peer: SocketAddr,
) -> Result<(), ProtocolError> {
    let profile = shared.pipeline.profile();
    if profile.pinger && answer_ping(&mut stream).await? {
        return Ok(());
    }

    let frame = match profile.framing {
        Framing::Mllp => read_mllp_frame(&mut stream, MAX_FRAME_BYTES).await?,
        Framing::Raw | Framing::IdleTimeout => {
            read_raw_frame(&mut stream, shared.timing.raw_idle, MAX_FRAME_BYTES).await?
        }
    };
    let Some(frame) = frame else {
        return Ok(());
    };
    shared.touch(&peer);
    debug!(target: "lis.protocol", device_id = shared.device_id, peer = %peer, bytes = frame.len(), "frame_received");

    let Ok(ack) = shared.pipeline.handle(&frame).await else {
        return Ok(());
    };
    let reply = match profile.framing {
        Framing::Mllp => wrap_mllp(&ack),
        Framing::Raw | Framing::IdleTimeout => ack,
    };
    stream.write_all(&reply).await?;
    stream.flush().await?;
    shared.touch(&peer);
    Ok(())
}
