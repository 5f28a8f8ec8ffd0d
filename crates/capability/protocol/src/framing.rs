//! 分帧：MLLP 块、原始读取与串口静默超时。

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::{Instant, timeout};

use crate::error::ProtocolError;

/// MLLP 起始符
pub const START_BLOCK: u8 = 0x0B;
/// MLLP 结束符
pub const END_BLOCK: u8 = 0x1C;
pub const CARRIAGE_RETURN: u8 = 0x0D;
/// 心跳字节
pub const START_OF_TEXT: u8 = 0x02;
pub const ACKNOWLEDGE: u8 = 0x06;

/// 单帧上限
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// 包装为 `0x0B … 0x1C 0x0D`。
pub fn wrap_mllp(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(payload.len() + 3);
    out.push(START_BLOCK);
    out.extend_from_slice(payload);
    out.push(END_BLOCK);
    out.push(CARRIAGE_RETURN);
    out
}

/// 读取一个 MLLP 块，返回去掉包装的内容。
///
/// 起始符之前的字节被丢弃；对端在起始符前关闭连接时返回 `None`，
/// 块内关闭时返回已读内容。
pub async fn read_mllp_frame<R>(reader: &mut R, max: usize) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::new();
    let mut started = false;
    let mut buf = [0u8; 4096];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(started.then_some(frame));
        }
        for &byte in &buf[..n] {
            if !started {
                started = byte == START_BLOCK;
                continue;
            }
            if byte == END_BLOCK {
                return Ok(Some(frame));
            }
            frame.push(byte);
        }
        if frame.len() > max {
            return Err(ProtocolError::FrameTooLarge(max));
        }
    }
}

/// 原始读取：读到 EOF，或首个字节之后静默 `idle` 即结束。
pub async fn read_raw_frame<R>(
    reader: &mut R,
    idle: Duration,
    max: usize,
) -> Result<Option<Vec<u8>>, ProtocolError>
where
    R: AsyncRead + Unpin,
{
    let mut frame = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let read = if frame.is_empty() {
            reader.read(&mut buf).await
        } else {
            match timeout(idle, reader.read(&mut buf)).await {
                Ok(read) => read,
                Err(_) => break,
            }
        };
        let n = read?;
        if n == 0 {
            break;
        }
        frame.extend_from_slice(&buf[..n]);
        if frame.len() > max {
            return Err(ProtocolError::FrameTooLarge(max));
        }
    }
    Ok((!frame.is_empty()).then_some(frame))
}

#[derive(Debug)]
enum AssemblerState {
    Idle,
    Accumulating { deadline: Instant },
}

/// 串口静默超时组帧器。
///
/// 每收到一段数据就把截止时间推迟 `idle`；截止时间到达时整个缓冲作为一条报文取出。
/// 缓冲不超过 `max` 字节。
#[derive(Debug)]
pub struct IdleAssembler {
    idle: Duration,
    max: usize,
    state: AssemblerState,
    buffer: Vec<u8>,
}

impl IdleAssembler {
    pub fn new(idle: Duration) -> Self {
        Self::with_limit(idle, MAX_FRAME_BYTES)
    }

    pub fn with_limit(idle: Duration, max: usize) -> Self {
        Self {
            idle,
            max,
            state: AssemblerState::Idle,
            buffer: Vec::new(),
        }
    }

    /// 追加一段数据。
    ///
    /// 超过上限时丢弃已累积的内容（含本段），回到空闲并返回 `FrameTooLarge`。
    pub fn push(&mut self, chunk: &[u8], now: Instant) -> Result<(), ProtocolError> {
        if chunk.is_empty() {
            return Ok(());
        }
        if self.buffer.len() + chunk.len() > self.max {
            self.buffer = Vec::new();
            self.state = AssemblerState::Idle;
            return Err(ProtocolError::FrameTooLarge(self.max));
        }
        self.buffer.extend_from_slice(chunk);
        self.state = AssemblerState::Accumulating {
            deadline: now + self.idle,
        };
        Ok(())
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            AssemblerState::Idle => None,
            AssemblerState::Accumulating { deadline } => Some(deadline),
        }
    }

    pub fn is_accumulating(&self) -> bool {
        matches!(self.state, AssemblerState::Accumulating { .. })
    }

    /// 截止时间已过则取出缓冲并回到空闲。
    pub fn take_due(&mut self, now: Instant) -> Option<Vec<u8>> {
        match self.state {
            AssemblerState::Accumulating { deadline } if now >= deadline => {
                self.state = AssemblerState::Idle;
                Some(std::mem::take(&mut self.buffer))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mllp_frame_is_unwrapped() {
        let mut input: &[u8] = b"noise\x0bMSH|^~\\&|A\rPID|1\x1c\r";
        let frame = read_mllp_frame(&mut input, MAX_FRAME_BYTES)
            .await
            .expect("read");
        assert_eq!(frame, Some(b"MSH|^~\\&|A\rPID|1".to_vec()));
    }

    #[tokio::test]
    async fn closed_before_start_block_is_none() {
        let mut input: &[u8] = b"garbage";
        let frame = read_mllp_frame(&mut input, MAX_FRAME_BYTES)
            .await
            .expect("read");
        assert_eq!(frame, None);
    }

    #[tokio::test]
    async fn oversized_frame_is_rejected() {
        let mut payload = vec![START_BLOCK];
        payload.extend(std::iter::repeat_n(b'A', 64));
        let mut input: &[u8] = &payload;
        let err = read_mllp_frame(&mut input, 16).await.expect_err("too large");
        assert!(matches!(err, ProtocolError::FrameTooLarge(16)));
    }

    #[tokio::test]
    async fn raw_frame_reads_to_eof() {
        let mut input: &[u8] = b"MSH|^~\\&|W\rPID|1\r";
        let frame = read_raw_frame(&mut input, Duration::from_millis(300), MAX_FRAME_BYTES)
            .await
            .expect("read");
        assert_eq!(frame, Some(b"MSH|^~\\&|W\rPID|1\r".to_vec()));
    }

    #[test]
    fn wrap_adds_block_characters() {
        assert_eq!(wrap_mllp(b"AB"), vec![0x0B, b'A', b'B', 0x1C, 0x0D]);
    }

    #[tokio::test(start_paused = true)]
    async fn assembler_extends_deadline_per_chunk() {
        let idle = Duration::from_millis(300);
        let mut assembler = IdleAssembler::new(idle);
        let start = Instant::now();

        assembler.push(b"MSH|", start).expect("push");
        assembler
            .push(b"PID|", start + Duration::from_millis(200))
            .expect("push");
        assert_eq!(assembler.take_due(start + Duration::from_millis(400)), None);
        assert_eq!(
            assembler.take_due(start + Duration::from_millis(500)),
            Some(b"MSH|PID|".to_vec())
        );
        assert!(!assembler.is_accumulating());
        assert_eq!(assembler.deadline(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn assembler_drops_buffer_past_limit() {
        let mut assembler = IdleAssembler::with_limit(Duration::from_millis(300), 16);
        let start = Instant::now();
        let chunk = [b'A'; 8];

        assembler.push(&chunk, start).expect("first chunk");
        assembler
            .push(&chunk, start + Duration::from_millis(10))
            .expect("exactly at limit");
        let err = assembler
            .push(&chunk, start + Duration::from_millis(20))
            .expect_err("past limit");
        assert!(matches!(err, ProtocolError::FrameTooLarge(16)));
        assert!(!assembler.is_accumulating());
        assert_eq!(assembler.take_due(start + Duration::from_secs(1)), None);

        assembler
            .push(b"MSH|", start + Duration::from_secs(2))
            .expect("fresh frame");
        assert_eq!(
            assembler.take_due(start + Duration::from_secs(3)),
            Some(b"MSH|".to_vec())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn streaming_line_never_exceeds_frame_limit() {
        let mut assembler = IdleAssembler::new(Duration::from_millis(300));
        let start = Instant::now();
        let chunk = vec![b'X'; 64 * 1024];
        let mut rejected = 0;
        for i in 0..64u64 {
            if assembler
                .push(&chunk, start + Duration::from_millis(10 * i))
                .is_err()
            {
                rejected += 1;
            }
        }
        assert!(rejected > 0);
        let frame = assembler
            .take_due(start + Duration::from_secs(5))
            .unwrap_or_default();
        assert!(frame.len() <= MAX_FRAME_BYTES);
    }
}
