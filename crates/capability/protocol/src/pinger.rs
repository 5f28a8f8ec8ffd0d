//! `STX STX` 心跳探测。

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::ProtocolError;
use crate::framing::{ACKNOWLEDGE, START_OF_TEXT};

const PEEK_RETRIES: usize = 10;
const PEEK_INTERVAL: Duration = Duration::from_millis(20);

/// 窥视连接开头两个字节；为 `STX STX` 时回复单字节 ACK 并返回 `true`。
///
/// 只窥视不消费，非心跳连接仍可按正常分帧读取。
pub async fn answer_ping(stream: &mut TcpStream) -> Result<bool, ProtocolError> {
    let mut head = [0u8; 2];
    let mut attempts = 0;
    loop {
        let n = stream.peek(&mut head).await?;
        match n {
            0 => return Ok(false),
            1 if head[0] == START_OF_TEXT && attempts < PEEK_RETRIES => {
                attempts += 1;
                tokio::time::sleep(PEEK_INTERVAL).await;
            }
            _ => break,
        }
    }

    if head != [START_OF_TEXT, START_OF_TEXT] {
        return Ok(false);
    }
    stream.write_all(&[ACKNOWLEDGE]).await?;
    stream.flush().await?;
    lis_telemetry::record_ping_answered();
    debug!(target: "lis.protocol", "ping_answered");
    Ok(true)
}
