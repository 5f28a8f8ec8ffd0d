use std::sync::{Arc, Mutex};
use std::time::Duration;

use lis_protocol::{SessionActivity, run_idle_session};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn chunks_within_idle_window_coalesce() {
    let (tx, rx) = mpsc::channel(8);
    let frames: Arc<Mutex<Vec<Vec<u8>>>> = Arc::new(Mutex::new(Vec::new()));
    let activity = Arc::new(SessionActivity::new());
    let cancel = CancellationToken::new();

    let sink = Arc::clone(&frames);
    let session = tokio::spawn(run_idle_session(
        rx,
        Duration::from_millis(300),
        Arc::clone(&activity),
        cancel.clone(),
        move |frame| {
            let sink = Arc::clone(&sink);
            async move {
                sink.lock().expect("lock").push(frame);
            }
        },
    ));

    tx.send(b"MSH|^~\\&|NCC".to_vec()).await.expect("send");
    settle().await;
    assert!(activity.is_connected());

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    tx.send(b"\rPID|1|B7".to_vec()).await.expect("send");
    settle().await;

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert!(frames.lock().expect("lock").is_empty());

    tokio::time::advance(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(
        frames.lock().expect("lock").clone(),
        vec![b"MSH|^~\\&|NCC\rPID|1|B7".to_vec()]
    );

    tx.send(b"MSH|^~\\&|NCC2".to_vec()).await.expect("send");
    settle().await;
    tokio::time::advance(Duration::from_millis(400)).await;
    settle().await;
    assert_eq!(frames.lock().expect("lock").len(), 2);
    assert_eq!(frames.lock().expect("lock")[1], b"MSH|^~\\&|NCC2".to_vec());

    cancel.cancel();
    session.await.expect("session ends");
}

#[tokio::test(start_paused = true)]
async fn closed_channel_ends_session() {
    let (tx, rx) = mpsc::channel::<Vec<u8>>(1);
    drop(tx);
    run_idle_session(
        rx,
        Duration::from_millis(300),
        Arc::new(SessionActivity::new()),
        CancellationToken::new(),
        |_frame| async {},
    )
    .await;
}
