use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, trace};

use crate::protocol::{Announce, Probe, TestReport};
use crate::settings::TestConfig;
use crate::speedtest::download::DownloadTest;
use crate::speedtest::ping::{PingTest, PongSlot};
use crate::speedtest::upload::{UploadState, UploadTest};
use crate::speedtest::{round2, SpeedTestResult};

pub type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;
type WsStream = SplitStream<WebSocketStream<TcpStream>>;

/// How long a silent client gets before the test runs with defaults.
const CONFIG_WINDOW: Duration = Duration::from_secs(1);
/// Pause before close so the result frame drains.
const CLOSE_DELAY: Duration = Duration::from_millis(100);

/// One speedtest connection. Resolves the test parameters (client message or
/// watchdog defaults, whichever comes first), then runs ping, download,
/// upload and result strictly in order and closes the socket.
pub async fn run(socket: WebSocketStream<TcpStream>) -> Result<()> {
    let (mut sink, mut stream) = socket.split();

    let config = match wait_for_config(&mut stream).await {
        Some(config) => config,
        // client went away before anything started
        None => return Ok(()),
    };
    debug!(?config, "starting test");

    let pongs = Arc::new(PongSlot::default());
    let upload = Arc::new(Mutex::new(UploadState::default()));

    let reader = tokio::spawn(read_loop(stream, Arc::clone(&pongs), Arc::clone(&upload)));

    let outcome = run_test(&mut sink, &config, &pongs, &upload).await;

    // the client has its result (or the transport is gone); stop reading
    reader.abort();

    let result = outcome?;
    debug!(
        ping_ms = ?result.ping_ms,
        download_mbps = result.download_mbps,
        upload_mbps = result.upload_mbps,
        "test finished"
    );
    Ok(())
}

/// Wait for the client's opening text frame, racing it against the watchdog.
/// Exactly one of the two resolves the configuration. Binary and control
/// frames arriving during the window are dropped and do not start the test.
/// Returns `None` when the client disconnects first.
async fn wait_for_config(stream: &mut WsStream) -> Option<TestConfig> {
    let watchdog = tokio::time::sleep(CONFIG_WINDOW);
    tokio::pin!(watchdog);

    loop {
        tokio::select! {
            () = &mut watchdog => {
                trace!("no opening message, running with defaults");
                return Some(TestConfig::default());
            }
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(raw))) => {
                    return Some(TestConfig::from_client_message(&raw));
                }
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    debug!("transport error before test start: {err}");
                    return None;
                }
                None => return None,
            },
        }
    }
}

/// Post-start receive path: pongs resolve the probe slot, binary frames feed
/// the upload counters, everything else (including further config attempts)
/// is dropped.
async fn read_loop(mut stream: WsStream, pongs: Arc<PongSlot>, upload: Arc<Mutex<UploadState>>) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(raw)) => {
                if let Ok(Probe::Pong { seq }) = serde_json::from_str(&raw) {
                    pongs.fulfill(seq).await;
                }
            }
            Ok(Message::Binary(data)) => upload.lock().await.record(data.len()),
            Ok(_) => {}
            Err(err) => {
                trace!("read loop ended: {err}");
                break;
            }
        }
    }
}

async fn run_test(
    sink: &mut WsSink,
    config: &TestConfig,
    pongs: &Arc<PongSlot>,
    upload: &Arc<Mutex<UploadState>>,
) -> Result<SpeedTestResult> {
    let ping_ms = PingTest::new(config.ping_count).run(sink, pongs).await?;

    send_json(
        sink,
        &Announce::DownloadStart {
            bytes: config.download_bytes,
        },
    )
    .await?;
    let download_mbps = DownloadTest::new(config.download_bytes, config.chunk_size)
        .run(sink)
        .await?;

    let upload_test = UploadTest::new(config.upload_bytes);
    upload_test.arm(upload).await;
    send_json(
        sink,
        &Announce::UploadStart {
            bytes: config.upload_bytes,
        },
    )
    .await?;
    let upload_mbps = upload_test.wait(upload).await;

    let result = SpeedTestResult {
        download_mbps,
        upload_mbps,
        ping_ms,
    };

    let ping = result.ping_ms.map(round2);
    send_json(
        sink,
        &Announce::Result {
            data: TestReport {
                ping,
                download: round2(result.download_mbps),
                upload: round2(result.upload_mbps),
                latency: ping,
            },
        },
    )
    .await?;

    tokio::time::sleep(CLOSE_DELAY).await;
    sink.close().await?;

    Ok(result)
}

async fn send_json<T: Serialize>(sink: &mut WsSink, message: &T) -> Result<()> {
    sink.send(Message::Text(serde_json::to_string(message)?))
        .await?;
    Ok(())
}
