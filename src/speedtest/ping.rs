use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use futures::SinkExt;
use tokio::sync::{oneshot, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::trace;

use crate::protocol::Probe;
use crate::session::WsSink;

const PONG_TIMEOUT: Duration = Duration::from_secs(5);
const PROBE_SPACING: Duration = Duration::from_millis(50);

/// Single-slot rendezvous between the probe loop and the receive path: the
/// loop arms it with the sequence number it is waiting on, the receive path
/// fires it when a matching pong arrives. At most one waiter exists at a
/// time; mismatched pongs leave it armed.
#[derive(Default)]
pub struct PongSlot {
    waiter: Mutex<Option<(u32, oneshot::Sender<()>)>>,
}

impl PongSlot {
    async fn arm(&self, seq: u32) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        *self.waiter.lock().await = Some((seq, tx));
        rx
    }

    async fn disarm(&self) {
        *self.waiter.lock().await = None;
    }

    /// Resolve the waiter if `seq` matches the outstanding probe.
    pub async fn fulfill(&self, seq: u32) {
        let mut waiter = self.waiter.lock().await;
        if matches!(*waiter, Some((expected, _)) if expected == seq) {
            if let Some((_, tx)) = waiter.take() {
                let _ = tx.send(());
            }
        }
    }
}

pub struct PingTest {
    samples: Vec<f64>,
    ping_count: u32,
}

impl PingTest {
    pub fn new(ping_count: u32) -> Self {
        Self {
            samples: Vec::new(),
            ping_count,
        }
    }

    /// Round-trip `ping_count` probes and report the median RTT in
    /// milliseconds, or `None` if no pong came back in time.
    pub async fn run(&mut self, sink: &mut WsSink, pongs: &Arc<PongSlot>) -> Result<Option<f64>> {
        self.samples.clear();

        for seq in 0..self.ping_count {
            // arm before sending so a fast pong cannot slip past the slot
            let pong = pongs.arm(seq).await;
            let start = Instant::now();
            sink.send(Message::Text(serde_json::to_string(&Probe::Ping { seq })?))
                .await?;

            match tokio::time::timeout(PONG_TIMEOUT, pong).await {
                Ok(Ok(())) => {
                    self.samples.push(start.elapsed().as_secs_f64() * 1000.0);
                }
                _ => {
                    pongs.disarm().await;
                    trace!(seq, "no pong in time, skipping probe");
                }
            }

            tokio::time::sleep(PROBE_SPACING).await;
        }

        Ok(super::median_ms(&self.samples))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_pong_resolves_the_waiter() {
        let slot = PongSlot::default();
        let rx = slot.arm(7).await;
        slot.fulfill(7).await;
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn mismatched_pong_leaves_the_waiter_armed() {
        let slot = PongSlot::default();
        let rx = slot.arm(1).await;
        slot.fulfill(0).await;
        slot.fulfill(2).await;
        assert!(slot.waiter.lock().await.is_some());
        slot.fulfill(1).await;
        rx.await.unwrap();
    }

    #[tokio::test]
    async fn pong_without_a_waiter_is_a_no_op() {
        let slot = PongSlot::default();
        slot.fulfill(0).await;
        assert!(slot.waiter.lock().await.is_none());
    }
}
