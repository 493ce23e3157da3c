use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Receive-path accounting for the upload phase. Armed by the test routine,
/// fed by the binary-frame handler, read back once the window closes.
#[derive(Debug, Default)]
pub struct UploadState {
    bytes_needed: u64,
    bytes_received: u64,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    waiting: bool,
}

impl UploadState {
    /// Open the upload window. A zero-byte target is complete before it
    /// starts, so the window never opens for it.
    pub fn arm(&mut self, bytes_needed: u64) {
        self.bytes_needed = bytes_needed;
        self.bytes_received = 0;
        self.started_at = None;
        self.finished_at = None;
        self.waiting = bytes_needed > 0;
    }

    /// Count one incoming binary frame. Frames outside the window are
    /// dropped without touching the counters.
    pub fn record(&mut self, len: usize) {
        if !self.waiting {
            return;
        }
        let now = Instant::now();
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
        self.bytes_received += len as u64;
        if self.bytes_received >= self.bytes_needed {
            self.finished_at = Some(now);
            self.waiting = false;
        }
    }

    pub fn is_waiting(&self) -> bool {
        self.waiting
    }

    /// Measured throughput in Mbps; zero unless both stamps exist and the
    /// interval between them is positive.
    pub fn throughput_mbps(&self) -> f64 {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                super::throughput_mbps(self.bytes_received, (end - start).as_secs_f64())
            }
            _ => 0.0,
        }
    }
}

pub struct UploadTest {
    upload_bytes: u64,
}

impl UploadTest {
    pub fn new(upload_bytes: u64) -> Self {
        Self { upload_bytes }
    }

    /// How long the client gets before we settle for a partial figure.
    fn deadline(&self) -> Duration {
        let scaled = self.upload_bytes as f64 / (1024.0 * 1024.0) * 5.0;
        Duration::from_secs_f64(scaled.max(10.0))
    }

    /// Open the window. Happens before the announcement goes out so the
    /// first client frame cannot beat it.
    pub async fn arm(&self, state: &Arc<Mutex<UploadState>>) {
        state.lock().await.arm(self.upload_bytes);
    }

    /// Wait for the receive path to see `upload_bytes` of client data and
    /// report the throughput it measured. Terminates at the deadline at the
    /// latest, reporting whatever was received by then.
    pub async fn wait(&self, state: &Arc<Mutex<UploadState>>) -> f64 {
        let deadline = tokio::time::Instant::now() + self.deadline();
        while state.lock().await.is_waiting() {
            if tokio::time::Instant::now() >= deadline {
                debug!("upload window expired before the client finished");
                break;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }

        state.lock().await.throughput_mbps()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_outside_the_window_are_not_counted() {
        let mut state = UploadState::default();
        state.record(500);
        assert_eq!(state.bytes_received, 0);

        state.arm(1000);
        state.record(1000);
        // window closed; further frames are dropped
        state.record(500);
        assert_eq!(state.bytes_received, 1000);
    }

    #[test]
    fn zero_byte_target_completes_immediately() {
        let mut state = UploadState::default();
        state.arm(0);
        assert!(!state.is_waiting());
        assert_eq!(state.throughput_mbps(), 0.0);
    }

    #[test]
    fn single_frame_completion_reports_zero_throughput() {
        // both stamps come from the same frame, so the interval is zero
        let mut state = UploadState::default();
        state.arm(1000);
        state.record(1000);
        assert!(!state.is_waiting());
        assert_eq!(state.throughput_mbps(), 0.0);
    }

    #[test]
    fn partial_upload_reports_zero_throughput() {
        let mut state = UploadState::default();
        state.arm(1000);
        state.record(400);
        assert!(state.is_waiting());
        assert_eq!(state.throughput_mbps(), 0.0);
    }

    #[test]
    fn multi_frame_completion_measures_the_interval() {
        let mut state = UploadState::default();
        state.arm(1000);
        state.record(400);
        std::thread::sleep(Duration::from_millis(10));
        state.record(600);
        assert!(!state.is_waiting());
        assert!(state.throughput_mbps() > 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_client_times_out_with_zero_figure() {
        let state = Arc::new(Mutex::new(UploadState::default()));
        let test = UploadTest::new(1000);
        test.arm(&state).await;
        let mbps = test.wait(&state).await;
        assert_eq!(mbps, 0.0);
    }
}
