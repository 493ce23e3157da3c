use std::time::Instant;

use anyhow::Result;
use futures::SinkExt;
use rand::{Rng, SeedableRng};
use tokio_tungstenite::tungstenite::Message;

use crate::session::WsSink;

pub struct DownloadTest {
    chunk: Vec<u8>,
    download_bytes: u64,
}

impl DownloadTest {
    pub fn new(download_bytes: u64, chunk_size: usize) -> Self {
        // incompressible payload; only the size matters to the client
        let mut rng = rand::rngs::StdRng::from_entropy();
        let chunk: Vec<u8> = (0..chunk_size).map(|_| rng.gen()).collect();
        Self {
            chunk,
            download_bytes,
        }
    }

    /// Stream `download_bytes` of binary frames into the sink and report the
    /// achieved throughput in Mbps. The last frame is truncated to the
    /// remainder.
    pub async fn run(&mut self, sink: &mut WsSink) -> Result<f64> {
        let start = Instant::now();
        let mut sent: u64 = 0;

        while sent < self.download_bytes {
            let to_send = (self.chunk.len() as u64).min(self.download_bytes - sent) as usize;
            sink.send(Message::Binary(self.chunk[..to_send].to_vec()))
                .await?;
            sent += to_send as u64;
            // keep the reader task scheduled between frames
            tokio::task::yield_now().await;
        }

        Ok(super::throughput_mbps(sent, start.elapsed().as_secs_f64()))
    }
}
