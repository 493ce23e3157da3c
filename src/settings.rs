use serde::Deserialize;

const DEFAULT_TRANSFER_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_PING_COUNT: u32 = 5;
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;
// the chunk is allocated up front, so the client must not pick its size freely
const MAX_CHUNK_SIZE: usize = 4 * 1024 * 1024;

/// Parameters for one test run. The client may override any subset in its
/// opening message; missing or unparsable values keep the defaults.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TestConfig {
    pub download_bytes: u64,
    pub upload_bytes: u64,
    pub ping_count: u32,
    pub chunk_size: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            download_bytes: DEFAULT_TRANSFER_BYTES,
            upload_bytes: DEFAULT_TRANSFER_BYTES,
            ping_count: DEFAULT_PING_COUNT,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl TestConfig {
    /// Parse the client's opening message. Anything that is not a config
    /// object falls back to full defaults rather than failing the session.
    pub fn from_client_message(raw: &str) -> Self {
        let mut config: Self = serde_json::from_str(raw).unwrap_or_default();
        // a zero chunk would stall the download loop
        if config.chunk_size == 0 {
            config.chunk_size = DEFAULT_CHUNK_SIZE;
        }
        config.chunk_size = config.chunk_size.min(MAX_CHUNK_SIZE);
        config
    }
}
