use serde::{Deserialize, Serialize};

/// Latency probe frames, tagged with `type`. The server sends pings, the
/// client answers with pongs carrying the same sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Probe {
    Ping { seq: u32 },
    Pong { seq: u32 },
}

/// Server-to-client phase announcements, tagged with `action`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Announce {
    DownloadStart { bytes: u64 },
    UploadStart { bytes: u64 },
    Result { data: TestReport },
}

/// Final figures reported to the client. `ping` and `latency` carry the
/// same median RTT; both are null when no probe came back.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TestReport {
    pub ping: Option<f64>,
    pub download: f64,
    pub upload: f64,
    pub latency: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_wire_format() {
        let raw = serde_json::to_string(&Probe::Ping { seq: 3 }).unwrap();
        assert_eq!(raw, r#"{"type":"ping","seq":3}"#);

        let pong: Probe = serde_json::from_str(r#"{"type":"pong","seq":3}"#).unwrap();
        assert_eq!(pong, Probe::Pong { seq: 3 });
    }

    #[test]
    fn announce_wire_format() {
        let raw = serde_json::to_string(&Announce::DownloadStart { bytes: 1024 }).unwrap();
        assert_eq!(raw, r#"{"action":"download_start","bytes":1024}"#);

        let raw = serde_json::to_string(&Announce::Result {
            data: TestReport {
                ping: None,
                download: 1.23,
                upload: 0.0,
                latency: None,
            },
        })
        .unwrap();
        assert_eq!(
            raw,
            r#"{"action":"result","data":{"ping":null,"download":1.23,"upload":0.0,"latency":null}}"#
        );
    }
}
