//! WebSocket speed test server.
//!
//! Clients connect to `/ws/speedtest`, optionally send a configuration
//! message within one second, and are then driven through ping, download and
//! upload phases before receiving a summary result. `/ws/health` is a
//! liveness probe that acknowledges and closes.

pub mod protocol;
pub mod server;
pub mod session;
pub mod settings;
pub mod speedtest;
