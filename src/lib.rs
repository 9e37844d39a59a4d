//! btscan: classic Bluetooth inquiry scanning.
//!
//! Turns the raw inquiry results reported by a Bluetooth controller into
//! structured device records: Extended Inquiry Response (EIR) data is decoded
//! into names, TX power, service UUIDs and manufacturer data, and the Class
//! of Device is mapped to a major device class and a service class label. A
//! [`ScanSession`](scan::ScanSession) runs one inquiry at a time, keeps one
//! record per device, and notifies observers per device and on completion.
//!
//! The library has no platform dependencies and is testable on any host with
//! `cargo test`. Firmware provides radio access through
//! [`DiscoveryRadio`](scan::DiscoveryRadio), forwards controller events into
//! the session, and supplies a `log` backend and critical-section
//! implementation. The `std` feature adds a thread-parking
//! `ScanSession::start_blocking` for hosted targets.
//!
//! Modules:
//! - `address`, `eir`, `cod`: wire formats, `no_std`, no allocator.
//! - `device`: per-device record built from one inquiry result.
//! - `scan`: session state machine, deduplication, callbacks (needs `alloc`).
//! - `protocol`: NDJSON rendering of scan events.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[cfg(feature = "std")]
extern crate std;

pub mod address;
pub mod cod;
pub mod device;
pub mod eir;
pub mod protocol;
pub mod scan;

pub use address::DeviceAddress;
pub use device::{DeviceSnapshot, DiscoveryProperty, ServiceUuid};
pub use scan::{Callback, DiscoveryRadio, ScanConfig, ScanResultSet, ScanSession, ScanState};
