//! NDJSON export of scan events.
//!
//! Each discovered device and each completed scan can be rendered as one
//! JSON object followed by `\n`, ready for a serial console or a companion
//! app. Serialization uses `serde-json-core` into a caller buffer, so no
//! allocation is needed on the reporting path.

use core::fmt::Write;

use heapless::{String, Vec};
use serde::Serialize;

use crate::address::{format_address, AddressString};
use crate::device::{DeviceSnapshot, ServiceUuid, MAX_SERVICE_UUIDS};
use crate::scan::{ScanResultSet, SessionId};

/// Maximum length for UUID strings
pub type UuidString = String<37>;

/// Maximum size of a serialized JSON message
pub const MAX_MSG_LEN: usize = 512;

/// Buffer type for serialized JSON messages
pub type MsgBuffer = Vec<u8, MAX_MSG_LEN>;

/// Messages emitted for scan events
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum DeviceMessage<'a> {
    /// A discovered device
    #[serde(rename = "device")]
    Device {
        mac: &'a AddressString,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a str>,
        #[serde(skip_serializing_if = "Option::is_none")]
        rssi: Option<i8>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tx_power: Option<i8>,
        /// Raw class of device
        #[serde(skip_serializing_if = "Option::is_none")]
        cod: Option<u32>,
        /// Major device class label
        #[serde(skip_serializing_if = "Option::is_none")]
        device_type: Option<&'static str>,
        /// Service class label
        #[serde(skip_serializing_if = "Option::is_none")]
        service_type: Option<&'static str>,
        #[serde(skip_serializing_if = "no_uuids")]
        uuids: &'a Vec<UuidString, MAX_SERVICE_UUIDS>,
        /// Manufacturer company ID
        #[serde(skip_serializing_if = "Option::is_none")]
        mfr: Option<u16>,
        session: u32,
    },
    /// A scan finished
    #[serde(rename = "scan_complete")]
    ScanComplete { session: u32, count: u32 },
}

/// Owned string fields needed to render a [`DeviceMessage::Device`].
pub struct DeviceReport<'a> {
    device: &'a DeviceSnapshot,
    mac: AddressString,
    uuids: Vec<UuidString, MAX_SERVICE_UUIDS>,
}

impl<'a> DeviceReport<'a> {
    pub fn new(device: &'a DeviceSnapshot) -> Self {
        let mut uuids = Vec::new();
        for uuid in device.service_uuids() {
            // Capacity matches the snapshot's UUID list.
            let _ = uuids.push(format_uuid(uuid));
        }
        Self {
            device,
            mac: format_address(device.address()),
            uuids,
        }
    }

    pub fn message(&self) -> DeviceMessage<'_> {
        let device = self.device;
        DeviceMessage::Device {
            mac: &self.mac,
            name: device.name(),
            rssi: device.rssi(),
            tx_power: device.tx_power(),
            cod: device.cod(),
            device_type: device.device_type().map(|t| t.as_str()),
            service_type: device.service_type().map(|s| s.as_str()),
            uuids: &self.uuids,
            mfr: device.manufacturer_id(),
            session: device.session().get(),
        }
    }
}

fn no_uuids(uuids: &&Vec<UuidString, MAX_SERVICE_UUIDS>) -> bool {
    uuids.is_empty()
}

fn format_uuid(uuid: &ServiceUuid) -> UuidString {
    let mut buf = UuidString::new();
    let _ = write!(buf, "{}", uuid);
    buf
}

/// Serialize a DeviceMessage as one NDJSON line into `buf`.
/// Returns the number of bytes written including the trailing newline, or
/// None if the message does not fit.
pub fn serialize_message(msg: &DeviceMessage, buf: &mut [u8]) -> Option<usize> {
    let len = match serde_json_core::to_slice(msg, buf) {
        Ok(len) => len,
        Err(e) => {
            log::warn!("Message serialization failed: {:?}", e);
            return None;
        }
    };
    if len >= buf.len() {
        log::warn!("No room for newline after {} byte message", len);
        return None;
    }
    buf[len] = b'\n';
    Some(len + 1)
}

/// Render one device as an NDJSON line.
pub fn write_device(device: &DeviceSnapshot, buf: &mut [u8]) -> Option<usize> {
    serialize_message(&DeviceReport::new(device).message(), buf)
}

/// Render the completion of a scan as an NDJSON line.
pub fn write_scan_complete(session: SessionId, results: &ScanResultSet, buf: &mut [u8]) -> Option<usize> {
    let msg = DeviceMessage::ScanComplete {
        session: session.get(),
        count: results.len() as u32,
    };
    serialize_message(&msg, buf)
}

/// Render a device into a fresh [`MsgBuffer`].
pub fn device_line(device: &DeviceSnapshot) -> Option<MsgBuffer> {
    let mut buf = [0u8; MAX_MSG_LEN];
    let len = write_device(device, &mut buf)?;
    MsgBuffer::from_slice(&buf[..len]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::DeviceAddress;
    use crate::device::DiscoveryProperty;
    use crate::eir::EIR_PARSE_BOUND;

    const SESSION: SessionId = SessionId::from_raw(3);

    fn speaker() -> DeviceSnapshot {
        // 16-bit UUID list (A2DP sink), Apple manufacturer data, TX power 4
        let eir = [
            0x03, 0x03, 0x0B, 0x11, //
            0x04, 0xFF, 0x4C, 0x00, 0x01, //
            0x02, 0x0A, 0x04, //
            0x00,
        ];
        let properties = [
            DiscoveryProperty::ClassOfDevice(0x200404),
            DiscoveryProperty::Rssi(-52),
            DiscoveryProperty::BdName(b"Speaker\0\0"),
            DiscoveryProperty::Eir(&eir),
        ];
        DeviceSnapshot::from_discovery(
            DeviceAddress::new([0x00, 0x11, 0x22, 0x33, 0x44, 0x55]),
            &properties,
            SESSION,
            EIR_PARSE_BOUND,
        )
    }

    fn as_str(buf: &[u8], len: usize) -> &str {
        core::str::from_utf8(&buf[..len]).unwrap()
    }

    // ── Device messages ─────────────────────────────────────────────

    #[test]
    fn serialize_full_device() {
        let device = speaker();
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = write_device(&device, &mut buf).unwrap();
        let json = as_str(&buf, len);
        assert!(json.starts_with(r#"{"type":"device","mac":"00:11:22:33:44:55""#));
        assert!(json.contains(r#""name":"Speaker""#));
        assert!(json.contains(r#""rssi":-52"#));
        assert!(json.contains(r#""tx_power":4"#));
        assert!(json.contains(r#""cod":2098180"#)); // 0x200404
        assert!(json.contains(r#""device_type":"Audio/Video""#));
        assert!(json.contains(r#""service_type":"Audio""#));
        assert!(json.contains(r#""uuids":["0000110b-0000-1000-8000-00805f9b34fb"]"#));
        assert!(json.contains(r#""mfr":76"#));
        assert!(json.ends_with("\"session\":3}\n"));
    }

    #[test]
    fn bare_device_omits_absent_fields() {
        let device = DeviceSnapshot::new(DeviceAddress::new([0xAA; 6]), SESSION);
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = write_device(&device, &mut buf).unwrap();
        assert_eq!(
            as_str(&buf, len),
            "{\"type\":\"device\",\"mac\":\"aa:aa:aa:aa:aa:aa\",\"session\":3}\n"
        );
    }

    #[test]
    fn device_line_matches_write_device() {
        let device = speaker();
        let line = device_line(&device).unwrap();
        let mut buf = [0u8; MAX_MSG_LEN];
        let len = write_device(&device, &mut buf).unwrap();
        assert_eq!(line.as_slice(), &buf[..len]);
        assert_eq!(line.last(), Some(&b'\n'));
    }

    // ── Scan completion ─────────────────────────────────────────────

    #[test]
    fn serialize_scan_complete() {
        let results = ScanResultSet::default();
        let mut buf = [0u8; 64];
        let len = write_scan_complete(SESSION, &results, &mut buf).unwrap();
        assert_eq!(
            as_str(&buf, len),
            "{\"type\":\"scan_complete\",\"session\":3,\"count\":0}\n"
        );
    }

    // ── Buffer limits ───────────────────────────────────────────────

    #[test]
    fn too_small_buffer_returns_none() {
        let device = speaker();
        let mut buf = [0u8; 16];
        assert!(write_device(&device, &mut buf).is_none());
    }

    #[test]
    fn no_room_for_newline_returns_none() {
        let msg = DeviceMessage::ScanComplete { session: 1, count: 2 };
        let mut scratch = [0u8; 64];
        let len = serde_json_core::to_slice(&msg, &mut scratch).unwrap();

        let mut exact = [0u8; 64];
        assert!(serialize_message(&msg, &mut exact[..len]).is_none());
        assert_eq!(serialize_message(&msg, &mut exact[..len + 1]), Some(len + 1));
        assert_eq!(exact[len], b'\n');
    }
}
