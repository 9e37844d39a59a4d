//! Discovered device model.
//!
//! A [`DeviceSnapshot`] is built from the property list of one inquiry
//! result: class of device, RSSI, the baseband name and the EIR blob. Every
//! field except the address is optional; a field is `Some` once it has been
//! decoded and is never reset. Later decodes of the same field overwrite it,
//! except service UUIDs which accumulate in advertisement order.

use core::fmt;

use heapless::{String, Vec};

use crate::address::DeviceAddress;
use crate::cod::{ClassOfDevice, MajorDeviceClass, ServiceClass};
use crate::eir::{self, EirIter, EirRecord, EirType, EIR_DATA_LEN};
use crate::scan::SessionId;

/// Maximum length of a baseband (remote) device name.
pub const MAX_BDNAME_LEN: usize = 248;

/// Maximum number of service UUIDs kept per device: every 16-bit UUID a
/// full-length EIR payload can carry.
pub const MAX_SERVICE_UUIDS: usize = EIR_DATA_LEN / 2;

/// Device name, bounded by the baseband name limit.
pub type NameString = String<MAX_BDNAME_LEN>;

/// Raw EIR payload bytes (manufacturer or service data).
pub type EirBytes = Vec<u8, EIR_DATA_LEN>;

/// Bluetooth base UUID (00000000-0000-1000-8000-00805F9B34FB), big-endian.
const BASE_UUID: [u8; 16] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x10, 0x00, 0x80, 0x00, 0x00, 0x80, 0x5F, 0x9B, 0x34, 0xFB,
];

/// One property of an inquiry result, as delivered by the radio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryProperty<'a> {
    /// Raw 24-bit class of device (upper byte should be zero).
    ClassOfDevice(u32),
    /// Received signal strength in dBm.
    Rssi(i8),
    /// Baseband name bytes, possibly NUL padded.
    BdName(&'a [u8]),
    /// Extended inquiry response data.
    Eir(&'a [u8]),
}

/// A service UUID advertised in EIR data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceUuid {
    Uuid16(u16),
    Uuid32(u32),
    /// 128-bit UUID in over-the-air (little-endian) byte order.
    Uuid128([u8; 16]),
}

impl ServiceUuid {
    /// Expand to the full 128-bit form in big-endian (display) order.
    pub fn to_uuid128(&self) -> [u8; 16] {
        match *self {
            ServiceUuid::Uuid16(short) => Self::from_base(short as u32),
            ServiceUuid::Uuid32(short) => Self::from_base(short),
            ServiceUuid::Uuid128(le) => {
                let mut be = le;
                be.reverse();
                be
            }
        }
    }

    fn from_base(short: u32) -> [u8; 16] {
        let mut full = BASE_UUID;
        full[..4].copy_from_slice(&short.to_be_bytes());
        full
    }

    /// Size of the UUID on the wire, in bits.
    pub fn bit_size(&self) -> u16 {
        match self {
            ServiceUuid::Uuid16(_) => 16,
            ServiceUuid::Uuid32(_) => 32,
            ServiceUuid::Uuid128(_) => 128,
        }
    }
}

impl fmt::Display for ServiceUuid {
    /// Canonical `xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` form.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.to_uuid128();
        for (i, byte) in b.iter().enumerate() {
            if matches!(i, 4 | 6 | 8 | 10) {
                f.write_str("-")?;
            }
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// Everything decoded about one discovered device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    address: DeviceAddress,
    name: Option<NameString>,
    rssi: Option<i8>,
    tx_power: Option<i8>,
    class_of_device: Option<ClassOfDevice>,
    service_data: Option<EirBytes>,
    service_uuids: Vec<ServiceUuid, MAX_SERVICE_UUIDS>,
    manufacturer_data: Option<EirBytes>,
    session: SessionId,
}

impl DeviceSnapshot {
    /// An empty snapshot for `address`, owned by `session`.
    pub fn new(address: DeviceAddress, session: SessionId) -> Self {
        Self {
            address,
            name: None,
            rssi: None,
            tx_power: None,
            class_of_device: None,
            service_data: None,
            service_uuids: Vec::new(),
            manufacturer_data: None,
            session,
        }
    }

    /// Build a snapshot from an inquiry result's property list.
    ///
    /// EIR data is decoded up to `eir_bound` bytes. If no name was found
    /// there, the baseband name is used, and failing that the whole EIR blob
    /// is searched for a complete, then shortened, local name.
    pub fn from_discovery(
        address: DeviceAddress,
        properties: &[DiscoveryProperty<'_>],
        session: SessionId,
        eir_bound: usize,
    ) -> Self {
        let mut device = Self::new(address, session);
        let mut bd_name: &[u8] = &[];
        let mut eir_data: &[u8] = &[];

        for property in properties {
            match *property {
                DiscoveryProperty::ClassOfDevice(raw) => device.set_class_of_device(raw),
                DiscoveryProperty::Rssi(rssi) => {
                    device.rssi = Some(rssi);
                    log::debug!("{}: rssi {}", address, rssi);
                }
                DiscoveryProperty::BdName(raw) => bd_name = trim_bdname(raw),
                DiscoveryProperty::Eir(data) => {
                    eir_data = data;
                    device.parse_eir(data, eir_bound);
                }
            }
        }

        if device.name.is_none() {
            device.resolve_name(bd_name, eir_data);
        }

        device
    }

    fn parse_eir(&mut self, data: &[u8], bound: usize) {
        for record in EirIter::new(data, bound) {
            log::trace!(
                "{}: EIR {} ({:#04x}) len {}",
                self.address,
                record.ty.as_str(),
                record.ty.to_u8(),
                record.len
            );
            self.apply_record(&record);
        }
    }

    fn apply_record(&mut self, record: &EirRecord<'_>) {
        let data = record.data;
        match record.ty {
            EirType::ShortenedLocalName | EirType::CompleteLocalName => self.set_name(data),
            EirType::TxPowerLevel => {
                if let Some(&power) = data.first() {
                    self.tx_power = Some(power as i8);
                    log::debug!("{}: tx power {}", self.address, power as i8);
                }
            }
            EirType::Incomplete16BitUuids | EirType::Complete16BitUuids => {
                for chunk in data.chunks_exact(2) {
                    self.add_service_uuid(ServiceUuid::Uuid16(u16::from_le_bytes([
                        chunk[0], chunk[1],
                    ])));
                }
            }
            EirType::Incomplete32BitUuids | EirType::Complete32BitUuids => {
                for chunk in data.chunks_exact(4) {
                    self.add_service_uuid(ServiceUuid::Uuid32(u32::from_le_bytes([
                        chunk[0], chunk[1], chunk[2], chunk[3],
                    ])));
                }
            }
            EirType::Incomplete128BitUuids | EirType::Complete128BitUuids => {
                if let Some(uuid) = data.get(..16).and_then(|b| <[u8; 16]>::try_from(b).ok()) {
                    self.add_service_uuid(ServiceUuid::Uuid128(uuid));
                }
            }
            EirType::ServiceData16 => self.service_data = eir_bytes(data),
            EirType::ManufacturerSpecific => self.manufacturer_data = eir_bytes(data),
            EirType::Flags | EirType::Unknown(_) => {}
        }
    }

    fn resolve_name(&mut self, bd_name: &[u8], eir_data: &[u8]) {
        if !bd_name.is_empty() {
            self.set_name(bd_name);
            return;
        }
        let found = eir::resolve(eir_data, EirType::CompleteLocalName)
            .or_else(|| eir::resolve(eir_data, EirType::ShortenedLocalName));
        if let Some(name) = found {
            log::trace!("{}: name resolved from full EIR", self.address);
            self.set_name(name);
        }
    }

    fn set_name(&mut self, bytes: &[u8]) {
        let name = decode_name(bytes);
        log::debug!("{}: name {}", self.address, name);
        self.name = Some(name);
    }

    fn set_class_of_device(&mut self, raw: u32) {
        match ClassOfDevice::new(raw) {
            Some(cod) => {
                log::debug!("{}: cod {}", self.address, cod);
                self.class_of_device = Some(cod);
            }
            None => log::debug!("{}: invalid cod {:#x} ignored", self.address, raw),
        }
    }

    fn add_service_uuid(&mut self, uuid: ServiceUuid) {
        if self.service_uuids.push(uuid).is_err() {
            log::warn!(
                "{}: more than {} service UUIDs, dropping {}",
                self.address,
                MAX_SERVICE_UUIDS,
                uuid
            );
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn rssi(&self) -> Option<i8> {
        self.rssi
    }

    pub fn tx_power(&self) -> Option<i8> {
        self.tx_power
    }

    pub fn class_of_device(&self) -> Option<&ClassOfDevice> {
        self.class_of_device.as_ref()
    }

    /// Raw class-of-device value.
    pub fn cod(&self) -> Option<u32> {
        self.class_of_device.map(|c| c.raw())
    }

    pub fn device_type(&self) -> Option<MajorDeviceClass> {
        self.class_of_device.map(|c| c.major())
    }

    pub fn service_type(&self) -> Option<ServiceClass> {
        self.class_of_device.map(|c| c.service())
    }

    /// Service data record payload (UUID followed by data).
    pub fn service_data(&self) -> Option<&[u8]> {
        self.service_data.as_deref()
    }

    /// The 16-bit UUID the service data belongs to.
    pub fn service_data_uuid(&self) -> Option<ServiceUuid> {
        match self.service_data.as_deref() {
            Some([lo, hi, ..]) => Some(ServiceUuid::Uuid16(u16::from_le_bytes([*lo, *hi]))),
            _ => None,
        }
    }

    /// Service UUIDs in the order they were advertised. May contain duplicates.
    pub fn service_uuids(&self) -> &[ServiceUuid] {
        &self.service_uuids
    }

    pub fn has_service_uuids(&self) -> bool {
        !self.service_uuids.is_empty()
    }

    /// Whether `uuid` was advertised, comparing the expanded 128-bit forms.
    pub fn is_advertising_service(&self, uuid: &ServiceUuid) -> bool {
        let wanted = uuid.to_uuid128();
        self.service_uuids.iter().any(|u| u.to_uuid128() == wanted)
    }

    pub fn manufacturer_data(&self) -> Option<&[u8]> {
        self.manufacturer_data.as_deref()
    }

    /// Company identifier from the manufacturer data (little-endian).
    pub fn manufacturer_id(&self) -> Option<u16> {
        match self.manufacturer_data.as_deref() {
            Some([lo, hi, ..]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Session that produced this snapshot.
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl fmt::Display for DeviceSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Name: {}, Address: {}",
            self.name().unwrap_or(""),
            self.address
        )?;
        if let Some(rssi) = self.rssi {
            write!(f, ", rssi: {}", rssi)?;
        }
        if let Some(cod) = &self.class_of_device {
            write!(f, ", cod: {}", cod)?;
        }
        if let Some(data) = self.manufacturer_data() {
            f.write_str(", manufacturer data: ")?;
            write_hex(f, data)?;
        }
        if let Some(data) = self.service_data() {
            f.write_str(", service data: ")?;
            write_hex(f, data)?;
        }
        if self.has_service_uuids() {
            f.write_str(", serviceUUID: ")?;
            for (i, uuid) in self.service_uuids.iter().enumerate() {
                if i > 0 {
                    f.write_str(" ")?;
                }
                write!(f, "{}", uuid)?;
            }
        }
        if let Some(tx_power) = self.tx_power {
            write!(f, ", txPower: {}", tx_power)?;
        }
        Ok(())
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, data: &[u8]) -> fmt::Result {
    for byte in data {
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

/// Baseband names are NUL padded and limited to [`MAX_BDNAME_LEN`] bytes.
fn trim_bdname(raw: &[u8]) -> &[u8] {
    let raw = &raw[..raw.len().min(MAX_BDNAME_LEN)];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    &raw[..end]
}

/// Decode a name as UTF-8, keeping the longest valid prefix.
fn decode_name(bytes: &[u8]) -> NameString {
    let bytes = &bytes[..bytes.len().min(MAX_BDNAME_LEN)];
    let text = match core::str::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => core::str::from_utf8(&bytes[..e.valid_up_to()]).unwrap_or(""),
    };
    let mut name = NameString::new();
    let _ = name.push_str(text);
    name
}

fn eir_bytes(data: &[u8]) -> Option<EirBytes> {
    EirBytes::from_slice(&data[..data.len().min(EIR_DATA_LEN)]).ok()
}
