//! Class of Device (CoD) decoding.
//!
//! The CoD is a 24-bit field reported with every inquiry result:
//!
//! ```text
//!  23            13 12      8 7       2 1  0
//! +----------------+---------+---------+----+
//! | service class  |  major  |  minor  | fmt|
//! +----------------+---------+---------+----+
//! ```
//!
//! Only format type `00` is defined; anything else (or any bit set above bit
//! 23) is treated as invalid and produces no classification.

use core::fmt;

const FORMAT_TYPE_MASK: u32 = 0x0000_0003;
const RESERVED_MASK: u32 = 0xFF00_0000;
const MINOR_MASK: u32 = 0x0000_00FC;
const MINOR_OFFSET: u32 = 2;
const MAJOR_MASK: u32 = 0x0000_1F00;
const MAJOR_OFFSET: u32 = 8;
const SERVICE_MASK: u32 = 0x00FF_E000;
const SERVICE_OFFSET: u32 = 13;

/// Major device class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MajorDeviceClass {
    Miscellaneous,
    Computer,
    Phone,
    NetworkAccessPoint,
    AudioVideo,
    Peripheral,
    Imaging,
    Wearable,
    Toy,
    Health,
    Uncategorized,
}

impl MajorDeviceClass {
    /// Map a 5-bit major class code. Codes outside the assigned set are
    /// reported as [`MajorDeviceClass::Uncategorized`].
    pub const fn from_code(code: u8) -> Self {
        match code {
            0x00 => MajorDeviceClass::Miscellaneous,
            0x01 => MajorDeviceClass::Computer,
            0x02 => MajorDeviceClass::Phone,
            0x03 => MajorDeviceClass::NetworkAccessPoint,
            0x04 => MajorDeviceClass::AudioVideo,
            0x05 => MajorDeviceClass::Peripheral,
            0x06 => MajorDeviceClass::Imaging,
            0x07 => MajorDeviceClass::Wearable,
            0x08 => MajorDeviceClass::Toy,
            0x09 => MajorDeviceClass::Health,
            _ => MajorDeviceClass::Uncategorized,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MajorDeviceClass::Miscellaneous => "Miscellaneous",
            MajorDeviceClass::Computer => "Computer",
            MajorDeviceClass::Phone => "Phone",
            MajorDeviceClass::NetworkAccessPoint => "Network Access Point",
            MajorDeviceClass::AudioVideo => "Audio/Video",
            MajorDeviceClass::Peripheral => "Peripheral",
            MajorDeviceClass::Imaging => "Imaging",
            MajorDeviceClass::Wearable => "Wearable",
            MajorDeviceClass::Toy => "Toy",
            MajorDeviceClass::Health => "Health",
            MajorDeviceClass::Uncategorized => "Uncategorized",
        }
    }
}

/// Service class label. Only one is reported per device; see [`ServiceClass::from_bits`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceClass {
    None,
    LimitedDiscoverable,
    Positioning,
    Networking,
    Rendering,
    Capturing,
    Audio,
    Telephony,
    Information,
    Undefined,
}

/// Service bits checked in priority order. `None` has no bit and never matches.
const SERVICE_PRIORITY: &[(u16, ServiceClass)] = &[
    (0x000, ServiceClass::None),
    (0x001, ServiceClass::LimitedDiscoverable),
    (0x008, ServiceClass::Positioning),
    (0x010, ServiceClass::Networking),
    (0x020, ServiceClass::Rendering),
    (0x040, ServiceClass::Capturing),
    (0x100, ServiceClass::Audio),
    (0x200, ServiceClass::Telephony),
    (0x400, ServiceClass::Information),
];

impl ServiceClass {
    /// Pick the first service, in priority order, whose bit is set in the
    /// 11-bit service field. Several bits may be set; only the first wins.
    pub fn from_bits(bits: u16) -> Self {
        SERVICE_PRIORITY
            .iter()
            .find(|(mask, _)| bits & mask != 0)
            .map(|&(_, class)| class)
            .unwrap_or(ServiceClass::Undefined)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceClass::None => "None",
            ServiceClass::LimitedDiscoverable => "Limited Discoverable Mode",
            ServiceClass::Positioning => "Positioning",
            ServiceClass::Networking => "Networking",
            ServiceClass::Rendering => "Rendering",
            ServiceClass::Capturing => "Capturing",
            ServiceClass::Audio => "Audio",
            ServiceClass::Telephony => "Telephony",
            ServiceClass::Information => "Information",
            ServiceClass::Undefined => "undefined",
        }
    }
}

/// A validated Class of Device with its derived labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassOfDevice {
    raw: u32,
    major: MajorDeviceClass,
    service: ServiceClass,
}

impl ClassOfDevice {
    /// Validate and classify a raw CoD. Returns `None` for invalid values.
    pub fn new(raw: u32) -> Option<Self> {
        if !is_valid(raw) {
            return None;
        }
        Some(Self {
            raw,
            major: MajorDeviceClass::from_code(major_code(raw)),
            service: ServiceClass::from_bits(service_bits(raw)),
        })
    }

    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub fn major(&self) -> MajorDeviceClass {
        self.major
    }

    pub fn service(&self) -> ServiceClass {
        self.service
    }

    /// Minor device class bits (meaning depends on the major class).
    pub fn minor(&self) -> u8 {
        ((self.raw & MINOR_MASK) >> MINOR_OFFSET) as u8
    }
}

impl fmt::Display for ClassOfDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:#08x} ({}, {})",
            self.raw,
            self.major.as_str(),
            self.service.as_str()
        )
    }
}

/// Reserved bits must be zero and the format type must be `00`.
pub fn is_valid(raw: u32) -> bool {
    raw & RESERVED_MASK == 0 && raw & FORMAT_TYPE_MASK == 0
}

/// Major device class code (bits 8..=12).
pub fn major_code(raw: u32) -> u8 {
    ((raw & MAJOR_MASK) >> MAJOR_OFFSET) as u8
}

/// Service class field (bits 13..=23).
pub fn service_bits(raw: u32) -> u16 {
    ((raw & SERVICE_MASK) >> SERVICE_OFFSET) as u16
}
