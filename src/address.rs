//! Bluetooth device address (BD_ADDR).

use core::fmt;
use core::str::FromStr;

/// Length of a BD_ADDR in bytes.
pub const ADDR_LEN: usize = 6;

/// A 6-byte Bluetooth device address, as delivered by the radio.
///
/// Two addresses with the same bytes identify the same device for the
/// lifetime of a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeviceAddress([u8; ADDR_LEN]);

impl DeviceAddress {
    pub const fn new(bytes: [u8; ADDR_LEN]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; ADDR_LEN] {
        &self.0
    }
}

impl fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Error returned when parsing an address string fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseAddressError;

impl fmt::Display for ParseAddressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected address of the form aa:bb:cc:dd:ee:ff")
    }
}

impl FromStr for DeviceAddress {
    type Err = ParseAddressError;

    /// Parse `"aa:bb:cc:dd:ee:ff"` (either case).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 17 {
            return Err(ParseAddressError);
        }
        let mut bytes = [0u8; ADDR_LEN];
        let mut parts = s.split(':');
        for byte in bytes.iter_mut() {
            let part = parts.next().ok_or(ParseAddressError)?;
            if part.len() != 2 {
                return Err(ParseAddressError);
            }
            *byte = u8::from_str_radix(part, 16).map_err(|_| ParseAddressError)?;
        }
        if parts.next().is_some() {
            return Err(ParseAddressError);
        }
        Ok(Self(bytes))
    }
}

/// Maximum length of a formatted address ("aa:bb:cc:dd:ee:ff").
pub type AddressString = heapless::String<17>;

/// Format an address into a fixed-capacity string.
pub fn format_address(addr: &DeviceAddress) -> AddressString {
    use core::fmt::Write;
    let mut buf = AddressString::new();
    let _ = write!(buf, "{}", addr);
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase_colon_hex() {
        let addr = DeviceAddress::new([0xB4, 0x1E, 0x52, 0x0A, 0xCD, 0xEF]);
        assert_eq!(format_address(&addr).as_str(), "b4:1e:52:0a:cd:ef");
    }

    #[test]
    fn parse_accepts_either_case() {
        let lower: DeviceAddress = "b4:1e:52:0a:cd:ef".parse().unwrap();
        let upper: DeviceAddress = "B4:1E:52:0A:CD:EF".parse().unwrap();
        assert_eq!(lower, upper);
        assert_eq!(lower.as_bytes(), &[0xB4, 0x1E, 0x52, 0x0A, 0xCD, 0xEF]);
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!("b4:1e:52:0a:cd".parse::<DeviceAddress>().is_err());
        assert!("b4-1e-52-0a-cd-ef".parse::<DeviceAddress>().is_err());
        assert!("b4:1e:52:0a:cd:zz".parse::<DeviceAddress>().is_err());
        assert!("b41:e:52:0a:cd:ef".parse::<DeviceAddress>().is_err());
    }
}
