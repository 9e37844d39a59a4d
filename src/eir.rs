//! Extended Inquiry Response (EIR) decoding.
//!
//! EIR data is a sequence of records, each `[length][type][data...]` where
//! `length` counts the type byte and the data but not itself. A record with a
//! length of 0 terminates the sequence. Classic inquiry results carry at most
//! [`EIR_DATA_LEN`] bytes, but the decoder only walks as far as the bound the
//! caller declares (by default [`EIR_PARSE_BOUND`]).
//!
//! Zero-copy and allocation free: records borrow from the source buffer.

/// Default number of EIR bytes walked per inquiry result.
pub const EIR_PARSE_BOUND: usize = 31;

/// Maximum size of the EIR payload in an inquiry result.
pub const EIR_DATA_LEN: usize = 240;

/// EIR data type (the tag byte of a record).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EirType {
    Flags,
    Incomplete16BitUuids,
    Complete16BitUuids,
    Incomplete32BitUuids,
    Complete32BitUuids,
    Incomplete128BitUuids,
    Complete128BitUuids,
    ShortenedLocalName,
    CompleteLocalName,
    TxPowerLevel,
    ServiceData16,
    ManufacturerSpecific,
    /// Any tag this crate does not interpret.
    Unknown(u8),
}

impl EirType {
    pub const fn from_u8(tag: u8) -> Self {
        match tag {
            0x01 => EirType::Flags,
            0x02 => EirType::Incomplete16BitUuids,
            0x03 => EirType::Complete16BitUuids,
            0x04 => EirType::Incomplete32BitUuids,
            0x05 => EirType::Complete32BitUuids,
            0x06 => EirType::Incomplete128BitUuids,
            0x07 => EirType::Complete128BitUuids,
            0x08 => EirType::ShortenedLocalName,
            0x09 => EirType::CompleteLocalName,
            0x0A => EirType::TxPowerLevel,
            0x16 => EirType::ServiceData16,
            0xFF => EirType::ManufacturerSpecific,
            other => EirType::Unknown(other),
        }
    }

    pub const fn to_u8(self) -> u8 {
        match self {
            EirType::Flags => 0x01,
            EirType::Incomplete16BitUuids => 0x02,
            EirType::Complete16BitUuids => 0x03,
            EirType::Incomplete32BitUuids => 0x04,
            EirType::Complete32BitUuids => 0x05,
            EirType::Incomplete128BitUuids => 0x06,
            EirType::Complete128BitUuids => 0x07,
            EirType::ShortenedLocalName => 0x08,
            EirType::CompleteLocalName => 0x09,
            EirType::TxPowerLevel => 0x0A,
            EirType::ServiceData16 => 0x16,
            EirType::ManufacturerSpecific => 0xFF,
            EirType::Unknown(tag) => tag,
        }
    }

    /// Name used in log output.
    pub fn as_str(&self) -> &'static str {
        match self {
            EirType::Flags => "flags",
            EirType::Incomplete16BitUuids => "incomplete_16bit_uuids",
            EirType::Complete16BitUuids => "complete_16bit_uuids",
            EirType::Incomplete32BitUuids => "incomplete_32bit_uuids",
            EirType::Complete32BitUuids => "complete_32bit_uuids",
            EirType::Incomplete128BitUuids => "incomplete_128bit_uuids",
            EirType::Complete128BitUuids => "complete_128bit_uuids",
            EirType::ShortenedLocalName => "short_local_name",
            EirType::CompleteLocalName => "complete_local_name",
            EirType::TxPowerLevel => "tx_power_level",
            EirType::ServiceData16 => "service_data_16",
            EirType::ManufacturerSpecific => "manufacturer_specific",
            EirType::Unknown(_) => "unknown",
        }
    }
}

impl From<u8> for EirType {
    fn from(tag: u8) -> Self {
        EirType::from_u8(tag)
    }
}

/// One decoded EIR record, borrowed from the source buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EirRecord<'a> {
    pub ty: EirType,
    /// Declared length byte (type byte + data).
    pub len: u8,
    /// Record data, excluding the type byte.
    pub data: &'a [u8],
}

/// Lazy iterator over the records of an EIR buffer.
///
/// Stops at a zero-length terminator, once the consumed byte count reaches
/// the bound, or as soon as a record's declared length would cross the bound.
/// Bytes past the bound are never read.
pub struct EirIter<'a> {
    data: &'a [u8],
    bound: usize,
    pos: usize,
    done: bool,
}

impl<'a> EirIter<'a> {
    /// Walk `data`, consuming at most `bound` bytes.
    pub fn new(data: &'a [u8], bound: usize) -> Self {
        let bound = bound.min(data.len());
        Self {
            data: &data[..bound],
            bound,
            pos: 0,
            done: false,
        }
    }

    /// Number of bytes consumed so far (length bytes included).
    pub fn consumed(&self) -> usize {
        self.pos
    }
}

impl<'a> Iterator for EirIter<'a> {
    type Item = EirRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.bound {
            self.done = true;
            return None;
        }

        let len = self.data[self.pos];
        let end = self.pos + 1 + len as usize;
        if len == 0 || end > self.bound {
            if len != 0 {
                log::trace!(
                    "EIR record at {} overruns bound {} (len {}), truncating",
                    self.pos,
                    self.bound,
                    len
                );
            }
            self.done = true;
            return None;
        }

        let ty = EirType::from_u8(self.data[self.pos + 1]);
        let data = &self.data[self.pos + 2..end];
        self.pos = end;

        Some(EirRecord { ty, len, data })
    }
}

impl core::iter::FusedIterator for EirIter<'_> {}

/// Decode `data` up to the default inquiry bound.
pub fn parse(data: &[u8]) -> EirIter<'_> {
    EirIter::new(data, EIR_PARSE_BOUND)
}

/// Find the first record of type `ty` anywhere in `data` and return its data.
///
/// Walks the whole buffer rather than the inquiry bound, with the same
/// terminator and overrun rules as [`EirIter`].
pub fn resolve(data: &[u8], ty: EirType) -> Option<&[u8]> {
    EirIter::new(data, data.len())
        .find(|record| record.ty == ty)
        .map(|record| record.data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8], bound: usize) -> heapless::Vec<EirRecord<'_>, 16> {
        EirIter::new(data, bound).collect()
    }

    #[test]
    fn flags_record_then_terminator() {
        let data = [0x02, 0x01, 0x00, 0x00];
        let records = collect(&data, 31);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ty, EirType::Flags);
        assert_eq!(records[0].len, 2);
        assert_eq!(records[0].data, &[0x00]);
    }

    #[test]
    fn complete_local_name_record() {
        let data = [0x03, 0x09, b'A', b'B', 0x00];
        let records = collect(&data, 31);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ty, EirType::CompleteLocalName);
        assert_eq!(records[0].data, b"AB");
    }

    #[test]
    fn multiple_records_in_order() {
        let data = [
            0x02, 0x0A, 0xF8, // tx power -8
            0x05, 0x03, 0x34, 0x12, 0x78, 0x56, // two 16-bit UUIDs
            0x04, 0x08, b'a', b'b', b'c', // short name
            0x00,
        ];
        let tags: heapless::Vec<EirType, 4> = EirIter::new(&data, data.len()).map(|r| r.ty).collect();
        assert_eq!(
            tags.as_slice(),
            &[
                EirType::TxPowerLevel,
                EirType::Complete16BitUuids,
                EirType::ShortenedLocalName
            ]
        );
    }

    #[test]
    fn zero_length_terminates_even_with_trailing_data() {
        let data = [0x00, 0x03, 0x09, b'A', b'B'];
        assert_eq!(EirIter::new(&data, data.len()).count(), 0);
    }

    #[test]
    fn empty_buffer_yields_nothing() {
        assert_eq!(EirIter::new(&[], 31).count(), 0);
        assert_eq!(EirIter::new(&[0x03, 0x09, b'A', b'B'], 0).count(), 0);
    }

    #[test]
    fn overrunning_length_stops_without_yielding() {
        // Second record declares 10 bytes but only 2 remain.
        let data = [0x02, 0x01, 0x06, 0x0A, 0x09, b'A'];
        let records = collect(&data, data.len());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ty, EirType::Flags);
    }

    #[test]
    fn record_crossing_declared_bound_is_dropped() {
        // Buffer holds a complete record, but the bound cuts it off.
        let data = [0x02, 0x01, 0x06, 0x03, 0x09, b'A', b'B', 0x00];
        let records = collect(&data, 5);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ty, EirType::Flags);
    }

    #[test]
    fn stops_once_bound_consumed_without_terminator() {
        // Exactly fills the bound; nothing after it is read.
        let data = [0x03, 0x09, b'A', b'B', 0x02, 0x0A, 0x04];
        let mut iter = EirIter::new(&data, 4);
        assert_eq!(iter.next().map(|r| r.data), Some(&b"AB"[..]));
        assert_eq!(iter.consumed(), 4);
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn never_yields_data_past_bound() {
        // Every prefix bound over a buffer of back-to-back records.
        let data = [
            0x02, 0x01, 0x06, 0x03, 0x09, b'H', b'i', 0x05, 0x03, 0x0D, 0x18, 0x0F, 0x18, 0x02,
            0x0A, 0x00, 0x00,
        ];
        let base = data.as_ptr() as usize;
        for bound in 0..=data.len() + 4 {
            for record in EirIter::new(&data, bound) {
                let start = record.data.as_ptr() as usize - base;
                assert!(
                    start + record.data.len() <= bound,
                    "record {:?} ends past bound {bound}",
                    record.ty
                );
            }
        }
    }

    #[test]
    fn fused_after_stop() {
        let data = [0x02, 0x01, 0x06, 0x00, 0x02, 0x01, 0x06];
        let mut iter = EirIter::new(&data, data.len());
        assert!(iter.next().is_some());
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }

    #[test]
    fn unknown_tags_are_yielded() {
        let data = [0x03, 0x42, 0xAA, 0xBB, 0x00];
        let records = collect(&data, 31);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].ty, EirType::Unknown(0x42));
        assert_eq!(records[0].ty.to_u8(), 0x42);
        assert_eq!(records[0].ty.as_str(), "unknown");
    }

    #[test]
    fn default_parse_uses_inquiry_bound() {
        let mut data = [0u8; 40];
        // Filler record covering 30 bytes, then a name record past byte 31.
        data[0] = 29;
        data[1] = 0x42;
        data[30] = 0x03;
        data[31] = 0x09;
        data[32] = b'X';
        data[33] = b'Y';
        let tags: heapless::Vec<EirType, 4> = parse(&data).map(|r| r.ty).collect();
        assert_eq!(tags.as_slice(), &[EirType::Unknown(0x42)]);
    }

    #[test]
    fn resolve_walks_whole_buffer() {
        let mut data = [0u8; 40];
        data[0] = 29;
        data[1] = 0x42;
        data[30] = 0x03;
        data[31] = 0x09;
        data[32] = b'X';
        data[33] = b'Y';
        assert_eq!(resolve(&data, EirType::CompleteLocalName), Some(&b"XY"[..]));
        assert_eq!(resolve(&data, EirType::ShortenedLocalName), None);
    }

    #[test]
    fn tag_round_trips_through_enum() {
        for tag in [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A, 0x16, 0xFF] {
            let ty = EirType::from(tag);
            assert!(!matches!(ty, EirType::Unknown(_)), "tag {tag:#04x}");
            assert_eq!(ty.to_u8(), tag);
        }
    }
}
