/// A complete, reassembled, CRC-validated PSI section.
///
/// Holds the raw bytes starting at `table_id` (CRC trailer included, for tables that carry one)
/// plus the cursors and long-form syntax fields derived from them. Forward links to sibling
/// sections of the same table are not modeled as a pointer chain here (see `SPEC_FULL.md` §9) —
/// the [`crate::aggregator::SectionAggregator`] that owns a section indexes it by `number`
/// instead.
#[derive(Debug, Clone)]
pub(crate) struct PsiSection {
    pub(crate) bytes: Vec<u8>,
    pub(crate) table_id: u8,
    pub(crate) syntax_indicator: bool,
    pub(crate) private_indicator: bool,
    pub(crate) extension: u16,
    pub(crate) version: u8,
    pub(crate) current_next: bool,
    pub(crate) number: u8,
    pub(crate) last_number: u8,
    pub(crate) payload_start: usize,
    pub(crate) payload_end: usize,
}

impl PsiSection {
    /// Payload bytes between the standard header and the CRC trailer (if any).
    pub(crate) fn payload(&self) -> &[u8] {
        &self.bytes[self.payload_start..self.payload_end]
    }

    /// The 4 bytes immediately following the payload, read big-endian.
    ///
    /// For syntax-long sections this is the embedded CRC-32 trailer, reused by table decoders as
    /// a cheap per-section content fingerprint (`SPEC_FULL.md` §4.5) rather than recomputing a
    /// hash over the whole payload on every completion.
    pub(crate) fn trailing_u32(&self) -> u32 {
        if self.bytes.len() < self.payload_end + 4 {
            return 0;
        }
        u32::from_be_bytes(
            self.bytes[self.payload_end..self.payload_end + 4]
                .try_into()
                .unwrap(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_and_trailer_are_sliced_from_the_right_cursors() {
        let mut bytes = vec![0xC4, 0x80, 0x09, 0x00, 0x01, 0x06, 0x00, 0x00];
        bytes.extend_from_slice(&[0xAA, 0xBB]); // payload
        bytes.extend_from_slice(&0xDEADBEEFu32.to_be_bytes()); // crc trailer
        let section = PsiSection {
            payload_start: 8,
            payload_end: 10,
            bytes,
            table_id: 0xC4,
            syntax_indicator: true,
            private_indicator: false,
            extension: 1,
            version: 3,
            current_next: true,
            number: 0,
            last_number: 0,
        };
        assert_eq!(section.payload(), &[0xAA, 0xBB]);
        assert_eq!(section.trailing_u32(), 0xDEADBEEF);
    }
}
