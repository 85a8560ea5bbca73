//! Common Data Table payload decoding and generation.

use crate::descriptor::{self, Descriptor};
use crate::section::PsiSection;
use crate::slice_reader::SliceReader;
use crate::tables::{build_sections, TablePayload, EXTENDED_BODY_BUDGET};

/// `table_id` of the Common Data Table.
pub const TABLE_ID: u8 = 0xC8;

/// Maximum `data_module_byte` length per the ARIB STD-B10 CDT payload budget.
pub const MAX_DATA_MODULE_LEN: usize = 4093;

/// Decoded Common Data Table (ISDB-T), `table_id` 0xC8.
///
/// `extension` carries `download_data_id`. Uses the 4096-byte section class rather than 1024 so
/// the opaque `data_module_byte[]` can carry up to [`MAX_DATA_MODULE_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdtTable {
    /// Always [`TABLE_ID`] (0xC8) for a well-formed table.
    pub table_id: u8,
    /// `download_data_id`.
    pub extension: u16,
    /// 5-bit version number of this table instance.
    pub version: u8,
    /// Whether this is the currently-applicable version (vs. a next-applicable one).
    pub current_next: bool,
    /// Network that originated this data module.
    pub original_network_id: u16,
    /// Identifies the kind of data carried in `data_module`.
    pub data_type: u8,
    /// Descriptors describing this data module.
    pub descriptors: Vec<Descriptor>,
    /// Opaque application data, at most [`MAX_DATA_MODULE_LEN`] bytes.
    pub data_module: Vec<u8>,
    crcs: [u32; 6],
}

impl CdtTable {
    /// Builds an empty CDT record for the given `download_data_id`/`version`.
    pub fn new(download_data_id: u16, version: u8, original_network_id: u16, data_type: u8) -> Self {
        Self {
            table_id: TABLE_ID,
            extension: download_data_id,
            version,
            current_next: true,
            original_network_id,
            data_type,
            descriptors: Vec::new(),
            data_module: Vec::new(),
            crcs: [0; 6],
        }
    }

    /// Appends a descriptor to this table.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    /// Serializes this table, splitting `data_module` across sections if it does not fit in one.
    pub fn generate_sections(&self) -> Vec<Vec<u8>> {
        let mut descriptors = Vec::new();
        descriptor::write_list(&self.descriptors, &mut descriptors);
        let header_len = descriptors.len();

        let make_header = |descriptors: &[u8]| -> Vec<u8> {
            let mut h = vec![0u8; 4];
            h[0..2].copy_from_slice(&self.original_network_id.to_be_bytes());
            h[2] = self.data_type;
            h[3] = ((header_len >> 8) & 0x0F) as u8;
            h.push((header_len & 0xFF) as u8);
            h.extend_from_slice(descriptors);
            h
        };

        let fixed_header = make_header(&descriptors);
        let chunk_budget = EXTENDED_BODY_BUDGET.saturating_sub(fixed_header.len());
        let chunk_budget = chunk_budget.max(1);

        let mut bodies = Vec::new();
        if self.data_module.is_empty() {
            bodies.push(fixed_header.clone());
        } else {
            for chunk in self.data_module.chunks(chunk_budget) {
                let mut body = make_header(&descriptors);
                body.extend_from_slice(chunk);
                bodies.push(body);
            }
        }

        build_sections(self.table_id, self.extension, self.version, self.current_next, bodies)
    }
}

impl TablePayload for CdtTable {
    fn decode(sections: &[&PsiSection], crcs: [u32; 6]) -> Self {
        let first = sections[0];
        let mut table = CdtTable::new(first.extension, first.version, 0, 0);
        table.table_id = first.table_id;
        table.current_next = first.current_next;
        table.crcs = crcs;

        for section in sections {
            let payload = section.payload();
            if payload.len() < 4 {
                continue;
            }
            let mut reader = SliceReader::new(payload);
            table.original_network_id = reader.read_be_u16();
            table.data_type = reader.read_u8();
            let l0 = reader.read_u8();
            let l1 = reader.read_u8();
            let descriptors_loop_length = (((l0 & 0x0F) as usize) << 8) | l1 as usize;
            let mut descriptors_reader = reader.new_sub_reader(descriptors_loop_length);
            table.descriptors = Descriptor::parse_list(&mut descriptors_reader);
            table.data_module.extend_from_slice(reader.read_to_end());
        }

        table
    }

    fn crcs(&self) -> [u32; 6] {
        self.crcs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::parse_section;

    #[test]
    fn generate_then_decode_round_trips() {
        let mut table = CdtTable::new(0x0102, 1, 0x7FE1, 0x01);
        table.add_descriptor(Descriptor::new(0x01, smallvec::smallvec![0xAB]));
        table.data_module = vec![0x55; 100];

        let sections = table.generate_sections();
        assert_eq!(sections.len(), 1);
        let parsed: Vec<PsiSection> = sections.iter().map(|b| parse_section(b)).collect();
        let refs: Vec<&PsiSection> = parsed.iter().collect();
        let mut crcs = [0u32; 6];
        crcs[0] = refs[0].trailing_u32();
        let decoded = CdtTable::decode(&refs, crcs);

        assert_eq!(decoded.original_network_id, 0x7FE1);
        assert_eq!(decoded.data_type, 0x01);
        assert_eq!(decoded.descriptors, table.descriptors);
        assert_eq!(decoded.data_module, table.data_module);
    }

    #[test]
    fn large_data_module_splits_across_sections() {
        let mut table = CdtTable::new(0x1, 0, 0x2, 0x0);
        table.data_module = vec![0x42; 9000];
        let sections = table.generate_sections();
        assert!(sections.len() > 1);
    }
}
