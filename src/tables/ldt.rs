//! Linked Description Table payload decoding and generation.

use crate::descriptor::{self, Descriptor};
use crate::section::PsiSection;
use crate::slice_reader::SliceReader;
use crate::tables::{build_sections, TablePayload, STANDARD_BODY_BUDGET};

/// `table_id` of the Linked Description Table.
pub const TABLE_ID: u8 = 0xC7;

/// One description record nested in an [`LdtTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Description {
    /// Identifies this description within the table's service.
    pub description_id: u16,
    /// Descriptors describing this description.
    pub descriptors: Vec<Descriptor>,
}

impl Description {
    /// Builds an empty description record.
    pub fn new(description_id: u16) -> Self {
        Self {
            description_id,
            descriptors: Vec::new(),
        }
    }

    /// Appends a descriptor to this description's descriptor list.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    fn encoded_len(&self) -> usize {
        4 + descriptor::list_encoded_len(&self.descriptors)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.description_id.to_be_bytes());
        // The source's generator computes this length but never writes it back (the relevant
        // line is commented out), leaving stale pre-serialization data in its place — see
        // SPEC_FULL.md §9. This writes the true serialized length, which the round-trip property
        // in SPEC_FULL.md §8 requires.
        let len = descriptor::list_encoded_len(&self.descriptors);
        out.push(((len >> 8) & 0x0F) as u8);
        out.push((len & 0xFF) as u8);
        descriptor::write_list(&self.descriptors, out);
    }
}

/// Decoded Linked Description Table (ISDB-T), `table_id` 0xC7.
///
/// `extension` carries `original_service_id`. See `SPEC_FULL.md` §4.5 for the payload layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LdtTable {
    /// Always [`TABLE_ID`] (0xC7) for a well-formed table.
    pub table_id: u8,
    /// `original_service_id`.
    pub extension: u16,
    /// 5-bit version number of this table instance.
    pub version: u8,
    /// Whether this is the currently-applicable version (vs. a next-applicable one).
    pub current_next: bool,
    /// Transport stream carrying the service these descriptions are linked to.
    pub transport_stream_id: u16,
    /// Network that originated `transport_stream_id`.
    pub original_network_id: u16,
    /// Description records nested in this table.
    pub descriptions: Vec<Description>,
    crcs: [u32; 6],
}

impl LdtTable {
    /// Builds an empty LDT record for the given `original_service_id`/`version`.
    pub fn new(
        original_service_id: u16,
        version: u8,
        transport_stream_id: u16,
        original_network_id: u16,
    ) -> Self {
        Self {
            table_id: TABLE_ID,
            extension: original_service_id,
            version,
            current_next: true,
            transport_stream_id,
            original_network_id,
            descriptions: Vec::new(),
            crcs: [0; 6],
        }
    }

    /// Appends a description record to this table.
    pub fn add_description(&mut self, description: Description) {
        self.descriptions.push(description);
    }

    /// Serializes this table, segmenting the description loop across sections as needed.
    pub fn generate_sections(&self) -> Vec<Vec<u8>> {
        let make_header = || -> Vec<u8> {
            let mut h = Vec::with_capacity(4);
            h.extend_from_slice(&self.transport_stream_id.to_be_bytes());
            h.extend_from_slice(&self.original_network_id.to_be_bytes());
            h
        };

        let mut bodies = Vec::new();
        let mut body = make_header();
        let body_floor = body.len();
        for description in &self.descriptions {
            let entry_len = description.encoded_len();
            if body.len() > body_floor && body.len() + entry_len > STANDARD_BODY_BUDGET {
                bodies.push(body);
                body = make_header();
            }
            description.write(&mut body);
        }
        bodies.push(body);

        build_sections(self.table_id, self.extension, self.version, self.current_next, bodies)
    }
}

impl TablePayload for LdtTable {
    fn decode(sections: &[&PsiSection], crcs: [u32; 6]) -> Self {
        let first = sections[0];
        let mut table = LdtTable::new(first.extension, first.version, 0, 0);
        table.table_id = first.table_id;
        table.current_next = first.current_next;
        table.crcs = crcs;

        for section in sections {
            let payload = section.payload();
            if payload.len() < 4 {
                continue;
            }
            let mut reader = SliceReader::new(payload);
            table.transport_stream_id = reader.read_be_u16();
            table.original_network_id = reader.read_be_u16();

            while reader.remaining_len() >= 4 {
                let description_id = reader.read_be_u16();
                let l0 = reader.read_u8();
                let l1 = reader.read_u8();
                let descriptors_loop_length = (((l0 & 0x0F) as usize) << 8) | l1 as usize;
                let mut descriptors_reader = reader.new_sub_reader(descriptors_loop_length);
                let descriptors = Descriptor::parse_list(&mut descriptors_reader);
                table.descriptions.push(Description {
                    description_id,
                    descriptors,
                });
            }
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
    fn two_descriptions_with_two_descriptors_each_decode_byte_exact() {
        let mut table = LdtTable::new(0x9001, 2, 0x1111, 0x2222);
        let mut d1 = Description::new(0x1);
        d1.add_descriptor(Descriptor::new(0xA1, smallvec::smallvec![0x01]));
        d1.add_descriptor(Descriptor::new(0xA2, smallvec::smallvec![0x02, 0x03]));
        let mut d2 = Description::new(0x2);
        d2.add_descriptor(Descriptor::new(0xB1, smallvec::smallvec![0x04]));
        d2.add_descriptor(Descriptor::new(0xB2, smallvec::smallvec![]));
        table.add_description(d1);
        table.add_description(d2);

        let sections = table.generate_sections();
        assert_eq!(sections.len(), 1);
        let parsed: Vec<PsiSection> = sections.iter().map(|b| parse_section(b)).collect();
        let refs: Vec<&PsiSection> = parsed.iter().collect();
        let mut crcs = [0u32; 6];
        crcs[0] = refs[0].trailing_u32();
        let decoded = LdtTable::decode(&refs, crcs);

        assert_eq!(decoded.transport_stream_id, 0x1111);
        assert_eq!(decoded.original_network_id, 0x2222);
        assert_eq!(decoded.descriptions, table.descriptions);
    }

    #[test]
    fn description_descriptors_loop_length_is_written_not_stale() {
        let mut table = LdtTable::new(0x1, 0, 0x2, 0x3);
        let mut d = Description::new(0x5);
        d.add_descriptor(Descriptor::new(0x10, smallvec::smallvec![0xFF; 4]));
        table.add_description(d);
        let sections = table.generate_sections();
        let body = &sections[0][8..sections[0].len() - 4];
        // transport_stream_id(2) + original_network_id(2) + description_id(2) = 6 bytes in.
        let loop_len = (((body[6] & 0x0F) as usize) << 8) | body[7] as usize;
        assert_eq!(loop_len, 6); // one descriptor: 1 tag + 1 len + 4 data
    }
}
