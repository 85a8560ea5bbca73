//! Broadcaster Information Table payload decoding and generation.

use crate::descriptor::{self, Descriptor};
use crate::section::PsiSection;
use crate::slice_reader::SliceReader;
use crate::tables::{build_sections, TablePayload, STANDARD_BODY_BUDGET};

/// `table_id` of the Broadcaster Information Table.
pub const TABLE_ID: u8 = 0xC4;

/// One broadcaster-info record nested in a [`BitTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcaster {
    /// Identifies the broadcaster within this BIT's network.
    pub broadcaster_id: u8,
    /// Descriptors describing this broadcaster.
    pub descriptors: Vec<Descriptor>,
}

impl Broadcaster {
    /// Builds an empty broadcaster-info record.
    pub fn new(broadcaster_id: u8) -> Self {
        Self {
            broadcaster_id,
            descriptors: Vec::new(),
        }
    }

    /// Appends a descriptor to this broadcaster's descriptor list.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    fn encoded_len(&self) -> usize {
        3 + descriptor::list_encoded_len(&self.descriptors)
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.broadcaster_id);
        let len = descriptor::list_encoded_len(&self.descriptors);
        out.push(((len >> 8) & 0x0F) as u8);
        out.push((len & 0xFF) as u8);
        descriptor::write_list(&self.descriptors, out);
    }
}

/// Decoded Broadcaster Information Table (ISDB-T), `table_id` 0xC4.
///
/// `extension` carries `original_network_id`. See `SPEC_FULL.md` §4.5 for the payload layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitTable {
    /// Always [`TABLE_ID`] (0xC4) for a well-formed table.
    pub table_id: u8,
    /// `original_network_id`.
    pub extension: u16,
    /// 5-bit version number of this table instance.
    pub version: u8,
    /// Whether this is the currently-applicable version (vs. a next-applicable one).
    pub current_next: bool,
    /// Whether broadcast view is permitted for this network.
    pub broadcast_view_propriety: bool,
    /// Top-level descriptors, repeated identically in every section of this table instance.
    pub descriptors: Vec<Descriptor>,
    /// Per-broadcaster descriptor records nested in this table.
    pub broadcasters: Vec<Broadcaster>,
    crcs: [u32; 6],
}

impl BitTable {
    /// Builds an empty BIT record for the given `original_network_id`/`version`.
    pub fn new(original_network_id: u16, version: u8) -> Self {
        Self {
            table_id: TABLE_ID,
            extension: original_network_id,
            version,
            current_next: true,
            broadcast_view_propriety: false,
            descriptors: Vec::new(),
            broadcasters: Vec::new(),
            crcs: [0; 6],
        }
    }

    /// Appends a top-level descriptor to this table.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    /// Appends a broadcaster-info record to this table.
    pub fn add_broadcaster(&mut self, broadcaster: Broadcaster) {
        self.broadcasters.push(broadcaster);
    }

    /// Serializes this table into one or more sections, segmenting the broadcaster loop so no
    /// section exceeds the byte budget.
    pub fn generate_sections(&self) -> Vec<Vec<u8>> {
        let mut first_descriptors = Vec::new();
        descriptor::write_list(&self.descriptors, &mut first_descriptors);
        let bvp_bit = if self.broadcast_view_propriety {
            0x10
        } else {
            0
        };
        let header_len = first_descriptors.len();

        let mut make_header = || -> Vec<u8> {
            let mut h = vec![
                bvp_bit | (((header_len >> 8) & 0x0F) as u8),
                (header_len & 0xFF) as u8,
            ];
            h.extend_from_slice(&first_descriptors);
            h
        };

        let mut bodies = Vec::new();
        let mut body = make_header();
        let body_floor = body.len();
        for broadcaster in &self.broadcasters {
            let entry_len = broadcaster.encoded_len();
            if body.len() > body_floor && body.len() + entry_len > STANDARD_BODY_BUDGET {
                bodies.push(body);
                body = make_header();
            }
            broadcaster.write(&mut body);
        }
        bodies.push(body);

        build_sections(self.table_id, self.extension, self.version, self.current_next, bodies)
    }
}

impl TablePayload for BitTable {
    fn decode(sections: &[&PsiSection], crcs: [u32; 6]) -> Self {
        let first = sections[0];
        let mut table = BitTable::new(first.extension, first.version);
        table.table_id = first.table_id;
        table.current_next = first.current_next;
        table.crcs = crcs;

        for section in sections {
            let payload = section.payload();
            if payload.len() < 2 {
                continue;
            }
            let mut reader = SliceReader::new(payload);
            let b0 = reader.read_u8();
            let b1 = reader.read_u8();
            table.broadcast_view_propriety = b0 & 0x10 != 0;
            let first_descriptors_length = (((b0 & 0x0F) as usize) << 8) | b1 as usize;
            let mut descriptors_reader = reader.new_sub_reader(first_descriptors_length);
            table.descriptors = Descriptor::parse_list(&mut descriptors_reader);

            while reader.remaining_len() >= 3 {
                let broadcaster_id = reader.read_u8();
                let l0 = reader.read_u8();
                let l1 = reader.read_u8();
                let broadcaster_descriptors_length = (((l0 & 0x0F) as usize) << 8) | l1 as usize;
                let mut bd_reader = reader.new_sub_reader(broadcaster_descriptors_length);
                let descriptors = Descriptor::parse_list(&mut bd_reader);
                table.broadcasters.push(Broadcaster {
                    broadcaster_id,
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
