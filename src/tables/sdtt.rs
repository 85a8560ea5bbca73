//! Software Download Trigger Table payload decoding and generation.

use crate::descriptor::{self, Descriptor};
use crate::section::PsiSection;
use crate::slice_reader::SliceReader;
use crate::tables::{build_sections, TablePayload, STANDARD_BODY_BUDGET};

/// `table_id` of the Software Download Trigger Table.
pub const TABLE_ID: u8 = 0xC3;

/// One `start_time`/`duration` download schedule entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// 5-byte MJD/BCD start time.
    pub start_time: [u8; 5],
    /// 3-byte BCD duration.
    pub duration: [u8; 3],
}

/// One download-trigger content record nested in an [`SdttTable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    /// 4-bit group this download content belongs to.
    pub group: u8,
    /// Version this download targets, for conditional download logic.
    pub target_version: u16,
    /// Version this content would install.
    pub new_version: u16,
    /// Urgency/priority level of this download.
    pub download_level: u8,
    /// Indicates whether `new_version` is meaningful.
    pub version_indicator: u8,
    /// 4-bit timeshift information applying to all of this content's schedules.
    pub schedule_timeshift_information: u8,
    /// Download schedule windows for this content.
    pub schedules: Vec<Schedule>,
    /// Descriptors describing this content.
    pub descriptors: Vec<Descriptor>,
}

impl Content {
    /// Builds a content record with the given group/target/new version and default flags.
    pub fn new(group: u8, target_version: u16, new_version: u16) -> Self {
        Self {
            group,
            target_version,
            new_version,
            download_level: 0,
            version_indicator: 0,
            schedule_timeshift_information: 0,
            schedules: Vec::new(),
            descriptors: Vec::new(),
        }
    }

    /// Appends a download schedule window to this content.
    pub fn add_schedule(&mut self, schedule: Schedule) {
        self.schedules.push(schedule);
    }

    /// Appends a descriptor to this content's descriptor list.
    pub fn add_descriptor(&mut self, descriptor: Descriptor) {
        self.descriptors.push(descriptor);
    }

    fn encoded_len(&self) -> usize {
        8 + self.schedules.len() * 8 + descriptor::list_encoded_len(&self.descriptors)
    }

    fn write(&self, out: &mut Vec<u8>) {
        let schedule_description_length = self.schedules.len() * 8;
        let descriptors_len = descriptor::list_encoded_len(&self.descriptors);
        let content_description_length = schedule_description_length + descriptors_len;

        out.push((self.group << 4) | (((self.target_version >> 8) & 0x0F) as u8));
        out.push((self.target_version & 0xFF) as u8);
        out.push((self.new_version >> 4) as u8);
        out.push(
            ((self.new_version & 0x0F) as u8) << 4
                | (self.download_level & 0x3) << 2
                | (self.version_indicator & 0x3),
        );
        out.push(((content_description_length >> 8) & 0x0F) as u8);
        out.push((content_description_length & 0xFF) as u8);
        out.push((schedule_description_length >> 4) as u8);
        out.push(
            ((schedule_description_length & 0x0F) as u8) << 4
                | (self.schedule_timeshift_information & 0x0F),
        );
        for s in &self.schedules {
            out.extend_from_slice(&s.start_time);
            out.extend_from_slice(&s.duration);
        }
        descriptor::write_list(&self.descriptors, out);
    }
}

/// Decoded Software Download Trigger Table (ARIB STD-B21), `table_id` 0xC3.
///
/// `extension` carries `(maker_id << 8) | model_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdttTable {
    /// Always [`TABLE_ID`] (0xC3) for a well-formed table.
    pub table_id: u8,
    /// `(maker_id << 8) | model_id`.
    pub extension: u16,
    /// 5-bit version number of this table instance.
    pub version: u8,
    /// Whether this is the currently-applicable version (vs. a next-applicable one).
    pub current_next: bool,
    /// Transport stream carrying the targeted service.
    pub transport_stream_id: u16,
    /// Network that originated `transport_stream_id`.
    pub original_network_id: u16,
    /// Service targeted by this download trigger.
    pub service_id: u16,
    /// Download-trigger content records nested in this table.
    pub contents: Vec<Content>,
    crcs: [u32; 6],
}

impl SdttTable {
    /// Builds an empty SDTT record for the given `(maker_id<<8)|model_id` extension/version and
    /// identifying ids.
    pub fn new(
        extension: u16,
        version: u8,
        transport_stream_id: u16,
        original_network_id: u16,
        service_id: u16,
    ) -> Self {
        Self {
            table_id: TABLE_ID,
            extension,
            version,
            current_next: true,
            transport_stream_id,
            original_network_id,
            service_id,
            contents: Vec::new(),
            crcs: [0; 6],
        }
    }

    /// Appends a content record to this table.
    pub fn add_content(&mut self, content: Content) {
        self.contents.push(content);
    }

    /// Serializes this table, segmenting the content loop across sections as needed.
    ///
    /// `num_of_contents` is per-section (a single byte, so at most 255 contents per section); a
    /// record with more contents than fit in one section's budget or count is split across
    /// multiple sections, each repeating the `transport_stream_id`/`original_network_id`/
    /// `service_id` header.
    pub fn generate_sections(&self) -> Vec<Vec<u8>> {
        let make_header = |count: u8| -> Vec<u8> {
            let mut h = Vec::with_capacity(7);
            h.extend_from_slice(&self.transport_stream_id.to_be_bytes());
            h.extend_from_slice(&self.original_network_id.to_be_bytes());
            h.extend_from_slice(&self.service_id.to_be_bytes());
            h.push(count);
            h
        };

        let mut bodies: Vec<(Vec<u8>, u8)> = Vec::new();
        let mut body = Vec::new();
        let mut count: u8 = 0;
        for content in &self.contents {
            let entry_len = content.encoded_len();
            let would_overflow =
                !body.is_empty() && (7 + body.len() + entry_len > STANDARD_BODY_BUDGET || count == 255);
            if would_overflow {
                bodies.push((std::mem::take(&mut body), count));
                count = 0;
            }
            content.write(&mut body);
            count += 1;
        }
        bodies.push((body, count));

        let bodies: Vec<Vec<u8>> = bodies
            .into_iter()
            .map(|(content_bytes, count)| {
                let mut full = make_header(count);
                full.extend_from_slice(&content_bytes);
                full
            })
            .collect();

        build_sections(self.table_id, self.extension, self.version, self.current_next, bodies)
    }
}

impl TablePayload for SdttTable {
    fn decode(sections: &[&PsiSection], crcs: [u32; 6]) -> Self {
        let first = sections[0];
        let mut table = SdttTable::new(first.extension, first.version, 0, 0, 0);
        table.table_id = first.table_id;
        table.current_next = first.current_next;
        table.crcs = crcs;

        for section in sections {
            let payload = section.payload();
            if payload.len() < 7 {
                continue;
            }
            let mut reader = SliceReader::new(payload);
            table.transport_stream_id = reader.read_be_u16();
            table.original_network_id = reader.read_be_u16();
            table.service_id = reader.read_be_u16();
            let num_of_contents = reader.read_u8();

            for _ in 0..num_of_contents {
                if reader.remaining_len() < 8 {
                    break;
                }
                let b = reader.read_array::<8>();
                let group = b[0] >> 4;
                let target_version = (((b[0] & 0x0F) as u16) << 8) | b[1] as u16;
                let new_version = ((b[2] as u16) << 4) | ((b[3] as u16) >> 4);
                let download_level = (b[3] >> 2) & 0x3;
                let version_indicator = b[3] & 0x3;
                let content_description_length = (((b[4] & 0x0F) as usize) << 8) | b[5] as usize;
                let schedule_description_length = ((b[6] as usize) << 4) | ((b[7] as usize) >> 4);
                let schedule_timeshift_information = b[7] & 0x0F;

                let mut content_reader = reader.new_sub_reader(content_description_length);
                let schedule_bytes =
                    schedule_description_length.min(content_reader.remaining_len());
                let mut schedule_reader = content_reader.new_sub_reader(schedule_bytes);
                let mut schedules = Vec::new();
                while schedule_reader.remaining_len() >= 8 {
                    let start_time = schedule_reader.read_array::<5>();
                    let duration = schedule_reader.read_array::<3>();
                    schedules.push(Schedule {
                        start_time,
                        duration,
                    });
                }
                let descriptors = Descriptor::parse_list(&mut content_reader);

                table.contents.push(Content {
                    group,
                    target_version,
                    new_version,
                    download_level,
                    version_indicator,
                    schedule_timeshift_information,
                    schedules,
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
