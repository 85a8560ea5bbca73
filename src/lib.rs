//! Decoder for ISDB-T Program/Service Information (PSI) tables carried in an MPEG-2 transport
//! stream.
//!
//! This crate reassembles 188-byte MPEG-2 Transport Stream (TS) packets into complete PSI
//! sections, validates them (CRC-32, consistency across a table's numbered section set), and
//! decodes the four ISDB-T table types this crate knows about — [`BitTable`], [`CdtTable`],
//! [`LdtTable`], and [`SdttTable`] — firing a user callback only when a table's content has
//! actually changed.
//!
//! # Usage
//!
//! ```toml
//! [dependencies]
//! isdbt-psi = "~0.1.0"
//! ```
//!
//! A [`Decoder`] is scoped to one PID's worth of TS packets. Attach the table(s) you expect to
//! see on that PID, then push packets in order:
//!
//! ```
//! use isdbt_psi::{BitTable, Decoder};
//!
//! let mut decoder = Decoder::new(1024);
//! decoder
//!     .attach_bit(0xC4, 0x1234, |table: &BitTable| {
//!         println!("BIT updated: {} broadcasters", table.broadcasters.len());
//!     })
//!     .expect("attach");
//!
//! // for packet in stream_of_188_byte_packets {
//! //     decoder.push_packet(&packet);
//! // }
//! ```
//!
//! Out of scope at this layer (see `DESIGN.md`): the catalog of descriptor-tag-specific parsers
//! (a [`Descriptor`] is opaque `(tag, data)` bytes here), and PAT/PMT/NIT/etc. sibling tables —
//! their design is the same pattern specified for BIT/CDT/LDT/SDTT.

#![deny(missing_docs, unsafe_code)]

mod aggregator;
mod crc;
mod demux;
mod descriptor;
mod error;
mod reassembler;
mod section;
mod slice_reader;
mod tables;

#[cfg(test)]
mod test_support;

pub use descriptor::Descriptor;
pub use error::{Error, ErrorKind, Result};
pub use tables::{BitTable, Broadcaster, CdtTable, Content, Description, LdtTable, Schedule, SdttTable};

use demux::Demux;
use reassembler::Reassembler;

/// `table_id` of the Broadcaster Information Table. See [`Decoder::attach_bit`].
pub const BIT_TABLE_ID: u8 = tables::bit::TABLE_ID;
/// `table_id` of the Software Download Trigger Table. See [`Decoder::attach_sdtt`].
pub const SDTT_TABLE_ID: u8 = tables::sdtt::TABLE_ID;
/// `table_id` of the Common Data Table. See [`Decoder::attach_cdt`].
pub const CDT_TABLE_ID: u8 = tables::cdt::TABLE_ID;
/// `table_id` of the Linked Description Table. See [`Decoder::attach_ldt`].
pub const LDT_TABLE_ID: u8 = tables::ldt::TABLE_ID;

/// Reassembles TS packets for one PID into PSI sections and routes them to attached table
/// decoders.
///
/// Scheduling model is single-threaded and caller-driven (`SPEC_FULL.md` §5): there is no
/// internal event loop, and any table callback that fires as a result of a
/// [`Decoder::push_packet`] call does so synchronously, before that call returns. A `Decoder` is
/// not meant to be shared across threads concurrently without external synchronization.
///
/// Multiple decoders on independent PIDs run independently; routing packets to the correct
/// handle per PID is the caller's responsibility, same as the grounding crate's own
/// `MpegTsParser` leaves PID demultiplexing to its caller.
pub struct Decoder {
    reassembler: Reassembler,
    demux: Demux,
}

impl Decoder {
    /// Builds a decoder whose reassembled sections are bounded to `section_max_size` bytes.
    ///
    /// Use 1024 for BIT/LDT/SDTT-only PIDs, or 4096 if a CDT (which may carry a large opaque
    /// `data_module_byte[]`) is expected on this PID.
    pub fn new(section_max_size: usize) -> Self {
        Self {
            reassembler: Reassembler::new(section_max_size),
            demux: Demux::new(),
        }
    }

    /// Feeds one 188-byte TS packet through reassembly.
    ///
    /// Any section completed as a result is routed to its attached subtable decoder; if that
    /// completes the table's full section set with a changed content fingerprint, the decoder's
    /// callback fires before this call returns.
    ///
    /// Returns whether the packet was structurally acceptable (carried the 0x47 sync byte).
    /// Duplicate or out-of-sequence packets are still "acceptable" in this sense — they are
    /// handled by the continuity policy rather than rejected outright.
    pub fn push_packet(&mut self, packet: &[u8; 188]) -> bool {
        let demux = &mut self.demux;
        self.reassembler
            .push_packet(packet, |section, discontinuity| {
                demux.dispatch(section, discontinuity)
            })
    }

    /// Attaches a [`BitTable`] decoder for `(table_id, extension)`, where `extension` carries
    /// `original_network_id`.
    ///
    /// `callback` fires with the newly decoded table whenever its content fingerprint changes.
    /// Returns [`ErrorKind::AlreadyAttached`] if a decoder is already registered for this key.
    pub fn attach_bit(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&BitTable) + 'static,
    ) -> Result<()> {
        self.demux.attach_bit(table_id, extension, callback)
    }

    /// Attaches a [`CdtTable`] decoder for `(table_id, extension)`, where `extension` carries
    /// `download_data_id`.
    pub fn attach_cdt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&CdtTable) + 'static,
    ) -> Result<()> {
        self.demux.attach_cdt(table_id, extension, callback)
    }

    /// Attaches an [`LdtTable`] decoder for `(table_id, extension)`, where `extension` carries
    /// `original_service_id`.
    pub fn attach_ldt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&LdtTable) + 'static,
    ) -> Result<()> {
        self.demux.attach_ldt(table_id, extension, callback)
    }

    /// Attaches an [`SdttTable`] decoder for `(table_id, extension)`, where `extension` carries
    /// `(maker_id << 8) | model_id`.
    pub fn attach_sdtt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&SdttTable) + 'static,
    ) -> Result<()> {
        self.demux.attach_sdtt(table_id, extension, callback)
    }

    /// Detaches whatever subtable decoder is registered for `(table_id, extension)`.
    ///
    /// Returns whether a decoder was present. Releases the decoder's building record and
    /// buffered sections via ordinary `Drop`.
    pub fn detach(&mut self, table_id: u8, extension: u16) -> bool {
        self.demux.detach(table_id, extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::{BitTable, Broadcaster};

    fn packet_with_payload(cc: u8, pusi: bool, payload: &[u8]) -> [u8; 188] {
        let mut packet = [0xFFu8; 188];
        packet[0] = 0x47;
        packet[1] = if pusi { 0x40 } else { 0x00 };
        packet[2] = 0x30;
        packet[3] = 0x10 | (cc & 0x0F);
        let mut pos = 4;
        if pusi {
            packet[pos] = 0; // pointer_field = 0
            pos += 1;
        }
        let n = payload.len().min(188 - pos);
        packet[pos..pos + n].copy_from_slice(&payload[..n]);
        packet
    }

    #[test]
    fn end_to_end_single_section_bit_fires_once() {
        let mut table = BitTable::new(0x1234, 3);
        table.add_descriptor(Descriptor::new(0xDE, smallvec::smallvec![0xAA, 0xBB]));
        let mut broadcaster = Broadcaster::new(0x07);
        broadcaster.add_descriptor(Descriptor::new(0xCD, smallvec::smallvec![0x00]));
        table.add_broadcaster(broadcaster);

        let sections = table.generate_sections();
        assert_eq!(sections.len(), 1);

        let expected_descriptors = table.descriptors.clone();
        let expected_broadcasters = table.broadcasters.clone();

        let mut decoder = Decoder::new(1024);
        let count = std::rc::Rc::new(std::cell::RefCell::new(0));
        let count_clone = count.clone();
        decoder
            .attach_bit(0xC4, 0x1234, move |got: &BitTable| {
                assert_eq!(got.descriptors, expected_descriptors);
                assert_eq!(got.broadcasters, expected_broadcasters);
                *count_clone.borrow_mut() += 1;
            })
            .unwrap();

        let packet = packet_with_payload(5, true, &sections[0]);
        assert!(decoder.push_packet(&packet));
        assert_eq!(*count.borrow(), 1);

        // Re-pushing the identical section must not re-fire the callback.
        let packet2 = packet_with_payload(6, true, &sections[0]);
        decoder.push_packet(&packet2);
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn attach_rejects_duplicate_table_extension_pair() {
        let mut decoder = Decoder::new(1024);
        decoder.attach_bit(0xC4, 0x1, |_| {}).unwrap();
        let err = decoder.attach_bit(0xC4, 0x1, |_| {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyAttached);
    }

    #[test]
    fn detach_then_reattach_is_allowed() {
        let mut decoder = Decoder::new(1024);
        decoder.attach_bit(0xC4, 0x1, |_| {}).unwrap();
        assert!(decoder.detach(0xC4, 0x1));
        decoder.attach_bit(0xC4, 0x1, |_| {}).unwrap();
    }

    #[test]
    fn push_packet_rejects_non_ts_packet() {
        let mut decoder = Decoder::new(1024);
        let mut packet = [0u8; 188];
        packet[0] = 0x00;
        assert!(!decoder.push_packet(&packet));
    }
}
