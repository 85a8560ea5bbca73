use crate::crc;
use crate::section::PsiSection;
use log::{debug, warn};
use modular_bitfield_msb::prelude::*;

/// Link-layer header at the start of every 188-byte MPEG-TS packet, matching the grounding
/// crate's own `PacketHeader` bitfield bit-for-bit.
#[bitfield]
#[derive(Debug, Clone, Copy)]
pub(crate) struct PacketHeader {
    pub sync_byte: B8,
    pub tei: bool,
    pub pusi: bool,
    pub priority: bool,
    pub pid: B13,
    #[skip]
    pub tsc: B2,
    pub has_adaptation_field: bool,
    pub has_payload: bool,
    pub continuity_counter: B4,
}

const SYNC_BYTE: u8 = 0x47;
const PACKET_LEN: usize = 188;

struct InProgressSection {
    buf: Vec<u8>,
    need: usize,
    complete_header: bool,
}

impl InProgressSection {
    fn new() -> Self {
        Self {
            buf: Vec::with_capacity(16),
            need: 3,
            complete_header: false,
        }
    }

    /// Appends `bytes` and deducts them from `need`. `bytes.len()` must be `<= need`; callers
    /// are responsible for splitting a chunk at the `need` boundary first (see
    /// [`Reassembler::feed_need`]), since a chunk that ran past `need` would otherwise underflow
    /// this subtraction.
    fn append(&mut self, bytes: &[u8]) {
        debug_assert!(bytes.len() <= self.need);
        self.buf.extend_from_slice(bytes);
        self.need -= bytes.len();
    }
}

/// Reassembles a stream of 188-byte TS packets on one PID into complete PSI sections.
///
/// Owns the continuity-counter tracking, the latched discontinuity flag, and the in-progress
/// section buffer described in `SPEC_FULL.md` §4.2. A `Reassembler` is scoped to a single PID;
/// [`crate::Decoder`] owns exactly one, since the caller is responsible for routing packets to
/// the right handle per PID (`SPEC_FULL.md` §5).
pub(crate) struct Reassembler {
    section_max_size: usize,
    continuity_counter: Option<u8>,
    discontinuity: bool,
    current: Option<InProgressSection>,
}

impl Reassembler {
    pub(crate) fn new(section_max_size: usize) -> Self {
        Self {
            section_max_size,
            continuity_counter: None,
            discontinuity: false,
            current: None,
        }
    }

    /// Feeds one TS packet through reassembly, calling `on_section` for each completed,
    /// CRC-valid section.
    ///
    /// Returns whether the packet was structurally acceptable (sync byte present); duplicate or
    /// discontinuous packets are still "acceptable" in this sense, they are just handled
    /// specially rather than reassembled normally.
    pub(crate) fn push_packet(
        &mut self,
        packet: &[u8; PACKET_LEN],
        mut on_section: impl FnMut(PsiSection, bool),
    ) -> bool {
        if packet[0] != SYNC_BYTE {
            warn!("not a TS packet: bad sync byte 0x{:02x}", packet[0]);
            return false;
        }
        let header = PacketHeader::from_bytes([packet[1], packet[2], packet[3]]);

        if !header.has_payload() {
            return true;
        }

        if self.check_continuity_is_duplicate(header.continuity_counter()) {
            return true;
        }

        let mut pos = 4usize;
        if header.has_adaptation_field() {
            if pos >= PACKET_LEN {
                warn!("adaptation field flagged with no bytes remaining");
                return true;
            }
            let adaptation_length = packet[pos] as usize;
            pos += 1 + adaptation_length;
            if pos > PACKET_LEN {
                warn!("adaptation field length overruns packet");
                self.current = None;
                return true;
            }
        }

        let mut new_pos: Option<usize> = None;
        let mut cursor = pos;
        if header.pusi() {
            if cursor >= PACKET_LEN {
                return true;
            }
            let pointer = packet[cursor] as usize;
            let fill_start = (cursor + 1).min(PACKET_LEN);
            let fill_end = (fill_start + pointer).min(PACKET_LEN);
            if self.current.is_some() {
                self.feed_need(&packet[fill_start..fill_end], &mut on_section);
                if self.current.is_some() {
                    // The pointer field's fill region was supposed to complete the pending
                    // section (per its `pointer` byte count) but didn't — an orphaned partial.
                    // Discard it rather than let the next loop iteration append the *new*
                    // section's bytes onto it.
                    warn!("pointer field did not complete pending section; discarding");
                    self.current = None;
                }
            }
            cursor = fill_end;
            new_pos = Some(cursor);
        }

        loop {
            if self.current.is_none() {
                match new_pos {
                    Some(p) if p == cursor => {
                        self.current = Some(InProgressSection::new());
                        new_pos = None;
                    }
                    _ => break,
                }
            }
            if cursor >= PACKET_LEN {
                break;
            }
            let avail = PACKET_LEN - cursor;
            let need = self.current.as_ref().unwrap().need;
            if avail < need {
                let bytes = &packet[cursor..PACKET_LEN];
                self.current.as_mut().unwrap().append(bytes);
                break;
            }
            let bytes = &packet[cursor..cursor + need];
            cursor += need;
            let section_ready = self.feed_need(bytes, &mut on_section);
            if self.current.is_some() {
                // Header just completed; body still pending, loop around for more bytes.
                continue;
            }
            if section_ready {
                if cursor < PACKET_LEN {
                    if packet[cursor] != 0xFF {
                        new_pos = Some(cursor);
                        continue;
                    } else {
                        break;
                    }
                } else {
                    break;
                }
            }
            // Section discarded (over-long); resync only if this packet also set new_pos.
        }

        true
    }

    /// Updates continuity tracking for one payload-bearing packet; returns `true` if the packet
    /// is a duplicate of the previous one and should be dropped without further processing.
    fn check_continuity_is_duplicate(&mut self, cc: u8) -> bool {
        match self.continuity_counter {
            None => {
                self.continuity_counter = Some(cc);
                false
            }
            Some(prev) => {
                if cc == prev && !self.discontinuity {
                    debug!("duplicate TS packet, CC {}", cc);
                    return true;
                }
                if cc != prev {
                    let expected = (prev + 1) % 16;
                    if cc != expected {
                        warn!("TS discontinuity: expected CC {}, got {}", expected, cc);
                        self.discontinuity = true;
                        self.current = None;
                    }
                }
                self.continuity_counter = Some(cc);
                false
            }
        }
    }

    /// Feeds `bytes` into the in-progress section, consuming only as much of it as the section
    /// actually needs.
    ///
    /// Unlike a single `need`-sized slice, `bytes` here may be shorter than `need` (a short
    /// fill that leaves the section still pending) or may run past the current `need` and into
    /// what becomes the body once the header is parsed (the pointer-fill region can hand over a
    /// straddling section's remaining header bytes *and* its whole body in one call). This feeds
    /// the section in `need`-sized increments internally, re-reading `need` after each one, so a
    /// single call can cross the header→body transition without ever handing `append` more bytes
    /// than it currently needs.
    ///
    /// Returns `true` if a section was completed and handed to `on_section` (or discarded after
    /// completion, e.g. for a bad CRC) — i.e. `self.current` is `None` on return because a
    /// section-worth of bytes was fully consumed. Returns `false` if `bytes` ran out first,
    /// leaving a (possibly further-along) pending section in `self.current`, or if the section
    /// was discarded mid-parse for being over-long.
    fn feed_need(
        &mut self,
        mut bytes: &[u8],
        on_section: &mut impl FnMut(PsiSection, bool),
    ) -> bool {
        loop {
            let need = match self.current.as_ref() {
                Some(cur) => cur.need,
                None => return false,
            };

            if need == 0 {
                let finished = self.current.take().unwrap();
                self.finalize_section(finished, on_section);
                return true;
            }

            if bytes.is_empty() {
                return false;
            }

            let take = need.min(bytes.len());
            let (chunk, rest) = bytes.split_at(take);
            bytes = rest;
            let cur = self.current.as_mut().unwrap();
            cur.append(chunk);

            if !cur.complete_header && cur.need == 0 {
                cur.complete_header = true;
                let length = (((cur.buf[1] & 0x0F) as usize) << 8) | cur.buf[2] as usize;
                if length > self.section_max_size.saturating_sub(3) {
                    warn!(
                        "section too long: declared length {} exceeds budget",
                        length
                    );
                    self.current = None;
                    return false;
                }
                cur.need = length;
            }
        }
    }

    fn finalize_section(
        &mut self,
        section: InProgressSection,
        on_section: &mut impl FnMut(PsiSection, bool),
    ) {
        let buf = section.buf;
        if buf.len() < 3 {
            return;
        }
        let table_id = buf[0];
        if table_id == 0x72 {
            warn!("rejected table_id 0x72");
            return;
        }
        let syntax_indicator = buf[1] & 0x80 != 0;
        let private_indicator = buf[1] & 0x40 != 0;

        let (extension, version, current_next, number, last_number, payload_start, payload_end);
        if syntax_indicator {
            if buf.len() < 8 {
                warn!("short long-form section header");
                return;
            }
            extension = u16::from_be_bytes([buf[3], buf[4]]);
            version = (buf[5] >> 1) & 0x1F;
            current_next = buf[5] & 0x1 != 0;
            number = buf[6];
            last_number = buf[7];
            payload_start = 8;
            payload_end = buf.len().saturating_sub(4);
        } else {
            extension = 0;
            version = 0;
            current_next = true;
            number = 0;
            last_number = 0;
            payload_start = 3;
            payload_end = buf.len();
        }

        let valid = if table_id == 0x70 {
            true
        } else if syntax_indicator {
            if payload_end < payload_start || buf.len() < payload_end + 4 {
                false
            } else {
                let expected = u32::from_be_bytes(
                    buf[payload_end..payload_end + 4].try_into().unwrap(),
                );
                crc::compute(&buf[..payload_end]) == expected
            }
        } else {
            true
        };

        if !valid {
            warn!("Bad CRC_32 table 0x{:02x}", table_id);
            return;
        }

        let disc = self.discontinuity;
        self.discontinuity = false;
        on_section(
            PsiSection {
                bytes: buf,
                table_id,
                syntax_indicator,
                private_indicator,
                extension,
                version,
                current_next,
                number,
                last_number,
                payload_start,
                payload_end,
            },
            disc,
        );
    }
}
