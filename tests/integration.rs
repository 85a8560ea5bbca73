//! End-to-end integration tests exercising the public API against full TS packet streams,
//! covering the scenarios from `SPEC_FULL.md` §8 that a single-layer unit test can't reach.

use isdbt_psi::{BitTable, Decoder, Descriptor, SdttTable};
use std::cell::RefCell;
use std::rc::Rc;

const PACKET_LEN: usize = 188;
const PID: u16 = 0x30;

/// Packs `payload` (one or more complete, back-to-back PSI sections) into a stream of 188-byte
/// TS packets on `PID`, starting continuity at `start_cc`, with the first packet's payload-unit
/// start pointing straight at the first section (no leading stuffing).
///
/// Returns the packets plus the continuity counter (mod 16) the next packetized payload on this
/// PID should continue from.
fn packetize(start_cc: u8, payload: &[u8]) -> (Vec<[u8; 188]>, u8) {
    let mut packets = Vec::new();
    let mut pos = 0usize;
    let mut cc = start_cc % 16;
    let mut first = true;
    while pos < payload.len() || first {
        let mut packet = [0xFFu8; PACKET_LEN];
        packet[0] = 0x47;
        packet[1] = if first { 0x40 } else { 0x00 } | ((PID >> 8) as u8 & 0x1F);
        packet[2] = (PID & 0xFF) as u8;
        packet[3] = 0x10 | (cc & 0x0F);
        let mut body_pos = 4;
        if first {
            packet[body_pos] = 0; // pointer_field
            body_pos += 1;
        }
        let room = PACKET_LEN - body_pos;
        let n = room.min(payload.len() - pos);
        packet[body_pos..body_pos + n].copy_from_slice(&payload[pos..pos + n]);
        pos += n;
        packets.push(packet);
        cc = (cc + 1) % 16;
        if first {
            first = false;
        }
        if pos >= payload.len() {
            break;
        }
    }
    (packets, cc)
}

fn concat_sections(sections: &[Vec<u8>]) -> Vec<u8> {
    sections.iter().flatten().copied().collect()
}

#[test]
fn multi_section_sdtt_fires_once_per_changed_version() {
    // 200 bare (no schedule, no descriptor) contents are 8 bytes each on the wire, forcing the
    // 1012-byte body budget to split them across exactly 2 sections, per `SPEC_FULL.md` §8
    // scenario 2.
    let mut table = SdttTable::new(0x0A0B, 0, 0x1, 0x2, 0x3);
    for i in 0..200u16 {
        table.add_content(isdbt_psi::Content::new(0x1, i, i + 1));
    }
    let sections = table.generate_sections();
    assert_eq!(sections.len(), 2);

    let mut decoder = Decoder::new(1024);
    let count = Rc::new(RefCell::new(0));
    let count_clone = count.clone();
    decoder
        .attach_sdtt(0xC3, 0x0A0B, move |_t: &SdttTable| {
            *count_clone.borrow_mut() += 1;
        })
        .unwrap();

    let (packets0, cc) = packetize(0, &sections[0]);
    for p in &packets0 {
        decoder.push_packet(p);
    }
    assert_eq!(*count.borrow(), 0, "no callback until both sections arrive");

    let (packets1, cc) = packetize(cc, &sections[1]);
    for p in &packets1 {
        decoder.push_packet(p);
    }
    assert_eq!(*count.borrow(), 1);

    // Re-push the identical two sections: no second callback.
    let both = concat_sections(&sections);
    let (repeat_packets, cc) = packetize(cc, &both);
    for p in &repeat_packets {
        decoder.push_packet(p);
    }
    assert_eq!(*count.borrow(), 1);

    // Bump the version: callback fires again.
    let mut bumped = SdttTable::new(0x0A0B, 1, 0x1, 0x2, 0x3);
    for i in 0..200u16 {
        bumped.add_content(isdbt_psi::Content::new(0x1, i, i + 1));
    }
    let bumped_sections = bumped.generate_sections();
    let bumped_bytes = concat_sections(&bumped_sections);
    let (bumped_packets, _cc) = packetize(cc, &bumped_bytes);
    for p in &bumped_packets {
        decoder.push_packet(p);
    }
    assert_eq!(*count.borrow(), 2);
}

#[test]
fn discontinuity_drops_in_progress_section_then_recovers() {
    let mut table = BitTable::new(0x42, 0);
    for i in 0..40u8 {
        let mut b = isdbt_psi::Broadcaster::new(i);
        b.add_descriptor(Descriptor::new(0x01, smallvec::smallvec![0xAA; 8]));
        table.add_broadcaster(b);
    }
    let sections = table.generate_sections();
    assert_eq!(sections.len(), 1);
    assert!(sections[0].len() > PACKET_LEN, "section must span packets for this test");

    let mut decoder = Decoder::new(1024);
    let count = Rc::new(RefCell::new(0));
    let count_clone = count.clone();
    decoder
        .attach_bit(0xC4, 0x42, move |_t: &BitTable| {
            *count_clone.borrow_mut() += 1;
        })
        .unwrap();

    let (packets, _cc) = packetize(0, &sections[0]);
    assert!(packets.len() >= 2);

    // Push only the first packet, leaving the section in progress.
    decoder.push_packet(&packets[0]);
    assert_eq!(*count.borrow(), 0);

    // Jump the continuity counter (skip ahead instead of incrementing by one): the in-progress
    // section must be discarded, not silently continued.
    let mut jumped = packets[1];
    jumped[3] = 0x10 | ((jumped[3] + 5) & 0x0F);
    decoder.push_packet(&jumped);
    assert_eq!(*count.borrow(), 0);

    // A fresh table on the same PID starts cleanly afterwards.
    let mut fresh_table = BitTable::new(0x99, 0);
    fresh_table.add_descriptor(Descriptor::new(0xAA, smallvec::smallvec![0x01]));
    let mut decoder2 = Decoder::new(1024);
    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    decoder2
        .attach_bit(0xC4, 0x99, move |_t: &BitTable| {
            *fired_clone.borrow_mut() = true;
        })
        .unwrap();
    let (fresh_packets, _cc) = packetize(0, &fresh_table.generate_sections()[0]);
    for p in &fresh_packets {
        decoder2.push_packet(p);
    }
    assert!(*fired.borrow());
}

#[test]
fn corrupted_crc_is_discarded_without_firing_callback() {
    let mut table = BitTable::new(0x7, 1);
    table.add_descriptor(Descriptor::new(0x01, smallvec::smallvec![0x01, 0x02]));
    let mut sections = table.generate_sections();
    assert_eq!(sections.len(), 1);
    let payload_start = 8;
    sections[0][payload_start] ^= 0xFF; // corrupt a payload byte, leaving the CRC trailer stale

    let mut decoder = Decoder::new(1024);
    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    decoder
        .attach_bit(0xC4, 0x7, move |_t: &BitTable| {
            *fired_clone.borrow_mut() = true;
        })
        .unwrap();

    let (packets, _cc) = packetize(0, &sections[0]);
    for p in &packets {
        decoder.push_packet(p);
    }
    assert!(!*fired.borrow());
}

#[test]
fn oversize_declared_length_is_rejected_and_next_section_still_decodes() {
    // Hand-craft a section whose declared length exceeds the 1024-byte budget, followed
    // (within the same pointer-field resync point) by a well-formed BIT section.
    let mut oversize = vec![0xC4u8, 0x8F, 0xFF]; // table_id, length = 0xFFF (way over budget)
    oversize.extend_from_slice(&[0u8; 50]);

    let mut good_table = BitTable::new(0x55, 0);
    good_table.add_descriptor(Descriptor::new(0x02, smallvec::smallvec![0x09]));
    let good_sections = good_table.generate_sections();

    let mut decoder = Decoder::new(1024);
    let fired = Rc::new(RefCell::new(false));
    let fired_clone = fired.clone();
    decoder
        .attach_bit(0xC4, 0x55, move |_t: &BitTable| {
            *fired_clone.borrow_mut() = true;
        })
        .unwrap();

    // First packet: pointer_field points straight at the malformed section, which is fatal only
    // to itself; push_packet must still return true (structurally acceptable packet).
    let mut packet = [0xFFu8; PACKET_LEN];
    packet[0] = 0x47;
    packet[1] = 0x40;
    packet[2] = (PID & 0xFF) as u8;
    packet[3] = 0x10;
    packet[4] = 0; // pointer_field
    packet[5..5 + oversize.len()].copy_from_slice(&oversize);
    assert!(decoder.push_packet(&packet));
    assert!(!*fired.borrow());

    // A subsequent, well-formed section on the same PID still decodes normally.
    let (good_packets, _cc) = packetize(1, &good_sections[0]);
    for p in &good_packets {
        decoder.push_packet(p);
    }
    assert!(*fired.borrow());
}
