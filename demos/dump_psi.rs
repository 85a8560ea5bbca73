//! Dumps decoded ISDB-T PSI tables from a raw TS capture, the way the grounding crate's own
//! `examples/dump.rs` dumps parsed TS packets.
//!
//! ```text
//! cargo run --example dump_psi -- capture.ts <pid-hex> <table-id-hex> <extension-hex>
//! ```
//!
//! `capture.ts` is a file of back-to-back 188-byte TS packets. Only packets on `pid` are fed to
//! the decoder; `table-id`/`extension` select which table kind to attach (0xC4 BIT, 0xC8 CDT,
//! 0xC7 LDT, 0xC3 SDTT) and which `(table_id, extension)` subtable to watch.

use isdbt_psi::{BitTable, CdtTable, Decoder, LdtTable, SdttTable};
use std::env;
use std::fs::File;
use std::io::Read;

const PACKET_LEN: usize = 188;

fn parse_hex(s: &str) -> u32 {
    let s = s.trim_start_matches("0x").trim_start_matches("0X");
    u32::from_str_radix(s, 16).expect("expected a hex number")
}

fn main() {
    pretty_env_logger::init();

    let mut args = env::args().skip(1);
    let path = args.next().expect("usage: dump_psi <file> <pid> <table_id> <extension>");
    let pid = parse_hex(&args.next().expect("missing <pid>")) as u16;
    let table_id = parse_hex(&args.next().expect("missing <table_id>")) as u8;
    let extension = parse_hex(&args.next().expect("missing <extension>")) as u16;

    let mut file = File::open(&path).expect("unable to open capture");
    let mut data = Vec::new();
    file.read_to_end(&mut data).expect("unable to read capture");

    let mut decoder = Decoder::new(if table_id == isdbt_psi::CDT_TABLE_ID {
        4096
    } else {
        1024
    });

    match table_id {
        id if id == isdbt_psi::BIT_TABLE_ID => decoder
            .attach_bit(table_id, extension, |table: &BitTable| {
                println!("{:#?}", table);
            })
            .expect("attach"),
        id if id == isdbt_psi::CDT_TABLE_ID => decoder
            .attach_cdt(table_id, extension, |table: &CdtTable| {
                println!("{:#?}", table);
            })
            .expect("attach"),
        id if id == isdbt_psi::LDT_TABLE_ID => decoder
            .attach_ldt(table_id, extension, |table: &LdtTable| {
                println!("{:#?}", table);
            })
            .expect("attach"),
        id if id == isdbt_psi::SDTT_TABLE_ID => decoder
            .attach_sdtt(table_id, extension, |table: &SdttTable| {
                println!("{:#?}", table);
            })
            .expect("attach"),
        other => panic!("unrecognized table_id 0x{:02x}", other),
    };

    for chunk in data.chunks(PACKET_LEN) {
        if chunk.len() < PACKET_LEN {
            break;
        }
        let packet: &[u8; PACKET_LEN] = chunk.try_into().unwrap();
        let this_pid = (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16;
        if this_pid != pid {
            continue;
        }
        decoder.push_packet(packet);
    }
}
