//! Dispatches completed PSI sections to the subtable decoder registered for their
//! `(table_id, extension)` key.
//!
//! Mirrors the grounding crate's `PayloadUnit`/`PayloadUnitObject` pattern (`payload_unit.rs`):
//! a closed, `enum_dispatch`-driven sum type stands in for the source's parallel family of
//! `<tbl>_decoder_t` structs, per the redesign note in `SPEC_FULL.md` §9.

use crate::error::{Error, ErrorKind};
use crate::section::PsiSection;
use crate::tables::{BitTable, CdtTable, LdtTable, SdttTable, SubtableState};
use enum_dispatch::enum_dispatch;
use log::debug;
use std::collections::HashMap;

#[enum_dispatch]
trait SubtableGather {
    fn gather(&mut self, section: PsiSection, discontinuity: bool);
}

impl SubtableGather for SubtableState<BitTable> {
    fn gather(&mut self, section: PsiSection, discontinuity: bool) {
        SubtableState::gather(self, section, discontinuity)
    }
}

impl SubtableGather for SubtableState<CdtTable> {
    fn gather(&mut self, section: PsiSection, discontinuity: bool) {
        SubtableState::gather(self, section, discontinuity)
    }
}

impl SubtableGather for SubtableState<LdtTable> {
    fn gather(&mut self, section: PsiSection, discontinuity: bool) {
        SubtableState::gather(self, section, discontinuity)
    }
}

impl SubtableGather for SubtableState<SdttTable> {
    fn gather(&mut self, section: PsiSection, discontinuity: bool) {
        SubtableState::gather(self, section, discontinuity)
    }
}

#[enum_dispatch(SubtableGather)]
enum SubtableEntry {
    Bit(SubtableState<BitTable>),
    Cdt(SubtableState<CdtTable>),
    Ldt(SubtableState<LdtTable>),
    Sdtt(SubtableState<SdttTable>),
}

/// Routes sections to the subtable decoder attached for their `(table_id, extension)` key.
///
/// Entries are owned outright: detaching (or dropping the demux, and with it the owning
/// [`crate::Decoder`]) drops the entry's `SubtableState`, which releases its building record and
/// buffered sections through ordinary `Drop` — there is no explicit detach callback to invoke, as
/// the source requires.
#[derive(Default)]
pub(crate) struct Demux {
    entries: HashMap<(u8, u16), SubtableEntry>,
}

impl Demux {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn attach(
        &mut self,
        table_id: u8,
        extension: u16,
        entry: SubtableEntry,
    ) -> Result<(), Error> {
        if self.entries.contains_key(&(table_id, extension)) {
            return Err(Error::new(0, ErrorKind::AlreadyAttached));
        }
        self.entries.insert((table_id, extension), entry);
        Ok(())
    }

    pub(crate) fn attach_bit(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&BitTable) + 'static,
    ) -> Result<(), Error> {
        self.attach(
            table_id,
            extension,
            SubtableEntry::Bit(SubtableState::new(callback)),
        )
    }

    pub(crate) fn attach_cdt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&CdtTable) + 'static,
    ) -> Result<(), Error> {
        self.attach(
            table_id,
            extension,
            SubtableEntry::Cdt(SubtableState::new(callback)),
        )
    }

    pub(crate) fn attach_ldt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&LdtTable) + 'static,
    ) -> Result<(), Error> {
        self.attach(
            table_id,
            extension,
            SubtableEntry::Ldt(SubtableState::new(callback)),
        )
    }

    pub(crate) fn attach_sdtt(
        &mut self,
        table_id: u8,
        extension: u16,
        callback: impl FnMut(&SdttTable) + 'static,
    ) -> Result<(), Error> {
        self.attach(
            table_id,
            extension,
            SubtableEntry::Sdtt(SubtableState::new(callback)),
        )
    }

    /// Removes the entry for `(table_id, extension)`, if any. Returns whether one was present.
    pub(crate) fn detach(&mut self, table_id: u8, extension: u16) -> bool {
        self.entries.remove(&(table_id, extension)).is_some()
    }

    /// Forwards `section` to its registered subtable entry; unrouted sections are simply dropped.
    pub(crate) fn dispatch(&mut self, section: PsiSection, discontinuity: bool) {
        match self.entries.get_mut(&(section.table_id, section.extension)) {
            Some(entry) => entry.gather(section, discontinuity),
            None => debug!(
                "no subtable attached for table_id 0x{:02x} extension 0x{:04x}",
                section.table_id, section.extension
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::bit::TABLE_ID as BIT_TABLE_ID;
    use crate::test_support::parse_section;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn attach_rejects_duplicate_key() {
        let mut demux = Demux::new();
        demux.attach_bit(BIT_TABLE_ID, 0x1, |_| {}).unwrap();
        let err = demux.attach_bit(BIT_TABLE_ID, 0x1, |_| {}).unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyAttached);
    }

    #[test]
    fn detach_reports_whether_an_entry_was_present() {
        let mut demux = Demux::new();
        assert!(!demux.detach(BIT_TABLE_ID, 0x1));
        demux.attach_bit(BIT_TABLE_ID, 0x1, |_| {}).unwrap();
        assert!(demux.detach(BIT_TABLE_ID, 0x1));
        assert!(!demux.detach(BIT_TABLE_ID, 0x1));
    }

    #[test]
    fn unrouted_section_is_dropped_silently() {
        let mut demux = Demux::new();
        let bytes = crate::tables::bit::BitTable::new(0x1, 0).generate_sections();
        let section = parse_section(&bytes[0]);
        demux.dispatch(section, false); // no attached entry; must not panic
    }

    #[test]
    fn routes_a_completed_section_to_its_attached_callback() {
        let fired = Rc::new(RefCell::new(0));
        let fired_clone = fired.clone();
        let mut demux = Demux::new();
        demux
            .attach_bit(BIT_TABLE_ID, 0x1234, move |_table| {
                *fired_clone.borrow_mut() += 1;
            })
            .unwrap();

        let table = crate::tables::bit::BitTable::new(0x1234, 0);
        let bytes = table.generate_sections();
        let section = parse_section(&bytes[0]);
        demux.dispatch(section, false);
        assert_eq!(*fired.borrow(), 1);
    }
}
