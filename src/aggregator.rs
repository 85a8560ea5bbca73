use crate::section::PsiSection;
use log::debug;

/// Buffers numbered sections of one table instance until `0..=last_section_number` are all
/// present.
///
/// Modeled as an index-based slot array (`SPEC_FULL.md` §9 redesign note) rather than the
/// source's pointer-linked section list: ownership of each section is unambiguous and there is
/// no manual free step.
pub(crate) struct SectionAggregator {
    slots: Box<[Option<PsiSection>; 256]>,
    last_section_number: u8,
}

impl SectionAggregator {
    pub(crate) fn new() -> Self {
        Self {
            slots: Box::new(std::array::from_fn(|_| None)),
            last_section_number: 0,
        }
    }

    /// Clears all slots and starts tracking a table instance with the given section count.
    pub(crate) fn reset(&mut self, last_section_number: u8) {
        self.clear();
        self.last_section_number = last_section_number;
    }

    pub(crate) fn last_section_number(&self) -> u8 {
        self.last_section_number
    }

    /// Stores `section` at its `number` slot, overwriting any previous occupant.
    ///
    /// Returns whether a section already occupied that slot (informational only).
    pub(crate) fn add(&mut self, section: PsiSection) -> bool {
        let idx = section.number as usize;
        let overwrite = self.slots[idx].is_some();
        if overwrite {
            debug!("overwrite section number {}", idx);
        }
        self.slots[idx] = Some(section);
        overwrite
    }

    /// True iff slots `0..=last_section_number` are all occupied, with no gaps.
    pub(crate) fn completed(&self) -> bool {
        (0..=self.last_section_number).all(|n| self.slots[n as usize].is_some())
    }

    /// Returns the completed section set in order, `0..=last_section_number`.
    ///
    /// Panics if [`Self::completed`] is not true; callers must check first.
    pub(crate) fn ordered_sections(&self) -> Vec<&PsiSection> {
        (0..=self.last_section_number)
            .map(|n| self.slots[n as usize].as_ref().expect("aggregator not completed"))
            .collect()
    }

    pub(crate) fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }
}
