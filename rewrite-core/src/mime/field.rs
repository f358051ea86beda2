//! MIME field and field block.
//!
//! Grounded in `MIMEField`/`MIMEFieldBlockImpl` in
//! `original_source/proxy/hdrs/MIME.h`.

use crate::heap::StrRef;
use crate::wks::WksIdx;

/// Field slot lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Empty,
    Detached,
    Live,
    Deleted,
}

/// Per-field flag bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFlags(pub u8);

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags(0);
    pub const DUP_HEAD: FieldFlags = FieldFlags(1 << 0);
    pub const COOKED: FieldFlags = FieldFlags(1 << 1);

    pub fn contains(self, other: FieldFlags) -> bool {
        (self.0 & other.0) == other.0
    }
    pub fn set(&mut self, other: FieldFlags) {
        self.0 |= other.0;
    }
    pub fn clear(&mut self, other: FieldFlags) {
        self.0 &= !other.0;
    }
}

/// Index of a field slot within the first field block, used by the
/// slot accelerator. `UNKNOWN` (15) means "not in the first block, or not
/// tracked".
pub const SLOTNUM_UNKNOWN: u8 = 15;

#[derive(Debug, Clone)]
pub struct MimeField {
    pub wks_idx: WksIdx,
    pub name: StrRef,
    pub value: StrRef,
    /// Block + slot index of the next field in the same dup chain
    /// (insertion order, may live in a different block). `None`
    /// terminates the chain.
    pub next_dup: Option<(crate::heap::ObjHandle, u16)>,
    pub readiness: Readiness,
    pub flags: FieldFlags,
}

impl MimeField {
    fn empty() -> Self {
        Self {
            wks_idx: crate::wks::NOT_WKS,
            name: StrRef::default(),
            value: StrRef::default(),
            next_dup: None,
            readiness: Readiness::Empty,
            flags: FieldFlags::NONE,
        }
    }

    pub fn is_live(&self) -> bool {
        self.readiness == Readiness::Live
    }

    pub fn is_dup_head(&self) -> bool {
        self.flags.contains(FieldFlags::DUP_HEAD)
    }

    pub fn is_cooked(&self) -> bool {
        self.flags.contains(FieldFlags::COOKED)
    }
}

/// Fixed-capacity (16 slots) block of field slots; blocks chain via `next`.
/// Deleted slots are marked and skipped, never compacted (spec.md §3).
pub const FIELD_BLOCK_SLOTS: usize = 16;

#[derive(Debug, Clone)]
pub struct FieldBlock {
    slots: Vec<MimeField>,
    /// High-water mark: slots `[0, freetop)` have been allocated at least
    /// once (though some may now be `Deleted`).
    freetop: usize,
    pub next: Option<crate::heap::ObjHandle>,
}

impl FieldBlock {
    pub fn new() -> Self {
        Self {
            slots: (0..FIELD_BLOCK_SLOTS).map(|_| MimeField::empty()).collect(),
            freetop: 0,
            next: None,
        }
    }

    pub fn capacity(&self) -> usize {
        FIELD_BLOCK_SLOTS
    }

    pub fn is_full(&self) -> bool {
        self.freetop >= FIELD_BLOCK_SLOTS
    }

    /// Allocates the next free slot, returning its index within this block.
    pub fn alloc_slot(&mut self) -> Option<u16> {
        if self.is_full() {
            return None;
        }
        let idx = self.freetop;
        self.freetop += 1;
        Some(idx as u16)
    }

    pub fn slot(&self, idx: u16) -> &MimeField {
        &self.slots[idx as usize]
    }

    pub fn slot_mut(&mut self, idx: u16) -> &mut MimeField {
        &mut self.slots[idx as usize]
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (u16, &MimeField)> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_live())
            .map(|(i, f)| (i as u16, f))
    }

    pub fn iter_all(&self) -> impl Iterator<Item = (u16, &MimeField)> {
        self.slots.iter().enumerate().map(|(i, f)| (i as u16, f))
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|f| f.is_live()).count()
    }

    pub fn all_deleted(&self) -> bool {
        self.freetop > 0 && self.slots[..self.freetop].iter().all(|f| !f.is_live())
    }
}

impl Default for FieldBlock {
    fn default() -> Self {
        Self::new()
    }
}
