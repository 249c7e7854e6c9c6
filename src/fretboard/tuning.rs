// Tuning and string state
// Open-note table for six strings and the per-string occupancy board

use serde::{Deserialize, Serialize};

/// Number of strings on the instrument
pub const STRING_COUNT: usize = 6;

/// Standard guitar tuning, string 1 (high E) first
pub const STANDARD_TUNING: [u8; STRING_COUNT] = [64, 59, 55, 50, 45, 40];

/// Open-note value of each string, numbered 1 (highest) to 6 (lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tuning {
    open_notes: [u8; STRING_COUNT],
}

impl Default for Tuning {
    fn default() -> Self {
        Tuning::standard()
    }
}

impl Tuning {
    /// E2 A2 D3 G3 B3 E4
    pub fn standard() -> Self {
        Tuning {
            open_notes: STANDARD_TUNING,
        }
    }

    /// Build from open notes listed string 1 first
    pub fn from_open_notes(open_notes: [u8; STRING_COUNT]) -> Self {
        Tuning { open_notes }
    }

    /// Open note for a 1-based string number
    pub fn open_note(&self, string: u8) -> Option<u8> {
        let index = usize::from(string).checked_sub(1)?;
        self.open_notes.get(index).copied()
    }

    /// Fret that sounds `note` on `string`, if it lies within `0..=max_frets`
    pub fn fret_for(&self, string: u8, note: u8, max_frets: u8) -> Option<u8> {
        let open = self.open_note(string)?;
        let fret = note.checked_sub(open)?;
        (fret <= max_frets).then_some(fret)
    }

    /// Note sounded by `string` stopped at `fret`
    pub fn note_at(&self, string: u8, fret: u8) -> Option<u8> {
        self.open_note(string)?.checked_add(fret)
    }

    /// Strings in placement priority: thickest (6) to thinnest (1)
    pub fn placement_order() -> impl Iterator<Item = u8> {
        (1..=STRING_COUNT as u8).rev()
    }
}

/// What a single string is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StringSlot {
    #[default]
    Empty,
    Sounding(u8),
}

/// Occupancy of all six strings during one conversion
///
/// Each string holds at most one note. Lookups scan strings 6 down to 1, the
/// same order used for placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StringBoard {
    slots: [StringSlot; STRING_COUNT],
}

impl StringBoard {
    pub fn new() -> Self {
        StringBoard::default()
    }

    /// Slot for a 1-based string number
    pub fn slot(&self, string: u8) -> Option<StringSlot> {
        let index = usize::from(string).checked_sub(1)?;
        self.slots.get(index).copied()
    }

    pub fn is_free(&self, string: u8) -> bool {
        self.slot(string) == Some(StringSlot::Empty)
    }

    /// Mark `string` as sounding `note`; returns false if it was not free
    pub fn occupy(&mut self, string: u8, note: u8) -> bool {
        if !self.is_free(string) {
            return false;
        }
        self.slots[usize::from(string) - 1] = StringSlot::Sounding(note);
        true
    }

    /// Free the first string (6 down to 1) sounding `note` and return its number
    pub fn release(&mut self, note: u8) -> Option<u8> {
        let string = Tuning::placement_order()
            .find(|&s| self.slot(s) == Some(StringSlot::Sounding(note)))?;
        self.slots[usize::from(string) - 1] = StringSlot::Empty;
        Some(string)
    }

    /// Number of strings currently sounding
    pub fn sounding(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, StringSlot::Sounding(_)))
            .count()
    }
}
