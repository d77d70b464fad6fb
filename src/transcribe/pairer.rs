use crate::error::{LibResult, UnpairedNoteOffSnafu};
use log::warn;
use std::collections::BTreeMap;

/// A sounding note recovered from a note-on/note-off pair: its tick span and its pitch.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MidiNote {
    /// The tick at which the note starts.
    pub start: u64,
    /// The tick at which the note ends. Always after `start` once placed.
    pub end: u64,
    /// The MIDI note number.
    pub pitch: u8,
}

impl MidiNote {
    /// Snap the note to a grid of `grid` ticks, rounding each end to the nearest line. A note
    /// that would be rounded away keeps one grid step so that it does not vanish.
    pub fn quantized(&self, grid: u64) -> MidiNote {
        if grid == 0 {
            return *self;
        }
        let snap = |ticks: u64| (ticks + grid / 2) / grid * grid;
        let start = snap(self.start);
        let mut end = snap(self.end);
        if end <= start {
            end = start + grid;
        }
        MidiNote {
            start,
            end,
            pitch: self.pitch,
        }
    }
}

/// Pairs note-on and note-off messages into [`MidiNote`]s, one track at a time. Keeps the
/// running tick position and the set of currently sounding pitches with their start ticks.
#[derive(Debug, Default)]
pub(crate) struct EventPairer {
    position: u64,
    active: BTreeMap<u8, u64>,
}

impl EventPairer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Advance the running position by a message's delta-time.
    pub(crate) fn advance(&mut self, delta_time: u32) {
        self.position += u64::from(delta_time);
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// A note starts sounding now. A second note-on for a pitch that is already sounding
    /// restarts it.
    pub(crate) fn note_on(&mut self, note: u8) {
        self.active.insert(note, self.position);
    }

    /// A note stops sounding now, completing a pair.
    pub(crate) fn note_off(&mut self, note: u8, track: usize) -> LibResult<MidiNote> {
        match self.active.remove(&note) {
            Some(start) => Ok(MidiNote {
                start,
                end: self.position,
                pitch: note,
            }),
            None => UnpairedNoteOffSnafu { track, note }.fail(),
        }
    }

    /// The track is over; anything still sounding was never terminated and is dropped.
    pub(crate) fn finish(&mut self, track: usize) {
        for (note, start) in std::mem::take(&mut self.active) {
            warn!(
                "track {}: note {} started at tick {} was never ended, dropping it",
                track, note, start
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LibError;

    #[test]
    fn pairs_in_note_off_order() {
        let mut pairer = EventPairer::new();
        pairer.note_on(60);
        pairer.advance(96);
        pairer.note_on(64);
        pairer.advance(96);
        assert_eq!(192, pairer.position());
        let first = pairer.note_off(64, 1).unwrap();
        assert_eq!(
            MidiNote {
                start: 96,
                end: 192,
                pitch: 64
            },
            first
        );
        let second = pairer.note_off(60, 1).unwrap();
        assert_eq!(
            MidiNote {
                start: 0,
                end: 192,
                pitch: 60
            },
            second
        );
    }

    #[test]
    fn unpaired_note_off_is_an_error() {
        let mut pairer = EventPairer::new();
        let result = pairer.note_off(60, 2);
        assert!(matches!(
            result,
            Err(LibError::UnpairedNoteOff { track: 2, note: 60 })
        ));
    }

    #[test]
    fn restarted_pitch_keeps_the_later_start() {
        let mut pairer = EventPairer::new();
        pairer.note_on(60);
        pairer.advance(10);
        pairer.note_on(60);
        pairer.advance(10);
        let note = pairer.note_off(60, 1).unwrap();
        assert_eq!(10, note.start);
        assert_eq!(20, note.end);
    }

    #[test]
    fn finish_drops_dangling_notes() {
        let mut pairer = EventPairer::new();
        pairer.note_on(60);
        pairer.finish(1);
        assert!(pairer.note_off(60, 1).is_err());
    }

    #[test]
    fn quantization_snaps_to_the_grid() {
        let note = MidiNote {
            start: 13,
            end: 101,
            pitch: 60,
        };
        let snapped = note.quantized(24);
        assert_eq!(24, snapped.start);
        assert_eq!(96, snapped.end);
    }

    #[test]
    fn quantization_never_erases_a_note() {
        let note = MidiNote {
            start: 10,
            end: 11,
            pitch: 60,
        };
        let snapped = note.quantized(24);
        assert_eq!(0, snapped.start);
        assert_eq!(24, snapped.end);
    }
}
