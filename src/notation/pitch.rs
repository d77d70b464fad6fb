use std::fmt;
use std::str::FromStr;

/// The note names of the twelve pitch classes, sharp-spelled. Enharmonics and key-signature
/// aware spelling are out of scope, so every black key is a `-is`.
const NOTE_NAMES: [&str; 12] = [
    "c", "cis", "d", "dis", "e", "f", "fis", "g", "gis", "a", "ais", "b",
];

/// LilyPond's unmarked octave runs from MIDI 48; middle C (MIDI 60) is `c'`.
const UNMARKED_OCTAVE: i16 = 4;

/// The reference pitch a `\relative` block starts from: middle C.
pub(crate) const RELATIVE_BASE: u8 = 60;

/// A MIDI note number in 0-127. Ordered and compared by number.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Pitch(u8);

impl Pitch {
    /// Silently clamps values above the MIDI range.
    pub fn new(note_number: u8) -> Self {
        Self(note_number.min(127))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// The absolute spelling: note name plus octave marks, `'` above the unmarked octave and
    /// `,` below it. MIDI 60 renders as `c'`, MIDI 0 as `c,,,,`.
    pub fn absolute(&self) -> String {
        let name = NOTE_NAMES[usize::from(self.0 % 12)];
        let octave = i16::from(self.0 / 12) - UNMARKED_OCTAVE;
        let mark = if octave > 0 { '\'' } else { ',' };
        let marks: String = std::iter::repeat(mark)
            .take(octave.unsigned_abs() as usize)
            .collect();
        format!("{}{}", name, marks)
    }

    /// The relative spelling against a reference pitch. LilyPond places an unmarked note
    /// within a fourth of the reference; one `'` or `,` steps the octave. At most one mark is
    /// ever emitted.
    pub fn relative(&self, reference: Pitch) -> String {
        let name = NOTE_NAMES[usize::from(self.0 % 12)];
        let distance = i16::from(self.0) - i16::from(reference.0);
        let marks = if distance < -5 {
            ","
        } else if distance > 6 {
            "'"
        } else {
            ""
        };
        format!("{}{}", name, marks)
    }
}

impl fmt::Display for Pitch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.absolute())
    }
}

impl FromStr for Pitch {
    type Err = String;

    /// Parses the absolute spelling produced by [`Pitch::absolute`].
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let text = input.trim();
        let name_end = text
            .find(|c| c == '\'' || c == ',')
            .unwrap_or(text.len());
        let (name, marks) = text.split_at(name_end);
        let class = NOTE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .ok_or_else(|| format!("unknown note name '{}'", name))?;
        let mut octave = UNMARKED_OCTAVE;
        for mark in marks.chars() {
            match mark {
                '\'' => octave += 1,
                ',' => octave -= 1,
                other => return Err(format!("unexpected octave mark '{}'", other)),
            }
        }
        let note_number = octave * 12 + class as i16;
        if !(0..=127).contains(&note_number) {
            return Err(format!("'{}' is outside the MIDI range", input));
        }
        Ok(Pitch::new(note_number as u8))
    }
}
