use crate::error::LibResult;
use crate::notation::duration::{split_at_measures, Duration, Fraction};
use crate::notation::pitch::{Pitch, RELATIVE_BASE};
use std::io::Write;

/// Choices that affect the emitted text but not the structure of the score.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RenderSettings {
    /// Emit `\relative c'` blocks with windowed octave marks instead of absolute pitches.
    pub relative: bool,
    /// Omit a duration that repeats the previous note's duration.
    pub condense: bool,
}

/// A wrapper for any `Write` which carries the state that LilyPond text depends on: the
/// position within the current staff, the previous pitch (for relative octave entry), the
/// previous duration (for the duration-omission shorthand), and the measure length.
pub(crate) struct Typesetter<W: Write> {
    w: W,
    settings: RenderSettings,
    position: Fraction,
    previous_pitch: Option<Pitch>,
    previous_duration: Option<Duration>,
    measure: Fraction,
}

impl<W: Write> Write for Typesetter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.w.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.w.flush()
    }
}

impl<W: Write> Typesetter<W> {
    /// Create a new `Typesetter`. The measure length starts at a whole note, i.e. common time,
    /// until a time signature is rendered.
    pub(crate) fn new(w: W, settings: RenderSettings) -> Self {
        Self {
            w,
            settings,
            position: Fraction::new(0, 1),
            previous_pitch: None,
            previous_duration: None,
            measure: Fraction::new(1, 1),
        }
    }

    pub(crate) fn relative(&self) -> bool {
        self.settings.relative
    }

    pub(crate) fn position(&self) -> Fraction {
        self.position
    }

    pub(crate) fn set_position(&mut self, position: Fraction) {
        self.position = position;
    }

    pub(crate) fn set_measure(&mut self, measure: Fraction) {
        self.measure = measure;
    }

    /// Starting a staff resets everything that is local to a single music stream.
    pub(crate) fn reset_staff_state(&mut self) {
        self.position = Fraction::new(0, 1);
        self.previous_pitch = None;
        self.previous_duration = None;
    }

    /// Voices of a polyphonic block each start fresh with respect to the duration shorthand.
    pub(crate) fn clear_previous_duration(&mut self) {
        self.previous_duration = None;
    }

    /// True when the current position sits exactly on a measure line.
    pub(crate) fn at_measure_boundary(&self) -> bool {
        let zero = Fraction::new(0, 1);
        self.position > zero && self.position % self.measure == zero
    }

    /// The text of one pitch. In relative mode this moves the reference pitch.
    pub(crate) fn pitch_text(&mut self, pitch: Pitch) -> String {
        if self.settings.relative {
            let reference = self.previous_pitch.unwrap_or(Pitch::new(RELATIVE_BASE));
            let text = pitch.relative(reference);
            self.previous_pitch = Some(pitch);
            text
        } else {
            pitch.absolute()
        }
    }

    /// After a chord, the reference pitch is the chord's lowest note.
    pub(crate) fn set_previous_pitch(&mut self, pitch: Pitch) {
        if self.settings.relative {
            self.previous_pitch = Some(pitch);
        }
    }

    /// The text of one duration, after the measure has had its say: a span that crosses a
    /// measure line is split there, and the pieces are joined with ties (`is_rest` joins with
    /// rests instead, since a rest cannot be tied). Advances the position.
    ///
    /// Returns an empty string when the shorthand elides a repeated duration. The shorthand
    /// only remembers single-token durations: after a tied emission the next duration is
    /// always written out.
    pub(crate) fn duration_text(&mut self, duration: Duration, is_rest: bool) -> LibResult<String> {
        let segments = split_at_measures(self.position, duration.fraction(), self.measure);
        let mut tokens = Vec::new();
        for segment in &segments {
            tokens.extend(Duration::new(*segment)?.tokens()?);
        }
        let elide = self.settings.condense
            && tokens.len() == 1
            && self.previous_duration == Some(duration);
        self.previous_duration = if tokens.len() == 1 {
            Some(duration)
        } else {
            None
        };
        self.position += duration.fraction();
        if elide {
            return Ok(String::new());
        }
        Ok(if is_rest {
            tokens.join(" r")
        } else {
            tokens.join("~ ")
        })
    }
}
