use crate::error::LibResult;
use crate::notation::duration::{Duration, Fraction, Position};
use crate::notation::expression::{
    construct_chord, Compound, Expression, Note, Polyphonic, Rest, TimeSignature,
};
use crate::notation::pitch::Pitch;
use crate::transcribe::pairer::MidiNote;
use log::{trace, warn};

/// Builds one staff's music from paired notes. Notes must arrive in the order their note-off
/// messages arrived, which is how the pairer produces them.
///
/// Each note is tried three ways: appended to the staff (with a rest filling any gap), merged
/// into the previous note or chord, or placed into a voice of a trailing polyphonic block,
/// opening one if necessary.
#[derive(Debug, Default)]
pub(crate) struct Placement {
    music: Compound,
}

impl Placement {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn music(&self) -> &Compound {
        &self.music
    }

    pub(crate) fn into_music(self) -> Compound {
        self.music
    }

    pub(crate) fn place(
        &mut self,
        midi_note: &MidiNote,
        signature: &TimeSignature,
    ) -> LibResult<()> {
        let span = midi_note.end.saturating_sub(midi_note.start);
        let duration = signature.duration_of(span)?;
        let note = Note::new(Pitch::new(midi_note.pitch), duration);
        let start = signature.position_of(midi_note.start);
        trace!("placing {:?} at {}", note, start);

        if fit_note(&mut self.music, &note, start.fraction())? {
            return Ok(());
        }
        self.place_polyphonic(note, start)
    }

    /// The note overlaps music that is already in place: it belongs to a polyphonic block at
    /// the end of the staff. Reuse a trailing block if there is one; otherwise split the
    /// overlapped tail off the staff into the block's first voice.
    fn place_polyphonic(&mut self, note: Note, start: Position) -> LibResult<()> {
        if !matches!(self.music.last(), Some(Expression::Polyphonic(_))) {
            let tail = match self.music.split_at(start) {
                Some(tail) => tail,
                // the fit failed, so the split position lies inside the staff
                None => Compound::new(),
            };
            let mut incoming = Polyphonic::new();
            incoming.add_voice(tail);
            // splitting may have exposed an earlier block as the new last child; extend that
            // block instead of nesting a second one inside it
            match self.music.last_mut() {
                Some(Expression::Polyphonic(existing)) => existing.merge(incoming),
                _ => self.music.add(Expression::Polyphonic(incoming)),
            }
        }

        let staff_length = self.music.length();
        let block = match self.music.last_mut() {
            Some(Expression::Polyphonic(block)) => block,
            _ => unreachable!("a polyphonic block was just appended"),
        };

        // where the block begins within the staff
        let block_start = staff_length - block.length();
        let local = if start.fraction() >= block_start {
            Position::new(start.fraction() - block_start)
        } else {
            // a long note that began before the block; the best we can do is line its voice
            // up with the start of the block
            warn!(
                "note at {} begins before the open polyphonic block, aligning it",
                start
            );
            Position::new(Fraction::new(0, 1))
        };

        for voice in block.voices_mut() {
            if fit_note(voice, &note, local.fraction())? {
                return Ok(());
            }
        }

        // no existing voice accepts the note, give it a voice of its own
        let mut voice = Compound::new();
        let fitted = fit_note(&mut voice, &note, local.fraction())?;
        debug_assert!(fitted, "a note always fits an empty voice");
        block.add_voice(voice);
        Ok(())
    }
}

/// Try to add `note` to the end of `expression` at the expression-local position `start`.
///
/// A note at or past the end is appended, with a rest filling any gap. A note that overlaps
/// only the final note or chord, with the same duration, merges into a chord. Anything else
/// is rejected.
fn fit_note(expression: &mut Compound, note: &Note, start: Fraction) -> LibResult<bool> {
    let length = expression.length();
    if start > length {
        expression.add(Expression::Rest(Rest::new(Duration::new(start - length)?)));
    }
    if start >= expression.length() {
        expression.add(Expression::Note(note.clone()));
        return Ok(true);
    }

    if let Some(previous) = expression.last() {
        if matches!(previous, Expression::Note(_) | Expression::Chord(_)) {
            let previous_start = expression.length() - previous.length();
            if start >= previous_start {
                if let Some(chord) = construct_chord(previous, &Expression::Note(note.clone())) {
                    expression.pop();
                    expression.add(Expression::Chord(chord));
                    return Ok(true);
                }
            }
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::score::{LyFile, Staff};
    use crate::notation::typesetter::RenderSettings;

    fn place_all(notes: &[MidiNote]) -> Placement {
        let signature = TimeSignature::new(4, 4, 1);
        let mut placement = Placement::new();
        for note in notes {
            placement.place(note, &signature).unwrap();
        }
        placement
    }

    fn render(placement: Placement) -> String {
        let mut file = LyFile::new();
        file.push_staff(Staff::new("test", placement.into_music()));
        let rendered = file.render(&RenderSettings::default()).unwrap();
        rendered
            .strip_prefix("\\version \"2.19.48\"\n\n\\new Staff = \"test\" ")
            .expect("unexpected file prefix")
            .to_string()
    }

    fn note(start: u64, end: u64, pitch: u8) -> MidiNote {
        MidiNote { start, end, pitch }
    }

    #[test]
    fn single_quarter_c() {
        let placement = place_all(&[note(0, 1, 60)]);
        assert_eq!("{ c'4 }", render(placement));
    }

    #[test]
    fn ascending_scale() {
        let scale = [0u8, 2, 4, 5, 7, 9, 11, 12];
        let notes: Vec<MidiNote> = scale
            .iter()
            .enumerate()
            .map(|(i, step)| note(i as u64, i as u64 + 1, 60 + step))
            .collect();
        let placement = place_all(&notes);
        assert_eq!(
            "{ c'4 d'4 e'4 f'4 | g'4 a'4 b'4 c''4 | }",
            render(placement)
        );
    }

    #[test]
    fn simultaneous_notes_form_a_chord() {
        let placement = place_all(&[note(0, 1, 60), note(0, 1, 64), note(0, 1, 67)]);
        assert_eq!("{ <c' e' g'>4 }", render(placement));
    }

    #[test]
    fn chord_progression() {
        let placement = place_all(&[
            note(0, 1, 60),
            note(0, 1, 64),
            note(0, 1, 67),
            note(1, 2, 65),
            note(1, 2, 69),
            note(1, 2, 72),
        ]);
        assert_eq!("{ <c' e' g'>4 <f' a' c''>4 }", render(placement));
    }

    #[test]
    fn gap_is_filled_with_a_rest() {
        let placement = place_all(&[note(1, 2, 60)]);
        assert_eq!("{ r4 c'4 }", render(placement));
    }

    #[test]
    fn overlapping_notes_open_two_voices() {
        // a half note against two quarters
        let placement = place_all(&[note(0, 1, 64), note(0, 2, 60), note(1, 2, 67)]);
        assert_eq!("{ << { e'4 g'4 } \\\\ { c'2 } >> }", render(placement));
    }

    #[test]
    fn polyphonic_block_between_plain_passages() {
        let placement = place_all(&[
            note(0, 2, 72),
            note(0, 2, 64),
            note(2, 3, 67),
            note(2, 4, 71),
            note(3, 4, 65),
            note(4, 8, 72),
            note(4, 8, 64),
        ]);
        assert_eq!(
            "{ <e' c''>2 << { b'2 | } \\\\ { g'4 f'4 | } >> | <e' c''>1 | }",
            render(placement)
        );
    }

    #[test]
    fn consecutive_polyphonic_passages_share_one_block() {
        let placement = place_all(&[
            note(0, 2, 72),
            note(0, 1, 64),
            note(1, 2, 67),
            note(2, 4, 72),
            note(2, 3, 64),
            note(3, 4, 67),
        ]);
        assert_eq!(Fraction::new(1, 1), placement.music().length());
        assert_eq!(
            "{ << { c''2 c''2 | } \\\\ { e'4 g'4 e'4 g'4 | } >> | }",
            render(placement)
        );
    }

    #[test]
    fn new_voice_gets_leading_rests() {
        // the low voice enters a beat into the block, so its voice starts with a rest
        let placement = place_all(&[note(0, 2, 72), note(1, 2, 60), note(0, 4, 76)]);
        assert_eq!(
            "{ << { e''1 | } \\\\ { c''2 } \\\\ { r4 c'4 } >> | }",
            render(placement)
        );
    }

    #[test]
    fn zero_length_note_is_unrepresentable() {
        let signature = TimeSignature::new(4, 4, 1);
        let mut placement = Placement::new();
        assert!(placement.place(&note(1, 1, 60), &signature).is_err());
    }

    #[test]
    fn dotted_quarter() {
        let signature = TimeSignature::new(4, 4, 2);
        let mut placement = Placement::new();
        placement.place(&note(0, 3, 60), &signature).unwrap();
        assert_eq!("{ c'4. }", render(placement));
    }

    #[test]
    fn tied_whole_plus_quarter() {
        let signature = TimeSignature::new(4, 4, 1);
        let mut placement = Placement::new();
        placement.place(&note(0, 5, 60), &signature).unwrap();
        assert_eq!("{ c'1~ 4 }", render(placement));
    }
}
