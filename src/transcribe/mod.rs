/*!
The `transcribe` module turns a parsed [`MidiFile`] into a notation tree. The pairer matches
note-on and note-off messages into sounding notes, the placement engine arranges each note
into its staff, and the orchestrator here walks the tracks: track zero is control only, every
later track becomes a staff, and two or more staves are joined in a staff group.
!*/

mod pairer;
mod placement;

pub use pairer::MidiNote;

use crate::error::{LibError, LibResult};
use crate::midi::{MessageKind, MidiFile, Track};
use crate::notation::expression::{Compound, Expression, TimeSignature};
use crate::notation::score::{LyFile, Staff};
use log::{debug, warn};
use pairer::EventPairer;
use placement::Placement;

/// Knobs for the transcription itself, as opposed to the rendering.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TranscribeOptions {
    /// Snap note starts and ends to a grid of this many ticks before placement.
    pub quantize: Option<u64>,
}

/// Transcribe a MIDI file into a LilyPond score with default options.
pub fn transcribe(file: &MidiFile) -> crate::Result<LyFile> {
    transcribe_with(file, &TranscribeOptions::default())
}

/// Transcribe a MIDI file into a LilyPond score.
pub fn transcribe_with(file: &MidiFile, options: &TranscribeOptions) -> crate::Result<LyFile> {
    Ok(transcribe_inner(file, options)?)
}

fn transcribe_inner(file: &MidiFile, options: &TranscribeOptions) -> LibResult<LyFile> {
    let ticks_per_beat = u32::from(file.ticks_per_beat());
    let mut signature: Option<TimeSignature> = None;
    let mut warned_missing_signature = false;
    let mut staves: Vec<(String, Compound)> = Vec::new();

    for (index, track) in file.tracks().enumerate() {
        let music = transcribe_track(
            index,
            track,
            ticks_per_beat,
            options,
            &mut signature,
            &mut warned_missing_signature,
        )?;
        // the first track carries the control messages, every other track is a staff
        if index > 0 {
            let name = track
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("track {}", index));
            debug!("finished staff '{}'", name);
            staves.push((name, music));
        }
    }

    let mut ly_file = LyFile::new();
    for (name, mut music) in staves {
        // LilyPond defaults to common time, so only another meter needs saying
        if let Some(signature) = signature.filter(|s| !s.is_common_time()) {
            let mut timed = Compound::new();
            timed.add(Expression::TimeSignature(signature));
            timed.merge(music);
            music = timed;
        }
        ly_file.push_staff(Staff::new(name, music));
    }
    Ok(ly_file)
}

fn transcribe_track(
    index: usize,
    track: &Track,
    ticks_per_beat: u32,
    options: &TranscribeOptions,
    signature: &mut Option<TimeSignature>,
    warned_missing_signature: &mut bool,
) -> LibResult<Compound> {
    let mut pairer = EventPairer::new();
    let mut placement = Placement::new();

    for message in track.events() {
        pairer.advance(message.delta_time());
        match message.kind() {
            MessageKind::TimeSignature {
                numerator,
                denominator,
            } => {
                // the first time signature wins; later changes are ignored
                if signature.is_none() {
                    debug!("time signature {}/{}", numerator, denominator);
                    *signature = Some(TimeSignature::new(
                        *numerator,
                        *denominator,
                        ticks_per_beat,
                    ));
                }
            }
            kind if index > 0 && kind.starts_note() => {
                if let Some(note) = kind.note() {
                    pairer.note_on(note);
                }
            }
            kind if index > 0 && kind.ends_note() => {
                let note = match kind.note() {
                    Some(note) => note,
                    None => continue,
                };
                let midi_note = match pairer.note_off(note, index) {
                    Ok(midi_note) => midi_note,
                    Err(e @ LibError::UnpairedNoteOff { .. }) => {
                        warn!("{}", e);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                let midi_note = match options.quantize {
                    Some(grid) => midi_note.quantized(grid),
                    None => midi_note,
                };
                let signature = match *signature {
                    Some(signature) => signature,
                    None => {
                        if !*warned_missing_signature {
                            warn!("a note arrived before any time signature, assuming 4/4");
                            *warned_missing_signature = true;
                        }
                        TimeSignature::common_time(ticks_per_beat)
                    }
                };
                if let Err(e) = placement.place(&midi_note, &signature) {
                    match e {
                        LibError::UnrepresentableDuration { .. } => {
                            warn!("track {}: skipping note {}: {}", index, note, e)
                        }
                        other => return Err(other),
                    }
                }
            }
            _ => {}
        }
    }
    pairer.finish(index);
    Ok(placement.into_music())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::midi::MidiFile;
    use crate::notation::score::TopExpression;
    use crate::notation::typesetter::RenderSettings;
    use std::io::Cursor;

    fn midi_bytes() -> Vec<u8> {
        vec![
            // MThd: format 1, two tracks, one tick per beat
            b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00, 0x01,
            // control track: 4/4
            b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x0c, //
            0x00, 0xff, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, //
            0x00, 0xff, 0x2f, 0x00, //
            // melody track: name, then a quarter note c'
            b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x14, //
            0x00, 0xff, 0x03, 0x04, b'l', b'e', b'a', b'd', //
            0x00, 0x90, 60, 64, //
            0x01, 0x80, 60, 0, //
            0x00, 0xff, 0x2f, 0x00,
        ]
    }

    #[test]
    fn one_track_becomes_one_staff() {
        let file = MidiFile::read(Cursor::new(midi_bytes())).unwrap();
        let score = transcribe(&file).unwrap();
        assert_eq!(1, score.expressions().len());
        let staff = match &score.expressions()[0] {
            TopExpression::Staff(staff) => staff,
            other => panic!("expected a bare staff, got {:?}", other),
        };
        assert_eq!("lead", staff.name());
        assert_eq!(
            "\\version \"2.19.48\"\n\n\\new Staff = \"lead\" { c'4 }",
            score.render(&RenderSettings::default()).unwrap()
        );
    }

    #[test]
    fn unnamed_track_gets_a_numbered_staff() {
        let mut bytes = midi_bytes();
        // blank out the track-name meta message with a harmless text message
        let position = bytes
            .windows(2)
            .position(|window| window == [0xff, 0x03])
            .unwrap();
        bytes[position + 1] = 0x01;
        let file = MidiFile::read(Cursor::new(bytes)).unwrap();
        let score = transcribe(&file).unwrap();
        let staff = match &score.expressions()[0] {
            TopExpression::Staff(staff) => staff,
            other => panic!("expected a bare staff, got {:?}", other),
        };
        assert_eq!("track 1", staff.name());
    }
}
