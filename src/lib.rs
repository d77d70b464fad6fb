/*!
`midi2ly` transcribes standard MIDI files into LilyPond notation source.

The crate is split the way the data flows: the [`midi`] module reads the file container and
delivers tracks of messages, the [`transcribe`] module pairs note events and arranges them
into a notation tree, and the [`notation`] module holds that tree and prints it.

```no_run
use midi2ly::{transcribe, MidiFile, RenderSettings};

fn main() -> midi2ly::Result<()> {
    let file = MidiFile::load("song.mid")?;
    let score = transcribe(&file)?;
    println!("{}", score.render(&RenderSettings::default())?);
    Ok(())
}
```
!*/

#![allow(dead_code)]

#[macro_use]
mod error;

mod byte_iter;

pub mod midi;
pub mod notation;
pub mod transcribe;

pub use error::{Error, Result};
pub use midi::MidiFile;
pub use notation::{LyFile, RenderSettings};
pub use transcribe::{transcribe, transcribe_with, TranscribeOptions};

use std::path::Path;

/// Load a MIDI file from disk and return its LilyPond source in one step.
pub fn midi_to_lilypond<P: AsRef<Path>>(path: P, settings: &RenderSettings) -> Result<String> {
    let file = MidiFile::load(path)?;
    let score = transcribe(&file)?;
    score.render(settings)
}
