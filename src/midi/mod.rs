/*!
The `midi` module reads the Standard MIDI File container and delivers tracks of time-stamped
messages. It parses only as much of the wire format as transcription consumes: note events,
time signatures and track names are kept, everything else is skipped over and surfaced as
[`MessageKind::Other`].
!*/

mod file;
mod message;
mod track;
pub(crate) mod vlq;

pub use file::{Format, MidiFile};
pub use message::{MessageKind, TrackMessage};
pub use track::Track;
