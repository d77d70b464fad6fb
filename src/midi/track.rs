use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use crate::midi::{MessageKind, TrackMessage};
use log::{debug, trace};
use snafu::ResultExt;
use std::io::Read;

/// A track chunk (type `MTrk`): a stream of messages, each preceded by a delta-time.
///
/// `<Track Chunk> = <chunk type><length><MTrk event>+`
#[derive(Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Track {
    events: Vec<TrackMessage>,
}

impl Track {
    /// Returns `true` if the track has no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The number of events in the track.
    pub fn events_len(&self) -> usize {
        self.events.len()
    }

    /// Iterator over the events in the track.
    pub fn events(&self) -> impl Iterator<Item = &TrackMessage> {
        self.events.iter()
    }

    /// Add an event to the end.
    pub fn push_event(&mut self, delta_time: u32, kind: MessageKind) {
        self.events.push(TrackMessage::new(delta_time, kind));
    }

    /// The track name, taken from the first track-name message.
    pub fn name(&self) -> Option<&str> {
        self.events.iter().find_map(|event| match event.kind() {
            MessageKind::TrackName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.expect_tag("MTrk").context(io!())?;
        let chunk_length = iter.read_u32().context(io!())?;
        iter.set_size_limit(chunk_length as u64);
        // running status does not carry across track chunks
        iter.set_latest_status_byte(None);
        let mut events = Vec::new();
        loop {
            if iter.is_end() {
                invalid_file!("end of track bytes reached before EndOfTrack message.");
            }
            let event = TrackMessage::parse(iter)?;
            trace!("parsed {:?}", event);
            let is_track_end = event.is_end();
            events.push(event);
            if is_track_end {
                debug!("end of track message");
                if !iter.is_end() {
                    invalid_file!("EndOfTrack message before end of track bytes.");
                }
                break;
            }
        }
        iter.clear_size_limit();
        Ok(Self { events })
    }
}
