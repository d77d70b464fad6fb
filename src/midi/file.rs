use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use crate::midi::Track;
use log::trace;
use snafu::ResultExt;
use std::io::Read;
use std::path::Path;

// https://www.music.mcgill.ca/~gary/306/week9/smf.html

/// A parsed Standard MIDI File: the header data and the tracks.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct MidiFile {
    format: Format,
    ticks_per_beat: u16,
    tracks: Vec<Track>,
}

impl MidiFile {
    fn read_inner<R: Read>(mut iter: ByteIter<R>) -> LibResult<Self> {
        trace!("parsing header chunk");
        iter.expect_tag("MThd").context(io!())?;
        let chunk_length = iter.read_u32().context(io!())?;
        // header chunk length is always 6
        if chunk_length != 6 {
            invalid_file!("header chunk length {}, expected 6", chunk_length);
        }
        let format_word = iter.read_u16().context(io!())?;
        let num_tracks = iter.read_u16().context(io!())?;
        let division = iter.read_u16().context(io!())?;
        let format = Format::from_u16(format_word)?;
        let ticks_per_beat = ticks_per_beat_from_division(division)?;
        let mut tracks = Vec::new();
        for i in 0..num_tracks {
            trace!("parsing track chunk {} (zero-based) of {}", i, num_tracks);
            tracks.push(Track::parse(&mut iter)?)
        }
        Ok(Self {
            format,
            ticks_per_beat,
            tracks,
        })
    }

    pub fn read<R: Read>(r: R) -> crate::Result<Self> {
        let bytes = r.bytes();
        let iter = ByteIter::new(bytes).context(io!())?;
        Ok(Self::read_inner(iter)?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        Ok(Self::read_inner(
            ByteIter::new_file(path).context(io!())?,
        )?)
    }

    pub fn format(&self) -> Format {
        self.format
    }

    /// The number of delta-time ticks that make up a quarter note.
    pub fn ticks_per_beat(&self) -> u16 {
        self.ticks_per_beat
    }

    pub fn tracks_len(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }
}

const DIVISION_TYPE_BIT: u16 = 0b1000000000000000;

/// If bit 15 of `<division>` is zero, bits 14 thru 0 are the number of delta-time ticks which
/// make up a quarter-note. If bit 15 is set the division is SMPTE-based, which notation has no
/// use for.
fn ticks_per_beat_from_division(division: u16) -> LibResult<u16> {
    if division & DIVISION_TYPE_BIT == DIVISION_TYPE_BIT {
        invalid_file!("SMPTE division {:#06x} is not supported", division);
    }
    if division == 0 {
        invalid_file!("division of zero ticks per quarter note");
    }
    Ok(division)
}

/// The format indicator from the header chunk.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Format {
    /// 0 the file contains a single multi-channel track
    Single = 0,
    /// 1 the file contains one or more simultaneous tracks (or MIDI outputs) of a sequence
    #[default]
    Multi = 1,
    /// 2 the file contains one or more sequentially independent single-track patterns
    Sequential = 2,
}

impl Format {
    pub(crate) fn from_u16(value: u16) -> LibResult<Self> {
        match value {
            0 => Ok(Format::Single),
            1 => Ok(Format::Multi),
            2 => Ok(Format::Sequential),
            _ => invalid_file_r!("unknown format {}", value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn read_two_track_file() {
        let bytes: Vec<u8> = vec![
            // MThd, length 6, format 1, two tracks, 96 ticks per beat
            b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x02, 0x00, 0x60,
            // control track: time signature then end
            b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x0c, //
            0x00, 0xff, 0x58, 0x04, 0x04, 0x02, 0x18, 0x08, //
            0x00, 0xff, 0x2f, 0x00, //
            // one note
            b'M', b'T', b'r', b'k', 0x00, 0x00, 0x00, 0x0c, //
            0x00, 0x90, 60, 64, //
            0x60, 0x80, 60, 0, //
            0x00, 0xff, 0x2f, 0x00,
        ];
        let file = MidiFile::read(Cursor::new(bytes)).unwrap();
        assert_eq!(Format::Multi, file.format());
        assert_eq!(96, file.ticks_per_beat());
        assert_eq!(2, file.tracks_len());
        assert_eq!(2, file.track(0).unwrap().events_len());
        assert_eq!(3, file.track(1).unwrap().events_len());
    }

    #[test]
    fn smpte_division_is_rejected() {
        let bytes: Vec<u8> = vec![
            b'M', b'T', b'h', b'd', 0x00, 0x00, 0x00, 0x06, 0x00, 0x00, 0x00, 0x00, 0xe2, 0x50,
        ];
        assert!(MidiFile::read(Cursor::new(bytes)).is_err());
    }
}
