use crate::byte_iter::ByteIter;
use crate::error::LibResult;
use log::trace;
use snafu::{OptionExt, ResultExt};
use std::io::Read;

/// `<MTrk event> = <delta-time> <event>`. The delta-time is the number of ticks between the
/// previous message in the same track and this one.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TrackMessage {
    delta_time: u32,
    kind: MessageKind,
}

impl TrackMessage {
    pub fn new(delta_time: u32, kind: MessageKind) -> Self {
        Self { delta_time, kind }
    }

    pub fn delta_time(&self) -> u32 {
        self.delta_time
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    /// Returns true if this is a [`MessageKind::EndOfTrack`] message.
    pub(crate) fn is_end(&self) -> bool {
        matches!(self.kind, MessageKind::EndOfTrack)
    }

    pub(crate) fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let delta_time = iter.read_vlq_u32().context(io!())?;
        trace!("delta_time {}", delta_time);
        let kind = MessageKind::parse(iter)?;
        Ok(Self { delta_time, kind })
    }
}

/// The messages that transcription cares about. Anything else in the file is parsed far enough
/// to skip its bytes and collapses to [`MessageKind::Other`].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum MessageKind {
    /// A key was pressed. A `NoteOn` with velocity zero is, by convention, a note-off.
    NoteOn { note: u8, velocity: u8 },
    /// A key was released.
    NoteOff { note: u8, velocity: u8 },
    /// `FF 58`: the time signature as notated, e.g. 6/8 arrives as numerator 6, denominator 8.
    /// The wire format stores the denominator as a power-of-two exponent; it is converted here.
    TimeSignature { numerator: u8, denominator: u8 },
    /// `FF 03`: the name of the track.
    TrackName(String),
    /// `FF 2F`: required as the last message of every track.
    EndOfTrack,
    /// Any channel voice, meta, or sysex message that transcription ignores.
    Other,
}

impl MessageKind {
    /// True for a note-on that actually starts a note (velocity above zero).
    pub fn starts_note(&self) -> bool {
        matches!(self, MessageKind::NoteOn { velocity, .. } if *velocity > 0)
    }

    /// True for a note-off, or for the note-on-with-velocity-zero convention.
    pub fn ends_note(&self) -> bool {
        match self {
            MessageKind::NoteOff { .. } => true,
            MessageKind::NoteOn { velocity, .. } => *velocity == 0,
            _ => false,
        }
    }

    /// The MIDI note number, for note messages.
    pub fn note(&self) -> Option<u8> {
        match self {
            MessageKind::NoteOn { note, .. } | MessageKind::NoteOff { note, .. } => Some(*note),
            _ => None,
        }
    }

    fn parse<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let status_byte = iter.peek_or_die().context(io!())?;
        match status_byte {
            0xff => Self::parse_meta(iter),
            0xf0 | 0xf7 => Self::parse_sysex(iter),
            _ => Self::parse_channel(iter),
        }
    }

    fn parse_meta<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        iter.read_expect(0xff).context(io!())?;
        // a meta message cancels any running status
        iter.set_latest_status_byte(None);
        let meta_type = iter.read_or_die().context(io!())?;
        let length = iter.read_vlq_u32().context(io!())? as usize;
        match meta_type {
            0x03 => {
                let bytes = iter.read_n(length).context(io!())?;
                // the encoding of strings is not specified, utf8 is our best hope
                let name = String::from_utf8_lossy(&bytes).to_string();
                trace!("track name '{}'", name);
                Ok(MessageKind::TrackName(name))
            }
            0x2f => {
                if length != 0 {
                    invalid_file!("end-of-track message with nonzero length {}", length);
                }
                Ok(MessageKind::EndOfTrack)
            }
            0x58 => {
                if length != 4 {
                    invalid_file!("time signature message with length {}, expected 4", length);
                }
                let numerator = iter.read_or_die().context(io!())?;
                let exponent = iter.read_or_die().context(io!())?;
                // the remaining bytes are the metronome click and the 32nds-per-quarter value,
                // neither of which affects notation
                let _ = iter.read2().context(io!())?;
                if exponent > 7 {
                    invalid_file!("time signature denominator exponent {} too large", exponent);
                }
                Ok(MessageKind::TimeSignature {
                    numerator,
                    denominator: 1u8 << exponent,
                })
            }
            _ => {
                trace!("skipping meta message {:#04x}, {} bytes", meta_type, length);
                let _ = iter.read_n(length).context(io!())?;
                Ok(MessageKind::Other)
            }
        }
    }

    fn parse_sysex<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        let status = iter.read_or_die().context(io!())?;
        // a sysex message cancels any running status
        iter.set_latest_status_byte(None);
        let length = iter.read_vlq_u32().context(io!())? as usize;
        trace!("skipping sysex message {:#04x}, {} bytes", status, length);
        let _ = iter.read_n(length).context(io!())?;
        Ok(MessageKind::Other)
    }

    fn parse_channel<R: Read>(iter: &mut ByteIter<R>) -> LibResult<Self> {
        // if the first byte is a data byte then this is a running status message and the status
        // byte of the previous channel message is still in effect
        let status_byte = if matches!(iter.peek_or_die().context(io!())?, 0x00..=0x7f) {
            let running_status = iter
                .latest_status_byte()
                .context(crate::error::RunningStatusSnafu { site: site!() })?;
            trace!("running status byte {:#x}", running_status);
            running_status
        } else {
            let byte = iter.read_or_die().context(io!())?;
            iter.set_latest_status_byte(Some(byte));
            byte
        };

        match status_byte >> 4 {
            0x8 => Ok(MessageKind::NoteOff {
                note: iter.read_or_die().context(io!())?,
                velocity: iter.read_or_die().context(io!())?,
            }),
            0x9 => Ok(MessageKind::NoteOn {
                note: iter.read_or_die().context(io!())?,
                velocity: iter.read_or_die().context(io!())?,
            }),
            // polyphonic pressure, control change and pitch bend carry two data bytes
            0xa | 0xb | 0xe => {
                let _ = iter.read2().context(io!())?;
                Ok(MessageKind::Other)
            }
            // program change and channel pressure carry one data byte
            0xc | 0xd => {
                let _ = iter.read_or_die().context(io!())?;
                Ok(MessageKind::Other)
            }
            _ => {
                invalid_file!("unexpected status byte {:#04x} in track data", status_byte)
            }
        }
    }
}
