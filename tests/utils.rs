#![allow(dead_code)]

use log::LevelFilter;
use std::io::Write;
use std::sync::Once;

static LOGGER: Once = Once::new();

pub fn enable_logging() {
    LOGGER.call_once(logger_init)
}

fn logger_init() {
    env_logger::Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "{}:{} {} [{}] - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, LevelFilter::Warn)
        .init();
}

/// The header chunk of a format 1 file.
pub fn header_chunk(ntracks: u16, ticks_per_beat: u16) -> Vec<u8> {
    let mut bytes = b"MThd".to_vec();
    bytes.extend(6u32.to_be_bytes());
    bytes.extend(1u16.to_be_bytes());
    bytes.extend(ntracks.to_be_bytes());
    bytes.extend(ticks_per_beat.to_be_bytes());
    bytes
}

/// Builds the bytes of one track chunk, event by event.
#[derive(Debug, Default)]
pub struct TrackBytes {
    events: Vec<u8>,
}

impl TrackBytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Self {
        self.delta(0);
        self.events.extend([0xff, 0x03, name.len() as u8]);
        self.events.extend(name.as_bytes());
        self
    }

    /// The denominator goes on the wire as a power-of-two exponent.
    pub fn time_signature(mut self, numerator: u8, denominator_exponent: u8) -> Self {
        self.delta(0);
        self.events
            .extend([0xff, 0x58, 0x04, numerator, denominator_exponent, 0x18, 0x08]);
        self
    }

    pub fn note_on(mut self, delta: u32, note: u8) -> Self {
        self.delta(delta);
        self.events.extend([0x90, note, 0x40]);
        self
    }

    pub fn note_off(mut self, delta: u32, note: u8) -> Self {
        self.delta(delta);
        self.events.extend([0x80, note, 0x00]);
        self
    }

    /// The chunk with its `MTrk` header and terminating end-of-track message.
    pub fn into_chunk(mut self) -> Vec<u8> {
        self.delta(0);
        self.events.extend([0xff, 0x2f, 0x00]);
        let mut bytes = b"MTrk".to_vec();
        bytes.extend((self.events.len() as u32).to_be_bytes());
        bytes.extend(self.events);
        bytes
    }

    fn delta(&mut self, mut value: u32) {
        let mut buffer = vec![(value & 0x7f) as u8];
        value >>= 7;
        while value > 0 {
            buffer.push((value & 0x7f) as u8 | 0x80);
            value >>= 7;
        }
        buffer.reverse();
        self.events.extend(buffer);
    }
}

/// A whole file: header plus track chunks.
pub fn midi_bytes(ticks_per_beat: u16, tracks: Vec<Vec<u8>>) -> Vec<u8> {
    let mut bytes = header_chunk(tracks.len() as u16, ticks_per_beat);
    for track in tracks {
        bytes.extend(track);
    }
    bytes
}

/// A control track carrying only a time signature.
pub fn control_track(numerator: u8, denominator_exponent: u8) -> Vec<u8> {
    TrackBytes::new()
        .time_signature(numerator, denominator_exponent)
        .into_chunk()
}
