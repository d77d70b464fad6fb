use crate::error::{LibResult, UnrepresentableDurationSnafu};
use num_rational::Ratio;
use std::cmp::min;
use std::fmt;

/// A beat fraction: a rational number of whole notes. A quarter note is `1/4`.
pub type Fraction = Ratio<u64>;

/// Durations longer than this many tied segments are rejected rather than printed. No real
/// music comes anywhere near it; it bounds the decomposition loop for garbage input.
const MAX_SEGMENTS: usize = 64;

/// A beat offset from the start of a track. Structurally a [`Duration`], but zero is allowed
/// and the two are never interchangeable in signatures.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Position(Fraction);

impl Position {
    /// The position of an event `ticks` ticks into the track, where `denominator` is the time
    /// signature denominator that defines the reference unit.
    pub fn from_ticks(ticks: u64, ticks_per_beat: u32, denominator: u8) -> Self {
        Self(fraction_from_ticks(ticks, ticks_per_beat, denominator))
    }

    pub fn new(fraction: Fraction) -> Self {
        Self(fraction)
    }

    pub fn fraction(&self) -> Fraction {
        self.0
    }
}

/// A positive note length, reduced to lowest terms.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub struct Duration(Fraction);

impl Duration {
    /// The duration of a span of `ticks` ticks. A zero span has no notation and is an error.
    pub fn from_ticks(ticks: u64, ticks_per_beat: u32, denominator: u8) -> crate::Result<Self> {
        Ok(Self::new(fraction_from_ticks(ticks, ticks_per_beat, denominator))?)
    }

    /// A duration of `fraction` whole notes. Zero has no notation and is an error.
    pub fn from_fraction(fraction: Fraction) -> crate::Result<Self> {
        Ok(Self::new(fraction)?)
    }

    pub(crate) fn new(fraction: Fraction) -> LibResult<Self> {
        if fraction.numer() == &0 {
            return UnrepresentableDurationSnafu {
                numerator: 0u64,
                denominator: *fraction.denom(),
            }
            .fail();
        }
        Ok(Self(fraction))
    }

    pub fn fraction(&self) -> Fraction {
        self.0
    }

    /// Decompose into printable duration tokens, e.g. `5/4` becomes `["1", "4"]`. A single
    /// token is a simple or dotted note; multiple tokens must be joined by the caller with
    /// ties (notes) or further rests (rests).
    ///
    /// The head of each step is the largest simple note value that fits (for a power-of-two
    /// denominator, the largest dyadic fraction), so the remainder's numerator strictly
    /// shrinks and the search terminates.
    pub(crate) fn tokens(&self) -> LibResult<Vec<String>> {
        let mut parts = Vec::new();
        let mut rest = self.0;
        loop {
            if parts.len() >= MAX_SEGMENTS {
                return UnrepresentableDurationSnafu {
                    numerator: *self.0.numer(),
                    denominator: *self.0.denom(),
                }
                .fail();
            }
            let (n, d) = (*rest.numer(), *rest.denom());
            if n == 1 {
                parts.push(d.to_string());
                break;
            }
            if d > 1 && n >= 3 && (n + 1).is_power_of_two() && (2 * d) % (n + 1) == 0 {
                let base = 2 * d / (n + 1);
                let dots = (n + 1).trailing_zeros() as usize - 1;
                parts.push(format!("{}{}", base, ".".repeat(dots)));
                break;
            }
            // peel off the largest printable head note and continue with the remainder. A
            // head k/d reduces to a simple 1/m exactly when k divides d, so the head is the
            // largest divisor of d below n (d itself when n spans whole notes).
            let mut head_numerator = 1u64;
            let mut i = 1u64;
            while i * i <= d {
                if d % i == 0 {
                    if i < n && i > head_numerator {
                        head_numerator = i;
                    }
                    let paired = d / i;
                    if paired < n && paired > head_numerator {
                        head_numerator = paired;
                    }
                }
                i += 1;
            }
            let head = Fraction::new(head_numerator, d);
            parts.push(head.denom().to_string());
            rest = rest - head;
        }
        Ok(parts)
    }

    /// The duration as it appears after a pitch, segments tied: `5/4` is `"1~ 4"`.
    pub fn notation(&self) -> crate::Result<String> {
        Ok(self.tokens()?.join("~ "))
    }

    /// The duration as a rest. A rest cannot be tied, so each segment is its own rest:
    /// `5/4` is `"r1 r4"`.
    pub fn rest_notation(&self) -> crate::Result<String> {
        Ok(format!("r{}", self.tokens()?.join(" r")))
    }

    /// Parse the output of [`Duration::notation`] back into a duration.
    pub fn parse_notation(text: &str) -> crate::Result<Self> {
        Ok(Self::parse_notation_inner(text)?)
    }

    fn parse_notation_inner(text: &str) -> LibResult<Self> {
        let mut total = Fraction::new(0, 1);
        for token in text.split("~ ") {
            let base_text = token.trim_end_matches('.');
            let dots = (token.len() - base_text.len()) as u32;
            let base: u64 = match base_text.parse() {
                Ok(value) if value >= 1 && dots < 32 => value,
                _ => {
                    return UnrepresentableDurationSnafu {
                        numerator: 0u64,
                        denominator: 1u64,
                    }
                    .fail()
                }
            };
            // a note with k dots lasts (2^(k+1) - 1) / 2^k times its base value
            let factor = Fraction::new((1u64 << (dots + 1)) - 1, 1u64 << dots);
            total += Fraction::new(1, base) * factor;
        }
        Self::new(total)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn fraction_from_ticks(ticks: u64, ticks_per_beat: u32, denominator: u8) -> Fraction {
    Fraction::new(
        ticks,
        u64::from(ticks_per_beat.max(1)) * u64::from(denominator.max(1)),
    )
}

/// Split a span starting at `start` into the pieces bounded by measure lines, each piece at
/// most `measure` long. A span that fits inside its measure comes back whole.
pub(crate) fn split_at_measures(
    start: Fraction,
    length: Fraction,
    measure: Fraction,
) -> Vec<Fraction> {
    let zero = Fraction::new(0, 1);
    let mut parts = Vec::new();
    let mut remaining = length;
    let mut position = start;
    while remaining > zero {
        let measure_end = (position / measure).floor() * measure + measure;
        let space = measure_end - position;
        let piece = min(remaining, space);
        parts.push(piece);
        remaining -= piece;
        position += piece;
    }
    parts
}
