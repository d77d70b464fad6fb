use crate::error::LibResult;
use crate::notation::duration::{Duration, Fraction, Position};
use crate::notation::pitch::Pitch;
use crate::notation::typesetter::Typesetter;
use snafu::ResultExt;
use std::collections::BTreeSet;
use std::io::Write;

/// Notes below this MIDI number put their containing expression on a bass clef.
const BASS_CLEF_BELOW: u8 = 55;

/// One element of the notation tree. Every variant knows its own length as a beat fraction
/// and how to write itself as LilyPond text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Note(Note),
    Rest(Rest),
    Chord(Chord),
    Compound(Compound),
    Polyphonic(Polyphonic),
    TimeSignature(TimeSignature),
    Text(Text),
}

impl Expression {
    /// How much musical time the expression occupies.
    pub fn length(&self) -> Fraction {
        match self {
            Expression::Note(note) => note.duration.fraction(),
            Expression::Rest(rest) => rest.duration.fraction(),
            Expression::Chord(chord) => chord.duration.fraction(),
            Expression::Compound(compound) => compound.length(),
            Expression::Polyphonic(polyphonic) => polyphonic.length(),
            Expression::TimeSignature(_) | Expression::Text(_) => Fraction::new(0, 1),
        }
    }

    fn collect_pitches(&self, into: &mut BTreeSet<Pitch>) {
        match self {
            Expression::Note(note) => {
                into.insert(note.pitch);
            }
            Expression::Chord(chord) => {
                into.extend(chord.pitches.iter().copied());
            }
            Expression::Compound(compound) => {
                for child in &compound.children {
                    child.collect_pitches(into);
                }
            }
            Expression::Polyphonic(polyphonic) => {
                for voice in &polyphonic.voices {
                    for child in &voice.children {
                        child.collect_pitches(into);
                    }
                }
            }
            Expression::Rest(_) | Expression::TimeSignature(_) | Expression::Text(_) => {}
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        match self {
            Expression::Note(note) => note.write(w),
            Expression::Rest(rest) => rest.write(w),
            Expression::Chord(chord) => chord.write(w),
            Expression::Compound(compound) => compound.write(w),
            Expression::Polyphonic(polyphonic) => polyphonic.write(w),
            Expression::TimeSignature(signature) => signature.write(w),
            Expression::Text(text) => text.write(w),
        }
    }
}

/// A single pitch with a duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pitch: Pitch,
    duration: Duration,
}

impl Note {
    pub fn new(pitch: Pitch, duration: Duration) -> Self {
        Self { pitch, duration }
    }

    pub fn pitch(&self) -> Pitch {
        self.pitch
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        let pitch_text = w.pitch_text(self.pitch);
        let duration_text = w.duration_text(self.duration, false)?;
        write!(w, "{}{}", pitch_text, duration_text).context(wr!())
    }
}

/// Silence with a duration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rest {
    duration: Duration,
}

impl Rest {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        let duration_text = w.duration_text(self.duration, true)?;
        write!(w, "r{}", duration_text).context(wr!())
    }
}

/// Two or more pitches struck together for the same duration. Pitches are a set and always
/// render in ascending order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chord {
    pitches: BTreeSet<Pitch>,
    duration: Duration,
}

impl Chord {
    pub fn new<I: IntoIterator<Item = Pitch>>(pitches: I, duration: Duration) -> Self {
        Self {
            pitches: pitches.into_iter().collect(),
            duration,
        }
    }

    pub fn pitches(&self) -> impl Iterator<Item = Pitch> + '_ {
        self.pitches.iter().copied()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn lowest_pitch(&self) -> Option<Pitch> {
        self.pitches.iter().next().copied()
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        write!(w, "<").context(wr!())?;
        for (i, pitch) in self.pitches.iter().enumerate() {
            if i > 0 {
                write!(w, " ").context(wr!())?;
            }
            let text = w.pitch_text(*pitch);
            write!(w, "{}", text).context(wr!())?;
        }
        write!(w, ">").context(wr!())?;
        let duration_text = w.duration_text(self.duration, false)?;
        write!(w, "{}", duration_text).context(wr!())?;
        // relative octave entry continues from the chord's lowest note
        if let Some(lowest) = self.lowest_pitch() {
            w.set_previous_pitch(lowest);
        }
        Ok(())
    }
}

/// Merge two sounding elements into a chord. Yields `None` unless both are notes or chords
/// of equal duration. The pitch set is the union, so the operation is symmetric.
pub fn construct_chord(a: &Expression, b: &Expression) -> Option<Chord> {
    fn parts(e: &Expression) -> Option<(Vec<Pitch>, Duration)> {
        match e {
            Expression::Note(note) => Some((vec![note.pitch], note.duration)),
            Expression::Chord(chord) => Some((chord.pitches().collect(), chord.duration)),
            _ => None,
        }
    }
    let (pitches_a, duration_a) = parts(a)?;
    let (pitches_b, duration_b) = parts(b)?;
    if duration_a != duration_b {
        return None;
    }
    Some(Chord::new(
        pitches_a.into_iter().chain(pitches_b),
        duration_a,
    ))
}

/// A brace-delimited sequence of expressions played one after another.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compound {
    children: Vec<Expression>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, child: Expression) {
        self.children.push(child);
    }

    pub fn pop(&mut self) -> Option<Expression> {
        self.children.pop()
    }

    pub fn last(&self) -> Option<&Expression> {
        self.children.last()
    }

    pub(crate) fn last_mut(&mut self) -> Option<&mut Expression> {
        self.children.last_mut()
    }

    pub fn children(&self) -> &[Expression] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// The sum of the children's lengths.
    pub fn length(&self) -> Fraction {
        self.children
            .iter()
            .fold(Fraction::new(0, 1), |sum, child| sum + child.length())
    }

    /// Append all of `other`'s children.
    pub fn merge(&mut self, other: Compound) {
        self.children.extend(other.children);
    }

    /// Remove and return the suffix of children starting with the first child whose
    /// cumulative end exceeds `position`. Children are not themselves split; the caller must
    /// pick a position on a child boundary. Returns `None`, leaving the children in place,
    /// when `position` is at or beyond the total length.
    pub fn split_at(&mut self, position: Position) -> Option<Compound> {
        let mut length = Fraction::new(0, 1);
        let mut split_index = None;
        for (i, child) in self.children.iter().enumerate() {
            length += child.length();
            if length > position.fraction() {
                split_index = Some(i);
                break;
            }
        }
        split_index.map(|i| Compound {
            children: self.children.split_off(i),
        })
    }

    pub fn pitches(&self) -> BTreeSet<Pitch> {
        let mut set = BTreeSet::new();
        for child in &self.children {
            child.collect_pitches(&mut set);
        }
        set
    }

    pub fn lowest_pitch(&self) -> Option<Pitch> {
        self.pitches().iter().next().copied()
    }

    pub fn highest_pitch(&self) -> Option<Pitch> {
        self.pitches().iter().next_back().copied()
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        write!(w, "{{").context(wr!())?;
        if let Some(lowest) = self.lowest_pitch() {
            if lowest.get() < BASS_CLEF_BELOW {
                write!(w, " \\clef bass").context(wr!())?;
            }
        }
        let zero = Fraction::new(0, 1);
        for child in &self.children {
            write!(w, " ").context(wr!())?;
            child.write(w)?;
            // a bar check is optional for LilyPond but is validated when present
            if child.length() > zero && w.at_measure_boundary() {
                write!(w, " |").context(wr!())?;
            }
        }
        write!(w, " }}").context(wr!())
    }
}

/// Parallel voices sounding together, `<< ... \\ ... >>`. Voices are expected to converge on
/// equal lengths, at which point the block is balanced and can be left behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polyphonic {
    voices: Vec<Compound>,
}

impl Polyphonic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_voice(&mut self, voice: Compound) {
        self.voices.push(voice);
    }

    pub fn voices(&self) -> &[Compound] {
        &self.voices
    }

    pub(crate) fn voices_mut(&mut self) -> &mut [Compound] {
        &mut self.voices
    }

    /// The length of the longest voice.
    pub fn length(&self) -> Fraction {
        self.voices
            .iter()
            .map(Compound::length)
            .max()
            .unwrap_or_else(|| Fraction::new(0, 1))
    }

    /// True when there are at least two voices and they all have the same length.
    pub fn is_balanced(&self) -> bool {
        if self.voices.len() < 2 {
            return false;
        }
        let first = self.voices[0].length();
        self.voices.iter().all(|voice| voice.length() == first)
    }

    /// Extend this block with the voices of another, pairing them up in order. Voices of
    /// `other` beyond this block's count become new voices.
    pub fn merge(&mut self, other: Polyphonic) {
        let mut incoming = other.voices.into_iter();
        for voice in &mut self.voices {
            match incoming.next() {
                Some(extension) => voice.merge(extension),
                None => break,
            }
        }
        self.voices.extend(incoming);
    }

    /// Voices sorted for printing: highest average pitch first, so the top voice is drawn
    /// with stems up. Ties keep their insertion order.
    fn print_order(&self) -> Vec<&Compound> {
        let mut order: Vec<&Compound> = self.voices.iter().collect();
        order.sort_by(|a, b| {
            average_pitch(b)
                .partial_cmp(&average_pitch(a))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        order
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        let start = w.position();
        write!(w, "<<").context(wr!())?;
        for (i, voice) in self.print_order().into_iter().enumerate() {
            if i > 0 {
                write!(w, " \\\\").context(wr!())?;
            }
            write!(w, " ").context(wr!())?;
            // every voice begins at the block's starting position
            w.set_position(start);
            w.clear_previous_duration();
            voice.write(w)?;
        }
        write!(w, " >>").context(wr!())?;
        w.set_position(start + self.length());
        Ok(())
    }
}

fn average_pitch(voice: &Compound) -> f64 {
    let pitches = voice.pitches();
    if pitches.is_empty() {
        return 0.0;
    }
    let sum: u32 = pitches.iter().map(|p| u32::from(p.get())).sum();
    f64::from(sum) / pitches.len() as f64
}

/// The notated meter. Contributes no length; its denominator is the reference unit that tick
/// spans are measured against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimeSignature {
    numerator: u8,
    denominator: u8,
    ticks_per_beat: u32,
}

impl TimeSignature {
    pub fn new(numerator: u8, denominator: u8, ticks_per_beat: u32) -> Self {
        Self {
            numerator: numerator.max(1),
            denominator: denominator.max(1),
            ticks_per_beat,
        }
    }

    /// 4/4, the fallback when a file never states its meter.
    pub fn common_time(ticks_per_beat: u32) -> Self {
        Self::new(4, 4, ticks_per_beat)
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn denominator(&self) -> u8 {
        self.denominator
    }

    pub fn ticks_per_beat(&self) -> u32 {
        self.ticks_per_beat
    }

    pub fn is_common_time(&self) -> bool {
        self.numerator == 4 && self.denominator == 4
    }

    /// The length of one measure as a beat fraction.
    pub fn measure_length(&self) -> Fraction {
        Fraction::new(u64::from(self.numerator), u64::from(self.denominator))
    }

    /// The duration of a span of `ticks` under this signature.
    pub(crate) fn duration_of(&self, ticks: u64) -> LibResult<Duration> {
        Duration::new(crate::notation::duration::fraction_from_ticks(
            ticks,
            self.ticks_per_beat,
            self.denominator,
        ))
    }

    /// The position of a point `ticks` into the track under this signature.
    pub fn position_of(&self, ticks: u64) -> Position {
        Position::from_ticks(ticks, self.ticks_per_beat, self.denominator)
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        w.set_measure(self.measure_length());
        write!(w, "\\time {}/{}", self.numerator, self.denominator).context(wr!())
    }
}

/// Literal text passed through to the output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
    content: String,
}

impl Text {
    pub fn new<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
        }
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        write!(w, "{}", self.content).context(wr!())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::typesetter::RenderSettings;

    pub(crate) fn render(expression: &Expression) -> String {
        render_with(expression, RenderSettings::default())
    }

    pub(crate) fn render_with(expression: &Expression, settings: RenderSettings) -> String {
        let mut buffer = Vec::new();
        let mut w = Typesetter::new(&mut buffer, settings);
        expression.write(&mut w).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    fn quarter() -> Duration {
        Duration::new(Fraction::new(1, 4)).unwrap()
    }

    fn quarter_note(note_number: u8) -> Expression {
        Expression::Note(Note::new(Pitch::new(note_number), quarter()))
    }

    fn whole_note(note_number: u8) -> Expression {
        Expression::Note(Note::new(
            Pitch::new(note_number),
            Duration::new(Fraction::new(1, 1)).unwrap(),
        ))
    }

    #[test]
    fn note_and_rest_render() {
        assert_eq!("c'4", render(&quarter_note(60)));
        assert_eq!("r4", render(&Expression::Rest(Rest::new(quarter()))));
    }

    #[test]
    fn chord_renders_pitches_ascending() {
        let chord = Chord::new([Pitch::new(67), Pitch::new(60), Pitch::new(64)], quarter());
        assert_eq!("<c' e' g'>4", render(&Expression::Chord(chord)));
    }

    #[test]
    fn duplicate_chord_pitches_collapse() {
        let chord = Chord::new([Pitch::new(60), Pitch::new(62), Pitch::new(62)], quarter());
        assert_eq!("<c' d'>4", render(&Expression::Chord(chord)));
    }

    #[test]
    fn construct_chord_is_symmetric() {
        let a = quarter_note(60);
        let b = quarter_note(64);
        let ab = construct_chord(&a, &b).unwrap();
        let ba = construct_chord(&b, &a).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn construct_chord_rejects_unequal_durations() {
        let a = quarter_note(60);
        let b = whole_note(64);
        assert!(construct_chord(&a, &b).is_none());
    }

    #[test]
    fn construct_chord_unions_chord_pitches() {
        let chord = Expression::Chord(Chord::new([Pitch::new(60), Pitch::new(64)], quarter()));
        let merged = construct_chord(&chord, &quarter_note(67)).unwrap();
        let pitches: Vec<u8> = merged.pitches().map(|p| p.get()).collect();
        assert_eq!(vec![60, 64, 67], pitches);
    }

    #[test]
    fn empty_compound() {
        let compound = Compound::new();
        assert_eq!(Fraction::new(0, 1), compound.length());
        assert_eq!("{ }", render(&Expression::Compound(compound)));
    }

    #[test]
    fn compound_length_is_the_sum() {
        let mut compound = Compound::new();
        for _ in 0..12 {
            compound.add(quarter_note(60));
        }
        assert_eq!(Fraction::new(3, 1), compound.length());
        compound.pop();
        assert_eq!(Fraction::new(11, 4), compound.length());
    }

    #[test]
    fn compound_renders_with_bar_checks() {
        let mut compound = Compound::new();
        for note_number in [60, 62, 64, 65, 67] {
            compound.add(quarter_note(note_number));
        }
        assert_eq!(
            "{ c'4 d'4 e'4 f'4 | g'4 }",
            render(&Expression::Compound(compound))
        );
    }

    #[test]
    fn low_compound_gets_the_bass_clef() {
        let mut compound = Compound::new();
        compound.add(quarter_note(54));
        compound.add(quarter_note(60));
        assert_eq!(
            "{ \\clef bass fis4 c'4 }",
            render(&Expression::Compound(compound))
        );
    }

    #[test]
    fn split_at_empty_compound() {
        let mut compound = Compound::new();
        assert!(compound
            .split_at(Position::new(Fraction::new(0, 1)))
            .is_none());
    }

    #[test]
    fn split_at_beyond_the_end_leaves_the_compound_alone() {
        let mut compound = Compound::new();
        compound.add(quarter_note(79));
        assert!(compound
            .split_at(Position::new(Fraction::new(1, 1)))
            .is_none());
        assert_eq!(1, compound.children().len());
    }

    #[test]
    fn split_at_zero_takes_everything() {
        let mut compound = Compound::new();
        compound.add(quarter_note(79));
        let suffix = compound
            .split_at(Position::new(Fraction::new(0, 1)))
            .unwrap();
        assert!(compound.is_empty());
        assert_eq!(1, suffix.children().len());
    }

    #[test]
    fn split_preserves_total_length() {
        let mut compound = Compound::new();
        for _ in 0..4 {
            compound.add(quarter_note(79));
        }
        compound.add(whole_note(79));
        let original = compound.length();
        let suffix = compound
            .split_at(Position::new(Fraction::new(1, 1)))
            .unwrap();
        assert_eq!(Fraction::new(1, 1), compound.length());
        assert_eq!(original, compound.length() + suffix.length());
    }

    #[test]
    fn polyphonic_length_is_the_longest_voice() {
        let mut block = Polyphonic::new();
        let mut melody = Compound::new();
        melody.add(whole_note(72));
        let mut accompaniment = Compound::new();
        accompaniment.add(quarter_note(64));
        block.add_voice(melody);
        assert!(!block.is_balanced());
        block.add_voice(accompaniment);
        assert_eq!(Fraction::new(1, 1), block.length());
        assert!(!block.is_balanced());
    }

    #[test]
    fn balanced_when_all_voices_have_equal_length() {
        let mut block = Polyphonic::new();
        for note_number in [72, 64] {
            let mut voice = Compound::new();
            voice.add(quarter_note(note_number));
            block.add_voice(voice);
        }
        assert!(block.is_balanced());
    }

    #[test]
    fn polyphonic_prints_the_highest_voice_first() {
        let mut block = Polyphonic::new();
        let mut low = Compound::new();
        low.add(quarter_note(64));
        low.add(quarter_note(67));
        let mut high = Compound::new();
        high.add(Expression::Note(Note::new(
            Pitch::new(72),
            Duration::new(Fraction::new(1, 2)).unwrap(),
        )));
        block.add_voice(low);
        block.add_voice(high);
        assert_eq!(
            "<< { c''2 } \\\\ { e'4 g'4 } >>",
            render(&Expression::Polyphonic(block))
        );
    }

    #[test]
    fn time_signature_renders_and_sets_the_measure() {
        let signature = TimeSignature::new(3, 4, 96);
        let mut compound = Compound::new();
        compound.add(Expression::TimeSignature(signature));
        for note_number in [60, 62, 64, 65] {
            compound.add(quarter_note(note_number));
        }
        assert_eq!(
            "{ \\time 3/4 c'4 d'4 e'4 | f'4 }",
            render(&Expression::Compound(compound))
        );
    }

    #[test]
    fn zero_length_expressions() {
        assert_eq!(
            Fraction::new(0, 1),
            Expression::TimeSignature(TimeSignature::common_time(96)).length()
        );
        assert_eq!(
            Fraction::new(0, 1),
            Expression::Text(Text::new("\\relative c' ")).length()
        );
    }
}
