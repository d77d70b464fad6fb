/*!
The `notation` module holds the notation tree and everything needed to print it: the rational
duration algebra, the pitch speller, the tree node types, and the typesetter that walks the
tree emitting LilyPond text.
!*/

pub mod duration;
pub mod expression;
pub mod pitch;
pub mod score;
pub mod typesetter;

pub use duration::{Duration, Fraction, Position};
pub use expression::{
    construct_chord, Chord, Compound, Expression, Note, Polyphonic, Rest, Text, TimeSignature,
};
pub use pitch::Pitch;
pub use score::{LyFile, Staff, StaffGroup, TopExpression};
pub use typesetter::RenderSettings;
