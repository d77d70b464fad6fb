use crate::error::LibResult;
use crate::notation::expression::{Compound, Text};
use crate::notation::pitch::{Pitch, RELATIVE_BASE};
use crate::notation::typesetter::{RenderSettings, Typesetter};
use snafu::ResultExt;
use std::io::Write;

/// A named single line of music.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Staff {
    name: String,
    music: Compound,
}

impl Staff {
    pub fn new<S: Into<String>>(name: S, music: Compound) -> Self {
        Self {
            name: name.into(),
            music,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn music(&self) -> &Compound {
        &self.music
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        // a staff is a fresh music stream
        w.reset_staff_state();
        write!(w, "\\new Staff = \"{}\" ", self.name).context(wr!())?;
        if w.relative() {
            Text::new(format!(
                "\\relative {} ",
                Pitch::new(RELATIVE_BASE).absolute()
            ))
            .write(w)?;
        }
        self.music.write(w)
    }
}

/// A bracket joining staves that play simultaneously.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StaffGroup {
    staves: Vec<Staff>,
}

impl StaffGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, staff: Staff) {
        self.staves.push(staff);
    }

    pub fn staves(&self) -> &[Staff] {
        &self.staves
    }

    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        write!(w, "\\new StaffGroup <<\n\n").context(wr!())?;
        for (i, staff) in self.staves.iter().enumerate() {
            if i > 0 {
                write!(w, "\n\n").context(wr!())?;
            }
            staff.write(w)?;
        }
        write!(w, "\n\n>>").context(wr!())
    }
}

/// A top-level element of a LilyPond file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TopExpression {
    Staff(Staff),
    StaffGroup(StaffGroup),
}

impl TopExpression {
    pub(crate) fn write<W: Write>(&self, w: &mut Typesetter<W>) -> LibResult<()> {
        match self {
            TopExpression::Staff(staff) => staff.write(w),
            TopExpression::StaffGroup(group) => group.write(w),
        }
    }
}

/// A whole LilyPond source file: the version header and the top-level expressions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LyFile {
    version: String,
    children: Vec<TopExpression>,
}

impl Default for LyFile {
    fn default() -> Self {
        Self::new()
    }
}

impl LyFile {
    /// The LilyPond version the emitted source declares.
    pub const DEFAULT_VERSION: &'static str = "2.19.48";

    pub fn new() -> Self {
        Self::with_version(Self::DEFAULT_VERSION)
    }

    pub fn with_version<S: Into<String>>(version: S) -> Self {
        Self {
            version: version.into(),
            children: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn expressions(&self) -> &[TopExpression] {
        &self.children
    }

    pub fn add(&mut self, child: TopExpression) {
        self.children.push(child);
    }

    pub fn pop(&mut self) -> Option<TopExpression> {
        self.children.pop()
    }

    /// Attach a staff to the file. A single staff stands on its own; the arrival of a second
    /// staff retroactively wraps both in a staff group, and later staves join that group.
    pub fn push_staff(&mut self, staff: Staff) {
        match self.children.pop() {
            None => self.children.push(TopExpression::Staff(staff)),
            Some(TopExpression::StaffGroup(mut group)) => {
                group.add(staff);
                self.children.push(TopExpression::StaffGroup(group));
            }
            Some(TopExpression::Staff(first)) => {
                let mut group = StaffGroup::new();
                group.add(first);
                group.add(staff);
                self.children.push(TopExpression::StaffGroup(group));
            }
        }
    }

    /// Write the file as LilyPond source.
    pub fn write<W: Write>(&self, w: W, settings: &RenderSettings) -> crate::Result<()> {
        Ok(self.write_inner(w, settings)?)
    }

    fn write_inner<W: Write>(&self, w: W, settings: &RenderSettings) -> LibResult<()> {
        let mut w = Typesetter::new(w, *settings);
        write!(w, "\\version \"{}\"", self.version).context(wr!())?;
        if !self.children.is_empty() {
            write!(w, "\n\n").context(wr!())?;
            for child in &self.children {
                child.write(&mut w)?;
            }
        }
        Ok(())
    }

    /// The file as a string of LilyPond source.
    pub fn render(&self, settings: &RenderSettings) -> crate::Result<String> {
        let mut buffer = Vec::new();
        self.write(&mut buffer, settings)?;
        // the typesetter only ever writes utf8
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
