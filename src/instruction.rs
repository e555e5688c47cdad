//! Typed installation instructions.

use std::fmt;
use std::ops::RangeInclusive;

/// The closed set of operations an installation script can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InstructionKind {
    Extract,
    ExtractTar,
    ExtractTarGz,
    Move,
    Copy,
    Rename,
    Delete,
    Chmod,
    AddToPath,
    SetLocation,
    RunScript,
}

impl InstructionKind {
    pub const ALL: [InstructionKind; 11] = [
        InstructionKind::Extract,
        InstructionKind::ExtractTar,
        InstructionKind::ExtractTarGz,
        InstructionKind::Move,
        InstructionKind::Copy,
        InstructionKind::Rename,
        InstructionKind::Delete,
        InstructionKind::Chmod,
        InstructionKind::AddToPath,
        InstructionKind::SetLocation,
        InstructionKind::RunScript,
    ];

    /// Script keyword, as written in upper case.
    pub fn keyword(self) -> &'static str {
        match self {
            InstructionKind::Extract => "EXTRACT",
            InstructionKind::ExtractTar => "EXTRACT_TAR",
            InstructionKind::ExtractTarGz => "EXTRACT_TARGZ",
            InstructionKind::Move => "MOVE",
            InstructionKind::Copy => "COPY",
            InstructionKind::Rename => "RENAME",
            InstructionKind::Delete => "DELETE",
            InstructionKind::Chmod => "CHMOD",
            InstructionKind::AddToPath => "ADD_TO_PATH",
            InstructionKind::SetLocation => "SET_LOCATION",
            InstructionKind::RunScript => "RUN_SCRIPT",
        }
    }

    /// Case-insensitive keyword lookup. `EXTRACT_TAR_GZ` is accepted as an
    /// alias of `EXTRACT_TARGZ`.
    pub fn from_keyword(word: &str) -> Option<Self> {
        let upper = word.to_ascii_uppercase();
        if upper == "EXTRACT_TAR_GZ" {
            return Some(InstructionKind::ExtractTarGz);
        }
        Self::ALL.into_iter().find(|k| k.keyword() == upper)
    }

    /// Valid argument counts.
    pub fn arity(self) -> RangeInclusive<usize> {
        match self {
            InstructionKind::Extract | InstructionKind::ExtractTar | InstructionKind::ExtractTarGz => 1..=2,
            InstructionKind::Move | InstructionKind::Copy | InstructionKind::Rename => 2..=2,
            InstructionKind::Delete
            | InstructionKind::Chmod
            | InstructionKind::AddToPath
            | InstructionKind::SetLocation => 1..=1,
            InstructionKind::RunScript => 1..=usize::MAX,
        }
    }

    /// Human-readable arity, e.g. "1-2 arguments (source [destination])".
    pub fn arity_description(self) -> &'static str {
        match self {
            InstructionKind::Extract | InstructionKind::ExtractTar | InstructionKind::ExtractTarGz => {
                "1-2 arguments (source [destination])"
            }
            InstructionKind::Move | InstructionKind::Copy | InstructionKind::Rename => {
                "exactly 2 arguments (source destination)"
            }
            InstructionKind::Delete
            | InstructionKind::Chmod
            | InstructionKind::AddToPath
            | InstructionKind::SetLocation => "exactly 1 argument",
            InstructionKind::RunScript => "at least 1 argument (script [args...])",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// One parsed, arity-checked script line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub kind: InstructionKind,
    pub args: Vec<String>,
    /// The trimmed source line.
    pub raw: String,
    /// 1-based line number in the script.
    pub line: usize,
}

impl Instruction {
    /// First argument; empty when the instruction has none.
    pub fn source(&self) -> &str {
        self.args.first().map_or("", String::as_str)
    }

    /// Second argument, when given.
    pub fn destination(&self) -> Option<&str> {
        self.args.get(1).map(String::as_str)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.raw)
    }
}
