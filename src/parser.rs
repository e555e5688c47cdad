//! Installation script parser.
//!
//! Scripts are line-oriented, one instruction per line:
//! ```text
//! # unpack and register
//! EXTRACT app-1.2.3.zip
//! MOVE "app/Program Files/app.exe" bin/app.exe
//! CHMOD bin/app.exe
//! ADD_TO_PATH bin
//! ```
//!
//! A `"` or `'` at the start of a word opens a quoted span that runs to the
//! matching quote, spaces included. Backslashes are plain characters.

use thiserror::Error;

use crate::instruction::{Instruction, InstructionKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no valid instructions found")]
    NoInstructions,
    #[error("line {line}: invalid command '{command}'")]
    InvalidCommand { line: usize, command: String },
    #[error("line {line}: {keyword} requires {expected}, got {found}")]
    Arity {
        line: usize,
        keyword: InstructionKind,
        expected: &'static str,
        found: usize,
    },
    #[error("line {line}: unclosed quote")]
    UnclosedQuote { line: usize },
}

/// Script parser. Has no side effects.
#[derive(Debug, Clone)]
pub struct Parser {
    /// Skip lines starting with `#`.
    pub allow_comments: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            allow_comments: true,
        }
    }
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_comments(mut self, allow: bool) -> Self {
        self.allow_comments = allow;
        self
    }

    /// Parse a whole script. Fails on the first bad line; never returns a
    /// partial list.
    pub fn parse(&self, script: &str) -> Result<Vec<Instruction>, ParseError> {
        let mut instructions = Vec::new();

        for (idx, line) in script.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || (self.allow_comments && line.starts_with('#')) {
                continue;
            }
            instructions.push(parse_line(line, idx + 1)?);
        }

        if instructions.is_empty() {
            return Err(ParseError::NoInstructions);
        }

        Ok(instructions)
    }
}

/// Parse with default settings.
pub fn parse(script: &str) -> Result<Vec<Instruction>, ParseError> {
    Parser::default().parse(script)
}

fn parse_line(line: &str, line_no: usize) -> Result<Instruction, ParseError> {
    let mut tokens = split_args(line, line_no)?.into_iter();

    let command = tokens.next().ok_or(ParseError::NoInstructions)?;
    let kind = InstructionKind::from_keyword(&command).ok_or_else(|| ParseError::InvalidCommand {
        line: line_no,
        command: command.clone(),
    })?;

    let args: Vec<String> = tokens.collect();
    if !kind.arity().contains(&args.len()) {
        return Err(ParseError::Arity {
            line: line_no,
            keyword: kind,
            expected: kind.arity_description(),
            found: args.len(),
        });
    }

    Ok(Instruction {
        kind,
        args,
        raw: line.to_string(),
        line: line_no,
    })
}

/// Split a line on unquoted spaces and tabs.
///
/// Quotes only open at a word boundary (start of line or after whitespace);
/// a quote inside a word is kept as a literal character.
pub fn split_args(line: &str, line_no: usize) -> Result<Vec<String>, ParseError> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if (c == '"' || c == '\'') && matches!(prev, None | Some(' ' | '\t')) => {
                quote = Some(c)
            }
            None if c == ' ' || c == '\t' => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            None => current.push(c),
        }
        prev = Some(c);
    }

    if quote.is_some() {
        return Err(ParseError::UnclosedQuote { line: line_no });
    }
    if !current.is_empty() {
        parts.push(current);
    }

    Ok(parts)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(input: &str) -> Vec<Vec<String>> {
        parse(input).unwrap().into_iter().map(|i| i.args).collect()
    }

    #[test]
    fn test_basic_script() {
        let instructions = parse("EXTRACT app.zip\nADD_TO_PATH bin").unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[0].kind, InstructionKind::Extract);
        assert_eq!(instructions[1].kind, InstructionKind::AddToPath);
        assert_eq!(instructions[0].line, 1);
        assert_eq!(instructions[1].line, 2);
        assert_eq!(instructions[1].raw, "ADD_TO_PATH bin");
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let script = "# header\n\n  EXTRACT app.zip  \n# tail\n";
        let instructions = parse(script).unwrap();
        assert_eq!(instructions.len(), 1);
        assert_eq!(instructions[0].line, 3);
        assert_eq!(instructions[0].raw, "EXTRACT app.zip");
    }

    #[test]
    fn test_comments_disabled() {
        let err = Parser::new().allow_comments(false).parse("# note\nEXTRACT a.zip").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidCommand {
                line: 1,
                command: "#".to_string()
            }
        );
    }

    #[test]
    fn test_quoted_arguments() {
        assert_eq!(
            args(r#"MOVE "Program Files/app" bin/app"#),
            [["Program Files/app", "bin/app"]]
        );
        assert_eq!(
            args("COPY 'my file.txt' 'backup/my file.txt'"),
            [["my file.txt", "backup/my file.txt"]]
        );
        assert_eq!(
            args(r#"EXTRACT "my archive.zip" 'output folder'"#),
            [["my archive.zip", "output folder"]]
        );
    }

    #[test]
    fn test_backslashes_are_literal() {
        assert_eq!(
            args(r#"MOVE "C:\Program Files\app.exe" "D:\My Apps\app.exe""#),
            [[r"C:\Program Files\app.exe", r"D:\My Apps\app.exe"]]
        );
        assert_eq!(
            args(r"COPY app/bin\file.txt backup\app/file.txt"),
            [[r"app/bin\file.txt", r"backup\app/file.txt"]]
        );
    }

    #[test]
    fn test_quotes_after_tabs() {
        assert_eq!(args("MOVE\t\"a b\" c"), [["a b", "c"]]);
        assert_eq!(args("COPY\t'x y'\t\"z w\""), [["x y", "z w"]]);
    }

    #[test]
    fn test_quote_inside_word_is_literal() {
        assert_eq!(args("DELETE it's"), [["it's"]]);
    }

    #[test]
    fn test_unclosed_quote() {
        assert_eq!(
            parse("DELETE \"half open").unwrap_err(),
            ParseError::UnclosedQuote { line: 1 }
        );
    }

    #[test]
    fn test_arity_violations() {
        for input in [
            "EXTRACT",
            "EXTRACT a b c",
            "ADD_TO_PATH",
            "ADD_TO_PATH a b",
            "MOVE source",
            "COPY",
            "RUN_SCRIPT",
        ] {
            assert!(
                matches!(parse(input), Err(ParseError::Arity { .. })),
                "expected arity error for {input:?}"
            );
        }
    }

    #[test]
    fn test_arity_error_names_keyword_and_line() {
        let err = parse("EXTRACT a.zip\nEXTRACT a b c").unwrap_err();
        assert_eq!(
            err.to_string(),
            "line 2: EXTRACT requires 1-2 arguments (source [destination]), got 3"
        );
    }

    #[test]
    fn test_invalid_command() {
        let err = parse("EXTRACT a.zip\nsome text EXTRACT app.zip").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidCommand {
                line: 2,
                command: "some".to_string()
            }
        );
    }

    #[test]
    fn test_empty_scripts() {
        assert_eq!(parse("").unwrap_err(), ParseError::NoInstructions);
        assert_eq!(parse("   \n\t\n  \n").unwrap_err(), ParseError::NoInstructions);
        assert_eq!(parse("# a\n# b").unwrap_err(), ParseError::NoInstructions);
    }

    #[test]
    fn test_mixed_case_and_unicode() {
        let instructions = parse("extract файл.zip\nmove 文件.txt backup/").unwrap();
        assert_eq!(instructions[0].kind, InstructionKind::Extract);
        assert_eq!(instructions[0].args, ["файл.zip"]);
        assert_eq!(instructions[1].kind, InstructionKind::Move);
    }

    #[test]
    fn test_complete_flow() {
        let script = r#"# Download and extract main application
EXTRACT app-v1.2.3.zip
CHMOD app/bin/myapp

EXTRACT_TARGZ libs.tar.gz libs/
COPY config/default.conf app/config.conf
MOVE app/ /opt/myapp
ADD_TO_PATH /opt/myapp/bin
SET_LOCATION app/
RUN_SCRIPT setup.sh --quiet
DELETE libs.tar.gz"#;
        let kinds: Vec<_> = parse(script).unwrap().iter().map(|i| i.kind).collect();
        assert_eq!(
            kinds,
            [
                InstructionKind::Extract,
                InstructionKind::Chmod,
                InstructionKind::ExtractTarGz,
                InstructionKind::Copy,
                InstructionKind::Move,
                InstructionKind::AddToPath,
                InstructionKind::SetLocation,
                InstructionKind::RunScript,
                InstructionKind::Delete,
            ]
        );
    }

    #[test]
    fn test_crlf_line_endings() {
        let instructions = parse("EXTRACT a.zip\r\nCHMOD bin/a\r\n").unwrap();
        assert_eq!(instructions.len(), 2);
        assert_eq!(instructions[1].args, ["bin/a"]);
    }
}
