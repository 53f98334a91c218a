// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration: startup matchers, stop directives, console
//! line matching.
//!
//! A [`LinePattern`] decides when a booting server is done starting and
//! whether a console line is the configured stop command. Patterns have a
//! canonical string form: `regex:` prefixed for regular expressions, glob
//! syntax when the string contains glob metacharacters, and a literal
//! line prefix otherwise.

use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::sync::LazyLock;
use thiserror::Error;

/// CSI/OSC escape sequences: ESC (0x1B) or single-byte CSI (0x9B), an
/// optional intermediate from `[ ] ( ) # ; ?`, then either an OSC payload
/// terminated by BEL or a parameter sequence terminated by a final byte.
const ANSI_PATTERN: &str = "[\u{1b}\u{9b}][\\[\\]()#;?]*(?:(?:[a-zA-Z\\d]*(?:;[a-zA-Z\\d]*)*)?\u{7}|(?:\\d{1,4}(?:;\\d{0,4})*)?[\\dA-PRZcf-ntqry=><~])";

#[allow(clippy::expect_used)]
static ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(ANSI_PATTERN).expect("static pattern compiles"));

/// Remove ANSI CSI/OSC sequences from a console line.
pub fn strip_ansi(line: &str) -> Cow<'_, str> {
    ANSI.replace_all(line, "")
}

/// Error produced when a pattern string fails to compile.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("invalid glob pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        source: glob::PatternError,
    },
    #[error("invalid regex pattern {pattern:?}: {source}")]
    Regex {
        pattern: String,
        source: Box<regex::Error>,
    },
}

/// A console line matcher.
#[derive(Debug, Clone)]
pub enum LinePattern {
    /// Matches any line beginning with the literal string.
    Prefix(String),
    /// Matches the whole line against a glob.
    Glob(glob::Pattern),
    /// Matches anywhere in the line.
    Regex(Box<Regex>),
}

impl LinePattern {
    /// Parse the canonical string form.
    ///
    /// `regex:` selects a regular expression; a string containing `*`,
    /// `?` or `[` is compiled as a glob; anything else is a literal
    /// line prefix.
    pub fn parse(s: &str) -> Result<Self, PatternError> {
        if let Some(expr) = s.strip_prefix("regex:") {
            let re = Regex::new(expr).map_err(|source| PatternError::Regex {
                pattern: s.to_string(),
                source: Box::new(source),
            })?;
            return Ok(LinePattern::Regex(Box::new(re)));
        }
        if s.contains(['*', '?', '[']) {
            let pat = glob::Pattern::new(s).map_err(|source| PatternError::Glob {
                pattern: s.to_string(),
                source,
            })?;
            return Ok(LinePattern::Glob(pat));
        }
        Ok(LinePattern::Prefix(s.to_string()))
    }

    /// Whether the (already stripped, when configured) line matches.
    pub fn matches(&self, line: &str) -> bool {
        match self {
            LinePattern::Prefix(prefix) => line.starts_with(prefix.as_str()),
            LinePattern::Glob(pattern) => pattern.matches(line),
            LinePattern::Regex(re) => re.is_match(line),
        }
    }
}

impl fmt::Display for LinePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinePattern::Prefix(prefix) => f.write_str(prefix),
            LinePattern::Glob(pattern) => f.write_str(pattern.as_str()),
            LinePattern::Regex(re) => write!(f, "regex:{}", re.as_str()),
        }
    }
}

impl PartialEq for LinePattern {
    fn eq(&self, other: &Self) -> bool {
        // canonical forms are comparable across variants
        self.to_string() == other.to_string()
            && std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Serialize for LinePattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for LinePattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        LinePattern::parse(&s).map_err(de::Error::custom)
    }
}

/// How a booting server signals that it has finished starting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StartupConfiguration {
    /// Matched in declared order against each console line while Starting.
    pub done: Vec<LinePattern>,
    /// Strip ANSI escape sequences before matching.
    pub strip_ansi: bool,
}

/// How a running server is asked to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopType {
    /// Deliver a signal named by the directive value.
    #[default]
    Signal,
    /// Write the directive value to the process input stream.
    Command,
}

crate::simple_display! {
    StopType {
        Signal => "signal",
        Command => "command",
    }
}

/// Stop directive for a server process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfiguration {
    #[serde(rename = "type")]
    pub kind: StopType,
    /// Signal name or literal command text, depending on `kind`.
    pub value: String,
}

/// Startup and stop behavior for a server process, as configured by the
/// control plane.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfiguration {
    pub startup: StartupConfiguration,
    pub stop: StopConfiguration,
}

#[cfg(test)]
#[path = "process_tests.rs"]
mod tests;
