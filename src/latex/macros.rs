//! Macro store: parse `\def` / `\newcommand` preamble lines into name → body
//! mappings.
//!
//! The parser is intentionally shallow. A body ends at the first `}` after
//! its opening `{` (no nested-brace balancing), and the `[n]` argument-count
//! specifier of `\newcommand` is skipped without being read. Lines that do not
//! fit the expected shape produce no entry; that is a normal outcome.

use super::scan::{leading_group, strip_comment, strip_control_word};
use std::collections::BTreeMap;
use tracing::trace;

/// Which directive produced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacroKind {
    /// `\def\name{body}`.
    Def,
    /// `\newcommand{\name}[n]{body}`; `has_arg_spec` records whether the
    /// bracketed argument specifier was present.
    NewCommand { has_arg_spec: bool },
}

/// One parsed definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroEntry {
    pub name: String,
    pub body: String,
    pub kind: MacroKind,
}

impl MacroEntry {
    /// Whether the entry can be inlined by plain text substitution.
    ///
    /// `\def` macros and `\newcommand`s without an argument specifier take
    /// no parameters. Everything else needs real macro expansion.
    ///
    /// Treating `\newcommand{\x}{Y}` as plain is what lets a table using
    /// `\x` build with `Y` inlined instead of being rejected; only
    /// `\newcommand{\x}[n]{…}` marks a command.
    pub fn is_plain(&self) -> bool {
        !matches!(self.kind, MacroKind::NewCommand { has_arg_spec: true })
    }
}

/// Parse one preamble line.
///
/// The line should already have its `%` comment removed; surrounding
/// whitespace is ignored.
///
/// ```
/// use latex2image::latex::macros::parse_directive;
///
/// let entry = parse_directive(r"\newcommand{\foo}[1]{#1x}").unwrap();
/// assert_eq!(entry.name, r"\foo");
/// assert_eq!(entry.body, "#1x");
/// ```
pub fn parse_directive(line: &str) -> Option<MacroEntry> {
    let line = line.trim();
    if let Some(rest) = strip_control_word(line, r"\def") {
        parse_def(rest)
    } else if let Some(rest) = strip_control_word(line, r"\newcommand") {
        parse_newcommand(rest)
    } else {
        None
    }
}

fn parse_def(rest: &str) -> Option<MacroEntry> {
    let rest = rest.trim_start();
    let name_end = rest.find(|c: char| c.is_whitespace() || c == '{')?;
    let name = &rest[..name_end];
    let (body, _) = leading_group(rest[name_end..].trim_start(), '{', '}')?;

    entry(name, body, MacroKind::Def)
}

fn parse_newcommand(rest: &str) -> Option<MacroEntry> {
    let rest = rest.strip_prefix('*').unwrap_or(rest).trim_start();
    let (name, rest) = leading_group(rest, '{', '}')?;

    let (has_arg_spec, rest) = match leading_group(rest, '[', ']') {
        Some((_, after)) => (true, after),
        None => (false, rest),
    };
    let (body, _) = leading_group(rest, '{', '}')?;

    entry(name, body, MacroKind::NewCommand { has_arg_spec })
}

fn entry(name: &str, body: &str, kind: MacroKind) -> Option<MacroEntry> {
    if name.is_empty() || body.is_empty() {
        return None;
    }
    Some(MacroEntry {
        name: name.to_string(),
        body: body.to_string(),
        kind,
    })
}

/// Plain macros and parameterised commands collected from a preamble.
///
/// Both maps are ordered so every run substitutes in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroStore {
    macros: BTreeMap<String, String>,
    commands: BTreeMap<String, String>,
}

impl MacroStore {
    /// Parse every line of a resolved preamble. Later definitions win.
    pub fn from_preamble(preamble: &str) -> Self {
        let mut store = Self::default();
        for line in preamble.trim().lines() {
            if let Some(entry) = parse_directive(strip_comment(line)) {
                store.insert(entry);
            }
        }
        store
    }

    /// Add an entry, replacing any earlier definition of the same name.
    pub fn insert(&mut self, entry: MacroEntry) {
        if entry.is_plain() {
            self.commands.remove(&entry.name);
            trace!("Macro added to map: {} -> {}", entry.name, entry.body);
            self.macros.insert(entry.name, entry.body);
        } else {
            self.macros.remove(&entry.name);
            trace!("Command added to map: {} -> {}", entry.name, entry.body);
            self.commands.insert(entry.name, entry.body);
        }
    }

    pub fn macros(&self) -> &BTreeMap<String, String> {
        &self.macros
    }

    pub fn commands(&self) -> &BTreeMap<String, String> {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty() && self.commands.is_empty()
    }

    /// First command name occurring in `text` as a literal substring.
    pub fn find_command_in(&self, text: &str) -> Option<&str> {
        self.commands
            .keys()
            .find(|name| text.contains(name.as_str()))
            .map(String::as_str)
    }

    /// Replace every plain-macro name in `text` with its body.
    ///
    /// Longer names go first so `\foo` cannot eat the prefix of a defined
    /// `\foobar`; equal lengths fall back to name order.
    pub fn substitute(&self, text: &str) -> String {
        let mut ordered: Vec<(&String, &String)> = self.macros.iter().collect();
        ordered.sort_by(|a, b| b.0.len().cmp(&a.0.len()).then_with(|| a.0.cmp(b.0)));

        ordered
            .into_iter()
            .fold(text.to_string(), |acc, (name, body)| acc.replace(name.as_str(), body))
    }
}
