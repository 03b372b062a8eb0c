//! Standalone document assembly for a single table fragment.

use super::macros::MacroStore;
use super::scan::strip_comment;
use tracing::debug;

/// Result of preparing one fragment for compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Complete `standalone` document ready for the compiler.
    Built(String),
    /// The fragment uses a parameterised command that plain substitution
    /// cannot expand.
    Rejected { command: String },
}

/// Turns fragments into compilable documents against one preamble.
///
/// The preamble is parsed once; the builder is then reused for every
/// fragment of the document.
#[derive(Debug, Clone)]
pub struct FragmentBuilder {
    preamble: String,
    store: MacroStore,
}

impl FragmentBuilder {
    pub fn new(preamble: &str) -> Self {
        let store = MacroStore::from_preamble(preamble);
        debug!(
            "Fragment builder: {} macros, {} commands",
            store.macros().len(),
            store.commands().len()
        );
        Self {
            preamble: preamble.to_string(),
            store,
        }
    }

    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn store(&self) -> &MacroStore {
        &self.store
    }

    pub fn build(&self, fragment: &str) -> BuildOutcome {
        if let Some(command) = self.store.find_command_in(fragment) {
            return BuildOutcome::Rejected {
                command: command.to_string(),
            };
        }

        let body = normalize_lines(&self.store.substitute(fragment));
        BuildOutcome::Built(standalone_document(&self.preamble, &body))
    }
}

/// One-shot form of [`FragmentBuilder::build`].
pub fn build_document(preamble: &str, fragment: &str) -> BuildOutcome {
    FragmentBuilder::new(preamble).build(fragment)
}

/// Strip `%` comments and drop lines left empty.
pub fn normalize_lines(text: &str) -> String {
    text.lines()
        .map(strip_comment)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn standalone_document(preamble: &str, body: &str) -> String {
    format!("\\documentclass{{standalone}}\n{preamble}\n\\begin{{document}}\n{body}\n\\end{{document}}")
}
