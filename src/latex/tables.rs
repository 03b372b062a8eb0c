//! Table extraction: the first `tabular` block of every `table` environment.

use super::scan::{environments, first_environment};
use std::ops::Range;

const TABLE: &str = "table";
const TABULAR: &str = "tabular";

/// Iterator over the table fragments of a document, in document order.
///
/// Each item is the `\begin{tabular}…\end{tabular}` text (tags included) of
/// one `table` environment. Tables without a `tabular` are passed over.
pub struct TableFragments<'a> {
    text: &'a str,
    spans: std::vec::IntoIter<Range<usize>>,
}

impl<'a> TableFragments<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            spans: environments(text, TABLE).into_iter(),
        }
    }
}

impl<'a> Iterator for TableFragments<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let text = self.text;
        self.spans.by_ref().find_map(|span| {
            let table = &text[span];
            first_environment(table, TABULAR).map(|inner| &table[inner])
        })
    }
}

/// Collect every table fragment of `text`.
pub fn extract_tables(text: &str) -> Vec<String> {
    TableFragments::new(text).map(str::to_string).collect()
}
