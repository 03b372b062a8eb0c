//! Ground-truth labels written next to each rendered table.

use super::scan::ends_control_word;
use serde::{Deserialize, Serialize};

const ROW_BREAK: &str = r"\\";

/// How the `ground_truth` field of a dataset record is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelFormat {
    /// Normalised LaTeX source of the fragment.
    #[default]
    Raw,
    /// Token-tagged structure (`<s_table>`, `<s_row>`, `<s_column>` …).
    Tagged,
}

impl LabelFormat {
    pub fn render(self, fragment: &str) -> String {
        match self {
            LabelFormat::Raw => normalize_ground_truth(fragment),
            LabelFormat::Tagged => to_tagged(fragment),
        }
    }
}

impl std::str::FromStr for LabelFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(LabelFormat::Raw),
            "tagged" => Ok(LabelFormat::Tagged),
            other => Err(format!("unknown label format '{other}' (expected raw or tagged)")),
        }
    }
}

/// `\cr` becomes `\\` and carriage returns are removed. Newlines stay.
pub fn normalize_ground_truth(fragment: &str) -> String {
    replace_cr(fragment).replace('\r', "")
}

/// Replace the `\cr` control word with `\\`.
///
/// Longer control words (`\cref`, `\crossmark`) and the `cr` that follows
/// an escaped backslash (`\\cr`) are left alone.
fn replace_cr(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix(r"\cr").filter(|a| ends_control_word(a)) {
            out.push_str(ROW_BREAK);
            rest = after;
        } else {
            // Copy the backslash with the character it escapes.
            let len = tail[1..].chars().next().map_or(1, |c| 1 + c.len_utf8());
            out.push_str(&tail[..len]);
            rest = &tail[len..];
        }
    }
    out.push_str(rest);
    out
}

/// Encode a `tabular` fragment as a flat tag sequence.
///
/// Lines are trimmed and blank lines dropped. The `tabular` tags become
/// `<s_table>` / `</s_table>` and braces on those lines mark the column
/// specification. A line ending in `\\` is a row whose `&`-separated cells
/// become `<s_column>` items; any other line is an `<s_attribute>`
/// (rules such as `\hline`, captions, stray text). Row breaks are then
/// dropped from the output.
///
/// ```
/// use latex2image::latex::label::to_tagged;
///
/// let tagged = to_tagged("\\begin{tabular}{cc}\n\\hline\na & b \\\\\n\\end{tabular}");
/// assert_eq!(
///     tagged,
///     "<s_table><s_column_type>cc</s_column_type>\
///      <s_attribute>\\hline</s_attribute>\
///      <s_row><s_column>a</s_column><s_column>b</s_column></s_row>\
///      </s_table>"
/// );
/// ```
pub fn to_tagged(fragment: &str) -> String {
    let text = fragment
        .replace(r"\begin{tabular}", "<s_table>")
        .replace(r"\end{tabular}", "</s_table>");
    let text = replace_cr(&text).replace('\r', "");

    let mut out = String::with_capacity(text.len() * 2);
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.contains("s_table") {
            out.push_str(
                &line
                    .replace('{', "<s_column_type>")
                    .replace('}', "</s_column_type>"),
            );
        } else if let Some(row) = line.strip_suffix(ROW_BREAK) {
            out.push_str("<s_row>");
            for cell in row.split('&') {
                out.push_str("<s_column>");
                out.push_str(cell.trim());
                out.push_str("</s_column>");
            }
            out.push_str("</s_row>");
        } else {
            out.push_str("<s_attribute>");
            out.push_str(line);
            out.push_str("</s_attribute>");
        }
    }

    out.replace(ROW_BREAK, "")
}
