//! Plain-text descriptor format handed to the analysis agents.
//!
//! ```text
//! Product Name: <name>
//! Price: <price>
//! Description: <first description line>
//!   <further description lines, indented by two spaces>
//! Features:
//!  - <feature>
//! ```
//!
//! The `Features:` block is present only when the record lists features.
//! Name, price and features are single-line: `\r` and `\n` inside them are
//! replaced by spaces, all other characters are kept. The description keeps
//! its line breaks (`\r\n` is written as `\n`); every continuation line is
//! indented, so body text can never be read back as a label.

use std::fmt::Write as _;

use crate::types::ResultRecord;

const NAME: &str = "Product Name: ";
const PRICE: &str = "Price: ";
const DESCRIPTION: &str = "Description: ";
const CONTINUATION: &str = "  ";
const FEATURES: &str = "Features:";
const FEATURE_ITEM: &str = " - ";

const MISSING: &str = "N/A";
const MISSING_DESCRIPTION: &str = "No description available.";

/// The four fields a descriptor file carries, as written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub price: String,
    pub description: String,
    pub features: Vec<String>,
}

impl Descriptor {
    pub fn from_record(record: &ResultRecord) -> Self {
        Self {
            name: single_line(record.name.as_deref().unwrap_or(MISSING)),
            price: single_line(record.price.as_deref().unwrap_or(MISSING)),
            description: record
                .description
                .as_deref()
                .unwrap_or(MISSING_DESCRIPTION)
                .replace("\r\n", "\n"),
            features: record.features.iter().map(|f| single_line(f)).collect(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        // Writing to a String cannot fail.
        let _ = writeln!(out, "{NAME}{}", self.name);
        let _ = writeln!(out, "{PRICE}{}", self.price);
        let mut body = self.description.split('\n');
        let _ = writeln!(out, "{DESCRIPTION}{}", body.next().unwrap_or_default());
        for line in body {
            let _ = writeln!(out, "{CONTINUATION}{line}");
        }
        if !self.features.is_empty() {
            let _ = writeln!(out, "{FEATURES}");
            for feature in &self.features {
                let _ = writeln!(out, "{FEATURE_ITEM}{feature}");
            }
        }
        out
    }

    /// Parse a rendered descriptor. Returns `None` if the label lines are
    /// missing or out of order, or if an unexpected line follows them.
    pub fn parse(text: &str) -> Option<Self> {
        let mut lines = text.split('\n');
        let name = lines.next()?.strip_prefix(NAME)?.to_string();
        let price = lines.next()?.strip_prefix(PRICE)?.to_string();
        let mut description = lines.next()?.strip_prefix(DESCRIPTION)?.to_string();
        let mut features = Vec::new();
        let mut in_features = false;

        // `render` ends every line with `\n`, so the last piece is empty.
        let mut rest: Vec<&str> = lines.collect();
        if rest.last() == Some(&"") {
            rest.pop();
        }

        for line in rest {
            if in_features {
                features.push(line.strip_prefix(FEATURE_ITEM)?.to_string());
            } else if line == FEATURES {
                in_features = true;
            } else {
                description.push('\n');
                description.push_str(line.strip_prefix(CONTINUATION)?);
            }
        }

        Some(Self {
            name,
            price,
            description,
            features,
        })
    }
}

fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}
