//! Typed view of the DMARC aggregate-report structure we read.
//!
//! ```text
//! feedback
//! └── record*
//!     └── row
//!         ├── source_ip
//!         └── policy_evaluated
//!             ├── disposition
//!             ├── dkim
//!             └── spf
//! ```
//!
//! Every non-repeated element must occur exactly once under its parent.
//! Elements are matched by local name so namespaced reports decode too.

use crate::error::SchemaError;
use crate::models::AuthResult;
use roxmltree::{Document, Node};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Feedback {
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub row: Row,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub source_ip: String,
    pub policy_evaluated: PolicyEvaluated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyEvaluated {
    pub disposition: String,
    pub dkim: String,
    pub spf: String,
}

impl Feedback {
    /// Decode the root `<feedback>` element and all of its `<record>` children.
    pub fn decode(doc: &Document<'_>) -> Result<Self, SchemaError> {
        let root = doc.root_element();
        if root.tag_name().name() != "feedback" {
            return Err(SchemaError::MissingFeedback {
                found: root.tag_name().name().to_string(),
            });
        }

        let records = root
            .children()
            .filter(|n| is_named(n, "record"))
            .enumerate()
            .map(|(index, node)| Record::decode(node, &format!("record[{index}]")))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { records })
    }
}

impl Record {
    fn decode(node: Node<'_, '_>, path: &str) -> Result<Self, SchemaError> {
        let row_path = format!("{path}.row");
        let row = exactly_one(node, "row", &row_path)?;
        Ok(Self {
            row: Row::decode(row, &row_path)?,
        })
    }
}

impl Row {
    fn decode(node: Node<'_, '_>, path: &str) -> Result<Self, SchemaError> {
        let policy_path = format!("{path}.policy_evaluated");
        Ok(Self {
            source_ip: text_field(node, "source_ip", path)?,
            policy_evaluated: PolicyEvaluated::decode(
                exactly_one(node, "policy_evaluated", &policy_path)?,
                &policy_path,
            )?,
        })
    }
}

impl PolicyEvaluated {
    fn decode(node: Node<'_, '_>, path: &str) -> Result<Self, SchemaError> {
        Ok(Self {
            disposition: text_field(node, "disposition", path)?,
            dkim: text_field(node, "dkim", path)?,
            spf: text_field(node, "spf", path)?,
        })
    }
}

impl From<Record> for AuthResult {
    fn from(record: Record) -> Self {
        let Row {
            source_ip,
            policy_evaluated,
        } = record.row;
        Self {
            source: source_ip,
            dkim: policy_evaluated.dkim,
            spf: policy_evaluated.spf,
            disposition: policy_evaluated.disposition,
        }
    }
}

fn is_named(node: &Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

fn exactly_one<'a, 'input: 'a>(
    parent: Node<'a, 'input>,
    name: &str,
    path: &str,
) -> Result<Node<'a, 'input>, SchemaError> {
    let mut matches = parent.children().filter(|n| is_named(n, name));
    let first = matches.next().ok_or_else(|| SchemaError::Missing {
        path: path.to_string(),
    })?;

    let extra = matches.count();
    if extra > 0 {
        return Err(SchemaError::Ambiguous {
            path: path.to_string(),
            count: extra + 1,
        });
    }

    Ok(first)
}

/// Trimmed text content of the single child `name` of `parent`.
fn text_field(parent: Node<'_, '_>, name: &str, parent_path: &str) -> Result<String, SchemaError> {
    let path = format!("{parent_path}.{name}");
    let node = exactly_one(parent, name, &path)?;
    let text: String = node
        .descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect();
    Ok(text.trim().to_string())
}
