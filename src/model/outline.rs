use serde::{Deserialize, Serialize};

use crate::sieve::ast::{Node, NodeId};
use crate::sieve::rules::whitespace::Whitespace;

/// Serializable snapshot of a node and its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOutline {
    pub id: NodeId,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeOutline>,
}

impl NodeOutline {
    pub fn from_node(node: &dyn Node) -> Self {
        Self {
            id: node.id(),
            kind: node.kind().to_string(),
            text: node.text(),
            children: node.children().into_iter().map(Self::from_node).collect(),
        }
    }

    /// The same outline without whitespace and comment nodes.
    pub fn without_whitespace(&self) -> Self {
        Self {
            id: self.id,
            kind: self.kind.clone(),
            text: self.text.clone(),
            children: self
                .children
                .iter()
                .filter(|c| c.kind != Whitespace::NAME)
                .map(Self::without_whitespace)
                .collect(),
        }
    }
}
