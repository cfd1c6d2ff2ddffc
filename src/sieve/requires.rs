/// Extension usage tracking.
///
/// Each node kind declares the extensions it depends on; the tracker walks a
/// tree and counts them. Counting rather than flagging lets an editor tell
/// whether removing a node drops the last user of an extension.
use std::collections::BTreeMap;

use crate::sieve::ast::Node;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Requirements {
    used: BTreeMap<String, usize>,
}

impl Requirements {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregates the requirements of `nodes` and all their descendants.
    pub fn collect(nodes: &[Box<dyn Node>]) -> Self {
        let mut requires = Self::new();
        for node in nodes {
            requires.add_tree(node.as_ref());
        }
        requires
    }

    pub fn add_tree(&mut self, node: &dyn Node) {
        node.walk(&mut |n| n.requires(self));
    }

    pub fn require(&mut self, extension: &str) {
        *self.used.entry(extension.to_string()).or_default() += 1;
    }

    pub fn is_required(&self, extension: &str) -> bool {
        self.count(extension) > 0
    }

    /// Number of nodes depending on `extension`.
    pub fn count(&self, extension: &str) -> usize {
        self.used.get(extension).copied().unwrap_or(0)
    }

    /// Used extensions, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.used.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }

    pub fn to_map(&self) -> BTreeMap<String, bool> {
        self.used.keys().map(|k| (k.clone(), true)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts() {
        let mut requires = Requirements::new();
        assert!(requires.is_empty());
        requires.require("imap4flags");
        requires.require("imap4flags");
        requires.require("fileinto");
        assert_eq!(requires.count("imap4flags"), 2);
        assert!(requires.is_required("fileinto"));
        assert!(!requires.is_required("reject"));
        assert_eq!(requires.names(), ["fileinto", "imap4flags"]);
        assert_eq!(requires.to_map().get("imap4flags"), Some(&true));
    }
}
