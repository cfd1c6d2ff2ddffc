/// The script document: owner of a parsed tree.
///
/// A document owns its top-level elements, the registry they were parsed
/// with and the node id counter. Every structural edit re-scans the
/// extension requirements so [`Document::requires`] never goes stale.
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::config::LineEnding;
use crate::model::outline::NodeOutline;
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::{Error, Result};
use crate::sieve::lexer::Input;
use crate::sieve::parser::Driver;
use crate::sieve::registry::Registry;
use crate::sieve::requires::Requirements;
use crate::sieve::rules::control::{Block, Require};
use crate::sieve::rules::whitespace::Whitespace;
use crate::sieve::widget::{build_widgets, WidgetBuilder};

/// Mismatch between the `require` preamble and what the script uses.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum CapabilityWarning {
    /// Used but missing from `require`.
    Undeclared(String),
    /// Listed in `require` but never used.
    Unused(String),
    /// A `require` that follows another command.
    Misplaced(NodeId),
}

impl fmt::Display for CapabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undeclared(ext) => write!(f, "extension \"{ext}\" is used but not required"),
            Self::Unused(ext) => write!(f, "extension \"{ext}\" is required but not used"),
            Self::Misplaced(id) => write!(f, "`require` {id} follows other commands"),
        }
    }
}

pub struct Document {
    registry: Arc<Registry>,
    line_ending: LineEnding,
    elements: Vec<Box<dyn Node>>,
    next_id: u32,
    requirements: Requirements,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("line_ending", &self.line_ending)
            .field("elements", &self.elements)
            .field("next_id", &self.next_id)
            .field("requirements", &self.requirements)
            .finish_non_exhaustive()
    }
}

impl Document {
    /// An empty script.
    pub fn new(registry: Arc<Registry>) -> Self {
        Self {
            registry,
            line_ending: LineEnding::default(),
            elements: Vec::new(),
            next_id: 1,
            requirements: Requirements::new(),
        }
    }

    /// Parses `text` with the process-wide default grammar.
    pub fn parse(text: &str) -> Result<Self> {
        Self::parse_with(Registry::global(), text)
    }

    pub fn parse_with(registry: Arc<Registry>, text: &str) -> Result<Self> {
        match Self::parse_partial(registry, text) {
            (doc, None) => Ok(doc),
            (_, Some(err)) => Err(err),
        }
    }

    /// Parses as far as possible. On failure the document holds the
    /// elements parsed before the error.
    pub fn parse_partial(registry: Arc<Registry>, text: &str) -> (Self, Option<Error>) {
        let mut doc = Self::new(registry);
        let (elements, error) = {
            let cx = Context::new(&doc.registry, &mut doc.next_id, doc.line_ending);
            let mut driver = Driver::new(cx, text);
            driver.run();
            driver.finish()
        };
        doc.elements = elements;
        doc.rescan();
        (doc, error)
    }

    /// Line ending used for text the document inserts itself.
    pub fn with_line_ending(mut self, line_ending: LineEnding) -> Self {
        self.line_ending = line_ending;
        self
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn elements(&self) -> &[Box<dyn Node>] {
        &self.elements
    }

    /// Top-level commands, whitespace skipped.
    pub fn commands(&self) -> impl Iterator<Item = &dyn Node> {
        self.elements
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| !e.is::<Whitespace>())
    }

    pub fn to_script(&self) -> String {
        let mut out = String::new();
        for element in &self.elements {
            element.to_script(&mut out);
        }
        out
    }

    pub fn requirements(&self) -> &Requirements {
        &self.requirements
    }

    /// Whether any node in the tree depends on `extension`.
    pub fn requires(&self, extension: &str) -> bool {
        self.requirements.is_required(extension)
    }

    pub fn find(&self, id: NodeId) -> Option<&dyn Node> {
        self.elements.iter().find_map(|e| e.as_ref().find(id))
    }

    /// A node-building context bound to this document.
    pub fn context(&mut self) -> Context<'_> {
        Context::new(&self.registry, &mut self.next_id, self.line_ending)
    }

    /// A fresh node of rule `name` with its default text.
    pub fn create(&mut self, category: &str, name: &str) -> Result<Box<dyn Node>> {
        self.context().create(category, name)
    }

    /// Parses `text` as exactly one construct of `category`, for insertion.
    pub fn parse_fragment(&mut self, category: &str, text: &str) -> Result<Box<dyn Node>> {
        let mut cx = self.context();
        let input = Input::new(text);
        let (node, rest) = cx.parse_required(&[category], input, category)?;
        if !rest.is_empty() {
            return Err(rest.error("end of input").into());
        }
        Ok(node)
    }

    /// Inserts a top-level element at `index`, clamped to the end.
    pub fn insert(&mut self, index: usize, node: Box<dyn Node>) {
        let index = index.min(self.elements.len());
        self.elements.insert(index, node);
        self.rescan();
    }

    pub fn push(&mut self, node: Box<dyn Node>) {
        self.elements.push(node);
        self.rescan();
    }

    /// Detaches the element `id` from the top level or from any block.
    pub fn remove(&mut self, id: NodeId) -> Result<Box<dyn Node>> {
        let removed = take_element(&mut self.elements, id).ok_or(Error::NoSuchNode(id.0))?;
        self.rescan();
        Ok(removed)
    }

    /// Swaps the element `id` for `node` and returns the old element.
    pub fn replace(&mut self, id: NodeId, node: Box<dyn Node>) -> Result<Box<dyn Node>> {
        let mut slot = Some(node);
        let old = replace_element(&mut self.elements, id, &mut slot).ok_or(Error::NoSuchNode(id.0))?;
        self.rescan();
        Ok(old)
    }

    /// Runs `f` on node `id` with a context for building replacement
    /// children, then re-scans requirements.
    pub fn edit<R>(
        &mut self,
        id: NodeId,
        f: impl FnOnce(&mut dyn Node, &mut Context<'_>) -> R,
    ) -> Result<R> {
        let mut cx = Context::new(&self.registry, &mut self.next_id, self.line_ending);
        let node = self
            .elements
            .iter_mut()
            .find_map(|e| e.as_mut().find_mut(id))
            .ok_or(Error::NoSuchNode(id.0))?;
        let out = f(node, &mut cx);
        self.rescan();
        Ok(out)
    }

    fn rescan(&mut self) {
        self.requirements = Requirements::collect(&self.elements);
    }

    /// Extensions named by top-level `require` commands, sorted.
    pub fn declared(&self) -> Vec<String> {
        let declared: BTreeSet<String> = self
            .elements
            .iter()
            .filter_map(|e| e.downcast_ref::<Require>())
            .flat_map(Require::extensions)
            .collect();
        declared.into_iter().collect()
    }

    pub fn check_capabilities(&self) -> Vec<CapabilityWarning> {
        let declared: BTreeSet<String> = self.declared().into_iter().collect();
        let used: BTreeSet<String> = self.requirements.names().into_iter().map(String::from).collect();

        let mut warnings: Vec<CapabilityWarning> = used
            .difference(&declared)
            .cloned()
            .map(CapabilityWarning::Undeclared)
            .chain(declared.difference(&used).cloned().map(CapabilityWarning::Unused))
            .chain(self.misplaced_requires().into_iter().map(CapabilityWarning::Misplaced))
            .collect();
        warnings.sort();
        for warning in &warnings {
            tracing::warn!(%warning, "capability mismatch");
        }
        warnings
    }

    /// Top-level `require` commands that come after some other command.
    fn misplaced_requires(&self) -> Vec<NodeId> {
        let mut seen_command = false;
        let mut misplaced = Vec::new();
        for element in self.commands() {
            if element.is::<Require>() {
                if seen_command {
                    misplaced.push(element.id());
                }
            } else {
                seen_command = true;
            }
        }
        misplaced
    }

    /// Makes the leading `require` list exactly the used extensions:
    /// rewrites the first top-level `require`, drops any others, inserts
    /// one when missing and removes it when nothing is used. A kept
    /// `require` that follows other commands moves in front of them.
    /// Returns whether the script text changed.
    pub fn sync_require(&mut self) -> bool {
        let before = self.to_script();
        let used: Vec<String> = self.requirements.names().into_iter().map(String::from).collect();
        let used: Vec<&str> = used.iter().map(String::as_str).collect();

        let positions: Vec<usize> = self
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.is::<Require>())
            .map(|(i, _)| i)
            .collect();
        let keep_first = !used.is_empty();
        for &index in positions.iter().skip(usize::from(keep_first)).rev() {
            self.remove_with_line_break(index);
        }

        if keep_first {
            let mut cx = Context::new(&self.registry, &mut self.next_id, self.line_ending);
            match positions.first() {
                Some(&index) => {
                    if let Some(require) = self.elements[index].downcast_mut::<Require>() {
                        require.set_extensions(&mut cx, &used);
                    }
                    let first = self.elements.iter().position(|e| !e.is::<Whitespace>());
                    if let Some(first) = first.filter(|&first| first < index) {
                        let line_break = Whitespace::new(&mut cx, self.line_ending.as_str());
                        let require = self.remove_with_line_break(index);
                        self.elements.insert(first, Box::new(line_break));
                        self.elements.insert(first, require);
                    }
                }
                None => {
                    let mut require = Require::new(&mut cx);
                    require.set_extensions(&mut cx, &used);
                    let line_break = Whitespace::new(&mut cx, self.line_ending.as_str());
                    self.elements.insert(0, Box::new(line_break));
                    self.elements.insert(0, Box::new(require));
                }
            }
        }

        self.rescan();
        let changed = self.to_script() != before;
        if changed {
            tracing::debug!(extensions = ?used, "rewrote require preamble");
        }
        changed
    }

    /// Removes element `index` together with the blank run right after it.
    /// Comments in that whitespace stay.
    fn remove_with_line_break(&mut self, index: usize) -> Box<dyn Node> {
        let removed = self.elements.remove(index);
        let Some(ws) = self
            .elements
            .get_mut(index)
            .and_then(|e| e.downcast_mut::<Whitespace>())
        else {
            return removed;
        };
        if ws.comments().next().is_none() {
            self.elements.remove(index);
        } else {
            ws.trim_leading_blank();
        }
        removed
    }

    pub fn outline(&self) -> Vec<NodeOutline> {
        self.elements
            .iter()
            .map(|e| NodeOutline::from_node(e.as_ref()))
            .collect()
    }

    pub fn widgets<B: WidgetBuilder + ?Sized>(&self, builder: &mut B) -> Vec<B::Widget> {
        build_widgets(builder, &self.elements)
    }
}

fn take_element(elements: &mut Vec<Box<dyn Node>>, id: NodeId) -> Option<Box<dyn Node>> {
    if let Some(index) = elements.iter().position(|e| e.id() == id) {
        return Some(elements.remove(index));
    }
    elements.iter_mut().find_map(|e| take_nested(e.as_mut(), id))
}

fn take_nested(node: &mut dyn Node, id: NodeId) -> Option<Box<dyn Node>> {
    if let Some(block) = node.downcast_mut::<Block>() {
        return take_element(block.elements_mut(), id);
    }
    node.children_mut()
        .into_iter()
        .find_map(|child| take_nested(child, id))
}

fn replace_element(
    elements: &mut Vec<Box<dyn Node>>,
    id: NodeId,
    slot: &mut Option<Box<dyn Node>>,
) -> Option<Box<dyn Node>> {
    if let Some(index) = elements.iter().position(|e| e.id() == id) {
        let node = slot.take()?;
        return Some(std::mem::replace(&mut elements[index], node));
    }
    elements
        .iter_mut()
        .find_map(|e| replace_nested(e.as_mut(), id, slot))
}

fn replace_nested(
    node: &mut dyn Node,
    id: NodeId,
    slot: &mut Option<Box<dyn Node>>,
) -> Option<Box<dyn Node>> {
    if let Some(block) = node.downcast_mut::<Block>() {
        return replace_element(block.elements_mut(), id, slot);
    }
    node.children_mut()
        .into_iter()
        .find_map(|child| replace_nested(child, id, slot))
}

/// Parses `script` with the default grammar and checks that the extensions
/// it uses are exactly `expected`.
pub fn validate(script: &str, expected: &[&str]) -> Result<()> {
    let doc = Document::parse(script)?;
    let mut expected: Vec<String> = expected.iter().map(|s| s.to_string()).collect();
    expected.sort();
    expected.dedup();
    let actual: Vec<String> = doc.requirements().names().into_iter().map(String::from).collect();
    if actual != expected {
        return Err(Error::Requirements { expected, actual });
    }
    Ok(())
}
