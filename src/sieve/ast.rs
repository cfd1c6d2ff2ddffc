/// The script DOM node contract.
///
/// Every grammar rule is a type implementing [`Node`]. A node is built by a
/// factory registered in the [`Registry`], consumes its own prefix of the
/// script during [`Node::init`], and writes the exact same bytes back in
/// [`Node::to_script`]. Whitespace and comments are nodes too, so the
/// concatenated output of a parsed tree is the parsed input.
use std::any::Any;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::LineEnding;
use crate::sieve::error::Result;
use crate::sieve::lexer::Input;
use crate::sieve::registry::Registry;
use crate::sieve::requires::Requirements;

/// Identifies a node within its owning document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub trait Node: AsAny + fmt::Debug + Send + Sync + 'static {
    fn id(&self) -> NodeId;

    /// Registered rule name, e.g. `action/setflag`.
    fn kind(&self) -> &'static str;

    /// Consumes this construct from the front of `input` and returns the rest.
    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>>;

    fn to_script(&self, out: &mut String);

    fn script(&self) -> String {
        let mut out = String::new();
        self.to_script(&mut out);
        out
    }

    /// Declares the extensions this kind of node depends on. Children are
    /// visited separately by the tracker.
    fn requires(&self, _requires: &mut Requirements) {}

    fn children(&self) -> Vec<&dyn Node> {
        Vec::new()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        Vec::new()
    }

    /// A short value for leaf nodes (decoded strings, numbers, tags).
    fn text(&self) -> Option<String> {
        None
    }
}

impl<'n> dyn Node + 'n {
    pub fn downcast_ref<T: Node>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    pub fn downcast_mut<T: Node>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }

    pub fn is<T: Node>(&self) -> bool {
        self.as_any().is::<T>()
    }

    /// Depth-first search for `id`, including `self`.
    pub fn find(&self, id: NodeId) -> Option<&dyn Node> {
        if self.id() == id {
            return Some(self);
        }
        self.children().into_iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut dyn Node> {
        if self.id() == id {
            return Some(self);
        }
        for child in self.children_mut() {
            if let Some(found) = child.find_mut(id) {
                return Some(found);
            }
        }
        None
    }

    /// Calls `f` for this node and every descendant, parents first.
    pub fn walk(&self, f: &mut dyn FnMut(&dyn Node)) {
        f(self);
        for child in self.children() {
            child.walk(f);
        }
    }
}

/// What a node needs while it is being built or parsed: the registry to
/// create children from and the owning document's id counter.
pub struct Context<'d> {
    registry: &'d Registry,
    next_id: &'d mut u32,
    line_ending: LineEnding,
}

impl<'d> Context<'d> {
    pub fn new(registry: &'d Registry, next_id: &'d mut u32, line_ending: LineEnding) -> Self {
        Self {
            registry,
            next_id,
            line_ending,
        }
    }

    pub fn registry(&self) -> &'d Registry {
        self.registry
    }

    pub fn line_ending(&self) -> LineEnding {
        self.line_ending
    }

    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(*self.next_id);
        *self.next_id += 1;
        id
    }

    pub fn probe(&self, category: &str, input: &Input<'_>) -> Option<&'d str> {
        self.registry.probe(category, input.rest())
    }

    pub fn create(&mut self, category: &str, name: &str) -> Result<Box<dyn Node>> {
        let registry = self.registry;
        registry.create(category, name, self)
    }

    /// Probes `categories` in order and initializes the first rule that
    /// matches. `Ok(None)` when nothing matches; nothing is consumed then.
    pub fn parse_any<'a>(
        &mut self,
        categories: &[&str],
        input: Input<'a>,
    ) -> Result<Option<(Box<dyn Node>, Input<'a>)>> {
        for category in categories {
            if let Some(name) = self.probe(category, &input) {
                let mut node = self.create(category, name)?;
                let rest = node.init(self, input)?;
                return Ok(Some((node, rest)));
            }
        }
        Ok(None)
    }

    /// Like [`Context::parse_any`] but the construct is mandatory.
    pub fn parse_required<'a>(
        &mut self,
        categories: &[&str],
        input: Input<'a>,
        expected: &str,
    ) -> Result<(Box<dyn Node>, Input<'a>)> {
        match self.parse_any(categories, input)? {
            Some(parsed) => Ok(parsed),
            None => Err(input.error(expected).into()),
        }
    }
}
