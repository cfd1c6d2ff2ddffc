/// Control commands (RFC 5228 section 3): `require`, `if` and blocks.
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{starts_with_keyword, Input};
use crate::sieve::parser::parse_elements;
use crate::sieve::rules::atoms::Terminator;
use crate::sieve::rules::conditions::{ConstantTest, TEST_CATEGORIES};
use crate::sieve::rules::strings::StringList;
use crate::sieve::rules::whitespace::Whitespace;

/// `require <ws> <string-list> ;`
#[derive(Debug, Clone)]
pub struct Require {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    extensions: StringList,
    terminator: Terminator,
}

impl Require {
    pub const NAME: &'static str = "control/require";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: "require".to_string(),
            ws: Whitespace::new(cx, " "),
            extensions: StringList::new(cx),
            terminator: Terminator::new(cx),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_keyword(s, "require")
    }

    pub fn extensions(&self) -> Vec<String> {
        self.extensions.values()
    }

    pub fn set_extensions(&mut self, cx: &mut Context<'_>, extensions: &[&str]) {
        self.extensions.set_values(cx, extensions);
    }
}

impl Node for Require {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword("require")?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let input = self.extensions.init(cx, input)?;
        self.terminator.init(cx, input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        self.extensions.to_script(out);
        self.terminator.to_script(out);
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![
            &self.ws as &dyn Node,
            &self.extensions as &dyn Node,
            &self.terminator as &dyn Node,
        ]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        vec![
            &mut self.ws as &mut dyn Node,
            &mut self.extensions as &mut dyn Node,
            &mut self.terminator as &mut dyn Node,
        ]
    }
}

/// `{ (<whitespace> / <command>)* }`
#[derive(Debug)]
pub struct Block {
    id: NodeId,
    elements: Vec<Box<dyn Node>>,
}

impl Block {
    pub const NAME: &'static str = "block";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            elements: Vec::new(),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        s.starts_with('{')
    }

    pub fn elements(&self) -> &[Box<dyn Node>] {
        &self.elements
    }

    pub fn elements_mut(&mut self) -> &mut Vec<Box<dyn Node>> {
        &mut self.elements
    }

    /// Commands only, whitespace skipped.
    pub fn commands(&self) -> impl Iterator<Item = &dyn Node> {
        self.elements
            .iter()
            .map(|e| e.as_ref())
            .filter(|e| !e.is::<Whitespace>())
    }

    /// Inserts at `index`, clamped to the end.
    pub fn insert(&mut self, index: usize, node: Box<dyn Node>) {
        let index = index.min(self.elements.len());
        self.elements.insert(index, node);
    }

    pub fn push(&mut self, node: Box<dyn Node>) {
        self.elements.push(node);
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Node>> {
        (index < self.elements.len()).then(|| self.elements.remove(index))
    }
}

impl Node for Block {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let input = input.punct('{')?;
        let (elements, input) = parse_elements(cx, input, Some('}'))?;
        self.elements = elements;
        Ok(input.punct('}')?)
    }

    fn to_script(&self, out: &mut String) {
        out.push('{');
        for element in &self.elements {
            element.to_script(out);
        }
        out.push('}');
    }

    fn children(&self) -> Vec<&dyn Node> {
        self.elements.iter().map(|e| e.as_ref()).collect()
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        self.elements
            .iter_mut()
            .map(|e| -> &mut dyn Node { e.as_mut() })
            .collect()
    }
}

#[derive(Debug)]
pub enum BranchKind {
    /// `elsif <ws> <test> <ws>`
    Elsif {
        ws: Whitespace,
        test: Box<dyn Node>,
        gap: Whitespace,
    },
    /// `else <ws>`
    Else { gap: Whitespace },
}

/// An `elsif` or `else` arm with the whitespace in front of its keyword.
#[derive(Debug)]
pub struct Branch {
    leading: Whitespace,
    keyword: String,
    kind: BranchKind,
    block: Block,
}

impl Branch {
    pub fn is_else(&self) -> bool {
        matches!(self.kind, BranchKind::Else { .. })
    }

    pub fn test(&self) -> Option<&dyn Node> {
        match &self.kind {
            BranchKind::Elsif { test, .. } => Some(test.as_ref()),
            BranchKind::Else { .. } => None,
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    fn to_script(&self, out: &mut String) {
        self.leading.to_script(out);
        out.push_str(&self.keyword);
        match &self.kind {
            BranchKind::Elsif { ws, test, gap } => {
                ws.to_script(out);
                test.to_script(out);
                gap.to_script(out);
            }
            BranchKind::Else { gap } => gap.to_script(out),
        }
        self.block.to_script(out);
    }

    fn children<'b>(&'b self, children: &mut Vec<&'b dyn Node>) {
        children.push(&self.leading);
        match &self.kind {
            BranchKind::Elsif { ws, test, gap } => {
                children.push(ws);
                children.push(test.as_ref());
                children.push(gap);
            }
            BranchKind::Else { gap } => children.push(gap),
        }
        children.push(&self.block);
    }

    fn children_mut<'b>(&'b mut self, children: &mut Vec<&'b mut dyn Node>) {
        children.push(&mut self.leading);
        match &mut self.kind {
            BranchKind::Elsif { ws, test, gap } => {
                children.push(ws);
                children.push(test.as_mut());
                children.push(gap);
            }
            BranchKind::Else { gap } => children.push(gap),
        }
        children.push(&mut self.block);
    }
}

/// The keyword of the branch that follows `rest`, if any.
fn next_branch(rest: &str) -> Option<(usize, &'static str)> {
    let skip = Whitespace::scan(rest).ok()?;
    let after = &rest[skip..];
    ["elsif", "else"]
        .into_iter()
        .find(|kw| starts_with_keyword(after, kw))
        .map(|kw| (skip, kw))
}

/// `if <ws> <test> <ws> <block>` followed by any `elsif` / `else` arms.
#[derive(Debug)]
pub struct If {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    test: Box<dyn Node>,
    gap: Whitespace,
    block: Block,
    branches: Vec<Branch>,
}

impl If {
    pub const NAME: &'static str = "control/if";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: "if".to_string(),
            ws: Whitespace::new(cx, " "),
            test: ConstantTest::create_true(cx),
            gap: Whitespace::new(cx, " "),
            block: Block::new(cx),
            branches: Vec::new(),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_keyword(s, "if")
    }

    pub fn test(&self) -> &dyn Node {
        self.test.as_ref()
    }

    pub fn test_mut(&mut self) -> &mut dyn Node {
        self.test.as_mut()
    }

    pub fn replace_test(&mut self, test: Box<dyn Node>) -> Box<dyn Node> {
        std::mem::replace(&mut self.test, test)
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    pub fn branches(&self) -> &[Branch] {
        &self.branches
    }

    pub fn branches_mut(&mut self) -> &mut [Branch] {
        &mut self.branches
    }

    /// Appends an `elsif` arm, placed before a trailing `else`.
    pub fn push_elsif(&mut self, cx: &mut Context<'_>, test: Box<dyn Node>) {
        let branch = Branch {
            leading: Whitespace::new(cx, " "),
            keyword: "elsif".to_string(),
            kind: BranchKind::Elsif {
                ws: Whitespace::new(cx, " "),
                test,
                gap: Whitespace::new(cx, " "),
            },
            block: Block::new(cx),
        };
        let at = match self.branches.last() {
            Some(last) if last.is_else() => self.branches.len() - 1,
            _ => self.branches.len(),
        };
        self.branches.insert(at, branch);
    }

    /// Adds an empty `else` arm, or drops the existing one.
    pub fn set_else(&mut self, cx: &mut Context<'_>, present: bool) {
        let has_else = self.branches.last().is_some_and(Branch::is_else);
        if present && !has_else {
            self.branches.push(Branch {
                leading: Whitespace::new(cx, " "),
                keyword: "else".to_string(),
                kind: BranchKind::Else {
                    gap: Whitespace::new(cx, " "),
                },
                block: Block::new(cx),
            });
        } else if !present && has_else {
            self.branches.pop();
        }
    }

    fn parse_branch<'a>(
        cx: &mut Context<'_>,
        input: Input<'a>,
        keyword: &str,
    ) -> Result<(Branch, Input<'a>)> {
        let mut leading = Whitespace::new(cx, "");
        let input = leading.init(cx, input)?;
        let (raw, input) = input.keyword(keyword)?;
        let (kind, input) = if keyword == "elsif" {
            let mut ws = Whitespace::new(cx, " ");
            let input = ws.init(cx, input)?;
            let (test, input) = cx.parse_required(TEST_CATEGORIES, input, "test")?;
            let mut gap = Whitespace::new(cx, " ");
            let input = gap.init(cx, input)?;
            (BranchKind::Elsif { ws, test, gap }, input)
        } else {
            let mut gap = Whitespace::new(cx, " ");
            let input = gap.init(cx, input)?;
            (BranchKind::Else { gap }, input)
        };
        let mut block = Block::new(cx);
        let input = block.init(cx, input)?;
        let branch = Branch {
            leading,
            keyword: raw.to_string(),
            kind,
            block,
        };
        Ok((branch, input))
    }
}

impl Node for If {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword("if")?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let (test, input) = cx.parse_required(TEST_CATEGORIES, input, "test")?;
        self.test = test;
        let input = self.gap.init(cx, input)?;
        let mut input = self.block.init(cx, input)?;

        self.branches.clear();
        while let Some((_, keyword)) = next_branch(input.rest()) {
            let (branch, rest) = Self::parse_branch(cx, input, keyword)?;
            let done = branch.is_else();
            self.branches.push(branch);
            input = rest;
            if done {
                break;
            }
        }
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        self.test.to_script(out);
        self.gap.to_script(out);
        self.block.to_script(out);
        for branch in &self.branches {
            branch.to_script(out);
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = vec![
            &self.ws as &dyn Node,
            self.test.as_ref(),
            &self.gap as &dyn Node,
            &self.block as &dyn Node,
        ];
        for branch in &self.branches {
            branch.children(&mut children);
        }
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = vec![
            &mut self.ws as &mut dyn Node,
            self.test.as_mut(),
            &mut self.gap as &mut dyn Node,
            &mut self.block as &mut dyn Node,
        ];
        for branch in &mut self.branches {
            branch.children_mut(&mut children);
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::sieve::registry::Registry;
    use crate::sieve::rules::actions::SimpleAction;

    fn parse_command(text: &str) -> Result<(Box<dyn Node>, String)> {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let (node, rest) = cx.parse_required(&["control"], Input::new(text), "command")?;
        Ok((node, rest.rest().to_string()))
    }

    #[test]
    fn test_require() {
        let (node, rest) = parse_command("require [\"fileinto\", \"reject\"];\r\n").unwrap();
        assert_eq!(rest, "\r\n");
        let require = node.downcast_ref::<Require>().unwrap();
        assert_eq!(require.extensions(), ["fileinto", "reject"]);
        assert_eq!(node.script(), "require [\"fileinto\", \"reject\"];");
    }

    #[test]
    fn test_if_elsif_else_with_comments() {
        let text = "if header :is \"x\" \"y\" {\r\n  discard;\r\n}\r\n# next\r\nelsif true { keep; } else{stop;}\r\nkeep;";
        let (node, rest) = parse_command(text).unwrap();
        assert_eq!(rest, "\r\nkeep;");
        assert_eq!(node.script(), &text[..text.len() - "\r\nkeep;".len()]);
        let cond = node.downcast_ref::<If>().unwrap();
        assert_eq!(cond.test().kind(), "test/header");
        assert_eq!(cond.block().commands().count(), 1);
        assert_eq!(cond.branches().len(), 2);
        assert_eq!(cond.branches()[0].test().map(|t| t.kind()), Some("test/true"));
        assert!(cond.branches()[1].is_else());

        let comments: Vec<String> = {
            let mut found = Vec::new();
            node.walk(&mut |n| {
                if let Some(ws) = n.downcast_ref::<Whitespace>() {
                    found.extend(ws.comments().map(str::to_string));
                }
            });
            found
        };
        assert_eq!(comments, ["# next"]);
    }

    #[test]
    fn test_if_without_branch_leaves_whitespace() {
        let (node, rest) = parse_command("if true {}\r\n# trailing").unwrap();
        assert_eq!(rest, "\r\n# trailing");
        assert!(node.downcast_ref::<If>().unwrap().branches().is_empty());
    }

    #[test]
    fn test_unclosed_block() {
        let err = parse_command("if true {\r\n  keep;\r\n").unwrap_err();
        assert!(err.to_string().contains("expected `}` at line 3, column 1"));
        let err = parse_command("if true { bogus; }").unwrap_err();
        assert!(err.to_string().contains("expected command"));
        let err = parse_command("if { keep; }").unwrap_err();
        assert!(err.to_string().contains("expected test"));
    }

    #[test]
    fn test_build_if() {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut cond = If::new(&mut cx);
        assert_eq!(cond.script(), "if true {}");
        cond.set_else(&mut cx, true);
        let test = ConstantTest::create_false(&mut cx);
        cond.push_elsif(&mut cx, test);
        cond.block_mut().push(Box::new(SimpleAction::keep(&mut cx)));
        assert_eq!(cond.script(), "if true {keep;} elsif false {} else {}");
        cond.set_else(&mut cx, false);
        assert_eq!(cond.script(), "if true {keep;} elsif false {}");
        assert!(cond.block_mut().remove(3).is_none());
        assert!(cond.block_mut().remove(0).is_some());
    }
}
