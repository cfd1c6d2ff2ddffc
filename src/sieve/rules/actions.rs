/// Base actions (RFC 5228 section 4) and the `fileinto` / `reject` extensions.
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{starts_with_keyword, Input};
use crate::sieve::requires::Requirements;
use crate::sieve::rules::atoms::Terminator;
use crate::sieve::rules::strings::SieveString;
use crate::sieve::rules::whitespace::Whitespace;

#[derive(Debug)]
pub struct ActionSpec {
    pub name: &'static str,
    pub keyword: &'static str,
    /// Takes a single string argument.
    pub argument: bool,
    pub extension: Option<&'static str>,
}

pub static KEEP: ActionSpec = ActionSpec {
    name: "action/keep",
    keyword: "keep",
    argument: false,
    extension: None,
};

pub static STOP: ActionSpec = ActionSpec {
    name: "action/stop",
    keyword: "stop",
    argument: false,
    extension: None,
};

pub static DISCARD: ActionSpec = ActionSpec {
    name: "action/discard",
    keyword: "discard",
    argument: false,
    extension: None,
};

pub static REDIRECT: ActionSpec = ActionSpec {
    name: "action/redirect",
    keyword: "redirect",
    argument: true,
    extension: None,
};

pub static FILEINTO: ActionSpec = ActionSpec {
    name: "action/fileinto",
    keyword: "fileinto",
    argument: true,
    extension: Some("fileinto"),
};

pub static REJECT: ActionSpec = ActionSpec {
    name: "action/reject",
    keyword: "reject",
    argument: true,
    extension: Some("reject"),
};

/// `<keyword> [<ws> <string>] ;`
#[derive(Debug, Clone)]
pub struct SimpleAction {
    id: NodeId,
    spec: &'static ActionSpec,
    keyword: String,
    argument: Option<(Whitespace, SieveString)>,
    terminator: Terminator,
}

impl SimpleAction {
    pub fn new(cx: &mut Context<'_>, spec: &'static ActionSpec) -> Self {
        let id = cx.next_id();
        let argument = spec
            .argument
            .then(|| (Whitespace::new(cx, " "), SieveString::new(cx, "")));
        Self {
            id,
            spec,
            keyword: spec.keyword.to_string(),
            argument,
            terminator: Terminator::new(cx),
        }
    }

    pub fn keep(cx: &mut Context<'_>) -> Self {
        Self::new(cx, &KEEP)
    }

    pub fn stop(cx: &mut Context<'_>) -> Self {
        Self::new(cx, &STOP)
    }

    pub fn matches_spec(spec: &ActionSpec, s: &str) -> bool {
        starts_with_keyword(s, spec.keyword)
    }

    pub fn argument(&self) -> Option<String> {
        self.argument.as_ref().map(|(_, s)| s.value())
    }

    /// Returns false for actions without an argument.
    pub fn set_argument(&mut self, value: &str) -> bool {
        match &mut self.argument {
            Some((_, s)) => {
                s.set_value(value);
                true
            }
            None => false,
        }
    }
}

impl Node for SimpleAction {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        self.spec.name
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, mut input) = input.keyword(self.spec.keyword)?;
        self.keyword = keyword.to_string();
        if let Some((ws, value)) = &mut self.argument {
            input = ws.init(cx, input)?;
            input = value.init(cx, input)?;
        }
        self.terminator.init(cx, input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        if let Some((ws, value)) = &self.argument {
            ws.to_script(out);
            value.to_script(out);
        }
        self.terminator.to_script(out);
    }

    fn requires(&self, requires: &mut Requirements) {
        if let Some(ext) = self.spec.extension {
            requires.require(ext);
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = Vec::new();
        if let Some((ws, value)) = &self.argument {
            children.push(ws as &dyn Node);
            children.push(value as &dyn Node);
        }
        children.push(&self.terminator as &dyn Node);
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = Vec::new();
        if let Some((ws, value)) = &mut self.argument {
            children.push(ws as &mut dyn Node);
            children.push(value as &mut dyn Node);
        }
        children.push(&mut self.terminator as &mut dyn Node);
        children
    }
}
