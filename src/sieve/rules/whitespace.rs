/// Whitespace and comments (RFC 5228 section 2.3).
///
/// A whitespace node keeps every blank, `#` comment and `/* */` comment it
/// consumed, in order. It may legitimately consume nothing: optional
/// separators are whitespace nodes that stay empty.
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{scan_blank, scan_block_comment, scan_line_comment, Input};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trivia {
    Blank(String),
    /// `# text`, without the line break.
    LineComment(String),
    /// `/* text */`, delimiters included.
    BlockComment(String),
}

impl Trivia {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Blank(s) | Self::LineComment(s) | Self::BlockComment(s) => s,
        }
    }

    pub fn is_comment(&self) -> bool {
        !matches!(self, Self::Blank(_))
    }
}

#[derive(Debug, Clone)]
pub struct Whitespace {
    id: NodeId,
    trivia: Vec<Trivia>,
}

impl Whitespace {
    pub const NAME: &'static str = "whitespace";

    /// A fresh node that serializes as `default` until it is parsed or edited.
    pub fn new(cx: &mut Context<'_>, default: &str) -> Self {
        let trivia = if default.is_empty() {
            Vec::new()
        } else {
            vec![Trivia::Blank(default.to_string())]
        };
        Self {
            id: cx.next_id(),
            trivia,
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, ""))
    }

    pub fn matches(s: &str) -> bool {
        scan_blank(s) > 0 || s.starts_with('#') || s.starts_with("/*")
    }

    /// Length of the whitespace run at the start of `s`, without building
    /// anything. `Err` carries the offset of an unterminated block comment.
    pub fn scan(s: &str) -> std::result::Result<usize, usize> {
        let mut i = 0;
        loop {
            let rest = &s[i..];
            let n = scan_blank(rest);
            if n > 0 {
                i += n;
                continue;
            }
            let n = scan_line_comment(rest);
            if n > 0 {
                i += n;
                continue;
            }
            if rest.starts_with("/*") {
                match scan_block_comment(rest) {
                    Some(n) => {
                        i += n;
                        continue;
                    }
                    None => return Err(i),
                }
            }
            return Ok(i);
        }
    }

    pub fn trivia(&self) -> &[Trivia] {
        &self.trivia
    }

    pub fn comments(&self) -> impl Iterator<Item = &str> {
        self.trivia.iter().filter(|t| t.is_comment()).map(Trivia::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.trivia.iter().all(|t| t.as_str().is_empty())
    }

    /// Drops a blank run in front of the first comment.
    pub fn trim_leading_blank(&mut self) {
        if matches!(self.trivia.first(), Some(Trivia::Blank(_))) {
            self.trivia.remove(0);
        }
    }

    /// Replaces the content with a single blank run.
    pub fn set_blank(&mut self, text: &str) {
        self.trivia = vec![Trivia::Blank(text.to_string())];
    }
}

impl Node for Whitespace {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, _cx: &mut Context<'_>, mut input: Input<'a>) -> Result<Input<'a>> {
        let mut trivia = Vec::new();
        loop {
            let rest = input.rest();
            let blank = scan_blank(rest);
            if blank > 0 {
                let (text, next) = input.take(blank);
                trivia.push(Trivia::Blank(text.to_string()));
                input = next;
                continue;
            }
            let comment = scan_line_comment(rest);
            if comment > 0 {
                let (text, next) = input.take(comment);
                trivia.push(Trivia::LineComment(text.to_string()));
                input = next;
                continue;
            }
            if rest.starts_with("/*") {
                let Some(len) = scan_block_comment(rest) else {
                    return Err(input.error("`*/` closing the comment").into());
                };
                let (text, next) = input.take(len);
                trivia.push(Trivia::BlockComment(text.to_string()));
                input = next;
                continue;
            }
            break;
        }
        self.trivia = trivia;
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        for t in &self.trivia {
            out.push_str(t.as_str());
        }
    }

    fn text(&self) -> Option<String> {
        Some(self.script())
    }
}
