/// Top-level parse driver.
///
/// The driver repeatedly probes the registry for the next top-level
/// construct, lets it consume its prefix and appends it to the element
/// list. Parsing is `Parsing` until the input is exhausted (`Done`) or no
/// rule accepts what remains (`Failed`). There is no recovery after a
/// failure; the elements appended before it stay available.
use crate::sieve::ast::{Context, Node};
use crate::sieve::error::{Error, Result};
use crate::sieve::lexer::Input;

/// Categories probed for each top-level or block element, in order.
pub const COMMAND_CATEGORIES: &[&str] = &["whitespace", "control", "action"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    Parsing,
    Done,
    Failed,
}

pub struct Driver<'d, 'a> {
    cx: Context<'d>,
    input: Input<'a>,
    elements: Vec<Box<dyn Node>>,
    state: ParseState,
    error: Option<Error>,
}

impl<'d, 'a> Driver<'d, 'a> {
    pub fn new(cx: Context<'d>, text: &'a str) -> Self {
        Self {
            cx,
            input: Input::new(text),
            elements: Vec::new(),
            state: ParseState::Parsing,
            error: None,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Byte offset of the cursor.
    pub fn offset(&self) -> usize {
        self.input.offset()
    }

    pub fn elements(&self) -> &[Box<dyn Node>] {
        &self.elements
    }

    /// Parses one element. Does nothing once a terminal state is reached.
    pub fn step(&mut self) -> ParseState {
        if self.state != ParseState::Parsing {
            return self.state;
        }
        if self.input.is_empty() {
            self.state = ParseState::Done;
            return self.state;
        }
        match parse_element(&mut self.cx, self.input) {
            Ok((node, rest)) => {
                self.elements.push(node);
                self.input = rest;
            }
            Err(err) => {
                tracing::debug!(error = %err, "parse failed");
                self.error = Some(err);
                self.state = ParseState::Failed;
            }
        }
        self.state
    }

    /// Steps until a terminal state.
    pub fn run(&mut self) -> ParseState {
        while self.step() == ParseState::Parsing {}
        if self.state == ParseState::Done {
            tracing::debug!(elements = self.elements.len(), "parse finished");
        }
        self.state
    }

    /// The parsed elements and the failure, if parsing failed.
    pub fn finish(self) -> (Vec<Box<dyn Node>>, Option<Error>) {
        (self.elements, self.error)
    }
}

/// One command or whitespace run. A construct that consumes nothing is
/// reported as a syntax error rather than looping.
fn parse_element<'a>(cx: &mut Context<'_>, input: Input<'a>) -> Result<(Box<dyn Node>, Input<'a>)> {
    let (node, rest) = cx.parse_required(COMMAND_CATEGORIES, input, "command")?;
    if rest.offset() == input.offset() {
        return Err(input.error("command").into());
    }
    Ok((node, rest))
}

/// Parses elements until the input ends or `close` is next. The closing
/// character is left for the caller.
pub fn parse_elements<'a>(
    cx: &mut Context<'_>,
    mut input: Input<'a>,
    close: Option<char>,
) -> Result<(Vec<Box<dyn Node>>, Input<'a>)> {
    let mut elements = Vec::new();
    while !input.is_empty() {
        if close.is_some_and(|c| input.rest().starts_with(c)) {
            break;
        }
        let (node, rest) = parse_element(cx, input)?;
        elements.push(node);
        input = rest;
    }
    Ok((elements, input))
}
