/// Strings and string lists (RFC 5228 sections 2.4.2 and 2.4.2.1).
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{
    decode_multiline, escape_quoted, scan_multiline, scan_quoted, unescape_quoted, Input,
};
use crate::sieve::rules::whitespace::Whitespace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringForm {
    Quoted,
    MultiLine,
}

/// A quoted or `text:` string, kept exactly as written.
#[derive(Debug, Clone)]
pub struct SieveString {
    id: NodeId,
    form: StringForm,
    raw: String,
}

impl SieveString {
    pub const NAME: &'static str = "string";

    pub fn new(cx: &mut Context<'_>, value: &str) -> Self {
        Self {
            id: cx.next_id(),
            form: StringForm::Quoted,
            raw: format!("\"{}\"", escape_quoted(value)),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, ""))
    }

    pub fn matches(s: &str) -> bool {
        s.starts_with('"') || s.get(..5).is_some_and(|h| h.eq_ignore_ascii_case("text:"))
    }

    pub fn form(&self) -> StringForm {
        self.form
    }

    /// The decoded value.
    pub fn value(&self) -> String {
        match self.form {
            StringForm::Quoted => unescape_quoted(&self.raw[1..self.raw.len() - 1]),
            StringForm::MultiLine => decode_multiline(&self.raw),
        }
    }

    /// Replaces the value; the string becomes a quoted string.
    pub fn set_value(&mut self, value: &str) {
        self.form = StringForm::Quoted;
        self.raw = format!("\"{}\"", escape_quoted(value));
    }
}

impl Node for SieveString {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, _cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let rest = input.rest();
        let (form, len) = if rest.starts_with('"') {
            let len = scan_quoted(rest).ok_or_else(|| input.error("closing `\"`"))?;
            (StringForm::Quoted, len)
        } else if Self::matches(rest) {
            let len = scan_multiline(rest)
                .ok_or_else(|| input.error("multi-line string ending in a lone `.` line"))?;
            (StringForm::MultiLine, len)
        } else {
            return Err(input.error("string").into());
        };
        let (raw, rest) = input.take(len);
        self.form = form;
        self.raw = raw.to_string();
        Ok(rest)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    fn text(&self) -> Option<String> {
        Some(self.value())
    }
}

#[derive(Debug, Clone)]
pub struct ListItem {
    pub leading: Whitespace,
    pub value: SieveString,
    pub trailing: Whitespace,
}

#[derive(Debug, Clone)]
enum ListForm {
    Single(SieveString),
    Bracketed(Vec<ListItem>),
}

/// `"a"` or `["a", "b"]`.
#[derive(Debug, Clone)]
pub struct StringList {
    id: NodeId,
    form: ListForm,
}

impl StringList {
    pub const NAME: &'static str = "stringlist";

    /// A fresh list holding one empty string.
    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            form: ListForm::Single(SieveString::new(cx, "")),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        s.starts_with('[') || SieveString::matches(s)
    }

    pub fn is_bracketed(&self) -> bool {
        matches!(self.form, ListForm::Bracketed(_))
    }

    pub fn strings(&self) -> Vec<&SieveString> {
        match &self.form {
            ListForm::Single(s) => vec![s],
            ListForm::Bracketed(items) => items.iter().map(|i| &i.value).collect(),
        }
    }

    pub fn values(&self) -> Vec<String> {
        self.strings().into_iter().map(SieveString::value).collect()
    }

    pub fn contains(&self, value: &str) -> bool {
        self.strings().iter().any(|s| s.value() == value)
    }

    /// Replaces the content. One value is written as a bare string, several
    /// as `["a", "b"]`; an empty slice leaves a single empty string.
    pub fn set_values(&mut self, cx: &mut Context<'_>, values: &[&str]) {
        self.form = match values {
            [] => ListForm::Single(SieveString::new(cx, "")),
            [one] => ListForm::Single(SieveString::new(cx, one)),
            many => ListForm::Bracketed(
                many.iter()
                    .enumerate()
                    .map(|(i, v)| ListItem {
                        leading: Whitespace::new(cx, if i == 0 { "" } else { " " }),
                        value: SieveString::new(cx, v),
                        trailing: Whitespace::new(cx, ""),
                    })
                    .collect(),
            ),
        };
    }

    /// Appends a value, converting a bare string into a bracketed list.
    pub fn push(&mut self, cx: &mut Context<'_>, value: &str) {
        let mut values = self.values();
        values.push(value.to_string());
        let refs: Vec<&str> = values.iter().map(String::as_str).collect();
        if let ListForm::Bracketed(items) = &mut self.form {
            items.push(ListItem {
                leading: Whitespace::new(cx, " "),
                value: SieveString::new(cx, value),
                trailing: Whitespace::new(cx, ""),
            });
        } else {
            self.set_values(cx, &refs);
        }
    }

    /// Removes every string equal to `value`. Returns whether one was found.
    pub fn remove(&mut self, cx: &mut Context<'_>, value: &str) -> bool {
        let values = self.values();
        let kept: Vec<&str> = values
            .iter()
            .map(String::as_str)
            .filter(|v| *v != value)
            .collect();
        if kept.len() == values.len() {
            return false;
        }
        self.set_values(cx, &kept);
        true
    }
}

impl Node for StringList {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        if SieveString::matches(input.rest()) {
            let mut value = SieveString::new(cx, "");
            let rest = value.init(cx, input)?;
            self.form = ListForm::Single(value);
            return Ok(rest);
        }
        if !input.rest().starts_with('[') {
            return Err(input.error("string list").into());
        }

        let mut input = input.punct('[')?;
        let mut items = Vec::new();
        loop {
            let mut leading = Whitespace::new(cx, "");
            input = leading.init(cx, input)?;
            let mut value = SieveString::new(cx, "");
            input = value.init(cx, input)?;
            let mut trailing = Whitespace::new(cx, "");
            input = trailing.init(cx, input)?;
            items.push(ListItem {
                leading,
                value,
                trailing,
            });

            if input.rest().starts_with(',') {
                input = input.punct(',')?;
            } else if input.rest().starts_with(']') {
                input = input.punct(']')?;
                break;
            } else {
                return Err(input.error("`,` or `]`").into());
            }
        }
        self.form = ListForm::Bracketed(items);
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        match &self.form {
            ListForm::Single(s) => s.to_script(out),
            ListForm::Bracketed(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    item.leading.to_script(out);
                    item.value.to_script(out);
                    item.trailing.to_script(out);
                }
                out.push(']');
            }
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        match &self.form {
            ListForm::Single(s) => vec![s as &dyn Node],
            ListForm::Bracketed(items) => items
                .iter()
                .flat_map(|i| {
                    [
                        &i.leading as &dyn Node,
                        &i.value as &dyn Node,
                        &i.trailing as &dyn Node,
                    ]
                })
                .collect(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        match &mut self.form {
            ListForm::Single(s) => vec![s as &mut dyn Node],
            ListForm::Bracketed(items) => items
                .iter_mut()
                .flat_map(|i| {
                    [
                        &mut i.leading as &mut dyn Node,
                        &mut i.value as &mut dyn Node,
                        &mut i.trailing as &mut dyn Node,
                    ]
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::sieve::registry::Registry;

    fn parse_list(text: &str) -> Result<(StringList, String)> {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut list = StringList::new(&mut cx);
        let rest = list.init(&mut cx, Input::new(text))?;
        Ok((list, rest.rest().to_string()))
    }

    #[test]
    fn test_single_string() {
        let (list, rest) = parse_list(r#""\\Seen";"#).unwrap();
        assert_eq!(rest, ";");
        assert!(!list.is_bracketed());
        assert_eq!(list.values(), ["\\Seen"]);
        assert_eq!(list.script(), r#""\\Seen""#);
    }

    #[test]
    fn test_bracketed_round_trip() {
        let text = "[ \"from\" ,\r\n  \"sender\"]";
        let (list, rest) = parse_list(text).unwrap();
        assert!(rest.is_empty());
        assert_eq!(list.values(), ["from", "sender"]);
        assert_eq!(list.script(), text);
        assert_eq!(list.children().len(), 6);
    }

    #[test]
    fn test_multiline_member() {
        let text = "text:\r\nhello\r\n.\r\n";
        let (list, rest) = parse_list(text).unwrap();
        assert!(rest.is_empty());
        assert_eq!(list.strings()[0].form(), StringForm::MultiLine);
        assert_eq!(list.values(), ["hello\r\n"]);
        assert_eq!(list.script(), text);
    }

    #[test]
    fn test_malformed_lists() {
        let err = parse_list("[\"a\" \"b\"]").unwrap_err();
        assert!(err.to_string().contains("expected `,` or `]`"));
        let err = parse_list("[]").unwrap_err();
        assert!(err.to_string().contains("expected string"));
        let err = parse_list("\"open").unwrap_err();
        assert!(err.to_string().contains("closing `\"`"));
        let err = parse_list(";").unwrap_err();
        assert!(err.to_string().contains("expected string list"));
    }

    #[test]
    fn test_edit_values() {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut list = StringList::new(&mut cx);
        assert_eq!(list.script(), "\"\"");
        list.set_values(&mut cx, &["\\Seen"]);
        assert_eq!(list.script(), r#""\\Seen""#);
        list.push(&mut cx, "\\Flagged");
        assert_eq!(list.script(), r#"["\\Seen", "\\Flagged"]"#);
        list.push(&mut cx, "x\"y");
        assert_eq!(list.script(), r#"["\\Seen", "\\Flagged", "x\"y"]"#);
        assert!(list.remove(&mut cx, "\\Seen"));
        assert!(!list.remove(&mut cx, "missing"));
        assert_eq!(list.values(), ["\\Flagged", "x\"y"]);
        assert!(list.contains("\\Flagged"));
    }
}
