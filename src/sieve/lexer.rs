/// Character-level scanning for SIEVE scripts (RFC 5228 section 2).
///
/// Grammar rules never tokenize ahead: each one inspects the remaining text
/// through an [`Input`] cursor and consumes exactly its own prefix. The
/// `scan_*` functions below are pure and return the byte length of the
/// construct at the start of `s`, so matchers and lookahead can use them
/// without building nodes.
use crate::sieve::error::SyntaxError;

/// A cursor into the script text being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Input<'a> {
    source: &'a str,
    offset: usize,
}

impl<'a> Input<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, offset: 0 }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    /// The unconsumed remainder.
    pub fn rest(&self) -> &'a str {
        &self.source[self.offset..]
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.source.len()
    }

    /// Splits off the next `len` bytes.
    pub fn take(self, len: usize) -> (&'a str, Self) {
        let text = &self.rest()[..len];
        (
            text,
            Self {
                source: self.source,
                offset: self.offset + len,
            },
        )
    }

    pub fn error(&self, expected: impl Into<String>) -> SyntaxError {
        SyntaxError::at(self.source, self.offset, expected)
    }

    /// Consumes `keyword` (case-insensitive) and returns it as written.
    pub fn keyword(self, keyword: &str) -> Result<(&'a str, Self), SyntaxError> {
        if starts_with_keyword(self.rest(), keyword) {
            Ok(self.take(keyword.len()))
        } else {
            Err(self.error(format!("`{keyword}`")))
        }
    }

    /// Consumes a single punctuation character.
    pub fn punct(self, c: char) -> Result<Self, SyntaxError> {
        if self.rest().starts_with(c) {
            Ok(self.take(c.len_utf8()).1)
        } else {
            Err(self.error(format!("`{c}`")))
        }
    }
}

fn is_identifier_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

/// True when `s` starts with `keyword`, ignoring ASCII case, and the keyword
/// is not just the prefix of a longer identifier.
pub fn starts_with_keyword(s: &str, keyword: &str) -> bool {
    let Some(head) = s.get(..keyword.len()) else {
        return false;
    };
    head.eq_ignore_ascii_case(keyword)
        && !s.as_bytes().get(keyword.len()).copied().is_some_and(is_identifier_char)
}

/// Length of an identifier (`[A-Za-z_][A-Za-z0-9_]*`), 0 if none.
pub fn scan_identifier(s: &str) -> usize {
    let bytes = s.as_bytes();
    match bytes.first() {
        Some(b) if b.is_ascii_alphabetic() || *b == b'_' => {}
        _ => return 0,
    }
    bytes.iter().take_while(|b| is_identifier_char(**b)).count()
}

/// Length of a `:tag`, 0 if none.
pub fn scan_tag(s: &str) -> usize {
    match s.strip_prefix(':') {
        Some(rest) => match scan_identifier(rest) {
            0 => 0,
            n => n + 1,
        },
        None => 0,
    }
}

/// True when `s` starts with `tag` (including the colon) as a whole tag.
pub fn starts_with_tag(s: &str, tag: &str) -> bool {
    scan_tag(s) == tag.len() && s[..tag.len()].eq_ignore_ascii_case(tag)
}

/// Length of a number with an optional `K`/`M`/`G` quantifier, 0 if none.
pub fn scan_number(s: &str) -> usize {
    let bytes = s.as_bytes();
    let digits = bytes.iter().take_while(|b| b.is_ascii_digit()).count();
    if digits == 0 {
        return 0;
    }
    match bytes.get(digits) {
        Some(b'K' | b'k' | b'M' | b'm' | b'G' | b'g') => digits + 1,
        _ => digits,
    }
}

/// Length of a run of spaces, tabs and line breaks.
pub fn scan_blank(s: &str) -> usize {
    s.bytes()
        .take_while(|b| matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        .count()
}

/// Length of a `#` comment up to, but not including, the line break.
pub fn scan_line_comment(s: &str) -> usize {
    if !s.starts_with('#') {
        return 0;
    }
    s.find(['\r', '\n']).unwrap_or(s.len())
}

/// Length of a `/* ... */` comment. `None` when it is never closed.
pub fn scan_block_comment(s: &str) -> Option<usize> {
    let body = s.strip_prefix("/*")?;
    body.find("*/").map(|end| end + 4)
}

/// Length of a quoted string including both quotes. `None` when unterminated.
pub fn scan_quoted(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    if bytes.first() != Some(&b'"') {
        return None;
    }
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' => return Some(i + 1),
            _ => i += 1,
        }
    }
    None
}

/// Length of a `text:` multi-line string, including the line holding the
/// terminating dot and its line break. `None` when `s` is not a well formed
/// multi-line string.
pub fn scan_multiline(s: &str) -> Option<usize> {
    if !s.get(..5)?.eq_ignore_ascii_case("text:") {
        return None;
    }
    let bytes = s.as_bytes();
    let mut i = 5;
    while matches!(bytes.get(i), Some(b' ' | b'\t')) {
        i += 1;
    }
    i += scan_line_comment(&s[i..]);
    i += line_break(&s[i..])?;

    loop {
        if i >= bytes.len() {
            return None;
        }
        let line_end = s[i..].find('\n').map(|n| i + n + 1).unwrap_or(bytes.len());
        let line = s[i..line_end].trim_end_matches(['\r', '\n']);
        if line == "." {
            return Some(line_end);
        }
        i = line_end;
    }
}

fn line_break(s: &str) -> Option<usize> {
    if s.starts_with("\r\n") {
        Some(2)
    } else if s.starts_with('\n') {
        Some(1)
    } else {
        None
    }
}

/// Decodes the body of a quoted string (without the surrounding quotes).
pub fn unescape_quoted(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Encodes a value as the body of a quoted string.
pub fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Decodes a complete `text:` string into its value, undoing dot-stuffing.
pub fn decode_multiline(raw: &str) -> String {
    let body_start = raw.find('\n').map(|i| i + 1).unwrap_or(raw.len());
    let mut out = String::new();
    let mut lines = raw[body_start..].split_inclusive('\n').peekable();
    while let Some(line) = lines.next() {
        if lines.peek().is_none() {
            break; // the terminating "."
        }
        if line.starts_with("..") {
            out.push_str(&line[1..]);
        } else {
            out.push_str(line);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_boundary() {
        assert!(starts_with_keyword("setflag \"x\";", "setflag"));
        assert!(starts_with_keyword("SetFlag;", "setflag"));
        assert!(starts_with_keyword("removeflag", "removeflag"));
        assert!(!starts_with_keyword("setflags", "setflag"));
        assert!(!starts_with_keyword("set", "setflag"));
        assert!(!starts_with_keyword("sétflag", "setflag"));
    }

    #[test]
    fn test_tags_and_numbers() {
        assert_eq!(scan_tag(":contains \"x\""), 9);
        assert_eq!(scan_tag(": x"), 0);
        assert!(starts_with_tag(":IS \"a\"", ":is"));
        assert!(!starts_with_tag(":isnt", ":is"));
        assert_eq!(scan_number("100K;"), 4);
        assert_eq!(scan_number("500 "), 3);
        assert_eq!(scan_number("K"), 0);
    }

    #[test]
    fn test_comments() {
        assert_eq!(scan_line_comment("# hi\r\nkeep;"), 4);
        assert_eq!(scan_line_comment("# eof"), 5);
        assert_eq!(scan_block_comment("/* a\r\n * b */keep;"), Some(13));
        assert_eq!(scan_block_comment("/* open"), None);
    }

    #[test]
    fn test_quoted() {
        assert_eq!(scan_quoted(r#""a\"b" rest"#), Some(6));
        assert_eq!(scan_quoted(r#""\\Seen";"#), Some(8));
        assert_eq!(scan_quoted("\"open"), None);
        assert_eq!(unescape_quoted(r#"\\Seen"#), "\\Seen");
        assert_eq!(unescape_quoted(r#"a\"b\q"#), "a\"bq");
        assert_eq!(escape_quoted("a\"b\\"), r#"a\"b\\"#);
    }

    #[test]
    fn test_multiline() {
        let s = "text: # note\r\nline one\r\n..dot\r\n.\r\n;";
        let len = scan_multiline(s).unwrap();
        assert_eq!(&s[len..], ";");
        assert_eq!(decode_multiline(&s[..len]), "line one\r\n.dot\r\n");
        assert_eq!(scan_multiline("text:\r\nno end\r\n"), None);
        assert_eq!(scan_multiline("text: x\r\n.\r\n"), None);
    }

    #[test]
    fn test_input_cursor() {
        let input = Input::new("IF true");
        let (kw, rest) = input.keyword("if").unwrap();
        assert_eq!(kw, "IF");
        assert_eq!(rest.offset(), 2);
        assert_eq!(rest.rest(), " true");
        let err = rest.punct('{').unwrap_err();
        assert_eq!(err.offset, 2);
    }
}
