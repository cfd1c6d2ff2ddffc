/// Terminators, numbers and tagged arguments.
use crate::model::enums::{AddressPart, MatchType};
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{scan_number, scan_tag, starts_with_tag, Input};
use crate::sieve::requires::Requirements;
use crate::sieve::rules::strings::{SieveString, StringList};
use crate::sieve::rules::whitespace::Whitespace;

/// `;` ending a command, with any whitespace in front of it.
#[derive(Debug, Clone)]
pub struct Terminator {
    id: NodeId,
    leading: Whitespace,
}

impl Terminator {
    pub const NAME: &'static str = "atom/semicolon";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            leading: Whitespace::new(cx, ""),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        match Whitespace::scan(s) {
            Ok(n) => s[n..].starts_with(';'),
            Err(_) => false,
        }
    }
}

impl Node for Terminator {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let input = self.leading.init(cx, input)?;
        Ok(input.punct(';')?)
    }

    fn to_script(&self, out: &mut String) {
        self.leading.to_script(out);
        out.push(';');
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![&self.leading as &dyn Node]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        vec![&mut self.leading as &mut dyn Node]
    }
}

/// A number with an optional `K`, `M` or `G` quantifier.
#[derive(Debug, Clone)]
pub struct Number {
    id: NodeId,
    raw: String,
}

impl Number {
    pub const NAME: &'static str = "number";

    pub fn new(cx: &mut Context<'_>, value: u64) -> Self {
        Self {
            id: cx.next_id(),
            raw: value.to_string(),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, 0))
    }

    pub fn matches(s: &str) -> bool {
        scan_number(s) > 0
    }

    /// The value with its quantifier applied. `None` on overflow.
    pub fn value(&self) -> Option<u64> {
        let (digits, shift) = match self.raw.as_bytes().last() {
            Some(b'K' | b'k') => (&self.raw[..self.raw.len() - 1], 10),
            Some(b'M' | b'm') => (&self.raw[..self.raw.len() - 1], 20),
            Some(b'G' | b'g') => (&self.raw[..self.raw.len() - 1], 30),
            _ => (self.raw.as_str(), 0),
        };
        digits.parse::<u64>().ok()?.checked_mul(1 << shift)
    }

    pub fn set_value(&mut self, value: u64) {
        self.raw = value.to_string();
    }
}

impl Node for Number {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, _cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let len = scan_number(input.rest());
        if len == 0 {
            return Err(input.error("number").into());
        }
        let (raw, rest) = input.take(len);
        self.raw = raw.to_string();
        Ok(rest)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    fn text(&self) -> Option<String> {
        Some(self.raw.clone())
    }
}

/// Describes one family of plain `:tag` arguments.
#[derive(Debug)]
pub struct TagSpec {
    pub name: &'static str,
    pub tags: &'static [&'static str],
    pub extension: Option<&'static str>,
}

pub static MATCH_TYPE_CORE: TagSpec = TagSpec {
    name: "match-type/core",
    tags: &[":is", ":contains", ":matches"],
    extension: None,
};

pub static MATCH_TYPE_REGEX: TagSpec = TagSpec {
    name: "match-type/regex",
    tags: &[":regex"],
    extension: Some("regex"),
};

pub static ADDRESS_PART_CORE: TagSpec = TagSpec {
    name: "address-part/core",
    tags: &[":all", ":localpart", ":domain"],
    extension: None,
};

pub static ADDRESS_PART_SUBADDRESS: TagSpec = TagSpec {
    name: "address-part/subaddress",
    tags: &[":user", ":detail"],
    extension: Some("subaddress"),
};

pub static SIZE_RELATION: TagSpec = TagSpec {
    name: "size-relation",
    tags: &[":over", ":under"],
    extension: None,
};

/// A `:tag` drawn from a fixed set, e.g. a match type.
#[derive(Debug, Clone)]
pub struct Tag {
    id: NodeId,
    spec: &'static TagSpec,
    raw: String,
}

impl Tag {
    pub fn new(cx: &mut Context<'_>, spec: &'static TagSpec) -> Self {
        Self {
            id: cx.next_id(),
            spec,
            raw: spec.tags[0].to_string(),
        }
    }

    pub fn matches_spec(spec: &TagSpec, s: &str) -> bool {
        spec.tags.iter().any(|tag| starts_with_tag(s, tag))
    }

    /// The tag in lower case, colon included.
    pub fn value(&self) -> String {
        self.raw.to_ascii_lowercase()
    }

    pub fn match_type(&self) -> Option<MatchType> {
        MatchType::from_sieve(&self.value())
    }

    pub fn address_part(&self) -> Option<AddressPart> {
        AddressPart::from_sieve(&self.value())
    }

    /// Replaces the tag. Returns false when `tag` is not part of this family.
    pub fn set_value(&mut self, tag: &str) -> bool {
        if !Self::matches_spec(self.spec, tag) || scan_tag(tag) != tag.len() {
            return false;
        }
        self.raw = tag.to_string();
        true
    }
}

impl Node for Tag {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        self.spec.name
    }

    fn init<'a>(&mut self, _cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        if !Self::matches_spec(self.spec, input.rest()) {
            return Err(input.error(format!("one of {}", self.spec.tags.join(", "))).into());
        }
        let (raw, rest) = input.take(scan_tag(input.rest()));
        self.raw = raw.to_string();
        Ok(rest)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.raw);
    }

    fn requires(&self, requires: &mut Requirements) {
        if let Some(ext) = self.spec.extension {
            requires.require(ext);
        }
    }

    fn text(&self) -> Option<String> {
        Some(self.value())
    }
}

/// `:comparator <ws> <string>`
#[derive(Debug, Clone)]
pub struct Comparator {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    name: SieveString,
}

impl Comparator {
    pub const NAME: &'static str = "comparator";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: ":comparator".to_string(),
            ws: Whitespace::new(cx, " "),
            name: SieveString::new(cx, "i;ascii-casemap"),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_tag(s, ":comparator")
    }

    pub fn comparator(&self) -> String {
        self.name.value()
    }

    pub fn set_comparator(&mut self, name: &str) {
        self.name.set_value(name);
    }
}

impl Node for Comparator {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        if !Self::matches(input.rest()) {
            return Err(input.error("`:comparator`").into());
        }
        let (keyword, input) = input.take(":comparator".len());
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        self.name.init(cx, input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        self.name.to_script(out);
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![&self.ws as &dyn Node, &self.name as &dyn Node]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        vec![&mut self.ws as &mut dyn Node, &mut self.name as &mut dyn Node]
    }
}

/// Body test transforms (RFC 5173): `:raw`, `:text` or `:content <ws> <list>`.
#[derive(Debug, Clone)]
pub struct BodyTransform {
    id: NodeId,
    keyword: String,
    content_types: Option<(Whitespace, StringList)>,
}

impl BodyTransform {
    pub const NAME: &'static str = "body-transform";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: ":text".to_string(),
            content_types: None,
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        [":raw", ":text", ":content"].iter().any(|t| starts_with_tag(s, t))
    }

    pub fn transform(&self) -> String {
        self.keyword.to_ascii_lowercase()
    }

    pub fn content_types(&self) -> Vec<String> {
        self.content_types
            .as_ref()
            .map(|(_, list)| list.values())
            .unwrap_or_default()
    }
}

impl Node for BodyTransform {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        if !Self::matches(input.rest()) {
            return Err(input.error("one of :raw, :text, :content").into());
        }
        let (keyword, mut input) = input.take(scan_tag(input.rest()));
        self.keyword = keyword.to_string();
        self.content_types = None;
        if keyword.eq_ignore_ascii_case(":content") {
            let mut ws = Whitespace::new(cx, " ");
            input = ws.init(cx, input)?;
            let mut list = StringList::new(cx);
            input = list.init(cx, input)?;
            self.content_types = Some((ws, list));
        }
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        if let Some((ws, list)) = &self.content_types {
            ws.to_script(out);
            list.to_script(out);
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        match &self.content_types {
            Some((ws, list)) => vec![ws as &dyn Node, list as &dyn Node],
            None => Vec::new(),
        }
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        match &mut self.content_types {
            Some((ws, list)) => vec![ws as &mut dyn Node, list as &mut dyn Node],
            None => Vec::new(),
        }
    }
}

/// A tagged argument together with the whitespace that follows it.
#[derive(Debug)]
pub struct Tagged {
    pub tag: Box<dyn Node>,
    pub trailing: Whitespace,
}

/// Consumes `(<tag> <ws>)*` where each tag comes from one of `categories`.
/// Stops at the first position no tag rule matches. A category may appear
/// at most once.
pub fn parse_tags<'a>(
    cx: &mut Context<'_>,
    categories: &[&str],
    mut input: Input<'a>,
) -> Result<(Vec<Tagged>, Input<'a>)> {
    let mut tags = Vec::new();
    let mut seen: Vec<&str> = Vec::new();
    loop {
        let Some(category) = categories
            .iter()
            .copied()
            .find(|category| cx.probe(category, &input).is_some())
        else {
            break;
        };
        if seen.contains(&category) {
            return Err(input.error(format!("one {category} argument")).into());
        }
        seen.push(category);
        let (tag, rest) = cx.parse_required(&[category], input, category)?;
        let mut trailing = Whitespace::new(cx, " ");
        input = trailing.init(cx, rest)?;
        tags.push(Tagged { tag, trailing });
    }
    Ok((tags, input))
}

/// The first tag whose kind starts with `category`.
pub fn find_tag<'t>(tags: &'t [Tagged], category: &str) -> Option<&'t dyn Node> {
    tags.iter()
        .map(|t| t.tag.as_ref())
        .find(|tag| tag.kind().starts_with(category))
}

pub(crate) fn tags_to_script(tags: &[Tagged], out: &mut String) {
    for t in tags {
        t.tag.to_script(out);
        t.trailing.to_script(out);
    }
}

pub(crate) fn tag_children<'t>(tags: &'t [Tagged], children: &mut Vec<&'t dyn Node>) {
    for t in tags {
        children.push(t.tag.as_ref());
        children.push(&t.trailing);
    }
}

pub(crate) fn tag_children_mut<'t>(tags: &'t mut [Tagged], children: &mut Vec<&'t mut dyn Node>) {
    for t in tags {
        children.push(t.tag.as_mut());
        children.push(&mut t.trailing);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::sieve::registry::Registry;

    #[test]
    fn test_number_quantifiers() {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut n = Number::new(&mut cx, 0);
        let rest = n.init(&mut cx, Input::new("500K\r\n")).unwrap();
        assert_eq!(rest.rest(), "\r\n");
        assert_eq!(n.value(), Some(500 * 1024));
        assert_eq!(n.script(), "500K");
        n.init(&mut cx, Input::new("1g")).unwrap();
        assert_eq!(n.value(), Some(1 << 30));
        n.init(&mut cx, Input::new("99999999999999999999G")).unwrap();
        assert_eq!(n.value(), None);
        assert!(n.init(&mut cx, Input::new("K")).is_err());
    }

    #[test]
    fn test_terminator_keeps_leading_space() {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut t = Terminator::new(&mut cx);
        assert_eq!(t.script(), ";");
        let rest = t.init(&mut cx, Input::new(" ;\r\n")).unwrap();
        assert_eq!(rest.rest(), "\r\n");
        assert_eq!(t.script(), " ;");
        let err = t.init(&mut cx, Input::new("}")).unwrap_err();
        assert!(err.to_string().contains("expected `;`"));
        assert!(Terminator::matches("  ;"));
        assert!(!Terminator::matches("x;"));
    }

    #[test]
    fn test_tag_families() {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut tag = Tag::new(&mut cx, &MATCH_TYPE_CORE);
        tag.init(&mut cx, Input::new(":Contains \"x\"")).unwrap();
        assert_eq!(tag.script(), ":Contains");
        assert_eq!(tag.match_type(), Some(MatchType::Contains));
        assert!(!tag.set_value(":regex"));
        assert!(tag.set_value(":is"));
        assert_eq!(tag.script(), ":is");

        let mut requires = Requirements::new();
        tag.requires(&mut requires);
        assert!(requires.is_empty());
        Tag::new(&mut cx, &MATCH_TYPE_REGEX).requires(&mut requires);
        assert!(requires.is_required("regex"));

        let mut part = Tag::new(&mut cx, &ADDRESS_PART_CORE);
        let err = part.init(&mut cx, Input::new(":user")).unwrap_err();
        assert!(err.to_string().contains(":all, :localpart, :domain"));
    }

    #[test]
    fn test_comparator_and_transform() {
        let registry = Registry::empty();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut cmp = Comparator::new(&mut cx);
        assert_eq!(cmp.script(), ":comparator \"i;ascii-casemap\"");
        let text = ":COMPARATOR\t\"i;octet\" rest";
        let rest = cmp.init(&mut cx, Input::new(text)).unwrap();
        assert_eq!(rest.rest(), " rest");
        assert_eq!(cmp.comparator(), "i;octet");
        assert_eq!(cmp.script(), ":COMPARATOR\t\"i;octet\"");

        let mut transform = BodyTransform::new(&mut cx);
        let text = ":content [\"text\", \"image\"] \"x\"";
        let rest = transform.init(&mut cx, Input::new(text)).unwrap();
        assert_eq!(rest.rest(), " \"x\"");
        assert_eq!(transform.content_types(), ["text", "image"]);
        transform.init(&mut cx, Input::new(":raw")).unwrap();
        assert_eq!(transform.transform(), ":raw");
        assert!(transform.content_types().is_empty());
    }
}
