/// Tests (RFC 5228 section 5) and the `envelope` / `body` extensions.
use crate::model::enums::{LogicOperator, SizeRelation};
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{starts_with_keyword, Input};
use crate::sieve::requires::Requirements;
use crate::sieve::rules::atoms::{
    find_tag, parse_tags, tag_children, tag_children_mut, tags_to_script, Number, Tag, Tagged,
    SIZE_RELATION,
};
use crate::sieve::rules::strings::StringList;
use crate::sieve::rules::whitespace::Whitespace;

pub const TEST_CATEGORIES: &[&str] = &["test"];

/// Shape of a test taking tagged arguments and string lists.
#[derive(Debug)]
pub struct ListTestSpec {
    pub name: &'static str,
    pub keyword: &'static str,
    pub tags: &'static [&'static str],
    /// Number of string lists; all mandatory.
    pub lists: usize,
    pub extension: Option<&'static str>,
}

pub static HEADER: ListTestSpec = ListTestSpec {
    name: "test/header",
    keyword: "header",
    tags: &["comparator", "match-type"],
    lists: 2,
    extension: None,
};

pub static ADDRESS: ListTestSpec = ListTestSpec {
    name: "test/address",
    keyword: "address",
    tags: &["comparator", "address-part", "match-type"],
    lists: 2,
    extension: None,
};

pub static ENVELOPE: ListTestSpec = ListTestSpec {
    name: "test/envelope",
    keyword: "envelope",
    tags: &["comparator", "address-part", "match-type"],
    lists: 2,
    extension: Some("envelope"),
};

pub static EXISTS: ListTestSpec = ListTestSpec {
    name: "test/exists",
    keyword: "exists",
    tags: &[],
    lists: 1,
    extension: None,
};

pub static BODY: ListTestSpec = ListTestSpec {
    name: "test/body",
    keyword: "body",
    tags: &["comparator", "match-type", "body-transform"],
    lists: 1,
    extension: Some("body"),
};

/// `<keyword> <ws> (<tag> <ws>)* (<string-list> <ws>){n}`
///
/// The whitespace after the last list belongs to the test.
#[derive(Debug)]
pub struct ListTest {
    id: NodeId,
    spec: &'static ListTestSpec,
    keyword: String,
    ws: Whitespace,
    tags: Vec<Tagged>,
    lists: Vec<(StringList, Whitespace)>,
}

impl ListTest {
    pub fn new(cx: &mut Context<'_>, spec: &'static ListTestSpec) -> Self {
        let id = cx.next_id();
        let ws = Whitespace::new(cx, " ");
        let lists = (0..spec.lists)
            .map(|i| {
                let gap = if i + 1 < spec.lists { " " } else { "" };
                (StringList::new(cx), Whitespace::new(cx, gap))
            })
            .collect();
        Self {
            id,
            spec,
            keyword: spec.keyword.to_string(),
            ws,
            tags: Vec::new(),
            lists,
        }
    }

    pub fn matches_spec(spec: &ListTestSpec, s: &str) -> bool {
        starts_with_keyword(s, spec.keyword)
    }

    /// The first tag of `category`, e.g. `match-type`.
    pub fn tag(&self, category: &str) -> Option<&dyn Node> {
        find_tag(&self.tags, category)
    }

    pub fn lists(&self) -> impl Iterator<Item = &StringList> {
        self.lists.iter().map(|(list, _)| list)
    }

    pub fn list_mut(&mut self, index: usize) -> Option<&mut StringList> {
        self.lists.get_mut(index).map(|(list, _)| list)
    }
}

impl Node for ListTest {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        self.spec.name
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword(self.spec.keyword)?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let (tags, mut input) = parse_tags(cx, self.spec.tags, input)?;
        self.tags = tags;
        for (list, gap) in &mut self.lists {
            input = list.init(cx, input)?;
            input = gap.init(cx, input)?;
        }
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        tags_to_script(&self.tags, out);
        for (list, gap) in &self.lists {
            list.to_script(out);
            gap.to_script(out);
        }
    }

    fn requires(&self, requires: &mut Requirements) {
        if let Some(ext) = self.spec.extension {
            requires.require(ext);
        }
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = vec![&self.ws as &dyn Node];
        tag_children(&self.tags, &mut children);
        for (list, gap) in &self.lists {
            children.push(list as &dyn Node);
            children.push(gap as &dyn Node);
        }
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = vec![&mut self.ws as &mut dyn Node];
        tag_children_mut(&mut self.tags, &mut children);
        for (list, gap) in &mut self.lists {
            children.push(list as &mut dyn Node);
            children.push(gap as &mut dyn Node);
        }
        children
    }
}

/// `size <ws> (:over / :under) <ws> <number>`
#[derive(Debug, Clone)]
pub struct SizeTest {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    relation: Tag,
    gap: Whitespace,
    limit: Number,
}

impl SizeTest {
    pub const NAME: &'static str = "test/size";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: "size".to_string(),
            ws: Whitespace::new(cx, " "),
            relation: Tag::new(cx, &SIZE_RELATION),
            gap: Whitespace::new(cx, " "),
            limit: Number::new(cx, 0),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_keyword(s, "size")
    }

    pub fn relation(&self) -> Option<SizeRelation> {
        SizeRelation::from_sieve(&self.relation.value())
    }

    pub fn set_relation(&mut self, relation: SizeRelation) {
        self.relation.set_value(relation.as_sieve());
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit.value()
    }

    pub fn set_limit(&mut self, limit: u64) {
        self.limit.set_value(limit);
    }
}

impl Node for SizeTest {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword("size")?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let input = self.relation.init(cx, input)?;
        let input = self.gap.init(cx, input)?;
        self.limit.init(cx, input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        self.relation.to_script(out);
        self.gap.to_script(out);
        self.limit.to_script(out);
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![
            &self.ws as &dyn Node,
            &self.relation as &dyn Node,
            &self.gap as &dyn Node,
            &self.limit as &dyn Node,
        ]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        vec![
            &mut self.ws as &mut dyn Node,
            &mut self.relation as &mut dyn Node,
            &mut self.gap as &mut dyn Node,
            &mut self.limit as &mut dyn Node,
        ]
    }
}

/// `true` or `false`.
#[derive(Debug, Clone)]
pub struct ConstantTest {
    id: NodeId,
    value: bool,
    keyword: String,
}

impl ConstantTest {
    pub fn new(cx: &mut Context<'_>, value: bool) -> Self {
        Self {
            id: cx.next_id(),
            value,
            keyword: value.to_string(),
        }
    }

    pub fn create_true(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, true))
    }

    pub fn create_false(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, false))
    }

    pub fn value(&self) -> bool {
        self.value
    }
}

impl Node for ConstantTest {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        if self.value {
            "test/true"
        } else {
            "test/false"
        }
    }

    fn init<'a>(&mut self, _cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, rest) = input.keyword(if self.value { "true" } else { "false" })?;
        self.keyword = keyword.to_string();
        Ok(rest)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
    }
}

/// `not <ws> <test>`
#[derive(Debug)]
pub struct NotTest {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    test: Box<dyn Node>,
}

impl NotTest {
    pub const NAME: &'static str = "test/not";

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: "not".to_string(),
            ws: Whitespace::new(cx, " "),
            test: ConstantTest::create_true(cx),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_keyword(s, "not")
    }

    pub fn test(&self) -> &dyn Node {
        self.test.as_ref()
    }

    /// Swaps in a new negated test and returns the old one.
    pub fn replace_test(&mut self, test: Box<dyn Node>) -> Box<dyn Node> {
        std::mem::replace(&mut self.test, test)
    }
}

impl Node for NotTest {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword("not")?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let (test, rest) = cx.parse_required(TEST_CATEGORIES, input, "test")?;
        self.test = test;
        Ok(rest)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        self.test.to_script(out);
    }

    fn children(&self) -> Vec<&dyn Node> {
        vec![&self.ws as &dyn Node, self.test.as_ref()]
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        vec![&mut self.ws as &mut dyn Node, self.test.as_mut()]
    }
}

#[derive(Debug)]
pub struct TestListItem {
    pub leading: Whitespace,
    pub test: Box<dyn Node>,
    pub trailing: Whitespace,
}

/// `allof` / `anyof`: `<keyword> <ws> "(" <ws> <test> <ws> ("," ...)* ")"`
#[derive(Debug)]
pub struct TestList {
    id: NodeId,
    operator: LogicOperator,
    keyword: String,
    ws: Whitespace,
    items: Vec<TestListItem>,
}

impl TestList {
    pub fn new(cx: &mut Context<'_>, operator: LogicOperator) -> Self {
        Self {
            id: cx.next_id(),
            operator,
            keyword: operator.as_sieve().to_string(),
            ws: Whitespace::new(cx, " "),
            items: Vec::new(),
        }
    }

    pub fn create_allof(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, LogicOperator::AllOf))
    }

    pub fn create_anyof(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, LogicOperator::AnyOf))
    }

    pub fn operator(&self) -> LogicOperator {
        self.operator
    }

    pub fn tests(&self) -> impl Iterator<Item = &dyn Node> {
        self.items.iter().map(|item| item.test.as_ref())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends a test, separated from the previous one by `", "`.
    pub fn push(&mut self, cx: &mut Context<'_>, test: Box<dyn Node>) {
        let leading = if self.items.is_empty() { "" } else { " " };
        self.items.push(TestListItem {
            leading: Whitespace::new(cx, leading),
            test,
            trailing: Whitespace::new(cx, ""),
        });
    }

    pub fn remove(&mut self, index: usize) -> Option<Box<dyn Node>> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index).test)
    }
}

impl Node for TestList {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        match self.operator {
            LogicOperator::AllOf => "test/allof",
            LogicOperator::AnyOf => "test/anyof",
        }
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, input) = input.keyword(self.operator.as_sieve())?;
        self.keyword = keyword.to_string();
        let input = self.ws.init(cx, input)?;
        let mut input = input.punct('(')?;

        let mut items = Vec::new();
        loop {
            let mut leading = Whitespace::new(cx, "");
            input = leading.init(cx, input)?;
            let (test, rest) = cx.parse_required(TEST_CATEGORIES, input, "test")?;
            let mut trailing = Whitespace::new(cx, "");
            input = trailing.init(cx, rest)?;
            items.push(TestListItem {
                leading,
                test,
                trailing,
            });

            if input.rest().starts_with(',') {
                input = input.punct(',')?;
            } else if input.rest().starts_with(')') {
                input = input.punct(')')?;
                break;
            } else {
                return Err(input.error("`,` or `)`").into());
            }
        }
        self.items = items;
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        out.push('(');
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            item.leading.to_script(out);
            item.test.to_script(out);
            item.trailing.to_script(out);
        }
        out.push(')');
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = vec![&self.ws as &dyn Node];
        for item in &self.items {
            children.push(&item.leading as &dyn Node);
            children.push(item.test.as_ref());
            children.push(&item.trailing as &dyn Node);
        }
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = vec![&mut self.ws as &mut dyn Node];
        for item in &mut self.items {
            children.push(&mut item.leading as &mut dyn Node);
            children.push(item.test.as_mut());
            children.push(&mut item.trailing as &mut dyn Node);
        }
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::model::enums::{AddressPart, MatchType};
    use crate::sieve::registry::Registry;

    fn parse_test(text: &str) -> Result<(Box<dyn Node>, String)> {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let (node, rest) = cx.parse_required(TEST_CATEGORIES, Input::new(text), "test")?;
        Ok((node, rest.rest().to_string()))
    }

    #[test]
    fn test_header_round_trip() {
        let text = "header :comparator \"i;octet\" :contains \"list-id\" \"<duck-hunting.example.com>\"\r\n";
        let (node, rest) = parse_test(text).unwrap();
        assert!(rest.is_empty());
        assert_eq!(node.kind(), "test/header");
        assert_eq!(node.script(), text);
        let header = node.downcast_ref::<ListTest>().unwrap();
        let tag = header.tag("match-type").unwrap().downcast_ref::<Tag>().unwrap();
        assert_eq!(tag.match_type(), Some(MatchType::Contains));
        assert!(header.tag("comparator").is_some());
        let lists: Vec<_> = header.lists().map(StringList::values).collect();
        assert_eq!(lists, [vec!["list-id"], vec!["<duck-hunting.example.com>"]]);
    }

    #[test]
    fn test_address_tags_in_any_order() {
        let text = r#"address :domain :is "to" "example.com""#;
        let (node, _) = parse_test(text).unwrap();
        let address = node.downcast_ref::<ListTest>().unwrap();
        let part = address.tag("address-part").unwrap().downcast_ref::<Tag>().unwrap();
        assert_eq!(part.address_part(), Some(AddressPart::Domain));
        assert_eq!(node.script(), text);
    }

    #[test]
    fn test_repeated_match_type_is_rejected() {
        let err = parse_test(r#"header :is :contains "a" "b""#).unwrap_err();
        assert!(err
            .to_string()
            .starts_with("expected one match-type argument at line 1, column 12"));
        assert!(parse_test(r#"address :all :is "to" "b""#).is_ok());
    }

    #[test]
    fn test_envelope_and_body_require_extensions() {
        let (node, _) = parse_test(r#"envelope :user "to" "x""#).unwrap();
        let mut requires = Requirements::new();
        requires.add_tree(node.as_ref());
        assert_eq!(requires.names(), ["envelope", "subaddress"]);

        let (node, _) = parse_test(r#"body :content "text" :contains "x""#).unwrap();
        let mut requires = Requirements::new();
        requires.add_tree(node.as_ref());
        assert_eq!(requires.names(), ["body"]);
    }

    #[test]
    fn test_size() {
        let (node, rest) = parse_test("size :over 500K\r\n{").unwrap();
        assert_eq!(rest, "\r\n{");
        let size = node.downcast_ref::<SizeTest>().unwrap();
        assert_eq!(size.relation(), Some(SizeRelation::Over));
        assert_eq!(size.limit(), Some(500 * 1024));
        let err = parse_test("size :bigger 1").unwrap_err();
        assert!(err.to_string().contains("one of :over, :under"));
    }

    #[test]
    fn test_nested_logic() {
        let text = "anyof (not exists [\"from\", \"date\"],\r\n        header :contains \"from\" \"marketing@example.com\")";
        let (node, rest) = parse_test(text).unwrap();
        assert!(rest.is_empty());
        assert_eq!(node.script(), text);
        let list = node.downcast_ref::<TestList>().unwrap();
        assert_eq!(list.operator(), LogicOperator::AnyOf);
        let kinds: Vec<_> = list.tests().map(|t| t.kind()).collect();
        assert_eq!(kinds, ["test/not", "test/header"]);
        let not = list.tests().next().unwrap().downcast_ref::<NotTest>().unwrap();
        assert_eq!(not.test().kind(), "test/exists");
    }

    #[test]
    fn test_logic_errors() {
        let err = parse_test("allof (true false)").unwrap_err();
        assert!(err.to_string().contains("expected `,` or `)`"));
        let err = parse_test("allof ()").unwrap_err();
        assert!(err.to_string().contains("expected test"));
        let err = parse_test("not").unwrap_err();
        assert!(err.to_string().contains("expected test"));
        assert!(parse_test("bogus").is_err());
    }

    #[test]
    fn test_build_allof() {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut list = TestList::new(&mut cx, LogicOperator::AllOf);
        let always = ConstantTest::create_true(&mut cx);
        list.push(&mut cx, always);
        let exists = Box::new(ListTest::new(&mut cx, &EXISTS));
        list.push(&mut cx, exists);
        assert_eq!(list.script(), "allof (true, exists \"\")");
        assert_eq!(list.len(), 2);
        assert_eq!(list.remove(0).map(|t| t.kind()), Some("test/true"));
        assert!(list.remove(5).is_none());
        assert_eq!(list.script(), "allof ( exists \"\")");
    }

    #[test]
    fn test_fresh_header() {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut header = ListTest::new(&mut cx, &HEADER);
        header.list_mut(0).unwrap().set_values(&mut cx, &["Subject"]);
        assert_eq!(header.script(), "header \"Subject\" \"\"");
        let mut size = SizeTest::new(&mut cx);
        size.set_relation(SizeRelation::Under);
        size.set_limit(1024);
        assert_eq!(size.script(), "size :under 1024");
    }
}
