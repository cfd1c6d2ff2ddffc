/// IMAP flag actions and test (RFC 5232).
///
/// ```text
/// setflag    [<variablename: string>] <list-of-flags: string-list>;
/// addflag    [<variablename: string>] <list-of-flags: string-list>;
/// removeflag [<variablename: string>] <list-of-flags: string-list>;
/// hasflag    [MATCH-TYPE] [COMPARATOR] [<variable-list: string-list>]
///            <list-of-flags: string-list>
/// ```
///
/// The optional variable name is recognised by lookahead: a first string
/// list directly followed (after whitespace) by a second one names the
/// variable. Nothing is ever re-parsed.
use crate::model::enums::FlagOperation;
use crate::sieve::ast::{Context, Node, NodeId};
use crate::sieve::error::Result;
use crate::sieve::lexer::{starts_with_keyword, Input};
use crate::sieve::registry::Registry;
use crate::sieve::requires::Requirements;
use crate::sieve::rules::atoms::{
    find_tag, parse_tags, tag_children, tag_children_mut, tags_to_script, Tagged, Terminator,
};
use crate::sieve::rules::strings::StringList;
use crate::sieve::rules::whitespace::Whitespace;

pub const EXTENSION: &str = "imap4flags";

pub fn register(registry: &mut Registry) -> Result<()> {
    registry.register(
        "action",
        "action/addflag",
        |s| starts_with_keyword(s, "addflag"),
        FlagAction::create_add,
    )?;
    registry.register(
        "action",
        "action/removeflag",
        |s| starts_with_keyword(s, "removeflag"),
        FlagAction::create_remove,
    )?;
    registry.register(
        "action",
        "action/setflag",
        |s| starts_with_keyword(s, "setflag"),
        FlagAction::create_set,
    )?;
    registry.register("test", HasFlag::NAME, HasFlag::matches, HasFlag::create)?;
    Ok(())
}

/// `true` when, after optional whitespace, another string list follows.
fn second_list_follows(rest: &str) -> bool {
    Whitespace::scan(rest).is_ok_and(|n| StringList::matches(&rest[n..]))
}

/// `setflag`, `addflag` and `removeflag`.
///
/// `setflag` goes straight from its flag list to the terminator; the other
/// two carry an extra optional whitespace slot in between.
#[derive(Debug, Clone)]
pub struct FlagAction {
    id: NodeId,
    operation: FlagOperation,
    keyword: String,
    ws: Whitespace,
    variable: Option<(StringList, Whitespace)>,
    flags: StringList,
    trailing: Option<Whitespace>,
    terminator: Terminator,
}

impl FlagAction {
    pub fn new(cx: &mut Context<'_>, operation: FlagOperation) -> Self {
        let id = cx.next_id();
        let ws = Whitespace::new(cx, " ");
        let flags = StringList::new(cx);
        let trailing = match operation {
            FlagOperation::Set => None,
            FlagOperation::Add | FlagOperation::Remove => Some(Whitespace::new(cx, "")),
        };
        Self {
            id,
            operation,
            keyword: operation.as_sieve().to_string(),
            ws,
            variable: None,
            flags,
            trailing,
            terminator: Terminator::new(cx),
        }
    }

    pub fn create_set(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, FlagOperation::Set))
    }

    pub fn create_add(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, FlagOperation::Add))
    }

    pub fn create_remove(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx, FlagOperation::Remove))
    }

    pub fn operation(&self) -> FlagOperation {
        self.operation
    }

    pub fn flags(&self) -> &StringList {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut StringList {
        &mut self.flags
    }

    /// The variable holding the flags, when one is named.
    pub fn variable(&self) -> Option<String> {
        self.variable
            .as_ref()
            .and_then(|(list, _)| list.values().into_iter().next())
    }

    pub fn set_variable(&mut self, cx: &mut Context<'_>, name: Option<&str>) {
        self.variable = name.map(|name| {
            let mut list = StringList::new(cx);
            list.set_values(cx, &[name]);
            (list, Whitespace::new(cx, " "))
        });
    }
}

impl Node for FlagAction {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        match self.operation {
            FlagOperation::Set => "action/setflag",
            FlagOperation::Add => "action/addflag",
            FlagOperation::Remove => "action/removeflag",
        }
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, mut input) = input.keyword(self.operation.as_sieve())?;
        self.keyword = keyword.to_string();
        input = self.ws.init(cx, input)?;

        let mut first = StringList::new(cx);
        input = first.init(cx, input)?;
        if second_list_follows(input.rest()) {
            let mut gap = Whitespace::new(cx, " ");
            input = gap.init(cx, input)?;
            let mut flags = StringList::new(cx);
            input = flags.init(cx, input)?;
            self.variable = Some((first, gap));
            self.flags = flags;
        } else {
            self.variable = None;
            self.flags = first;
        }

        if let Some(trailing) = &mut self.trailing {
            input = trailing.init(cx, input)?;
        }
        self.terminator.init(cx, input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        if let Some((list, gap)) = &self.variable {
            list.to_script(out);
            gap.to_script(out);
        }
        self.flags.to_script(out);
        if let Some(trailing) = &self.trailing {
            trailing.to_script(out);
        }
        self.terminator.to_script(out);
    }

    fn requires(&self, requires: &mut Requirements) {
        requires.require(EXTENSION);
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = vec![&self.ws as &dyn Node];
        if let Some((list, gap)) = &self.variable {
            children.push(list as &dyn Node);
            children.push(gap as &dyn Node);
        }
        children.push(&self.flags as &dyn Node);
        if let Some(trailing) = &self.trailing {
            children.push(trailing as &dyn Node);
        }
        children.push(&self.terminator as &dyn Node);
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = vec![&mut self.ws as &mut dyn Node];
        if let Some((list, gap)) = &mut self.variable {
            children.push(list as &mut dyn Node);
            children.push(gap as &mut dyn Node);
        }
        children.push(&mut self.flags as &mut dyn Node);
        if let Some(trailing) = &mut self.trailing {
            children.push(trailing as &mut dyn Node);
        }
        children.push(&mut self.terminator as &mut dyn Node);
        children
    }
}

/// `hasflag` test.
#[derive(Debug)]
pub struct HasFlag {
    id: NodeId,
    keyword: String,
    ws: Whitespace,
    tags: Vec<Tagged>,
    variables: Option<(StringList, Whitespace)>,
    flags: StringList,
    trailing: Whitespace,
}

impl HasFlag {
    pub const NAME: &'static str = "test/hasflag";
    const TAGS: &'static [&'static str] = &["comparator", "match-type"];

    pub fn new(cx: &mut Context<'_>) -> Self {
        Self {
            id: cx.next_id(),
            keyword: "hasflag".to_string(),
            ws: Whitespace::new(cx, " "),
            tags: Vec::new(),
            variables: None,
            flags: StringList::new(cx),
            trailing: Whitespace::new(cx, ""),
        }
    }

    pub fn create(cx: &mut Context<'_>) -> Box<dyn Node> {
        Box::new(Self::new(cx))
    }

    pub fn matches(s: &str) -> bool {
        starts_with_keyword(s, "hasflag")
    }

    pub fn match_type(&self) -> Option<&dyn Node> {
        find_tag(&self.tags, "match-type")
    }

    pub fn comparator(&self) -> Option<&dyn Node> {
        find_tag(&self.tags, "comparator")
    }

    pub fn variables(&self) -> Option<&StringList> {
        self.variables.as_ref().map(|(list, _)| list)
    }

    pub fn flags(&self) -> &StringList {
        &self.flags
    }

    pub fn flags_mut(&mut self) -> &mut StringList {
        &mut self.flags
    }
}

impl Node for HasFlag {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> &'static str {
        Self::NAME
    }

    fn init<'a>(&mut self, cx: &mut Context<'_>, input: Input<'a>) -> Result<Input<'a>> {
        let (keyword, mut input) = input.keyword("hasflag")?;
        self.keyword = keyword.to_string();
        input = self.ws.init(cx, input)?;

        let (tags, mut input) = parse_tags(cx, Self::TAGS, input)?;
        self.tags = tags;

        let mut first = StringList::new(cx);
        input = first.init(cx, input)?;
        let mut gap = Whitespace::new(cx, "");
        input = gap.init(cx, input)?;

        if StringList::matches(input.rest()) {
            let mut flags = StringList::new(cx);
            input = flags.init(cx, input)?;
            let mut trailing = Whitespace::new(cx, "");
            input = trailing.init(cx, input)?;
            self.variables = Some((first, gap));
            self.flags = flags;
            self.trailing = trailing;
        } else {
            self.variables = None;
            self.flags = first;
            self.trailing = gap;
        }
        Ok(input)
    }

    fn to_script(&self, out: &mut String) {
        out.push_str(&self.keyword);
        self.ws.to_script(out);
        tags_to_script(&self.tags, out);
        if let Some((list, gap)) = &self.variables {
            list.to_script(out);
            gap.to_script(out);
        }
        self.flags.to_script(out);
        self.trailing.to_script(out);
    }

    fn requires(&self, requires: &mut Requirements) {
        requires.require(EXTENSION);
    }

    fn children(&self) -> Vec<&dyn Node> {
        let mut children = vec![&self.ws as &dyn Node];
        tag_children(&self.tags, &mut children);
        if let Some((list, gap)) = &self.variables {
            children.push(list as &dyn Node);
            children.push(gap as &dyn Node);
        }
        children.push(&self.flags as &dyn Node);
        children.push(&self.trailing as &dyn Node);
        children
    }

    fn children_mut(&mut self) -> Vec<&mut dyn Node> {
        let mut children = vec![&mut self.ws as &mut dyn Node];
        tag_children_mut(&mut self.tags, &mut children);
        if let Some((list, gap)) = &mut self.variables {
            children.push(list as &mut dyn Node);
            children.push(gap as &mut dyn Node);
        }
        children.push(&mut self.flags as &mut dyn Node);
        children.push(&mut self.trailing as &mut dyn Node);
        children
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LineEnding;
    use crate::model::enums::MatchType;
    use crate::sieve::error::Error;
    use crate::sieve::rules::atoms::Tag;

    fn parse_flag(op: FlagOperation, text: &str) -> Result<(FlagAction, String)> {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut action = FlagAction::new(&mut cx, op);
        let rest = action.init(&mut cx, Input::new(text))?;
        Ok((action, rest.rest().to_string()))
    }

    fn parse_hasflag(text: &str) -> Result<(HasFlag, String)> {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut test = HasFlag::new(&mut cx);
        let rest = test.init(&mut cx, Input::new(text))?;
        Ok((test, rest.rest().to_string()))
    }

    #[test]
    fn test_setflag_with_variable() {
        let text = r#"setflag "seen" "\\Seen";"#;
        let (action, rest) = parse_flag(FlagOperation::Set, text).unwrap();
        assert!(rest.is_empty());
        assert_eq!(action.variable().as_deref(), Some("seen"));
        assert_eq!(action.flags().values(), ["\\Seen"]);
        assert_eq!(action.script(), text);
    }

    #[test]
    fn test_setflag_without_variable() {
        let text = r#"setflag ["\\Seen", "\\Answered"];"#;
        let (action, _) = parse_flag(FlagOperation::Set, text).unwrap();
        assert_eq!(action.variable(), None);
        assert_eq!(action.flags().values(), ["\\Seen", "\\Answered"]);
        assert_eq!(action.script(), text);
    }

    #[test]
    fn test_addflag_trailing_space() {
        let text = r#"addflag "x" "\\Flagged" ;"#;
        let (action, _) = parse_flag(FlagOperation::Add, text).unwrap();
        assert_eq!(action.script(), text);
        assert_eq!(action.kind(), "action/addflag");
    }

    #[test]
    fn test_removeflag_alone() {
        let err = parse_flag(FlagOperation::Remove, "removeflag").unwrap_err();
        match err {
            Error::Syntax(e) => {
                assert_eq!(e.offset, 10);
                assert_eq!(e.expected, "string list");
            }
            other => panic!("Expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_requires_is_static() {
        let (action, _) = parse_flag(FlagOperation::Remove, "removeflag \"\";").unwrap();
        let mut requires = Requirements::new();
        action.requires(&mut requires);
        assert_eq!(requires.names(), [EXTENSION]);
    }

    #[test]
    fn test_hasflag_with_match_type() {
        let text = r#"hasflag :is "x" "\\Seen""#;
        let (test, rest) = parse_hasflag(text).unwrap();
        assert!(rest.is_empty());
        let match_type = test.match_type().expect("match type");
        let tag = match_type.downcast_ref::<Tag>().unwrap();
        assert_eq!(tag.match_type(), Some(MatchType::Is));
        assert_eq!(test.variables().unwrap().values(), ["x"]);
        assert_eq!(test.flags().values(), ["\\Seen"]);
        assert_eq!(test.script(), text);
    }

    #[test]
    fn test_hasflag_plain() {
        let text = "hasflag \"\\\\Flagged\"\r\n{";
        let (test, rest) = parse_hasflag(text).unwrap();
        assert_eq!(rest, "{");
        assert!(test.match_type().is_none());
        assert!(test.variables().is_none());
        assert_eq!(test.script(), "hasflag \"\\\\Flagged\"\r\n");
    }

    #[test]
    fn test_hasflag_regex_requires_regex() {
        let (test, _) = parse_hasflag(r#"hasflag :regex "^\\S""#).unwrap();
        let mut requires = Requirements::new();
        (&test as &dyn Node).walk(&mut |n| n.requires(&mut requires));
        assert_eq!(requires.names(), ["imap4flags", "regex"]);
    }

    #[test]
    fn test_fresh_nodes_are_valid() {
        let registry = Registry::with_defaults();
        let mut next = 1;
        let mut cx = Context::new(&registry, &mut next, LineEnding::Crlf);
        let mut set = FlagAction::new(&mut cx, FlagOperation::Set);
        assert_eq!(set.script(), "setflag \"\";");
        set.flags_mut().set_values(&mut cx, &["\\Seen"]);
        set.set_variable(&mut cx, Some("flags"));
        assert_eq!(set.script(), "setflag \"flags\" \"\\\\Seen\";");
        assert_eq!(HasFlag::new(&mut cx).script(), "hasflag \"\"");
    }
}
