/// The built-in grammar.
///
/// Registration order is probe order within a category. Extension
/// families are registered only when the config leaves them enabled.
pub mod actions;
pub mod atoms;
pub mod conditions;
pub mod control;
pub mod flags;
pub mod strings;
pub mod whitespace;

use crate::config::EngineConfig;
use crate::sieve::ast::{Context, Node};
use crate::sieve::error::Result;
use crate::sieve::lexer::starts_with_keyword;
use crate::sieve::registry::{Factory, Matcher, Registry};

use actions::{ActionSpec, SimpleAction};
use atoms::{BodyTransform, Comparator, Number, Tag, TagSpec, Terminator};
use conditions::{ConstantTest, ListTest, ListTestSpec, NotTest, SizeTest, TestList};
use control::{Block, If, Require};
use strings::{SieveString, StringList};
use whitespace::Whitespace;

pub fn register(registry: &mut Registry, config: &EngineConfig) -> Result<()> {
    registry.register("whitespace", Whitespace::NAME, Whitespace::matches, Whitespace::create)?;
    registry.register("stringlist", StringList::NAME, StringList::matches, StringList::create)?;
    registry.register("string", SieveString::NAME, SieveString::matches, SieveString::create)?;
    registry.register("number", Number::NAME, Number::matches, Number::create)?;
    registry.register("atom", Terminator::NAME, Terminator::matches, Terminator::create)?;
    registry.register("block", Block::NAME, Block::matches, Block::create)?;

    registry.register("control", Require::NAME, Require::matches, Require::create)?;
    registry.register("control", If::NAME, If::matches, If::create)?;

    register_arguments(registry, config)?;
    register_actions(registry, config)?;
    register_tests(registry, config)?;

    if config.is_enabled(flags::EXTENSION) {
        flags::register(registry)?;
    }
    Ok(())
}

fn register_arguments(registry: &mut Registry, config: &EngineConfig) -> Result<()> {
    registry.register("comparator", Comparator::NAME, Comparator::matches, Comparator::create)?;
    registry.register(
        "match-type",
        atoms::MATCH_TYPE_CORE.name,
        |s| Tag::matches_spec(&atoms::MATCH_TYPE_CORE, s),
        match_type_core,
    )?;
    if config.is_enabled("regex") {
        registry.register(
            "match-type",
            atoms::MATCH_TYPE_REGEX.name,
            |s| Tag::matches_spec(&atoms::MATCH_TYPE_REGEX, s),
            match_type_regex,
        )?;
    }
    registry.register(
        "address-part",
        atoms::ADDRESS_PART_CORE.name,
        |s| Tag::matches_spec(&atoms::ADDRESS_PART_CORE, s),
        address_part_core,
    )?;
    if config.is_enabled("subaddress") {
        registry.register(
            "address-part",
            atoms::ADDRESS_PART_SUBADDRESS.name,
            |s| Tag::matches_spec(&atoms::ADDRESS_PART_SUBADDRESS, s),
            address_part_subaddress,
        )?;
    }
    registry.register(
        "size-relation",
        atoms::SIZE_RELATION.name,
        |s| Tag::matches_spec(&atoms::SIZE_RELATION, s),
        size_relation,
    )?;
    if config.is_enabled("body") {
        registry.register(
            "body-transform",
            BodyTransform::NAME,
            BodyTransform::matches,
            BodyTransform::create,
        )?;
    }
    Ok(())
}

fn register_actions(registry: &mut Registry, config: &EngineConfig) -> Result<()> {
    let simple: [(&'static ActionSpec, Matcher, Factory); 6] = [
        (&actions::KEEP, |s| SimpleAction::matches_spec(&actions::KEEP, s), keep),
        (&actions::STOP, |s| SimpleAction::matches_spec(&actions::STOP, s), stop),
        (&actions::DISCARD, |s| SimpleAction::matches_spec(&actions::DISCARD, s), discard),
        (&actions::REDIRECT, |s| SimpleAction::matches_spec(&actions::REDIRECT, s), redirect),
        (&actions::FILEINTO, |s| SimpleAction::matches_spec(&actions::FILEINTO, s), fileinto),
        (&actions::REJECT, |s| SimpleAction::matches_spec(&actions::REJECT, s), reject),
    ];
    for (spec, matcher, factory) in simple {
        if spec.extension.is_some_and(|ext| !config.is_enabled(ext)) {
            continue;
        }
        registry.register("action", spec.name, matcher, factory)?;
    }
    Ok(())
}

fn register_tests(registry: &mut Registry, config: &EngineConfig) -> Result<()> {
    let lists: [(&'static ListTestSpec, Matcher, Factory); 5] = [
        (&conditions::HEADER, |s| ListTest::matches_spec(&conditions::HEADER, s), header),
        (&conditions::ADDRESS, |s| ListTest::matches_spec(&conditions::ADDRESS, s), address),
        (&conditions::ENVELOPE, |s| ListTest::matches_spec(&conditions::ENVELOPE, s), envelope),
        (&conditions::EXISTS, |s| ListTest::matches_spec(&conditions::EXISTS, s), exists),
        (&conditions::BODY, |s| ListTest::matches_spec(&conditions::BODY, s), body),
    ];
    for (spec, matcher, factory) in lists {
        if spec.extension.is_some_and(|ext| !config.is_enabled(ext)) {
            continue;
        }
        registry.register("test", spec.name, matcher, factory)?;
    }

    registry.register("test", SizeTest::NAME, SizeTest::matches, SizeTest::create)?;
    registry.register(
        "test",
        "test/true",
        |s| starts_with_keyword(s, "true"),
        ConstantTest::create_true,
    )?;
    registry.register(
        "test",
        "test/false",
        |s| starts_with_keyword(s, "false"),
        ConstantTest::create_false,
    )?;
    registry.register("test", NotTest::NAME, NotTest::matches, NotTest::create)?;
    registry.register(
        "test",
        "test/allof",
        |s| starts_with_keyword(s, "allof"),
        TestList::create_allof,
    )?;
    registry.register(
        "test",
        "test/anyof",
        |s| starts_with_keyword(s, "anyof"),
        TestList::create_anyof,
    )?;
    Ok(())
}

fn tag(cx: &mut Context<'_>, spec: &'static TagSpec) -> Box<dyn Node> {
    Box::new(Tag::new(cx, spec))
}

fn match_type_core(cx: &mut Context<'_>) -> Box<dyn Node> {
    tag(cx, &atoms::MATCH_TYPE_CORE)
}

fn match_type_regex(cx: &mut Context<'_>) -> Box<dyn Node> {
    tag(cx, &atoms::MATCH_TYPE_REGEX)
}

fn address_part_core(cx: &mut Context<'_>) -> Box<dyn Node> {
    tag(cx, &atoms::ADDRESS_PART_CORE)
}

fn address_part_subaddress(cx: &mut Context<'_>) -> Box<dyn Node> {
    tag(cx, &atoms::ADDRESS_PART_SUBADDRESS)
}

fn size_relation(cx: &mut Context<'_>) -> Box<dyn Node> {
    tag(cx, &atoms::SIZE_RELATION)
}

fn action(cx: &mut Context<'_>, spec: &'static ActionSpec) -> Box<dyn Node> {
    Box::new(SimpleAction::new(cx, spec))
}

fn keep(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::KEEP)
}

fn stop(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::STOP)
}

fn discard(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::DISCARD)
}

fn redirect(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::REDIRECT)
}

fn fileinto(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::FILEINTO)
}

fn reject(cx: &mut Context<'_>) -> Box<dyn Node> {
    action(cx, &actions::REJECT)
}

fn list_test(cx: &mut Context<'_>, spec: &'static ListTestSpec) -> Box<dyn Node> {
    Box::new(ListTest::new(cx, spec))
}

fn header(cx: &mut Context<'_>) -> Box<dyn Node> {
    list_test(cx, &conditions::HEADER)
}

fn address(cx: &mut Context<'_>) -> Box<dyn Node> {
    list_test(cx, &conditions::ADDRESS)
}

fn envelope(cx: &mut Context<'_>) -> Box<dyn Node> {
    list_test(cx, &conditions::ENVELOPE)
}

fn exists(cx: &mut Context<'_>) -> Box<dyn Node> {
    list_test(cx, &conditions::EXISTS)
}

fn body(cx: &mut Context<'_>) -> Box<dyn Node> {
    list_test(cx, &conditions::BODY)
}
