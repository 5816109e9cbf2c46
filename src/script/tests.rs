use super::ast::{ObjectMacro, Trigger};
use super::parse;
use crate::Options;

fn read(code: &str) -> super::ast::Root {
    parse("test.rive", code, &Options::default())
}

#[test]
fn definitions_land_in_begin() {
    let root = read("
        ! version = 2.0
        ! global debug = false
        ! var name = Aiden
        ! sub what's = what is
        ! person I = you
        ! array colors = red green
        ^ blue
    ");

    assert_eq!(root.begin.global.get("debug").map(String::as_str), Some("false"));
    assert_eq!(root.begin.var.get("name").map(String::as_str), Some("Aiden"));
    assert_eq!(root.begin.sub.get("what's").map(String::as_str), Some("what is"));
    assert_eq!(root.begin.person.get("i").map(String::as_str), Some("you"));
    assert_eq!(root.begin.array.get("colors"), Some(&vec!["red".to_string(), "green".to_string(), "blue".to_string()]));
}

#[test]
fn triggers_collect_their_lines() {
    let root = read("
        + hello bot
        - Hello, human!
        - Hi there!{weight=3}

        + how old am i
        * <get age> == undefined => I don't know.
        - You are <get age>.

        + hey
        @ hello bot

        + yes
        % do you like cheese
        - Me too.
    ");

    let triggers = &root.topics["random"].triggers;
    assert_eq!(triggers.len(), 4);
    assert_eq!(triggers[0], Trigger {
        pattern: "hello bot".to_string(),
        replies: vec!["Hello, human!".to_string(), "Hi there!{weight=3}".to_string()],
        ..Trigger::default()
    });
    assert_eq!(triggers[1].conditions, vec!["<get age> == undefined => I don't know.".to_string()]);
    assert_eq!(triggers[2].redirect.as_deref(), Some("hello bot"));
    assert_eq!(triggers[3].previous.as_deref(), Some("do you like cheese"));
}

#[test]
fn topics_and_begin_blocks() {
    let root = read("
        > begin
        + request
        - {ok}
        < begin

        > topic Sales includes support inherits global
        + buy *
        - Sold.
        < topic

        > topic sales inherits misc
        < topic

        + after topic
        - back in random
    ");

    assert_eq!(root.topics["__begin__"].triggers[0].pattern, "request");
    let sales = &root.topics["sales"];
    assert_eq!(sales.includes, vec!["support"]);
    assert_eq!(sales.inherits, vec!["global", "misc"]);
    assert_eq!(sales.triggers.len(), 1);
    assert_eq!(root.topics["random"].triggers[0].pattern, "after topic");
}

#[test]
fn comments_and_continuations() {
    let root = read("
        // a comment
        /* a block
           + not a trigger
           comment */
        ! local concat = space
        + tell me a story // inline comment
        - Once upon a time
        ^ there was a bot.

        ! local concat = newline
        + poem
        - Roses are red
        ^ violets are blue
    ");

    let triggers = &root.topics["random"].triggers;
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[0].pattern, "tell me a story");
    assert_eq!(triggers[0].replies, vec!["Once upon a time there was a bot."]);
    assert_eq!(triggers[1].replies, vec!["Roses are red\nviolets are blue"]);
}

#[test]
fn default_concat_joins_without_space() {
    let root = read("
        + long
        - abc
        ^ def
    ");
    assert_eq!(root.topics["random"].triggers[0].replies, vec!["abcdef"]);
}

#[test]
fn object_blocks_are_verbatim() {
    let root = read("
        > object hello javascript
            return \"hello \" + args[0];  // kept
        < object

        + hi
        - <call>hello world</call>
    ");

    assert_eq!(root.objects, vec![ObjectMacro {
        name: "hello".to_string(),
        language: "javascript".to_string(),
        code: vec!["            return \"hello \" + args[0];  // kept".to_string()],
    }]);
    assert_eq!(root.topics["random"].triggers.len(), 1);
}

#[test]
fn strict_mode_skips_bad_triggers() {
    let code = "
        + Hello There
        - should be skipped in strict mode

        + fine
        - ok
        * broken condition
    ";

    let strict = read(code);
    let triggers = &strict.topics["random"].triggers;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].pattern, "fine");
    assert!(triggers[0].conditions.is_empty());

    let lenient = parse("test.rive", code, &Options { strict: false, ..Options::default() });
    assert_eq!(lenient.topics["random"].triggers.len(), 2);
}

#[test]
fn stray_lines_are_ignored() {
    let root = read("
        - reply without trigger
        ? unknown command
        ! definition without equals
        + ok
        - fine
    ");
    assert_eq!(root.topics["random"].triggers.len(), 1);
    assert_eq!(root.topics["random"].triggers[0].replies, vec!["fine"]);
}
