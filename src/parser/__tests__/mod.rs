use crate::actions::{alt, Action, ActionRegistry, Value};
use crate::error::{ParseError, ParserInitError};
use crate::grammar::{Grammar, GrammarBuilder, TermSpec};
use crate::parser::{Context, Parser, ParserOptions, TreeNode};
use crate::scanner::Token;
use std::cell::Cell;
use std::rc::Rc;

fn letters(names: &[&str]) -> GrammarBuilder {
    let mut builder = GrammarBuilder::new();
    for name in names {
        builder = builder.terminal(name, TermSpec::string(name));
    }
    builder
}

#[test]
fn parse_simple_expression() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("E", [vec!["E", "+", "id"], vec!["id"]])
        .terminal("+", TermSpec::string("+"))
        .terminal("id", TermSpec::string("id"))
        .start("E")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    parser.parse("id+id+id").unwrap();
}

#[test]
fn single_string_terminal() {
    let (grammar, _) = GrammarBuilder::new()
        .terminal("t", TermSpec::string("a"))
        .start("t")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    let result = parser.parse("a").unwrap();
    assert_eq!(result, Value::List(vec!["a".into(), Value::None]));
}

#[test]
fn single_regex_terminal() {
    let (grammar, _) = GrammarBuilder::new()
        .terminal("t", TermSpec::regex(r"\d+"))
        .start("t")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    let result = parser.parse("23").unwrap();
    assert_eq!(result, Value::List(vec!["23".into(), Value::None]));
}

fn keyword_grammar() -> Rc<Grammar> {
    Rc::new(
        GrammarBuilder::new()
            .rule("S", [vec!["for", "ID", "=", "INT", "to", "INT"]])
            .terminal("KEYWORD", TermSpec::regex(r"\w+"))
            .terminal("ID", TermSpec::regex(r"\w+"))
            .terminal("INT", TermSpec::regex(r"\d+"))
            .terminal("for", TermSpec::string("for"))
            .terminal("=", TermSpec::string("="))
            .terminal("to", TermSpec::string("to"))
            .start("S")
            .build()
            .unwrap()
            .0,
    )
}

#[test]
fn keyword_matches_on_word_boundary() {
    let parser = Parser::<()>::new(keyword_grammar()).unwrap();

    match parser.parse("forid=10 to20") {
        Err(ParseError::Syntax(err)) => {
            assert!(err.expected.contains(&"for".to_string()), "{:?}", err);
            assert!(err.excerpt.starts_with("*forid"), "{}", err.excerpt);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }

    match parser.parse("for id=10 to20") {
        Err(ParseError::Syntax(err)) => {
            assert!(err.expected.contains(&"to".to_string()), "{:?}", err);
        }
        other => panic!("expected a syntax error, got {:?}", other),
    }

    parser.parse("for id=10 to 20").unwrap();
    parser.parse("for for=10 to 20").unwrap();
}

/// A keyword match is more specific than an ordinary regex match of the same
/// length.
#[test]
fn keyword_preferred_over_regexes() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("S", [vec!["for?", "ID?", "=", "INT", "to", "INT"]])
        .terminal("KEYWORD", TermSpec::regex(r"\w+"))
        .terminal("ID", TermSpec::regex(r"\w+"))
        .terminal("INT", TermSpec::regex(r"\d+"))
        .terminal("for", TermSpec::string("for"))
        .terminal("=", TermSpec::string("="))
        .terminal("to", TermSpec::string("to"))
        .start("S")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    parser.parse("for = 10 to 100").unwrap();
}

fn called_actions(
    names: [&'static str; 2],
) -> (ActionRegistry<()>, Rc<Cell<bool>>, Rc<Cell<bool>>) {
    let first = Rc::new(Cell::new(false));
    let second = Rc::new(Cell::new(false));
    let mut actions = ActionRegistry::new();
    let flag = first.clone();
    actions.insert(
        names[0].to_string(),
        Action::term(move |_, _| {
            flag.set(true);
            Value::None
        }),
    );
    let flag = second.clone();
    actions.insert(
        names[1].to_string(),
        Action::term(move |_, _| {
            flag.set(true);
            Value::None
        }),
    );
    (actions, first, second)
}

/// A string match wins over a regex match of the same length.
#[test]
fn disambiguation_most_specific() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a"], vec!["b"]])
        .terminal("a", TermSpec::string("14"))
        .terminal("b", TermSpec::regex(r"\d+"))
        .start("s")
        .build()
        .unwrap();
    let (actions, a_called, b_called) = called_actions(["a", "b"]);
    let parser =
        Parser::with_options(Rc::new(grammar), ParserOptions::default().actions(actions)).unwrap();

    parser.parse("14").unwrap();
    assert!(a_called.get());
    assert!(!b_called.get());
}

#[test]
fn disambiguation_most_specific_longest() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a", "7"], vec!["b"], vec!["c"]])
        .terminal("a", TermSpec::string("14"))
        .terminal("b", TermSpec::regex(r"\d+"))
        .terminal("c", TermSpec::string("147"))
        .terminal("7", TermSpec::string("7"))
        .start("s")
        .build()
        .unwrap();
    let (actions, a_called, c_called) = called_actions(["a", "c"]);
    let parser =
        Parser::with_options(Rc::new(grammar), ParserOptions::default().actions(actions)).unwrap();

    parser.parse("147").unwrap();
    assert!(!a_called.get());
    assert!(c_called.get());
}

#[test]
fn disambiguation_longest_match() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a", "dot", "a"], vec!["b"]])
        .terminal("a", TermSpec::regex(r"\d+"))
        .terminal("b", TermSpec::regex(r"\d+.\d+"))
        .terminal("dot", TermSpec::string("."))
        .start("s")
        .build()
        .unwrap();
    let (actions, a_called, b_called) = called_actions(["a", "b"]);
    let parser =
        Parser::with_options(Rc::new(grammar), ParserOptions::default().actions(actions)).unwrap();

    parser.parse("14.17").unwrap();
    assert!(!a_called.get());
    assert!(b_called.get());
}

#[test]
fn disambiguation_failure_names_candidates() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a"], vec!["b"]])
        .terminal("a", TermSpec::regex(r"\d+.\d+"))
        .terminal("b", TermSpec::regex(r"\d+.75"))
        .start("s")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();

    match parser.parse("14.75") {
        Err(ParseError::Disambiguation(err)) => {
            let names: Vec<&str> = err
                .candidates
                .iter()
                .map(|(name, _)| name.as_str())
                .collect();
            assert!(names.contains(&"a"), "{:?}", err);
            assert!(names.contains(&"b"), "{:?}", err);
            assert!(err.candidates.iter().all(|(_, matched)| matched == "14.75"));
        }
        other => panic!("expected a disambiguation error, got {:?}", other),
    }
}

#[test]
fn disambiguation_prefer_flag() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a"], vec!["b"]])
        .terminal("a", TermSpec::regex(r"\d+.\d+"))
        .terminal("b", TermSpec::regex(r"\d+.75").prefer())
        .start("s")
        .build()
        .unwrap();
    let (actions, a_called, b_called) = called_actions(["a", "b"]);
    let parser =
        Parser::with_options(Rc::new(grammar), ParserOptions::default().actions(actions)).unwrap();

    parser.parse("14.75").unwrap();
    assert!(!a_called.get());
    assert!(b_called.get());
}

#[test]
fn disambiguation_dynamic_callback() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("s", [vec!["a"], vec!["b"]])
        .terminal("a", TermSpec::regex(r"\d+.\d+").dynamic())
        .terminal("b", TermSpec::regex(r"\d+.75").dynamic())
        .start("s")
        .build()
        .unwrap();
    let (actions, a_called, b_called) = called_actions(["a", "b"]);
    let parser = Parser::with_options(
        Rc::new(grammar),
        ParserOptions::default()
            .actions(actions)
            .dynamic_disambiguation(Rc::new(|scan, tokens: &[Token]| {
                tokens
                    .iter()
                    .position(|token| scan.grammar.name_of(token.symbol) == "b")
            })),
    )
    .unwrap();

    parser.parse("14.75").unwrap();
    assert!(!a_called.get());
    assert!(b_called.get());
}

/// In-order character matches of the pattern within the probe.
fn subsequence_score(pattern: &str, probe: &str) -> usize {
    let mut score = 0;
    let mut rest = probe.chars().peekable();
    for expected in pattern.chars() {
        while let Some(ch) = rest.peek().copied() {
            rest.next();
            if ch == expected {
                score += 1;
                break;
            }
        }
    }
    score
}

#[test]
fn custom_token_recognition_fuzzy_fallback() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("Elements", [vec!["Elements", "Element"], vec!["Element"]])
        .rule("Element", [vec!["Bar"], vec!["Baz"], vec!["Number"]])
        .terminal("Bar", TermSpec::regex(r"Bar. \d+"))
        .terminal("Baz", TermSpec::regex(r"Baz. \d+"))
        .terminal("Number", TermSpec::regex(r"\d+"))
        .start("Elements")
        .build()
        .unwrap();
    let grammar = Rc::new(grammar);

    let hook_grammar = grammar.clone();
    let number = regex::Regex::new(r"\A[^\d]*(\d+)").unwrap();
    let parser = Parser::<()>::with_options(
        grammar,
        ParserOptions::default().custom_token_recognition(Rc::new(
            move |scan, get_tokens: &mut dyn FnMut() -> Vec<Token>| {
                let tokens = get_tokens();
                if !tokens.is_empty() {
                    return tokens;
                }
                // Fuzzy fallback when the default recognition fails.
                let probe: String = scan.input[scan.position..]
                    .chars()
                    .take(4)
                    .collect::<String>()
                    .to_lowercase();
                let bar = subsequence_score("bar.", &probe);
                let baz = subsequence_score("baz.", &probe);
                if bar.max(baz) < 3 {
                    return Vec::new();
                }
                let matched = match number.find(&scan.input[scan.position..]) {
                    Some(found) => found.as_str().to_string(),
                    None => return Vec::new(),
                };
                let name = if baz > bar { "Baz" } else { "Bar" };
                let symbol = hook_grammar.get_terminal(name).unwrap();
                vec![Token::new(symbol, matched, scan.position)]
            },
        )),
    )
    .unwrap();

    let result = parser.parse("bar. 56 Baz 12").unwrap();
    assert_eq!(
        result,
        Value::List(vec![
            Value::List(vec!["bar. 56".into(), "Baz 12".into()]),
            Value::None,
        ])
    );

    parser.parse("Buz. 34 bar 56").unwrap();
    parser.parse("Ba. 34 baz 56").unwrap();

    assert!(parser.parse("Bar. 34 bza 56").is_err());
}

fn layout_comment_grammar() -> Rc<Grammar> {
    Rc::new(
        GrammarBuilder::new()
            .rule("K", [vec!["K", "a"], vec!["s"]])
            .rule("LAYOUT", [vec![], vec!["LAYOUT", "LayoutItem"]])
            .rule("LayoutItem", [vec!["WS"], vec!["Comment"]])
            .terminal("a", TermSpec::string("a"))
            .terminal("s", TermSpec::string("s"))
            .terminal("WS", TermSpec::regex(r"\s+"))
            .terminal("Comment", TermSpec::regex(r"//.*"))
            .start("K")
            .build()
            .unwrap()
            .0,
    )
}

#[test]
fn layout_whitespaces() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("K", [vec!["K", "a"], vec!["s"]])
        .rule("LAYOUT", [vec!["WS"], vec![]])
        .terminal("a", TermSpec::string("a"))
        .terminal("s", TermSpec::string("s"))
        .terminal("WS", TermSpec::regex(r"\s+"))
        .start("K")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();

    parser
        .parse("saa a    aaaa\n    aa    aa a aaa\n\n    aaa\n    ")
        .unwrap();
    parser.parse(" s").unwrap();
}

#[test]
fn layout_simple_comments() {
    let parser = Parser::<()>::new(layout_comment_grammar()).unwrap();

    parser
        .parse("saaa a    aaaa\n    aa    aa a aaa // This is a comment\n\n    aaa\n")
        .unwrap();
    parser.parse("\n// comment\nsa\n").unwrap();
}

#[test]
fn layout_content_is_passed_to_actions() {
    let seen = Rc::new(Cell::new(false));
    let flag = seen.clone();
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        "a".to_string(),
        Action::term(move |context, _| {
            if context.layout_content.contains("This is a comment") {
                flag.set(true);
            }
            Value::None
        }),
    );

    let parser = Parser::with_options(
        layout_comment_grammar(),
        ParserOptions::default().actions(actions),
    )
    .unwrap();
    parser
        .parse(" saa a    aaaa\n    aa    aa a aaa // This is a comment\n\n    aaa\n")
        .unwrap();
    assert!(seen.get());
}

#[test]
fn layout_content_with_comment_between_tokens() {
    let seen = Rc::new(Cell::new(false));
    let flag = seen.clone();
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        "a".to_string(),
        Action::term(move |context, _| {
            if context.layout_content.contains("// cmt") {
                flag.set(true);
            }
            Value::None
        }),
    );

    let parser = Parser::with_options(
        layout_comment_grammar(),
        ParserOptions::default().actions(actions),
    )
    .unwrap();
    parser.parse("sa // cmt\n a a").unwrap();
    assert!(seen.get());
}

#[test]
fn layout_actions_are_called() {
    let comment_called = Rc::new(Cell::new(false));
    let layout_called = Rc::new(Cell::new(false));
    let a_called = Rc::new(Cell::new(false));

    let mut layout_actions: ActionRegistry<()> = ActionRegistry::new();
    let flag = comment_called.clone();
    layout_actions.insert(
        "Comment".to_string(),
        Action::term(move |_, matched| {
            flag.set(true);
            Value::Str(matched.to_string())
        }),
    );
    let flag = layout_called.clone();
    layout_actions.insert(
        "LAYOUT".to_string(),
        Action::nonterm(move |_, nodes: Vec<Value>| {
            flag.set(true);
            let mut joined = String::new();
            for node in &nodes {
                if let Some(text) = node.as_str() {
                    joined.push_str(text);
                }
            }
            Value::Str(joined)
        }),
    );

    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    let flag = a_called.clone();
    actions.insert(
        "a".to_string(),
        Action::term(move |_, _| {
            flag.set(true);
            Value::None
        }),
    );

    let parser = Parser::with_options(
        layout_comment_grammar(),
        ParserOptions::default()
            .actions(actions)
            .layout_actions(layout_actions),
    )
    .unwrap();
    parser
        .parse(" saa a    aaaa\n    aa    aa a aaa // This is a comment\n\n    aaa\n")
        .unwrap();

    assert!(a_called.get());
    assert!(comment_called.get());
    assert!(layout_called.get());
}

fn collect_grammar(alternatives: Vec<Vec<&str>>, action: &str) -> Rc<Grammar> {
    Rc::new(
        letters(&["a", "b", ","])
            .rule("Elements", alternatives)
            .rule("Element", [vec!["a"], vec!["b"]])
            .bind_action("Elements", action)
            .bind_action("Element", "pass_single")
            .bind_action("__start", "pass_single")
            .start("Elements")
            .build()
            .unwrap()
            .0,
    )
}

fn strs(values: &[&str]) -> Value {
    Value::List(values.iter().map(|value| (*value).into()).collect())
}

#[test]
fn builtin_collect() {
    let grammar = collect_grammar(
        vec![vec!["Elements", "Element"], vec!["Element"]],
        "collect",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a b a a b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
}

#[test]
fn builtin_collect_optional() {
    let grammar = collect_grammar(
        vec![vec!["Elements", "Element"], vec![]],
        "collect_optional",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a b a a b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
    assert_eq!(parser.parse("").unwrap(), strs(&[]));
}

#[test]
fn builtin_collect_sep() {
    let grammar = collect_grammar(
        vec![vec!["Elements", ",", "Element"], vec!["Element"]],
        "collect_sep",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a, b, a ,a, b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
}

#[test]
fn builtin_collect_sep_optional() {
    let grammar = collect_grammar(
        vec![
            vec!["Elements", ",", "Element"],
            vec!["Element"],
            vec![],
        ],
        "collect_sep_optional",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a ,b, a, a, b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
    assert_eq!(parser.parse("").unwrap(), strs(&[]));
}

#[test]
fn builtin_collect_right() {
    let grammar = collect_grammar(
        vec![vec!["Element", "Elements"], vec!["Element"]],
        "collect_right",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a b a a b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
}

#[test]
fn builtin_collect_right_optional() {
    let grammar = collect_grammar(
        vec![vec!["Element", "Elements"], vec![]],
        "collect_right_optional",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a b a a b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
    assert_eq!(parser.parse("").unwrap(), strs(&[]));
}

#[test]
fn builtin_collect_right_sep() {
    let grammar = collect_grammar(
        vec![vec!["Element", ",", "Elements"], vec!["Element"]],
        "collect_right_sep",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a, b, a ,a, b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
}

#[test]
fn builtin_collect_right_sep_optional() {
    let grammar = collect_grammar(
        vec![
            vec!["Element", ",", "Elements"],
            vec!["Element"],
            vec![],
        ],
        "collect_right_sep_optional",
    );
    let parser = Parser::<()>::new(grammar).unwrap();
    assert_eq!(
        parser.parse("a ,b, a, a, b").unwrap(),
        strs(&["a", "b", "a", "a", "b"])
    );
    assert_eq!(parser.parse("").unwrap(), strs(&[]));
}

#[derive(Default)]
struct ContextSeen {
    sum: bool,
    number: bool,
    eof: bool,
    node_seen: bool,
}

fn context_grammar() -> Rc<Grammar> {
    Rc::new(
        GrammarBuilder::new()
            .rule("E", [vec!["E", "+", "number"], vec!["number"]])
            .terminal("number", TermSpec::regex(r"\d+(\.\d+)?"))
            .terminal("+", TermSpec::string("+"))
            .start("E")
            .build()
            .unwrap()
            .0,
    )
}

fn context_actions(grammar: &Rc<Grammar>) -> ActionRegistry<ContextSeen> {
    let mut actions: ActionRegistry<ContextSeen> = ActionRegistry::new();

    let captured = grammar.clone();
    let act_sum = alt(move |context: &mut Context<ContextSeen>, nodes: Vec<Value>| {
        context.extra.sum = true;
        assert_eq!(captured.name_of(context.symbol.unwrap()), "E");
        let production = captured.production(context.production.unwrap());
        assert_eq!(production.rhs.len(), 3);
        assert_eq!(context.layout_content, "   ");
        assert_eq!(context.start_position, 3);
        assert_eq!(context.end_position, 8);
        if let Some(node) = &context.node {
            assert!(!node.is_term());
            assert_eq!(node.name(), "E");
            context.extra.node_seen = true;
        }
        Value::Num(
            nodes[0].as_num().unwrap_or_default() + nodes[2].as_num().unwrap_or_default(),
        )
    });
    actions.insert(
        "E".to_string(),
        Action::per_alternative(vec![
            act_sum,
            alt(|_, mut nodes: Vec<Value>| nodes.remove(0)),
        ]),
    );

    let captured = grammar.clone();
    actions.insert(
        "number".to_string(),
        Action::term(move |context: &mut Context<ContextSeen>, matched| {
            context.extra.number = true;
            assert_eq!(captured.name_of(context.symbol.unwrap()), "number");
            let value = matched.parse::<f64>().unwrap();
            if value == 1.0 {
                assert_eq!(context.start_position, 3);
                assert_eq!(context.end_position, 4);
                assert_eq!(context.layout_content, "   ");
            } else {
                assert_eq!(context.start_position, 7);
                assert_eq!(context.end_position, 8);
                assert_eq!(context.layout_content, " ");
            }
            Value::Num(value)
        }),
    );

    let captured = grammar.clone();
    actions.insert(
        "EOF".to_string(),
        Action::term(move |context: &mut Context<ContextSeen>, _| {
            context.extra.eof = true;
            assert_eq!(captured.name_of(context.symbol.unwrap()), "EOF");
            // The remaining layout at the end of the input.
            assert_eq!(context.layout_content, "  ");
            Value::None
        }),
    );

    actions
}

#[test]
fn parse_context_fields() {
    let grammar = context_grammar();
    let parser = Parser::with_options(
        grammar.clone(),
        ParserOptions::default().actions(context_actions(&grammar)),
    )
    .unwrap();

    let mut context = Context::new("   1 + 2  ");
    parser.parse_with_context("   1 + 2  ", &mut context).unwrap();

    assert!(context.extra.sum);
    assert!(context.extra.number);
    assert!(context.extra.eof);
}

#[test]
fn parse_context_through_call_actions() {
    let grammar = context_grammar();
    let parser = Parser::with_options(
        grammar.clone(),
        ParserOptions::default()
            .actions(context_actions(&grammar))
            .build_tree(true),
    )
    .unwrap();

    let input = "   1 + 2  ";
    let tree = parser.parse_tree(input).unwrap();

    let mut context = Context::new(input);
    parser.call_actions(&tree, &mut context);

    assert!(context.extra.sum);
    assert!(context.extra.number);
    assert!(context.extra.eof);
    assert!(context.extra.node_seen);
}

#[test]
fn build_tree_produces_node_records() {
    let grammar = context_grammar();
    let parser = Parser::<()>::new(grammar).unwrap();

    let tree = parser.parse_tree("   1 + 2  ").unwrap();
    assert_eq!(tree.name(), "__start");
    let number = tree.find("number").expect("a number leaf");
    assert_eq!(number.value(), Some("1"));
    assert_eq!(number.start(), 3);
    assert_eq!(number.end(), 4);
    assert_eq!(number.layout(), "   ");
    assert!(tree.contains("E"));

    let numbers = tree.collect_nodes(&|node: &TreeNode| node.name() == "number");
    assert_eq!(numbers.len(), 2);
}

#[test]
fn call_actions_during_tree_build() {
    let build = || {
        Rc::new(
            letters(&["begin", "end", "move", "up", "down", "left", "right"])
                .rule("Program", [vec!["begin", "MoveCommand*", "end"]])
                .rule("MoveCommand", [vec!["move", "Direction"]])
                .rule(
                    "Direction",
                    [vec!["up"], vec!["down"], vec!["left"], vec!["right"]],
                )
                .start("Program")
                .build()
                .unwrap()
                .0,
        )
    };
    let code = "\nbegin\n    move left\n    move left\n    move up\n    move down\nend\n";

    let left_moves = Rc::new(Cell::new(0usize));
    let actions = |counter: Rc<Cell<usize>>| {
        let mut actions: ActionRegistry<()> = ActionRegistry::new();
        actions.insert(
            "Direction".to_string(),
            Action::nonterm(move |_, nodes: Vec<Value>| {
                if let Some(node) = nodes[0].as_node() {
                    if node.value() == Some("left") {
                        counter.set(counter.get() + 1);
                    }
                }
                Value::None
            }),
        );
        actions
    };

    // Actions are suppressed while a tree is built unless explicitly
    // requested.
    let parser = Parser::with_options(
        build(),
        ParserOptions::default()
            .build_tree(true)
            .actions(actions(left_moves.clone())),
    )
    .unwrap();
    parser.parse(code).unwrap();
    assert_eq!(left_moves.get(), 0);

    let parser = Parser::with_options(
        build(),
        ParserOptions::default()
            .build_tree(true)
            .call_actions_during_tree_build(true)
            .actions(actions(left_moves.clone())),
    )
    .unwrap();
    parser.parse(code).unwrap();
    assert_eq!(left_moves.get(), 2);
}

#[test]
fn empty_custom_recognizer_terminates() {
    let (grammar, _) = GrammarBuilder::new()
        .rule("a", [vec!["a", "t"], vec!["t"]])
        .terminal("t", TermSpec::external())
        .recognizer(
            "t",
            Rc::new(|input: &str, pos: usize| {
                let end = input[pos..]
                    .find(|ch| ch != 'b')
                    .map(|offset| pos + offset)
                    .unwrap_or(input.len());
                Some(input[pos..end].to_string())
            }),
        )
        .start("a")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();

    parser.parse("bbb").unwrap();
    assert!(parser.parse("a").is_err());
}

#[test]
fn knuth_lr1_grammar() {
    let (grammar, _) = letters(&["a", "b", "c", "d"])
        .rule("S", [vec!["a", "A", "d"], vec!["b", "A", "d"]])
        .rule("A", [vec!["c", "A"], vec!["c"]])
        .start("S")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    parser.parse("acccccccccd").unwrap();
    parser.parse("bcccccccccd").unwrap();
}

/// Hidden left recursion: shifts are preferred over the empty reduction, so
/// the `b` tokens are consumed greedily and the empty `B` is reduced at the
/// `a`.
#[test]
fn indirect_left_recursion() {
    let (grammar, _) = letters(&["a", "b"])
        .rule("S", [vec!["B", "a"]])
        .rule("B", [vec!["b", "B"], vec![]])
        .start("S")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    parser.parse("bbbbbbbbbbbba").unwrap();
}

#[test]
fn cyclic_tolerant_grammar() {
    let (grammar, _) = letters(&["a"])
        .rule("S", [vec!["S", "A"], vec!["A"]])
        .rule("A", [vec!["a"], vec![]])
        .start("S")
        .build()
        .unwrap();
    let parser = Parser::<()>::new(Rc::new(grammar)).unwrap();
    parser.parse("aa").unwrap();
}

#[test]
fn action_list_length_must_match_alternatives() {
    let (grammar, _) = letters(&["a", "b"])
        .rule("s", [vec!["a"], vec!["b"]])
        .start("s")
        .build()
        .unwrap();
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        "s".to_string(),
        Action::per_alternative(vec![alt(|_, _| Value::None)]),
    );

    let err = Parser::with_options(
        Rc::new(grammar),
        ParserOptions::default().actions(actions),
    )
    .err()
    .unwrap();
    match err {
        ParserInitError::Actions(message) => {
            assert!(message.contains("must match the number of productions"), "{}", message)
        }
        other => panic!("expected an action binding error, got {:?}", other),
    }
}

#[test]
fn action_list_rejected_for_terminal() {
    let (grammar, _) = letters(&["a"])
        .rule("s", [vec!["a"]])
        .start("s")
        .build()
        .unwrap();
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        "a".to_string(),
        Action::per_alternative(vec![alt(|_, _| Value::None)]),
    );

    let err = Parser::with_options(
        Rc::new(grammar),
        ParserOptions::default().actions(actions),
    )
    .err()
    .unwrap();
    match err {
        ParserInitError::Actions(message) => {
            assert!(message.contains("list of actions for terminal"), "{}", message)
        }
        other => panic!("expected an action binding error, got {:?}", other),
    }
}

#[test]
fn unknown_action_entries_are_ignored() {
    let (grammar, _) = letters(&["a"])
        .rule("s", [vec!["a"]])
        .start("s")
        .build()
        .unwrap();
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        "no_such_symbol".to_string(),
        Action::nonterm(|_, _| Value::None),
    );

    let parser =
        Parser::with_options(Rc::new(grammar), ParserOptions::default().actions(actions)).unwrap();
    parser.parse("a").unwrap();
}
