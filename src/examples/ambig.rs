//! The classic ambiguous expression grammar `E: E + E | E * E | ( E ) |
//! Number`, used to exercise the generalized parser. Every way to place the
//! parentheses is a separate derivation in the forest.

use crate::actions::{alt, Action, ActionRegistry, Value};
use crate::error::ParserInitError;
use crate::glr::GlrParser;
use crate::grammar::{Grammar, GrammarBuilder, TermSpec};
use crate::parser::ParserOptions;
use std::rc::Rc;

pub fn ambig_grammar() -> (Rc<Grammar>, String) {
    let (grammar, start) = GrammarBuilder::new()
        .rule(
            "E",
            [
                vec!["E", "+", "E"],
                vec!["E", "*", "E"],
                vec!["(", "E", ")"],
                vec!["Number"],
            ],
        )
        .terminal("Number", TermSpec::regex(r"\d+"))
        .terminal("+", TermSpec::string("+"))
        .terminal("*", TermSpec::string("*"))
        .terminal("(", TermSpec::string("("))
        .terminal(")", TermSpec::string(")"))
        .start("E")
        .build()
        .expect("the expression grammar is well formed");
    (Rc::new(grammar), start)
}

fn num(value: &Value) -> f64 {
    value.as_num().unwrap_or_default()
}

pub fn ambig_actions(start: &str) -> ActionRegistry<()> {
    let mut actions: ActionRegistry<()> = ActionRegistry::new();
    actions.insert(
        start.to_string(),
        Action::nonterm(|_, mut nodes: Vec<Value>| nodes.remove(0)),
    );
    actions.insert(
        "E".to_string(),
        Action::per_alternative(vec![
            alt(|_, nodes| Value::Num(num(&nodes[0]) + num(&nodes[2]))),
            alt(|_, nodes| Value::Num(num(&nodes[0]) * num(&nodes[2]))),
            alt(|_, mut nodes: Vec<Value>| nodes.remove(1)),
            alt(|_, nodes| {
                Value::Num(
                    nodes[0]
                        .as_str()
                        .unwrap_or_default()
                        .parse::<f64>()
                        .unwrap_or_default(),
                )
            }),
        ]),
    );
    actions
}

pub fn ambig_parser() -> Result<GlrParser<()>, ParserInitError> {
    let (grammar, start) = ambig_grammar();
    GlrParser::with_options(
        grammar,
        ParserOptions::default().actions(ambig_actions(&start)),
    )
}
