//! An arithmetic calculator with variable assignments, evaluated through
//! semantic actions. Variables live in the context's `extra` map.

use crate::actions::{alt, Action, ActionRegistry, Value};
use crate::error::{ParseError, ParserInitError};
use crate::grammar::{Grammar, GrammarBuilder, TermSpec};
use crate::parser::{Context, Parser, ParserOptions};
use std::collections::HashMap;
use std::rc::Rc;

pub type CalcVars = HashMap<String, f64>;

pub fn calc_grammar() -> (Rc<Grammar>, String) {
    let (grammar, start) = GrammarBuilder::new()
        .rule("Calc", [vec!["Assignments", "E1"]])
        .rule(
            "Assignments",
            [
                vec!["Assignment"],
                vec!["Assignments", "Assignment"],
                vec![],
            ],
        )
        .rule("Assignment", [vec!["VariableName", "=", "Number"]])
        .rule(
            "E1",
            [
                vec!["E1", "+", "E2"],
                vec!["E1", "-", "E2"],
                vec!["E2"],
            ],
        )
        .rule(
            "E2",
            [
                vec!["E2", "*", "E3"],
                vec!["E2", "/", "E3"],
                vec!["E3"],
            ],
        )
        .rule(
            "E3",
            [
                vec!["(", "E1", ")"],
                vec!["Number"],
                vec!["VariableName"],
            ],
        )
        .terminal("VariableName", TermSpec::regex(r"[a-zA-Z_][_a-zA-Z0-9]*"))
        .terminal("Number", TermSpec::regex(r"\d+(\.\d+)?"))
        .terminal("+", TermSpec::string("+"))
        .terminal("-", TermSpec::string("-"))
        .terminal("*", TermSpec::string("*"))
        .terminal("/", TermSpec::string("/"))
        .terminal("(", TermSpec::string("("))
        .terminal(")", TermSpec::string(")"))
        .terminal("=", TermSpec::string("="))
        .start("Calc")
        .build()
        .expect("the calculator grammar is well formed");
    (Rc::new(grammar), start)
}

fn num(value: &Value) -> f64 {
    value.as_num().unwrap_or_default()
}

pub fn calc_actions(start: &str) -> ActionRegistry<CalcVars> {
    let mut actions: ActionRegistry<CalcVars> = ActionRegistry::new();
    actions.insert(
        start.to_string(),
        Action::nonterm(|_, mut nodes: Vec<Value>| nodes.remove(0)),
    );
    actions.insert(
        "Calc".to_string(),
        Action::nonterm(|_, mut nodes: Vec<Value>| nodes.remove(1)),
    );
    actions.insert(
        "Assignment".to_string(),
        Action::nonterm(|context: &mut Context<CalcVars>, nodes: Vec<Value>| {
            let name = nodes[0].as_str().unwrap_or_default().to_string();
            let value = nodes[2]
                .as_str()
                .unwrap_or_default()
                .parse::<f64>()
                .unwrap_or_default();
            context.extra.insert(name, value);
            Value::None
        }),
    );
    actions.insert(
        "E1".to_string(),
        Action::per_alternative(vec![
            alt(|_, nodes| Value::Num(num(&nodes[0]) + num(&nodes[2]))),
            alt(|_, nodes| Value::Num(num(&nodes[0]) - num(&nodes[2]))),
            alt(|_, mut nodes: Vec<Value>| nodes.remove(0)),
        ]),
    );
    actions.insert(
        "E2".to_string(),
        Action::per_alternative(vec![
            alt(|_, nodes| Value::Num(num(&nodes[0]) * num(&nodes[2]))),
            alt(|_, nodes| Value::Num(num(&nodes[0]) / num(&nodes[2]))),
            alt(|_, mut nodes: Vec<Value>| nodes.remove(0)),
        ]),
    );
    actions.insert(
        "E3".to_string(),
        Action::per_alternative(vec![
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
            alt(|context: &mut Context<CalcVars>, nodes| {
                let name = nodes[0].as_str().unwrap_or_default();
                Value::Num(context.extra.get(name).copied().unwrap_or_default())
            }),
        ]),
    );
    actions
}

pub fn calc_parser() -> Result<Parser<CalcVars>, ParserInitError> {
    let (grammar, start) = calc_grammar();
    Parser::with_options(
        grammar,
        ParserOptions::default().actions(calc_actions(&start)),
    )
}

/// Evaluate a calculator program and return the value of its expression.
pub fn evaluate(input: &str) -> Result<f64, ParseError> {
    let parser = calc_parser().expect("the calculator grammar builds a conflict free table");
    let value = parser.parse(input)?;
    Ok(value.as_num().unwrap_or_default())
}
