use crate::actions::Value;
use crate::examples::ambig::ambig_parser;
use crate::examples::calc::{calc_actions, calc_grammar, evaluate};
use crate::parser::{Context, Parser, ParserOptions};

#[test]
fn calculator_precedence() {
    let result = evaluate("5 + 56.4 / 3 * 5 - 10 + 24").unwrap();
    assert_eq!(result, 5.0 + 56.4 / 3.0 * 5.0 - 10.0 + 24.0);
    assert!((result - 113.0).abs() < 1e-9);
}

#[test]
fn calculator_assignments() {
    let result = evaluate("\n    a = 5\n    b = 10\n\n    a + 56.4 / 3 * 5 - b + 8 * 3\n    ")
        .unwrap();
    assert_eq!(result, 5.0 + 56.4 / 3.0 * 5.0 - 10.0 + 8.0 * 3.0);
    assert!((result - 113.0).abs() < 1e-9);
}

#[test]
fn calculator_variables_live_in_extra() {
    let (grammar, start) = calc_grammar();
    let parser = Parser::with_options(
        grammar,
        ParserOptions::default().actions(calc_actions(&start)),
    )
    .unwrap();

    let input = "a = 2\nb = 3\na + b";
    let mut context = Context::new(input);
    let value = parser.parse_with_context(input, &mut context).unwrap();
    assert_eq!(value, Value::Num(5.0));
    assert_eq!(context.extra.get("a").copied(), Some(2.0));
    assert_eq!(context.extra.get("b").copied(), Some(3.0));
}

/// `4 + 2 * 3` has exactly two readings; each extra operand grows the count
/// following the Catalan numbers.
#[test]
fn ambiguous_expressions() {
    let parser = ambig_parser().unwrap();

    let values = parser.parse_values("4 + 2 * 3").unwrap();
    assert_eq!(values.len(), 2);
    assert!(values.contains(&Value::Num(10.0)));
    assert!(values.contains(&Value::Num(18.0)));

    let values = parser.parse_values("4 + 2 * 3 + 8").unwrap();
    assert_eq!(values.len(), 5);

    let values = parser.parse_values("4 + 2 * 3 + 8 * 5").unwrap();
    assert_eq!(values.len(), 14);
}

#[test]
fn ambiguous_forest_packs_nodes() {
    let parser = ambig_parser().unwrap();
    let forest = parser.parse("4 + 2 * 3").unwrap();

    assert_eq!(forest.solutions(), 2);
    assert_eq!(forest.roots().len(), 1);
    let trees = forest.trees(1);
    assert_eq!(trees.len(), 1);
    let trees = forest.trees(usize::MAX);
    assert_eq!(trees.len(), 2);
}
