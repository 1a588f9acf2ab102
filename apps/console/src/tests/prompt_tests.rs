use super::*;
use std::io::Cursor;

use client_core::forms::{
    add_group_form, stock_trade_form, DIRECTION_KEY, DIRECTION_SELL, GROUP_NAME_KEY,
    STOCK_NUM_KEY, STOCK_SYMBOL_KEY, TRADED_AT_KEY,
};

fn run_form(schema: &FormSchema, input: &str) -> (Result<FormValues>, String) {
    let mut output = Vec::new();
    let result = fill_form(schema, &mut Cursor::new(input.as_bytes()), &mut output);
    (result, String::from_utf8(output).expect("utf8"))
}

#[test]
fn yes_no_only_accepts_explicit_yes() {
    for (input, expected) in [("y\n", true), ("YES\n", true), ("n\n", false), ("\n", false), ("", false)] {
        let mut output = Vec::new();
        let answer = ask_yes_no(&mut Cursor::new(input.as_bytes()), &mut output, "Please confirm", "Really?")
            .expect("prompt");
        assert_eq!(answer, expected, "input {input:?}");
        assert_eq!(String::from_utf8(output).expect("utf8"), "Please confirm: Really? [y/N] ");
    }
}

#[test]
fn fills_fields_in_order() {
    let (values, output) = run_form(&add_group_form(), "  Cold storage \n");
    let values = values.expect("filled");
    assert_eq!(values.text(GROUP_NAME_KEY), Some("Cold storage"));
    assert!(output.starts_with("== Add group =="));
}

#[test]
fn invalid_input_is_asked_again() {
    let input = "600000\nPudong Bank\nmany\n100\nS\n1020\n\n";
    let (values, output) = run_form(&stock_trade_form(None), input);
    let values = values.expect("filled");
    assert!(output.contains("Quantity must be a number"));
    assert_eq!(values.text(STOCK_SYMBOL_KEY), Some("600000"));
    assert_eq!(values.number(STOCK_NUM_KEY), Some(100.0));
    assert_eq!(values.selected(DIRECTION_KEY), Some(DIRECTION_SELL));
    assert_eq!(values.number(TRADED_AT_KEY), Some(0.0));
}

#[test]
fn closed_input_aborts_the_form() {
    let (values, _) = run_form(&stock_trade_form(None), "600000\n");
    let err = values.expect_err("should fail");
    assert!(err.to_string().contains("Add trade"));
}

#[test]
fn prompt_shows_choices_and_defaults() {
    let schema = stock_trade_form(None);
    let direction = schema
        .fields
        .iter()
        .find(|f| f.key() == DIRECTION_KEY)
        .expect("direction field");
    let prompt = field_prompt(direction, 1);
    assert_eq!(prompt, "Direction (0=B, 1=S) [B]: ");

    let name = FieldSpec::text(GROUP_NAME_KEY, "Name");
    assert_eq!(field_prompt(&name, 2), "        Name: ");
}
