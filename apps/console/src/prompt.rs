use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use client_core::{
    forms::{FieldSpec, FieldValue, FormSchema, FormValues},
    AppState, ConfirmGate,
};
use tracing::warn;

const LABEL_COLUMN_WIDTH: usize = 6;
const MAX_HINTS: usize = 6;

/// Asks on the terminal before destructive actions.
pub struct StdinGate;

#[async_trait]
impl ConfirmGate for StdinGate {
    async fn confirm(&self, title: &str, message: &str) -> bool {
        let title = title.to_string();
        let message = message.to_string();
        let answer = tokio::task::spawn_blocking(move || {
            ask_yes_no(&mut io::stdin().lock(), &mut io::stderr(), &title, &message)
        })
        .await;
        match answer {
            Ok(Ok(answer)) => answer,
            Ok(Err(err)) => {
                warn!(error = %err, "could not read confirmation");
                false
            }
            Err(err) => {
                warn!(error = %err, "confirmation prompt panicked");
                false
            }
        }
    }
}

/// Anything but an explicit yes, including closed input, declines.
pub fn ask_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    title: &str,
    message: &str,
) -> io::Result<bool> {
    write!(output, "{title}: {message} [y/N] ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Shows `schema` as the active popup form while the user fills it in on
/// the terminal.
pub async fn prompt_form(session: &AppState, schema: FormSchema) -> Result<FormValues> {
    session.set_popup_form_schema(Some(schema.clone())).await;
    let filled = tokio::task::spawn_blocking(move || {
        fill_form(&schema, &mut io::stdin().lock(), &mut io::stderr())
    })
    .await
    .context("form prompt panicked");
    session.set_popup_form_schema(None).await;
    filled?
}

/// Reads one line per field, re-asking until the input parses. Blank input
/// keeps the field's default.
pub fn fill_form<R: BufRead, W: Write>(
    schema: &FormSchema,
    input: &mut R,
    output: &mut W,
) -> Result<FormValues> {
    writeln!(output, "== {} ==", schema.title)?;
    let mut values = FormValues::default();
    for field in &schema.fields {
        loop {
            write!(output, "{}", field_prompt(field, schema.label_span))?;
            output.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                bail!("input closed while filling in '{}'", schema.title);
            }
            match field.parse_input(&line) {
                Ok(Some(value)) => {
                    values.set(field.key(), value);
                    break;
                }
                Ok(None) => break,
                Err(err) => writeln!(output, "  {}", err.user_message())?,
            }
        }
    }
    Ok(values)
}

fn field_prompt(field: &FieldSpec, label_span: u8) -> String {
    let width = usize::from(label_span) * LABEL_COLUMN_WIDTH;
    let mut prompt = format!("{:>width$}", field.title());
    match field {
        FieldSpec::Select { options, .. } => {
            let choices: Vec<String> = options
                .iter()
                .map(|opt| format!("{}={}", opt.value, opt.text))
                .collect();
            prompt.push_str(&format!(" ({})", choices.join(", ")));
        }
        FieldSpec::AutoComplete { suggestions, .. } if !suggestions.is_empty() => {
            let shown: Vec<&str> = suggestions
                .iter()
                .take(MAX_HINTS)
                .map(String::as_str)
                .collect();
            prompt.push_str(&format!(" (e.g. {})", shown.join(", ")));
        }
        _ => {}
    }
    if let Some(default) = field.initial_value() {
        prompt.push_str(&format!(" [{}]", display_value(field, &default)));
    }
    prompt.push_str(": ");
    prompt
}

fn display_value(field: &FieldSpec, value: &FieldValue) -> String {
    match (field, value) {
        (FieldSpec::Select { options, .. }, FieldValue::Selected(selected)) => options
            .iter()
            .find(|opt| opt.value == *selected)
            .map(|opt| opt.text.clone())
            .unwrap_or_else(|| selected.to_string()),
        (_, FieldValue::Text(text)) => text.clone(),
        (_, FieldValue::Number(number)) => number.to_string(),
        (_, FieldValue::Selected(selected)) => selected.to_string(),
    }
}

#[cfg(test)]
#[path = "tests/prompt_tests.rs"]
mod tests;
