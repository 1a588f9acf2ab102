use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shared::{
    domain::TradeDirection,
    protocol::{CoinAccountDto, GroupDto, StockTradeDto},
};

use crate::{error::ClientError, records::DEFAULT_ACCOUNT_NAME};

pub const DEFAULT_LABEL_SPAN: u8 = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectOption {
    pub value: i64,
    pub text: String,
}

/// One input of a popup form. Each kind carries a default of its own value type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldSpec {
    Text {
        key: String,
        title: String,
        default: Option<String>,
    },
    Number {
        key: String,
        title: String,
        default: Option<f64>,
    },
    Select {
        key: String,
        title: String,
        options: Vec<SelectOption>,
        default: Option<i64>,
    },
    AutoComplete {
        key: String,
        title: String,
        suggestions: Vec<String>,
        default: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Selected(i64),
}

impl FieldSpec {
    pub fn text(key: &str, title: &str) -> Self {
        FieldSpec::Text {
            key: key.into(),
            title: title.into(),
            default: None,
        }
    }

    pub fn number(key: &str, title: &str) -> Self {
        FieldSpec::Number {
            key: key.into(),
            title: title.into(),
            default: None,
        }
    }

    pub fn select(key: &str, title: &str, options: Vec<SelectOption>) -> Self {
        FieldSpec::Select {
            key: key.into(),
            title: title.into(),
            options,
            default: None,
        }
    }

    pub fn auto_complete(key: &str, title: &str, suggestions: Vec<String>) -> Self {
        FieldSpec::AutoComplete {
            key: key.into(),
            title: title.into(),
            suggestions,
            default: None,
        }
    }

    /// Sets the default; a value of the wrong kind is ignored.
    pub fn with_default(mut self, value: FieldValue) -> Self {
        match (&mut self, value) {
            (FieldSpec::Text { default, .. }, FieldValue::Text(v))
            | (FieldSpec::AutoComplete { default, .. }, FieldValue::Text(v)) => *default = Some(v),
            (FieldSpec::Number { default, .. }, FieldValue::Number(v)) => *default = Some(v),
            (FieldSpec::Select { default, .. }, FieldValue::Selected(v)) => *default = Some(v),
            _ => {}
        }
        self
    }

    pub fn key(&self) -> &str {
        match self {
            FieldSpec::Text { key, .. }
            | FieldSpec::Number { key, .. }
            | FieldSpec::Select { key, .. }
            | FieldSpec::AutoComplete { key, .. } => key,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            FieldSpec::Text { title, .. }
            | FieldSpec::Number { title, .. }
            | FieldSpec::Select { title, .. }
            | FieldSpec::AutoComplete { title, .. } => title,
        }
    }

    pub fn initial_value(&self) -> Option<FieldValue> {
        match self {
            FieldSpec::Text { default, .. } | FieldSpec::AutoComplete { default, .. } => {
                default.clone().map(FieldValue::Text)
            }
            FieldSpec::Number { default, .. } => default.map(FieldValue::Number),
            FieldSpec::Select { default, .. } => default.map(FieldValue::Selected),
        }
    }

    /// Converts raw user input into this field's value type. Blank input
    /// falls back to the default, or `None` when there is none.
    pub fn parse_input(&self, raw: &str) -> Result<Option<FieldValue>, ClientError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(self.initial_value());
        }
        match self {
            FieldSpec::Text { .. } | FieldSpec::AutoComplete { .. } => {
                Ok(Some(FieldValue::Text(raw.to_string())))
            }
            FieldSpec::Number { title, .. } => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(|v| Some(FieldValue::Number(v)))
                .ok_or_else(|| ClientError::validation(format!("{title} must be a number"))),
            FieldSpec::Select { title, options, .. } => options
                .iter()
                .find(|opt| opt.text == raw || opt.value.to_string() == raw)
                .map(|opt| Some(FieldValue::Selected(opt.value)))
                .ok_or_else(|| ClientError::validation(format!("choose a valid {title}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSchema {
    pub title: String,
    pub label_span: u8,
    pub width: Option<u32>,
    pub fields: Vec<FieldSpec>,
}

impl FormSchema {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            label_span: DEFAULT_LABEL_SPAN,
            width: None,
            fields: Vec::new(),
        }
    }

    pub fn label_span(mut self, span: u8) -> Self {
        self.label_span = span;
        self
    }

    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn initial_values(&self) -> FormValues {
        let mut values = FormValues::default();
        for field in &self.fields {
            if let Some(value) = field.initial_value() {
                values.set(field.key(), value);
            }
        }
        values
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormValues {
    values: HashMap<String, FieldValue>,
}

impl FormValues {
    pub fn set(&mut self, key: &str, value: FieldValue) {
        self.values.insert(key.to_string(), value);
    }

    pub fn with(mut self, key: &str, value: FieldValue) -> Self {
        self.set(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(FieldValue::Text(v)) => Some(v),
            _ => None,
        }
    }

    /// Numbers entered as text are parsed; anything unparsable reads as `None`.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(FieldValue::Number(v)) => Some(*v),
            Some(FieldValue::Text(v)) => v.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn selected(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(FieldValue::Selected(v)) => Some(*v),
            _ => None,
        }
    }
}

pub const GROUP_NAME_KEY: &str = "title";
pub const TARGET_GROUP_KEY: &str = "group_id";
pub const ACCOUNT_NAME_KEY: &str = "title";
pub const COIN_SYMBOL_KEY: &str = "sym";
pub const AMOUNT_KEY: &str = "amount";

pub fn add_group_form() -> FormSchema {
    FormSchema::new("Add group")
        .label_span(3)
        .field(FieldSpec::text(GROUP_NAME_KEY, "Group name"))
}

pub fn rename_group_form(group: &GroupDto) -> FormSchema {
    FormSchema::new("Rename group").label_span(3).field(
        FieldSpec::text(GROUP_NAME_KEY, "Group name")
            .with_default(FieldValue::Text(group.name.clone())),
    )
}

/// Destination picker listing every group except the selected one.
pub fn change_group_form(groups: &[GroupDto], current_index: usize) -> FormSchema {
    let options = groups
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != current_index)
        .map(|(_, group)| SelectOption {
            value: group.id.0,
            text: group.name.clone(),
        })
        .collect();
    FormSchema::new("Change group")
        .label_span(3)
        .field(FieldSpec::select(TARGET_GROUP_KEY, "Target group", options))
}

pub fn coin_account_form(
    existing: Option<&CoinAccountDto>,
    account_names: Vec<String>,
    symbols: Vec<String>,
) -> FormSchema {
    let title = if existing.is_some() {
        "Edit account"
    } else {
        "Add account"
    };
    let name_default = existing
        .map(|a| a.name.clone())
        .unwrap_or_else(|| DEFAULT_ACCOUNT_NAME.to_string());
    let mut sym = FieldSpec::auto_complete(COIN_SYMBOL_KEY, "Coin", symbols);
    if let Some(account) = existing {
        sym = sym.with_default(FieldValue::Text(account.sym.clone()));
    }
    FormSchema::new(title)
        .label_span(3)
        .field(
            FieldSpec::auto_complete(ACCOUNT_NAME_KEY, "Account", account_names)
                .with_default(FieldValue::Text(name_default)),
        )
        .field(sym)
        .field(
            FieldSpec::number(AMOUNT_KEY, "Amount held")
                .with_default(FieldValue::Number(existing.map(|a| a.amount).unwrap_or(0.0))),
        )
}

pub const STOCK_SYMBOL_KEY: &str = "stock_sym";
pub const STOCK_NAME_KEY: &str = "stock_name";
pub const STOCK_NUM_KEY: &str = "stock_num";
pub const DIRECTION_KEY: &str = "direction";
pub const TRADED_AT_KEY: &str = "traded_at";

pub const DIRECTION_BUY: i64 = 0;
pub const DIRECTION_SELL: i64 = 1;

pub fn stock_trade_form(existing: Option<&StockTradeDto>) -> FormSchema {
    let title = if existing.is_some() {
        "Edit trade"
    } else {
        "Add trade"
    };
    let mut sym = FieldSpec::text(STOCK_SYMBOL_KEY, "Stock code");
    let mut name = FieldSpec::text(STOCK_NAME_KEY, "Stock name");
    let mut num = FieldSpec::number(STOCK_NUM_KEY, "Quantity");
    let mut amount = FieldSpec::number(AMOUNT_KEY, "Total amount");
    let mut direction = FieldSpec::select(
        DIRECTION_KEY,
        "Direction",
        vec![
            SelectOption {
                value: DIRECTION_BUY,
                text: "B".into(),
            },
            SelectOption {
                value: DIRECTION_SELL,
                text: "S".into(),
            },
        ],
    )
    .with_default(FieldValue::Selected(DIRECTION_BUY));
    let mut traded_at = FieldSpec::number(TRADED_AT_KEY, "Traded at (unix seconds, 0 = pending)")
        .with_default(FieldValue::Number(0.0));

    if let Some(trade) = existing {
        sym = sym.with_default(FieldValue::Text(trade.stock_sym.clone()));
        name = name.with_default(FieldValue::Text(trade.stock_name.clone()));
        num = num.with_default(FieldValue::Number(trade.stock_num));
        amount = amount.with_default(FieldValue::Number(trade.amount));
        direction = direction.with_default(FieldValue::Selected(match trade.direction {
            TradeDirection::Buy => DIRECTION_BUY,
            TradeDirection::Sell => DIRECTION_SELL,
        }));
        traded_at = traded_at.with_default(FieldValue::Number(trade.traded_at as f64));
    }

    FormSchema::new(title)
        .width(640)
        .field(sym)
        .field(name)
        .field(num)
        .field(direction)
        .field(amount)
        .field(traded_at)
}

#[cfg(test)]
#[path = "tests/forms_tests.rs"]
mod tests;
