use std::collections::{BTreeMap, HashMap, HashSet};

use shared::{
    domain::{ItemId, TradeDirection},
    protocol::{CoinAccountDto, StockTradeDto},
};

use crate::{
    error::ClientError,
    forms::{
        FormValues, ACCOUNT_NAME_KEY, AMOUNT_KEY, COIN_SYMBOL_KEY, DIRECTION_KEY, DIRECTION_SELL,
        STOCK_NAME_KEY, STOCK_NUM_KEY, STOCK_SYMBOL_KEY, TRADED_AT_KEY,
    },
};

pub const DEFAULT_ACCOUNT_NAME: &str = "Default";
pub const BASE_COINS: [&str; 6] = ["BTC", "USD", "EOS", "ETH", "BNB", "CNY"];

/// Latest prices, all quoted in BTC.
pub trait PriceFeed: Send + Sync {
    fn price(&self, symbol: &str) -> Option<f64>;

    fn symbols(&self) -> Vec<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticPrices {
    by_btc: BTreeMap<String, f64>,
}

impl StaticPrices {
    pub fn new<I, S>(prices: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            by_btc: prices
                .into_iter()
                .map(|(sym, price)| (sym.into().to_uppercase(), price))
                .collect(),
        }
    }
}

impl PriceFeed for StaticPrices {
    fn price(&self, symbol: &str) -> Option<f64> {
        self.by_btc
            .get(&symbol.to_uppercase())
            .copied()
            .filter(|p| *p > 0.0)
    }

    fn symbols(&self) -> Vec<String> {
        self.by_btc.keys().cloned().collect()
    }
}

/// Upper-cases `raw`; stablecoins collapse to `USD`, anything else must be
/// priced by `feed`.
pub fn normalize_coin_symbol(raw: &str, feed: &dyn PriceFeed) -> Option<String> {
    let sym = raw.trim().to_uppercase();
    if sym.contains("USD") {
        return Some("USD".to_string());
    }
    if !sym.is_empty() && feed.price(&sym).is_some() {
        return Some(sym);
    }
    None
}

/// Price of `symbol` expressed in `base_coin`.
pub fn base_coin_price(feed: &dyn PriceFeed, symbol: &str, base_coin: &str) -> Option<f64> {
    let price = feed.price(symbol)?;
    let base = feed.price(base_coin)?;
    Some(price / base)
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoinAccountDraft {
    pub name: String,
    pub sym: String,
    pub amount: f64,
}

impl CoinAccountDraft {
    pub fn parse(
        name: &str,
        sym: &str,
        amount: &str,
        feed: &dyn PriceFeed,
    ) -> Result<Self, ClientError> {
        Self::build(name, sym, amount.trim().parse().ok(), feed)
    }

    pub fn from_form(values: &FormValues, feed: &dyn PriceFeed) -> Result<Self, ClientError> {
        Self::build(
            values.text(ACCOUNT_NAME_KEY).unwrap_or_default(),
            values.text(COIN_SYMBOL_KEY).unwrap_or_default(),
            values.number(AMOUNT_KEY),
            feed,
        )
    }

    fn build(
        name: &str,
        sym: &str,
        amount: Option<f64>,
        feed: &dyn PriceFeed,
    ) -> Result<Self, ClientError> {
        let sym = normalize_coin_symbol(sym, feed)
            .ok_or_else(|| ClientError::validation("unsupported coin symbol"))?;
        let name = match name.trim() {
            "" => DEFAULT_ACCOUNT_NAME.to_string(),
            trimmed => trimmed.to_string(),
        };
        let amount = amount.filter(|a| a.is_finite()).unwrap_or(0.0);
        Ok(Self { name, sym, amount })
    }
}

/// Editable trade. `id == 0` marks a trade that has not been saved yet.
#[derive(Debug, Clone, PartialEq)]
pub struct StockTradeDraft {
    pub id: ItemId,
    pub stock_sym: String,
    pub stock_name: String,
    pub stock_num: f64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub traded: bool,
    pub traded_at: i64,
}

impl StockTradeDraft {
    pub fn edit_of(trade: &StockTradeDto) -> Self {
        Self {
            id: trade.id,
            stock_sym: trade.stock_sym.clone(),
            stock_name: trade.stock_name.clone(),
            stock_num: trade.stock_num,
            direction: trade.direction,
            amount: trade.amount,
            traded: trade.traded_at > 0,
            traded_at: trade.traded_at,
        }
    }

    pub fn copy_of(trade: &StockTradeDto) -> Self {
        Self {
            id: ItemId(0),
            ..Self::edit_of(trade)
        }
    }

    pub fn from_form(id: ItemId, values: &FormValues) -> Result<Self, ClientError> {
        let traded_at = values.number(TRADED_AT_KEY).unwrap_or(0.0) as i64;
        let draft = Self {
            id,
            stock_sym: values.text(STOCK_SYMBOL_KEY).unwrap_or_default().trim().to_string(),
            stock_name: values.text(STOCK_NAME_KEY).unwrap_or_default().trim().to_string(),
            stock_num: values.number(STOCK_NUM_KEY).unwrap_or(0.0),
            direction: if values.selected(DIRECTION_KEY) == Some(DIRECTION_SELL) {
                TradeDirection::Sell
            } else {
                TradeDirection::Buy
            },
            amount: values.number(AMOUNT_KEY).unwrap_or(0.0),
            traded: traded_at > 0,
            traded_at,
        };
        draft.validate()?;
        Ok(draft)
    }

    pub fn is_new(&self) -> bool {
        self.id.0 == 0
    }

    pub fn validate(&self) -> Result<(), ClientError> {
        let sym = self.stock_sym.trim();
        if sym.len() != 6 || !sym.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ClientError::validation("stock code must be six digits"));
        }
        if self.stock_name.trim().is_empty() {
            return Err(ClientError::validation("stock name is required"));
        }
        if self.stock_num == 0.0 || !self.stock_num.is_finite() {
            return Err(ClientError::validation("stock quantity is required"));
        }
        if self.amount == 0.0 || !self.amount.is_finite() {
            return Err(ClientError::validation("total amount is required"));
        }
        if self.traded && self.traded_at <= 0 {
            return Err(ClientError::validation("trade date is required"));
        }
        Ok(())
    }

    /// Trade time as sent to the backend; pending trades carry 0.
    pub fn wire_traded_at(&self) -> i64 {
        if self.traded {
            self.traded_at
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    pub sym: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoldingsSummary {
    pub base_coin: String,
    pub holdings: Vec<Holding>,
    pub total: f64,
}

/// Merges accounts by symbol and values them in `base_coin`, largest first.
/// Symbols the feed cannot price are left out.
pub fn holdings_summary(
    accounts: &[CoinAccountDto],
    feed: &dyn PriceFeed,
    base_coin: &str,
) -> HoldingsSummary {
    let mut by_sym: HashMap<&str, f64> = HashMap::new();
    let mut total = 0.0;
    for account in accounts {
        let Some(price) = base_coin_price(feed, &account.sym, base_coin) else {
            continue;
        };
        let value = price * account.amount;
        total += value;
        if value != 0.0 {
            *by_sym.entry(account.sym.as_str()).or_default() += value;
        }
    }

    let mut holdings: Vec<Holding> = by_sym
        .into_iter()
        .map(|(sym, value)| Holding {
            sym: sym.to_string(),
            value,
        })
        .collect();
    holdings.sort_by(|a, b| b.value.total_cmp(&a.value).then_with(|| a.sym.cmp(&b.sym)));

    HoldingsSummary {
        base_coin: base_coin.to_string(),
        holdings,
        total,
    }
}

/// Distinct account names in first-seen order.
pub fn account_name_suggestions(accounts: &[CoinAccountDto]) -> Vec<String> {
    let mut seen = HashSet::new();
    accounts
        .iter()
        .filter(|account| seen.insert(account.name.as_str()))
        .map(|account| account.name.clone())
        .collect()
}

/// Accounts whose name or symbol contains `text`, case-insensitively.
pub fn filter_accounts<'a>(accounts: &'a [CoinAccountDto], text: &str) -> Vec<&'a CoinAccountDto> {
    let word = text.trim().to_uppercase();
    accounts
        .iter()
        .filter(|account| {
            word.is_empty()
                || account.name.to_uppercase().contains(&word)
                || account.sym.to_uppercase().contains(&word)
        })
        .collect()
}

#[cfg(test)]
#[path = "tests/records_tests.rs"]
mod tests;
