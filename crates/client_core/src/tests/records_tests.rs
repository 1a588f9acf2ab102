use super::*;
use shared::domain::GroupId;

use crate::forms::FieldValue;

fn feed() -> StaticPrices {
    StaticPrices::new([
        ("BTC", 1.0),
        ("usd", 0.00002),
        ("ETH", 0.05),
        ("EOS", 0.0001),
        ("DOGE", 0.0),
    ])
}

fn account(id: i64, name: &str, sym: &str, amount: f64) -> CoinAccountDto {
    CoinAccountDto {
        id: ItemId(id),
        group_id: GroupId(1),
        name: name.into(),
        sym: sym.into(),
        amount,
    }
}

#[test]
fn static_prices_ignore_case_and_non_positive_quotes() {
    let feed = feed();
    assert_eq!(feed.price("usd"), Some(0.00002));
    assert_eq!(feed.price("DOGE"), None);
    assert_eq!(feed.price("XRP"), None);
    assert!(feed.symbols().contains(&"USD".to_string()));
}

#[test]
fn symbols_normalise_to_priced_coins() {
    let feed = feed();
    assert_eq!(normalize_coin_symbol(" eth ", &feed), Some("ETH".into()));
    assert_eq!(normalize_coin_symbol("usdt", &feed), Some("USD".into()));
    assert_eq!(normalize_coin_symbol("busd", &feed), Some("USD".into()));
    assert_eq!(normalize_coin_symbol("xrp", &feed), None);
    assert_eq!(normalize_coin_symbol("", &feed), None);
}

#[test]
fn base_price_divides_btc_quotes() {
    let feed = feed();
    let eth_in_usd = base_coin_price(&feed, "ETH", "USD").expect("priced");
    assert!((eth_in_usd - 2500.0).abs() < 1e-6);
    assert_eq!(base_coin_price(&feed, "ETH", "XRP"), None);
}

#[test]
fn coin_draft_fills_defaults() {
    let feed = feed();
    let draft = CoinAccountDraft::parse("  ", "usdc", "abc", &feed).expect("draft");
    assert_eq!(
        draft,
        CoinAccountDraft {
            name: DEFAULT_ACCOUNT_NAME.into(),
            sym: "USD".into(),
            amount: 0.0,
        }
    );

    let err = CoinAccountDraft::parse("Main", "XRP", "1", &feed).expect_err("should fail");
    assert!(matches!(err, ClientError::Validation(ref m) if m == "unsupported coin symbol"));
}

#[test]
fn coin_draft_reads_form_values() {
    let values = FormValues::default()
        .with(ACCOUNT_NAME_KEY, FieldValue::Text(" Ledger ".into()))
        .with(COIN_SYMBOL_KEY, FieldValue::Text("eth".into()))
        .with(AMOUNT_KEY, FieldValue::Number(2.0));
    let draft = CoinAccountDraft::from_form(&values, &feed()).expect("draft");
    assert_eq!(draft.name, "Ledger");
    assert_eq!(draft.sym, "ETH");
    assert_eq!(draft.amount, 2.0);
}

fn trade_values() -> FormValues {
    FormValues::default()
        .with(STOCK_SYMBOL_KEY, FieldValue::Text("600000".into()))
        .with(STOCK_NAME_KEY, FieldValue::Text("Pudong Bank".into()))
        .with(STOCK_NUM_KEY, FieldValue::Number(100.0))
        .with(AMOUNT_KEY, FieldValue::Number(1020.0))
        .with(DIRECTION_KEY, FieldValue::Selected(DIRECTION_SELL))
        .with(TRADED_AT_KEY, FieldValue::Number(0.0))
}

#[test]
fn trade_draft_from_form() {
    let draft = StockTradeDraft::from_form(ItemId(0), &trade_values()).expect("draft");
    assert!(draft.is_new());
    assert_eq!(draft.direction, TradeDirection::Sell);
    assert!(!draft.traded);
    assert_eq!(draft.wire_traded_at(), 0);
}

#[test]
fn trade_validation_messages() {
    let cases = [
        (STOCK_SYMBOL_KEY, FieldValue::Text("60000".into()), "stock code must be six digits"),
        (STOCK_SYMBOL_KEY, FieldValue::Text("60000a".into()), "stock code must be six digits"),
        (STOCK_NAME_KEY, FieldValue::Text("  ".into()), "stock name is required"),
        (STOCK_NUM_KEY, FieldValue::Number(0.0), "stock quantity is required"),
        (AMOUNT_KEY, FieldValue::Text("".into()), "total amount is required"),
    ];
    for (key, value, expected) in cases {
        let values = trade_values().with(key, value);
        let err = StockTradeDraft::from_form(ItemId(0), &values).expect_err("should fail");
        assert_eq!(err.user_message(), expected, "field {key}");
    }
}

#[test]
fn traded_trade_needs_a_date() {
    let trade = StockTradeDto {
        id: ItemId(5),
        group_id: GroupId(1),
        stock_sym: "000001".into(),
        stock_name: "Ping An".into(),
        stock_num: 300.0,
        direction: TradeDirection::Buy,
        amount: 3300.0,
        traded_at: 1_700_000_000,
        close_at: 0,
        close_amount: 0.0,
    };
    let mut draft = StockTradeDraft::edit_of(&trade);
    assert!(draft.traded);
    assert_eq!(draft.wire_traded_at(), 1_700_000_000);
    draft.validate().expect("valid");

    draft.traded_at = 0;
    let err = draft.validate().expect_err("should fail");
    assert_eq!(err.user_message(), "trade date is required");

    let copy = StockTradeDraft::copy_of(&trade);
    assert!(copy.is_new());
    assert_eq!(copy.stock_name, "Ping An");
}

#[test]
fn holdings_merge_by_symbol_and_sort_descending() {
    let accounts = vec![
        account(1, "A", "ETH", 2.0),
        account(2, "B", "BTC", 0.05),
        account(3, "C", "ETH", 1.0),
        account(4, "D", "XRP", 100.0),
        account(5, "E", "EOS", 0.0),
    ];
    let summary = holdings_summary(&accounts, &feed(), "BTC");
    assert_eq!(summary.base_coin, "BTC");
    let syms: Vec<&str> = summary.holdings.iter().map(|h| h.sym.as_str()).collect();
    assert_eq!(syms, vec!["ETH", "BTC"]);
    assert!((summary.holdings[0].value - 0.15).abs() < 1e-9);
    assert!((summary.total - 0.2).abs() < 1e-9);
}

#[test]
fn holdings_without_base_price_are_empty() {
    let summary = holdings_summary(&[account(1, "A", "ETH", 2.0)], &feed(), "XRP");
    assert!(summary.holdings.is_empty());
    assert_eq!(summary.total, 0.0);
}

#[test]
fn name_suggestions_and_filtering() {
    let accounts = vec![
        account(1, "Binance", "BTC", 1.0),
        account(2, "Ledger", "ETH", 1.0),
        account(3, "Binance", "EOS", 1.0),
    ];
    assert_eq!(
        account_name_suggestions(&accounts),
        vec!["Binance".to_string(), "Ledger".to_string()]
    );

    let hits: Vec<i64> = filter_accounts(&accounts, "bin").iter().map(|a| a.id.0).collect();
    assert_eq!(hits, vec![1, 3]);
    let hits: Vec<i64> = filter_accounts(&accounts, "eth").iter().map(|a| a.id.0).collect();
    assert_eq!(hits, vec![2]);
    assert_eq!(filter_accounts(&accounts, " ").len(), 3);
}
