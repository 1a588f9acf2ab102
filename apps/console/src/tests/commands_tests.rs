use super::*;

#[test]
fn timestamps_accept_dates_and_seconds() {
    assert_eq!(parse_timestamp("1970-01-02").expect("date"), 86_400);
    assert_eq!(parse_timestamp(" 1700000000 ").expect("seconds"), 1_700_000_000);
    assert!(parse_timestamp("yesterday").is_err());
    assert!(parse_timestamp("2024-02-30").is_err());
}

#[test]
fn unset_timestamps_render_as_dash() {
    assert_eq!(format_timestamp(0), "-");
    assert_eq!(format_timestamp(86_400), "1970-01-02");
}

#[test]
fn positions_are_one_based() {
    assert_eq!(zero_based(1).expect("first"), 0);
    assert!(zero_based(0).is_err());
}

#[test]
fn base_coins_lead_symbol_suggestions() {
    let feed = StaticPrices::new([("ADA", 0.00001), ("BTC", 1.0)]);
    let symbols = feed_symbols(&feed);
    assert_eq!(symbols[0], "BTC");
    assert_eq!(symbols.last().map(String::as_str), Some("ADA"));
    assert_eq!(symbols.iter().filter(|s| *s == "BTC").count(), 1);
}
