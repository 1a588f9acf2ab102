use shared::domain::{GroupType, TradeDirection};
use storage::{OrderedTable, StockTradeFields, Storage};

#[tokio::test]
async fn file_backed_ledger_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db_path = dir.path().join("nested").join("ledger.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    let user = storage.create_user("carol", "hash").await.expect("user");
    let group = storage
        .create_group(user, GroupType::StockTrade, "Trade Records")
        .await
        .expect("group");
    let first = storage
        .insert_stock_trade(
            group,
            &StockTradeFields {
                stock_sym: "600000".into(),
                stock_name: "Pudong Bank".into(),
                stock_num: 200.0,
                direction: TradeDirection::Buy,
                amount: 2040.0,
                traded_at: 0,
            },
        )
        .await
        .expect("trade");
    let second = storage
        .insert_stock_trade(
            group,
            &StockTradeFields {
                stock_sym: "000001".into(),
                stock_name: "Ping An Bank".into(),
                stock_num: 100.0,
                direction: TradeDirection::Sell,
                amount: 1150.0,
                traded_at: 1_650_000_000,
            },
        )
        .await
        .expect("trade");
    storage
        .swap_order(OrderedTable::StockTrades, first.0, second.0)
        .await
        .expect("swap");
    drop(storage);

    assert!(db_path.exists(), "database file should exist");

    let reopened = Storage::new(&database_url).await.expect("reopen");
    let trades = reopened.list_stock_trades(group).await.expect("list");
    let ids: Vec<_> = trades.iter().map(|t| t.item_id).collect();
    assert_eq!(ids, vec![second, first]);
    assert_eq!(trades[0].fields.direction, TradeDirection::Sell);
}
