use super::*;
use crate::{
    records::{CoinAccountDraft, StaticPrices, StockTradeDraft},
    test_support::{logged_in_client, LoopbackRpc, RecordingGate},
    AutoConfirm, CoinAccountsController, StockTradesController,
};
use shared::{domain::TradeDirection, protocol::CoinAccountDto};

async fn coins(answer: bool) -> (CoinAccountsController, Arc<LoopbackRpc>, Arc<RecordingGate>) {
    let gate = RecordingGate::new(answer);
    let (client, rpc) = logged_in_client(gate.clone()).await;
    let controller = client
        .coin_accounts(GroupType::CoinAccount)
        .expect("controller");
    controller.sync().await.expect("initial sync");
    (controller, rpc, gate)
}

/// Controller holding groups [A, B, C] (the default group renamed to A).
async fn three_groups() -> (CoinAccountsController, Arc<LoopbackRpc>) {
    let (controller, rpc, _) = coins(true).await;
    controller.update_group(0, "A").await.expect("rename");
    controller.add_group("B").await.expect("add B");
    controller.add_group("C").await.expect("add C");
    (controller, rpc)
}

fn names(view: &GroupedListView<CoinAccountDto>) -> Vec<&str> {
    view.groups.iter().map(|g| g.name.as_str()).collect()
}

fn prices() -> StaticPrices {
    StaticPrices::new([("BTC", 1.0), ("ETH", 0.05), ("USD", 0.0001)])
}

fn draft(name: &str, sym: &str, amount: &str) -> CoinAccountDraft {
    CoinAccountDraft::parse(name, sym, amount, &prices()).expect("draft")
}

#[tokio::test]
async fn first_sync_creates_default_group() {
    let (controller, rpc, _) = coins(true).await;
    let view = controller.view();
    assert!(view.loaded);
    assert_eq!(names(&view), vec!["My Assets"]);
    assert_eq!(view.current_group_index, 0);
    assert!(view.items.is_empty());
    assert_eq!(rpc.count(RpcMethod::AddGroup).await, 1);

    controller.add_group("Cold wallet").await.expect("add");
    assert_eq!(names(&controller.view()), vec!["My Assets", "Cold wallet"]);
    assert_eq!(rpc.count(RpcMethod::AddGroup).await, 2);
}

#[tokio::test]
async fn default_group_is_named_per_type() {
    let gate = RecordingGate::new(true);
    let (client, _) = logged_in_client(gate).await;
    let trades = client.stock_trades();
    trades.sync().await.expect("sync");
    assert_eq!(trades.view().groups[0].name, "Trade Records");
}

#[tokio::test]
async fn select_group_reads_back_and_refetches_items() {
    let (controller, rpc) = three_groups().await;
    for index in 0..3 {
        rpc.clear_calls().await;
        controller.select_group(index).await.expect("select");
        assert_eq!(controller.current_group_index().await, index);
        assert_eq!(controller.view().current_group_index, index);
    }
    assert_eq!(rpc.calls().await, vec![RpcMethod::ListCoinAccounts]);
}

#[tokio::test]
async fn select_group_out_of_range_is_rejected_with_notice() {
    let (controller, rpc) = three_groups().await;
    let mut events = controller.events();
    rpc.clear_calls().await;

    let err = controller.select_group(5).await.expect_err("should fail");
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(controller.current_group_index().await, 0);
    assert!(rpc.calls().await.is_empty());
    assert!(matches!(events.recv().await, Ok(ListEvent::Notice(_))));
}

#[tokio::test]
async fn delete_group_repairs_selection() {
    // deleted before the selection: shift down
    let (controller, _) = three_groups().await;
    controller.select_group(2).await.expect("select");
    assert!(controller.delete_group(0).await.expect("delete"));
    assert_eq!(controller.current_group_index().await, 1);
    assert_eq!(names(&controller.view()), vec!["B", "C"]);

    // deleted the selection: reset
    let (controller, _) = three_groups().await;
    controller.select_group(1).await.expect("select");
    assert!(controller.delete_group(1).await.expect("delete"));
    assert_eq!(controller.current_group_index().await, 0);

    // deleted after the selection: unchanged
    let (controller, _) = three_groups().await;
    controller.select_group(1).await.expect("select");
    assert!(controller.delete_group(2).await.expect("delete"));
    assert_eq!(controller.current_group_index().await, 1);
    assert_eq!(names(&controller.view()), vec!["A", "B"]);
}

#[tokio::test]
async fn declined_delete_sends_nothing() {
    let (controller, rpc, gate) = coins(false).await;
    rpc.clear_calls().await;
    let version = controller.groups().version();

    assert!(!controller.delete_group(0).await.expect("delete"));
    assert_eq!(rpc.count(RpcMethod::DeleteGroup).await, 0);
    assert_eq!(controller.groups().version(), version);

    let prompts = gate.prompts().await;
    assert_eq!(
        prompts,
        vec![(
            "Please confirm".to_string(),
            "Really delete [My Assets]?".to_string()
        )]
    );
}

#[tokio::test]
async fn move_down_follows_selected_group() {
    let (controller, _) = three_groups().await;
    controller.select_group(1).await.expect("select");

    assert!(controller
        .move_group(MoveDirection::Down, 1)
        .await
        .expect("move"));
    let view = controller.view();
    assert_eq!(names(&view), vec!["A", "C", "B"]);
    assert_eq!(view.current_group_index, 2);
    assert_eq!(view.current_group().map(|g| g.name.as_str()), Some("B"));
}

#[tokio::test]
async fn moving_neighbour_onto_selection_follows() {
    let (controller, _) = three_groups().await;
    controller.select_group(1).await.expect("select");

    // group 0 swaps with the selected group 1; selection moves to index 0
    assert!(controller
        .move_group(MoveDirection::Down, 0)
        .await
        .expect("move"));
    let view = controller.view();
    assert_eq!(names(&view), vec!["B", "A", "C"]);
    assert_eq!(view.current_group_index, 0);
}

#[tokio::test]
async fn move_past_the_ends_is_silent() {
    let (controller, rpc) = three_groups().await;
    rpc.clear_calls().await;
    let before = controller.view();

    assert!(!controller
        .move_group(MoveDirection::Up, 0)
        .await
        .expect("no-op"));
    assert!(!controller
        .move_group(MoveDirection::Down, 2)
        .await
        .expect("no-op"));
    assert!(rpc.calls().await.is_empty());
    assert_eq!(controller.view(), before);
}

#[tokio::test]
async fn failed_mutation_keeps_version_and_sequence() {
    let (controller, rpc) = three_groups().await;
    let mut events = controller.events();
    rpc.fail(RpcMethod::SwitchGroup, true).await;
    let version = controller.groups().version();
    let before = controller.groups().cached().await;

    let err = controller
        .move_group(MoveDirection::Down, 0)
        .await
        .expect_err("should fail");
    assert!(matches!(err, ClientError::Rpc(RpcError::Transport(_))));
    assert_eq!(controller.groups().version(), version);
    assert_eq!(controller.groups().cached().await, before);
    assert_eq!(controller.current_group_index().await, 0);
    assert_eq!(
        events.recv().await.expect("event"),
        ListEvent::Notice("Request failed, please try again later.".into())
    );
}

#[tokio::test]
async fn blank_group_name_is_never_sent() {
    let (controller, rpc, _) = coins(true).await;
    rpc.clear_calls().await;
    let err = controller.add_group("   ").await.expect_err("should fail");
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(rpc.calls().await.is_empty());
}

#[tokio::test]
async fn created_item_appears_once_in_server_order() {
    let (controller, _, _) = coins(true).await;
    controller
        .add_item(&draft("Exchange", "btc", "1.5"))
        .await
        .expect("add")
        .expect("group exists");
    controller
        .add_item(&draft("", "usdt", "oops"))
        .await
        .expect("add")
        .expect("group exists");

    let items = controller.view().items;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].name, "Exchange");
    assert_eq!(items[0].sym, "BTC");
    assert_eq!(items[1].name, "Default");
    assert_eq!(items[1].sym, "USD");
    assert_eq!(items[1].amount, 0.0);
}

#[tokio::test]
async fn empty_group_lists_no_items() {
    let (controller, _) = three_groups().await;
    controller.select_group(2).await.expect("select");
    assert!(controller.view().items.is_empty());
    assert!(controller.items().cached().await.is_empty());
}

#[tokio::test]
async fn items_follow_selected_group() {
    let (controller, _) = three_groups().await;
    controller
        .add_item(&draft("in A", "BTC", "1"))
        .await
        .expect("add");
    controller.select_group(1).await.expect("select");
    controller
        .add_item(&draft("in B", "ETH", "2"))
        .await
        .expect("add");
    assert_eq!(controller.view().items[0].name, "in B");

    controller.select_group(0).await.expect("select");
    let items = controller.view().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].name, "in A");
}

#[tokio::test]
async fn move_item_reorders_without_touching_selection() {
    let (controller, rpc, _) = coins(true).await;
    for name in ["first", "second"] {
        controller
            .add_item(&draft(name, "BTC", "1"))
            .await
            .expect("add");
    }
    rpc.clear_calls().await;

    assert!(!controller
        .move_item(MoveDirection::Up, 0)
        .await
        .expect("no-op"));
    assert!(rpc.calls().await.is_empty());

    assert!(controller
        .move_item(MoveDirection::Up, 1)
        .await
        .expect("move"));
    let items = controller.view().items;
    assert_eq!(items[0].name, "second");
    assert_eq!(items[1].name, "first");
    assert_eq!(controller.current_group_index().await, 0);
}

#[tokio::test]
async fn delete_item_prompts_with_coin_symbol() {
    let (controller, rpc, gate) = coins(true).await;
    controller
        .add_item(&draft("main", "ETH", "3"))
        .await
        .expect("add");

    assert!(controller.delete_item(0).await.expect("delete"));
    assert_eq!(rpc.count(RpcMethod::DeleteCoinAccount).await, 1);
    assert!(controller.view().items.is_empty());
    assert_eq!(gate.prompts().await[0].1, "Really delete coin [ETH] ?");
}

#[tokio::test]
async fn change_item_group_moves_item_out_of_current_list() {
    let (controller, _) = three_groups().await;
    let item = controller
        .add_item(&draft("moving", "BTC", "1"))
        .await
        .expect("add")
        .expect("group exists");
    let target = controller.view().groups[2].id;

    let err = controller
        .change_item_group(item, None)
        .await
        .expect_err("should fail");
    assert_eq!(err.user_message(), "Please choose a new group");

    let current = controller.view().groups[0].id;
    let err = controller
        .change_item_group(item, Some(current))
        .await
        .expect_err("should fail");
    assert!(matches!(err, ClientError::Validation(_)));

    assert!(controller
        .change_item_group(item, Some(target))
        .await
        .expect("change"));
    assert!(controller.view().items.is_empty());

    controller.select_group(2).await.expect("select");
    assert_eq!(controller.view().items[0].id, item);
}

#[tokio::test]
async fn close_trade_bumps_item_version() {
    let gate = RecordingGate::new(true);
    let (client, _) = logged_in_client(gate).await;
    let trades: StockTradesController = client.stock_trades();
    trades.sync().await.expect("sync");

    let draft = StockTradeDraft {
        id: ItemId(0),
        stock_sym: "600000".into(),
        stock_name: "Pudong Bank".into(),
        stock_num: 100.0,
        direction: TradeDirection::Buy,
        amount: 1000.0,
        traded: true,
        traded_at: 1_600_000_000,
    };
    let id = trades
        .add_item(&draft)
        .await
        .expect("add")
        .expect("group exists");
    let version = trades.items().version();

    assert!(trades
        .close_trade(id, 1_600_500_000, 1200.0)
        .await
        .expect("close"));
    assert_eq!(trades.items().version(), version + 1);
    let trade = &trades.view().items[0];
    assert_eq!(trade.close_at, 1_600_500_000);
    assert_eq!(trade.close_amount, 1200.0);

    let err = trades.close_trade(id, 0, 1.0).await.expect_err("should fail");
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn holdings_value_selected_group() {
    let (controller, _, _) = coins(true).await;
    controller
        .add_item(&draft("a", "ETH", "10"))
        .await
        .expect("add");
    controller
        .add_item(&draft("b", "BTC", "0.2"))
        .await
        .expect("add");
    controller
        .add_item(&draft("a", "ETH", "2"))
        .await
        .expect("add");

    let summary = controller.holdings(&prices(), "BTC").await;
    assert_eq!(summary.holdings[0].sym, "ETH");
    assert!((summary.holdings[0].value - 0.6).abs() < 1e-9);
    assert!((summary.total - 0.8).abs() < 1e-9);
    assert_eq!(controller.account_names().await, vec!["a", "b"]);
}

#[tokio::test]
async fn view_subscribers_see_each_sync() {
    let (controller, _, _) = coins(true).await;
    let mut view_rx = controller.subscribe();
    view_rx.borrow_and_update();

    controller.add_group("Second").await.expect("add");
    assert!(view_rx.has_changed().expect("sender alive"));
    assert_eq!(view_rx.borrow_and_update().groups.len(), 2);
}

#[tokio::test]
async fn operations_on_empty_groups_are_noops() {
    let rpc = LoopbackRpc::new().await;
    let client = crate::LedgerClient::new(
        rpc.clone(),
        Arc::new(crate::AppState::new()),
        Arc::new(AutoConfirm(true)),
    );
    // never synced: nothing cached
    let controller = client
        .coin_accounts(GroupType::EosAccount)
        .expect("controller");
    assert!(!controller.delete_group(0).await.expect("no-op"));
    assert!(!controller.update_group(0, "x").await.expect("no-op"));
    assert!(!controller
        .move_group(MoveDirection::Down, 0)
        .await
        .expect("no-op"));
    controller.select_group(3).await.expect("no-op");
    assert_eq!(controller.add_group("Cold wallet").await.expect("no-op"), None);
    assert_eq!(
        controller
            .add_item(&draft("a", "BTC", "1"))
            .await
            .expect("no-op"),
        None
    );
    assert!(!controller
        .update_item(ItemId(1), &draft("a", "BTC", "2"))
        .await
        .expect("no-op"));
    assert!(rpc.calls().await.is_empty());

    let trades = client.stock_trades();
    assert!(!trades.close_trade(ItemId(1), 1_600_000_000, 1.0).await.expect("no-op"));
    assert!(rpc.calls().await.is_empty());
}

#[tokio::test]
async fn default_group_precedes_groups_added_after_first_sync() {
    let gate = RecordingGate::new(true);
    let (client, rpc) = logged_in_client(gate).await;
    let controller = client
        .coin_accounts(GroupType::CoinAccount)
        .expect("controller");

    assert_eq!(controller.add_group("Cold wallet").await.expect("no-op"), None);
    assert_eq!(rpc.count(RpcMethod::AddGroup).await, 0);

    controller.sync().await.expect("sync");
    controller
        .add_group("Cold wallet")
        .await
        .expect("add")
        .expect("groups loaded");
    assert_eq!(names(&controller.view()), vec!["My Assets", "Cold wallet"]);
}
