use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::{GroupId, GroupType, ItemId, TradeDirection, UserId};

/// Remote procedures served under `/rpc/{method}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RpcMethod {
    ListGroups,
    AddGroup,
    UpdateGroup,
    DeleteGroup,
    SwitchGroup,
    ChangeGroup,
    ListCoinAccounts,
    AddCoinAccount,
    UpdateCoinAccount,
    DeleteCoinAccount,
    SwitchCoinAccount,
    ListStockTrades,
    AddStockTrade,
    UpdateStockTrade,
    CloseStockTrade,
    DeleteStockTrade,
    SwitchStockTrade,
}

impl RpcMethod {
    pub const ALL: [RpcMethod; 17] = [
        RpcMethod::ListGroups,
        RpcMethod::AddGroup,
        RpcMethod::UpdateGroup,
        RpcMethod::DeleteGroup,
        RpcMethod::SwitchGroup,
        RpcMethod::ChangeGroup,
        RpcMethod::ListCoinAccounts,
        RpcMethod::AddCoinAccount,
        RpcMethod::UpdateCoinAccount,
        RpcMethod::DeleteCoinAccount,
        RpcMethod::SwitchCoinAccount,
        RpcMethod::ListStockTrades,
        RpcMethod::AddStockTrade,
        RpcMethod::UpdateStockTrade,
        RpcMethod::CloseStockTrade,
        RpcMethod::DeleteStockTrade,
        RpcMethod::SwitchStockTrade,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            RpcMethod::ListGroups => "list_groups",
            RpcMethod::AddGroup => "add_group",
            RpcMethod::UpdateGroup => "update_group",
            RpcMethod::DeleteGroup => "delete_group",
            RpcMethod::SwitchGroup => "switch_group",
            RpcMethod::ChangeGroup => "change_group",
            RpcMethod::ListCoinAccounts => "list_coin_accounts",
            RpcMethod::AddCoinAccount => "add_coin_account",
            RpcMethod::UpdateCoinAccount => "update_coin_account",
            RpcMethod::DeleteCoinAccount => "delete_coin_account",
            RpcMethod::SwitchCoinAccount => "switch_coin_account",
            RpcMethod::ListStockTrades => "list_stock_trades",
            RpcMethod::AddStockTrade => "add_stock_trade",
            RpcMethod::UpdateStockTrade => "update_stock_trade",
            RpcMethod::CloseStockTrade => "close_stock_trade",
            RpcMethod::DeleteStockTrade => "delete_stock_trade",
            RpcMethod::SwitchStockTrade => "switch_stock_trade",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.as_str() == name)
    }

    pub fn is_mutation(self) -> bool {
        !matches!(
            self,
            RpcMethod::ListGroups | RpcMethod::ListCoinAccounts | RpcMethod::ListStockTrades
        )
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Empty {}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdWrapper {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub uid: UserId,
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupDto {
    pub id: GroupId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListGroupsRequest {
    pub group_type: GroupType,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListGroupsResponse {
    pub groups: Vec<GroupDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddGroupRequest {
    pub name: String,
    pub group_type: GroupType,
}

/// Exchanges the order of two entities of the same kind, named by id.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SwitchOrderRequest {
    pub id_a: i64,
    pub id_b: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeGroupRequest {
    pub id: ItemId,
    pub to_group_id: GroupId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinAccountDto {
    pub id: ItemId,
    pub group_id: GroupId,
    pub name: String,
    pub sym: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ListCoinAccountsRequest {
    pub group_id: GroupId,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListCoinAccountsResponse {
    pub accounts: Vec<CoinAccountDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCoinAccountRequest {
    pub group_id: GroupId,
    pub name: String,
    pub sym: String,
    pub amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateCoinAccountRequest {
    pub id: ItemId,
    pub name: String,
    pub sym: String,
    pub amount: f64,
}

/// Timestamps are unix seconds; `0` means unset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockTradeDto {
    pub id: ItemId,
    pub group_id: GroupId,
    pub stock_sym: String,
    pub stock_name: String,
    pub stock_num: f64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub traded_at: i64,
    #[serde(default)]
    pub close_at: i64,
    #[serde(default)]
    pub close_amount: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListStockTradesResponse {
    pub trades: Vec<StockTradeDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddStockTradeRequest {
    pub group_id: GroupId,
    pub stock_sym: String,
    pub stock_name: String,
    pub stock_num: f64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub traded_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStockTradeRequest {
    pub id: ItemId,
    pub stock_sym: String,
    pub stock_name: String,
    pub stock_num: f64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub traded_at: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CloseStockTradeRequest {
    pub id: ItemId,
    pub close_at: i64,
    pub close_amount: f64,
}
