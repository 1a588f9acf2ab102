use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(GroupId);
id_newtype!(ItemId);

/// Category of records a group holds. Every group belongs to exactly one type
/// and only lists alongside groups of the same type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    CoinAccount,
    EosAccount,
    StockAccount,
    CoinTrade,
    StockTrade,
    FuturesTrade,
    FuturesArbitrage,
    GridTrade,
}

impl GroupType {
    pub const ALL: [GroupType; 8] = [
        GroupType::CoinAccount,
        GroupType::EosAccount,
        GroupType::StockAccount,
        GroupType::CoinTrade,
        GroupType::StockTrade,
        GroupType::FuturesTrade,
        GroupType::FuturesArbitrage,
        GroupType::GridTrade,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupType::CoinAccount => "coin_account",
            GroupType::EosAccount => "eos_account",
            GroupType::StockAccount => "stock_account",
            GroupType::CoinTrade => "coin_trade",
            GroupType::StockTrade => "stock_trade",
            GroupType::FuturesTrade => "futures_trade",
            GroupType::FuturesArbitrage => "futures_arbitrage",
            GroupType::GridTrade => "grid_trade",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Name of the group created automatically when a user has none of this type.
    pub fn default_group_name(self) -> &'static str {
        match self {
            GroupType::CoinAccount | GroupType::EosAccount => "My Assets",
            GroupType::StockAccount => "My Stocks",
            GroupType::CoinTrade
            | GroupType::StockTrade
            | GroupType::FuturesTrade
            | GroupType::FuturesArbitrage => "Trade Records",
            GroupType::GridTrade => "Grid Trading Tools",
        }
    }

    /// Record table backing groups of this type, if the backend stores any.
    pub fn item_kind(self) -> Option<ItemKind> {
        match self {
            GroupType::CoinAccount | GroupType::EosAccount => Some(ItemKind::CoinAccount),
            GroupType::StockTrade => Some(ItemKind::StockTrade),
            _ => None,
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    CoinAccount,
    StockTrade,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    #[serde(rename = "B")]
    Buy,
    #[serde(rename = "S")]
    Sell,
}

impl TradeDirection {
    pub fn code(self) -> &'static str {
        match self {
            TradeDirection::Buy => "B",
            TradeDirection::Sell => "S",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B" => Some(TradeDirection::Buy),
            "S" => Some(TradeDirection::Sell),
            _ => None,
        }
    }
}
