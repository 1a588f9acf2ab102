use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use shared::{
    domain::{GroupId, ItemId, ItemKind, UserId},
    error::{ApiError, ErrorCode},
    protocol::{
        AddCoinAccountRequest, AddGroupRequest, AddStockTradeRequest, ChangeGroupRequest,
        CloseStockTradeRequest, CoinAccountDto, Empty, GroupDto, IdWrapper,
        ListCoinAccountsRequest, ListCoinAccountsResponse, ListGroupsRequest, ListGroupsResponse,
        ListStockTradesResponse, LoginRequest, RpcMethod, StockTradeDto, SwitchOrderRequest,
        UpdateCoinAccountRequest, UpdateStockTradeRequest,
    },
};
use storage::{
    OrderedTable, Storage, StockTradeFields, StoredCoinAccount, StoredGroup, StoredStockTrade,
};
use tracing::{info, warn};

const MAX_NAME_CHARS: usize = 64;
const MIN_PASSWORD_CHARS: usize = 6;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
}

static SALT_COUNTER: AtomicU64 = AtomicU64::new(0);

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 32 hex chars, unique per call within the process.
fn new_salt(username: &str) -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(username.as_bytes());
    hasher.update(nanos.to_le_bytes());
    hasher.update(SALT_COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    let mut salt = format!("{:x}", hasher.finalize());
    salt.truncate(32);
    salt
}

/// Stored form is `salt$hash`.
fn salted_hash(username: &str, password: &str) -> String {
    let salt = new_salt(username);
    let hash = hash_password(&salt, password);
    format!("{salt}${hash}")
}

fn verify_password(stored: &str, password: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, hash)) => hash == hash_password(salt, password),
        None => false,
    }
}

pub async fn register(ctx: &ApiContext, req: &LoginRequest) -> Result<UserId, ApiError> {
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::new(ErrorCode::Validation, "username is required"));
    }
    if req.password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("password must be at least {MIN_PASSWORD_CHARS} characters"),
        ));
    }
    if ctx
        .storage
        .find_user(username)
        .await
        .map_err(internal)?
        .is_some()
    {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "username is already taken",
        ));
    }

    let user_id = ctx
        .storage
        .create_user(username, &salted_hash(username, &req.password))
        .await
        .map_err(internal)?;
    info!(user_id = user_id.0, username, "registered user");
    Ok(user_id)
}

pub async fn authenticate(ctx: &ApiContext, req: &LoginRequest) -> Result<UserId, ApiError> {
    let username = req.username.trim();
    let user = ctx
        .storage
        .find_user(username)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::Unauthorized, "invalid credentials"))?;
    if !verify_password(&user.password_hash, &req.password) {
        return Err(ApiError::new(ErrorCode::Unauthorized, "invalid credentials"));
    }
    Ok(user.user_id)
}

/// Routes one decoded RPC call to its handler.
pub async fn dispatch(
    ctx: &ApiContext,
    user_id: UserId,
    method: RpcMethod,
    body: Value,
) -> Result<Value, ApiError> {
    match method {
        RpcMethod::ListGroups => encode(list_groups(ctx, user_id, decode(body)?).await?),
        RpcMethod::AddGroup => encode(add_group(ctx, user_id, decode(body)?).await?),
        RpcMethod::UpdateGroup => encode(update_group(ctx, user_id, decode(body)?).await?),
        RpcMethod::DeleteGroup => encode(delete_group(ctx, user_id, decode(body)?).await?),
        RpcMethod::SwitchGroup => encode(switch_group(ctx, user_id, decode(body)?).await?),
        RpcMethod::ChangeGroup => encode(change_group(ctx, user_id, decode(body)?).await?),
        RpcMethod::ListCoinAccounts => {
            encode(list_coin_accounts(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::AddCoinAccount => encode(add_coin_account(ctx, user_id, decode(body)?).await?),
        RpcMethod::UpdateCoinAccount => {
            encode(update_coin_account(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::DeleteCoinAccount => {
            encode(delete_coin_account(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::SwitchCoinAccount => {
            encode(switch_coin_account(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::ListStockTrades => encode(list_stock_trades(ctx, user_id, decode(body)?).await?),
        RpcMethod::AddStockTrade => encode(add_stock_trade(ctx, user_id, decode(body)?).await?),
        RpcMethod::UpdateStockTrade => {
            encode(update_stock_trade(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::CloseStockTrade => encode(close_stock_trade(ctx, user_id, decode(body)?).await?),
        RpcMethod::DeleteStockTrade => {
            encode(delete_stock_trade(ctx, user_id, decode(body)?).await?)
        }
        RpcMethod::SwitchStockTrade => {
            encode(switch_stock_trade(ctx, user_id, decode(body)?).await?)
        }
    }
}

pub async fn list_groups(
    ctx: &ApiContext,
    user_id: UserId,
    req: ListGroupsRequest,
) -> Result<ListGroupsResponse, ApiError> {
    let groups = ctx
        .storage
        .list_groups(user_id, req.group_type)
        .await
        .map_err(internal)?;
    Ok(ListGroupsResponse {
        groups: groups
            .into_iter()
            .map(|group| GroupDto {
                id: group.group_id,
                name: group.name,
            })
            .collect(),
    })
}

pub async fn add_group(
    ctx: &ApiContext,
    user_id: UserId,
    req: AddGroupRequest,
) -> Result<IdWrapper, ApiError> {
    let name = validated_name("group name", &req.name)?;
    let group_id = ctx
        .storage
        .create_group(user_id, req.group_type, name)
        .await
        .map_err(internal)?;
    info!(
        user_id = user_id.0,
        group_id = group_id.0,
        group_type = %req.group_type,
        "created group"
    );
    Ok(IdWrapper { id: group_id.0 })
}

pub async fn update_group(
    ctx: &ApiContext,
    user_id: UserId,
    req: GroupDto,
) -> Result<Empty, ApiError> {
    let name = validated_name("group name", &req.name)?;
    owned_group(ctx, user_id, req.id).await?;
    ctx.storage
        .rename_group(req.id, name)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn delete_group(
    ctx: &ApiContext,
    user_id: UserId,
    req: IdWrapper,
) -> Result<Empty, ApiError> {
    let group_id = GroupId(req.id);
    owned_group(ctx, user_id, group_id).await?;
    ctx.storage
        .delete_group(group_id)
        .await
        .map_err(internal)?;
    info!(user_id = user_id.0, group_id = group_id.0, "deleted group");
    Ok(Empty {})
}

pub async fn switch_group(
    ctx: &ApiContext,
    user_id: UserId,
    req: SwitchOrderRequest,
) -> Result<Empty, ApiError> {
    let a = owned_group(ctx, user_id, GroupId(req.id_a)).await?;
    let b = owned_group(ctx, user_id, GroupId(req.id_b)).await?;
    if a.group_type != b.group_type {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "groups are of different types",
        ));
    }
    swap(ctx, OrderedTable::Groups, req).await
}

/// Moves one record into another group of the same type; the record kind
/// follows from the destination group's type.
pub async fn change_group(
    ctx: &ApiContext,
    user_id: UserId,
    req: ChangeGroupRequest,
) -> Result<Empty, ApiError> {
    let destination = owned_group(ctx, user_id, req.to_group_id).await?;
    let kind = records_kind(&destination)?;
    let (source_group_id, table) = match kind {
        ItemKind::CoinAccount => (
            owned_coin_account(ctx, user_id, req.id).await?.group_id,
            OrderedTable::CoinAccounts,
        ),
        ItemKind::StockTrade => (
            owned_stock_trade(ctx, user_id, req.id).await?.group_id,
            OrderedTable::StockTrades,
        ),
    };
    if source_group_id == destination.group_id {
        return Ok(Empty {});
    }
    let source = owned_group(ctx, user_id, source_group_id).await?;
    if source.group_type != destination.group_type {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "records can only move between groups of the same type",
        ));
    }

    ctx.storage
        .move_record(table, req.id.0, destination.group_id)
        .await
        .map_err(internal)?;
    info!(
        user_id = user_id.0,
        item_id = req.id.0,
        from_group = source_group_id.0,
        to_group = destination.group_id.0,
        "moved record"
    );
    Ok(Empty {})
}

pub async fn list_coin_accounts(
    ctx: &ApiContext,
    user_id: UserId,
    req: ListCoinAccountsRequest,
) -> Result<ListCoinAccountsResponse, ApiError> {
    owned_group_of_kind(ctx, user_id, req.group_id, ItemKind::CoinAccount).await?;
    let accounts = ctx
        .storage
        .list_coin_accounts(req.group_id)
        .await
        .map_err(internal)?;
    Ok(ListCoinAccountsResponse {
        accounts: accounts.into_iter().map(coin_account_dto).collect(),
    })
}

pub async fn add_coin_account(
    ctx: &ApiContext,
    user_id: UserId,
    req: AddCoinAccountRequest,
) -> Result<IdWrapper, ApiError> {
    owned_group_of_kind(ctx, user_id, req.group_id, ItemKind::CoinAccount).await?;
    let name = validated_name("account name", &req.name)?;
    let sym = validated_name("coin symbol", &req.sym)?;
    let item_id = ctx
        .storage
        .insert_coin_account(req.group_id, name, sym, req.amount)
        .await
        .map_err(internal)?;
    Ok(IdWrapper { id: item_id.0 })
}

pub async fn update_coin_account(
    ctx: &ApiContext,
    user_id: UserId,
    req: UpdateCoinAccountRequest,
) -> Result<Empty, ApiError> {
    owned_coin_account(ctx, user_id, req.id).await?;
    let name = validated_name("account name", &req.name)?;
    let sym = validated_name("coin symbol", &req.sym)?;
    ctx.storage
        .update_coin_account(req.id, name, sym, req.amount)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn delete_coin_account(
    ctx: &ApiContext,
    user_id: UserId,
    req: IdWrapper,
) -> Result<Empty, ApiError> {
    owned_coin_account(ctx, user_id, ItemId(req.id)).await?;
    ctx.storage
        .delete_record(OrderedTable::CoinAccounts, req.id)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn switch_coin_account(
    ctx: &ApiContext,
    user_id: UserId,
    req: SwitchOrderRequest,
) -> Result<Empty, ApiError> {
    let a = owned_coin_account(ctx, user_id, ItemId(req.id_a)).await?;
    let b = owned_coin_account(ctx, user_id, ItemId(req.id_b)).await?;
    ensure_same_group(a.group_id, b.group_id)?;
    swap(ctx, OrderedTable::CoinAccounts, req).await
}

pub async fn list_stock_trades(
    ctx: &ApiContext,
    user_id: UserId,
    req: IdWrapper,
) -> Result<ListStockTradesResponse, ApiError> {
    let group_id = GroupId(req.id);
    owned_group_of_kind(ctx, user_id, group_id, ItemKind::StockTrade).await?;
    let trades = ctx
        .storage
        .list_stock_trades(group_id)
        .await
        .map_err(internal)?;
    Ok(ListStockTradesResponse {
        trades: trades.into_iter().map(stock_trade_dto).collect(),
    })
}

pub async fn add_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    req: AddStockTradeRequest,
) -> Result<IdWrapper, ApiError> {
    owned_group_of_kind(ctx, user_id, req.group_id, ItemKind::StockTrade).await?;
    let fields = StockTradeFields {
        stock_sym: validated_name("stock symbol", &req.stock_sym)?.to_string(),
        stock_name: validated_name("stock name", &req.stock_name)?.to_string(),
        stock_num: req.stock_num,
        direction: req.direction,
        amount: req.amount,
        traded_at: req.traded_at,
    };
    let item_id = ctx
        .storage
        .insert_stock_trade(req.group_id, &fields)
        .await
        .map_err(internal)?;
    Ok(IdWrapper { id: item_id.0 })
}

pub async fn update_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    req: UpdateStockTradeRequest,
) -> Result<Empty, ApiError> {
    owned_stock_trade(ctx, user_id, req.id).await?;
    let fields = StockTradeFields {
        stock_sym: validated_name("stock symbol", &req.stock_sym)?.to_string(),
        stock_name: validated_name("stock name", &req.stock_name)?.to_string(),
        stock_num: req.stock_num,
        direction: req.direction,
        amount: req.amount,
        traded_at: req.traded_at,
    };
    ctx.storage
        .update_stock_trade(req.id, &fields)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn close_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    req: CloseStockTradeRequest,
) -> Result<Empty, ApiError> {
    owned_stock_trade(ctx, user_id, req.id).await?;
    ctx.storage
        .close_stock_trade(req.id, req.close_at, req.close_amount)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn delete_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    req: IdWrapper,
) -> Result<Empty, ApiError> {
    owned_stock_trade(ctx, user_id, ItemId(req.id)).await?;
    ctx.storage
        .delete_record(OrderedTable::StockTrades, req.id)
        .await
        .map_err(internal)?;
    Ok(Empty {})
}

pub async fn switch_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    req: SwitchOrderRequest,
) -> Result<Empty, ApiError> {
    let a = owned_stock_trade(ctx, user_id, ItemId(req.id_a)).await?;
    let b = owned_stock_trade(ctx, user_id, ItemId(req.id_b)).await?;
    ensure_same_group(a.group_id, b.group_id)?;
    swap(ctx, OrderedTable::StockTrades, req).await
}

async fn swap(
    ctx: &ApiContext,
    table: OrderedTable,
    req: SwitchOrderRequest,
) -> Result<Empty, ApiError> {
    if req.id_a == req.id_b {
        return Ok(Empty {});
    }
    let swapped = ctx
        .storage
        .swap_order(table, req.id_a, req.id_b)
        .await
        .map_err(internal)?;
    if !swapped {
        return Err(ApiError::new(ErrorCode::NotFound, "record not found"));
    }
    Ok(Empty {})
}

async fn owned_group(
    ctx: &ApiContext,
    user_id: UserId,
    group_id: GroupId,
) -> Result<StoredGroup, ApiError> {
    let group = ctx
        .storage
        .load_group(group_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "group not found"))?;
    if group.user_id != user_id {
        return Err(ApiError::new(
            ErrorCode::Forbidden,
            "group belongs to another user",
        ));
    }
    Ok(group)
}

async fn owned_group_of_kind(
    ctx: &ApiContext,
    user_id: UserId,
    group_id: GroupId,
    kind: ItemKind,
) -> Result<StoredGroup, ApiError> {
    let group = owned_group(ctx, user_id, group_id).await?;
    if records_kind(&group)? != kind {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{} groups do not hold {kind:?} records", group.group_type),
        ));
    }
    Ok(group)
}

async fn owned_coin_account(
    ctx: &ApiContext,
    user_id: UserId,
    item_id: ItemId,
) -> Result<StoredCoinAccount, ApiError> {
    let account = ctx
        .storage
        .load_coin_account(item_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "coin account not found"))?;
    owned_group(ctx, user_id, account.group_id).await?;
    Ok(account)
}

async fn owned_stock_trade(
    ctx: &ApiContext,
    user_id: UserId,
    item_id: ItemId,
) -> Result<StoredStockTrade, ApiError> {
    let trade = ctx
        .storage
        .load_stock_trade(item_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "stock trade not found"))?;
    owned_group(ctx, user_id, trade.group_id).await?;
    Ok(trade)
}

fn records_kind(group: &StoredGroup) -> Result<ItemKind, ApiError> {
    group.group_type.item_kind().ok_or_else(|| {
        ApiError::new(
            ErrorCode::Validation,
            format!("{} groups hold no records", group.group_type),
        )
    })
}

fn ensure_same_group(a: GroupId, b: GroupId) -> Result<(), ApiError> {
    if a != b {
        return Err(ApiError::new(
            ErrorCode::Validation,
            "records belong to different groups",
        ));
    }
    Ok(())
}

fn validated_name<'a>(field: &str, raw: &'a str) -> Result<&'a str, ApiError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} is required"),
        ));
    }
    if trimmed.chars().count() > MAX_NAME_CHARS {
        return Err(ApiError::new(
            ErrorCode::Validation,
            format!("{field} exceeds {MAX_NAME_CHARS} characters"),
        ));
    }
    Ok(trimmed)
}

fn coin_account_dto(account: StoredCoinAccount) -> CoinAccountDto {
    CoinAccountDto {
        id: account.item_id,
        group_id: account.group_id,
        name: account.name,
        sym: account.sym,
        amount: account.amount,
    }
}

fn stock_trade_dto(trade: StoredStockTrade) -> StockTradeDto {
    StockTradeDto {
        id: trade.item_id,
        group_id: trade.group_id,
        stock_sym: trade.fields.stock_sym,
        stock_name: trade.fields.stock_name,
        stock_num: trade.fields.stock_num,
        direction: trade.fields.direction,
        amount: trade.fields.amount,
        traded_at: trade.fields.traded_at,
        close_at: trade.close_at,
        close_amount: trade.close_amount,
    }
}

fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body)
        .map_err(|e| ApiError::new(ErrorCode::Validation, format!("malformed request: {e}")))
}

fn encode<T: Serialize>(response: T) -> Result<Value, ApiError> {
    serde_json::to_value(response).map_err(|e| {
        ApiError::new(
            ErrorCode::Internal,
            format!("failed to encode response: {e}"),
        )
    })
}

fn internal(err: anyhow::Error) -> ApiError {
    warn!(error = %err, "storage failure");
    ApiError::new(ErrorCode::Internal, err.to_string())
}
