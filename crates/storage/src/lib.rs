use anyhow::{anyhow, Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use shared::domain::{GroupId, GroupType, ItemId, TradeDirection, UserId};

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone)]
pub struct StoredUser {
    pub user_id: UserId,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone)]
pub struct StoredGroup {
    pub group_id: GroupId,
    pub user_id: UserId,
    pub group_type: GroupType,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct StoredCoinAccount {
    pub item_id: ItemId,
    pub group_id: GroupId,
    pub name: String,
    pub sym: String,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct StoredStockTrade {
    pub item_id: ItemId,
    pub group_id: GroupId,
    pub fields: StockTradeFields,
    pub close_at: i64,
    pub close_amount: f64,
}

/// Columns of a stock trade that callers write directly.
#[derive(Debug, Clone, PartialEq)]
pub struct StockTradeFields {
    pub stock_sym: String,
    pub stock_name: String,
    pub stock_num: f64,
    pub direction: TradeDirection,
    pub amount: f64,
    pub traded_at: i64,
}

/// Tables whose rows carry a `sort_order` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderedTable {
    Groups,
    CoinAccounts,
    StockTrades,
}

impl OrderedTable {
    fn table_name(self) -> &'static str {
        match self {
            OrderedTable::Groups => "record_groups",
            OrderedTable::CoinAccounts => "coin_accounts",
            OrderedTable::StockTrades => "stock_trades",
        }
    }
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        // In-memory databases live per connection; a single connection keeps one view.
        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_user(&self, username: &str, password_hash: &str) -> Result<UserId> {
        let rec = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id")
            .bind(username)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to create user '{username}'"))?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    pub async fn find_user(&self, username: &str) -> Result<Option<StoredUser>> {
        let row = sqlx::query("SELECT id, username, password_hash FROM users WHERE username = ?")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StoredUser {
            user_id: UserId(r.get::<i64, _>(0)),
            username: r.get::<String, _>(1),
            password_hash: r.get::<String, _>(2),
        }))
    }

    pub async fn create_group(
        &self,
        user_id: UserId,
        group_type: GroupType,
        name: &str,
    ) -> Result<GroupId> {
        let rec = sqlx::query(
            "INSERT INTO record_groups (user_id, group_type, name, sort_order)
             VALUES (?1, ?2, ?3, (
                SELECT COALESCE(MAX(sort_order), 0) + 1 FROM record_groups
                WHERE user_id = ?1 AND group_type = ?2
             ))
             RETURNING id",
        )
        .bind(user_id.0)
        .bind(group_type.as_str())
        .bind(name)
        .fetch_one(&self.pool)
        .await?;
        Ok(GroupId(rec.get::<i64, _>(0)))
    }

    pub async fn list_groups(
        &self,
        user_id: UserId,
        group_type: GroupType,
    ) -> Result<Vec<StoredGroup>> {
        let rows = sqlx::query(
            "SELECT id, user_id, group_type, name FROM record_groups
             WHERE user_id = ? AND group_type = ?
             ORDER BY sort_order ASC, id ASC",
        )
        .bind(user_id.0)
        .bind(group_type.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(group_from_row).collect()
    }

    pub async fn load_group(&self, group_id: GroupId) -> Result<Option<StoredGroup>> {
        let row = sqlx::query("SELECT id, user_id, group_type, name FROM record_groups WHERE id = ?")
            .bind(group_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(group_from_row).transpose()
    }

    pub async fn rename_group(&self, group_id: GroupId, name: &str) -> Result<bool> {
        let result = sqlx::query("UPDATE record_groups SET name = ? WHERE id = ?")
            .bind(name)
            .bind(group_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Removes a group together with every record it owns.
    pub async fn delete_group(&self, group_id: GroupId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        for table in [OrderedTable::CoinAccounts, OrderedTable::StockTrades] {
            sqlx::query(&format!(
                "DELETE FROM {} WHERE group_id = ?",
                table.table_name()
            ))
            .bind(group_id.0)
            .execute(&mut *tx)
            .await?;
        }
        let result = sqlx::query("DELETE FROM record_groups WHERE id = ?")
            .bind(group_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Exchanges the `sort_order` of two rows. Returns false if either row is missing.
    pub async fn swap_order(&self, table: OrderedTable, id_a: i64, id_b: i64) -> Result<bool> {
        let name = table.table_name();
        let mut tx = self.pool.begin().await?;
        let select = format!("SELECT sort_order FROM {name} WHERE id = ?");
        let order_a: Option<i64> = sqlx::query_scalar(&select)
            .bind(id_a)
            .fetch_optional(&mut *tx)
            .await?;
        let order_b: Option<i64> = sqlx::query_scalar(&select)
            .bind(id_b)
            .fetch_optional(&mut *tx)
            .await?;
        let (Some(order_a), Some(order_b)) = (order_a, order_b) else {
            return Ok(false);
        };

        let update = format!("UPDATE {name} SET sort_order = ? WHERE id = ?");
        sqlx::query(&update)
            .bind(order_b)
            .bind(id_a)
            .execute(&mut *tx)
            .await?;
        sqlx::query(&update)
            .bind(order_a)
            .bind(id_b)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(true)
    }

    pub async fn delete_record(&self, table: OrderedTable, id: i64) -> Result<bool> {
        let result = sqlx::query(&format!("DELETE FROM {} WHERE id = ?", table.table_name()))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Reassigns a record to another group, placing it after the group's last record.
    pub async fn move_record(
        &self,
        table: OrderedTable,
        id: i64,
        to_group_id: GroupId,
    ) -> Result<bool> {
        if table == OrderedTable::Groups {
            return Err(anyhow!("groups cannot be moved between groups"));
        }
        let name = table.table_name();
        let result = sqlx::query(&format!(
            "UPDATE {name}
             SET group_id = ?1,
                 sort_order = (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM {name} WHERE group_id = ?1)
             WHERE id = ?2"
        ))
        .bind(to_group_id.0)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_coin_account(
        &self,
        group_id: GroupId,
        name: &str,
        sym: &str,
        amount: f64,
    ) -> Result<ItemId> {
        let rec = sqlx::query(
            "INSERT INTO coin_accounts (group_id, name, sym, amount, sort_order)
             VALUES (?1, ?2, ?3, ?4, (
                SELECT COALESCE(MAX(sort_order), 0) + 1 FROM coin_accounts WHERE group_id = ?1
             ))
             RETURNING id",
        )
        .bind(group_id.0)
        .bind(name)
        .bind(sym)
        .bind(amount)
        .fetch_one(&self.pool)
        .await?;
        Ok(ItemId(rec.get::<i64, _>(0)))
    }

    pub async fn list_coin_accounts(&self, group_id: GroupId) -> Result<Vec<StoredCoinAccount>> {
        let rows = sqlx::query(
            "SELECT id, group_id, name, sym, amount FROM coin_accounts
             WHERE group_id = ?
             ORDER BY sort_order ASC, id ASC",
        )
        .bind(group_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(coin_account_from_row).collect())
    }

    pub async fn load_coin_account(&self, item_id: ItemId) -> Result<Option<StoredCoinAccount>> {
        let row = sqlx::query("SELECT id, group_id, name, sym, amount FROM coin_accounts WHERE id = ?")
            .bind(item_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(coin_account_from_row))
    }

    pub async fn update_coin_account(
        &self,
        item_id: ItemId,
        name: &str,
        sym: &str,
        amount: f64,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE coin_accounts SET name = ?, sym = ?, amount = ? WHERE id = ?")
            .bind(name)
            .bind(sym)
            .bind(amount)
            .bind(item_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn insert_stock_trade(
        &self,
        group_id: GroupId,
        fields: &StockTradeFields,
    ) -> Result<ItemId> {
        let rec = sqlx::query(
            "INSERT INTO stock_trades
                (group_id, stock_sym, stock_name, stock_num, direction, amount, traded_at, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, (
                SELECT COALESCE(MAX(sort_order), 0) + 1 FROM stock_trades WHERE group_id = ?1
             ))
             RETURNING id",
        )
        .bind(group_id.0)
        .bind(&fields.stock_sym)
        .bind(&fields.stock_name)
        .bind(fields.stock_num)
        .bind(fields.direction.code())
        .bind(fields.amount)
        .bind(fields.traded_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(ItemId(rec.get::<i64, _>(0)))
    }

    pub async fn list_stock_trades(&self, group_id: GroupId) -> Result<Vec<StoredStockTrade>> {
        let rows = sqlx::query(
            "SELECT id, group_id, stock_sym, stock_name, stock_num, direction, amount,
                    traded_at, close_at, close_amount
             FROM stock_trades
             WHERE group_id = ?
             ORDER BY sort_order ASC, id ASC",
        )
        .bind(group_id.0)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(stock_trade_from_row).collect()
    }

    pub async fn load_stock_trade(&self, item_id: ItemId) -> Result<Option<StoredStockTrade>> {
        let row = sqlx::query(
            "SELECT id, group_id, stock_sym, stock_name, stock_num, direction, amount,
                    traded_at, close_at, close_amount
             FROM stock_trades WHERE id = ?",
        )
        .bind(item_id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(stock_trade_from_row).transpose()
    }

    pub async fn update_stock_trade(
        &self,
        item_id: ItemId,
        fields: &StockTradeFields,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE stock_trades
             SET stock_sym = ?, stock_name = ?, stock_num = ?, direction = ?, amount = ?, traded_at = ?
             WHERE id = ?",
        )
        .bind(&fields.stock_sym)
        .bind(&fields.stock_name)
        .bind(fields.stock_num)
        .bind(fields.direction.code())
        .bind(fields.amount)
        .bind(fields.traded_at)
        .bind(item_id.0)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn close_stock_trade(
        &self,
        item_id: ItemId,
        close_at: i64,
        close_amount: f64,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE stock_trades SET close_at = ?, close_amount = ? WHERE id = ?")
            .bind(close_at)
            .bind(close_amount)
            .bind(item_id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

fn group_from_row(row: &SqliteRow) -> Result<StoredGroup> {
    let raw_type: String = row.try_get("group_type")?;
    let group_type = GroupType::from_name(&raw_type)
        .ok_or_else(|| anyhow!("unknown group type '{raw_type}' in record_groups"))?;
    Ok(StoredGroup {
        group_id: GroupId(row.try_get("id")?),
        user_id: UserId(row.try_get("user_id")?),
        group_type,
        name: row.try_get("name")?,
    })
}

fn coin_account_from_row(row: &SqliteRow) -> StoredCoinAccount {
    StoredCoinAccount {
        item_id: ItemId(row.get::<i64, _>("id")),
        group_id: GroupId(row.get::<i64, _>("group_id")),
        name: row.get("name"),
        sym: row.get("sym"),
        amount: row.get("amount"),
    }
}

fn stock_trade_from_row(row: &SqliteRow) -> Result<StoredStockTrade> {
    let raw_direction: String = row.try_get("direction")?;
    let direction = TradeDirection::from_code(&raw_direction)
        .ok_or_else(|| anyhow!("unknown trade direction '{raw_direction}' in stock_trades"))?;
    Ok(StoredStockTrade {
        item_id: ItemId(row.try_get("id")?),
        group_id: GroupId(row.try_get("group_id")?),
        fields: StockTradeFields {
            stock_sym: row.try_get("stock_sym")?,
            stock_name: row.try_get("stock_name")?,
            stock_num: row.try_get("stock_num")?,
            direction,
            amount: row.try_get("amount")?,
            traded_at: row.try_get("traded_at")?,
        },
        close_at: row.try_get("close_at")?,
        close_amount: row.try_get("close_amount")?,
    })
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.contains(":memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
