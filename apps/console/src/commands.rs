use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use client_core::{
    forms::{
        add_group_form, change_group_form, coin_account_form, rename_group_form,
        stock_trade_form, GROUP_NAME_KEY, TARGET_GROUP_KEY,
    },
    grid::{plan, GridInputs, GridPlan},
    records::{
        filter_accounts, CoinAccountDraft, PriceFeed, StaticPrices, StockTradeDraft, BASE_COINS,
    },
    AppState, CoinAccountsController, CollectionApi, Entity, GroupedListController,
    GroupedListView, LedgerClient, MoveDirection, StockTradesController,
};
use shared::{
    domain::{GroupId, ItemId},
    protocol::{CoinAccountDto, GroupDto, StockTradeDto},
};
use tracing::info;

use crate::{
    config::ConsoleSettings, prompt::prompt_form, Book, CoinAction, Command, GroupAction,
    TradeAction,
};

pub async fn run(client: &LedgerClient, settings: &ConsoleSettings, command: Command) -> Result<()> {
    match command {
        Command::Register { username, password } => {
            let user = client.register(&username, &password).await?;
            println!("registered as user {}", user.uid);
        }
        Command::Login { username, password } => {
            let user = client.login(&username, &password).await?;
            println!("logged in as user {}", user.uid);
        }
        Command::Logout => {
            client.logout().await?;
            println!("logged out");
        }
        Command::Whoami => match client.session().user().await {
            Some(user) => println!("user {} at {}", user.uid, settings.server_url),
            None => println!("not logged in"),
        },
        Command::Groups {
            book,
            group,
            action,
        } => match book {
            Book::Coins | Book::Eos => {
                let controller = client.coin_accounts(book.group_type())?;
                open(&controller, group).await?;
                run_groups(client.session(), &controller, action).await?;
            }
            Book::Trades => {
                let controller = client.stock_trades();
                open(&controller, group).await?;
                run_groups(client.session(), &controller, action).await?;
            }
        },
        Command::Coins { eos, group, action } => {
            let book = if eos { Book::Eos } else { Book::Coins };
            let controller = client.coin_accounts(book.group_type())?;
            open(&controller, group).await?;
            run_coins(client.session(), settings, &controller, action).await?;
        }
        Command::Trades { group, action } => {
            let controller = client.stock_trades();
            open(&controller, group).await?;
            run_trades(client.session(), &controller, action).await?;
        }
        Command::Grid {
            side,
            start_price,
            end_price,
            grid_percent,
            start_asset,
        } => {
            let inputs = GridInputs::parse(&start_price, &end_price, &grid_percent, &start_asset)?;
            print_grid(&plan(side.into(), &inputs)?);
        }
    }
    Ok(())
}

/// Syncs and selects the 1-based `group`, if given.
async fn open<I>(controller: &GroupedListController<I>, group: Option<usize>) -> Result<()>
where
    I: CollectionApi<Parent = GroupId>,
    I::Entity: Entity<Id = ItemId>,
{
    controller.sync().await?;
    if let Some(group) = group {
        controller.select_group(zero_based(group)?).await?;
    }
    Ok(())
}

fn zero_based(index: usize) -> Result<usize> {
    index
        .checked_sub(1)
        .ok_or_else(|| anyhow!("positions start at 1"))
}

async fn move_group<I>(
    controller: &GroupedListController<I>,
    direction: MoveDirection,
    index: usize,
) -> Result<()>
where
    I: CollectionApi<Parent = GroupId>,
    I::Entity: Entity<Id = ItemId>,
{
    if !controller.move_group(direction, zero_based(index)?).await? {
        println!("group {index} cannot move further");
    }
    Ok(())
}

async fn move_item<I>(
    controller: &GroupedListController<I>,
    direction: MoveDirection,
    index: usize,
) -> Result<()>
where
    I: CollectionApi<Parent = GroupId>,
    I::Entity: Entity<Id = ItemId>,
{
    if !controller.move_item(direction, zero_based(index)?).await? {
        println!("entry {index} cannot move further");
    }
    Ok(())
}

async fn run_groups<I>(
    session: &AppState,
    controller: &GroupedListController<I>,
    action: GroupAction,
) -> Result<()>
where
    I: CollectionApi<Parent = GroupId>,
    I::Entity: Entity<Id = ItemId>,
{
    match action {
        GroupAction::List => {}
        GroupAction::Add { name } => {
            let name = match name {
                Some(name) => name,
                None => prompt_form(session, add_group_form())
                    .await?
                    .text(GROUP_NAME_KEY)
                    .unwrap_or_default()
                    .to_string(),
            };
            match controller.add_group(&name).await? {
                Some(id) => info!(group_id = id.0, "group added"),
                None => println!("groups are not loaded yet"),
            }
        }
        GroupAction::Rename { index, name } => {
            let index = zero_based(index)?;
            let name = match name {
                Some(name) => name,
                None => {
                    let view = controller.view();
                    let group = view
                        .groups
                        .get(index)
                        .with_context(|| format!("there is no group {}", index + 1))?;
                    prompt_form(session, rename_group_form(group))
                        .await?
                        .text(GROUP_NAME_KEY)
                        .unwrap_or_default()
                        .to_string()
                }
            };
            if !controller.update_group(index, &name).await? {
                println!("no groups to rename");
            }
        }
        GroupAction::Delete { index } => {
            if !controller.delete_group(zero_based(index)?).await? {
                println!("nothing deleted");
            }
        }
        GroupAction::Up { index } => move_group(controller, MoveDirection::Up, index).await?,
        GroupAction::Down { index } => move_group(controller, MoveDirection::Down, index).await?,
    }
    print_groups(&controller.view());
    Ok(())
}

/// Destination group for a move: the 1-based `to` if given, otherwise asked
/// for through the change-group form.
async fn target_group<E>(
    session: &AppState,
    view: &GroupedListView<E>,
    to: Option<usize>,
) -> Result<Option<GroupId>> {
    match to {
        Some(to) => {
            let index = zero_based(to)?;
            let group = view
                .groups
                .get(index)
                .with_context(|| format!("there is no group {to}"))?;
            Ok(Some(group.id))
        }
        None => {
            let values =
                prompt_form(session, change_group_form(&view.groups, view.current_group_index))
                    .await?;
            Ok(values.selected(TARGET_GROUP_KEY).map(GroupId))
        }
    }
}

fn item_at<E: Clone>(view: &GroupedListView<E>, index: usize) -> Result<E> {
    view.items
        .get(zero_based(index)?)
        .cloned()
        .with_context(|| format!("there is no entry {index} in this group"))
}

async fn run_coins(
    session: &AppState,
    settings: &ConsoleSettings,
    controller: &CoinAccountsController,
    action: CoinAction,
) -> Result<()> {
    let feed = StaticPrices::new(settings.prices.clone());
    let mut filter = None;
    match action {
        CoinAction::List { filter: text } => filter = text,
        CoinAction::Add { name, sym, amount } => {
            let draft = match sym {
                Some(sym) => CoinAccountDraft::parse(
                    name.as_deref().unwrap_or_default(),
                    &sym,
                    amount.as_deref().unwrap_or("0"),
                    &feed,
                )?,
                None => {
                    let schema = coin_account_form(
                        None,
                        controller.account_names().await,
                        feed_symbols(&feed),
                    );
                    CoinAccountDraft::from_form(&prompt_form(session, schema).await?, &feed)?
                }
            };
            if controller.add_item(&draft).await?.is_none() {
                bail!("there is no group to add the account to");
            }
        }
        CoinAction::Edit { index } => {
            let account = item_at(&controller.view(), index)?;
            let schema = coin_account_form(
                Some(&account),
                controller.account_names().await,
                feed_symbols(&feed),
            );
            let draft = CoinAccountDraft::from_form(&prompt_form(session, schema).await?, &feed)?;
            if !controller.update_item(account.id, &draft).await? {
                println!("nothing updated");
            }
        }
        CoinAction::Delete { index } => {
            if !controller.delete_item(zero_based(index)?).await? {
                println!("nothing deleted");
            }
        }
        CoinAction::Up { index } => move_item(controller, MoveDirection::Up, index).await?,
        CoinAction::Down { index } => move_item(controller, MoveDirection::Down, index).await?,
        CoinAction::Move { index, to } => {
            let view = controller.view();
            let account = item_at(&view, index)?;
            let target = target_group(session, &view, to).await?;
            controller.change_item_group(account.id, target).await?;
        }
        CoinAction::Holdings { base } => {
            let base = base.unwrap_or_else(|| settings.base_coin.clone()).to_uppercase();
            if !BASE_COINS.contains(&base.as_str()) {
                bail!("base coin must be one of {}", BASE_COINS.join(", "));
            }
            let summary = controller.holdings(&feed, &base).await;
            for holding in &summary.holdings {
                println!("{:<8} {:>18.8} {}", holding.sym, holding.value, summary.base_coin);
            }
            println!("{:<8} {:>18.8} {}", "TOTAL", summary.total, summary.base_coin);
            return Ok(());
        }
    }

    let view = controller.view();
    print_groups(&view);
    let accounts: Vec<&CoinAccountDto> = match &filter {
        Some(text) => filter_accounts(&view.items, text),
        None => view.items.iter().collect(),
    };
    print_accounts(&view.items, &accounts);
    Ok(())
}

/// Base coins first, then everything else the feed prices.
fn feed_symbols(feed: &StaticPrices) -> Vec<String> {
    let mut symbols: Vec<String> = BASE_COINS.iter().map(|s| s.to_string()).collect();
    symbols.extend(
        feed.symbols()
            .into_iter()
            .filter(|sym| !BASE_COINS.contains(&sym.as_str())),
    );
    symbols
}

async fn run_trades(
    session: &AppState,
    controller: &StockTradesController,
    action: TradeAction,
) -> Result<()> {
    match action {
        TradeAction::List => {}
        TradeAction::Add => {
            let values = prompt_form(session, stock_trade_form(None)).await?;
            let draft = StockTradeDraft::from_form(ItemId(0), &values)?;
            if controller.add_item(&draft).await?.is_none() {
                bail!("there is no group to add the trade to");
            }
        }
        TradeAction::Edit { index } => {
            let trade = item_at(&controller.view(), index)?;
            let values = prompt_form(session, stock_trade_form(Some(&trade))).await?;
            let draft = StockTradeDraft::from_form(trade.id, &values)?;
            if !controller.update_item(trade.id, &draft).await? {
                println!("nothing updated");
            }
        }
        TradeAction::Copy { index } => {
            let trade = item_at(&controller.view(), index)?;
            let draft = StockTradeDraft::copy_of(&trade);
            draft.validate()?;
            controller.add_item(&draft).await?;
        }
        TradeAction::Close {
            index,
            close_at,
            close_amount,
        } => {
            let trade = item_at(&controller.view(), index)?;
            let close_at = parse_timestamp(&close_at)?;
            if !controller.close_trade(trade.id, close_at, close_amount).await? {
                println!("nothing closed");
            }
        }
        TradeAction::Delete { index } => {
            if !controller.delete_item(zero_based(index)?).await? {
                println!("nothing deleted");
            }
        }
        TradeAction::Up { index } => move_item(controller, MoveDirection::Up, index).await?,
        TradeAction::Down { index } => move_item(controller, MoveDirection::Down, index).await?,
        TradeAction::Move { index, to } => {
            let view = controller.view();
            let trade = item_at(&view, index)?;
            let target = target_group(session, &view, to).await?;
            controller.change_item_group(trade.id, target).await?;
        }
    }

    let view = controller.view();
    print_groups(&view);
    print_trades(&view.items);
    Ok(())
}

/// Accepts `YYYY-MM-DD` (midnight UTC) or raw unix seconds.
pub(crate) fn parse_timestamp(raw: &str) -> Result<i64> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("invalid date")?;
        return Ok(midnight.and_utc().timestamp());
    }
    raw.parse::<i64>()
        .with_context(|| format!("'{raw}' is neither a date (YYYY-MM-DD) nor unix seconds"))
}

pub(crate) fn format_timestamp(secs: i64) -> String {
    if secs <= 0 {
        return "-".to_string();
    }
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|at| at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn print_groups<E>(view: &GroupedListView<E>) {
    if view.groups.is_empty() {
        println!("(no groups)");
        return;
    }
    for (i, group) in view.groups.iter().enumerate() {
        let marker = if i == view.current_group_index { '*' } else { ' ' };
        println!("{marker} {:>2}. {}", i + 1, group_label(group));
    }
}

fn group_label(group: &GroupDto) -> String {
    format!("{} (#{})", group.name, group.id)
}

fn print_accounts(all: &[CoinAccountDto], shown: &[&CoinAccountDto]) {
    println!();
    if shown.is_empty() {
        println!("(no accounts)");
        return;
    }
    for account in shown {
        let position = all
            .iter()
            .position(|a| a.id == account.id)
            .map_or(0, |p| p + 1);
        println!(
            "{position:>3}. {:<20} {:<6} {:>18.8}",
            account.name, account.sym, account.amount
        );
    }
}

fn print_trades(trades: &[StockTradeDto]) {
    println!();
    if trades.is_empty() {
        println!("(no trades)");
        return;
    }
    for (i, trade) in trades.iter().enumerate() {
        let closed = if trade.close_at > 0 {
            format!(
                "closed {} for {:.2}",
                format_timestamp(trade.close_at),
                trade.close_amount
            )
        } else {
            "open".to_string()
        };
        println!(
            "{:>3}. {} {:<12} {} {:>10} {:>12.2} {:<10} {closed}",
            i + 1,
            trade.stock_sym,
            trade.stock_name,
            trade.direction.code(),
            trade.stock_num,
            trade.amount,
            format_timestamp(trade.traded_at),
        );
    }
}

fn print_grid(plan: &GridPlan) {
    println!("{:>5} {:>14} {:>16} {:>16}", "level", "price", "quantity", "currency");
    for level in &plan.levels {
        println!(
            "{:>5} {:>14.6} {:>16.6} {:>16.6}",
            level.index + 1,
            level.price,
            level.quantity,
            level.currency
        );
    }
    println!(
        "{:>5} {:>14} {:>16.6} {:>16.6}",
        "total", "", plan.total_quantity, plan.total_currency
    );
    if let Some(avg) = plan.average_price() {
        println!("average price {avg:.6}");
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
