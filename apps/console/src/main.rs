use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client_core::{
    grid::GridSide, AppState, AutoConfirm, ClientError, ConfirmGate, HttpRpcService,
    LedgerClient,
};
use shared::domain::GroupType;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;
mod prompt;

use config::load_settings;
use prompt::StdinGate;

#[derive(Parser, Debug)]
#[command(name = "ledger", about = "Grouped ledger admin console")]
struct Cli {
    /// Settings file; defaults to ./console.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    server_url: Option<String>,
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,
    /// Answer yes to every confirmation.
    #[arg(long, short = 'y', global = true)]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Register {
        username: String,
        password: String,
    },
    Login {
        username: String,
        password: String,
    },
    Logout,
    Whoami,
    /// Manage the groups of one record book.
    Groups {
        #[arg(long, value_enum, default_value_t = Book::Coins)]
        book: Book,
        /// 1-based group to select first.
        #[arg(long)]
        group: Option<usize>,
        #[command(subcommand)]
        action: GroupAction,
    },
    /// Coin accounts of the selected group.
    Coins {
        /// Use the EOS account book instead of the coin book.
        #[arg(long)]
        eos: bool,
        #[arg(long)]
        group: Option<usize>,
        #[command(subcommand)]
        action: CoinAction,
    },
    /// Stock trades of the selected group.
    Trades {
        #[arg(long)]
        group: Option<usize>,
        #[command(subcommand)]
        action: TradeAction,
    },
    /// Plans a grid of orders between two prices.
    Grid {
        #[arg(value_enum)]
        side: Side,
        start_price: String,
        end_price: String,
        /// Step between levels, in percent.
        grid_percent: String,
        /// Currency to spend (long) or units to sell (short).
        start_asset: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Book {
    Coins,
    Eos,
    Trades,
}

impl Book {
    fn group_type(self) -> GroupType {
        match self {
            Book::Coins => GroupType::CoinAccount,
            Book::Eos => GroupType::EosAccount,
            Book::Trades => GroupType::StockTrade,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Side {
    Long,
    Short,
}

impl From<Side> for GridSide {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => GridSide::Long,
            Side::Short => GridSide::Short,
        }
    }
}

#[derive(Subcommand, Debug)]
enum GroupAction {
    List,
    Add {
        name: Option<String>,
    },
    Rename {
        index: usize,
        name: Option<String>,
    },
    Delete {
        index: usize,
    },
    Up {
        index: usize,
    },
    Down {
        index: usize,
    },
}

#[derive(Subcommand, Debug)]
enum CoinAction {
    List {
        /// Only accounts whose name or coin contains this text.
        #[arg(long)]
        filter: Option<String>,
    },
    /// Adds an account; prompts for anything not given.
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        sym: Option<String>,
        #[arg(long)]
        amount: Option<String>,
    },
    Edit {
        index: usize,
    },
    Delete {
        index: usize,
    },
    Up {
        index: usize,
    },
    Down {
        index: usize,
    },
    /// Moves an account to another group.
    Move {
        index: usize,
        #[arg(long)]
        to: Option<usize>,
    },
    Holdings {
        #[arg(long)]
        base: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum TradeAction {
    List,
    Add,
    Edit {
        index: usize,
    },
    /// Saves a copy of an existing trade as a new one.
    Copy {
        index: usize,
    },
    Close {
        index: usize,
        /// `YYYY-MM-DD` or unix seconds.
        close_at: String,
        close_amount: f64,
    },
    Delete {
        index: usize,
    },
    Up {
        index: usize,
    },
    Down {
        index: usize,
    },
    Move {
        index: usize,
        #[arg(long)]
        to: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref());
    if let Some(url) = cli.server_url {
        settings.server_url = url;
    }
    if let Some(path) = cli.session_file {
        settings.session_file = path;
    }

    let session = Arc::new(AppState::with_persistence(&settings.session_file)?);
    let rpc = HttpRpcService::new(&settings.server_url)
        .with_context(|| format!("invalid server url '{}'", settings.server_url))?;
    let gate: Arc<dyn ConfirmGate> = if cli.yes {
        Arc::new(AutoConfirm(true))
    } else {
        Arc::new(StdinGate)
    };
    let client = LedgerClient::new(Arc::new(rpc), session, gate);

    if let Err(err) = commands::run(&client, &settings, cli.command).await {
        match err.downcast_ref::<ClientError>() {
            Some(client_err) => {
                debug!(error = %client_err, "command failed");
                eprintln!("{}", client_err.user_message());
            }
            None => eprintln!("error: {err:#}"),
        }
        std::process::exit(1);
    }
    Ok(())
}
