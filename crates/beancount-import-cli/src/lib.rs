mod config;
mod console;
mod show;
mod terminal;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use beancount_import::console::{Console, Line, Tone};
use beancount_import::import::{ofx, simplefin};
use beancount_import::reconcile::PendingOrder;
use beancount_import::session::{self, SessionConfig};
use beancount_import::{Flag, ImportBatch, Period, validate};
use clap::{Args as ClapArgs, CommandFactory as _, Parser, Subcommand};

use crate::config::{Config, SortPending};
use crate::console::StyledConsole;
use crate::terminal::TerminalPrompts;

#[derive(Parser)]
#[command(
    name = "bean-import",
    version,
    about = "Reconcile bank exports with a beancount ledger, inserting what is missing"
)]
#[command(disable_help_subcommand = true)]
struct Args {
    /// Beancount ledger file. Reconciled entries are updated in place.
    ledger: PathBuf,

    #[command(flatten)]
    source: SourceArgs,

    /// Append inserted transactions to this file instead of printing them at the end
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Only consider transactions in this period: YYYY, YYYY-MM or YYYY-MM-DD
    #[arg(short = 'd', long)]
    period: Option<Period>,

    /// Ledger account the imported transactions belong to
    #[arg(short, long, value_parser = validate::parse_account)]
    account: Option<String>,

    /// JSON file mapping bank payee names to ledger payees
    #[arg(short, long)]
    payees: Option<PathBuf>,

    /// Use the ledger's operating currency instead of asking for one per posting
    #[arg(short = 'c', long)]
    operating_currency: bool,

    /// Flag for inserted transactions
    #[arg(short, long)]
    flag: Option<Flag>,

    /// Go through pending transactions in file order instead of by date
    #[arg(long)]
    unsorted: bool,

    /// Config file. Defaults to bean-import.toml or .bean-import.toml in the current directory.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(ClapArgs)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// OFX bank statement to import
    #[arg(short = 'x', long)]
    ofx: Option<PathBuf>,

    /// SimpleFIN JSON export to import
    #[arg(short, long)]
    simplefin: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactively reconcile, insert or skip each pending transaction (default)
    Import,
    /// List pending transactions and exit
    Pending,
}

pub fn run(args: impl IntoIterator<Item = String>) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "beancount_import=warn".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    clap_complete::CompleteEnv::with_factory(Args::command).complete();

    let args = Args::parse_from(args);
    let config = match &args.config {
        Some(path) => Some(Config::load_from_file(path)?),
        None => Config::find_and_load()?,
    };
    let config = config.map(|(_, config)| config).unwrap_or_default();
    let session_config = session_config(&args, config)?;

    let mut console = StyledConsole::stdout();
    let batches = load_batches(&args.source, &mut console)?;

    match args.command.unwrap_or(Commands::Import) {
        Commands::Import => {
            let mut prompts = TerminalPrompts::new();
            session::run(&session_config, batches, &mut prompts, &mut console)?;
            Ok(())
        }
        Commands::Pending => show::show_pending(&session_config, &batches, &mut console),
    }
}

/// Command line options take precedence over the config file.
fn session_config(args: &Args, config: Config) -> Result<SessionConfig> {
    let mut session = SessionConfig::new(&args.ledger);

    session.account = match (&args.account, config.account) {
        (Some(account), _) => Some(account.clone()),
        (None, Some(account)) => Some(
            validate::parse_account(&account).context("Invalid account in config file")?,
        ),
        (None, None) => None,
    };
    session.period = args.period.clone();
    session.flag = match (args.flag, config.flag) {
        (Some(flag), _) => flag,
        (None, Some(flag)) => flag
            .parse::<Flag>()
            .with_context(|| format!("Invalid flag in config file: '{flag}'"))?,
        (None, None) => session.flag,
    };
    session.order = match (args.unsorted, config.sort_pending) {
        (true, _) | (false, Some(SortPending::Input)) => PendingOrder::Input,
        (false, Some(SortPending::Date) | None) => PendingOrder::ByDate,
    };
    session.operating_currency = args.operating_currency || config.operating_currency.unwrap_or(false);
    session.default_currency = config.default_currency;
    if let Some(payees) = args.payees.clone().or(config.payees) {
        session.payees = payees;
    }
    session.output = args.output.clone().or(config.output);

    Ok(session)
}

fn load_batches(source: &SourceArgs, console: &mut dyn Console) -> Result<Vec<ImportBatch>> {
    let file_line = |label: &str, path: &PathBuf| {
        Line::plain(format!("{label} File: ")).push(Tone::File, path.display().to_string())
    };

    if let Some(path) = &source.ofx {
        console.print(file_line("OFX", path));
        return Ok(vec![ofx::load(path)?]);
    }
    if let Some(path) = &source.simplefin {
        console.print(file_line("SimpleFIN", path));
        return simplefin::load(path);
    }
    Ok(Vec::new())
}
