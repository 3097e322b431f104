use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use async_trait::async_trait;
use clap::Parser;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use lender_core::domain::DeliveryError;
use lender_core::impls::{DirectoryCatalog, JsonFileLoanStore};
use lender_core::ports::{Catalog, Messenger};
use lender_core::{ItemId, LoanConfig, LoanError, LoanScheduler, UserId};

/// Lend files from a directory and remind borrowers until they return them.
#[derive(Debug, Parser)]
#[command(name = "lender", version)]
struct Cli {
    /// TOML settings; defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where active loans are persisted [default: loans.json].
    #[arg(long)]
    state: Option<PathBuf>,

    /// Directory holding the lendable items [default: books].
    #[arg(long)]
    catalog: Option<PathBuf>,
}

/// The `[cli]` table of the config file. Scheduler keys sit at the top level.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CliSection {
    state_file: Option<PathBuf>,
    catalog_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    cli: CliSection,
}

/// Resolved settings: flags win over the file, the file over defaults.
struct Settings {
    loan: LoanConfig,
    state: PathBuf,
    catalog: PathBuf,
}

impl Settings {
    fn resolve(cli: Cli) -> anyhow::Result<Self> {
        let (loan, file) = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let loan = LoanConfig::from_toml_str(&raw)
                    .with_context(|| format!("loading {}", path.display()))?;
                let file: ConfigFile = toml::from_str(&raw)
                    .with_context(|| format!("loading [cli] from {}", path.display()))?;
                (loan, file)
            }
            None => (LoanConfig::default(), ConfigFile::default()),
        };

        Ok(Self {
            loan,
            state: cli
                .state
                .or(file.cli.state_file)
                .unwrap_or_else(|| PathBuf::from("loans.json")),
            catalog: cli
                .catalog
                .or(file.cli.catalog_dir)
                .unwrap_or_else(|| PathBuf::from("books")),
        })
    }
}

/// Messenger that prints to stdout.
struct StdoutMessenger;

#[async_trait]
impl Messenger for StdoutMessenger {
    async fn send_text(&self, user_id: &UserId, text: &str) -> Result<(), DeliveryError> {
        println!("[to {user_id}] {text}");
        Ok(())
    }

    async fn send_document(&self, user_id: &UserId, path: &Path) -> Result<(), DeliveryError> {
        println!("[to {user_id}] <document {}>", path.display());
        Ok(())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Borrow(UserId, ItemId),
    Return(UserId),
    Owe(UserId),
    Items,
    Loans,
    Status,
    Help,
    Quit,
}

fn parse_command(line: &str) -> anyhow::Result<Option<Command>> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let command = match words.as_slice() {
        [] => return Ok(None),
        ["borrow", user, item] => Command::Borrow(UserId::new(*user), ItemId::new(*item)),
        ["return", user] => Command::Return(UserId::new(*user)),
        ["owe", user] => Command::Owe(UserId::new(*user)),
        ["items"] => Command::Items,
        ["loans"] => Command::Loans,
        ["status"] => Command::Status,
        ["help"] => Command::Help,
        ["quit"] | ["exit"] => Command::Quit,
        _ => bail!("unrecognized command: {line:?} (try `help`)"),
    };
    Ok(Some(command))
}

const HELP: &str = "\
commands:
  borrow <user> <item>   lend an item and send it
  return <user>          close a loan and put the item back
  owe <user>             show the current fine
  items                  list available items
  loans                  list active loans
  status                 scheduler counters
  quit";

struct Desk {
    scheduler: LoanScheduler,
    catalog: DirectoryCatalog,
    messenger: Arc<StdoutMessenger>,
}

impl Desk {
    async fn borrow(&self, user_id: UserId, item_id: ItemId) -> anyhow::Result<()> {
        if !self.catalog.contains(&item_id)? {
            bail!("'{item_id}' is not available");
        }

        let loan = match self.scheduler.borrow(user_id.clone(), item_id.clone()).await {
            Ok(loan) => loan,
            Err(LoanError::AlreadyBorrowed(_)) => {
                println!("{user_id} already has an item; return it first");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        let held = match self.catalog.remove(&item_id) {
            Ok(path) => path,
            Err(e) => {
                // Undo the loan so the catalog and the scheduler agree.
                self.scheduler.return_item(&user_id).await?;
                return Err(e.into());
            }
        };

        if let Err(e) = self.messenger.send_document(&user_id, &held).await {
            warn!(user_id = %user_id, "cannot deliver item: {e}");
        }
        let due_at = self.scheduler.fine_policy().due_at(loan.borrowed_at);
        println!("{user_id} borrowed '{item_id}', due {}", due_at.date_naive());
        Ok(())
    }

    async fn return_item(&self, user_id: &UserId) -> anyhow::Result<()> {
        let loan = match self.scheduler.return_item(user_id).await {
            Ok(loan) => loan,
            Err(LoanError::NoActiveLoan(_)) => {
                println!("{user_id} has nothing to return");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.catalog.restore(&loan.item_id) {
            warn!(item_id = %loan.item_id, "cannot put item back: {e}");
        }
        if loan.fine > 0 {
            println!("{user_id} returned '{}' with a fine of {}", loan.item_id, loan.fine);
        } else {
            println!("{user_id} returned '{}'", loan.item_id);
        }
        Ok(())
    }

    async fn owe(&self, user_id: &UserId) {
        match self.scheduler.statement(user_id).await {
            Some(s) if s.assessment.is_overdue() => println!(
                "{user_id} owes {} ('{}' is {} day(s) overdue)",
                s.assessment.fine, s.loan.item_id, s.assessment.overdue_days
            ),
            Some(s) => println!(
                "{user_id} owes nothing; '{}' is due in {} day(s)",
                s.loan.item_id, s.assessment.days_left
            ),
            None => println!("{user_id} has no active loan"),
        }
    }

    async fn run(&self, command: Command) -> anyhow::Result<bool> {
        match command {
            Command::Borrow(user_id, item_id) => self.borrow(user_id, item_id).await?,
            Command::Return(user_id) => self.return_item(&user_id).await?,
            Command::Owe(user_id) => self.owe(&user_id).await,
            Command::Items => {
                for item in self.catalog.list_items()? {
                    println!("{item}");
                }
            }
            Command::Loans => {
                for loan in self.scheduler.loans().await {
                    println!(
                        "{} '{}' since {} (fine {})",
                        loan.user_id,
                        loan.item_id,
                        loan.borrowed_at.format("%Y-%m-%d %H:%M"),
                        loan.fine
                    );
                }
            }
            Command::Status => println!("{:?}", self.scheduler.status().await),
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("lender=info,lender_core=info")),
        )
        .init();

    let settings = Settings::resolve(Cli::parse())?;

    let messenger = Arc::new(StdoutMessenger);
    let scheduler = LoanScheduler::builder(
        Arc::new(JsonFileLoanStore::new(&settings.state)),
        messenger.clone(),
    )
    .config(settings.loan)
    .build()
    .context("starting loan scheduler")?;

    let restored = scheduler.start().await?;
    info!(restored, state = %settings.state.display(), "lender ready");

    let desk = Desk {
        scheduler: scheduler.clone(),
        catalog: DirectoryCatalog::new(&settings.catalog),
        messenger,
    };

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let line = tokio::select! {
            _ = &mut ctrl_c => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            break;
        };

        match parse_command(&line) {
            Ok(Some(command)) => match desk.run(command).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => println!("error: {e:#}"),
            },
            Ok(None) => {}
            Err(e) => println!("{e}"),
        }
    }

    scheduler.stop().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(
            parse_command("borrow 42 a.pdf").unwrap(),
            Some(Command::Borrow(UserId::new("42"), ItemId::new("a.pdf")))
        );
        assert_eq!(
            parse_command("  return 42 ").unwrap(),
            Some(Command::Return(UserId::new("42")))
        );
        assert_eq!(parse_command("").unwrap(), None);
        assert_eq!(parse_command("exit").unwrap(), Some(Command::Quit));
    }

    #[test]
    fn flags_override_the_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lender.toml");
        std::fs::write(
            &path,
            "fine_per_day = 3\n[cli]\nstate_file = \"state.json\"\ncatalog_dir = \"shelf\"\n",
        )
        .unwrap();

        let cli = Cli::parse_from(["lender", "--config", path.to_str().unwrap(), "--catalog", "other"]);
        let settings = Settings::resolve(cli).unwrap();

        assert_eq!(settings.loan.fine_per_day, 3);
        assert_eq!(settings.state, PathBuf::from("state.json"));
        assert_eq!(settings.catalog, PathBuf::from("other"));
    }

    #[test]
    fn defaults_apply_without_a_config_file() {
        let settings = Settings::resolve(Cli::parse_from(["lender"])).unwrap();
        assert_eq!(settings.loan, LoanConfig::default());
        assert_eq!(settings.state, PathBuf::from("loans.json"));
        assert_eq!(settings.catalog, PathBuf::from("books"));
    }

    #[test]
    fn rejects_malformed_commands() {
        assert!(parse_command("borrow 42").is_err());
        assert!(parse_command("dance").is_err());
    }
}
