use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{Overrides, init_tracing, load_config};
use core_types::{Account, NewAccount, NewUser, ObjectId, User};
use database::{CollectionNames, DbRepository, InMemoryStore, connect};
use rust_decimal::Decimal;
use std::sync::Arc;

/// The main entry point for the payments store administration tool.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    let mut config = load_config().context("Failed to load configuration")?;
    cli.overrides.apply(&mut config);
    let _log_guard = init_tracing(&config.logging)?;
    tracing::debug!(database = ?config.database, dry_run = cli.dry_run, "Configuration loaded");

    let collections = CollectionNames::from(&config.database);
    let cost = config.security.password_hash_cost;

    if cli.dry_run {
        let repo = DbRepository::new(Arc::new(InMemoryStore::new()), collections, cost);
        return run(cli.command, &repo, &Target::DryRun).await;
    }

    // Nothing works without storage, so a failed connection ends the process here.
    let store = connect(&config.database)
        .await
        .context("Failed to connect to the database")?;
    let repo = DbRepository::new(Arc::new(store.clone()), collections, cost);
    let target = Target::Database {
        name: store.database_name().to_string(),
        uri: config.database.redacted_uri(),
    };

    let result = run(cli.command, &repo, &target).await;

    drop(repo);
    store.shutdown().await;
    result
}

/// What the repository is backed by, for reporting.
enum Target {
    Database { name: String, uri: String },
    DryRun,
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Administration tool for the payments user and account store.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    overrides: Overrides,

    /// Run against an empty in-memory store instead of the database.
    /// Configuration is still loaded and validated; nothing is persisted.
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the database and report success.
    Ping,
    /// Create the unique index on usernames. Fails while duplicates exist.
    EnsureIndexes,
    /// Register a new user.
    CreateUser(CreateUserArgs),
    /// Show a user by username.
    ShowUser(ShowUserArgs),
    /// Open an account for an existing user.
    CreateAccount(CreateAccountArgs),
    /// List every account that belongs to a user.
    ListAccounts(ListAccountsArgs),
    /// Overwrite the balance of an account.
    SetBalance(SetBalanceArgs),
}

#[derive(Parser)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,

    /// Prefer the environment variable over the flag to keep it out of shell history.
    #[arg(long, env = "PAYMENTS_USER_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long)]
    first_name: Option<String>,

    #[arg(long)]
    last_name: Option<String>,
}

#[derive(Parser)]
struct ShowUserArgs {
    username: String,

    /// Print the record as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct CreateAccountArgs {
    /// The owning user's id (24 hex characters).
    #[arg(long)]
    user_id: ObjectId,

    /// The opening balance (e.g., "100" or "250.75").
    #[arg(long)]
    balance: Decimal,
}

#[derive(Parser)]
struct ListAccountsArgs {
    user_id: ObjectId,

    /// Print the records as JSON instead of a table.
    #[arg(long)]
    json: bool,
}

#[derive(Parser)]
struct SetBalanceArgs {
    account_id: ObjectId,

    #[arg(long)]
    balance: Decimal,
}

// ==============================================================================
// Command Logic
// ==============================================================================

async fn run(command: Commands, repo: &DbRepository, target: &Target) -> anyhow::Result<()> {
    match command {
        Commands::Ping => match target {
            Target::Database { name, uri } => println!("Connected to database '{name}' at {uri}"),
            Target::DryRun => println!("Dry run: using an in-memory store, no database contacted."),
        },
        Commands::EnsureIndexes => {
            repo.ensure_indexes()
                .await
                .context("Failed to create the username index; resolve duplicate usernames first")?;
            println!("Username index is in place on '{}'.", repo.collections().users);
        }
        Commands::CreateUser(args) => {
            let input = NewUser {
                username: args.username,
                password: args.password,
                first_name: args.first_name,
                last_name: args.last_name,
            };
            let user = repo.users().create(input).await?;
            println!("{}", user_table(&user));
        }
        Commands::ShowUser(args) => {
            let Some(user) = repo.users().find_by_username(&args.username).await? else {
                bail!("No user named '{}'", args.username);
            };
            if args.json {
                println!("{}", serde_json::to_string_pretty(&public_user(&user))?);
            } else {
                println!("{}", user_table(&user));
            }
        }
        Commands::CreateAccount(args) => {
            let account = repo
                .accounts()
                .create(NewAccount::new(args.user_id, args.balance))
                .await?;
            println!("{}", accounts_table(&[account]));
        }
        Commands::ListAccounts(args) => {
            let accounts = repo.accounts().find_by_user(args.user_id).await?;
            if args.json {
                let rendered: Vec<_> = accounts.iter().map(public_account).collect();
                println!("{}", serde_json::to_string_pretty(&rendered)?);
            } else if accounts.is_empty() {
                println!("User {} has no accounts.", args.user_id);
            } else {
                println!("{}", accounts_table(&accounts));
            }
        }
        Commands::SetBalance(args) => {
            let account = repo.accounts().set_balance(args.account_id, args.balance).await?;
            println!("{}", accounts_table(&[account]));
        }
    }
    Ok(())
}

/// A user as JSON, without the password hash.
fn public_user(user: &User) -> serde_json::Value {
    serde_json::json!({
        "id": user.id.to_hex(),
        "username": user.username,
        "firstName": user.first_name,
        "lastName": user.last_name,
    })
}

fn public_account(account: &Account) -> serde_json::Value {
    serde_json::json!({
        "id": account.id.to_hex(),
        "userId": account.user_id.to_hex(),
        "balance": account.balance.to_string(),
    })
}

fn user_table(user: &User) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Id", "Username", "First Name", "Last Name"]);
    table.add_row(vec![
        user.id.to_hex(),
        user.username.clone(),
        user.first_name.clone().unwrap_or_default(),
        user.last_name.clone().unwrap_or_default(),
    ]);
    table
}

fn accounts_table(accounts: &[Account]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["Account Id", "User Id", "Balance"]);
    for account in accounts {
        table.add_row(vec![
            account.id.to_hex(),
            account.user_id.to_hex(),
            account.balance.to_string(),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dry_run_repository() -> DbRepository {
        // bcrypt's minimum cost keeps the tests fast.
        DbRepository::new(Arc::new(InMemoryStore::new()), CollectionNames::default(), 4)
    }

    #[test]
    fn account_json_uses_hex_ids_like_user_json() {
        let account = Account {
            id: ObjectId::new(),
            user_id: ObjectId::new(),
            balance: Decimal::new(10025, 2),
        };
        let rendered = public_account(&account);
        assert_eq!(rendered["id"], account.id.to_hex());
        assert_eq!(rendered["userId"], account.user_id.to_hex());
        assert_eq!(rendered["balance"], "100.25");

        let user = User {
            id: ObjectId::new(),
            username: "hari".to_string(),
            password: "hash".to_string(),
            first_name: None,
            last_name: None,
        };
        let rendered = public_user(&user);
        assert_eq!(rendered["id"], user.id.to_hex());
        assert!(rendered.get("password").is_none());
    }

    #[tokio::test]
    async fn dry_run_executes_commands_against_the_in_memory_store() {
        let repo = dry_run_repository();
        run(Commands::Ping, &repo, &Target::DryRun).await.unwrap();
        run(Commands::EnsureIndexes, &repo, &Target::DryRun).await.unwrap();
        run(
            Commands::CreateUser(CreateUserArgs {
                username: "hari".to_string(),
                password: "pw".to_string(),
                first_name: None,
                last_name: None,
            }),
            &repo,
            &Target::DryRun,
        )
        .await
        .unwrap();

        let user = repo.users().find_by_username("hari").await.unwrap().unwrap();
        run(
            Commands::CreateAccount(CreateAccountArgs {
                user_id: user.id,
                balance: Decimal::new(100, 0),
            }),
            &repo,
            &Target::DryRun,
        )
        .await
        .unwrap();
        assert_eq!(repo.accounts().find_by_user(user.id).await.unwrap().len(), 1);

        let missing = run(
            Commands::ShowUser(ShowUserArgs {
                username: "nobody".to_string(),
                json: false,
            }),
            &repo,
            &Target::DryRun,
        )
        .await;
        assert!(missing.is_err());
    }
}
