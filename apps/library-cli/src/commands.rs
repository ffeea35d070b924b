//! Command surface of the `library` binary.

use std::io::Write;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use domain::service::{ReleaseOutcome, ReserveOutcome};
use domain::{BookId, NewUser, UserId};
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::CliError;
use crate::output;
use crate::store::{open_catalog, Catalog};

#[derive(Parser, Debug)]
#[command(name = "library")]
#[command(about = "Library catalog: books, users and loans", long_about = None)]
pub struct Cli {
    /// Use the SQLite store at this path
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,
    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load books from a CSV file
    LoadCsv {
        /// CSV file to read
        file: PathBuf,
        /// Id for the first row without a book_id
        #[arg(long, default_value_t = 1)]
        start_id: BookId,
    },
    /// List books in the catalog
    ListBooks {
        /// Only show books that are on the shelf
        #[arg(short, long)]
        available: bool,
    },
    /// Reserve a book by title
    Reserve { title: String },
    /// Put a reserved book back by title
    Return { title: String },
    /// Lend a book to a user
    Borrow { book_id: BookId, user_id: UserId },
    /// Close a user's loan of a book
    GiveBack { book_id: BookId, user_id: UserId },
    /// List loans
    Loans {
        /// Only loans that are still out
        #[arg(long)]
        open: bool,
    },
    /// Remove a book from the catalog
    DeleteBook { book_id: BookId },
    /// Register a user
    AddUser {
        #[arg(short, long)]
        first: String,
        #[arg(short, long)]
        last: String,
        #[arg(short, long)]
        phone: Option<String>,
        #[arg(short, long)]
        email: Option<String>,
        #[arg(short, long)]
        address: Option<String>,
    },
    /// List registered users
    ListUsers,
    /// Create the SQLite store and its tables
    InitDb {
        /// Database file; defaults to the configured path
        path: Option<PathBuf>,
    },
}

/// Run one command against the configured backend.
///
/// `init-db` only touches the database file, so it runs without opening a
/// catalog first.
pub fn run<W: Write>(command: Command, cfg: &Config, json: bool, out: &mut W) -> Result<(), CliError> {
    if let Command::InitDb { path } = command {
        return init_db(init_db_path(path, cfg), json, out);
    }
    cfg.ensure_backend_available()?;
    let catalog = open_catalog(cfg)?;
    execute(command, &catalog, cfg, json, out)
}

/// Dispatch a command against an open catalog.
pub fn execute<W: Write>(
    command: Command,
    catalog: &Catalog,
    cfg: &Config,
    json: bool,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        Command::LoadCsv { file, start_id } => {
            let loaded = csv_loader::load_books_from_csv(&file, start_id)?;
            let stored = catalog.add_books(loaded.books)?;
            info!(stored, skipped = loaded.skipped, "csv ingested");
            if json {
                writeln!(
                    out,
                    "{}",
                    json!({ "loaded": stored, "skipped": loaded.skipped, "next_id": loaded.next_id })
                )?;
            } else {
                writeln!(out, "Loaded {} books from {}", stored, file.display())?;
            }
        }
        Command::ListBooks { available } => {
            let books = catalog.list_books(available)?;
            output::print_books(out, &books, json)?;
        }
        Command::Reserve { title } => match catalog.reserve_by_title(&title)? {
            ReserveOutcome::Reserved(book) => {
                if json {
                    writeln!(out, "{}", json!({ "reserved": true, "book_id": book.book_id }))?;
                } else {
                    writeln!(out, "Reserved: {}", book.title)?;
                }
            }
            ReserveOutcome::AlreadyReserved(book) => {
                if json {
                    writeln!(out, "{}", json!({ "reserved": false, "book_id": book.book_id }))?;
                } else {
                    writeln!(out, "Warning: book already reserved: {}", book.title)?;
                }
            }
            ReserveOutcome::OnLoan(book) => {
                return Err(CliError::Rejected(format!(
                    "Book {} is out on loan: {}",
                    book.book_id, book.title
                )));
            }
            ReserveOutcome::NotFound => {
                return Err(CliError::NotFound(format!("Book not found: {title}")));
            }
        },
        Command::Return { title } => match catalog.release_by_title(&title)? {
            ReleaseOutcome::Released(book) => {
                if json {
                    writeln!(out, "{}", json!({ "returned": true, "book_id": book.book_id }))?;
                } else {
                    writeln!(out, "Returned: {}", book.title)?;
                }
            }
            ReleaseOutcome::OnLoan(book) => {
                return Err(CliError::Rejected(format!(
                    "Book {} is out on loan; close it with give-back",
                    book.book_id
                )));
            }
            ReleaseOutcome::NotFound => {
                return Err(CliError::NotFound(format!("Book not found: {title}")));
            }
        },
        Command::Borrow { book_id, user_id } => {
            if catalog.find_user_by_id(user_id)?.is_none() {
                return Err(CliError::NotFound(format!("User not found: {user_id}")));
            }
            if !catalog.borrow_book(book_id, user_id)? {
                return Err(CliError::Rejected(format!(
                    "Book {book_id} is unknown or already out"
                )));
            }
            writeln!(out, "Book {book_id} lent to user {user_id}")?;
        }
        Command::GiveBack { book_id, user_id } => {
            if !catalog.return_book_by_id(book_id, user_id)? {
                return Err(CliError::Rejected(format!(
                    "User {user_id} has no open loan of book {book_id}"
                )));
            }
            writeln!(out, "Book {book_id} returned by user {user_id}")?;
        }
        Command::Loans { open } => {
            let loans = catalog.list_borrowings(open)?;
            output::print_borrowings(out, &loans, json)?;
        }
        Command::DeleteBook { book_id } => {
            if !catalog.delete_book(book_id)? {
                return Err(CliError::NotFound(format!("Book not found: {book_id}")));
            }
            writeln!(out, "Deleted book {book_id}")?;
        }
        Command::AddUser {
            first,
            last,
            phone,
            email,
            address,
        } => {
            let mut user = NewUser::new(first, last);
            if let Some(phone) = phone {
                user = user.with_phone(phone);
            }
            if let Some(email) = email {
                user = user.with_email(email);
            }
            if let Some(address) = address {
                user = user.with_address(address);
            }
            let id = catalog.add_user(user)?;
            if json {
                writeln!(out, "{}", json!({ "user_id": id }))?;
            } else {
                let user = catalog
                    .find_user_by_id(id)?
                    .ok_or_else(|| CliError::NotFound(format!("User not found: {id}")))?;
                writeln!(out, "Added user (ID: {id}): {user}")?;
            }
        }
        Command::ListUsers => {
            let users = catalog.list_users()?;
            output::print_users(out, &users, json)?;
        }
        Command::InitDb { path } => init_db(init_db_path(path, cfg), json, out)?,
    }
    Ok(())
}

/// `init-db` without a path uses the configured database location.
fn init_db_path(path: Option<PathBuf>, cfg: &Config) -> PathBuf {
    path.unwrap_or_else(|| cfg.db_path.clone())
}

#[cfg(feature = "sqlite")]
fn init_db<W: Write>(path: PathBuf, json: bool, out: &mut W) -> Result<(), CliError> {
    sqlite_adapter::SqliteRepo::open(&path)?;
    if json {
        writeln!(out, "{}", json!({ "initialized": path.display().to_string() }))?;
    } else {
        writeln!(out, "Database initialized at: {}", path.display())?;
    }
    Ok(())
}

#[cfg(not(feature = "sqlite"))]
fn init_db<W: Write>(_path: PathBuf, _json: bool, _out: &mut W) -> Result<(), CliError> {
    Err(crate::config::ConfigError::sqlite_not_compiled().into())
}
