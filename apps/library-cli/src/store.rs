//! Backend selection. The provider is resolved once from `Config`; the chosen
//! backend is fixed for the lifetime of the catalog.

use std::time::SystemTime;

use domain::adapters::memory_repo::InMemoryRepo;
use domain::service::CatalogService;
use domain::{
    Book, BookId, BookRepository, Borrowing, Clock, CoreError, NewUser, ShelfChange, User, UserId,
    UserRepository,
};

use crate::config::{Config, StorageProvider};
#[cfg(not(feature = "sqlite"))]
use crate::config::ConfigError;
use crate::error::CliError;

/// Catalog wired to whichever backend the configuration picked.
pub type Catalog = CatalogService<Backend, StdClock>;

#[derive(Clone, Copy)]
pub struct StdClock;
impl Clock for StdClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

// Local repo abstraction supporting memory or sqlite (feature-gated).
pub enum Backend {
    Memory(InMemoryRepo),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteRepo),
}

impl Backend {
    /// Construct the configured backend, failing if it is not compiled in or
    /// cannot be opened.
    pub fn from_config(cfg: &Config) -> Result<Self, CliError> {
        match cfg.storage_provider {
            StorageProvider::Memory => Ok(Self::Memory(InMemoryRepo::new())),
            #[cfg(feature = "sqlite")]
            StorageProvider::Sqlite => Ok(Self::Sqlite(sqlite_adapter::SqliteRepo::open(
                &cfg.db_path,
            )?)),
            #[cfg(not(feature = "sqlite"))]
            StorageProvider::Sqlite => Err(ConfigError::sqlite_not_compiled().into()),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Memory(_) => "memory",
            #[cfg(feature = "sqlite")]
            Self::Sqlite(_) => "sqlite",
        }
    }
}

/// Build a catalog for the configured backend.
pub fn open_catalog(cfg: &Config) -> Result<Catalog, CliError> {
    let backend = Backend::from_config(cfg)?;
    tracing::debug!(backend = backend.name(), "catalog ready");
    Ok(CatalogService::new(backend, StdClock))
}

impl BookRepository for Backend {
    fn put_book(&self, book: Book) -> Result<(), CoreError> {
        match self {
            Self::Memory(r) => r.put_book(book),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.put_book(book),
        }
    }

    fn get_book(&self, id: BookId) -> Result<Option<Book>, CoreError> {
        match self {
            Self::Memory(r) => r.get_book(id),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.get_book(id),
        }
    }

    fn find_book_by_title(&self, folded_title: &str) -> Result<Option<Book>, CoreError> {
        match self {
            Self::Memory(r) => r.find_book_by_title(folded_title),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.find_book_by_title(folded_title),
        }
    }

    fn list_books(&self, available_only: bool) -> Result<Vec<Book>, CoreError> {
        match self {
            Self::Memory(r) => r.list_books(available_only),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.list_books(available_only),
        }
    }

    fn update_book(&self, book: &Book) -> Result<bool, CoreError> {
        match self {
            Self::Memory(r) => r.update_book(book),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.update_book(book),
        }
    }

    fn delete_book(&self, id: BookId) -> Result<bool, CoreError> {
        match self {
            Self::Memory(r) => r.delete_book(id),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.delete_book(id),
        }
    }

    fn set_availability(&self, id: BookId, available: bool) -> Result<ShelfChange, CoreError> {
        match self {
            Self::Memory(r) => r.set_availability(id, available),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.set_availability(id, available),
        }
    }

    fn borrow_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        match self {
            Self::Memory(r) => r.borrow_book(book_id, user_id, at),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.borrow_book(book_id, user_id, at),
        }
    }

    fn return_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        match self {
            Self::Memory(r) => r.return_book(book_id, user_id, at),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.return_book(book_id, user_id, at),
        }
    }

    fn list_borrowings(&self, open_only: bool) -> Result<Vec<Borrowing>, CoreError> {
        match self {
            Self::Memory(r) => r.list_borrowings(open_only),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.list_borrowings(open_only),
        }
    }
}

impl UserRepository for Backend {
    fn add_user(&self, user: NewUser) -> Result<UserId, CoreError> {
        match self {
            Self::Memory(r) => r.add_user(user),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.add_user(user),
        }
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, CoreError> {
        match self {
            Self::Memory(r) => r.get_user(id),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.get_user(id),
        }
    }

    fn list_users(&self) -> Result<Vec<User>, CoreError> {
        match self {
            Self::Memory(r) => r.list_users(),
            #[cfg(feature = "sqlite")]
            Self::Sqlite(r) => r.list_users(),
        }
    }
}
