//! Domain library for the library catalog.
//!
//! This crate is dependency-free (inherits workspace metadata only) and holds
//! the entity types, ports (traits), the catalog service, and error
//! definitions. Keep adapters and IO concerns out of this crate; the only
//! adapter living here is the in-memory one used for ephemeral catalogs and
//! tests.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

/// Identifier of a book. Unique within a catalog, chosen by the caller.
pub type BookId = i64;

/// Identifier of a user. Assigned by the backend on insertion.
pub type UserId = i64;

/// A catalogued book.
///
/// `available` is the only borrow state a book carries: it is either on the
/// shelf or it is not.
#[derive(Clone, Debug, PartialEq)]
pub struct Book {
    pub book_id: BookId,
    pub title: String,
    pub author: String,
    pub genre: Option<String>,
    pub average_rating: Option<f64>,
    /// Catalog number / ISBN, kept as raw text.
    pub isbn: Option<String>,
    pub language_code: Option<String>,
    pub rating_count: Option<i64>,
    pub available: bool,
}

impl Book {
    /// Create an available book with all optional attributes unset.
    pub fn new<T: Into<String>, A: Into<String>>(book_id: BookId, title: T, author: A) -> Self {
        Self {
            book_id,
            title: title.into(),
            author: author.into(),
            genre: None,
            average_rating: None,
            isbn: None,
            language_code: None,
            rating_count: None,
            available: true,
        }
    }

    /// Take the book off the shelf. Returns `false` (and changes nothing) if it
    /// was already unavailable.
    pub fn reserve(&mut self) -> bool {
        if self.available {
            self.available = false;
            true
        } else {
            false
        }
    }

    /// Put the book back on the shelf. Always succeeds.
    pub fn release(&mut self) {
        self.available = true;
    }
}

impl Display for Book {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let status = if self.available {
            "Available"
        } else {
            "Not Available"
        };
        write!(
            f,
            "'{}' by {} | Genre: {} | Status: {}",
            self.title,
            self.author,
            self.genre.as_deref().unwrap_or("Unknown"),
            status
        )
    }
}

/// Input data for registering a new user. `created_at` is stamped when the
/// value is constructed and never changes afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub phone_num: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: SystemTime,
}

impl NewUser {
    pub fn new<F: Into<String>, L: Into<String>>(first_name: F, last_name: L) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone_num: None,
            email: None,
            address: None,
            created_at: SystemTime::now(),
        }
    }

    pub fn with_phone<S: Into<String>>(mut self, phone: S) -> Self {
        self.phone_num = Some(phone.into());
        self
    }

    pub fn with_email<S: Into<String>>(mut self, email: S) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_address<S: Into<String>>(mut self, address: S) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Attach the store-generated id.
    pub fn into_user(self, user_id: UserId) -> User {
        User {
            user_id,
            first_name: self.first_name,
            last_name: self.last_name,
            phone_num: self.phone_num,
            email: self.email,
            address: self.address,
            created_at: self.created_at,
        }
    }
}

/// Stored user record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct User {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub phone_num: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub created_at: SystemTime,
}

impl Display for User {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "User: {} {} | Contact: {} / {}",
            self.first_name,
            self.last_name,
            self.phone_num.as_deref().unwrap_or("N/A"),
            self.email.as_deref().unwrap_or("N/A")
        )
    }
}

/// One checkout event. Open while `returned_at` is `None`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Borrowing {
    pub borrowing_id: i64,
    pub book_id: BookId,
    pub user_id: UserId,
    pub borrowed_at: SystemTime,
    pub returned_at: Option<SystemTime>,
}

impl Borrowing {
    pub fn is_open(&self) -> bool {
        self.returned_at.is_none()
    }
}

/// Canonical key for case-insensitive title matching. Both backends compare
/// titles through this function so they agree on non-ASCII input.
pub fn fold_title(title: &str) -> String {
    title.trim().to_lowercase()
}

/// Outcome of changing a book's availability outside the borrowing log.
#[derive(Clone, Debug, PartialEq)]
pub enum ShelfChange {
    /// The stored flag changed; carries the updated book.
    Changed(Book),
    /// The book already had the requested availability.
    Unchanged(Book),
    /// The book has an open borrowing, so its availability is owned by the
    /// borrowing log. Nothing was written.
    OnLoan(Book),
    Missing,
}

/// Time source abstraction to make code testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Repository port for books and their checkout lifecycle.
///
/// Borrow and return live here rather than on a separate port because they
/// must change a book's availability and the borrowing log in one unit of
/// work. Every implementation keeps a book with an open borrowing
/// unavailable, whichever method writes it.
pub trait BookRepository: Send + Sync {
    /// Insert or replace the book with the same id.
    fn put_book(&self, book: Book) -> Result<(), CoreError>;
    fn get_book(&self, id: BookId) -> Result<Option<Book>, CoreError>;
    /// Look up a book by an already folded title (see [`fold_title`]).
    fn find_book_by_title(&self, folded_title: &str) -> Result<Option<Book>, CoreError>;
    fn list_books(&self, available_only: bool) -> Result<Vec<Book>, CoreError>;
    /// Replace an existing record. Returns `false` if no book has that id.
    fn update_book(&self, book: &Book) -> Result<bool, CoreError>;
    fn delete_book(&self, id: BookId) -> Result<bool, CoreError>;
    /// Set availability without opening or closing a borrowing. Refused with
    /// [`ShelfChange::OnLoan`] while the book has an open borrowing.
    fn set_availability(&self, id: BookId, available: bool) -> Result<ShelfChange, CoreError>;
    /// Atomically mark the book unavailable and open a borrowing.
    /// Returns `false` if the book is absent or already unavailable.
    fn borrow_book(&self, book_id: BookId, user_id: UserId, at: SystemTime)
        -> Result<bool, CoreError>;
    /// Atomically close the most recent open borrowing for the pair and mark
    /// the book available once no open borrowing remains for it. Returns
    /// `false` if the pair has no open borrowing.
    fn return_book(&self, book_id: BookId, user_id: UserId, at: SystemTime)
        -> Result<bool, CoreError>;
    fn list_borrowings(&self, open_only: bool) -> Result<Vec<Borrowing>, CoreError>;
}

/// Repository port for users.
pub trait UserRepository: Send + Sync {
    fn add_user(&self, user: NewUser) -> Result<UserId, CoreError>;
    fn get_user(&self, id: UserId) -> Result<Option<User>, CoreError>;
    fn list_users(&self) -> Result<Vec<User>, CoreError>;
}

/// Core infrastructure errors (no external error crates to keep deps at zero).
///
/// Domain outcomes such as "not found" or "already borrowed" are not errors;
/// they travel as `Option`/`bool` values.
#[derive(Debug)]
pub enum CoreError {
    /// The backing store could not be opened or initialized.
    StorageUnavailable(String),
    Repository(String),
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CoreError::StorageUnavailable(msg) => write!(f, "storage unavailable: {}", msg),
            CoreError::Repository(msg) => write!(f, "repository error: {}", msg),
        }
    }
}

impl Error for CoreError {}

pub mod adapters;
pub mod service;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserve_only_succeeds_when_available() {
        let mut book = Book::new(1, "Dune", "Herbert");
        assert!(book.reserve());
        assert!(!book.available);

        assert!(!book.reserve());
        assert!(!book.available);
    }

    #[test]
    fn release_always_makes_available() {
        let mut book = Book::new(1, "Dune", "Herbert");
        book.release();
        assert!(book.available);

        book.available = false;
        book.release();
        assert!(book.available);
    }

    #[test]
    fn book_display_defaults_genre() {
        let mut book = Book::new(1, "Dune", "Herbert");
        assert_eq!(
            book.to_string(),
            "'Dune' by Herbert | Genre: Unknown | Status: Available"
        );

        book.genre = Some("Sci-Fi".into());
        book.available = false;
        assert_eq!(
            book.to_string(),
            "'Dune' by Herbert | Genre: Sci-Fi | Status: Not Available"
        );
    }

    #[test]
    fn user_display_and_builder() {
        let user = NewUser::new("Jane", "Doe")
            .with_email("jane@example.com")
            .into_user(7);
        assert_eq!(user.user_id, 7);
        assert_eq!(
            user.to_string(),
            "User: Jane Doe | Contact: N/A / jane@example.com"
        );
    }

    #[test]
    fn fold_title_trims_and_lowercases() {
        assert_eq!(fold_title("  The Hobbit "), "the hobbit");
        assert_eq!(fold_title("ÉCLAIR"), "éclair");
    }
}
