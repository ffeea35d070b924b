use crate::{
    fold_title, Book, BookId, BookRepository, Borrowing, Clock, CoreError, NewUser, ShelfChange,
    User, UserId, UserRepository,
};

/// Result of reserving a book by title.
#[derive(Clone, Debug, PartialEq)]
pub enum ReserveOutcome {
    Reserved(Book),
    AlreadyReserved(Book),
    /// Checked out through `borrow_book`; only `return_book_by_id` frees it.
    OnLoan(Book),
    NotFound,
}

/// Result of putting a book back on the shelf by title.
#[derive(Clone, Debug, PartialEq)]
pub enum ReleaseOutcome {
    Released(Book),
    OnLoan(Book),
    NotFound,
}

/// Application service exposing the catalog operations.
///
/// It stays generic over the backend and the clock, so the same contract runs
/// against the in-memory repository, SQLite, or whatever the caller selected
/// at startup. Domain outcomes come back as `Option`/`bool`; only backend
/// failures are `Err`.
pub struct CatalogService<R: BookRepository + UserRepository, C: Clock> {
    repo: R,
    clock: C,
}

impl<R: BookRepository + UserRepository, C: Clock> CatalogService<R, C> {
    pub fn new(repo: R, clock: C) -> Self {
        Self { repo, clock }
    }

    /// Access the underlying backend.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Add a book, replacing any stored book with the same id.
    pub fn add_book(&self, book: Book) -> Result<(), CoreError> {
        self.repo.put_book(book)
    }

    /// Add every book from an iterator, returning how many were stored.
    pub fn add_books<I: IntoIterator<Item = Book>>(&self, books: I) -> Result<usize, CoreError> {
        let mut count = 0;
        for book in books {
            self.repo.put_book(book)?;
            count += 1;
        }
        Ok(count)
    }

    /// Register a user and return the id the backend assigned.
    pub fn add_user(&self, user: NewUser) -> Result<UserId, CoreError> {
        self.repo.add_user(user)
    }

    /// Case-insensitive lookup; surrounding whitespace is ignored on both sides.
    pub fn find_book_by_title(&self, title: &str) -> Result<Option<Book>, CoreError> {
        self.repo.find_book_by_title(&fold_title(title))
    }

    pub fn find_book_by_id(&self, id: BookId) -> Result<Option<Book>, CoreError> {
        self.repo.get_book(id)
    }

    pub fn find_user_by_id(&self, id: UserId) -> Result<Option<User>, CoreError> {
        self.repo.get_user(id)
    }

    pub fn list_books(&self, available_only: bool) -> Result<Vec<Book>, CoreError> {
        self.repo.list_books(available_only)
    }

    pub fn list_users(&self) -> Result<Vec<User>, CoreError> {
        self.repo.list_users()
    }

    /// Replace the stored record with the same id. Returns `false` and changes
    /// nothing when the id is unknown.
    pub fn update_book(&self, book: &Book) -> Result<bool, CoreError> {
        self.repo.update_book(book)
    }

    pub fn delete_book(&self, id: BookId) -> Result<bool, CoreError> {
        self.repo.delete_book(id)
    }

    /// Check a book out to a user. Fails (returns `false`) if the book does not
    /// exist or is already out.
    pub fn borrow_book(&self, book_id: BookId, user_id: UserId) -> Result<bool, CoreError> {
        self.repo.borrow_book(book_id, user_id, self.clock.now())
    }

    /// Check a book back in. Requires an open borrowing for this exact
    /// book/user pair.
    pub fn return_book_by_id(&self, book_id: BookId, user_id: UserId) -> Result<bool, CoreError> {
        self.repo.return_book(book_id, user_id, self.clock.now())
    }

    pub fn list_borrowings(&self, open_only: bool) -> Result<Vec<Borrowing>, CoreError> {
        self.repo.list_borrowings(open_only)
    }

    /// Take a book off the shelf by title without recording a borrower.
    pub fn reserve_by_title(&self, title: &str) -> Result<ReserveOutcome, CoreError> {
        let Some(book) = self.find_book_by_title(title)? else {
            return Ok(ReserveOutcome::NotFound);
        };
        Ok(match self.repo.set_availability(book.book_id, false)? {
            ShelfChange::Changed(book) => ReserveOutcome::Reserved(book),
            ShelfChange::Unchanged(book) => ReserveOutcome::AlreadyReserved(book),
            ShelfChange::OnLoan(book) => ReserveOutcome::OnLoan(book),
            ShelfChange::Missing => ReserveOutcome::NotFound,
        })
    }

    /// Put a reserved book back on the shelf by title. A book out on loan is
    /// left alone.
    pub fn release_by_title(&self, title: &str) -> Result<ReleaseOutcome, CoreError> {
        let Some(book) = self.find_book_by_title(title)? else {
            return Ok(ReleaseOutcome::NotFound);
        };
        Ok(match self.repo.set_availability(book.book_id, true)? {
            ShelfChange::Changed(book) | ShelfChange::Unchanged(book) => {
                ReleaseOutcome::Released(book)
            }
            ShelfChange::OnLoan(book) => ReleaseOutcome::OnLoan(book),
            ShelfChange::Missing => ReleaseOutcome::NotFound,
        })
    }
}
