use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use crate::{
    fold_title, Book, BookId, BookRepository, Borrowing, CoreError, NewUser, ShelfChange, User,
    UserId, UserRepository,
};

/// Ephemeral catalog kept in process memory; lost on exit.
///
/// Books and users are held in insertion order. A single mutex guards the
/// whole state so a borrow or return updates the book and the borrowing log
/// together.
pub struct InMemoryRepo {
    inner: Mutex<State>,
}

#[derive(Default)]
struct State {
    books: Vec<Book>,
    users: Vec<User>,
    borrowings: Vec<Borrowing>,
    last_user_id: UserId,
    last_borrowing_id: i64,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> Result<MutexGuard<'_, State>, CoreError> {
        self.inner
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

impl Default for InMemoryRepo {
    fn default() -> Self {
        Self::new()
    }
}

impl State {
    fn book_mut(&mut self, id: BookId) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.book_id == id)
    }

    fn on_loan(&self, id: BookId) -> bool {
        self.borrowings
            .iter()
            .any(|b| b.book_id == id && b.is_open())
    }

    /// Store `book` over the record with the same id, if any. A book with an
    /// open borrowing stays unavailable.
    fn write_book(&mut self, mut book: Book) -> bool {
        if self.on_loan(book.book_id) {
            book.available = false;
        }
        match self.book_mut(book.book_id) {
            Some(existing) => {
                *existing = book;
                true
            }
            None => {
                self.books.push(book);
                false
            }
        }
    }
}

impl BookRepository for InMemoryRepo {
    fn put_book(&self, book: Book) -> Result<(), CoreError> {
        let mut state = self.state()?;
        state.write_book(book);
        Ok(())
    }

    fn get_book(&self, id: BookId) -> Result<Option<Book>, CoreError> {
        let state = self.state()?;
        Ok(state.books.iter().find(|b| b.book_id == id).cloned())
    }

    fn find_book_by_title(&self, folded_title: &str) -> Result<Option<Book>, CoreError> {
        let state = self.state()?;
        Ok(state
            .books
            .iter()
            .filter(|b| fold_title(&b.title) == folded_title)
            .min_by_key(|b| b.book_id)
            .cloned())
    }

    fn list_books(&self, available_only: bool) -> Result<Vec<Book>, CoreError> {
        let state = self.state()?;
        Ok(state
            .books
            .iter()
            .filter(|b| !available_only || b.available)
            .cloned()
            .collect())
    }

    fn update_book(&self, book: &Book) -> Result<bool, CoreError> {
        let mut state = self.state()?;
        if state.book_mut(book.book_id).is_none() {
            return Ok(false);
        }
        Ok(state.write_book(book.clone()))
    }

    fn delete_book(&self, id: BookId) -> Result<bool, CoreError> {
        let mut state = self.state()?;
        let before = state.books.len();
        state.books.retain(|b| b.book_id != id);
        Ok(state.books.len() != before)
    }

    fn set_availability(&self, id: BookId, available: bool) -> Result<ShelfChange, CoreError> {
        let mut state = self.state()?;
        let on_loan = state.on_loan(id);
        let Some(book) = state.book_mut(id) else {
            return Ok(ShelfChange::Missing);
        };
        if on_loan {
            return Ok(ShelfChange::OnLoan(book.clone()));
        }
        if book.available == available {
            return Ok(ShelfChange::Unchanged(book.clone()));
        }
        book.available = available;
        Ok(ShelfChange::Changed(book.clone()))
    }

    fn borrow_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        let mut state = self.state()?;
        let reserved = match state.book_mut(book_id) {
            Some(book) => book.reserve(),
            None => false,
        };
        if !reserved {
            return Ok(false);
        }
        state.last_borrowing_id += 1;
        let borrowing_id = state.last_borrowing_id;
        state.borrowings.push(Borrowing {
            borrowing_id,
            book_id,
            user_id,
            borrowed_at: at,
            returned_at: None,
        });
        Ok(true)
    }

    fn return_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        let mut state = self.state()?;
        // Most recently opened first; ties resolved by the later id.
        let open = state
            .borrowings
            .iter_mut()
            .filter(|b| b.book_id == book_id && b.user_id == user_id && b.is_open())
            .max_by(|a, b| {
                a.borrowed_at
                    .cmp(&b.borrowed_at)
                    .then(a.borrowing_id.cmp(&b.borrowing_id))
            });
        match open {
            Some(borrowing) => borrowing.returned_at = Some(at),
            None => return Ok(false),
        }
        if !state.on_loan(book_id) {
            if let Some(book) = state.book_mut(book_id) {
                book.release();
            }
        }
        Ok(true)
    }

    fn list_borrowings(&self, open_only: bool) -> Result<Vec<Borrowing>, CoreError> {
        let state = self.state()?;
        Ok(state
            .borrowings
            .iter()
            .filter(|b| !open_only || b.is_open())
            .cloned()
            .collect())
    }
}

impl UserRepository for InMemoryRepo {
    fn add_user(&self, user: NewUser) -> Result<UserId, CoreError> {
        let mut state = self.state()?;
        state.last_user_id += 1;
        let id = state.last_user_id;
        state.users.push(user.into_user(id));
        Ok(id)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, CoreError> {
        let state = self.state()?;
        Ok(state.users.iter().find(|u| u.user_id == id).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>, CoreError> {
        let state = self.state()?;
        Ok(state.users.clone())
    }
}
