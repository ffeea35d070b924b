//! sqlite-adapter — SQLite implementation of the catalog ports.
//!
//! Purpose
//! - Provide a durable, file-based catalog that survives restarts.
//! - Implements the `BookRepository` and `UserRepository` traits from the
//!   `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Timestamps are stored as RFC 3339 UTC strings with nanosecond precision,
//!   so they sort lexicographically in time order.
//! - Borrow and return each run inside one transaction; dropping the
//!   transaction without committing rolls every partial write back.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use domain::{
    fold_title, Book, BookId, BookRepository, Borrowing, CoreError, NewUser, ShelfChange, User,
    UserId, UserRepository,
};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info};

const BOOK_COLUMNS: &str = "book_id, title, author, genre, average_rating, isbn, language_code, rating_count, available";
const USER_COLUMNS: &str = "user_id, first_name, last_name, phone_num, email, address, created_at";
const BORROWING_COLUMNS: &str = "borrowing_id, book_id, user_id, borrowed_at, returned_at";

/// True while book `?1` has an open borrowing.
const ON_LOAN: &str =
    "EXISTS (SELECT 1 FROM borrowings WHERE book_id = ?1 AND returned_at IS NULL)";

/// Offset-less ISO-8601 forms written by other tools; read as UTC.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// SQLite-backed catalog.
pub struct SqliteRepo {
    conn: Mutex<Connection>,
}

impl SqliteRepo {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    ///
    /// Existing rows are never touched; opening the same file twice is safe.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path).map_err(|e| {
            CoreError::StorageUnavailable(format!("cannot open {}: {e}", path.display()))
        })?;
        info!(path = %path.display(), "opened sqlite catalog");
        Self::with_connection(conn)
    }

    /// Private in-process database, mostly useful for tests.
    pub fn in_memory() -> Result<Self, CoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| CoreError::StorageUnavailable(format!("cannot open in-memory db: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, CoreError> {
        init_schema(&conn).map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        register_functions(&conn)
            .map_err(|e| CoreError::StorageUnavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CoreError> {
        self.conn
            .lock()
            .map_err(|_| CoreError::Repository("mutex poisoned".into()))
    }
}

fn init_schema(conn: &Connection) -> Result<(), CoreError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS books (
            book_id INTEGER PRIMARY KEY,
            title TEXT NOT NULL,
            author TEXT NOT NULL,
            genre TEXT,
            average_rating REAL,
            isbn TEXT,
            language_code TEXT,
            rating_count INTEGER,
            available INTEGER NOT NULL DEFAULT 1
        );
        CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            phone_num TEXT,
            email TEXT,
            address TEXT,
            created_at TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS borrowings (
            borrowing_id INTEGER PRIMARY KEY AUTOINCREMENT,
            book_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            borrowed_at TEXT NOT NULL,
            returned_at TEXT,
            FOREIGN KEY (book_id) REFERENCES books(book_id),
            FOREIGN KEY (user_id) REFERENCES users(user_id)
        );
        CREATE INDEX IF NOT EXISTS idx_borrowings_open ON borrowings(book_id, user_id, returned_at);
        "#,
    )
    .map_err(map_sqerr)?;
    debug!("sqlite schema ready");
    Ok(())
}

/// `fold_title(text)` mirrors `domain::fold_title` so title matching is the
/// same Unicode-aware comparison the in-memory backend uses.
fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "fold_title",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let title: Option<String> = ctx.get(0)?;
            Ok(title.map(|t| fold_title(&t)))
        },
    )
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> CoreError {
    CoreError::Repository(format!("sqlite error: {e}"))
}

fn system_time_to_text(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn text_to_system_time(s: &str) -> Result<SystemTime, CoreError> {
    let rfc3339_err = match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => return Ok(SystemTime::from(dt.with_timezone(&Utc))),
        Err(e) => e,
    };
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|naive| SystemTime::from(naive.and_utc()))
        .ok_or_else(|| CoreError::Repository(format!("bad timestamp in db '{s}': {rfc3339_err}")))
}

fn row_to_book(row: &rusqlite::Row) -> Result<Book, CoreError> {
    let available: i64 = row.get(8).map_err(map_sqerr)?;
    Ok(Book {
        book_id: row.get(0).map_err(map_sqerr)?,
        title: row.get(1).map_err(map_sqerr)?,
        author: row.get(2).map_err(map_sqerr)?,
        genre: row.get(3).map_err(map_sqerr)?,
        average_rating: row.get(4).map_err(map_sqerr)?,
        isbn: row.get(5).map_err(map_sqerr)?,
        language_code: row.get(6).map_err(map_sqerr)?,
        rating_count: row.get(7).map_err(map_sqerr)?,
        available: available != 0,
    })
}

fn row_to_user(row: &rusqlite::Row) -> Result<User, CoreError> {
    let created_at: String = row.get(6).map_err(map_sqerr)?;
    Ok(User {
        user_id: row.get(0).map_err(map_sqerr)?,
        first_name: row.get(1).map_err(map_sqerr)?,
        last_name: row.get(2).map_err(map_sqerr)?,
        phone_num: row.get(3).map_err(map_sqerr)?,
        email: row.get(4).map_err(map_sqerr)?,
        address: row.get(5).map_err(map_sqerr)?,
        created_at: text_to_system_time(&created_at)?,
    })
}

fn row_to_borrowing(row: &rusqlite::Row) -> Result<Borrowing, CoreError> {
    let borrowed_at: String = row.get(3).map_err(map_sqerr)?;
    let returned_at: Option<String> = row.get(4).map_err(map_sqerr)?;
    Ok(Borrowing {
        borrowing_id: row.get(0).map_err(map_sqerr)?,
        book_id: row.get(1).map_err(map_sqerr)?,
        user_id: row.get(2).map_err(map_sqerr)?,
        borrowed_at: text_to_system_time(&borrowed_at)?,
        returned_at: returned_at
            .as_deref()
            .map(text_to_system_time)
            .transpose()?,
    })
}

/// Run a query and map every row, collecting into a `Vec`.
fn query_all<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Vec<T>, CoreError>
where
    P: rusqlite::Params,
    F: Fn(&rusqlite::Row) -> Result<T, CoreError>,
{
    let mut stmt = conn.prepare(sql).map_err(map_sqerr)?;
    let mut rows = stmt.query(params).map_err(map_sqerr)?;
    let mut out = Vec::new();
    while let Some(row) = rows.next().map_err(map_sqerr)? {
        out.push(f(row)?);
    }
    Ok(out)
}

fn query_one<T, P, F>(conn: &Connection, sql: &str, params: P, f: F) -> Result<Option<T>, CoreError>
where
    P: rusqlite::Params,
    F: Fn(&rusqlite::Row) -> Result<T, CoreError>,
{
    let mut stmt = conn.prepare(sql).map_err(map_sqerr)?;
    let mut rows = stmt.query(params).map_err(map_sqerr)?;
    match rows.next().map_err(map_sqerr)? {
        Some(row) => Ok(Some(f(row)?)),
        None => Ok(None),
    }
}

impl BookRepository for SqliteRepo {
    fn put_book(&self, book: Book) -> Result<(), CoreError> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT OR REPLACE INTO books ({BOOK_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, CASE WHEN {ON_LOAN} THEN 0 ELSE ?9 END)"
            ),
            params![
                book.book_id,
                book.title,
                book.author,
                book.genre,
                book.average_rating,
                book.isbn,
                book.language_code,
                book.rating_count,
                book.available as i64,
            ],
        )
        .map_err(map_sqerr)?;
        Ok(())
    }

    fn get_book(&self, id: BookId) -> Result<Option<Book>, CoreError> {
        let conn = self.conn()?;
        query_one(
            &conn,
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE book_id = ?1"),
            params![id],
            row_to_book,
        )
    }

    fn find_book_by_title(&self, folded_title: &str) -> Result<Option<Book>, CoreError> {
        let conn = self.conn()?;
        query_one(
            &conn,
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE fold_title(title) = ?1 ORDER BY book_id LIMIT 1"),
            params![folded_title],
            row_to_book,
        )
    }

    fn list_books(&self, available_only: bool) -> Result<Vec<Book>, CoreError> {
        let conn = self.conn()?;
        let sql = if available_only {
            format!("SELECT {BOOK_COLUMNS} FROM books WHERE available = 1 ORDER BY book_id")
        } else {
            format!("SELECT {BOOK_COLUMNS} FROM books ORDER BY book_id")
        };
        query_all(&conn, &sql, [], row_to_book)
    }

    fn update_book(&self, book: &Book) -> Result<bool, CoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                &format!(
                    "UPDATE books SET title = ?2, author = ?3, genre = ?4, average_rating = ?5,
                     isbn = ?6, language_code = ?7, rating_count = ?8,
                     available = CASE WHEN {ON_LOAN} THEN 0 ELSE ?9 END
                     WHERE book_id = ?1"
                ),
                params![
                    book.book_id,
                    book.title,
                    book.author,
                    book.genre,
                    book.average_rating,
                    book.isbn,
                    book.language_code,
                    book.rating_count,
                    book.available as i64,
                ],
            )
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn delete_book(&self, id: BookId) -> Result<bool, CoreError> {
        let conn = self.conn()?;
        let changed = conn
            .execute("DELETE FROM books WHERE book_id = ?1", params![id])
            .map_err(map_sqerr)?;
        Ok(changed > 0)
    }

    fn set_availability(&self, id: BookId, available: bool) -> Result<ShelfChange, CoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let Some(mut book) = query_one(
            &tx,
            &format!("SELECT {BOOK_COLUMNS} FROM books WHERE book_id = ?1"),
            params![id],
            row_to_book,
        )?
        else {
            return Ok(ShelfChange::Missing);
        };
        let on_loan: bool = tx
            .query_row(&format!("SELECT {ON_LOAN}"), params![id], |row| row.get(0))
            .map_err(map_sqerr)?;
        if on_loan {
            debug!(book_id = id, "availability change refused: book on loan");
            return Ok(ShelfChange::OnLoan(book));
        }
        if book.available == available {
            return Ok(ShelfChange::Unchanged(book));
        }
        tx.execute(
            "UPDATE books SET available = ?2 WHERE book_id = ?1",
            params![id, available as i64],
        )
        .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        book.available = available;
        Ok(ShelfChange::Changed(book))
    }

    fn borrow_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let available: Option<i64> = tx
            .query_row(
                "SELECT available FROM books WHERE book_id = ?1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqerr)?;
        if available.unwrap_or(0) == 0 {
            debug!(book_id, user_id, "borrow refused: book missing or out");
            return Ok(false);
        }
        tx.execute(
            "UPDATE books SET available = 0 WHERE book_id = ?1",
            params![book_id],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            "INSERT INTO borrowings (book_id, user_id, borrowed_at) VALUES (?1, ?2, ?3)",
            params![book_id, user_id, system_time_to_text(at)],
        )
        .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        debug!(book_id, user_id, "borrow recorded");
        Ok(true)
    }

    fn return_book(
        &self,
        book_id: BookId,
        user_id: UserId,
        at: SystemTime,
    ) -> Result<bool, CoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction().map_err(map_sqerr)?;
        let open: Option<i64> = tx
            .query_row(
                "SELECT borrowing_id FROM borrowings
                 WHERE book_id = ?1 AND user_id = ?2 AND returned_at IS NULL
                 ORDER BY borrowed_at DESC, borrowing_id DESC
                 LIMIT 1",
                params![book_id, user_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(map_sqerr)?;
        let Some(borrowing_id) = open else {
            debug!(book_id, user_id, "return refused: no open borrowing");
            return Ok(false);
        };
        tx.execute(
            "UPDATE borrowings SET returned_at = ?1 WHERE borrowing_id = ?2",
            params![system_time_to_text(at), borrowing_id],
        )
        .map_err(map_sqerr)?;
        tx.execute(
            &format!("UPDATE books SET available = 1 WHERE book_id = ?1 AND NOT {ON_LOAN}"),
            params![book_id],
        )
        .map_err(map_sqerr)?;
        tx.commit().map_err(map_sqerr)?;
        debug!(book_id, user_id, borrowing_id, "return recorded");
        Ok(true)
    }

    fn list_borrowings(&self, open_only: bool) -> Result<Vec<Borrowing>, CoreError> {
        let conn = self.conn()?;
        let sql = if open_only {
            format!("SELECT {BORROWING_COLUMNS} FROM borrowings WHERE returned_at IS NULL ORDER BY borrowing_id")
        } else {
            format!("SELECT {BORROWING_COLUMNS} FROM borrowings ORDER BY borrowing_id")
        };
        query_all(&conn, &sql, [], row_to_borrowing)
    }
}

impl UserRepository for SqliteRepo {
    fn add_user(&self, user: NewUser) -> Result<UserId, CoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (first_name, last_name, phone_num, email, address, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                user.first_name,
                user.last_name,
                user.phone_num,
                user.email,
                user.address,
                system_time_to_text(user.created_at),
            ],
        )
        .map_err(map_sqerr)?;
        Ok(conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, CoreError> {
        let conn = self.conn()?;
        query_one(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1"),
            params![id],
            row_to_user,
        )
    }

    fn list_users(&self) -> Result<Vec<User>, CoreError> {
        let conn = self.conn()?;
        query_all(
            &conn,
            &format!("SELECT {USER_COLUMNS} FROM users ORDER BY user_id"),
            [],
            row_to_user,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    fn tmp_db() -> (SqliteRepo, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.db");
        let repo = SqliteRepo::open(path).unwrap();
        (repo, dir)
    }

    fn at(secs: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs)
    }

    fn full_book() -> Book {
        Book {
            book_id: 42,
            title: "The Hobbit".into(),
            author: "J. R. R. Tolkien".into(),
            genre: Some("Fantasy".into()),
            average_rating: Some(4.27),
            isbn: Some("0618260307".into()),
            language_code: Some("eng".into()),
            rating_count: Some(2_530_894),
            available: true,
        }
    }

    fn open_borrowings_for(repo: &SqliteRepo, book_id: BookId) -> usize {
        repo.list_borrowings(true)
            .unwrap()
            .into_iter()
            .filter(|b| b.book_id == book_id)
            .count()
    }

    #[test]
    fn put_get_roundtrip() {
        let (repo, _dir) = tmp_db();
        let book = full_book();
        repo.put_book(book.clone()).unwrap();

        assert_eq!(repo.get_book(42).unwrap(), Some(book.clone()));
        assert_eq!(
            repo.find_book_by_title(&fold_title("  the hobbit ")).unwrap(),
            Some(book)
        );
    }

    #[test]
    fn title_lookup_folds_unicode() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "Éloge de l'ombre", "Tanizaki")).unwrap();
        let got = repo.find_book_by_title(&fold_title("ÉLOGE DE L'OMBRE")).unwrap();
        assert_eq!(got.map(|b| b.book_id), Some(1));
    }

    #[test]
    fn put_replaces_existing_id() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "Old", "A")).unwrap();
        repo.put_book(Book::new(1, "New", "A")).unwrap();
        let books = repo.list_books(false).unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].title, "New");
    }

    #[test]
    fn reopening_keeps_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keep.db");
        {
            let repo = SqliteRepo::open(&path).unwrap();
            repo.put_book(Book::new(1, "A", "B")).unwrap();
            repo.add_user(NewUser::new("J", "D")).unwrap();
        }
        let repo = SqliteRepo::open(&path).unwrap();
        assert_eq!(repo.list_books(false).unwrap().len(), 1);
        assert_eq!(repo.list_users().unwrap().len(), 1);
    }

    #[test]
    fn open_in_missing_directory_is_storage_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no-such-dir").join("t.db");
        let err = SqliteRepo::open(path).err().unwrap();
        assert!(matches!(err, CoreError::StorageUnavailable(_)));
    }

    #[test]
    fn list_books_filters_available() {
        let (repo, _dir) = tmp_db();
        let mut out = Book::new(2, "Out", "B");
        out.available = false;
        repo.put_book(Book::new(1, "In", "A")).unwrap();
        repo.put_book(out).unwrap();

        let available = repo.list_books(true).unwrap();
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].book_id, 1);
        assert_eq!(repo.list_books(false).unwrap().len(), 2);
    }

    #[test]
    fn update_and_delete() {
        let (repo, _dir) = tmp_db();
        let mut book = Book::new(1, "A", "B");
        assert!(!repo.update_book(&book).unwrap());

        repo.put_book(book.clone()).unwrap();
        book.genre = Some("Drama".into());
        book.available = false;
        assert!(repo.update_book(&book).unwrap());
        assert_eq!(repo.get_book(1).unwrap(), Some(book));

        assert!(repo.delete_book(1).unwrap());
        assert!(!repo.delete_book(1).unwrap());
    }

    #[test]
    fn user_roundtrip_keeps_created_at() {
        let (repo, _dir) = tmp_db();
        let new_user = NewUser::new("J", "D")
            .with_phone("555-0100")
            .with_address("1 Main St");
        let id = repo.add_user(new_user.clone()).unwrap();
        assert!(id > 0);

        let users = repo.list_users().unwrap();
        assert_eq!(users, vec![new_user.into_user(id)]);
        assert_eq!(repo.get_user(id).unwrap(), Some(users[0].clone()));
        assert_eq!(repo.get_user(id + 1).unwrap(), None);
    }

    #[test]
    fn borrow_and_return_pairing() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "A", "B")).unwrap();
        let user = repo.add_user(NewUser::new("J", "D")).unwrap();

        assert!(repo.borrow_book(1, user, at(10)).unwrap());
        assert!(!repo.get_book(1).unwrap().unwrap().available);
        assert_eq!(open_borrowings_for(&repo, 1), 1);

        assert!(repo.return_book(1, user, at(20)).unwrap());
        assert!(repo.get_book(1).unwrap().unwrap().available);
        assert_eq!(open_borrowings_for(&repo, 1), 0);

        let history = repo.list_borrowings(false).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].borrowed_at, at(10));
        assert_eq!(history[0].returned_at, Some(at(20)));
    }

    #[test]
    fn borrow_unavailable_writes_nothing() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "A", "B")).unwrap();
        assert!(repo.borrow_book(1, 1, at(1)).unwrap());
        assert!(!repo.borrow_book(1, 2, at(2)).unwrap());
        assert!(!repo.borrow_book(99, 2, at(2)).unwrap());
        assert_eq!(repo.list_borrowings(false).unwrap().len(), 1);
    }

    #[test]
    fn return_without_open_borrowing_changes_nothing() {
        let (repo, _dir) = tmp_db();
        let mut book = Book::new(1, "A", "B");
        book.available = false;
        repo.put_book(book).unwrap();

        assert!(!repo.return_book(1, 1, at(5)).unwrap());
        assert!(!repo.get_book(1).unwrap().unwrap().available);

        // Another user's borrowing does not count.
        repo.put_book(Book::new(2, "C", "D")).unwrap();
        assert!(repo.borrow_book(2, 1, at(6)).unwrap());
        assert!(!repo.return_book(2, 2, at(7)).unwrap());
        assert_eq!(open_borrowings_for(&repo, 2), 1);
    }

    #[test]
    fn return_closes_most_recent_open_borrowing() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "A", "B")).unwrap();
        assert!(repo.borrow_book(1, 7, at(100)).unwrap());

        // Simulate a stale open row left behind by an earlier checkout.
        {
            let conn = repo.conn().unwrap();
            conn.execute(
                "INSERT INTO borrowings (book_id, user_id, borrowed_at) VALUES (1, 7, ?1)",
                params![system_time_to_text(at(50))],
            )
            .unwrap();
        }

        assert!(repo.return_book(1, 7, at(200)).unwrap());
        let open = repo.list_borrowings(true).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].borrowed_at, at(50));
        // The stale row still holds the book.
        assert!(!repo.get_book(1).unwrap().unwrap().available);

        assert!(repo.return_book(1, 7, at(300)).unwrap());
        assert!(repo.get_book(1).unwrap().unwrap().available);
    }

    #[test]
    fn open_borrowing_keeps_book_unavailable() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "Dune", "Herbert")).unwrap();
        assert!(repo.borrow_book(1, 1, at(1)).unwrap());

        assert!(matches!(
            repo.set_availability(1, true).unwrap(),
            ShelfChange::OnLoan(_)
        ));
        let mut edited = repo.get_book(1).unwrap().unwrap();
        edited.available = true;
        edited.genre = Some("SF".into());
        assert!(repo.update_book(&edited).unwrap());
        let stored = repo.get_book(1).unwrap().unwrap();
        assert_eq!(stored.genre.as_deref(), Some("SF"));
        assert!(!stored.available);

        repo.put_book(Book::new(1, "Dune", "Herbert")).unwrap();
        assert!(!repo.borrow_book(1, 2, at(2)).unwrap());
        assert_eq!(open_borrowings_for(&repo, 1), 1);
    }

    #[test]
    fn set_availability_outcomes() {
        let (repo, _dir) = tmp_db();
        repo.put_book(Book::new(1, "A", "B")).unwrap();
        assert_eq!(repo.set_availability(9, false).unwrap(), ShelfChange::Missing);
        assert!(matches!(
            repo.set_availability(1, true).unwrap(),
            ShelfChange::Unchanged(_)
        ));
        let ShelfChange::Changed(book) = repo.set_availability(1, false).unwrap() else {
            panic!("expected a change");
        };
        assert!(!book.available);
        assert_eq!(repo.get_book(1).unwrap(), Some(book));
        assert!(repo.list_borrowings(false).unwrap().is_empty());
    }

    #[test]
    fn reads_iso_timestamps_without_offset() {
        let (repo, _dir) = tmp_db();
        {
            let conn = repo.conn().unwrap();
            conn.execute(
                "INSERT INTO users (first_name, last_name, created_at)
                 VALUES ('Ada', 'Lovelace', '2024-01-01T12:00:00.123456')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO borrowings (book_id, user_id, borrowed_at, returned_at)
                 VALUES (1, 1, '2024-01-01T12:00:00', '2024-01-02 08:30:00')",
                [],
            )
            .unwrap();
        }

        let users = repo.list_users().unwrap();
        let expected = UNIX_EPOCH + Duration::new(1_704_110_400, 123_456_000);
        assert_eq!(users[0].created_at, expected);

        let loans = repo.list_borrowings(false).unwrap();
        assert_eq!(loans[0].borrowed_at, at(1_704_110_400));
        assert_eq!(loans[0].returned_at, Some(at(1_704_184_200)));
    }

    #[test]
    fn in_memory_database_works() {
        let repo = SqliteRepo::in_memory().unwrap();
        repo.put_book(Book::new(1, "A", "B")).unwrap();
        assert_eq!(repo.list_books(false).unwrap().len(), 1);
    }

    #[test]
    fn timestamps_keep_nanoseconds() {
        let t = UNIX_EPOCH + Duration::new(1_700_000_000, 123_456_789);
        let text = system_time_to_text(t);
        assert_eq!(text, "2023-11-14T22:13:20.123456789Z");
        assert_eq!(text_to_system_time(&text).unwrap(), t);
        assert!(text_to_system_time("yesterday").is_err());
    }
}
