//! Console rendering: plain tables for people, JSON for scripts.

use std::io::Write;
use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{Book, Borrowing, User};
use serde::Serialize;

use crate::error::CliError;

#[derive(Serialize)]
struct BookView<'a> {
    book_id: i64,
    title: &'a str,
    author: &'a str,
    genre: Option<&'a str>,
    average_rating: Option<f64>,
    isbn: Option<&'a str>,
    language_code: Option<&'a str>,
    rating_count: Option<i64>,
    available: bool,
}

impl<'a> From<&'a Book> for BookView<'a> {
    fn from(b: &'a Book) -> Self {
        Self {
            book_id: b.book_id,
            title: &b.title,
            author: &b.author,
            genre: b.genre.as_deref(),
            average_rating: b.average_rating,
            isbn: b.isbn.as_deref(),
            language_code: b.language_code.as_deref(),
            rating_count: b.rating_count,
            available: b.available,
        }
    }
}

#[derive(Serialize)]
struct UserView<'a> {
    user_id: i64,
    first_name: &'a str,
    last_name: &'a str,
    phone_num: Option<&'a str>,
    email: Option<&'a str>,
    address: Option<&'a str>,
    created_at: String,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(u: &'a User) -> Self {
        Self {
            user_id: u.user_id,
            first_name: &u.first_name,
            last_name: &u.last_name,
            phone_num: u.phone_num.as_deref(),
            email: u.email.as_deref(),
            address: u.address.as_deref(),
            created_at: system_time_to_rfc3339(u.created_at),
        }
    }
}

#[derive(Serialize)]
struct BorrowingView {
    borrowing_id: i64,
    book_id: i64,
    user_id: i64,
    borrowed_at: String,
    returned_at: Option<String>,
}

impl From<&Borrowing> for BorrowingView {
    fn from(b: &Borrowing) -> Self {
        Self {
            borrowing_id: b.borrowing_id,
            book_id: b.book_id,
            user_id: b.user_id,
            borrowed_at: system_time_to_rfc3339(b.borrowed_at),
            returned_at: b.returned_at.map(system_time_to_rfc3339),
        }
    }
}

/// Convert SystemTime to RFC3339 string (seconds precision, UTC).
fn system_time_to_rfc3339(t: SystemTime) -> String {
    DateTime::<Utc>::from(t).to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_json<W: Write, T: Serialize>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

pub fn print_books<W: Write>(out: &mut W, books: &[Book], json: bool) -> Result<(), CliError> {
    if json {
        let views: Vec<BookView> = books.iter().map(BookView::from).collect();
        return write_json(out, &views);
    }
    if books.is_empty() {
        writeln!(out, "No books found.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<8} {:<40} {:<25} {:<15} {}",
        "ID", "Title", "Author", "Genre", "Status"
    )?;
    for book in books {
        let status = if book.available { "Available" } else { "Reserved" };
        writeln!(
            out,
            "{:<8} {:<40} {:<25} {:<15} {}",
            book.book_id,
            truncate(&book.title, 40),
            truncate(&book.author, 25),
            truncate(book.genre.as_deref().unwrap_or("N/A"), 15),
            status
        )?;
    }
    writeln!(out, "\nTotal: {} books", books.len())?;
    Ok(())
}

pub fn print_users<W: Write>(out: &mut W, users: &[User], json: bool) -> Result<(), CliError> {
    if json {
        let views: Vec<UserView> = users.iter().map(UserView::from).collect();
        return write_json(out, &views);
    }
    if users.is_empty() {
        writeln!(out, "No users found.")?;
        return Ok(());
    }
    writeln!(out, "{:<8} {:<30} {:<18} {}", "ID", "Name", "Phone", "Email")?;
    for user in users {
        writeln!(
            out,
            "{:<8} {:<30} {:<18} {}",
            user.user_id,
            truncate(&format!("{} {}", user.first_name, user.last_name), 30),
            user.phone_num.as_deref().unwrap_or("N/A"),
            user.email.as_deref().unwrap_or("N/A")
        )?;
    }
    writeln!(out, "\nTotal: {} users", users.len())?;
    Ok(())
}

pub fn print_borrowings<W: Write>(
    out: &mut W,
    borrowings: &[Borrowing],
    json: bool,
) -> Result<(), CliError> {
    if json {
        let views: Vec<BorrowingView> = borrowings.iter().map(BorrowingView::from).collect();
        return write_json(out, &views);
    }
    if borrowings.is_empty() {
        writeln!(out, "No loans found.")?;
        return Ok(());
    }
    writeln!(
        out,
        "{:<6} {:<8} {:<8} {:<22} {}",
        "Loan", "Book", "User", "Borrowed", "Returned"
    )?;
    for b in borrowings {
        let view = BorrowingView::from(b);
        writeln!(
            out,
            "{:<6} {:<8} {:<8} {:<22} {}",
            view.borrowing_id,
            view.book_id,
            view.user_id,
            view.borrowed_at,
            view.returned_at.as_deref().unwrap_or("-")
        )?;
    }
    Ok(())
}

/// Cut `s` to at most `width` characters, marking the cut with `…`.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        s.to_string()
    } else {
        let mut cut: String = s.chars().take(width.saturating_sub(1)).collect();
        cut.push('…');
        cut
    }
}
