//! csv-loader — bulk ingestion of books from delimited files.
//!
//! The loader is forgiving about individual rows and strict about the
//! document: a row missing its title or author is skipped, a malformed
//! numeric or boolean field falls back to its default, but a file that cannot
//! be read or decoded at all is an error.
//!
//! Recognized columns: `title`, `author` (required); `genre`,
//! `average_rating`, `isbn` / `ISBN`, `language_code`, `rating_count`,
//! `available`, `book_id` (optional). Unknown columns are ignored.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use domain::{Book, BookId};
use tracing::{debug, info};

/// Errors that abort a whole load.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("malformed csv: {0}")]
    Csv(#[from] csv::Error),
}

/// Books parsed from one file plus the id counter to continue from.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedBooks {
    pub books: Vec<Book>,
    /// First id that an auto-assigned book in a follow-up load should use.
    pub next_id: BookId,
    /// Rows dropped for a blank title or author.
    pub skipped: usize,
}

/// Load books from a CSV file on disk. Rows without a `book_id` get sequential
/// ids starting at `starting_id`.
pub fn load_books_from_csv<P: AsRef<Path>>(
    path: P,
    starting_id: BookId,
) -> Result<LoadedBooks, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Io {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    let loaded = load_books_from_reader(file, starting_id)?;
    info!(
        path = %path.display(),
        books = loaded.books.len(),
        skipped = loaded.skipped,
        "csv loaded"
    );
    Ok(loaded)
}

/// Load books from any reader producing CSV with a header row.
pub fn load_books_from_reader<R: Read>(
    reader: R,
    starting_id: BookId,
) -> Result<LoadedBooks, LoadError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::new(rdr.headers()?);

    let mut books = Vec::new();
    let mut next_id = starting_id;
    let mut skipped = 0;

    for record in rdr.records() {
        let record = record?;
        let row = Row {
            columns: &columns,
            record: &record,
        };

        let (Some(title), Some(author)) = (row.text("title"), row.text("author")) else {
            skipped += 1;
            debug!(line = record.position().map(|p| p.line()), "skipping row without title/author");
            continue;
        };

        let book_id = row.parsed::<BookId>("book_id").unwrap_or(next_id);
        books.push(Book {
            book_id,
            title,
            author,
            genre: row.text("genre"),
            average_rating: row.parsed("average_rating"),
            isbn: row.text("isbn").or_else(|| row.text("ISBN")),
            language_code: row.text("language_code"),
            rating_count: row.parsed("rating_count"),
            available: row.raw("available").and_then(parse_bool).unwrap_or(true),
        });
        next_id = next_id.max(book_id.saturating_add(1));
    }

    Ok(LoadedBooks {
        books,
        next_id,
        skipped,
    })
}

/// Map the loose truthy/falsy tokens a spreadsheet export tends to contain.
fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

/// Header name to field index. The first occurrence of a name wins.
struct Columns(HashMap<String, usize>);

impl Columns {
    fn new(headers: &csv::StringRecord) -> Self {
        let mut map = HashMap::new();
        for (idx, name) in headers.iter().enumerate() {
            map.entry(name.to_string()).or_insert(idx);
        }
        Self(map)
    }
}

struct Row<'a> {
    columns: &'a Columns,
    record: &'a csv::StringRecord,
}

impl Row<'_> {
    fn raw(&self, name: &str) -> Option<&str> {
        let idx = *self.columns.0.get(name)?;
        self.record.get(idx)
    }

    /// Trimmed field, `None` when missing or blank.
    fn text(&self, name: &str) -> Option<String> {
        let value = self.raw(name)?.trim();
        (!value.is_empty()).then(|| value.to_string())
    }

    /// Trimmed field parsed as `T`, `None` when missing, blank, or malformed.
    fn parsed<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.raw(name)?.trim().parse().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn load(csv: &str, starting_id: BookId) -> LoadedBooks {
        load_books_from_reader(csv.as_bytes(), starting_id).unwrap()
    }

    #[test]
    fn skips_rows_missing_title_or_author() {
        let loaded = load(
            "title,author,available\nDune,Herbert,yes\n,X,yes\nEmma,  ,no\n",
            1,
        );
        assert_eq!(loaded.books.len(), 1);
        assert_eq!(loaded.skipped, 2);
        let dune = &loaded.books[0];
        assert_eq!(dune.title, "Dune");
        assert!(dune.available);
    }

    #[test]
    fn available_tokens() {
        let loaded = load(
            "title,author,available\nA,X,0\nB,X,No\nC,X,TRUE\nD,X,maybe\nE,X,\n",
            1,
        );
        let flags: Vec<bool> = loaded.books.iter().map(|b| b.available).collect();
        assert_eq!(flags, vec![false, false, true, true, true]);
    }

    #[test]
    fn sequential_ids_without_book_id_column() {
        let loaded = load("title,author\nA,X\nB,Y\nC,Z\n", 10);
        let ids: Vec<BookId> = loaded.books.iter().map(|b| b.book_id).collect();
        assert_eq!(ids, vec![10, 11, 12]);
        assert_eq!(loaded.next_id, 13);
    }

    #[test]
    fn explicit_higher_id_pushes_counter() {
        let loaded = load("book_id,title,author\n,A,X\n50,B,Y\nbad,C,Z\n", 1);
        let ids: Vec<BookId> = loaded.books.iter().map(|b| b.book_id).collect();
        assert_eq!(ids, vec![1, 50, 51]);
        assert_eq!(loaded.next_id, 52);
    }

    #[test]
    fn optional_fields_are_parsed_or_dropped() {
        let loaded = load(
            "title,author,genre,average_rating,ISBN,language_code,rating_count\n\
             A,X, Fantasy ,4.5,123, eng ,10\n\
             B,Y,,n/a,,,many\n",
            1,
        );
        let a = &loaded.books[0];
        assert_eq!(a.genre.as_deref(), Some("Fantasy"));
        assert_eq!(a.average_rating, Some(4.5));
        assert_eq!(a.isbn.as_deref(), Some("123"));
        assert_eq!(a.language_code.as_deref(), Some("eng"));
        assert_eq!(a.rating_count, Some(10));

        let b = &loaded.books[1];
        assert_eq!(b.genre, None);
        assert_eq!(b.average_rating, None);
        assert_eq!(b.isbn, None);
        assert_eq!(b.rating_count, None);
    }

    #[test]
    fn lowercase_isbn_preferred_then_uppercase() {
        let loaded = load("title,author,isbn,ISBN\nA,X,111,222\nB,Y,,333\n", 1);
        assert_eq!(loaded.books[0].isbn.as_deref(), Some("111"));
        assert_eq!(loaded.books[1].isbn.as_deref(), Some("333"));
    }

    #[test]
    fn short_rows_are_tolerated() {
        let loaded = load("title,author,genre\nA,X\n", 1);
        assert_eq!(loaded.books.len(), 1);
        assert_eq!(loaded.books[0].genre, None);
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_books_from_csv(dir.path().join("nope.csv"), 1).unwrap_err();
        assert!(matches!(err, LoadError::NotFound(_)));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("books.csv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "title,author").unwrap();
        writeln!(file, "Dune,Herbert").unwrap();
        drop(file);

        let loaded = load_books_from_csv(&path, 7).unwrap();
        assert_eq!(loaded.books, vec![Book::new(7, "Dune", "Herbert")]);
    }

    #[test]
    fn invalid_utf8_is_an_error() {
        let bytes: &[u8] = b"title,author\n\xff\xfe,X\n";
        let err = load_books_from_reader(bytes, 1).unwrap_err();
        assert!(matches!(err, LoadError::Csv(_)));
    }
}
