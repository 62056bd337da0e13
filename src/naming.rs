//! Filename parsing for file-set entries.
//!
//! Every file inside a file-set directory follows the same pattern: a
//! calendar date, a dot, the entry name, and the `.md` extension:
//!
//! - `2020-01-01.hello.md` → date 2020-01-01, name `hello`
//! - `2018-03-05.hello-world.md` → date 2018-03-05, name `hello-world`
//! - `2021-12-31.notes.v2.md` → date 2021-12-31, name `notes.v2`
//!
//! The entry name becomes the output file name (`<set>/<name>.html`), so it
//! must be unique within a set. Files that do not follow the pattern are not
//! errors: the loader warns and skips them.

use chrono::NaiveDate;

/// Extension shared by all markdown inputs.
pub const MARKDOWN_EXT: &str = "md";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Result of parsing a file-set entry filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEntry {
    pub date: NaiveDate,
    pub name: String,
}

/// Why a filename was rejected as a file-set entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryNameIssue {
    /// Not a `.md` file.
    NotMarkdown,
    /// No `<date>.` prefix, or an empty name after it.
    MissingDate,
    /// The prefix is not a valid `YYYY-MM-DD` date.
    InvalidDate(String),
}

impl std::fmt::Display for EntryNameIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotMarkdown => write!(f, "not a markdown file"),
            Self::MissingDate => write!(f, "name is missing date"),
            Self::InvalidDate(d) => write!(f, "invalid date {d:?}"),
        }
    }
}

/// Parse a filename following the `<YYYY-MM-DD>.<name>.md` convention.
pub fn parse_entry_filename(filename: &str) -> Result<ParsedEntry, EntryNameIssue> {
    let stem = filename
        .strip_suffix(MARKDOWN_EXT)
        .and_then(|s| s.strip_suffix('.'))
        .ok_or(EntryNameIssue::NotMarkdown)?;
    let (date, name) = stem.split_once('.').ok_or(EntryNameIssue::MissingDate)?;
    if name.is_empty() {
        return Err(EntryNameIssue::MissingDate);
    }
    // chrono accepts unpadded fields; the convention is strictly zero-padded.
    if date.len() != 10 {
        return Err(EntryNameIssue::InvalidDate(date.to_string()));
    }
    let date = NaiveDate::parse_from_str(date, DATE_FORMAT)
        .map_err(|_| EntryNameIssue::InvalidDate(date.to_string()))?;
    Ok(ParsedEntry {
        date,
        name: name.to_string(),
    })
}

/// Split a top-level filename into its stem and extension at the last dot.
///
/// - `"about.md"` → `("about", Some("md"))`
/// - `"feed.xml.tpl"` → `("feed.xml", Some("tpl"))`
/// - `"CNAME"` → `("CNAME", None)`
/// - `".hidden"` → `(".hidden", None)`
pub fn split_extension(filename: &str) -> (&str, Option<&str>) {
    match filename.rfind('.') {
        Some(0) | None => (filename, None),
        Some(i) => (&filename[..i], Some(&filename[i + 1..])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn dated_entry() {
        let p = parse_entry_filename("2020-01-01.hello.md").unwrap();
        assert_eq!(p.date, date(2020, 1, 1));
        assert_eq!(p.name, "hello");
    }

    #[test]
    fn name_keeps_dashes() {
        let p = parse_entry_filename("2018-03-05.hello-world.md").unwrap();
        assert_eq!(p.date, date(2018, 3, 5));
        assert_eq!(p.name, "hello-world");
    }

    #[test]
    fn name_keeps_inner_dots() {
        let p = parse_entry_filename("2021-12-31.notes.v2.md").unwrap();
        assert_eq!(p.name, "notes.v2");
    }

    #[test]
    fn not_markdown() {
        assert_eq!(
            parse_entry_filename("2020-01-01.hello.txt"),
            Err(EntryNameIssue::NotMarkdown)
        );
        assert_eq!(parse_entry_filename("md"), Err(EntryNameIssue::NotMarkdown));
    }

    #[test]
    fn missing_date() {
        assert_eq!(
            parse_entry_filename("hello.md"),
            Err(EntryNameIssue::MissingDate)
        );
        assert_eq!(
            parse_entry_filename("2020-01-01..md"),
            Err(EntryNameIssue::MissingDate)
        );
    }

    #[test]
    fn invalid_date() {
        assert_eq!(
            parse_entry_filename("2020-13-01.hello.md"),
            Err(EntryNameIssue::InvalidDate("2020-13-01".into()))
        );
        assert_eq!(
            parse_entry_filename("draft.hello.md"),
            Err(EntryNameIssue::InvalidDate("draft".into()))
        );
        assert_eq!(
            parse_entry_filename("2020-1-1.hello.md"),
            Err(EntryNameIssue::InvalidDate("2020-1-1".into()))
        );
    }

    #[test]
    fn date_with_time_rejected() {
        assert!(matches!(
            parse_entry_filename("2020-01-01T10:00.hello.md"),
            Err(EntryNameIssue::InvalidDate(_))
        ));
    }

    #[test]
    fn split_extension_cases() {
        assert_eq!(split_extension("about.md"), ("about", Some("md")));
        assert_eq!(split_extension("feed.xml.tpl"), ("feed.xml", Some("tpl")));
        assert_eq!(split_extension("CNAME"), ("CNAME", None));
        assert_eq!(split_extension(".hidden"), (".hidden", None));
    }
}
