//! Record cleaning
//!
//! Validates and coerces normalized rows into canonical records. Cleaning
//! is a pure function of its input: no I/O, no shared state, so workers can
//! run it concurrently and tests can replay any row.
//!
//! Rating policy: values that parse but fall outside [0.0, 5.0] are clamped
//! to the nearest bound; non-numeric text is first checked against the
//! Goodreads review scale ("it was amazing" = 5 ... "did not like it" = 1,
//! to-read shelf marker = 0); anything else is rejected. A missing rating
//! is not a defect, it stays NULL.

use crate::schema::FieldValues;
use bookvault_common::db::BookRecord;
use serde::{Deserialize, Serialize};

/// Lowest rating a stored record may carry
pub const RATING_MIN: f64 = 0.0;
/// Highest rating a stored record may carry
pub const RATING_MAX: f64 = 5.0;

/// Why a row was excluded from loading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Identifier column missing or empty
    MissingId,
    /// No title column matched any alias
    MissingTitle,
    /// Title present but empty after trimming
    EmptyTitle,
    /// Rating present but neither numeric nor on the textual scale
    UnparseableRating,
    /// CSV row could not be decoded at all
    MalformedRow,
    /// Identifier already loaded earlier in the run (first write wins)
    DuplicateId,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::MissingId => "missing_id",
            RejectReason::MissingTitle => "missing_title",
            RejectReason::EmptyTitle => "empty_title",
            RejectReason::UnparseableRating => "unparseable_rating",
            RejectReason::MalformedRow => "malformed_row",
            RejectReason::DuplicateId => "duplicate_id",
        }
    }
}

/// Result of cleaning one row
#[derive(Debug, Clone, PartialEq)]
pub enum CleanOutcome {
    Accepted(BookRecord),
    Rejected(RejectReason),
}

/// Clean one normalized row
///
/// Rules in order: identifier required, title required and non-empty after
/// whitespace normalization, rating coerced per the documented policy.
/// Count and year coerce leniently; an unusable value degrades to NULL
/// rather than rejecting the row.
pub fn clean_record(values: &FieldValues) -> CleanOutcome {
    let book_id = match values.book_id.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return CleanOutcome::Rejected(RejectReason::MissingId),
    };

    let title = match values.title.as_deref() {
        Some(raw) => {
            let title = normalize_title(raw);
            if title.is_empty() {
                return CleanOutcome::Rejected(RejectReason::EmptyTitle);
            }
            title
        }
        None => return CleanOutcome::Rejected(RejectReason::MissingTitle),
    };

    // An empty rating cell is missing data, not a defect; only non-empty
    // text that fails to parse rejects the row.
    let average_rating = match values.average_rating.as_deref().map(str::trim) {
        Some("") | None => None,
        Some(raw) => match parse_rating(raw) {
            Some(rating) => Some(rating),
            None => return CleanOutcome::Rejected(RejectReason::UnparseableRating),
        },
    };

    let author = values
        .author
        .as_deref()
        .map(normalize_title)
        .filter(|a| !a.is_empty());

    let ratings_count = values.ratings_count.as_deref().and_then(parse_integer);
    let publication_year = values.publication_year.as_deref().and_then(parse_integer);

    CleanOutcome::Accepted(BookRecord {
        book_id,
        title,
        author,
        average_rating,
        ratings_count,
        publication_year,
    })
}

/// Trim and collapse internal whitespace runs to single spaces
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Parse a rating cell into a clamped value, if possible
///
/// Numeric text clamps into [RATING_MIN, RATING_MAX]. Non-numeric text is
/// matched against the Goodreads review scale. None means unparseable.
pub fn parse_rating(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();

    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return Some(value.clamp(RATING_MIN, RATING_MAX));
        }
        return None;
    }

    textual_rating(trimmed)
}

/// Goodreads textual review scale
fn textual_rating(text: &str) -> Option<f64> {
    match text.to_lowercase().as_str() {
        "it was amazing" => Some(5.0),
        "really liked it" => Some(4.0),
        "liked it" => Some(3.0),
        "it was ok" => Some(2.0),
        "did not like it" => Some(1.0),
        "this user marked the book as \"to-read\"" => Some(0.0),
        _ => None,
    }
}

/// Lenient integer coercion: plain integers, or whole-looking floats such
/// as "2004.0" which appear in some exports. Anything else becomes None.
fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();

    if let Ok(value) = trimmed.parse::<i64>() {
        return Some(value);
    }

    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value.fract() == 0.0 => Some(value as i64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(id: Option<&str>, title: Option<&str>, rating: Option<&str>) -> FieldValues {
        FieldValues {
            book_id: id.map(String::from),
            title: title.map(String::from),
            average_rating: rating.map(String::from),
            ..FieldValues::default()
        }
    }

    fn accepted(outcome: CleanOutcome) -> BookRecord {
        match outcome {
            CleanOutcome::Accepted(record) => record,
            CleanOutcome::Rejected(reason) => panic!("unexpected rejection: {:?}", reason),
        }
    }

    #[test]
    fn test_well_formed_row_accepted() {
        let record = accepted(clean_record(&values(Some("1"), Some("Dune"), Some("4.25"))));
        assert_eq!(record.book_id, "1");
        assert_eq!(record.title, "Dune");
        assert_eq!(record.average_rating, Some(4.25));
    }

    #[test]
    fn test_missing_id_rejected() {
        let outcome = clean_record(&values(None, Some("Dune"), None));
        assert_eq!(outcome, CleanOutcome::Rejected(RejectReason::MissingId));

        let outcome = clean_record(&values(Some("   "), Some("Dune"), None));
        assert_eq!(outcome, CleanOutcome::Rejected(RejectReason::MissingId));
    }

    #[test]
    fn test_title_rules() {
        let outcome = clean_record(&values(Some("1"), None, None));
        assert_eq!(outcome, CleanOutcome::Rejected(RejectReason::MissingTitle));

        let outcome = clean_record(&values(Some("1"), Some("   "), None));
        assert_eq!(outcome, CleanOutcome::Rejected(RejectReason::EmptyTitle));

        let record = accepted(clean_record(&values(
            Some("1"),
            Some("  The   Left Hand\tof  Darkness "),
            None,
        )));
        assert_eq!(record.title, "The Left Hand of Darkness");
    }

    #[test]
    fn test_rating_boundaries() {
        // In-range values pass through untouched
        for (raw, expected) in [("0.0", 0.0), ("5.0", 5.0), ("3.7", 3.7)] {
            assert_eq!(parse_rating(raw), Some(expected));
        }

        // Slightly out-of-range values clamp to the nearest bound
        assert_eq!(parse_rating("-0.01"), Some(RATING_MIN));
        assert_eq!(parse_rating("5.01"), Some(RATING_MAX));
        assert_eq!(parse_rating("99"), Some(RATING_MAX));

        // Unparseable values do not
        assert_eq!(parse_rating("N/A"), None);
        assert_eq!(parse_rating("four stars"), None);
        assert_eq!(parse_rating("NaN"), None);
    }

    #[test]
    fn test_textual_rating_scale() {
        assert_eq!(parse_rating("it was amazing"), Some(5.0));
        assert_eq!(parse_rating("Really Liked It"), Some(4.0));
        assert_eq!(parse_rating("did not like it"), Some(1.0));
        assert_eq!(
            parse_rating("This user marked the book as \"to-read\""),
            Some(0.0)
        );
    }

    #[test]
    fn test_unparseable_rating_rejects_row() {
        let outcome = clean_record(&values(Some("1"), Some("Dune"), Some("N/A")));
        assert_eq!(outcome, CleanOutcome::Rejected(RejectReason::UnparseableRating));
    }

    #[test]
    fn test_missing_rating_accepted_as_null() {
        let record = accepted(clean_record(&values(Some("1"), Some("Dune"), None)));
        assert_eq!(record.average_rating, None);

        // Present-but-empty cells are missing data too
        let record = accepted(clean_record(&values(Some("1"), Some("Dune"), Some("  "))));
        assert_eq!(record.average_rating, None);
    }

    #[test]
    fn test_lenient_integer_coercion() {
        assert_eq!(parse_integer("2004"), Some(2004));
        assert_eq!(parse_integer("2004.0"), Some(2004));
        assert_eq!(parse_integer("many"), None);
        assert_eq!(parse_integer("2004.5"), None);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let input = values(Some(" 9 "), Some("  A  Wizard of Earthsea"), Some("7.5"));
        let first = clean_record(&input);
        let second = clean_record(&input);
        assert_eq!(first, second);

        // Re-cleaning an accepted record's own fields changes nothing
        let record = accepted(first);
        let roundtrip = accepted(clean_record(&FieldValues {
            book_id: Some(record.book_id.clone()),
            title: Some(record.title.clone()),
            average_rating: record.average_rating.map(|r| r.to_string()),
            ..FieldValues::default()
        }));
        assert_eq!(roundtrip.book_id, record.book_id);
        assert_eq!(roundtrip.title, record.title);
        assert_eq!(roundtrip.average_rating, record.average_rating);
    }
}
