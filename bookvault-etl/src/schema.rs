//! Schema normalization
//!
//! Source CSVs disagree on column names and ordering. The alias table maps
//! every accepted source column name onto one canonical field, and the
//! normalizer projects each raw row into a fixed shape where every
//! canonical field is present, either with the matched cell text or as an
//! explicit missing marker. Normalization is total: unknown columns are
//! ignored and absent matches degrade to missing, never to an error.

use csv::StringRecord;
use std::collections::HashMap;
use thiserror::Error;

/// Canonical fields every record is mapped into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalField {
    BookId,
    Title,
    Author,
    AverageRating,
    RatingsCount,
    PublicationYear,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 6] = [
        CanonicalField::BookId,
        CanonicalField::Title,
        CanonicalField::Author,
        CanonicalField::AverageRating,
        CanonicalField::RatingsCount,
        CanonicalField::PublicationYear,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::BookId => "book_id",
            CanonicalField::Title => "title",
            CanonicalField::Author => "author",
            CanonicalField::AverageRating => "average_rating",
            CanonicalField::RatingsCount => "ratings_count",
            CanonicalField::PublicationYear => "publication_year",
        }
    }
}

/// Alias table configuration error
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The same source column name is claimed by two canonical fields
    #[error("Alias '{alias}' is claimed by both {first} and {second}")]
    DuplicateAlias {
        alias: String,
        first: &'static str,
        second: &'static str,
    },
}

/// Accepted source column names per canonical field.
///
/// Covers the Goodreads export headers (`Id`, `Name`, `Rating`, `ID`) plus
/// common variants seen in other dumps of the same data.
const DEFAULT_ALIASES: [(CanonicalField, &[&str]); 6] = [
    (
        CanonicalField::BookId,
        &["id", "book_id", "bookid", "isbn", "isbn13"],
    ),
    (
        CanonicalField::Title,
        &["title", "name", "book_title", "original_title"],
    ),
    (
        CanonicalField::Author,
        &["author", "authors", "author_name"],
    ),
    (
        CanonicalField::AverageRating,
        &["rating", "average_rating", "avg_rating", "averagerating"],
    ),
    (
        CanonicalField::RatingsCount,
        &["ratings_count", "num_ratings", "count_of_ratings", "ratingscount"],
    ),
    (
        CanonicalField::PublicationYear,
        &["publication_year", "year", "original_publication_year"],
    ),
];

/// Mapping from normalized source column names to canonical fields
///
/// Built once per run and validated at construction, so a misconfigured
/// alias set is a startup error rather than a per-row surprise.
pub struct AliasTable {
    aliases: HashMap<String, CanonicalField>,
}

impl AliasTable {
    /// Build the default alias table
    pub fn with_defaults() -> Self {
        // The default set is validated by tests; construction cannot fail.
        Self::from_entries(&DEFAULT_ALIASES).unwrap_or_else(|e| {
            unreachable!("default alias table is invalid: {}", e)
        })
    }

    /// Build an alias table from explicit entries
    pub fn from_entries(
        entries: &[(CanonicalField, &[&str])],
    ) -> Result<Self, SchemaError> {
        let mut aliases = HashMap::new();

        for (field, names) in entries {
            for name in *names {
                let key = normalize_column_name(name);
                if let Some(previous) = aliases.insert(key, *field) {
                    if previous != *field {
                        return Err(SchemaError::DuplicateAlias {
                            alias: (*name).to_string(),
                            first: previous.name(),
                            second: field.name(),
                        });
                    }
                }
            }
        }

        Ok(Self { aliases })
    }

    /// Resolve a source column name to a canonical field, if recognized
    pub fn resolve(&self, column: &str) -> Option<CanonicalField> {
        self.aliases.get(&normalize_column_name(column)).copied()
    }
}

/// Case- and whitespace-insensitive column name normalization.
///
/// Underscores are stripped as well so `Book ID`, `book_id` and `BookId`
/// all land on the same key.
fn normalize_column_name(name: &str) -> String {
    name.chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Normalized intermediate record: every canonical field present, raw cell
/// text where a source column matched, `None` as the missing marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues {
    pub book_id: Option<String>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub average_rating: Option<String>,
    pub ratings_count: Option<String>,
    pub publication_year: Option<String>,
}

impl FieldValues {
    fn set(&mut self, field: CanonicalField, value: String) {
        let slot = match field {
            CanonicalField::BookId => &mut self.book_id,
            CanonicalField::Title => &mut self.title,
            CanonicalField::Author => &mut self.author,
            CanonicalField::AverageRating => &mut self.average_rating,
            CanonicalField::RatingsCount => &mut self.ratings_count,
            CanonicalField::PublicationYear => &mut self.publication_year,
        };
        // First matching column wins when a file repeats an alias
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// Per-file normalizer: resolves the header row once, then projects each
/// data row by position.
pub struct SchemaNormalizer {
    column_fields: Vec<Option<CanonicalField>>,
}

impl SchemaNormalizer {
    /// Resolve a header row against the alias table
    pub fn for_headers(table: &AliasTable, headers: &StringRecord) -> Self {
        let column_fields = headers.iter().map(|h| table.resolve(h)).collect();
        Self { column_fields }
    }

    /// Project one raw row into the canonical shape
    ///
    /// Cell text is carried verbatim, empty cells included: "present but
    /// empty" and "no such column" are different facts and the cleaner
    /// treats them differently. Rows shorter than the header are legal;
    /// the absent columns simply stay missing.
    pub fn normalize(&self, row: &StringRecord) -> FieldValues {
        let mut values = FieldValues::default();

        for (idx, field) in self.column_fields.iter().enumerate() {
            if let Some(field) = field {
                if let Some(cell) = row.get(idx) {
                    values.set(*field, cell.to_string());
                }
            }
        }

        values
    }
}
