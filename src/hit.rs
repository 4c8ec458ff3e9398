use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Failure to coerce a tabular hit row into a typed record.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("hit row has {0} fields, expected at least 12")]
    FieldCount(usize),
    #[error("invalid {field} field {value:?}")]
    Numeric { field: &'static str, value: String },
}

/// One alignment hit between a query and a subject sequence, in BLAST
/// tabular column order (query, subject, identity, match, gap, mismatch,
/// query start/end, subject start/end, evalue, score).
///
/// Coordinates are 1-based inclusive and signed: inverted or degenerate
/// ranges from the upstream search tool are accepted as-is.
#[derive(Debug, Clone, PartialEq)]
pub struct HitRecord {
    pub query: String,
    pub subject: String,
    pub identity: f64,
    pub matches: i64,
    pub gaps: i64,
    pub mismatches: i64,
    pub query_start: i64,
    pub query_end: i64,
    pub subject_start: i64,
    pub subject_end: i64,
    pub evalue: f64,
    pub score: f64,
    representative: bool,
}

impl HitRecord {
    /// Build a record from one tab-split row. Fields are coerced
    /// positionally; extra trailing fields are ignored. Identifiers with
    /// a `ref|ACCESSION|...` prefix are reduced to the bare accession.
    pub fn from_fields(fields: &[&str]) -> Result<HitRecord, ParseError> {
        if fields.len() < 12 {
            return Err(ParseError::FieldCount(fields.len()));
        }
        Ok(HitRecord {
            query: normalize_accession(fields[0]),
            subject: normalize_accession(fields[1]),
            identity: parse_numeric(fields[2], "identity")?,
            matches: parse_numeric(fields[3], "match")?,
            gaps: parse_numeric(fields[4], "gap")?,
            mismatches: parse_numeric(fields[5], "mismatch")?,
            query_start: parse_numeric(fields[6], "query_start")?,
            query_end: parse_numeric(fields[7], "query_end")?,
            subject_start: parse_numeric(fields[8], "subject_start")?,
            subject_end: parse_numeric(fields[9], "subject_end")?,
            evalue: parse_numeric(fields[10], "evalue")?,
            score: parse_numeric(fields[11], "score")?,
            representative: true,
        })
    }

    /// Whether this hit still stands as a representative alignment for
    /// its query region.
    pub fn is_representative(&self) -> bool {
        self.representative
    }

    /// Retire this hit. One-way: a retired hit never becomes
    /// representative again.
    pub fn mark_redundant(&mut self) {
        self.representative = false;
    }

    /// Query span length in residues (1-based inclusive coordinates).
    /// Zero or negative when the coordinates are degenerate.
    pub fn query_span(&self) -> i64 {
        self.query_end - self.query_start + 1
    }
}

impl fmt::Display for HitRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.query,
            self.subject,
            self.representative,
            self.query_start,
            self.query_end,
            self.subject_start,
            self.subject_end,
            self.identity
        )
    }
}

/// Reduce a `ref|ACCESSION|...` identifier to the bare accession.
/// Identifiers without the prefix pass through unchanged, so the
/// normalization is idempotent.
pub fn normalize_accession(name: &str) -> String {
    match name.strip_prefix("ref|") {
        Some(rest) => rest.split('|').next().unwrap_or("").to_string(),
        None => name.to_string(),
    }
}

pub(crate) fn parse_numeric<T: FromStr>(
    value: &str,
    field: &'static str,
) -> Result<T, ParseError> {
    value.parse().map_err(|_| ParseError::Numeric {
        field,
        value: value.to_string(),
    })
}
