use anyhow::{Context, Result};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::hit::{parse_numeric, HitRecord, ParseError};
use crate::reader::{open_blast_input, BlastReader};
use crate::reconcile::{merge_split_hits, select_representatives, suppress_overlaps};

/// Default minimum percent identity for admitting a hit.
pub const DEFAULT_IDENTITY_THRESHOLD: f64 = 30.0;

/// Filter configuration
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Minimum percent identity to admit a hit.
    pub identity_threshold: f64,
    /// Resolve query-coverage conflicts across subjects.
    pub non_redundant: bool,
    /// Sort the final collection by query start.
    pub ordered: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            identity_threshold: DEFAULT_IDENTITY_THRESHOLD,
            non_redundant: false,
            ordered: true,
        }
    }
}

/// Hit filter that runs the reconciliation pipeline over one in-memory
/// collection of hits per invocation.
pub struct HitFilter {
    config: FilterConfig,
    emit_all: bool,
}

impl HitFilter {
    pub fn new(config: FilterConfig) -> Self {
        HitFilter {
            config,
            emit_all: false, // Emit only representative hits by default
        }
    }

    /// Also emit retired hits in the output (flag column reads `false`).
    pub fn with_emit_all(mut self, emit_all: bool) -> Self {
        self.emit_all = emit_all;
        self
    }

    /// Read, reconcile, and render over a file pair. Input compression
    /// is auto-detected from the extension.
    pub fn filter_file<P: AsRef<Path>>(&self, input: P, output: P) -> Result<()> {
        let reader = open_blast_input(input)?;
        let output = output.as_ref();
        let file = File::create(output)
            .with_context(|| format!("creating {}", output.display()))?;
        let mut writer = BufWriter::new(file);
        self.filter_stream(reader, &mut writer)
    }

    /// Read hits from `reader`, run the pipeline, and render surviving
    /// hits to `writer`.
    pub fn filter_stream<R: Read, W: Write>(&self, reader: R, writer: &mut W) -> Result<()> {
        let mut hits = self.collect_hits(reader)?;
        self.reconcile(&mut hits);
        for hit in &hits {
            if self.emit_all || hit.is_representative() {
                writeln!(writer, "{hit}")?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Parse rows into records, admitting only hits at or above the
    /// identity threshold. A row below the threshold is dropped before
    /// a record is ever built, so only its identity field has to parse;
    /// on admitted rows every numeric field must coerce.
    pub fn collect_hits<R: Read>(&self, reader: R) -> Result<Vec<HitRecord>> {
        let mut rows = BlastReader::new(reader);
        let mut hits = Vec::new();
        let mut dropped = 0usize;
        while let Some((line_no, fields)) = rows.read_row()? {
            if fields.len() < 12 {
                return Err(ParseError::FieldCount(fields.len()))
                    .with_context(|| format!("line {line_no}"));
            }
            let identity: f64 = parse_numeric(&fields[2], "identity")
                .with_context(|| format!("line {line_no}"))?;
            if identity < self.config.identity_threshold {
                dropped += 1;
                continue;
            }
            let fields: Vec<&str> = fields.iter().map(String::as_str).collect();
            hits.push(
                HitRecord::from_fields(&fields)
                    .with_context(|| format!("line {line_no}"))?,
            );
        }
        debug!(
            "admitted {} hit(s), dropped {} below identity {}",
            hits.len(),
            dropped,
            self.config.identity_threshold
        );
        Ok(hits)
    }

    /// Run the reconciliation stages in fixed order, leaving every
    /// record in place with its representative flag settled.
    pub fn reconcile(&self, hits: &mut Vec<HitRecord>) {
        let merged = merge_split_hits(hits);
        let suppressed = suppress_overlaps(hits);
        debug!("merged {merged} split pair(s), suppressed {suppressed} overlapping hit(s)");
        if self.config.non_redundant {
            let retired = select_representatives(hits);
            debug!("representative selection retired {retired} hit(s)");
        }
        if self.config.ordered {
            // Stable: ties keep their input order.
            hits.sort_by_key(|h| h.query_start);
        }
    }
}
