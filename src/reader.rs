use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Open a hit table and auto-detect gzip compression, returning a boxed BufRead
pub fn open_blast_input<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("opening {}", path.display()))?;

    // Check by file extension (faster than reading magic bytes)
    let is_compressed = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == "gz" || ext == "bgz")
        .unwrap_or(false);

    if is_compressed {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// Row reader for tab-separated hit tables. Comment lines (`#`, as
/// written by `blastn -outfmt 7` and friends) and blank lines are
/// skipped; data rows come back as raw fields with their 1-based line
/// number for error reporting.
pub struct BlastReader<R: Read> {
    reader: BufReader<R>,
    line_no: usize,
}

impl<R: Read> BlastReader<R> {
    pub fn new(reader: R) -> Self {
        BlastReader {
            reader: BufReader::new(reader),
            line_no: 0,
        }
    }

    /// Next data row, or `None` at end of input.
    pub fn read_row(&mut self) -> Result<Option<(usize, Vec<String>)>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_no += 1;
            let trimmed = line.trim_end();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let fields = trimmed.split('\t').map(str::to_string).collect();
            return Ok(Some((self.line_no, fields)));
        }
    }
}
