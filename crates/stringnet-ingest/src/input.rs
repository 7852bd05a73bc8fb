//! Line-oriented input helpers shared by the loaders and the join pass

use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use stringnet_common::{Result, StringnetError};

/// Read buffer for input files; edge lists run to tens of gigabytes
const READ_BUFFER_BYTES: usize = 1 << 20;

/// Open a text input, decompressing on the fly when the path ends in `.gz`
pub fn open_text(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).map_err(|e| StringnetError::read(path, e))?;

    if path.extension().is_some_and(|ext| ext == "gz") {
        let decoder = MultiGzDecoder::new(BufReader::new(file));
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, decoder)))
    } else {
        Ok(Box::new(BufReader::with_capacity(READ_BUFFER_BYTES, file)))
    }
}

/// One line handed out by [`LineReader`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line<'a> {
    /// Line text without its terminator
    Text(&'a str),
    /// The line was not valid UTF-8
    Invalid,
}

/// Reads lines into a single reused buffer so memory stays flat no matter how
/// large the input is.
pub struct LineReader<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::with_capacity(256),
        }
    }

    /// Next line, or `None` at end of input
    pub fn next_line(&mut self) -> std::io::Result<Option<Line<'_>>> {
        self.buf.clear();
        if self.reader.read_until(b'\n', &mut self.buf)? == 0 {
            return Ok(None);
        }
        Ok(Some(match std::str::from_utf8(&self.buf) {
            Ok(text) => Line::Text(trim_line_end(text)),
            Err(_) => Line::Invalid,
        }))
    }
}

/// Split a line into fields.
///
/// Tab-separated when the line contains a tab, otherwise any run of
/// whitespace separates fields.
pub fn split_fields(line: &str) -> Vec<&str> {
    if line.contains('\t') {
        line.split('\t').map(str::trim).collect()
    } else {
        line.split_whitespace().collect()
    }
}

/// Strip a trailing `\n` or `\r\n`
pub fn trim_line_end(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}
