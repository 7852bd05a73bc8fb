//! Transformed edge output
//!
//! Rows are written as delimited text with a fixed column order:
//!
//! ```text
//! name1  represents1  alias1  name2  represents2  alias2  combined_score
//! ```
//!
//! Fields are never quoted, so a field containing the delimiter is refused
//! rather than written as an extra column. File outputs go through [`StagedOutput`], which
//! writes into a temporary file beside the destination and renames it into
//! place only once the whole pass has succeeded.

use crate::resolver::ResolvedProtein;
use csv::{QuoteStyle, Terminator, WriterBuilder};
use std::io::Write;
use std::path::{Path, PathBuf};
use stringnet_common::{Result, StringnetError};
use tempfile::NamedTempFile;
use tracing::debug;

/// Column names used when a header row is requested
pub const OUTPUT_COLUMNS: [&str; 7] = [
    "name1",
    "represents1",
    "alias1",
    "name2",
    "represents2",
    "alias2",
    "combined_score",
];

/// Formatting options shared by both output streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputOptions {
    pub delimiter: u8,
    pub header: bool,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            delimiter: b'\t',
            header: false,
        }
    }
}

/// One output row: both resolved endpoints and the score as read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEdge<'a> {
    pub protein1: ResolvedProtein<'a>,
    pub protein2: ResolvedProtein<'a>,
    pub score: &'a str,
}

impl ResolvedEdge<'_> {
    fn fields(&self) -> [&str; 7] {
        [
            self.protein1.display_name,
            &self.protein1.represents,
            &self.protein1.aliases,
            self.protein2.display_name,
            &self.protein2.represents,
            &self.protein2.aliases,
            self.score,
        ]
    }
}

/// Delimited writer for resolved edges
pub struct EdgeWriter<W: Write> {
    writer: csv::Writer<W>,
    target: PathBuf,
    delimiter: u8,
    rows: u64,
}

impl<W: Write> EdgeWriter<W> {
    /// Wrap `inner`; `target` names the stream in error messages
    pub fn new(inner: W, target: impl Into<PathBuf>, options: OutputOptions) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(options.delimiter)
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .has_headers(false)
            .flexible(false)
            .from_writer(inner);

        Self {
            writer,
            target: target.into(),
            delimiter: options.delimiter,
            rows: 0,
        }
    }

    pub fn write_header(&mut self) -> Result<()> {
        self.writer
            .write_record(OUTPUT_COLUMNS)
            .map_err(|e| self.error(e))
    }

    /// Append one row; a field containing the delimiter or a line break is
    /// a `Write` error
    pub fn write_edge(&mut self, edge: &ResolvedEdge<'_>) -> Result<()> {
        let fields = edge.fields();
        if let Some(field) = fields.iter().find(|field| self.splits(field)) {
            return Err(StringnetError::write(
                &self.target,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!(
                        "field '{}' contains the output delimiter {:?}",
                        field,
                        char::from(self.delimiter)
                    ),
                ),
            ));
        }

        self.writer
            .write_record(fields)
            .map_err(|e| self.error(e))?;
        self.rows += 1;
        Ok(())
    }

    /// Data rows written so far (header excluded)
    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Flush and hand back the underlying writer
    pub fn finish(self) -> Result<W> {
        let target = self.target;
        self.writer
            .into_inner()
            .map_err(|e| StringnetError::write(&target, e.into_error()))
    }

    fn splits(&self, field: &str) -> bool {
        field
            .bytes()
            .any(|b| b == self.delimiter || b == b'\n' || b == b'\r')
    }

    fn error(&self, err: csv::Error) -> StringnetError {
        let source = match err.into_kind() {
            csv::ErrorKind::Io(io) => io,
            other => std::io::Error::other(format!("{:?}", other)),
        };
        StringnetError::write(&self.target, source)
    }
}

/// An output file written to a temporary sibling and renamed on commit.
///
/// Dropping it without calling [`StagedOutput::commit`] deletes the
/// temporary file, so a failed run leaves no partial output at `path`.
pub struct StagedOutput {
    path: PathBuf,
    writer: EdgeWriter<NamedTempFile>,
}

impl StagedOutput {
    pub fn create(path: &Path, options: OutputOptions) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let file = NamedTempFile::new_in(dir).map_err(|e| StringnetError::write(path, e))?;
        debug!(path = %path.display(), staged = %file.path().display(), "Staging output");

        let mut writer = EdgeWriter::new(file, path, options);
        if options.header {
            writer.write_header()?;
        }

        Ok(Self {
            path: path.to_path_buf(),
            writer,
        })
    }

    pub fn writer(&mut self) -> &mut EdgeWriter<NamedTempFile> {
        &mut self.writer
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush, sync and move the file into place; returns rows written
    pub fn commit(self) -> Result<u64> {
        let rows = self.writer.rows_written();
        let file = self.writer.finish()?;
        file.as_file()
            .sync_all()
            .map_err(|e| StringnetError::write(&self.path, e))?;
        file.persist(&self.path)
            .map_err(|e| StringnetError::write(&self.path, e.error))?;
        Ok(rows)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn protein<'a>(name: &'a str, represents: &str, aliases: &str) -> ResolvedProtein<'a> {
        ResolvedProtein {
            display_name: name,
            represents: represents.to_string(),
            aliases: aliases.to_string(),
        }
    }

    fn sample_edge() -> ResolvedEdge<'static> {
        ResolvedEdge {
            protein1: protein(
                "ANAPC5",
                "uniprot:Q9UJX4",
                "ncbigene:51433|ensembl:ENSP00000261819",
            ),
            protein2: protein("9606.ENSP00000353549", "", "ensembl:ENSP00000353549"),
            score: "999",
        }
    }

    #[test]
    fn test_write_edge_fixed_column_order() {
        let mut writer = EdgeWriter::new(Vec::new(), "memory", OutputOptions::default());
        writer.write_edge(&sample_edge()).unwrap();
        assert_eq!(writer.rows_written(), 1);

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "ANAPC5\tuniprot:Q9UJX4\tncbigene:51433|ensembl:ENSP00000261819\t\
             9606.ENSP00000353549\t\tensembl:ENSP00000353549\t999\n"
        );
    }

    #[test]
    fn test_header_and_custom_delimiter() {
        let options = OutputOptions {
            delimiter: b',',
            header: true,
        };
        let mut writer = EdgeWriter::new(Vec::new(), "memory", options);
        writer.write_header().unwrap();
        assert_eq!(writer.rows_written(), 0);

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "name1,represents1,alias1,name2,represents2,alias2,combined_score\n"
        );
    }

    #[test]
    fn test_fields_are_not_quoted() {
        let mut edge = sample_edge();
        edge.protein1.display_name = "\"odd\" name";
        let mut writer = EdgeWriter::new(Vec::new(), "memory", OutputOptions::default());
        writer.write_edge(&edge).unwrap();

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        assert!(out.starts_with("\"odd\" name\t"));
    }

    #[test]
    fn test_field_containing_delimiter_is_refused() {
        let mut edge = sample_edge();
        edge.protein1.display_name = "Cyclin D1";

        let options = OutputOptions {
            delimiter: b' ',
            header: false,
        };
        let mut writer = EdgeWriter::new(Vec::new(), "edges.txt", options);
        let err = writer.write_edge(&edge).unwrap_err();

        assert!(matches!(err, StringnetError::Write { .. }));
        assert!(err.to_string().contains("Cyclin D1"));
        assert_eq!(writer.rows_written(), 0);
        assert!(writer.finish().unwrap().is_empty());
    }

    #[test]
    fn test_spaces_in_fields_keep_seven_tab_columns() {
        let mut edge = sample_edge();
        edge.protein1.display_name = "Cyclin D1";

        let mut writer = EdgeWriter::new(Vec::new(), "edges.tsv", OutputOptions::default());
        writer.write_edge(&edge).unwrap();

        let out = String::from_utf8(writer.finish().unwrap()).unwrap();
        let columns: Vec<&str> = out.trim_end_matches('\n').split('\t').collect();
        assert_eq!(columns.len(), OUTPUT_COLUMNS.len());
        assert_eq!(columns[0], "Cyclin D1");
    }

    #[test]
    fn test_staged_output_commit_and_discard() {
        let dir = tempfile::tempdir().unwrap();
        let committed = dir.path().join("edges.tsv");
        let discarded = dir.path().join("hi_conf.tsv");

        let mut staged = StagedOutput::create(&committed, OutputOptions::default()).unwrap();
        staged.writer().write_edge(&sample_edge()).unwrap();
        assert!(!committed.exists());
        assert_eq!(staged.commit().unwrap(), 1);
        assert!(committed.exists());

        let mut staged = StagedOutput::create(&discarded, OutputOptions::default()).unwrap();
        staged.writer().write_edge(&sample_edge()).unwrap();
        drop(staged);

        assert!(!discarded.exists());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
