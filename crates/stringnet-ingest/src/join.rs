//! Edge filter and join engine
//!
//! Makes one streaming pass over a STRING `protein.links` file:
//!
//! ```text
//! protein1 protein2 neighborhood ... textmining_transferred combined_score
//! 9606.ENSP00000000233 9606.ENSP00000272298 0 0 ... 490
//! ```
//!
//! Only the first two fields and the last one are used. Each row is resolved
//! against the mapping tables, filtered by the primary cutoff, and written to
//! the primary stream and, when it also meets the high-confidence cutoff, to
//! the high-confidence stream. Rows are handled one at a time through a
//! reused line buffer, so memory does not grow with the edge list.

use crate::input::{Line, LineReader};
use crate::mapping::MappingTables;
use crate::writer::{EdgeWriter, ResolvedEdge};
use std::collections::HashMap;
use std::io::{BufRead, Write};
use std::path::Path;
use stringnet_common::{Result, StringnetError};
use thiserror::Error;
use tracing::{debug, info, info_span, trace};

/// Log a progress line every this many input lines
const PROGRESS_INTERVAL: u64 = 5_000_000;

/// Score thresholds for the two output streams
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cutoffs {
    primary: f64,
    high_confidence: Option<f64>,
}

impl Cutoffs {
    /// Rows scoring below `primary` are dropped. `high_confidence`, when set,
    /// may not be below `primary`, so the high-confidence stream is always a
    /// subset of the primary one.
    pub fn new(primary: f64, high_confidence: Option<f64>) -> Result<Self> {
        if !primary.is_finite() {
            return Err(StringnetError::config(format!(
                "cutoff score must be a finite number, got {}",
                primary
            )));
        }

        if let Some(high) = high_confidence {
            if !high.is_finite() || high < primary {
                return Err(StringnetError::config(format!(
                    "high-confidence cutoff {} must be a finite number no lower than the cutoff {}",
                    high, primary
                )));
            }
        }

        Ok(Self {
            primary,
            high_confidence,
        })
    }

    pub fn primary(&self) -> f64 {
        self.primary
    }

    pub fn high_confidence(&self) -> Option<f64> {
        self.high_confidence
    }

    pub fn passes_primary(&self, score: f64) -> bool {
        score >= self.primary
    }

    pub fn passes_high_confidence(&self, score: f64) -> bool {
        self.high_confidence.is_some_and(|high| score >= high)
    }
}

/// Options for one join pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinOptions {
    pub cutoffs: Cutoffs,
    /// Drop rows whose unordered protein pair was already written. Keeps one
    /// key per written edge in memory, so it is off unless asked for.
    pub dedupe_reverse_edges: bool,
}

/// Counters for one join pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JoinStats {
    /// Lines read, header included
    pub lines: u64,
    /// Whether the first line was recognized as a column header
    pub header_skipped: bool,
    /// Lines skipped as malformed
    pub malformed: u64,
    /// Well-formed rows dropped by the primary cutoff
    pub below_cutoff: u64,
    /// Rows dropped as repeats of an already written pair
    pub duplicates: u64,
    pub primary_rows: u64,
    pub high_confidence_rows: u64,
}

/// Why a line is not a usable edge
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EdgeParseError {
    #[error("expected at least 3 fields")]
    TooFewFields,
    #[error("invalid score '{0}'")]
    InvalidScore(String),
}

/// An edge as read from the links file
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeRecord<'a> {
    pub protein1: &'a str,
    pub protein2: &'a str,
    /// Score exactly as written in the input
    pub score_text: &'a str,
    pub score: f64,
}

impl<'a> EdgeRecord<'a> {
    /// Parse `<id1> <id2> [sub-scores...] <combined_score>`
    pub fn parse(line: &'a str) -> std::result::Result<Self, EdgeParseError> {
        let mut fields = line.split_whitespace();
        let (Some(protein1), Some(protein2), Some(score_text)) =
            (fields.next(), fields.next(), fields.last())
        else {
            return Err(EdgeParseError::TooFewFields);
        };

        let score = score_text
            .parse::<f64>()
            .ok()
            .filter(|s| s.is_finite())
            .ok_or_else(|| EdgeParseError::InvalidScore(score_text.to_string()))?;

        Ok(Self {
            protein1,
            protein2,
            score_text,
            score,
        })
    }
}

/// Stream `reader` through the tables into the output writers.
///
/// `source` names the input in errors. Any read or write failure aborts the
/// pass; malformed lines are counted and skipped.
pub fn join_edges<R, P, H>(
    reader: R,
    source: &Path,
    tables: &MappingTables,
    options: &JoinOptions,
    primary: &mut EdgeWriter<P>,
    mut high_confidence: Option<&mut EdgeWriter<H>>,
) -> Result<JoinStats>
where
    R: BufRead,
    P: Write,
    H: Write,
{
    let _span = info_span!("join_edges", path = %source.display()).entered();

    let cutoffs = options.cutoffs;
    let mut stats = JoinStats::default();
    let mut seen = options.dedupe_reverse_edges.then(SeenEdges::default);
    let mut lines = LineReader::new(reader);

    while let Some(line) = lines
        .next_line()
        .map_err(|e| StringnetError::read(source, e))?
    {
        stats.lines += 1;
        if stats.lines % PROGRESS_INTERVAL == 0 {
            info!(lines = stats.lines, written = stats.primary_rows, "Join progress");
        }

        let text = match line {
            Line::Text(text) if text.trim().is_empty() => continue,
            Line::Text(text) => text,
            Line::Invalid => {
                debug!(line = stats.lines, "Skipping edge line that is not UTF-8");
                stats.malformed += 1;
                continue;
            },
        };

        let edge = match EdgeRecord::parse(text) {
            Ok(edge) => edge,
            Err(EdgeParseError::InvalidScore(_)) if stats.lines == 1 => {
                debug!(header = text, "Skipping column header");
                stats.header_skipped = true;
                continue;
            },
            Err(e) => {
                debug!(line = stats.lines, error = %e, "Skipping malformed edge line");
                stats.malformed += 1;
                continue;
            },
        };

        if !cutoffs.passes_primary(edge.score) {
            stats.below_cutoff += 1;
            continue;
        }

        if let Some(seen) = seen.as_mut() {
            if seen.check(&edge)? {
                trace!(protein1 = edge.protein1, protein2 = edge.protein2, "Duplicate edge");
                stats.duplicates += 1;
                continue;
            }
        }

        let resolved = ResolvedEdge {
            protein1: tables.resolve(edge.protein1),
            protein2: tables.resolve(edge.protein2),
            score: edge.score_text,
        };

        primary.write_edge(&resolved)?;
        stats.primary_rows += 1;

        if cutoffs.passes_high_confidence(edge.score) {
            if let Some(writer) = high_confidence.as_deref_mut() {
                writer.write_edge(&resolved)?;
                stats.high_confidence_rows += 1;
            }
        }
    }

    info!(
        lines = stats.lines,
        malformed = stats.malformed,
        below_cutoff = stats.below_cutoff,
        duplicates = stats.duplicates,
        primary_rows = stats.primary_rows,
        high_confidence_rows = stats.high_confidence_rows,
        "Join pass complete"
    );

    Ok(stats)
}

/// Unordered protein pairs already written, with their score
#[derive(Debug, Default)]
struct SeenEdges {
    scores: HashMap<(String, String), String>,
}

impl SeenEdges {
    /// True when the pair was seen before with the same score; an earlier
    /// sighting with a different score is an error.
    fn check(&mut self, edge: &EdgeRecord<'_>) -> Result<bool> {
        let key = if edge.protein1 <= edge.protein2 {
            (edge.protein1.to_string(), edge.protein2.to_string())
        } else {
            (edge.protein2.to_string(), edge.protein1.to_string())
        };

        match self.scores.get(&key) {
            Some(first) if first == edge.score_text => Ok(true),
            Some(first) => Err(StringnetError::DuplicateEdge {
                protein1: edge.protein1.to_string(),
                protein2: edge.protein2.to_string(),
                first: first.clone(),
                second: edge.score_text.to_string(),
            }),
            None => {
                self.scores.insert(key, edge.score_text.to_string());
                Ok(false)
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::writer::OutputOptions;

    const ANAPC5_LINE: &str = "9606.ENSP00000261819 9606.ENSP00000353549 0 0 0 0 0 102 90 987 260 900 0 754 622 999";

    fn tables() -> MappingTables {
        MappingTables {
            names: [("ENSP00000261819", "ANAPC5")].into_iter().collect(),
            uniprot: [("ENSP00000261819", "Q9UJX4")].into_iter().collect(),
            entrez: [("ENSP00000261819", "51433")].into_iter().collect(),
        }
    }

    fn options(primary: f64, high: Option<f64>) -> JoinOptions {
        JoinOptions {
            cutoffs: Cutoffs::new(primary, high).unwrap(),
            dedupe_reverse_edges: false,
        }
    }

    struct Output {
        primary: String,
        high: String,
        stats: JoinStats,
    }

    fn run(input: &str, options: &JoinOptions) -> Output {
        let mut primary = EdgeWriter::new(Vec::new(), "primary", OutputOptions::default());
        let mut high = EdgeWriter::new(Vec::new(), "high", OutputOptions::default());
        let stats = join_edges(
            input.as_bytes(),
            Path::new("links.txt"),
            &tables(),
            options,
            &mut primary,
            Some(&mut high),
        )
        .unwrap();

        Output {
            primary: String::from_utf8(primary.finish().unwrap()).unwrap(),
            high: String::from_utf8(high.finish().unwrap()).unwrap(),
            stats,
        }
    }

    #[test]
    fn test_parse_edge_uses_first_two_and_last_fields() {
        let edge = EdgeRecord::parse(ANAPC5_LINE).unwrap();
        assert_eq!(edge.protein1, "9606.ENSP00000261819");
        assert_eq!(edge.protein2, "9606.ENSP00000353549");
        assert_eq!(edge.score_text, "999");
        assert_eq!(edge.score, 999.0);

        let short = EdgeRecord::parse("9606.A 9606.B 0.75").unwrap();
        assert_eq!(short.score, 0.75);
    }

    #[test]
    fn test_parse_edge_rejects_bad_lines() {
        assert_eq!(
            EdgeRecord::parse("9606.A 9606.B"),
            Err(EdgeParseError::TooFewFields)
        );
        assert_eq!(
            EdgeRecord::parse("9606.A 9606.B high"),
            Err(EdgeParseError::InvalidScore("high".to_string()))
        );
        assert!(EdgeRecord::parse("9606.A 9606.B NaN").is_err());
        assert!(EdgeRecord::parse("9606.A 9606.B inf").is_err());
    }

    #[test]
    fn test_row_at_cutoff_is_written() {
        let out = run(&format!("{}\n", ANAPC5_LINE), &options(900.0, None));
        assert_eq!(
            out.primary,
            "ANAPC5\tuniprot:Q9UJX4\tncbigene:51433|ensembl:ENSP00000261819\t\
             9606.ENSP00000353549\t\tensembl:ENSP00000353549\t999\n"
        );
        assert_eq!(out.high, "");
        assert_eq!(out.stats.primary_rows, 1);
    }

    #[test]
    fn test_row_below_cutoff_is_excluded_everywhere() {
        let out = run(ANAPC5_LINE, &options(1000.0, Some(1000.0)));
        assert_eq!(out.primary, "");
        assert_eq!(out.high, "");
        assert_eq!(out.stats.below_cutoff, 1);
    }

    #[test]
    fn test_high_confidence_rows_appear_in_both_streams() {
        let input = "9606.A 9606.B 0 950\n\
                     9606.B 9606.C 0 720\n\
                     9606.C 9606.D 0 400\n\
                     9606.D 9606.E 0 900\n";
        let out = run(input, &options(700.0, Some(900.0)));

        let primary: Vec<&str> = out.primary.lines().collect();
        let high: Vec<&str> = out.high.lines().collect();

        assert_eq!(primary.len(), 3);
        assert_eq!(high, vec![primary[0], primary[2]]);
        assert!(primary[1].starts_with("9606.B\t"));
        assert_eq!(out.stats.high_confidence_rows, 2);
        assert_eq!(out.stats.below_cutoff, 1);
    }

    #[test]
    fn test_header_blank_and_malformed_lines() {
        let input = "protein1 protein2 combined_score\n\
                     \n\
                     9606.A 9606.B 800\n\
                     9606.A 9606.B\n\
                     9606.A 9606.B score\n\
                     9606.C 9606.D 900\n";
        let out = run(input, &options(700.0, None));

        assert!(out.stats.header_skipped);
        assert_eq!(out.stats.malformed, 2);
        assert_eq!(out.stats.primary_rows, 2);
        assert_eq!(out.stats.lines, 6);
        let names: Vec<&str> = out
            .primary
            .lines()
            .map(|l| l.split('\t').next().unwrap())
            .collect();
        assert_eq!(names, vec!["9606.A", "9606.C"]);
    }

    #[test]
    fn test_invalid_utf8_line_is_counted() {
        let input: &[u8] = b"9606.A 9606.B 800\n\xff 9606.B 900\n";
        let mut primary = EdgeWriter::new(Vec::new(), "primary", OutputOptions::default());
        let stats = join_edges(
            input,
            Path::new("links.txt"),
            &tables(),
            &options(0.0, None),
            &mut primary,
            None::<&mut EdgeWriter<Vec<u8>>>,
        )
        .unwrap();

        assert_eq!(stats.malformed, 1);
        assert_eq!(stats.primary_rows, 1);
    }

    #[test]
    fn test_reverse_duplicates_are_kept_unless_deduplicated() {
        let input = "9606.A 9606.B 800\n9606.B 9606.A 800\n";

        let out = run(input, &options(700.0, None));
        assert_eq!(out.stats.primary_rows, 2);

        let dedupe = JoinOptions {
            dedupe_reverse_edges: true,
            ..options(700.0, None)
        };
        let out = run(input, &dedupe);
        assert_eq!(out.stats.primary_rows, 1);
        assert_eq!(out.stats.duplicates, 1);
    }

    #[test]
    fn test_reverse_duplicate_with_other_score_fails() {
        let dedupe = JoinOptions {
            dedupe_reverse_edges: true,
            ..options(700.0, None)
        };
        let mut primary = EdgeWriter::new(Vec::new(), "primary", OutputOptions::default());
        let err = join_edges(
            "9606.A 9606.B 800\n9606.B 9606.A 810\n".as_bytes(),
            Path::new("links.txt"),
            &tables(),
            &dedupe,
            &mut primary,
            None::<&mut EdgeWriter<Vec<u8>>>,
        )
        .unwrap_err();

        assert!(matches!(err, StringnetError::DuplicateEdge { .. }));
    }

    #[test]
    fn test_output_is_deterministic_and_ordered() {
        let input: String = (0..200)
            .map(|i| format!("9606.P{} 9606.Q{} 0 {}\n", i, i, 500 + i * 3))
            .collect();
        let first = run(&input, &options(600.0, Some(900.0)));
        let second = run(&input, &options(600.0, Some(900.0)));

        assert_eq!(first.primary, second.primary);
        assert_eq!(first.high, second.high);

        let order: Vec<usize> = first
            .primary
            .lines()
            .map(|l| l.split('\t').next().unwrap()[6..].parse().unwrap())
            .collect();
        let mut sorted = order.clone();
        sorted.sort_unstable();
        assert_eq!(order, sorted);
    }

    #[test]
    fn test_cutoff_validation() {
        assert!(Cutoffs::new(700.0, Some(900.0)).is_ok());
        assert!(Cutoffs::new(700.0, Some(700.0)).is_ok());
        assert!(Cutoffs::new(900.0, Some(700.0)).is_err());
        assert!(Cutoffs::new(f64::NAN, None).is_err());
        assert!(Cutoffs::new(700.0, Some(f64::INFINITY)).is_err());
    }
}
