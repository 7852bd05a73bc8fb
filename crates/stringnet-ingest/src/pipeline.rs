//! End-to-end transform: load mappings, join edges, commit outputs

use crate::input::open_text;
use crate::join::{join_edges, Cutoffs, JoinOptions, JoinStats};
use crate::mapping::{DuplicatePolicy, MappingSources, MappingStats, MappingTables};
use crate::writer::{OutputOptions, StagedOutput};
use std::path::PathBuf;
use std::time::Instant;
use stringnet_common::checksum::sha256_file;
use stringnet_common::{Result, StringnetError};
use tracing::{info, info_span, warn};

/// Everything one transform run needs
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub links: PathBuf,
    pub mappings: MappingSources,
    pub output: PathBuf,
    pub high_confidence_output: Option<PathBuf>,
    pub cutoffs: Cutoffs,
    pub output_options: OutputOptions,
    pub duplicate_names: DuplicatePolicy,
    pub dedupe_reverse_edges: bool,
}

impl PipelineConfig {
    /// Reject configurations that would clobber an input or pair a
    /// high-confidence file with no cutoff
    pub fn validate(&self) -> Result<()> {
        if self.high_confidence_output.is_some() && self.cutoffs.high_confidence().is_none() {
            return Err(StringnetError::config(
                "a high-confidence output needs a high-confidence cutoff",
            ));
        }

        let inputs = [
            &self.links,
            &self.mappings.names,
            &self.mappings.uniprot,
            &self.mappings.entrez,
        ];
        let outputs = std::iter::once(&self.output).chain(self.high_confidence_output.as_ref());
        for output in outputs {
            if inputs.contains(&output) {
                return Err(StringnetError::config(format!(
                    "output {} is also an input",
                    output.display()
                )));
            }
        }

        if self.high_confidence_output.as_ref() == Some(&self.output) {
            return Err(StringnetError::config(
                "primary and high-confidence outputs must be different files",
            ));
        }

        Ok(())
    }

    fn join_options(&self) -> JoinOptions {
        JoinOptions {
            cutoffs: self.cutoffs,
            dedupe_reverse_edges: self.dedupe_reverse_edges,
        }
    }
}

/// A committed output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSummary {
    pub path: PathBuf,
    pub rows: u64,
    pub sha256: String,
}

/// Result of one transform run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub mappings: MappingStats,
    pub join: JoinStats,
    pub output: OutputSummary,
    pub high_confidence: Option<OutputSummary>,
}

/// Run the transform described by `config`.
///
/// Outputs are staged and only renamed into place after the join pass has
/// finished, so a failing run leaves no partial files behind.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    config.validate()?;
    let _span = info_span!("transform", links = %config.links.display()).entered();
    let started = Instant::now();

    let (tables, mappings) = MappingTables::load(&config.mappings, config.duplicate_names)?;

    let reader = open_text(&config.links)?;
    let mut primary = StagedOutput::create(&config.output, config.output_options)?;
    let mut high_confidence = config
        .high_confidence_output
        .as_deref()
        .map(|path| StagedOutput::create(path, config.output_options))
        .transpose()?;

    let join = join_edges(
        reader,
        &config.links,
        &tables,
        &config.join_options(),
        primary.writer(),
        high_confidence.as_mut().map(StagedOutput::writer),
    )?;

    let output = commit(primary)?;
    let high_confidence = high_confidence.map(commit).transpose()?;

    if join.malformed > 0 {
        warn!(
            malformed = join.malformed,
            path = %config.links.display(),
            "Skipped malformed edge lines"
        );
    }
    info!(
        output = %output.path.display(),
        rows = output.rows,
        sha256 = %output.sha256,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Transform complete"
    );

    Ok(RunSummary {
        mappings,
        join,
        output,
        high_confidence,
    })
}

fn commit(staged: StagedOutput) -> Result<OutputSummary> {
    let path = staged.path().to_path_buf();
    let rows = staged.commit()?;
    let sha256 = sha256_file(&path)?;
    info!(path = %path.display(), rows, "Wrote output");
    Ok(OutputSummary { path, rows, sha256 })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    const NAMES: &str = "\
# species\tpreferred_name\tstring_id
9606\tANAPC5\t9606.ENSP00000261819
9606\tARF5\t9606.ENSP00000000233
";

    const UNIPROT: &str = "\
# species\tuniprot_ac|uniprot_id\tstring_id
9606\tQ9UJX4|APC5_HUMAN\t9606.ENSP00000261819
9606\tP84085|ARF5_HUMAN\t9606.ENSP00000000233
";

    const ENTREZ: &str = "\
# species\tentrez_id\tstring_id
9606\t51433\t9606.ENSP00000261819
9606\t381\t9606.ENSP00000000233
";

    const LINKS: &str = "\
protein1 protein2 neighborhood textmining combined_score
9606.ENSP00000261819 9606.ENSP00000353549 0 0 0 0 0 102 90 987 260 900 0 754 622 999
9606.ENSP00000000233 9606.ENSP00000261819 0 0 0 0 0 0 0 0 0 0 0 0 0 720
9606.ENSP00000000233 9606.ENSP00000353549 0 0 0 0 0 0 0 0 0 0 0 0 0 150
broken line
";

    struct Fixture {
        dir: TempDir,
    }

    impl Fixture {
        fn new(links_name: &str) -> Self {
            let dir = tempfile::tempdir().unwrap();
            fs::write(dir.path().join("names.tsv"), NAMES).unwrap();
            fs::write(dir.path().join("uniprot.tsv"), UNIPROT).unwrap();
            fs::write(dir.path().join("entrez.tsv"), ENTREZ).unwrap();

            let links = dir.path().join(links_name);
            if links_name.ends_with(".gz") {
                let mut encoder = GzEncoder::new(fs::File::create(&links).unwrap(), Compression::fast());
                encoder.write_all(LINKS.as_bytes()).unwrap();
                encoder.finish().unwrap();
            } else {
                fs::write(&links, LINKS).unwrap();
            }
            Self { dir }
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn config(&self, links_name: &str, high: Option<f64>) -> PipelineConfig {
            PipelineConfig {
                links: self.path(links_name),
                mappings: MappingSources {
                    names: self.path("names.tsv"),
                    uniprot: self.path("uniprot.tsv"),
                    entrez: self.path("entrez.tsv"),
                },
                output: self.path("out.tsv"),
                high_confidence_output: high.map(|_| self.path("out.hi_conf.tsv")),
                cutoffs: Cutoffs::new(700.0, high).unwrap(),
                output_options: OutputOptions::default(),
                duplicate_names: DuplicatePolicy::Last,
                dedupe_reverse_edges: false,
            }
        }
    }

    #[test]
    fn test_run_writes_both_streams() {
        let fixture = Fixture::new("links.txt");
        let summary = run(&fixture.config("links.txt", Some(900.0))).unwrap();

        let primary = fs::read_to_string(fixture.path("out.tsv")).unwrap();
        let high = fs::read_to_string(fixture.path("out.hi_conf.tsv")).unwrap();

        assert_eq!(
            primary,
            "ANAPC5\tuniprot:Q9UJX4\tncbigene:51433|ensembl:ENSP00000261819\t\
             9606.ENSP00000353549\t\tensembl:ENSP00000353549\t999\n\
             ARF5\tuniprot:P84085\tncbigene:381|ensembl:ENSP00000000233\t\
             ANAPC5\tuniprot:Q9UJX4\tncbigene:51433|ensembl:ENSP00000261819\t720\n"
        );
        assert_eq!(high, primary.lines().next().map(|l| format!("{}\n", l)).unwrap());

        assert_eq!(summary.mappings.names.entries, 2);
        assert_eq!(summary.join.lines, 5);
        assert!(summary.join.header_skipped);
        assert_eq!(summary.join.malformed, 1);
        assert_eq!(summary.join.below_cutoff, 1);
        assert_eq!(summary.output.rows, 2);
        assert_eq!(summary.high_confidence.as_ref().map(|o| o.rows), Some(1));
        assert_eq!(summary.output.sha256.len(), 64);
    }

    #[test]
    fn test_run_reads_gzip_links_and_is_reproducible() {
        let fixture = Fixture::new("links.txt.gz");
        let config = fixture.config("links.txt.gz", None);

        let first = run(&config).unwrap();
        let bytes = fs::read(&config.output).unwrap();
        let second = run(&config).unwrap();

        assert_eq!(first.output.rows, 2);
        assert_eq!(first.output.sha256, second.output.sha256);
        assert_eq!(bytes, fs::read(&config.output).unwrap());
        assert_eq!(sha256_file(&config.output).unwrap(), first.output.sha256);
        assert!(first.high_confidence.is_none());
    }

    #[test]
    fn test_missing_mapping_file_leaves_no_output() {
        let fixture = Fixture::new("links.txt");
        fs::remove_file(fixture.path("entrez.tsv")).unwrap();

        let err = run(&fixture.config("links.txt", Some(900.0))).unwrap_err();
        assert!(matches!(err, StringnetError::Read { .. }));
        assert!(!fixture.path("out.tsv").exists());
        assert!(!fixture.path("out.hi_conf.tsv").exists());
    }

    #[test]
    fn test_name_containing_delimiter_fails_without_output() {
        let fixture = Fixture::new("links.txt");
        fs::write(
            fixture.path("names.tsv"),
            "9606\tCyclin D1\t9606.ENSP00000261819\n",
        )
        .unwrap();

        let mut config = fixture.config("links.txt", None);
        config.output_options.delimiter = b' ';

        let err = run(&config).unwrap_err();
        assert!(matches!(err, StringnetError::Write { .. }));
        assert!(!config.output.exists());
    }

    #[test]
    fn test_validate_rejects_output_over_input() {
        let fixture = Fixture::new("links.txt");
        let mut config = fixture.config("links.txt", None);
        config.output = fixture.path("names.tsv");
        assert!(matches!(config.validate(), Err(StringnetError::Config(_))));

        let mut config = fixture.config("links.txt", Some(900.0));
        config.high_confidence_output = Some(config.output.clone());
        assert!(matches!(config.validate(), Err(StringnetError::Config(_))));
    }

    #[test]
    fn test_validate_requires_high_confidence_cutoff() {
        let fixture = Fixture::new("links.txt");
        let mut config = fixture.config("links.txt", None);
        config.high_confidence_output = Some(fixture.path("hi.tsv"));
        assert!(config.validate().is_err());
    }
}
