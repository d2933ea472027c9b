use crate::error::Error;
use crate::geometry::ConfigurationCode;
use crate::run::{RunIdentity, REPORT_EXTENSION};
use std::io::BufRead;
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Labels of the identifier rows preceding the simulator metrics.
pub const DESCRIPTORS: [&str; 8] = [
    "il1<nsets>",
    "il1<bsize>",
    "il1<assoc>",
    "il1<repl>",
    "dl1<nsets>",
    "dl1<bsize>",
    "dl1<assoc>",
    "dl1<repl>",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    /// Zero based, end exclusive range of report lines holding metrics.
    pub lines: Range<usize>,
    /// Require every report to share the metric layout of the first one.
    pub strict: bool,
    /// Order columns by report file name instead of directory order.
    pub sort: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lines: 70..128,
            strict: false,
            sort: true,
        }
    }
}

/// A `<description> <value>` line of a simulator report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metric {
    pub description: String,
    pub value: String,
}

/// Read the metric lines `lines` of a report.
///
/// Reports shorter than the range yield fewer metrics.
pub fn read_report(path: impl AsRef<Path>, lines: &Range<usize>) -> Result<Vec<Metric>, Error> {
    let path = path.as_ref();
    let reader = utils::fs::open_readable(path)?;
    let mut metrics = Vec::with_capacity(lines.len());
    for (line_idx, line) in reader
        .lines()
        .enumerate()
        .skip(lines.start)
        .take(lines.len())
    {
        let line = line?;
        let mut tokens = line.split_whitespace();
        match (tokens.next(), tokens.next()) {
            (Some(description), Some(value)) => metrics.push(Metric {
                description: description.to_string(),
                value: value.to_string(),
            }),
            _ => {
                return Err(Error::Report {
                    path: path.to_path_buf(),
                    line: line_idx + 1,
                    reason: format!("expected <description> <value>, got {line:?}"),
                })
            }
        }
    }
    Ok(metrics)
}

/// One simulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub id: RunIdentity,
    pub report: PathBuf,
    /// Identifier fields followed by metric values.
    pub cells: Vec<String>,
}

/// Aggregated simulator results.
///
/// Rows are the [`DESCRIPTORS`] followed by the metric descriptions of the
/// first report, each column holds one simulator run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    labels: Vec<String>,
    columns: Vec<Column>,
}

impl Default for ResultTable {
    fn default() -> Self {
        Self {
            labels: DESCRIPTORS.iter().map(ToString::to_string).collect(),
            columns: vec![],
        }
    }
}

impl ResultTable {
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, id: &RunIdentity) -> Option<&Column> {
        self.columns.iter().find(|column| column.id == *id)
    }

    /// Cell of `column` in the row labeled `label`.
    #[must_use]
    pub fn get<'a>(&self, column: &'a Column, label: &str) -> Option<&'a str> {
        let row = self.labels.iter().position(|l| l == label)?;
        column.cells.get(row).map(String::as_str)
    }

    /// Write as CSV, one record per run with the row labels as header.
    pub fn write_csv(&self, writer: impl std::io::Write) -> Result<(), Error> {
        // columns of inconsistent reports are written as they are
        let mut csv_writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(writer);
        csv_writer.write_record(&self.labels)?;
        for column in &self.columns {
            csv_writer.write_record(&column.cells)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let writer = utils::fs::open_writable(path)?;
        self.write_csv(writer)
    }
}

fn identifier_fields(
    id: &RunIdentity,
    codes: &[ConfigurationCode],
) -> Result<Vec<String>, Error> {
    let mut fields = Vec::with_capacity(DESCRIPTORS.len());
    for (index, policy) in [(id.il1, id.il1_policy), (id.dl1, id.dl1_policy)] {
        let code = codes.get(index).ok_or(Error::UnknownConfiguration {
            index,
            len: codes.len(),
        })?;
        fields.extend(code.geometry()?.fields());
        fields.push(policy.to_string());
    }
    Ok(fields)
}

fn check_layout(
    reference: &(PathBuf, Vec<String>),
    path: &Path,
    metrics: &[Metric],
) -> Result<(), Error> {
    let (reference_path, descriptions) = reference;
    let misaligned = |reason: String| Error::Misaligned {
        path: path.to_path_buf(),
        reference: reference_path.clone(),
        reason,
    };
    if metrics.len() != descriptions.len() {
        return Err(misaligned(format!(
            "{} metrics instead of {}",
            metrics.len(),
            descriptions.len()
        )));
    }
    for (row, (metric, expected)) in metrics.iter().zip(descriptions).enumerate() {
        if metric.description != *expected {
            return Err(misaligned(format!(
                "metric {row} is {:?} instead of {expected:?}",
                metric.description
            )));
        }
    }
    Ok(())
}

/// Aggregate every report in `results_dir` into a single table.
///
/// `codes` must be the configuration list the runs were generated from,
/// report names are decoded through it.
pub fn aggregate(
    results_dir: impl AsRef<Path>,
    codes: &[ConfigurationCode],
    options: &Options,
) -> Result<ResultTable, Error> {
    let results_dir = results_dir.as_ref();
    let mut reports = utils::fs::files_with_extension(results_dir, REPORT_EXTENSION)?;
    if options.sort {
        reports.sort();
    }
    log::info!(
        "aggregating {} reports in {}",
        reports.len(),
        results_dir.display()
    );

    let mut table = ResultTable::default();
    let mut reference: Option<(PathBuf, Vec<String>)> = None;

    for report in reports {
        let metrics = read_report(&report, &options.lines)?;

        match &reference {
            None => {
                let descriptions: Vec<String> =
                    metrics.iter().map(|m| m.description.clone()).collect();
                table.labels.extend(descriptions.iter().cloned());
                reference = Some((report.clone(), descriptions));
            }
            Some(reference) if options.strict => check_layout(reference, &report, &metrics)?,
            Some(_) => {}
        }

        let id = RunIdentity::from_path(&report)?;
        let mut cells = identifier_fields(&id, codes)?;
        cells.extend(metrics.into_iter().map(|m| m.value));
        log::trace!("{}: {} cells", report.display(), cells.len());
        table.columns.push(Column { id, report, cells });
    }
    Ok(table)
}
