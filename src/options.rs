use crate::aggregate;
use crate::error::Error;
use crate::geometry::{CacheGeometry, MIN_BLOCK_SIZE};
use crate::policy::{self, ReplacementPolicy};
use crate::sweep::{Defaults, Fixed};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::Duration;
use utils::fs::PathExt;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Every instruction x data cache combination.
    Full,
    /// Vary one cache at a time.
    Optimized,
    /// Only aggregate existing reports.
    Skip,
}

/// Parse `START..END` or `START:END`.
fn parse_line_range(value: &str) -> Result<LineRange, String> {
    let (start, end) = value
        .split_once("..")
        .or_else(|| value.split_once(':'))
        .ok_or_else(|| format!("{value:?} is not of the form START..END"))?;
    let parse = |v: &str| {
        v.trim()
            .parse::<usize>()
            .map_err(|err| format!("bad line number {v:?}: {err}"))
    };
    Ok(LineRange {
        start: parse(start)?,
        end: parse(end)?,
    })
}

#[allow(clippy::struct_excessive_bools)]
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about = "sweep sim-cache L1 configurations and aggregate the reports")]
pub struct Options {
    #[clap(
        short = 'p',
        long = "config",
        aliases = ["path"],
        help = "path to sweep yaml file"
    )]
    pub config_path: Option<PathBuf>,

    #[clap(
        short = 's',
        long = "size",
        help = "total size of each L1 cache in bytes",
        allow_negative_numbers = true
    )]
    pub size: Option<i64>,

    #[clap(short = 't', long = "trace", help = "trace or benchmark passed to the simulator")]
    pub trace: Option<PathBuf>,

    #[clap(short = 'm', long = "mode", help = "sweep mode (full, optimized, skip)")]
    pub mode: Option<String>,

    #[clap(
        short = 'c',
        long = "concurrency",
        help = "number of simulations to run concurrently",
        allow_negative_numbers = true
    )]
    pub concurrency: Option<i64>,

    #[clap(long = "simulator", help = "path to the sim-cache executable")]
    pub simulator: Option<PathBuf>,

    #[clap(
        short = 'r',
        long = "results-dir",
        aliases = ["results"],
        help = "directory of simulator reports"
    )]
    pub results_dir: Option<PathBuf>,

    #[clap(short = 'o', long = "output", help = "aggregated CSV output path")]
    pub output: Option<PathBuf>,

    #[clap(
        short = 'l',
        long = "lines",
        help = "report lines holding metrics, e.g. 70..128",
        value_parser = parse_line_range
    )]
    pub lines: Option<LineRange>,

    #[clap(long = "skip", help = "number of combinations to skip when resuming a full sweep")]
    pub skip: Option<usize>,

    #[clap(long = "policy", help = "replacement policy to sweep (repeatable)")]
    pub policies: Vec<ReplacementPolicy>,

    #[clap(long = "default-il1", help = "il1 geometry held fixed by the optimized sweep")]
    pub default_il1: Option<CacheGeometry>,

    #[clap(long = "default-il1-policy", help = "il1 policy held fixed by the optimized sweep")]
    pub default_il1_policy: Option<ReplacementPolicy>,

    #[clap(long = "default-dl1", help = "dl1 geometry held fixed by the optimized sweep")]
    pub default_dl1: Option<CacheGeometry>,

    #[clap(long = "default-dl1-policy", help = "dl1 policy held fixed by the optimized sweep")]
    pub default_dl1_policy: Option<ReplacementPolicy>,

    #[clap(long = "timeout", help = "per simulation timeout in seconds")]
    pub timeout: Option<f64>,

    #[clap(long = "strict", help = "require identical metric layout in every report")]
    pub strict: bool,

    #[clap(long = "no-sort", help = "keep directory order of reports")]
    pub no_sort: bool,

    #[clap(long = "clean", help = "remove existing reports before simulating")]
    pub clean: bool,

    #[clap(
        long = "dry",
        aliases = ["dry-run"],
        help = "print the planned simulations without running them"
    )]
    pub dry_run: bool,

    #[clap(long = "no-progress", help = "hide progress bar")]
    pub no_progress: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl From<LineRange> for Range<usize> {
    fn from(range: LineRange) -> Self {
        range.start..range.end
    }
}

/// Sweep configuration as written in a yaml file.
///
/// Every field is optional, command line options take precedence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SweepFile {
    pub size: Option<i64>,
    pub trace: Option<PathBuf>,
    pub mode: Option<String>,
    pub concurrency: Option<i64>,
    pub simulator: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub lines: Option<LineRange>,
    pub skip: Option<usize>,
    #[serde(default)]
    pub policies: Vec<ReplacementPolicy>,
    pub defaults: Option<Defaults>,
    pub timeout: Option<f64>,
    #[serde(default)]
    pub strict: bool,
    pub sort: Option<bool>,
}

impl SweepFile {
    pub fn from(path: impl AsRef<Path>) -> Result<Self, Error> {
        let reader = utils::fs::open_readable(path)?;
        Self::from_reader(reader)
    }

    pub fn from_reader(reader: impl std::io::BufRead) -> Result<Self, Error> {
        let sweep = serde_yaml::from_reader(reader)?;
        Ok(sweep)
    }

    pub fn from_str(s: impl AsRef<str>) -> Result<Self, Error> {
        let sweep = serde_yaml::from_str(s.as_ref())?;
        Ok(sweep)
    }

    /// Resolve relative paths based on the sweep file location.
    pub fn resolve(&mut self, base: impl AsRef<Path>) {
        let base = base.as_ref();
        for path in [
            self.trace.as_mut(),
            self.simulator.as_mut(),
            self.results_dir.as_mut(),
            self.output.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            *path = path.resolve(base);
        }
    }
}

/// Validated sweep configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepConfig {
    pub size: u32,
    pub trace: Option<PathBuf>,
    pub mode: Mode,
    pub concurrency: usize,
    pub simulator: PathBuf,
    pub results_dir: PathBuf,
    pub output: PathBuf,
    pub skip: usize,
    pub policies: Vec<ReplacementPolicy>,
    pub defaults: Defaults,
    pub aggregate: aggregate::Options,
    pub timeout: Option<Duration>,
    pub clean: bool,
}

pub const DEFAULT_SIZE: i64 = 256;

impl SweepConfig {
    /// Merge command line options over the (optional) sweep file and validate.
    ///
    /// Fails before any simulation is started.
    pub fn new(options: &Options, file: Option<SweepFile>) -> Result<Self, Error> {
        let file = file.unwrap_or_default();

        let size = options.size.or(file.size).unwrap_or(DEFAULT_SIZE);
        if size < i64::from(MIN_BLOCK_SIZE) {
            return Err(Error::config(format!(
                "cache size must be at least {MIN_BLOCK_SIZE} as the simulator requires block sizes of at least {MIN_BLOCK_SIZE} (got {size})"
            )));
        }
        let size = u32::try_from(size)
            .map_err(|_| Error::config(format!("cache size {size} is too large")))?;

        let concurrency = options
            .concurrency
            .or(file.concurrency)
            .unwrap_or_else(|| i64::try_from(num_cpus::get_physical()).unwrap_or(1));
        if concurrency < 1 {
            return Err(Error::config(format!(
                "cannot run {concurrency} simulations concurrently"
            )));
        }
        let concurrency = usize::try_from(concurrency)
            .map_err(|_| Error::config(format!("concurrency {concurrency} is too large")))?;

        let mode = match options.mode.as_ref().or(file.mode.as_ref()) {
            None => Mode::Full,
            Some(mode) => mode.parse().map_err(|_| {
                use strum::IntoEnumIterator;
                let valid: Vec<String> = Mode::iter().map(|m| m.to_string()).collect();
                Error::config(format!(
                    "expected one of {valid:?} as sweep mode (got {mode:?})"
                ))
            })?,
        };

        let trace = options.trace.clone().or(file.trace);
        if trace.is_none() && mode != Mode::Skip {
            return Err(Error::config(format!("{mode} sweep requires a trace")));
        }

        let lines: Range<usize> = options
            .lines
            .or(file.lines)
            .map_or(aggregate::Options::default().lines, Into::into);
        if lines.start > lines.end {
            return Err(Error::config(format!(
                "line range {}..{} is empty",
                lines.start, lines.end
            )));
        }

        let policies = if !options.policies.is_empty() {
            options.policies.clone()
        } else if !file.policies.is_empty() {
            file.policies
        } else {
            policy::defaults()
        };

        let file_defaults = file.defaults.unwrap_or_default();
        let defaults = Defaults {
            il1: Fixed {
                geometry: options.default_il1.unwrap_or(file_defaults.il1.geometry),
                policy: options.default_il1_policy.unwrap_or(file_defaults.il1.policy),
            },
            dl1: Fixed {
                geometry: options.default_dl1.unwrap_or(file_defaults.dl1.geometry),
                policy: options.default_dl1_policy.unwrap_or(file_defaults.dl1.policy),
            },
        };

        let timeout = match options.timeout.or(file.timeout) {
            Some(secs) if secs > 0.0 => Some(Duration::try_from_secs_f64(secs).map_err(|_| {
                Error::config(format!("timeout of {secs} seconds is out of range"))
            })?),
            Some(secs) => {
                return Err(Error::config(format!(
                    "timeout must be a positive number of seconds (got {secs})"
                )))
            }
            None => None,
        };

        Ok(Self {
            size,
            trace,
            mode,
            concurrency,
            simulator: options
                .simulator
                .clone()
                .or(file.simulator)
                .unwrap_or_else(|| PathBuf::from("./sim-cache")),
            results_dir: options
                .results_dir
                .clone()
                .or(file.results_dir)
                .unwrap_or_else(|| PathBuf::from("results")),
            output: options
                .output
                .clone()
                .or(file.output)
                .unwrap_or_else(|| PathBuf::from("results.csv")),
            skip: options.skip.or(file.skip).unwrap_or(0),
            policies,
            defaults,
            aggregate: aggregate::Options {
                lines,
                strict: options.strict || file.strict,
                sort: !options.no_sort && file.sort.unwrap_or(true),
            },
            timeout,
            clean: options.clean,
        })
    }

    /// Load the sweep file referenced by `options`, if any, and validate.
    pub fn from_options(options: &Options) -> Result<Self, Error> {
        let file = match &options.config_path {
            Some(path) => {
                let mut file = SweepFile::from(path)?;
                if let Some(base) = path.parent() {
                    file.resolve(base);
                }
                Some(file)
            }
            None => None,
        };
        Self::new(options, file)
    }
}
