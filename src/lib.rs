#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod aggregate;
pub mod error;
pub mod geometry;
pub mod options;
pub mod policy;
pub mod pool;
pub mod progress;
pub mod run;
pub mod sim;
pub mod sweep;

pub use aggregate::ResultTable;
pub use error::Error;
pub use geometry::{CacheGeometry, ConfigurationCode};
pub use options::{Mode, SweepConfig};
pub use policy::ReplacementPolicy;
pub use pool::Pool;
pub use run::{Invocation, RunIdentity};
pub use sim::{SimCache, Simulator};

use indicatif::ProgressBar;
use std::sync::Arc;

/// Result of a sweep followed by aggregation.
#[derive(Debug)]
pub struct Outcome {
    pub codes: Vec<ConfigurationCode>,
    pub summary: sweep::Summary,
    pub table: ResultTable,
}

/// Plan the simulations of the configured sweep mode.
pub fn plan(config: &SweepConfig, codes: &[ConfigurationCode]) -> Result<sweep::Plan, Error> {
    match config.mode {
        Mode::Full => Ok(sweep::plan_full(
            codes.len(),
            &config.policies,
            config.skip,
        )),
        Mode::Optimized => sweep::plan_optimized(codes, &config.policies, &config.defaults),
        Mode::Skip => Ok(sweep::Plan::default()),
    }
}

/// Simulate every planned configuration, then aggregate all reports into
/// [`SweepConfig::output`].
pub async fn run(
    config: &SweepConfig,
    simulator: Arc<dyn Simulator>,
    bar: Option<ProgressBar>,
) -> Result<Outcome, Error> {
    let codes = geometry::codes(config.size);
    if codes.is_empty() {
        log::warn!(
            "no cache geometry of {} bytes with block size >= {}",
            config.size,
            geometry::MIN_BLOCK_SIZE
        );
    }
    log::info!("{} configurations of {} bytes", codes.len(), config.size);

    let plan = plan(config, &codes)?;
    let mut pool = Pool::new(simulator, config.concurrency)?;
    if let Some(bar) = bar {
        pool = pool.with_progress(bar);
    }

    if config.mode != Mode::Skip {
        if config.clean && config.results_dir.is_dir() {
            log::info!("removing {}", config.results_dir.display());
            utils::fs::remove_dir(&config.results_dir)?;
        }
        utils::fs::create_dirs(&config.results_dir)?;
    }

    let summary = sweep::execute(&mut pool, &plan, &codes, &config.results_dir).await?;

    let table = aggregate::aggregate(&config.results_dir, &codes, &config.aggregate)?;
    table.save(&config.output)?;
    log::info!(
        "wrote {} runs x {} rows to {}",
        table.columns().len(),
        table.labels().len(),
        config.output.display()
    );

    Ok(Outcome {
        codes,
        summary,
        table,
    })
}

#[cfg(test)]
mod tests {
    use super::{sim, Invocation, Mode, ReplacementPolicy, RunIdentity, SweepConfig, Simulator};
    use crate::options::Options;
    use color_eyre::eyre;
    use pretty_assertions::assert_eq as diff_assert_eq;
    use std::io::Write;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    static INIT: std::sync::Once = std::sync::Once::new();

    pub fn init_test() {
        INIT.call_once(|| {
            env_logger::builder().is_test(true).init();
            // another test may already have installed a hook
            color_eyre::install().ok();
        });
    }

    const HEADER_LINES: usize = 2;

    /// Writes a report in the layout of sim-cache instead of simulating.
    #[derive(Debug, Default)]
    struct FakeSimCache {
        calls: AtomicUsize,
    }

    fn write_report(invocation: &Invocation) -> Result<(), sim::Error> {
        let il1 = invocation.il1.geometry().map_err(std::io::Error::other)?;
        let dl1 = invocation.dl1.geometry().map_err(std::io::Error::other)?;
        let mut writer = utils::fs::open_writable(&invocation.report)?;
        writeln!(writer, "sim-cache: SimpleScalar/PISA Tool Set")?;
        writeln!(writer, "sim: ** simulation statistics **")?;
        writeln!(writer, "il1.accesses {} # total number of accesses", 1000)?;
        writeln!(writer, "il1.misses {} # total number of misses", il1.sets)?;
        writeln!(writer, "dl1.misses {} # total number of misses", dl1.associativity)?;
        writeln!(writer, "sim_elapsed_time 1 # total simulation time in seconds")?;
        Ok(())
    }

    #[async_trait::async_trait]
    impl Simulator for FakeSimCache {
        async fn simulate(&self, invocation: &Invocation) -> Result<(), sim::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            write_report(invocation)
        }
    }

    fn config(dir: &Path, args: &[&str]) -> eyre::Result<SweepConfig> {
        use clap::Parser;
        let results = dir.join("results");
        let output = dir.join("results.csv");
        let mut all = vec![
            "cachesweep".to_string(),
            "--results".to_string(),
            results.to_string_lossy().to_string(),
            "--output".to_string(),
            output.to_string_lossy().to_string(),
            "--lines".to_string(),
            format!("{HEADER_LINES}..{}", HEADER_LINES + 3),
            "--trace".to_string(),
            "basicmath.ss".to_string(),
        ];
        all.extend(args.iter().map(ToString::to_string));
        let options = Options::try_parse_from(all)?;
        Ok(SweepConfig::new(&options, None)?)
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_sweep_end_to_end() -> eyre::Result<()> {
        init_test();
        let dir = tempfile::tempdir()?;
        let config = config(dir.path(), &["--size", "64", "--policy", "l", "-c", "4"])?;
        assert_eq!(config.mode, Mode::Full);

        let sim = Arc::new(FakeSimCache::default());
        let outcome = super::run(&config, sim.clone(), None).await?;

        let num_configs = outcome.codes.len();
        assert_eq!(num_configs, 10);
        assert_eq!(sim.calls.load(Ordering::SeqCst), num_configs * num_configs);
        assert_eq!(outcome.summary.submitted, num_configs * num_configs);
        assert!(outcome.summary.failures.is_empty());

        let table = &outcome.table;
        assert_eq!(table.columns().len(), num_configs * num_configs);
        assert_eq!(table.labels().len(), 8 + 3);
        diff_assert_eq!(
            &table.labels()[8..],
            &["il1.accesses", "il1.misses", "dl1.misses"]
        );
        for column in table.columns() {
            let il1 = outcome.codes[column.id.il1].geometry()?;
            let dl1 = outcome.codes[column.id.dl1].geometry()?;
            assert_eq!(table.get(column, "il1<nsets>"), Some(&*il1.sets.to_string()));
            assert_eq!(table.get(column, "il1.misses"), Some(&*il1.sets.to_string()));
            assert_eq!(
                table.get(column, "dl1.misses"),
                Some(&*dl1.associativity.to_string())
            );
        }
        assert!(config.output.is_file());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn optimized_sweep_end_to_end() -> eyre::Result<()> {
        init_test();
        let dir = tempfile::tempdir()?;
        let config = config(dir.path(), &["--mode", "optimized", "-c", "3"])?;

        let sim = Arc::new(FakeSimCache::default());
        let outcome = super::run(&config, sim.clone(), None).await?;
        let num_configs = outcome.codes.len();
        assert_eq!(num_configs, 21);
        assert_eq!(outcome.summary.submitted, 2 * num_configs * 2);
        assert_eq!(sim.calls.load(Ordering::SeqCst), 2 * num_configs * 2);
        // the default il1 x default dl1 run is part of both phases
        assert_eq!(outcome.table.columns().len(), 2 * num_configs * 2 - 1);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn skip_mode_only_aggregates() -> eyre::Result<()> {
        init_test();
        let dir = tempfile::tempdir()?;
        let sim = Arc::new(FakeSimCache::default());

        let first = config(dir.path(), &["--size", "16", "--skip", "3"])?;
        let outcome = super::run(&first, sim.clone(), None).await?;
        let total = 2 * 2 * outcome.codes.len() * outcome.codes.len();
        assert_eq!(outcome.summary.skipped, 3);
        assert_eq!(outcome.table.columns().len(), total - 3);

        let calls = sim.calls.load(Ordering::SeqCst);
        let again = config(dir.path(), &["--size", "16", "--mode", "skip"])?;
        let outcome = super::run(&again, sim.clone(), None).await?;
        assert_eq!(sim.calls.load(Ordering::SeqCst), calls);
        assert_eq!(outcome.table.columns().len(), total - 3);
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn clean_removes_stale_reports_before_sweeping() -> eyre::Result<()> {
        init_test();
        let dir = tempfile::tempdir()?;
        let sim = Arc::new(FakeSimCache::default());
        let sweep = config(dir.path(), &["--size", "16", "--policy", "l", "--clean"])?;

        // not part of a sweep with policy l only
        let stale = RunIdentity {
            il1: 0,
            il1_policy: ReplacementPolicy::FIFO,
            dl1: 0,
            dl1_policy: ReplacementPolicy::FIFO,
        };
        let codes = crate::geometry::codes(16);
        let stale_invocation = crate::sweep::invocation(stale, &codes, &sweep.results_dir)?;

        write_report(&stale_invocation)?;
        let outcome = super::run(&sweep, sim.clone(), None).await?;
        assert!(!stale_invocation.report.exists());
        assert_eq!(outcome.table.columns().len(), 3 * 3);
        assert!(outcome.table.column(&stale).is_none());

        // aggregating never touches the results directory
        write_report(&stale_invocation)?;
        let calls = sim.calls.load(Ordering::SeqCst);
        let skip = config(dir.path(), &["--size", "16", "--mode", "skip", "--clean"])?;
        let outcome = super::run(&skip, sim.clone(), None).await?;
        assert_eq!(sim.calls.load(Ordering::SeqCst), calls);
        assert!(stale_invocation.report.exists());
        assert_eq!(outcome.table.columns().len(), 3 * 3 + 1);
        assert!(outcome.table.column(&stale).is_some());
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn empty_enumeration_yields_empty_table() -> eyre::Result<()> {
        init_test();
        let dir = tempfile::tempdir()?;
        let config = config(dir.path(), &["--size", "12"])?;
        let sim = Arc::new(FakeSimCache::default());
        let outcome = super::run(&config, sim.clone(), None).await?;
        assert!(outcome.codes.is_empty());
        assert_eq!(sim.calls.load(Ordering::SeqCst), 0);
        assert!(outcome.table.columns().is_empty());
        assert!(config.output.is_file());
        Ok(())
    }
}
