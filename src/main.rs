use cachesweep::options::Options;
use cachesweep::{geometry, progress, SimCache, SweepConfig};
use clap::Parser;
use color_eyre::eyre::{self, WrapErr};
use console::{style, Style};
use std::sync::Arc;

fn print_dry_run(config: &SweepConfig) -> eyre::Result<()> {
    let codes = geometry::codes(config.size);
    let plan = cachesweep::plan(config, &codes)?;
    let sim = SimCache::new(
        &config.simulator,
        config.trace.clone().unwrap_or_default(),
    );
    for (phase, runs) in plan.phases.iter().enumerate() {
        println!("phase {}: {} simulations", phase + 1, runs.len());
        for id in runs {
            let invocation = cachesweep::sweep::invocation(*id, &codes, &config.results_dir)?;
            println!(
                "{} {}",
                sim.executable.display(),
                sim.args(&invocation).join(" ")
            );
        }
    }
    println!(
        "\n => would run {} simulations ({} skipped) over {} configurations",
        plan.len(),
        plan.skipped,
        codes.len()
    );
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> eyre::Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let start = std::time::Instant::now();

    // load env variables from .env files
    dotenv::dotenv().ok();

    let options = Options::parse();
    let config = SweepConfig::from_options(&options).wrap_err("invalid sweep configuration")?;
    log::debug!("{:#?}", &config);

    if options.dry_run {
        return print_dry_run(&config);
    }

    println!("concurrency: {}", &config.concurrency);

    let mut sim = SimCache::new(
        &config.simulator,
        config.trace.clone().unwrap_or_default(),
    );
    sim.timeout = config.timeout;

    let bar = progress::bar(options.no_progress);
    let outcome = cachesweep::run(&config, Arc::new(sim), Some(bar.clone()))
        .await
        .wrap_err_with(|| format!("{} sweep failed", config.mode))?;
    bar.finish();

    let cachesweep::Outcome { summary, table, .. } = outcome;
    let num_failed = summary.failures.len();
    let (submitted, skipped) = (summary.submitted, summary.skipped);
    for failure in summary.failures {
        eprintln!(
            "============ {} ============",
            style(format!("{} failed", failure.id)).red()
        );
        eprintln!("{:?}\n", failure.error.into_eyre());
    }

    let failed_msg = style(format!("{num_failed} failed"));
    println!(
        "\n\n => ran {} simulations in {:?}: {} skipped, {}",
        submitted,
        start.elapsed(),
        skipped,
        if num_failed > 0 {
            failed_msg.red()
        } else {
            failed_msg
        },
    );
    println!(
        " => aggregated {} reports into {}",
        Style::new().green().apply_to(table.columns().len()),
        config.output.display(),
    );

    std::process::exit(i32::from(num_failed > 0));
}
