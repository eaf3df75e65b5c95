#![deny(
    clippy::all,
    clippy::cargo,
    clippy::nursery,
    clippy::must_use_candidate,
    clippy::perf
    // clippy::restriction,
    // clippy::pedantic
)]
// now allow a few rules which are denied by the above statement
// --> they are ridiculous and not necessary
#![allow(
    clippy::suboptimal_flops,
    clippy::redundant_pub_crate,
    clippy::fallible_impl_from
)]
#![deny(missing_debug_implementations)]

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use litmus_reorder::schedule::{FirstMover, Lockstep, Schedule};
use litmus_reorder::{Experiment, Litmus, StopCondition, Summary, Variant};
use std::time::Duration;

/// Runs a litmus test for instruction reordering and reports how often an
/// outcome forbidden under sequential consistency was observed.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Which litmus test to run.
    #[arg(long, value_enum, default_value_t = Variant::CasFailure)]
    test: Variant,

    /// Stop after this many iterations.
    #[arg(short = 'n', long, conflicts_with = "duration")]
    iterations: Option<u64>,

    /// Stop after this many seconds.
    #[arg(short = 'd', long)]
    duration: Option<f64>,

    /// Print progress every this many iterations.
    #[arg(long, default_value_t = litmus_reorder::experiment::DEFAULT_REPORT_EVERY)]
    report_every: u64,

    /// Put a full fence around every shared access. Must observe nothing.
    #[arg(long)]
    fenced: bool,

    /// Run mutator and observer strictly one at a time. Must observe nothing.
    #[arg(long)]
    lockstep: bool,

    /// List the available tests and exit.
    #[arg(long)]
    list: bool,
}

impl Cli {
    fn stop_condition(&self) -> Result<StopCondition> {
        match (self.iterations, self.duration) {
            (Some(n), _) => Ok(StopCondition::Count(n)),
            (None, Some(secs)) => {
                let duration = Duration::try_from_secs_f64(secs)
                    .with_context(|| format!("invalid duration: {secs} seconds"))?;
                Ok(StopCondition::Duration(duration))
            }
            (None, None) => Ok(self.test.default_stop()),
        }
    }
}

fn print_banner(litmus: &dyn Litmus, stop: StopCondition) {
    let title = litmus.title();
    println!("{title}");
    println!("{}", "-".repeat(title.len()));
    println!("{}", litmus.description());
    println!();
    println!("Running test for {stop}...");
    println!();
}

fn print_analysis(litmus: &dyn Litmus, summary: &Summary) {
    let statistics = &summary.statistics;
    println!();
    println!("Final results: {}", statistics.snapshot());
    for line in statistics.verdict().lines(litmus.subject()) {
        println!("{line}");
    }
}

fn run<S: Schedule>(
    cli: &Cli,
    litmus: &dyn Litmus,
    schedule: S,
    stop: StopCondition,
) -> Result<Summary> {
    Experiment::new(litmus)
        .with_schedule(schedule)
        .fenced(cli.fenced)
        .report_every(cli.report_every)
        .run(stop, |statistics| println!("{}", statistics.report()))
        .with_context(|| format!("harness failure while running {}", litmus.title()))
}

fn main() -> Result<()> {
    let env = env_logger::Env::new()
        .filter_or("LITMUS_LOG", "info")
        .write_style("LITMUS_LOG_STYLE");
    env_logger::init_from_env(env);

    let cli = Cli::parse();

    if cli.list {
        for variant in Variant::ALL {
            let name = variant
                .to_possible_value()
                .map(|v| v.get_name().to_owned())
                .unwrap_or_default();
            println!("{name:<24} {}", variant.litmus().title());
        }
        return Ok(());
    }

    if cli.report_every == 0 {
        bail!("--report-every must be at least 1");
    }

    let stop = cli.stop_condition()?;
    let litmus = cli.test.litmus();
    print_banner(&*litmus, stop);

    let summary = if cli.lockstep {
        run(&cli, &*litmus, Lockstep::new(FirstMover::Alternate), stop)?
    } else {
        run(&cli, &*litmus, litmus_reorder::schedule::Concurrent, stop)?
    };

    print_analysis(&*litmus, &summary);
    Ok(())
}
