//! DUALLOG - Append/Prepend Ordered Log Benchmark
//! Runs every benchmark phase against the in-process store and prints
//! the timings. Tunables come from `DUALLOG_*` environment variables.

use duallog::bench::{BenchmarkDriver, BenchmarkReport};
use duallog::config::Config;
use duallog::error::Result;
use duallog::store::MemoryStore;

fn run(config: Config) -> Result<BenchmarkReport> {
    config.ensure_dirs()?;
    let snapshot_path = config.snapshot_path.clone();
    let mut driver = BenchmarkDriver::new(MemoryStore::new(), config)?;

    driver.prepare()?;
    let mut operations = vec![driver.insert_phase()?];
    if let Some(path) = &snapshot_path {
        driver.log().store().save_snapshot(path)?;
    }
    operations.push(driver.retrieve_all_phase()?);
    operations.push(driver.retrieve_window_phase()?);
    operations.push(driver.remove_phase()?);
    operations.push(driver.teardown_phase()?);

    println!("{}", driver.log().store().metrics().report());
    Ok(BenchmarkReport {
        operations,
        warnings: driver.warnings().to_vec(),
    })
}

fn main() {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(err) => {
            eprintln!("[ERROR] Invalid configuration: {}", err);
            std::process::exit(2);
        }
    };

    println!();
    println!(
        "  DUALLOG benchmark: {} items, {}% prepends, {} byte blobs, {:?}",
        config.number_of_items, config.prepend_pct, config.blob_size, config.insert_mode
    );
    println!();

    match run(config) {
        Ok(report) => print!("{}", report),
        Err(err) => {
            eprintln!("[ERROR] Benchmark aborted: {}", err);
            std::process::exit(1);
        }
    }
}
