use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::process;
use tracing_subscriber::EnvFilter;

use craigsail::{
    append_sqlite, open_database, profile_for, run, write_csv_snapshot, JsonFileSource, RunConfig,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 3 {
        eprintln!("Usage: craigsail <category> <data_path> <city>... [key=value filters...]");
        eprintln!("  e.g. craigsail boo ./data seattle denver min_price=500");
        process::exit(1);
    }

    let category = &args[0];
    let data_path = Path::new(&args[1]);
    if !data_path.is_dir() {
        eprintln!("data path must be an existing directory: {}", data_path.display());
        process::exit(1);
    }

    // Everything after the data path is a city, unless it carries '='
    let mut config = match profile_for(category) {
        Some(profile) => profile.run_config(),
        None => RunConfig::new(category.as_str()),
    };
    for arg in &args[2..] {
        match arg.split_once('=') {
            Some((key, raw)) => {
                // Filter values keep their JSON type when they have one
                let value = serde_json::from_str(raw)
                    .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
                config = config.with_filter(key, value);
            }
            None => config = config.with_city(arg.as_str()),
        }
    }

    let source = JsonFileSource::new(data_path.join("raw"));
    let outcome = run(&source, &config).context("pipeline run failed")?;

    println!(
        "Search completed in {:.2}s.",
        outcome.duration.as_secs_f64()
    );
    println!(
        "✓ {} listings across {} cities, {} columns",
        outcome.table.row_count(),
        config.cities.len(),
        outcome.table.column_count()
    );

    let csv_path = write_csv_snapshot(&outcome.table, data_path, &format!("{category}_"))?;
    println!("✓ CSV snapshot: {}", csv_path.display());

    let conn = open_database(&data_path.join("listings.db"))?;
    append_sqlite(&conn, &outcome.table, category)?;
    println!("✓ Appended to listings.db table '{category}'");

    Ok(())
}
