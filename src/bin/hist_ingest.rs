use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use atp_features::cli::{arg_value, arg_values, has_flag};
use atp_features::config::PipelineConfig;
use atp_features::{historical_dataset, loader, persist};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let inputs: Vec<PathBuf> = arg_values("csv").into_iter().map(PathBuf::from).collect();
    if inputs.is_empty() {
        return Err(anyhow!("no match csv given (use --csv <path>, repeatable)"));
    }

    let config = PipelineConfig::from_env();
    let db_path = arg_value("db")
        .map(PathBuf::from)
        .or_else(|| config.hist_db_path.clone())
        .or_else(historical_dataset::default_db_path)
        .context("unable to resolve sqlite path")?;

    // --backfill fills missing bio on fresh rows from a lookup bundle
    let lookups = if has_flag("backfill") || arg_value("lookups").is_some() {
        let bundle_path = arg_value("lookups")
            .map(PathBuf::from)
            .or_else(persist::default_bundle_path)
            .context("unable to resolve lookup bundle path for backfill")?;
        Some(persist::load_bundle(&bundle_path)?.into_lookups()?)
    } else {
        None
    };

    let mut conn = historical_dataset::open_db(&db_path)?;

    println!("Historical ingest");
    println!("DB: {}", db_path.display());
    if lookups.is_some() {
        println!("Bio backfill: on (age offset {:.1})", config.backfill_age_offset);
    }
    let mut total = 0usize;
    for input in &inputs {
        let (records, report) = loader::load_matches(input, &config.placeholder_dates)?;
        let source = input.display().to_string();
        let summary = match &lookups {
            Some(lookups) => historical_dataset::ingest_fresh_matches(
                &mut conn,
                db_path.clone(),
                &source,
                records,
                &report,
                &lookups.profiles,
                config.backfill_age_offset,
            )?,
            None => historical_dataset::ingest_matches(
                &mut conn,
                db_path.clone(),
                &source,
                &records,
                &report,
            )?,
        };
        total += summary.matches_upserted;
        println!(
            "{}: read={} skipped={} upserted={} bio_filled={} latest={}",
            summary.source,
            summary.rows_read,
            summary.rows_skipped,
            summary.matches_upserted,
            summary.bio_fields_filled,
            summary
                .latest_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "n/a".to_string())
        );
    }
    println!("Matches upserted: {total}");

    Ok(())
}
