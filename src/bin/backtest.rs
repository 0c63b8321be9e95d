//! Walk-forward evaluation of the pre-match Elo probability.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use atp_features::calibration;
use atp_features::cli::arg_value;
use atp_features::config::PipelineConfig;
use atp_features::pipeline::Pipeline;
use atp_features::profiles::Enrichment;
use atp_features::{historical_dataset, loader};

const DEFAULT_WARMUP: usize = 500;
const DEFAULT_BINS: usize = 10;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = PipelineConfig::from_env();
    let warmup = std::env::var("BACKTEST_WARMUP")
        .ok()
        .and_then(|val| val.parse::<usize>().ok())
        .unwrap_or(DEFAULT_WARMUP);

    let (records, source) = match arg_value("matches") {
        Some(path) => {
            let path = PathBuf::from(path);
            let (records, _) = loader::load_matches(&path, &config.placeholder_dates)?;
            (records, path.display().to_string())
        }
        None => {
            let db_path = arg_value("db")
                .map(PathBuf::from)
                .or_else(|| config.hist_db_path.clone())
                .or_else(historical_dataset::default_db_path)
                .context("unable to resolve sqlite path")?;
            let conn = historical_dataset::open_db(&db_path)?;
            (
                historical_dataset::load_matches(&conn)?,
                db_path.display().to_string(),
            )
        }
    };

    let output = Pipeline::new(config.clone()).run(records, &Enrichment::default())?;
    if output.augmented.len() <= warmup {
        return Err(anyhow!(
            "only {} matches, need more than the {warmup} warmup matches",
            output.augmented.len()
        ));
    }

    let (preds, outcomes) = calibration::elo_baseline(&output.augmented, warmup);
    let raw = calibration::evaluate_probs(&preds, &outcomes);
    let (scale, cal) = calibration::fit_logit_scale(&preds, &outcomes);
    let bins = calibration::calibration_bins(&preds, &outcomes, DEFAULT_BINS);

    println!("Elo pre-match backtest");
    println!("Source: {source}");
    println!(
        "Matches: {} (warmup {warmup})",
        output.augmented.len()
    );
    println!();
    println!(
        "samples={} ll_raw={:.4} ll_cal={:.4} brier_raw={:.4} brier_cal={:.4} acc={:.4} fit_scale={:.2}",
        raw.samples, raw.log_loss, cal.log_loss, raw.brier, cal.brier, raw.accuracy, scale
    );
    println!();
    let mut ece = 0.0;
    for bin in &bins {
        if bin.count == 0 {
            continue;
        }
        ece += bin.count as f64 / raw.samples as f64 * (bin.avg_pred - bin.actual_rate).abs();
        println!(
            "[{:.1}, {:.1}) n={} pred={:.3} actual={:.3}",
            bin.bucket_start, bin.bucket_end, bin.count, bin.avg_pred, bin.actual_rate
        );
    }
    println!("ece={ece:.4}");

    Ok(())
}
