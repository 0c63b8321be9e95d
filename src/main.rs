use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use tracing::info;
use tracing_subscriber::EnvFilter;

use atp_features::cli::{arg_value, has_flag};
use atp_features::config::PipelineConfig;
use atp_features::persist::{self, LookupBundle};
use atp_features::pipeline::Pipeline;
use atp_features::profiles::Enrichment;
use atp_features::{analysis_export, historical_dataset, loader};

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PipelineConfig::from_env();

    let (records, source) = match arg_value("matches") {
        Some(path) => {
            let path = PathBuf::from(path);
            let (records, report) = loader::load_matches(&path, &config.placeholder_dates)?;
            info!(
                read = report.rows_read,
                kept = report.rows_kept,
                inferred_surfaces = report.surfaces_inferred,
                "loaded match csv"
            );
            (records, path.display().to_string())
        }
        None => {
            let db_path = db_path(&config).context("no --matches given and no sqlite path")?;
            let conn = historical_dataset::open_db(&db_path)?;
            let records = historical_dataset::load_matches(&conn)?;
            (records, db_path.display().to_string())
        }
    };

    let mut enrichment = Enrichment::default();
    if let Some(path) = arg_value("ranking") {
        let path = PathBuf::from(path);
        enrichment.ranking = loader::load_ranking(&path)?;
        enrichment.ranking_source = path.display().to_string();
    }
    if let Some(path) = arg_value("stats") {
        enrichment.advanced = loader::load_advanced_stats(&PathBuf::from(path))?;
    }

    let pipeline = Pipeline::new(config.clone());
    let output = pipeline.run(records, &enrichment)?;

    let out_dir = arg_value("out")
        .map(PathBuf::from)
        .or_else(|| config.out_dir.clone())
        .unwrap_or_else(|| PathBuf::from("out"));
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create output dir {}", out_dir.display()))?;

    persist::write_augmented_csv(&out_dir.join("augmented_matches.csv"), &output.augmented)?;
    persist::write_skill_csv(&out_dir.join("surface_skill.csv"), &output.skill)?;
    persist::write_training_csv(&out_dir.join("training.csv"), &output.training)?;

    let (train, test) = output
        .training
        .clone()
        .shuffled(config.shuffle_seed)
        .split(config.test_fraction);
    persist::write_training_csv(&out_dir.join("training_train.csv"), &train)?;
    persist::write_training_csv(&out_dir.join("training_test.csv"), &test)?;

    let bundle = LookupBundle::from_output(&output, config.feature_set);
    let bundle_path = out_dir.join("lookups.json");
    persist::save_bundle(&bundle_path, &bundle)?;
    if has_flag("install")
        && let Some(cache_path) = persist::default_bundle_path()
    {
        persist::save_bundle(&cache_path, &bundle)?;
        println!("Installed lookups: {}", cache_path.display());
    }

    if let Some(path) = arg_value("xlsx") {
        let report = analysis_export::export_workbook(&PathBuf::from(&path), &output)?;
        println!(
            "Workbook: {path} (profiles={} skill={} h2h={} training={})",
            report.profiles, report.skill_rows, report.h2h_rows, report.training_rows
        );
    }

    if has_flag("store-prematch") {
        let db_path = db_path(&config).ok_or_else(|| anyhow!("no sqlite path for prematch"))?;
        let mut conn = historical_dataset::open_db(&db_path)?;
        let stored = historical_dataset::store_prematch(&mut conn, &output.augmented)?;
        println!("Prematch rows stored: {stored} ({})", db_path.display());
    }

    println!("Pipeline complete");
    println!("Source: {source}");
    println!("Matches: {}", output.augmented.len());
    println!("Players: {}", output.profiles.len());
    println!("Surface skill entries: {}", output.skill.len());
    println!("H2H pairs: {}", output.head_to_head.len());
    println!(
        "Training rows: {} (train {} / test {})",
        output.training.len(),
        train.len(),
        test.len()
    );
    println!("Feature set: {:?}", config.feature_set);
    println!("Schema: {}", output.training.schema.fingerprint);
    println!("Output: {}", out_dir.display());
    Ok(())
}

fn db_path(config: &PipelineConfig) -> Option<PathBuf> {
    arg_value("db")
        .map(PathBuf::from)
        .or_else(|| config.hist_db_path.clone())
        .or_else(historical_dataset::default_db_path)
}
