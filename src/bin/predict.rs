//! Live matchup lookup against a saved lookup bundle.

use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};

use atp_features::cli::{arg_f64, arg_value};
use atp_features::features::{MatchupContext, host_country};
use atp_features::linear_model;
use atp_features::match_record::Surface;
use atp_features::persist;

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let a = arg_value("a").ok_or_else(|| anyhow!("missing --a <player>"))?;
    let b = arg_value("b").ok_or_else(|| anyhow!("missing --b <player>"))?;
    let tournament = arg_value("tournament").unwrap_or_default();
    let surface = match arg_value("surface") {
        Some(raw) => Surface::parse(&raw),
        None => Surface::infer_from_tournament(&tournament),
    };
    let fatigue_a = arg_f64("fatigue-a").unwrap_or(0.0).max(0.0);
    let fatigue_b = arg_f64("fatigue-b").unwrap_or(0.0).max(0.0);

    let bundle_path = arg_value("lookups")
        .map(PathBuf::from)
        .or_else(persist::default_bundle_path)
        .context("unable to resolve lookup bundle path")?;
    let lookups = persist::load_bundle(&bundle_path)?.into_lookups()?;

    let ctx = MatchupContext {
        surface,
        tourney_name: tournament.clone(),
        fatigue_a,
        fatigue_b,
    };
    let vector = lookups.matchup(&a, &b, &ctx);
    let (wins_a, wins_b) = lookups.h2h(&a, &b);

    println!("{a} vs {b}");
    println!(
        "Tournament: {} ({}, host {})",
        if tournament.is_empty() { "n/a" } else { tournament.as_str() },
        surface,
        host_country(&tournament)
    );
    for (name, profile) in [(&a, lookups.profiles.get(&a)), (&b, lookups.profiles.get(&b))] {
        match profile {
            Some(p) => println!(
                "{name}: rank {} elo {:.0} {} {:.0} momentum {:.2} matches {}",
                p.rank.value,
                p.elo,
                surface,
                p.surface_elo_or(surface, lookups.profiles.initial_rating()),
                p.momentum,
                p.matches_played
            ),
            None => println!("{name}: unknown player, using defaults"),
        }
    }
    println!("H2H: {wins_a}-{wins_b}");
    println!();
    for (name, value) in lookups.schema.names.iter().zip(&vector.values) {
        println!("{name:>18} {value:+.3}");
    }

    if let Some(path) = arg_value("model")
        .map(PathBuf::from)
        .or_else(linear_model::resolve_model_path)
    {
        let model = linear_model::load_model(&path)?;
        model.check_schema(&lookups.schema)?;
        let p = model.probability(&vector)?;
        println!();
        println!("P({a} wins) = {:.1}%", p * 100.0);
    }

    Ok(())
}
