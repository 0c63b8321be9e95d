use std::path::Path;

use anyhow::{Context, Result};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::engine::RecentResult;
use crate::match_record::Surface;
use crate::pipeline::PipelineOutput;
use crate::profiles::{PlayerProfile, Provenance};

pub struct ExportReport {
    pub profiles: usize,
    pub skill_rows: usize,
    pub training_rows: usize,
    pub h2h_rows: usize,
}

pub fn export_workbook(path: &Path, output: &PipelineOutput) -> Result<ExportReport> {
    let mut profile_rows = vec![vec![
        "Player".to_string(),
        "Rank".to_string(),
        "Points".to_string(),
        "Age".to_string(),
        "Height".to_string(),
        "Country".to_string(),
        "Bio Source".to_string(),
        "Matches".to_string(),
        "Elo".to_string(),
        "Elo Hard".to_string(),
        "Elo Clay".to_string(),
        "Elo Grass".to_string(),
        "Momentum".to_string(),
        "Last 5".to_string(),
        "Serve Win %".to_string(),
        "BP Saved %".to_string(),
        "Hold %".to_string(),
        "Aces/Match".to_string(),
        "DF/Match".to_string(),
    ]];
    let initial = output.profiles.initial_rating();
    for profile in output.profiles.iter() {
        profile_rows.push(profile_row(profile, initial));
    }

    let mut skill_rows = vec![vec![
        "Player".to_string(),
        "Surface".to_string(),
        "Wins".to_string(),
        "Losses".to_string(),
        "Win Rate".to_string(),
    ]];
    for row in output.skill.rows() {
        skill_rows.push(vec![
            row.player,
            row.surface.label().to_string(),
            row.wins.to_string(),
            row.losses.to_string(),
            format!("{:.4}", row.win_rate),
        ]);
    }

    let mut h2h_rows = vec![vec![
        "Player A".to_string(),
        "Player B".to_string(),
        "A Wins".to_string(),
        "B Wins".to_string(),
    ]];
    for row in output.head_to_head.rows() {
        h2h_rows.push(vec![
            row.low,
            row.high,
            row.low_wins.to_string(),
            row.high_wins.to_string(),
        ]);
    }

    let mut training_rows = vec![{
        let mut header = output.training.schema.names.clone();
        header.push("target".to_string());
        header
    }];
    for row in &output.training.rows {
        let mut out: Vec<String> = row.features.iter().map(|v| format!("{v:.4}")).collect();
        out.push(row.target.to_string());
        training_rows.push(out);
    }

    let mut workbook = Workbook::new();
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Profiles")?;
        write_rows(sheet, &profile_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("SurfaceSkill")?;
        write_rows(sheet, &skill_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("HeadToHead")?;
        write_rows(sheet, &h2h_rows)?;
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Training")?;
        write_rows(sheet, &training_rows)?;
    }

    workbook
        .save(path)
        .with_context(|| format!("failed writing workbook to {}", path.display()))?;

    Ok(ExportReport {
        profiles: profile_rows.len().saturating_sub(1),
        skill_rows: skill_rows.len().saturating_sub(1),
        training_rows: training_rows.len().saturating_sub(1),
        h2h_rows: h2h_rows.len().saturating_sub(1),
    })
}

fn profile_row(p: &PlayerProfile, initial: f64) -> Vec<String> {
    vec![
        p.name.clone(),
        p.rank.value.to_string(),
        format!("{:.0}", p.rank_points.value),
        format!("{:.1}", p.age.value),
        format!("{:.0}", p.height.value),
        p.country.value.clone(),
        provenance_label(&p.rank.provenance),
        p.matches_played.to_string(),
        format!("{:.1}", p.elo),
        format!("{:.1}", p.surface_elo_or(Surface::Hard, initial)),
        format!("{:.1}", p.surface_elo_or(Surface::Clay, initial)),
        format!("{:.1}", p.surface_elo_or(Surface::Grass, initial)),
        format!("{:.2}", p.momentum),
        last_five(&p.last_5),
        format!("{:.1}", p.serve_win),
        format!("{:.1}", p.bp_saved),
        format!("{:.1}", p.service_hold),
        format!("{:.2}", p.aces),
        format!("{:.2}", p.df),
    ]
}

fn provenance_label(p: &Provenance) -> String {
    match p {
        Provenance::Default => "default".to_string(),
        Provenance::Observed { tournament, .. } => format!("match {tournament}"),
        Provenance::External { source } => source.clone(),
    }
}

fn last_five(results: &[RecentResult]) -> String {
    results
        .iter()
        .rev()
        .map(|r| format!("{} {} ({})", r.result.letter(), r.opponent, r.round))
        .collect::<Vec<_>>()
        .join("; ")
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
