use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::engine::{H2hRow, HeadToHeadTable};
use crate::features::{self, FeatureSchema, FeatureSet, FeatureVector, MatchupContext, TrainingTable};
use crate::pipeline::{AUGMENTED_COLUMNS, AugmentedMatch, PipelineOutput};
use crate::profiles::{PlayerProfile, ProfileMap};
use crate::surface_skill::{SkillRow, SurfaceSkill};

const CACHE_DIR: &str = "atp_features";
const BUNDLE_FILE: &str = "lookups.json";
const BUNDLE_VERSION: u32 = 1;

/// Everything live prediction needs, frozen at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupBundle {
    pub version: u32,
    #[serde(default)]
    pub generated_at: Option<u64>,
    pub feature_set: FeatureSet,
    pub schema: FeatureSchema,
    pub initial_rating: f64,
    pub skill_min_matches: u32,
    pub profiles: Vec<PlayerProfile>,
    pub skill: Vec<SkillRow>,
    #[serde(default)]
    pub head_to_head: Vec<H2hRow>,
}

impl LookupBundle {
    pub fn from_output(output: &PipelineOutput, feature_set: FeatureSet) -> Self {
        Self {
            version: BUNDLE_VERSION,
            generated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_secs()),
            feature_set,
            schema: output.training.schema.clone(),
            initial_rating: output.profiles.initial_rating(),
            skill_min_matches: output.skill.min_matches(),
            profiles: output.profiles.iter().cloned().collect(),
            skill: output.skill.rows(),
            head_to_head: output.head_to_head.rows(),
        }
    }

    pub fn into_lookups(self) -> Result<Lookups> {
        let expected = self.feature_set.schema();
        expected
            .verify(&self.schema.fingerprint)
            .context("bundle schema does not match its feature set")?;
        Ok(Lookups {
            feature_set: self.feature_set,
            schema: self.schema,
            profiles: ProfileMap::from_profiles(self.profiles, self.initial_rating),
            skill: SurfaceSkill::from_rows(self.skill, self.skill_min_matches),
            head_to_head: HeadToHeadTable::from_rows(self.head_to_head),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Lookups {
    pub feature_set: FeatureSet,
    pub schema: FeatureSchema,
    pub profiles: ProfileMap,
    pub skill: SurfaceSkill,
    pub head_to_head: HeadToHeadTable,
}

impl Lookups {
    pub fn from_output(output: &PipelineOutput, feature_set: FeatureSet) -> Self {
        Self {
            feature_set,
            schema: output.training.schema.clone(),
            profiles: output.profiles.clone(),
            skill: output.skill.clone(),
            head_to_head: output.head_to_head.clone(),
        }
    }

    /// Feature vector for `a` vs `b`; unknown players resolve to defaults.
    pub fn matchup(&self, a: &str, b: &str, ctx: &MatchupContext) -> FeatureVector {
        let pa = self.profiles.lookup(a);
        let pb = self.profiles.lookup(b);
        features::matchup_vector(
            &pa,
            &pb,
            ctx,
            &self.skill,
            &self.head_to_head,
            self.feature_set,
            self.profiles.initial_rating(),
        )
    }

    pub fn h2h(&self, a: &str, b: &str) -> (u32, u32) {
        self.head_to_head.wins(a, b)
    }
}

pub fn save_bundle(path: &Path, bundle: &LookupBundle) -> Result<()> {
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let json = serde_json::to_string(bundle).context("serialize lookup bundle")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json).context("write lookup bundle")?;
    fs::rename(&tmp, path).context("swap lookup bundle")?;
    Ok(())
}

pub fn load_bundle(path: &Path) -> Result<LookupBundle> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("read lookup bundle {}", path.display()))?;
    let bundle = serde_json::from_str::<LookupBundle>(&raw).context("parse lookup bundle")?;
    if bundle.version != BUNDLE_VERSION {
        return Err(anyhow!(
            "lookup bundle version {} (expected {})",
            bundle.version,
            BUNDLE_VERSION
        ));
    }
    Ok(bundle)
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(CACHE_DIR));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

pub fn default_bundle_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(BUNDLE_FILE))
}

/// Match rows with the pre-match signal columns appended.
pub fn write_augmented_csv(path: &Path, rows: &[AugmentedMatch]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    let mut header = vec![
        "position",
        "tourney_id",
        "tourney_name",
        "tourney_level",
        "surface",
        "tourney_date",
        "round",
        "match_num",
        "winner_name",
        "loser_name",
        "minutes",
        "score",
    ];
    header.extend(AUGMENTED_COLUMNS);
    writer.write_record(&header)?;

    for m in rows {
        let r = &m.record;
        let mut out = vec![
            m.position.to_string(),
            r.tourney_id.clone(),
            r.tourney_name.clone(),
            r.tourney_level.clone(),
            r.surface.label().to_string(),
            r.date.yyyymmdd.to_string(),
            r.round.code().to_string(),
            r.match_num.map(|n| n.to_string()).unwrap_or_default(),
            r.winner.clone(),
            r.loser.clone(),
            r.minutes.map(|v| v.to_string()).unwrap_or_default(),
            r.score.clone(),
        ];
        out.extend(m.augmented_values().iter().map(|v| v.to_string()));
        writer.write_record(&out)?;
    }
    writer.flush().context("flush augmented table")?;
    Ok(())
}

pub fn write_training_csv(path: &Path, table: &TrainingTable) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    let mut header: Vec<&str> = table.schema.names.iter().map(String::as_str).collect();
    header.push("target");
    writer.write_record(&header)?;
    for row in &table.rows {
        let mut out: Vec<String> = row.features.iter().map(|v| v.to_string()).collect();
        out.push(row.target.to_string());
        writer.write_record(&out)?;
    }
    writer.flush().context("flush training table")?;
    Ok(())
}

pub fn write_skill_csv(path: &Path, skill: &SurfaceSkill) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("create {}", path.display()))?;
    for row in skill.rows() {
        writer.serialize(&row)?;
    }
    writer.flush().context("flush skill table")?;
    Ok(())
}
