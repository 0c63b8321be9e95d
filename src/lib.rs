pub mod analysis_export;
pub mod calibration;
pub mod chronology;
pub mod cli;
pub mod config;
pub mod elo;
pub mod engine;
pub mod features;
pub mod historical_dataset;
pub mod linear_model;
pub mod loader;
pub mod match_record;
pub mod normalize;
pub mod persist;
pub mod pipeline;
pub mod profiles;
pub mod surface_skill;
