// src/lib.rs - Competitor catalog matching and price positioning engine
pub mod arbitration;
pub mod config;
pub mod delivery;
pub mod ingest;
pub mod matching;
pub mod models;
pub mod utils;

pub use config::{MatchingConfig, OracleFailurePolicy};
pub use matching::index::CandidateIndex;
pub use matching::missing::find_missing;
pub use matching::orchestrator::MatchEngine;
pub use models::matching::{AnalysisReport, ClassifiedRow, MissingRecord, PriceDecision};
