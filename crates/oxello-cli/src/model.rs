use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A trained agent plus the metadata needed to reproduce and rerun it.
#[derive(Debug, Serialize, Deserialize)]
pub struct AgentModel<P> {
    pub name: String,
    pub trained_at: DateTime<Utc>,
    pub generations: usize,
    pub seed: u64,
    pub final_fitness: f64,
    pub program: P,
}
