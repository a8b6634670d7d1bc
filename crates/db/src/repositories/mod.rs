use async_trait::async_trait;
use thiserror::Error;

use crate::record::BurnPlanRecord;

pub mod burn_plan;
pub mod memory;

pub use burn_plan::SqlBurnPlanRepository;
pub use memory::InMemoryBurnPlanRepository;

/// Upper bound for `recent` listings.
pub const MAX_RECENT_LIMIT: u32 = 20;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait BurnPlanRepository: Send + Sync {
    async fn save(&self, record: BurnPlanRecord) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<BurnPlanRecord>, RepositoryError>;

    /// Newest first; `limit` is clamped to `1..=MAX_RECENT_LIMIT`.
    async fn recent(&self, limit: u32) -> Result<Vec<BurnPlanRecord>, RepositoryError>;

    async fn ping(&self) -> Result<(), RepositoryError>;
}

pub(crate) fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_RECENT_LIMIT)
}
