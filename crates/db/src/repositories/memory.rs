use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{clamp_limit, BurnPlanRepository, RepositoryError};
use crate::record::BurnPlanRecord;

/// Process-local store used when no database is configured and in tests.
#[derive(Default)]
pub struct InMemoryBurnPlanRepository {
    records: RwLock<HashMap<String, BurnPlanRecord>>,
}

#[async_trait::async_trait]
impl BurnPlanRepository for InMemoryBurnPlanRepository {
    async fn save(&self, record: BurnPlanRecord) -> Result<(), RepositoryError> {
        let mut records = self.records.write().await;
        records.insert(record.id.clone(), record);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BurnPlanRecord>, RepositoryError> {
        let records = self.records.read().await;
        Ok(records.get(id).cloned())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<BurnPlanRecord>, RepositoryError> {
        let records = self.records.read().await;
        let mut listed: Vec<BurnPlanRecord> = records.values().cloned().collect();
        listed.sort_by(|left, right| {
            right.timestamp.cmp(&left.timestamp).then_with(|| right.id.cmp(&left.id))
        });
        listed.truncate(clamp_limit(limit) as usize);
        Ok(listed)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
