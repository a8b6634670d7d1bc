use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};
use tracing::debug;

use super::{clamp_limit, BurnPlanRepository, RepositoryError};
use crate::record::{BurnPlanRecord, StoredBurnPlan};
use crate::DbPool;

pub struct SqlBurnPlanRepository {
    pool: DbPool,
}

impl SqlBurnPlanRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BurnPlanRepository for SqlBurnPlanRepository {
    async fn save(&self, record: BurnPlanRecord) -> Result<(), RepositoryError> {
        let burn_plan_json = StoredBurnPlan::encode(&record.burn_plan)?;

        sqlx::query(
            r#"
            INSERT INTO burn_plan (id, created_at_ms, burn_plan_json)
            VALUES (?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                created_at_ms = excluded.created_at_ms,
                burn_plan_json = excluded.burn_plan_json
            "#,
        )
        .bind(&record.id)
        .bind(record.timestamp)
        .bind(&burn_plan_json)
        .execute(&self.pool)
        .await?;

        debug!(event_name = "db.burn_plan.saved", id = %record.id, "burn plan stored");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<BurnPlanRecord>, RepositoryError> {
        let row = sqlx::query(
            r#"
            SELECT id, created_at_ms, burn_plan_json
            FROM burn_plan
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| record_from_row(&row)).transpose()
    }

    async fn recent(&self, limit: u32) -> Result<Vec<BurnPlanRecord>, RepositoryError> {
        let rows = sqlx::query(
            r#"
            SELECT id, created_at_ms, burn_plan_json
            FROM burn_plan
            ORDER BY created_at_ms DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(clamp_limit(limit)))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        crate::connection::ping(&self.pool).await?;
        Ok(())
    }
}

fn record_from_row(row: &SqliteRow) -> Result<BurnPlanRecord, RepositoryError> {
    let id = row.try_get::<String, _>("id")?;
    let burn_plan_json = row.try_get::<String, _>("burn_plan_json")?;
    let burn_plan = StoredBurnPlan::decode(&burn_plan_json)
        .map_err(|error| RepositoryError::Decode(format!("burn plan `{id}`: {error}")))?;

    Ok(BurnPlanRecord { id, timestamp: row.try_get("created_at_ms")?, burn_plan })
}

#[cfg(test)]
mod tests {
    use super::SqlBurnPlanRepository;
    use crate::migrations::run_pending;
    use crate::record::fixtures::analysis;
    use crate::record::BurnPlanRecord;
    use crate::repositories::{BurnPlanRepository, RepositoryError};
    use crate::{connect_with_settings, DbPool};

    async fn setup() -> (DbPool, SqlBurnPlanRepository) {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrate");
        (pool.clone(), SqlBurnPlanRepository::new(pool))
    }

    #[tokio::test]
    async fn save_then_find_reproduces_the_analysis() {
        let (_pool, repo) = setup().await;
        let record =
            BurnPlanRecord::new("plan-1", analysis("$1000000", 987_654.32)).with_timestamp(1_000);

        repo.save(record.clone()).await.expect("save");
        let found = repo.find_by_id("plan-1").await.expect("find");

        assert_eq!(found, Some(record));
        assert_eq!(repo.find_by_id("missing").await.expect("find missing"), None);
    }

    #[tokio::test]
    async fn recent_lists_newest_first_and_honours_limit() {
        let (_pool, repo) = setup().await;
        for (index, timestamp) in [300, 100, 500, 200].into_iter().enumerate() {
            let record = BurnPlanRecord::new(format!("plan-{index}"), analysis("$1000", 1000.0))
                .with_timestamp(timestamp);
            repo.save(record).await.expect("save");
        }

        let recent = repo.recent(3).await.expect("recent");
        let timestamps: Vec<i64> = recent.iter().map(|record| record.timestamp).collect();
        assert_eq!(timestamps, vec![500, 300, 200]);

        assert_eq!(repo.recent(0).await.expect("clamped low").len(), 1);
        assert_eq!(repo.recent(500).await.expect("clamped high").len(), 4);
    }

    #[tokio::test]
    async fn saving_same_id_replaces_the_plan() {
        let (_pool, repo) = setup().await;
        repo.save(BurnPlanRecord::new("plan-1", analysis("$1000", 1000.0)).with_timestamp(1))
            .await
            .expect("first save");
        repo.save(BurnPlanRecord::new("plan-1", analysis("$2000", 2000.0)).with_timestamp(2))
            .await
            .expect("second save");

        let recent = repo.recent(20).await.expect("recent");
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].burn_plan.total_amount, "$2000");
    }

    #[tokio::test]
    async fn corrupt_rows_surface_as_decode_errors() {
        let (pool, repo) = setup().await;
        sqlx::query("INSERT INTO burn_plan (id, created_at_ms, burn_plan_json) VALUES (?, ?, ?)")
            .bind("broken")
            .bind(1_i64)
            .bind("{\"total_amount\": 5}")
            .execute(&pool)
            .await
            .expect("insert corrupt row");

        let error = repo.find_by_id("broken").await.expect_err("decode failure");
        assert!(matches!(
            error,
            RepositoryError::Decode(ref message) if message.contains("broken")
        ));
        repo.ping().await.expect("ping");
    }
}
