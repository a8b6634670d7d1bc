pub mod connection;
pub mod migrations;
pub mod record;
pub mod repositories;

pub use connection::{connect, connect_from_config, connect_with_settings, ping, DbPool};
pub use record::{BurnPlanRecord, StoredBurnPlan};
pub use repositories::{
    BurnPlanRepository, InMemoryBurnPlanRepository, RepositoryError, SqlBurnPlanRepository,
};
