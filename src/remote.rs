use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::{Collection, EntityFilter, InteractionRef};

/// Hosted CRM store the action center and debrief queue talk to.
#[async_trait]
pub trait RemoteDataService: Send + Sync {
    async fn count_entities(
        &self,
        collection: Collection,
        filter: &EntityFilter,
    ) -> anyhow::Result<u64>;

    async fn list_interactions_on_or_after(
        &self,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<InteractionRef>>;

    async fn submit(&self, subject_id: &str, payload: &serde_json::Value) -> anyhow::Result<()>;
}

/// Stand-in used when no CRM connection is available. Every call fails, so
/// queued debriefs stay pending or failed until a real connection drains them.
#[derive(Debug, Default, Clone, Copy)]
pub struct Disconnected;

#[async_trait]
impl RemoteDataService for Disconnected {
    async fn count_entities(&self, _: Collection, _: &EntityFilter) -> anyhow::Result<u64> {
        anyhow::bail!("no connection to the CRM store")
    }

    async fn list_interactions_on_or_after(
        &self,
        _: NaiveDate,
    ) -> anyhow::Result<Vec<InteractionRef>> {
        anyhow::bail!("no connection to the CRM store")
    }

    async fn submit(&self, _: &str, _: &serde_json::Value) -> anyhow::Result<()> {
        anyhow::bail!("no connection to the CRM store")
    }
}
