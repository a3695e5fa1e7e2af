use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use crate::models::{Collection, EntityFilter, InteractionRef};
use crate::remote::RemoteDataService;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

type SeedHcp = (
    Uuid,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<NaiveDate>,
    Option<bool>,
);

fn seed_hcps() -> anyhow::Result<Vec<SeedHcp>> {
    Ok(vec![
        (
            Uuid::parse_str("8f1c2b7e-5a4d-4c39-9e21-6b0d7a3f4c18")?,
            "Dr. Helena Varga",
            "helena.varga@stmarys.example",
            Some("Tier A"),
            NaiveDate::from_ymd_opt(2026, 1, 12),
            Some(true),
        ),
        (
            Uuid::parse_str("b47e9d03-1c6f-4a8b-8d52-e3f90a6c2b71")?,
            "Dr. Tomasz Ilic",
            "tomasz.ilic@northclinic.example",
            Some("Medium"),
            None,
            None,
        ),
        (
            Uuid::parse_str("2e6a8c15-f3b9-47d0-a6e4-9c1d5b7f0a93")?,
            "Dr. Noor Haddad",
            "noor.haddad@riverside.example",
            Some("Tier C"),
            NaiveDate::from_ymd_opt(2026, 2, 20),
            Some(false),
        ),
    ])
}

fn seed_interactions() -> anyhow::Result<Vec<(&'static str, &'static str, &'static str, NaiveDate)>> {
    Ok(vec![
        (
            "seed-001",
            "helena.varga@stmarys.example",
            "face-to-face",
            NaiveDate::from_ymd_opt(2026, 12, 3).context("invalid date")?,
        ),
        (
            "seed-002",
            "noor.haddad@riverside.example",
            "remote",
            NaiveDate::from_ymd_opt(2026, 2, 20).context("invalid date")?,
        ),
    ])
}

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let hcps = seed_hcps()?;

    for (id, name, email, tier, last_contact, consent) in hcps {
        sqlx::query(
            r#"
            INSERT INTO kam.hcps (id, full_name, email, tier, last_contact_date, marketing_consent)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                tier = EXCLUDED.tier,
                last_contact_date = EXCLUDED.last_contact_date,
                marketing_consent = EXCLUDED.marketing_consent
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(tier)
        .bind(last_contact)
        .bind(consent)
        .execute(pool)
        .await?;
    }

    let hcos = vec![
        ("St. Mary's University Hospital", "Tier A"),
        ("North Clinic Group", "B"),
        ("Riverside Community Practice", "C"),
    ];

    for (name, tier) in hcos {
        sqlx::query(
            r#"
            INSERT INTO kam.hcos (id, name, tier)
            VALUES ($1, $2, $3)
            ON CONFLICT (name) DO UPDATE SET tier = EXCLUDED.tier
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(tier)
        .execute(pool)
        .await?;
    }

    let interactions = seed_interactions()?;

    for (source_key, email, channel, scheduled_for) in interactions {
        let hcp_id: Uuid = sqlx::query("SELECT id FROM kam.hcps WHERE email = $1")
            .bind(email)
            .fetch_one(pool)
            .await?
            .get("id");

        sqlx::query(
            r#"
            INSERT INTO kam.interactions (id, hcp_id, channel, scheduled_for, source_key)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (source_key) DO NOTHING
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(hcp_id)
        .bind(channel)
        .bind(scheduled_for)
        .bind(source_key)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Upserts HCPs by email. Returns the number of rows written.
pub async fn import_hcps_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        full_name: String,
        email: String,
        tier: Option<String>,
        last_contact_date: Option<NaiveDate>,
        marketing_consent: Option<bool>,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut written = 0usize;

    for result in reader.deserialize::<CsvRow>() {
        let row = result?;
        let tier = row.tier.filter(|t| !t.trim().is_empty());

        let result = sqlx::query(
            r#"
            INSERT INTO kam.hcps (id, full_name, email, tier, last_contact_date, marketing_consent)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name,
                tier = EXCLUDED.tier,
                last_contact_date = EXCLUDED.last_contact_date,
                marketing_consent = EXCLUDED.marketing_consent
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.full_name)
        .bind(&row.email)
        .bind(tier)
        .bind(row.last_contact_date)
        .bind(row.marketing_consent)
        .execute(pool)
        .await?;

        if result.rows_affected() > 0 {
            written += 1;
        }
    }

    Ok(written)
}

fn table(collection: Collection) -> &'static str {
    match collection {
        Collection::Hcps => "kam.hcps",
        Collection::Hcos => "kam.hcos",
    }
}

pub fn count_query(collection: Collection, filter: &EntityFilter) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new(format!("SELECT COUNT(*) FROM {}", table(collection)));

    match filter {
        EntityFilter::All => {}
        EntityFilter::LastContactBefore { cutoff } => {
            query
                .push(" WHERE (last_contact_date IS NULL OR last_contact_date < ")
                .push_bind(*cutoff)
                .push(")");
        }
        EntityFilter::ConsentMissing => {
            query.push(" WHERE marketing_consent IS NOT TRUE");
        }
        EntityFilter::TierIn {
            tiers,
            last_contact_before,
        } => {
            query.push(" WHERE tier = ANY(").push_bind(tiers.clone()).push(")");
            if let Some(cutoff) = last_contact_before {
                query
                    .push(" AND (last_contact_date IS NULL OR last_contact_date < ")
                    .push_bind(*cutoff)
                    .push(")");
            }
        }
    }

    query
}

#[derive(Clone)]
pub struct PgCrm {
    pool: PgPool,
}

impl PgCrm {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RemoteDataService for PgCrm {
    async fn count_entities(
        &self,
        collection: Collection,
        filter: &EntityFilter,
    ) -> anyhow::Result<u64> {
        let mut query = count_query(collection, filter);
        let count: i64 = query
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .with_context(|| format!("failed to count {}", table(collection)))?;
        Ok(count.max(0) as u64)
    }

    async fn list_interactions_on_or_after(
        &self,
        date: NaiveDate,
    ) -> anyhow::Result<Vec<InteractionRef>> {
        let rows = sqlx::query(
            "SELECT hcp_id, scheduled_for FROM kam.interactions WHERE scheduled_for >= $1",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("failed to list upcoming interactions")?;

        Ok(rows
            .into_iter()
            .map(|row| InteractionRef {
                hcp_id: row.get("hcp_id"),
                scheduled_for: row.get("scheduled_for"),
            })
            .collect())
    }

    async fn submit(&self, subject_id: &str, payload: &serde_json::Value) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kam.debriefs (id, meeting_id, payload)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(subject_id)
        .bind(payload)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to submit debrief for meeting {subject_id}"))?;
        Ok(())
    }
}
