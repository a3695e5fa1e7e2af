use std::collections::HashSet;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::models::{Collection, EntityFilter, Severity, Signal, SignalKind};
use crate::notify::{NotificationKind, NotificationSink};
use crate::remote::RemoteDataService;

pub const OVERDUE_DAYS: i64 = 30;
pub const LOW_ENGAGEMENT_DAYS: i64 = 60;
pub const PRIORITY_HCP_TIERS: [&str; 4] = ["Tier A", "Tier B", "High", "Medium"];
pub const PRIORITY_HCO_TIERS: [&str; 4] = ["Tier A", "Tier B", "A", "B"];

/// Counts strictly above `critical` are critical, strictly above `warning` are warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Thresholds {
    pub critical: Option<u64>,
    pub warning: Option<u64>,
}

pub fn thresholds(kind: SignalKind) -> Thresholds {
    match kind {
        SignalKind::Overdue => Thresholds {
            critical: Some(10),
            warning: Some(5),
        },
        SignalKind::MissingConsent => Thresholds {
            critical: Some(20),
            warning: Some(10),
        },
        SignalKind::HighValueLowEngagement => Thresholds {
            critical: Some(5),
            warning: Some(2),
        },
        SignalKind::NoNextStep => Thresholds {
            critical: Some(15),
            warning: Some(8),
        },
        SignalKind::HcoHighValue => Thresholds {
            critical: None,
            warning: None,
        },
    }
}

pub fn classify(kind: SignalKind, count: u64) -> Severity {
    let limits = thresholds(kind);
    match (limits.critical, limits.warning) {
        (Some(critical), _) if count > critical => Severity::Critical,
        (_, Some(warning)) if count > warning => Severity::Warning,
        _ => Severity::Info,
    }
}

pub fn build_signal(kind: SignalKind, count: Option<u64>) -> Signal {
    let fetch_failed = count.is_none();
    let count = count.unwrap_or(0);
    Signal {
        kind,
        title: kind.title().to_string(),
        description: kind.description().to_string(),
        count,
        severity: classify(kind, count),
        entity_type: kind.entity_type(),
        filter_param: kind.filter_param().to_string(),
        fetch_failed,
    }
}

/// Zero counts last, then critical before warning before info, then larger counts first.
pub fn rank_signals(signals: &mut [Signal]) {
    signals.sort_by(|a, b| {
        (a.count == 0)
            .cmp(&(b.count == 0))
            .then(a.severity.cmp(&b.severity))
            .then(b.count.cmp(&a.count))
    });
}

pub fn no_next_step_count(total_hcps: u64, scheduled_hcps: usize) -> u64 {
    total_hcps.saturating_sub(scheduled_hcps as u64)
}

pub struct SignalAggregator {
    remote: Arc<dyn RemoteDataService>,
    sink: Arc<dyn NotificationSink>,
}

impl SignalAggregator {
    pub fn new(remote: Arc<dyn RemoteDataService>, sink: Arc<dyn NotificationSink>) -> Self {
        Self { remote, sink }
    }

    pub async fn compute_signals(&self) -> Vec<Signal> {
        self.compute_signals_as_of(Utc::now().date_naive()).await
    }

    pub async fn compute_signals_as_of(&self, today: NaiveDate) -> Vec<Signal> {
        let overdue_filter = EntityFilter::LastContactBefore {
            cutoff: today - Duration::days(OVERDUE_DAYS),
        };
        let engagement_filter = EntityFilter::TierIn {
            tiers: PRIORITY_HCP_TIERS.iter().map(|t| t.to_string()).collect(),
            last_contact_before: Some(today - Duration::days(LOW_ENGAGEMENT_DAYS)),
        };
        let hco_filter = EntityFilter::TierIn {
            tiers: PRIORITY_HCO_TIERS.iter().map(|t| t.to_string()).collect(),
            last_contact_before: None,
        };

        let (overdue, missing_consent, low_engagement, no_next_step, hco_high_value) = tokio::join!(
            self.count(SignalKind::Overdue, Collection::Hcps, &overdue_filter),
            self.count(
                SignalKind::MissingConsent,
                Collection::Hcps,
                &EntityFilter::ConsentMissing
            ),
            self.count(
                SignalKind::HighValueLowEngagement,
                Collection::Hcps,
                &engagement_filter
            ),
            self.no_next_step(today),
            self.count(SignalKind::HcoHighValue, Collection::Hcos, &hco_filter),
        );

        let counts = [
            (SignalKind::Overdue, overdue),
            (SignalKind::MissingConsent, missing_consent),
            (SignalKind::HighValueLowEngagement, low_engagement),
            (SignalKind::NoNextStep, no_next_step),
            (SignalKind::HcoHighValue, hco_high_value),
        ];

        if counts.iter().all(|(_, count)| count.is_none()) {
            self.sink.notify(
                NotificationKind::Error,
                "Action center unavailable",
                "Could not load any signals. Check your connection and try again.",
            );
        }

        let mut signals: Vec<Signal> = counts
            .into_iter()
            .map(|(kind, count)| build_signal(kind, count))
            .collect();
        rank_signals(&mut signals);
        signals
    }

    async fn count(
        &self,
        kind: SignalKind,
        collection: Collection,
        filter: &EntityFilter,
    ) -> Option<u64> {
        match self.remote.count_entities(collection, filter).await {
            Ok(count) => Some(count),
            Err(err) => {
                log::warn!("signal {} query failed: {err:#}", kind.id());
                None
            }
        }
    }

    async fn no_next_step(&self, today: NaiveDate) -> Option<u64> {
        let (total, upcoming) = tokio::join!(
            self.remote.count_entities(Collection::Hcps, &EntityFilter::All),
            self.remote.list_interactions_on_or_after(today),
        );

        match (total, upcoming) {
            (Ok(total), Ok(upcoming)) => {
                let scheduled: HashSet<_> = upcoming.iter().map(|i| i.hcp_id).collect();
                Some(no_next_step_count(total, scheduled.len()))
            }
            (Err(err), _) | (_, Err(err)) => {
                log::warn!("signal {} query failed: {err:#}", SignalKind::NoNextStep.id());
                None
            }
        }
    }
}
