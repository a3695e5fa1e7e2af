use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Overdue,
    MissingConsent,
    HighValueLowEngagement,
    NoNextStep,
    HcoHighValue,
}

impl SignalKind {
    pub const ALL: [SignalKind; 5] = [
        SignalKind::Overdue,
        SignalKind::MissingConsent,
        SignalKind::HighValueLowEngagement,
        SignalKind::NoNextStep,
        SignalKind::HcoHighValue,
    ];

    pub fn id(self) -> &'static str {
        match self {
            SignalKind::Overdue => "overdue",
            SignalKind::MissingConsent => "missing-consent",
            SignalKind::HighValueLowEngagement => "high-value-low-engagement",
            SignalKind::NoNextStep => "no-next-step",
            SignalKind::HcoHighValue => "hco-high-value",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            SignalKind::Overdue => "Overdue follow-ups",
            SignalKind::MissingConsent => "Missing marketing consent",
            SignalKind::HighValueLowEngagement => "High value, low engagement",
            SignalKind::NoNextStep => "No next step planned",
            SignalKind::HcoHighValue => "High value accounts",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            SignalKind::Overdue => "HCPs not contacted in the last 30 days",
            SignalKind::MissingConsent => "HCPs without recorded marketing consent",
            SignalKind::HighValueLowEngagement => {
                "Priority-tier HCPs not contacted in the last 60 days"
            }
            SignalKind::NoNextStep => "HCPs with no interaction scheduled from today",
            SignalKind::HcoHighValue => "Tier A and B organizations in your territory",
        }
    }

    pub fn entity_type(self) -> EntityType {
        match self {
            SignalKind::HcoHighValue => EntityType::Hco,
            _ => EntityType::Hcp,
        }
    }

    pub fn filter_param(self) -> &'static str {
        match self {
            SignalKind::Overdue => "filter=overdue",
            SignalKind::MissingConsent => "filter=missing-consent",
            SignalKind::HighValueLowEngagement => "filter=high-value-low-engagement",
            SignalKind::NoNextStep => "filter=no-next-step",
            SignalKind::HcoHighValue => "filter=high-value",
        }
    }
}

impl Serialize for SignalKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

/// Ordered so that `Critical < Warning < Info`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Hcp,
    Hco,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    #[serde(rename = "id")]
    pub kind: SignalKind,
    pub title: String,
    pub description: String,
    pub count: u64,
    pub severity: Severity,
    pub entity_type: EntityType,
    pub filter_param: String,
    /// Set when `count` was defaulted to zero after a failed query.
    pub fetch_failed: bool,
}

impl Signal {
    pub fn id(&self) -> &'static str {
        self.kind.id()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Hcps,
    Hcos,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityFilter {
    All,
    /// Last contact missing or strictly before `cutoff`.
    LastContactBefore { cutoff: NaiveDate },
    /// Marketing consent missing or false.
    ConsentMissing,
    TierIn {
        tiers: Vec<String>,
        last_contact_before: Option<NaiveDate>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InteractionRef {
    pub hcp_id: Uuid,
    pub scheduled_for: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Submitting,
    Submitted,
    Failed,
}

impl std::fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Submitting => "submitting",
            SubmissionStatus::Submitted => "submitted",
            SubmissionStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedSubmission {
    pub id: String,
    #[serde(rename = "meetingId", alias = "subjectId")]
    pub subject_id: String,
    #[serde(rename = "data", alias = "payload")]
    pub payload: serde_json::Value,
    #[serde(
        rename = "timestamp",
        alias = "enqueuedAt",
        with = "chrono::serde::ts_milliseconds"
    )]
    pub enqueued_at: DateTime<Utc>,
    pub status: SubmissionStatus,
}

impl QueuedSubmission {
    pub fn is_outstanding(&self) -> bool {
        matches!(
            self.status,
            SubmissionStatus::Pending | SubmissionStatus::Submitting
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn severity_orders_critical_first() {
        let mut values = vec![Severity::Info, Severity::Critical, Severity::Warning];
        values.sort();
        assert_eq!(
            values,
            vec![Severity::Critical, Severity::Warning, Severity::Info]
        );
    }

    #[test]
    fn queued_submission_uses_meeting_field_names() {
        let record = QueuedSubmission {
            id: "q-1".to_string(),
            subject_id: "m1".to_string(),
            payload: serde_json::json!({ "x": 1 }),
            enqueued_at: Utc.timestamp_millis_opt(1_760_000_000_123).unwrap(),
            status: SubmissionStatus::Pending,
        };

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["meetingId"], "m1");
        assert_eq!(value["data"]["x"], 1);
        assert_eq!(value["timestamp"], 1_760_000_000_123i64);
        assert_eq!(value["status"], "pending");
    }

    #[test]
    fn signal_serializes_with_stable_id() {
        let signal = Signal {
            kind: SignalKind::HighValueLowEngagement,
            title: SignalKind::HighValueLowEngagement.title().to_string(),
            description: SignalKind::HighValueLowEngagement.description().to_string(),
            count: 7,
            severity: Severity::Critical,
            entity_type: EntityType::Hcp,
            filter_param: SignalKind::HighValueLowEngagement.filter_param().to_string(),
            fetch_failed: false,
        };

        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value["id"], "high-value-low-engagement");
        assert_eq!(value["severity"], "critical");
        assert_eq!(value["entityType"], "hcp");
        assert_eq!(value["filterParam"], "filter=high-value-low-engagement");
        assert_eq!(value["fetchFailed"], false);
        assert_eq!(value["count"], 7);
    }

    #[test]
    fn only_hco_high_value_targets_organizations() {
        for kind in SignalKind::ALL {
            let expected = if kind == SignalKind::HcoHighValue {
                EntityType::Hco
            } else {
                EntityType::Hcp
            };
            assert_eq!(kind.entity_type(), expected);
        }
    }
}
