//! Memory store data types.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A stored memory.
///
/// `id` and `created_at` are assigned by the store on insert and never change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoryRecord {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Not populated by this crate; kept nullable for a future embedding service.
    pub embedding: Option<Vec<f32>>,
}

/// One hit from a full-text search.
///
/// `score` is non-negative and higher means more relevant. Scores are only
/// comparable within the result set of a single query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemorySearchResult {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub score: f64,
}

/// Database reachability as reported by the health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseHealth {
    Healthy,
    Degraded,
}

/// Result of the liveness/readiness probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// The service itself answered.
    pub status: String,
    pub database: DatabaseHealth,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.database == DatabaseHealth::Healthy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_report_serializes_snake_case() {
        let report = HealthReport {
            status: "ok".to_string(),
            database: DatabaseHealth::Degraded,
        };
        let json = serde_json::to_string(&report).unwrap();
        assert_eq!(json, r#"{"status":"ok","database":"degraded"}"#);
        assert!(!report.is_healthy());
    }

    #[test]
    fn test_record_serializes_null_embedding() {
        let record = MemoryRecord {
            id: Uuid::nil(),
            text: "buy milk".to_string(),
            created_at: DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
            embedding: None,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["text"], "buy milk");
        assert!(json["embedding"].is_null());
        assert_eq!(json["id"], "00000000-0000-0000-0000-000000000000");
    }
}
