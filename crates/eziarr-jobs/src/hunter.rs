//! Paced automated searching: at most one upstream search per run.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::JobContext;

/// What a hunter run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum HuntOutcome {
    /// No record is due for a search.
    Idle,
    /// A search was submitted for the record.
    #[serde(rename_all = "camelCase")]
    Searched { record_id: String },
    /// Selection or submission failed; the record stays eligible.
    #[serde(rename_all = "camelCase")]
    Failed {
        record_id: Option<String>,
        error: String,
    },
}

/// Run the hunter at the current time.
pub async fn hunt(ctx: &JobContext) -> HuntOutcome {
    hunt_at(ctx, Utc::now().timestamp_millis()).await
}

/// Run the hunter as of `now_ms`.
///
/// The record is marked searched only after the service accepted the
/// command. A record deleted by a concurrent sync in between is tolerated.
pub async fn hunt_at(ctx: &JobContext, now_ms: i64) -> HuntOutcome {
    let record = match ctx.records.next_search_candidate(now_ms).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            debug!(subsystem = "jobs", component = "hunter", "No record due for a search");
            return HuntOutcome::Idle;
        }
        Err(e) => {
            warn!(subsystem = "jobs", component = "hunter", error = %e, "Candidate lookup failed");
            return HuntOutcome::Failed {
                record_id: None,
                error: e.to_string(),
            };
        }
    };

    let spec = record.service.spec();
    let submitted = match ctx.services.get(record.service) {
        Ok(client) => {
            client
                .command(&spec.search_command(record.service_item_id))
                .await
        }
        Err(e) => Err(e),
    };

    if let Err(e) = submitted {
        warn!(
            subsystem = "jobs",
            component = "hunter",
            record_id = %record.id,
            error = %e,
            "Search submission failed"
        );
        return HuntOutcome::Failed {
            record_id: Some(record.id),
            error: e.to_string(),
        };
    }

    if let Err(e) = ctx.records.mark_searched(&record.id, now_ms).await {
        warn!(
            subsystem = "jobs",
            component = "hunter",
            record_id = %record.id,
            error = %e,
            "Failed to record search time"
        );
    }

    info!(
        subsystem = "jobs",
        component = "hunter",
        record_id = %record.id,
        title = %record.title,
        command = spec.search_command,
        "Search triggered"
    );
    HuntOutcome::Searched {
        record_id: record.id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use eziarr_core::{MissingRecordRepository, Service};
    use std::sync::Arc;

    // 2023-11-14T22:13:20Z
    const NOW: i64 = 1_700_000_000_000;

    #[tokio::test]
    async fn test_idle_without_candidates() {
        let radarr = Arc::new(FakeService::new(Service::Radarr));
        let (ctx, _, _) = context(vec![radarr.clone()]);

        assert_eq!(hunt_at(&ctx, NOW).await, HuntOutcome::Idle);
        assert!(radarr.calls().is_empty());
    }

    #[tokio::test]
    async fn test_single_search_per_run() {
        let sonarr = Arc::new(FakeService::new(Service::Sonarr));
        let (ctx, records, _) = context(vec![sonarr.clone()]);
        records.insert(released(Service::Sonarr, 5, "2023-11-01T00:00:00Z"));
        records.insert(released(Service::Sonarr, 6, "2023-11-10T00:00:00Z"));

        let outcome = hunt_at(&ctx, NOW).await;

        assert_eq!(
            outcome,
            HuntOutcome::Searched {
                record_id: "sonarr-6".into()
            }
        );
        let calls = sonarr.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].contains(r#""episodeIds":[6]"#));
        assert!(calls[0].contains(r#""name":"EpisodeSearch""#));
        let marked = records.get("sonarr-6").await.unwrap().unwrap();
        assert_eq!(marked.last_searched_at, Some(NOW));
    }

    #[tokio::test]
    async fn test_failed_submission_leaves_record_eligible() {
        let radarr = Arc::new(FakeService::new(Service::Radarr));
        *radarr.fail_commands.lock().unwrap() = true;
        let (ctx, records, _) = context(vec![radarr]);
        records.insert(released(Service::Radarr, 1, "2023-11-01T00:00:00Z"));

        let outcome = hunt_at(&ctx, NOW).await;

        assert!(matches!(outcome, HuntOutcome::Failed { record_id: Some(ref id), .. } if id == "radarr-1"));
        assert_eq!(records.get("radarr-1").await.unwrap().unwrap().last_searched_at, None);
    }

    #[tokio::test]
    async fn test_second_run_respects_cooldown() {
        let radarr = Arc::new(FakeService::new(Service::Radarr));
        let (ctx, records, _) = context(vec![radarr.clone()]);
        records.insert(released(Service::Radarr, 1, "2023-11-13T00:00:00Z"));

        assert!(matches!(hunt_at(&ctx, NOW).await, HuntOutcome::Searched { .. }));
        assert_eq!(hunt_at(&ctx, NOW).await, HuntOutcome::Idle);
        assert_eq!(radarr.count("command"), 1);
    }
}
