//! Reconciliation of the local record store with upstream "missing" listings.
//!
//! One pass fetches every service's listing, upserts what it sees and then
//! deletes stored records that were not observed. Records of a service whose
//! fetch failed are kept until a later pass can see that service again.
//!
//! Only the first page of each listing is read, so an item still missing
//! upstream but beyond that page is dropped from the mirror until it moves
//! into the first page.

use std::collections::HashSet;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use eziarr_core::{parse_record_id, MissingRecord, Result, Service};

use crate::JobContext;

/// Summary of one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Records returned by upstream listings.
    pub observed: usize,
    /// Stored records deleted because they were not observed.
    pub deleted: usize,
    /// Services whose listing could not be fetched.
    pub failed_services: Vec<Service>,
}

async fn fetch(ctx: &JobContext, service: Service) -> (Service, Result<Vec<MissingRecord>>) {
    let result = match ctx.services.get(service) {
        Ok(client) => client.wanted_missing().await,
        Err(e) => Err(e),
    };
    (service, result)
}

/// Run one sync pass. Never fails; every error is logged and isolated.
pub async fn sync_missing(ctx: &JobContext) -> SyncReport {
    let start = Instant::now();
    let mut report = SyncReport::default();
    let mut active: HashSet<String> = HashSet::new();

    let fetches = join_all(Service::ALL.into_iter().map(|service| fetch(ctx, service))).await;

    for (service, result) in fetches {
        let records = match result {
            Ok(records) => records,
            Err(e) => {
                warn!(
                    subsystem = "jobs",
                    component = "sync",
                    service = %service,
                    error = %e,
                    "Missing listing unavailable, keeping stored records"
                );
                report.failed_services.push(service);
                continue;
            }
        };

        debug!(
            subsystem = "jobs",
            component = "sync",
            service = %service,
            result_count = records.len(),
            "Missing listing fetched"
        );
        for record in records {
            active.insert(record.id.clone());
            report.observed += 1;
            if let Err(e) = ctx.records.upsert(&record).await {
                error!(
                    subsystem = "jobs",
                    component = "sync",
                    record_id = %record.id,
                    error = %e,
                    "Failed to store record"
                );
            }
        }
    }

    let stored = match ctx.records.all_ids().await {
        Ok(ids) => ids,
        Err(e) => {
            error!(subsystem = "jobs", component = "sync", error = %e, "Failed to list stored records");
            return report;
        }
    };

    for id in stored {
        if active.contains(&id) {
            continue;
        }
        let owner_failed = parse_record_id(&id)
            .map(|(service, _)| report.failed_services.contains(&service))
            .unwrap_or(false);
        if owner_failed {
            continue;
        }
        match ctx.records.delete(&id).await {
            Ok(()) => report.deleted += 1,
            Err(e) => warn!(
                subsystem = "jobs",
                component = "sync",
                record_id = %id,
                error = %e,
                "Failed to delete stale record"
            ),
        }
    }

    info!(
        subsystem = "jobs",
        component = "sync",
        observed = report.observed,
        deleted = report.deleted,
        failed = report.failed_services.len(),
        duration_ms = start.elapsed().as_millis() as u64,
        "Sync pass complete"
    );
    report
}
