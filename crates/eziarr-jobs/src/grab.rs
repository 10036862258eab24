//! Adaptive grab protocol.
//!
//! Pushes a release to a service and, when the service rejects it for a
//! reason this module knows how to correct, applies the correction and pushes
//! exactly once more:
//!
//! ```text
//! push -> accepted                                   -> success
//!      -> rejected -> no known cause                 -> failure (all reasons)
//!                  -> profile / queue corrected      -> settle -> push -> success
//!                                                                      -> failure (first reason)
//! ```
//!
//! Correctable causes are detected by substring match on the lower-cased,
//! space-joined rejection text:
//! - `profile`, `cutoff`, `wanted`: switch the owning entity to the "Any"
//!   quality profile (or the first profile when none is named so).
//! - `queue`, `equal or higher preference`: remove queue entries for the item
//!   from the download client and blocklist them.

use std::time::Duration;

use serde_json::{json, Value as JsonValue};
use tracing::{error, info, warn};

use eziarr_core::defaults::{ANY_PROFILE_NAME, GRAB_SETTLE_DELAY_MS};
use eziarr_core::{
    Error, GrabOutcome, GrabRequest, MediaService, MediaServices, ProfileOwner, ReleasePush,
    Result,
};

const PROFILE_MARKERS: [&str; 3] = ["profile", "cutoff", "wanted"];
const QUEUE_MARKERS: [&str; 2] = ["queue", "equal or higher preference"];

/// Whether the rejection text calls for a quality profile switch.
pub fn needs_profile_switch(reasons: &str) -> bool {
    PROFILE_MARKERS.iter().any(|m| reasons.contains(m))
}

/// Whether the rejection text calls for clearing the download queue.
pub fn needs_queue_clear(reasons: &str) -> bool {
    QUEUE_MARKERS.iter().any(|m| reasons.contains(m))
}

/// Runs the grab protocol against the registered services.
#[derive(Clone)]
pub struct GrabProtocol {
    services: MediaServices,
    settle_delay: Duration,
}

impl GrabProtocol {
    pub fn new(services: MediaServices) -> Self {
        Self {
            services,
            settle_delay: Duration::from_millis(GRAB_SETTLE_DELAY_MS),
        }
    }

    /// Override the pause between a correction and the second push.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Commit the release. Errors are folded into a failed outcome.
    pub async fn grab(&self, request: &GrabRequest) -> GrabOutcome {
        match self.negotiate(request).await {
            Ok(outcome) => {
                info!(
                    subsystem = "jobs",
                    component = "grab",
                    service = %request.service,
                    service_id = request.service_id,
                    success = outcome.success,
                    message = %outcome.message,
                    "Grab finished"
                );
                outcome
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    component = "grab",
                    service = %request.service,
                    service_id = request.service_id,
                    error = %e,
                    "Grab failed"
                );
                GrabOutcome::failure(format!("API error during force grab: {e}"))
            }
        }
    }

    async fn negotiate(&self, request: &GrabRequest) -> Result<GrabOutcome> {
        let client = self.services.get(request.service)?;
        let push = || ReleasePush::now(&request.title, &request.download_url);

        let first = client.push_release(&push()).await?;
        if !first.rejected {
            return Ok(GrabOutcome::success("Grabbed successfully"));
        }

        let reasons = first.rejections.join(" ").to_lowercase();
        info!(
            subsystem = "jobs",
            component = "grab",
            service = %request.service,
            reasons = %reasons,
            "Release rejected"
        );

        let mut corrected = false;
        if needs_profile_switch(&reasons) {
            corrected |= switch_to_any_profile(client.as_ref(), request.service_id).await?;
        }
        if needs_queue_clear(&reasons) {
            corrected |= clear_queue(client.as_ref(), request.service_id).await?;
        }

        if !corrected {
            return Ok(GrabOutcome::failure(format!("Rejected: {reasons}")));
        }

        tokio::time::sleep(self.settle_delay).await;

        let second = client.push_release(&push()).await?;
        if second.rejected {
            let first_reason = second
                .rejections
                .first()
                .map(String::as_str)
                .unwrap_or("unknown reason");
            Ok(GrabOutcome::failure(format!("Still rejected: {first_reason}")))
        } else {
            Ok(GrabOutcome::success("Grabbed! (Overrode Profile/Queue)"))
        }
    }
}

/// Point the entity owning the item's quality profile at the "Any" profile.
///
/// Returns whether anything was changed.
async fn switch_to_any_profile(client: &dyn MediaService, item_id: i64) -> Result<bool> {
    let service = client.service();
    let spec = service.spec();

    let profiles = client.quality_profiles().await?;
    let Some(profile) = profiles
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(ANY_PROFILE_NAME))
        .or_else(|| profiles.first())
    else {
        warn!(subsystem = "jobs", component = "grab", service = %service, "No quality profiles available");
        return Ok(false);
    };

    let (resource, target_id) = match spec.profile_owner {
        ProfileOwner::Item => (spec.item_resource, item_id),
        ProfileOwner::Parent {
            parent_key,
            resource,
        } => {
            let item = client.get_resource(spec.item_resource, item_id).await?;
            let parent_id = item
                .get(parent_key)
                .and_then(JsonValue::as_i64)
                .ok_or_else(|| {
                    Error::upstream(
                        service,
                        format!("{} {item_id} has no {parent_key}", spec.item_resource),
                    )
                })?;
            (resource, parent_id)
        }
    };

    let mut target = client.get_resource(resource, target_id).await?;
    if target.get("qualityProfileId").and_then(JsonValue::as_i64) == Some(profile.id) {
        return Ok(false);
    }
    target
        .as_object_mut()
        .ok_or_else(|| Error::upstream(service, format!("{resource} {target_id} is not an object")))?
        .insert("qualityProfileId".into(), json!(profile.id));
    client.put_resource(resource, target_id, &target).await?;

    info!(
        subsystem = "jobs",
        component = "grab",
        service = %service,
        resource,
        target_id,
        profile = %profile.name,
        "Quality profile switched"
    );
    Ok(true)
}

/// Remove every queue entry downloading the item. A failed removal is logged
/// and does not stop the others.
async fn clear_queue(client: &dyn MediaService, item_id: i64) -> Result<bool> {
    let service = client.service();
    let queue = client.queue().await?;
    let mut removed = false;

    for entry in queue.iter().filter(|q| q.service_item_id == Some(item_id)) {
        match client.remove_from_queue(entry.id).await {
            Ok(()) => {
                info!(subsystem = "jobs", component = "grab", service = %service, queue_id = entry.id, "Blocking queue entry removed");
                removed = true;
            }
            Err(e) => {
                warn!(subsystem = "jobs", component = "grab", service = %service, queue_id = entry.id, error = %e, "Failed to remove queue entry");
            }
        }
    }
    Ok(removed)
}
