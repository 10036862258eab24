//! In-memory stores and a scriptable media service for unit tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde_json::{Map, Value as JsonValue};
use tokio::sync::Notify;

use eziarr_core::defaults::SEARCH_COOLDOWN_MS;
use eziarr_core::*;

use crate::JobContext;

#[derive(Default)]
pub struct MemoryRecords(Mutex<BTreeMap<String, MissingRecord>>);

impl MemoryRecords {
    pub fn insert(&self, record: MissingRecord) {
        self.0.lock().unwrap().insert(record.id.clone(), record);
    }

    pub fn ids(&self) -> Vec<String> {
        self.0.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl MissingRecordRepository for MemoryRecords {
    async fn upsert(&self, record: &MissingRecord) -> Result<()> {
        let mut records = self.0.lock().unwrap();
        match records.get_mut(&record.id) {
            Some(existing) => {
                existing.status = record.status.clone();
                existing.poster_url = record.poster_url.clone();
                existing.release_date = record.release_date.clone();
            }
            None => {
                records.insert(record.id.clone(), record.clone());
            }
        }
        Ok(())
    }

    async fn all_ids(&self) -> Result<Vec<String>> {
        Ok(self.ids())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.0.lock().unwrap().remove(id);
        Ok(())
    }

    async fn mark_searched(&self, id: &str, timestamp_ms: i64) -> Result<()> {
        if let Some(record) = self.0.lock().unwrap().get_mut(id) {
            record.last_searched_at = Some(record.last_searched_at.unwrap_or(0).max(timestamp_ms));
        }
        Ok(())
    }

    async fn next_search_candidate(&self, now_ms: i64) -> Result<Option<MissingRecord>> {
        let now = Utc
            .timestamp_millis_opt(now_ms)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();
        let records = self.0.lock().unwrap();
        Ok(records
            .values()
            .filter(|r| {
                r.last_searched_at
                    .map_or(true, |at| at <= now_ms - SEARCH_COOLDOWN_MS)
            })
            .filter(|r| r.release_date.as_deref().is_some_and(|d| d <= now.as_str()))
            .max_by(|a, b| a.release_date.cmp(&b.release_date))
            .cloned())
    }

    async fn get(&self, id: &str) -> Result<Option<MissingRecord>> {
        Ok(self.0.lock().unwrap().get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<MissingRecord>> {
        Ok(self.0.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Mutex<Map<String, JsonValue>>,
    notify: Arc<Notify>,
}

impl MemorySettings {
    pub fn change_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }
}

#[async_trait]
impl SettingsRepository for MemorySettings {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>> {
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<()> {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn set_many(&self, values: &Map<String, JsonValue>) -> Result<()> {
        self.values.lock().unwrap().extend(values.clone());
        self.notify.notify_waiters();
        Ok(())
    }

    async fn all(&self) -> Result<Map<String, JsonValue>> {
        Ok(self.values.lock().unwrap().clone())
    }
}

/// Media service double that records every call.
pub struct FakeService {
    service: Service,
    /// `None` makes the listing fail.
    pub wanted: Mutex<Option<Vec<MissingRecord>>>,
    pub decisions: Mutex<VecDeque<ReleaseDecision>>,
    pub profiles: Mutex<Vec<QualityProfile>>,
    pub resources: Mutex<HashMap<String, JsonValue>>,
    pub queue: Mutex<Vec<QueueItem>>,
    pub failing_removals: Mutex<HashSet<i64>>,
    pub fail_commands: Mutex<bool>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new(service: Service) -> Self {
        Self {
            service,
            wanted: Mutex::new(Some(Vec::new())),
            decisions: Mutex::new(VecDeque::new()),
            profiles: Mutex::new(Vec::new()),
            resources: Mutex::new(HashMap::new()),
            queue: Mutex::new(Vec::new()),
            failing_removals: Mutex::new(HashSet::new()),
            fail_commands: Mutex::new(false),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_wanted(self, records: Option<Vec<MissingRecord>>) -> Self {
        *self.wanted.lock().unwrap() = records;
        self
    }

    pub fn with_resource(self, resource: &str, id: i64, body: JsonValue) -> Self {
        self.resources
            .lock()
            .unwrap()
            .insert(format!("{resource}/{id}"), body);
        self
    }

    pub fn push_decision(&self, rejected: bool, rejections: &[&str]) {
        self.decisions.lock().unwrap().push_back(ReleaseDecision {
            rejected,
            rejections: rejections.iter().map(|s| s.to_string()).collect(),
        });
    }

    pub fn resource(&self, key: &str) -> Option<JsonValue> {
        self.resources.lock().unwrap().get(key).cloned()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable(&self, what: &str) -> Error {
        Error::upstream(self.service, format!("{what} failed"))
    }
}

#[async_trait]
impl MediaService for FakeService {
    fn service(&self) -> Service {
        self.service
    }

    async fn wanted_missing(&self) -> Result<Vec<MissingRecord>> {
        self.record("wanted".into());
        self.wanted
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| self.unavailable("wanted"))
    }

    async fn queue(&self) -> Result<Vec<QueueItem>> {
        self.record("queue".into());
        Ok(self.queue.lock().unwrap().clone())
    }

    async fn remove_from_queue(&self, queue_id: i64) -> Result<()> {
        self.record(format!("remove:{queue_id}"));
        if self.failing_removals.lock().unwrap().contains(&queue_id) {
            return Err(self.unavailable("remove"));
        }
        self.queue.lock().unwrap().retain(|q| q.id != queue_id);
        Ok(())
    }

    async fn command(&self, body: &JsonValue) -> Result<()> {
        self.record(format!("command:{body}"));
        if *self.fail_commands.lock().unwrap() {
            return Err(self.unavailable("command"));
        }
        Ok(())
    }

    async fn push_release(&self, _release: &ReleasePush) -> Result<ReleaseDecision> {
        self.record("push".into());
        Ok(self.decisions.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn quality_profiles(&self) -> Result<Vec<QualityProfile>> {
        self.record("profiles".into());
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn get_resource(&self, resource: &str, id: i64) -> Result<JsonValue> {
        let key = format!("{resource}/{id}");
        self.record(format!("get:{key}"));
        self.resource(&key)
            .ok_or_else(|| Error::upstream(self.service, format!("{key} returned HTTP 404")))
    }

    async fn put_resource(&self, resource: &str, id: i64, body: &JsonValue) -> Result<()> {
        let key = format!("{resource}/{id}");
        self.record(format!("put:{key}"));
        self.resources.lock().unwrap().insert(key, body.clone());
        Ok(())
    }
}

pub fn queue_item(service: Service, id: i64, service_item_id: i64) -> QueueItem {
    QueueItem {
        id,
        service,
        service_item_id: Some(service_item_id),
        status: Some("downloading".into()),
        track_status: Some("ok".into()),
        quality: None,
        timeleft: None,
        indexer: None,
        title: None,
    }
}

pub fn released(service: Service, id: i64, date: &str) -> MissingRecord {
    MissingRecord::new(service, id, format!("{service} {id}")).with_release_date(Some(date.into()))
}

/// Context over fresh in-memory stores and the given services.
pub fn context(services: Vec<Arc<FakeService>>) -> (JobContext, Arc<MemoryRecords>, Arc<MemorySettings>) {
    let records = Arc::new(MemoryRecords::default());
    let settings = Arc::new(MemorySettings::default());
    let registry = services
        .into_iter()
        .fold(MediaServices::new(), |acc, s| acc.with(s));
    (
        JobContext::new(records.clone(), settings.clone(), registry),
        records,
        settings,
    )
}
