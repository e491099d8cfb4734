use std::collections::HashMap;

use parking_lot::RwLock;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{JobReport, JobState};

#[derive(Debug, Clone)]
pub struct JobRecord {
    pub id: Uuid,
    pub state: JobState,
    pub message: String,
    pub report: Option<JobReport>,
    pub updated_at: OffsetDateTime,
}

/// In-memory status table keyed by job id. Terminal records are evicted
/// oldest-first once `limit` is exceeded; in-flight jobs are never evicted.
pub struct JobRepository {
    limit: usize,
    records: RwLock<HashMap<Uuid, JobRecord>>,
}

impl JobRepository {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn insert(&self, id: Uuid) {
        let mut records = self.records.write();
        records.insert(
            id,
            JobRecord {
                id,
                state: JobState::Pending,
                message: "Download queued".to_string(),
                report: None,
                updated_at: OffsetDateTime::now_utc(),
            },
        );
        Self::evict(&mut records, self.limit);
    }

    pub fn set_state(&self, id: Uuid, state: JobState, message: &str) {
        if let Some(record) = self.records.write().get_mut(&id) {
            if record.state.is_terminal() {
                return;
            }
            record.state = state;
            record.message = message.to_string();
            record.updated_at = OffsetDateTime::now_utc();
        }
    }

    pub fn complete(&self, report: JobReport) {
        let mut records = self.records.write();
        let record = records.entry(report.job_id).or_insert_with(|| JobRecord {
            id: report.job_id,
            state: report.state,
            message: String::new(),
            report: None,
            updated_at: OffsetDateTime::now_utc(),
        });
        record.state = report.state;
        record.message = report.message.clone();
        record.updated_at = OffsetDateTime::now_utc();
        record.report = Some(report);
        Self::evict(&mut records, self.limit);
    }

    /// Used when a job is dropped mid-flight (client gone, task aborted).
    pub fn mark_abandoned(&self, id: Uuid) {
        if let Some(record) = self.records.write().get_mut(&id) {
            if !record.state.is_terminal() {
                record.state = JobState::Failed;
                record.message = "Download was cancelled before completion".to_string();
                record.updated_at = OffsetDateTime::now_utc();
            }
        }
    }

    /// Forget a job that never got queued.
    pub fn remove(&self, id: Uuid) {
        self.records.write().remove(&id);
    }

    pub fn get(&self, id: Uuid) -> Option<JobRecord> {
        self.records.read().get(&id).cloned()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    fn evict(records: &mut HashMap<Uuid, JobRecord>, limit: usize) {
        while records.len() > limit {
            let oldest = records
                .values()
                .filter(|r| r.state.is_terminal())
                .min_by_key(|r| r.updated_at)
                .map(|r| r.id);
            match oldest {
                Some(id) => {
                    records.remove(&id);
                }
                None => break,
            }
        }
    }
}
