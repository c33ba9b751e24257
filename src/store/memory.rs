use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceStatus, NewAttendance, Page, PageRequest,
    PersonKind, SessionClose, SessionKey,
};
use crate::model::person::{LookupField, Person};
use crate::store::{AttendanceStore, PersonDirectory, StoreError};

/// In-process store for tests. Counts every call so tests can assert that a
/// request never reached the store.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<AttendanceRecord>>,
    people: Mutex<Vec<Person>>,
    failure: Mutex<Option<StoreError>>,
    next_id: AtomicU64,
    calls: AtomicU64,
    closed_elsewhere: AtomicU64,
    rejected_closes: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_person(&self, person: Person) {
        self.people.lock().await.push(person);
    }

    /// Makes every following call fail with `err`.
    pub async fn fail_with(&self, err: StoreError) {
        *self.failure.lock().await = Some(err);
    }

    /// The next `n` closes find the session already closed by another writer.
    pub fn close_elsewhere(&self, n: u64) {
        self.closed_elsewhere.store(n, Ordering::SeqCst);
    }

    /// The next `n` closes match no row and leave the session open.
    pub fn reject_closes(&self, n: u64) {
        self.rejected_closes.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn records(&self) -> Vec<AttendanceRecord> {
        self.records.lock().await.clone()
    }

    async fn enter(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure.lock().await.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

fn take_one(counter: &AtomicU64) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

fn matches(filter: &AttendanceFilter, record: &AttendanceRecord) -> bool {
    record.person_kind == filter.kind
        && filter
            .center_code
            .as_deref()
            .map_or(true, |c| record.center_code == c)
        && filter
            .person_id
            .as_deref()
            .map_or(true, |p| record.person_id == p)
        && filter
            .name_contains
            .as_deref()
            .map_or(true, |n| record.person_name.contains(n))
        && filter.date.map_or(true, |d| record.date == d)
        && filter.status.map_or(true, |s| record.status == s)
}

#[async_trait]
impl AttendanceStore for MemoryStore {
    async fn sessions_for_day(&self, key: &SessionKey) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.enter().await?;
        let records = self.records.lock().await;
        Ok(records
            .iter()
            .rev()
            .filter(|r| {
                r.status == AttendanceStatus::Present
                    && r.person_kind == key.kind
                    && r.person_id == key.person_id
                    && r.center_code == key.center_code
                    && r.date == key.date
            })
            .cloned()
            .collect())
    }

    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, StoreError> {
        self.enter().await?;
        let stored = AttendanceRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            person_id: record.person_id,
            person_name: record.person_name,
            person_kind: record.person_kind,
            center_code: record.center.code,
            center_name: record.center.name,
            branch_code: record.center.branch_code,
            branch_name: record.center.branch_name,
            date: record.date,
            check_in: record.check_in,
            check_out: None,
            status: record.status,
            method: record.method,
            device_info: record.device_info,
            notes: record.notes,
            reason: record.reason,
            detail: record.detail,
            created_at: Utc::now(),
        };
        self.records.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn close_session(
        &self,
        id: u64,
        close: SessionClose,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        self.enter().await?;
        let mut records = self.records.lock().await;
        let Some(record) = records.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        if record.check_out.is_some() || take_one(&self.rejected_closes) {
            return Ok(None);
        }
        if take_one(&self.closed_elsewhere) {
            record.check_out = Some(close.check_out);
            return Ok(None);
        }
        record.check_out = Some(close.check_out);
        record.device_info = close.device_info;
        record.notes = close.notes;
        Ok(Some(record.clone()))
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError> {
        self.enter().await?;
        let records = self.records.lock().await;
        let matching: Vec<&AttendanceRecord> =
            records.iter().rev().filter(|r| matches(filter, r)).collect();
        let total = matching.len() as i64;
        let items = matching
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.page_size as usize)
            .cloned()
            .collect();
        Ok(Page { items, total })
    }
}

#[async_trait]
impl PersonDirectory for MemoryStore {
    async fn find_person(
        &self,
        kind: PersonKind,
        field: LookupField,
        candidates: &[String],
    ) -> Result<Option<Person>, StoreError> {
        self.enter().await?;
        let people = self.people.lock().await;
        Ok(candidates.iter().find_map(|candidate| {
            people
                .iter()
                .find(|p| p.kind == kind && p.field(field) == Some(candidate.as_str()))
                .cloned()
        }))
    }
}
