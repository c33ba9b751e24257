use async_trait::async_trait;
use derive_more::Display;

use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, NewAttendance, Page, PageRequest, PersonKind, SessionClose,
    SessionKey,
};
use crate::model::person::{LookupField, Person};

#[cfg(test)]
pub mod memory;
pub mod mysql;

// MySQL reports rejected credentials as SQLSTATE 28000 (ER_ACCESS_DENIED_ERROR).
const ACCESS_DENIED_SQLSTATE: &str = "28000";

#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum StoreError {
    #[display(fmt = "store authentication failed: {}", _0)]
    Authentication(String),
    #[display(fmt = "{}", _0)]
    Backend(String),
}

impl std::error::Error for StoreError {}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.code().as_deref() == Some(ACCESS_DENIED_SQLSTATE) {
                return StoreError::Authentication(db_err.message().to_string());
            }
        }
        StoreError::Backend(err.to_string())
    }
}

/// Persistent attendance rows.
#[async_trait]
pub trait AttendanceStore: Send + Sync {
    /// Present (non-absence) records for the key, newest first.
    async fn sessions_for_day(&self, key: &SessionKey) -> Result<Vec<AttendanceRecord>, StoreError>;

    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, StoreError>;

    /// Closes the record only if it is still open. `None` means another
    /// writer closed it first.
    async fn close_session(
        &self,
        id: u64,
        close: SessionClose,
    ) -> Result<Option<AttendanceRecord>, StoreError>;

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError>;
}

/// Students and teachers a scanned card may belong to.
#[async_trait]
pub trait PersonDirectory: Send + Sync {
    /// First person of `kind` whose `field` equals one of `candidates`,
    /// earlier candidates taking precedence.
    async fn find_person(
        &self,
        kind: PersonKind,
        field: LookupField,
        candidates: &[String],
    ) -> Result<Option<Person>, StoreError>;
}
