use std::str::FromStr;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::{FromRow, MySqlPool};

use crate::model::attendance::{
    AttendanceFilter, AttendanceRecord, AttendanceStatus, NewAttendance, Page, PageRequest,
    PersonKind, SessionClose, SessionKey,
};
use crate::model::device_info;
use crate::model::person::{LookupField, Person};
use crate::store::{AttendanceStore, PersonDirectory, StoreError};

const RECORD_COLUMNS: &str = r#"
    id, person_kind, person_id, person_name, center_code, center_name,
    branch_code, branch_name, date, check_in, check_out, status, method,
    device_info, notes, reason, detail, created_at
"#;

#[derive(FromRow)]
struct AttendanceRow {
    id: u64,
    person_kind: String,
    person_id: String,
    person_name: String,
    center_code: String,
    center_name: Option<String>,
    branch_code: Option<String>,
    branch_name: Option<String>,
    date: NaiveDate,
    check_in: Option<NaiveDateTime>,
    check_out: Option<NaiveDateTime>,
    status: String,
    method: String,
    device_info: String,
    notes: String,
    reason: Option<String>,
    detail: Option<String>,
    created_at: NaiveDateTime,
}

impl TryFrom<AttendanceRow> for AttendanceRecord {
    type Error = StoreError;

    fn try_from(row: AttendanceRow) -> Result<Self, Self::Error> {
        let person_kind = PersonKind::from_str(&row.person_kind)
            .map_err(|_| StoreError::Backend(format!("unknown person_kind {}", row.person_kind)))?;
        let status = AttendanceStatus::from_str(&row.status)
            .map_err(|_| StoreError::Backend(format!("unknown status {}", row.status)))?;

        Ok(AttendanceRecord {
            id: row.id,
            person_id: row.person_id,
            person_name: row.person_name,
            person_kind,
            center_code: row.center_code,
            center_name: row.center_name,
            branch_code: row.branch_code,
            branch_name: row.branch_name,
            date: row.date,
            check_in: row.check_in.map(|t| t.and_utc()),
            check_out: row.check_out.map(|t| t.and_utc()),
            status,
            method: row.method,
            device_info: device_info::parse_stored(&row.device_info),
            notes: row.notes,
            reason: row.reason,
            detail: row.detail,
            created_at: row.created_at.and_utc(),
        })
    }
}

#[derive(FromRow)]
struct PersonRow {
    id: String,
    name: String,
    center_code: String,
    status: String,
    card_number: Option<String>,
    business_id: Option<String>,
}

// Typed values for dynamically built WHERE clauses
enum FilterValue {
    Str(String),
    Date(NaiveDate),
}

/// Attendance rows and the person directory on MySQL.
#[derive(Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
}

impl MySqlStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn fetch_by_id(&self, id: u64) -> Result<AttendanceRecord, StoreError> {
        let sql = format!("SELECT {} FROM attendance_records WHERE id = ?", RECORD_COLUMNS);
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row.try_into()
    }
}

fn directory_table(kind: PersonKind) -> (&'static str, &'static str) {
    match kind {
        PersonKind::Student => ("students", "student_number"),
        PersonKind::Teacher => ("teachers", "teacher_number"),
    }
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn where_clause(filter: &AttendanceFilter) -> (String, Vec<FilterValue>) {
    let mut where_sql = String::from(" WHERE person_kind = ?");
    let mut args = vec![FilterValue::Str(filter.kind.to_string())];

    if let Some(center) = filter.center_code.as_deref() {
        where_sql.push_str(" AND center_code = ?");
        args.push(FilterValue::Str(center.to_string()));
    }
    if let Some(person_id) = filter.person_id.as_deref() {
        where_sql.push_str(" AND person_id = ?");
        args.push(FilterValue::Str(person_id.to_string()));
    }
    if let Some(name) = filter.name_contains.as_deref() {
        where_sql.push_str(" AND person_name LIKE ?");
        args.push(FilterValue::Str(format!("%{}%", escape_like(name))));
    }
    if let Some(date) = filter.date {
        where_sql.push_str(" AND date = ?");
        args.push(FilterValue::Date(date));
    }
    if let Some(status) = filter.status {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status.to_string()));
    }

    (where_sql, args)
}

#[async_trait]
impl AttendanceStore for MySqlStore {
    async fn sessions_for_day(&self, key: &SessionKey) -> Result<Vec<AttendanceRecord>, StoreError> {
        let sql = format!(
            r#"
            SELECT {}
            FROM attendance_records
            WHERE person_kind = ? AND person_id = ? AND center_code = ? AND date = ?
            AND status = ?
            ORDER BY created_at DESC, id DESC
            "#,
            RECORD_COLUMNS
        );

        let rows = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(key.kind.to_string())
            .bind(&key.person_id)
            .bind(&key.center_code)
            .bind(key.date)
            .bind(AttendanceStatus::Present.to_string())
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(AttendanceRecord::try_from).collect()
    }

    async fn insert(&self, record: NewAttendance) -> Result<AttendanceRecord, StoreError> {
        let device_info = serde_json::to_string(&record.device_info)
            .map_err(|e| StoreError::Backend(format!("device_info encode failed: {}", e)))?;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
                (person_kind, person_id, person_name, center_code, center_name,
                 branch_code, branch_name, date, check_in, status, method,
                 device_info, notes, reason, detail)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.person_kind.to_string())
        .bind(&record.person_id)
        .bind(&record.person_name)
        .bind(&record.center.code)
        .bind(&record.center.name)
        .bind(&record.center.branch_code)
        .bind(&record.center.branch_name)
        .bind(record.date)
        .bind(record.check_in.map(|t| t.naive_utc()))
        .bind(record.status.to_string())
        .bind(&record.method)
        .bind(device_info)
        .bind(&record.notes)
        .bind(&record.reason)
        .bind(&record.detail)
        .execute(&self.pool)
        .await?;

        self.fetch_by_id(result.last_insert_id()).await
    }

    async fn close_session(
        &self,
        id: u64,
        close: SessionClose,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let device_info = serde_json::to_string(&close.device_info)
            .map_err(|e| StoreError::Backend(format!("device_info encode failed: {}", e)))?;

        let result = sqlx::query(
            r#"
            UPDATE attendance_records
            SET check_out = ?, device_info = ?, notes = ?
            WHERE id = ?
            AND check_out IS NULL
            "#,
        )
        .bind(close.check_out.naive_utc())
        .bind(device_info)
        .bind(&close.notes)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        self.fetch_by_id(id).await.map(Some)
    }

    async fn list(
        &self,
        filter: &AttendanceFilter,
        page: PageRequest,
    ) -> Result<Page<AttendanceRecord>, StoreError> {
        let (where_sql, args) = where_clause(filter);

        let count_sql = format!("SELECT COUNT(*) FROM attendance_records{}", where_sql);
        let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
        for arg in &args {
            count_q = match arg {
                FilterValue::Str(s) => count_q.bind(s.as_str()),
                FilterValue::Date(d) => count_q.bind(*d),
            };
        }

        let data_sql = format!(
            r#"
            SELECT {}
            FROM attendance_records
            {}
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
            RECORD_COLUMNS, where_sql
        );
        let mut data_q = sqlx::query_as::<_, AttendanceRow>(&data_sql);
        for arg in &args {
            data_q = match arg {
                FilterValue::Str(s) => data_q.bind(s.as_str()),
                FilterValue::Date(d) => data_q.bind(*d),
            };
        }
        let data_q = data_q.bind(page.page_size).bind(page.offset());

        let (total, rows) =
            futures::try_join!(count_q.fetch_one(&self.pool), data_q.fetch_all(&self.pool))?;

        let items = rows
            .into_iter()
            .map(AttendanceRecord::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Page { items, total })
    }
}

#[async_trait]
impl PersonDirectory for MySqlStore {
    async fn find_person(
        &self,
        kind: PersonKind,
        field: LookupField,
        candidates: &[String],
    ) -> Result<Option<Person>, StoreError> {
        if candidates.is_empty() {
            return Ok(None);
        }

        let (table, business_column) = directory_table(kind);
        let column = match field {
            LookupField::CardNumber => "card_number",
            LookupField::BusinessId => business_column,
        };
        let placeholders = vec!["?"; candidates.len()].join(", ");
        let sql = format!(
            r#"
            SELECT id, name, center_code, status, card_number, {business_column} AS business_id
            FROM {table}
            WHERE {column} IN ({placeholders})
            "#
        );

        let mut query = sqlx::query_as::<_, PersonRow>(&sql);
        for candidate in candidates {
            query = query.bind(candidate.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let people: Vec<Person> = rows
            .into_iter()
            .map(|row| Person {
                id: row.id,
                name: row.name,
                kind,
                center_code: row.center_code,
                status: row.status,
                card_number: row.card_number,
                business_id: row.business_id,
            })
            .collect();

        // MySQL's default collation ignores case, so pick by candidate order here
        Ok(candidates.iter().find_map(|candidate| {
            people
                .iter()
                .find(|p| p.field(field) == Some(candidate.as_str()))
                .or_else(|| {
                    people.iter().find(|p| {
                        p.field(field)
                            .is_some_and(|v| v.eq_ignore_ascii_case(candidate))
                    })
                })
                .cloned()
        }))
    }
}
