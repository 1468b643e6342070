use anyhow::Context;
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::students::bands::{AVERAGE_MIN, EXCELLENT_MIN, GOOD_MIN};
use crate::students::error::StudentError;
use crate::students::pipeline::{round_gpa, StoreStats};
use crate::students::query::{FilterSpec, SortSpec};
use crate::students::repo_types::{Student, StudentDraft};

/// Persistence port for student records.
///
/// Implementations keep email unique at all times: the uniqueness check and
/// the write happen atomically.
#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn get(&self, id: i64) -> Result<Student, StudentError>;
    async fn insert(&self, draft: StudentDraft) -> Result<Student, StudentError>;
    /// Full edit of the form fields. `profile_picture` is left untouched.
    async fn update(&self, id: i64, draft: StudentDraft) -> Result<Student, StudentError>;
    /// Points the record at a new picture in one atomic step and returns the
    /// updated record with the key it replaced.
    async fn set_picture(
        &self,
        id: i64,
        key: &str,
    ) -> Result<(Student, Option<String>), StudentError>;
    async fn delete(&self, id: i64) -> Result<(), StudentError>;
    /// Removes every listed id in one step; unknown ids are ignored.
    /// Returns how many records were removed.
    async fn delete_many(&self, ids: &[i64]) -> Result<u64, StudentError>;
    /// Matching records in the requested order.
    async fn query(
        &self,
        filter: &FilterSpec,
        sort: SortSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Student>, StudentError>;
    /// Figures over the whole store.
    async fn aggregate(&self) -> Result<StoreStats, StudentError>;
}

const COLUMNS: &str = "id, first_name, last_name, email, phone, address, date_of_birth, \
                       enrollment_date, gpa, profile_picture, created_at, updated_at";

const UNIQUE_VIOLATION: &str = "23505";

fn write_error(e: sqlx::Error, email: &str, what: &'static str) -> StudentError {
    if let sqlx::Error::Database(db) = &e {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StudentError::uniqueness(email);
        }
    }
    StudentError::Storage(anyhow::Error::new(e).context(what))
}

/// Escapes `%`, `_` and `\` for use inside an ILIKE pattern.
fn like_pattern(term: &str) -> String {
    let mut out = String::with_capacity(term.len() + 2);
    out.push('%');
    for ch in term.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('%');
    out
}

#[derive(Clone)]
pub struct PgStudentStore {
    db: PgPool,
}

impl PgStudentStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StudentStore for PgStudentStore {
    async fn get(&self, id: i64) -> Result<Student, StudentError> {
        sqlx::query_as::<_, Student>(&format!("SELECT {COLUMNS} FROM students WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await
            .context("get student")?
            .ok_or_else(|| StudentError::not_found(id))
    }

    async fn insert(&self, draft: StudentDraft) -> Result<Student, StudentError> {
        let enrollment_date = draft
            .enrollment_date
            .unwrap_or_else(|| OffsetDateTime::now_utc().date());
        sqlx::query_as::<_, Student>(&format!(
            r#"
            INSERT INTO students
                (first_name, last_name, email, phone, address, date_of_birth,
                 enrollment_date, gpa)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(&draft.address)
        .bind(draft.date_of_birth)
        .bind(enrollment_date)
        .bind(draft.gpa)
        .fetch_one(&self.db)
        .await
        .map_err(|e| write_error(e, &draft.email, "insert student"))
    }

    async fn update(&self, id: i64, draft: StudentDraft) -> Result<Student, StudentError> {
        sqlx::query_as::<_, Student>(&format!(
            r#"
            UPDATE students
               SET first_name = $2,
                   last_name = $3,
                   email = $4,
                   phone = $5,
                   address = $6,
                   date_of_birth = $7,
                   enrollment_date = COALESCE($8, enrollment_date),
                   gpa = $9,
                   updated_at = GREATEST(now(), updated_at)
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&draft.first_name)
        .bind(&draft.last_name)
        .bind(&draft.email)
        .bind(&draft.phone)
        .bind(&draft.address)
        .bind(draft.date_of_birth)
        .bind(draft.enrollment_date)
        .bind(draft.gpa)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| write_error(e, &draft.email, "update student"))?
        .ok_or_else(|| StudentError::not_found(id))
    }

    async fn set_picture(
        &self,
        id: i64,
        key: &str,
    ) -> Result<(Student, Option<String>), StudentError> {
        let mut tx = self.db.begin().await.context("begin set_picture")?;
        let previous: Option<Option<String>> =
            sqlx::query_scalar("SELECT profile_picture FROM students WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await
                .context("lock student for picture")?;
        let Some(previous) = previous else {
            return Err(StudentError::not_found(id));
        };
        let student = sqlx::query_as::<_, Student>(&format!(
            r#"
            UPDATE students
               SET profile_picture = $2,
                   updated_at = GREATEST(now(), updated_at)
             WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(key)
        .fetch_one(&mut *tx)
        .await
        .context("set student picture")?;
        tx.commit().await.context("commit set_picture")?;
        Ok((student, previous))
    }

    async fn delete(&self, id: i64) -> Result<(), StudentError> {
        let done = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await
            .context("delete student")?;
        if done.rows_affected() == 0 {
            return Err(StudentError::not_found(id));
        }
        Ok(())
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64, StudentError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let done = sqlx::query("DELETE FROM students WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.db)
            .await
            .context("bulk delete students")?;
        Ok(done.rows_affected())
    }

    async fn query(
        &self,
        filter: &FilterSpec,
        sort: SortSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Student>, StudentError> {
        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {COLUMNS} FROM students WHERE TRUE"));

        if let Some(needle) = filter.search_needle() {
            let pattern = like_pattern(&needle);
            qb.push(" AND (first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(min) = filter.gpa_min {
            qb.push(" AND gpa >= ").push_bind(min);
        }
        if let Some(max) = filter.gpa_max {
            qb.push(" AND gpa <= ").push_bind(max);
        }
        if let Some(band) = filter.band {
            let (lower, upper) = band.bounds();
            if let Some(lower) = lower {
                qb.push(" AND gpa >= ").push_bind(lower);
            }
            if let Some(upper) = upper {
                qb.push(" AND gpa < ").push_bind(upper);
            }
        }
        if let Some(ids) = &filter.ids {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }

        qb.push(" ORDER BY ").push(sort.order_by_sql());
        if let Some(limit) = limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }

        let rows = qb
            .build_query_as::<Student>()
            .fetch_all(&self.db)
            .await
            .context("query students")?;
        Ok(rows)
    }

    async fn aggregate(&self) -> Result<StoreStats, StudentError> {
        let (total, avg_gpa, excellent, good, average, poor) =
            sqlx::query_as::<_, (i64, Option<rust_decimal::Decimal>, i64, i64, i64, i64)>(
                r#"
                SELECT COUNT(*),
                       AVG(gpa),
                       COUNT(*) FILTER (WHERE gpa >= $1),
                       COUNT(*) FILTER (WHERE gpa >= $2 AND gpa < $1),
                       COUNT(*) FILTER (WHERE gpa >= $3 AND gpa < $2),
                       COUNT(*) FILTER (WHERE gpa < $3)
                  FROM students
                "#,
            )
            .bind(EXCELLENT_MIN)
            .bind(GOOD_MIN)
            .bind(AVERAGE_MIN)
            .fetch_one(&self.db)
            .await
            .context("aggregate students")?;

        Ok(StoreStats {
            total: total as u64,
            avg_gpa: avg_gpa.map(round_gpa),
            excellent: excellent as u64,
            good: good as u64,
            average: average as u64,
            poor: poor as u64,
        })
    }
}
