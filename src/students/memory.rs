use std::collections::BTreeMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::students::error::StudentError;
use crate::students::pipeline::{aggregate, StoreStats};
use crate::students::query::{FilterSpec, SortSpec};
use crate::students::repo::StudentStore;
use crate::students::repo_types::{Student, StudentDraft};

#[derive(Default)]
struct Inner {
    last_id: i64,
    rows: BTreeMap<i64, Student>,
}

impl Inner {
    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.rows
            .values()
            .any(|s| s.email == email && Some(s.id) != except)
    }
}

/// Process-local store. Every write takes the single write lock, so the
/// uniqueness check and the write cannot interleave with another writer.
#[derive(Default)]
pub struct MemoryStudentStore {
    inner: RwLock<Inner>,
}

impl MemoryStudentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StudentStore for MemoryStudentStore {
    async fn get(&self, id: i64) -> Result<Student, StudentError> {
        let inner = self.inner.read().await;
        inner
            .rows
            .get(&id)
            .cloned()
            .ok_or_else(|| StudentError::not_found(id))
    }

    async fn insert(&self, draft: StudentDraft) -> Result<Student, StudentError> {
        let mut inner = self.inner.write().await;
        if inner.email_taken(&draft.email, None) {
            return Err(StudentError::uniqueness(draft.email));
        }
        let now = OffsetDateTime::now_utc();
        inner.last_id += 1;
        let student = Student {
            id: inner.last_id,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            address: draft.address,
            date_of_birth: draft.date_of_birth,
            enrollment_date: draft.enrollment_date.unwrap_or_else(|| now.date()),
            gpa: draft.gpa,
            profile_picture: None,
            created_at: now,
            updated_at: now,
        };
        inner.rows.insert(student.id, student.clone());
        Ok(student)
    }

    async fn update(&self, id: i64, draft: StudentDraft) -> Result<Student, StudentError> {
        let mut inner = self.inner.write().await;
        if !inner.rows.contains_key(&id) {
            return Err(StudentError::not_found(id));
        }
        if inner.email_taken(&draft.email, Some(id)) {
            return Err(StudentError::uniqueness(draft.email));
        }
        let Some(current) = inner.rows.get_mut(&id) else {
            return Err(StudentError::not_found(id));
        };
        current.first_name = draft.first_name;
        current.last_name = draft.last_name;
        current.email = draft.email;
        current.phone = draft.phone;
        current.address = draft.address;
        current.date_of_birth = draft.date_of_birth;
        if let Some(enrolled) = draft.enrollment_date {
            current.enrollment_date = enrolled;
        }
        current.gpa = draft.gpa;
        current.updated_at = OffsetDateTime::now_utc().max(current.updated_at);
        Ok(current.clone())
    }

    async fn set_picture(
        &self,
        id: i64,
        key: &str,
    ) -> Result<(Student, Option<String>), StudentError> {
        let mut inner = self.inner.write().await;
        let current = inner
            .rows
            .get_mut(&id)
            .ok_or_else(|| StudentError::not_found(id))?;
        let previous = current.profile_picture.replace(key.to_string());
        current.updated_at = OffsetDateTime::now_utc().max(current.updated_at);
        Ok((current.clone(), previous))
    }

    async fn delete(&self, id: i64) -> Result<(), StudentError> {
        let mut inner = self.inner.write().await;
        inner
            .rows
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StudentError::not_found(id))
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64, StudentError> {
        let mut inner = self.inner.write().await;
        let removed = ids
            .iter()
            .filter(|id| inner.rows.remove(*id).is_some())
            .count();
        Ok(removed as u64)
    }

    async fn query(
        &self,
        filter: &FilterSpec,
        sort: SortSpec,
        limit: Option<usize>,
    ) -> Result<Vec<Student>, StudentError> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Student> = inner
            .rows
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        rows.sort_by(|a, b| sort.compare(a, b));
        if let Some(limit) = limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn aggregate(&self) -> Result<StoreStats, StudentError> {
        let inner = self.inner.read().await;
        let all: Vec<Student> = inner.rows.values().cloned().collect();
        Ok(aggregate(&all))
    }
}
