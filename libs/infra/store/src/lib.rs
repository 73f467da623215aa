pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{AuditRepository, EmbeddingRepository, EmployeeRepository};

use chrono::{DateTime, Utc};
use faceaccess_models::{AuditRecord, Employee, NewAuditRecord};
use serde_json::json;

/// System-wide counters for an admin status query.
#[derive(Debug, Clone)]
pub struct SystemStatus {
    pub active_employees: u64,
    pub total_employees: u64,
    pub total_embeddings: u64,
    pub attempts_last_hour: u64,
}

/// The Store component: a single handle bundling the employee, embedding
/// and audit repositories behind the operation set described for this
/// component. Cheap to clone (every field is an `Arc`-backed repository).
#[derive(Clone)]
pub struct Store {
    employees: EmployeeRepository,
    embeddings: EmbeddingRepository,
    audit: AuditRepository,
}

impl Store {
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let client = StoreClient::connect(path).await?;
        Ok(Store {
            employees: EmployeeRepository::new(client.clone()),
            embeddings: EmbeddingRepository::new(client.clone()),
            audit: AuditRepository::new(client),
        })
    }

    pub async fn upsert_employee(
        &self,
        employee_id: &str,
        display_name: Option<&str>,
        access_start: DateTime<Utc>,
        access_end: DateTime<Utc>,
        is_active: bool,
    ) -> Result<(), StoreError> {
        self.employees
            .upsert(employee_id, display_name, access_start, access_end, is_active)
            .await
    }

    pub async fn add_embedding(
        &self,
        employee_id: &str,
        vector: &[f32],
        photo_hash: Option<&str>,
    ) -> Result<i64, StoreError> {
        if self.employees.get(employee_id).await?.is_none() {
            return Err(StoreError::EmployeeNotFound(employee_id.to_string()));
        }
        self.embeddings.add(employee_id, vector, photo_hash).await
    }

    pub async fn delete_embeddings(&self, employee_id: &str) -> Result<u64, StoreError> {
        self.embeddings.delete_for_employee(employee_id).await
    }

    pub async fn update_employee_period(
        &self,
        employee_id: &str,
        access_start: DateTime<Utc>,
        access_end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.employees
            .update_period(employee_id, access_start, access_end)
            .await
    }

    pub async fn deactivate_employee(&self, employee_id: &str) -> Result<bool, StoreError> {
        self.employees.set_active(employee_id, false).await
    }

    pub async fn delete_employee(&self, employee_id: &str) -> Result<bool, StoreError> {
        self.employees.delete(employee_id).await
    }

    pub async fn get_employee(&self, employee_id: &str) -> Result<Option<Employee>, StoreError> {
        self.employees.get(employee_id).await
    }

    pub async fn get_active_employees_with_embeddings(
        &self,
    ) -> Result<Vec<(Employee, Vec<Vec<f32>>)>, StoreError> {
        self.employees.get_active_with_embeddings().await
    }

    pub async fn list_employees(&self) -> Result<Vec<Employee>, StoreError> {
        self.employees.list_all().await
    }

    /// Never fails the caller: errors are logged and swallowed.
    pub async fn log_access_attempt(&self, record: NewAuditRecord) -> Result<(), StoreError> {
        self.audit.log(record).await;
        Ok(())
    }

    pub async fn get_audit_logs(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
        employee_id: Option<&str>,
        limit: u32,
    ) -> Result<Vec<AuditRecord>, StoreError> {
        self.audit.query(start, end, employee_id, limit).await
    }

    pub async fn get_system_status(&self) -> Result<SystemStatus, StoreError> {
        let active_employees = self.employees.active_count().await?;
        let total_employees = self.employees.total_count().await?;
        let total_embeddings = self.embeddings.count().await?;
        let attempts_last_hour = self
            .audit
            .count_since(Utc::now() - chrono::Duration::hours(1))
            .await?;

        Ok(SystemStatus {
            active_employees,
            total_employees,
            total_embeddings,
            attempts_last_hour,
        })
    }
}

impl SystemStatus {
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "active_employees": self.active_employees,
            "total_employees": self.total_employees,
            "total_embeddings": self.total_embeddings,
            "attempts_last_hour": self.attempts_last_hour,
        })
    }
}
