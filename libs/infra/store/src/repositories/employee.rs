use crate::client::StoreClient;
use crate::errors::StoreError;
use chrono::{DateTime, Utc};
use faceaccess_models::Employee;
use libsql::{params, Connection};
use tracing::instrument;

#[derive(Clone)]
pub struct EmployeeRepository {
    client: StoreClient,
}

impl EmployeeRepository {
    pub fn new(client: StoreClient) -> Self {
        EmployeeRepository { client }
    }

    #[instrument(skip(self))]
    pub async fn upsert(
        &self,
        employee_id: &str,
        display_name: Option<&str>,
        access_start: DateTime<Utc>,
        access_end: DateTime<Utc>,
        is_active: bool,
    ) -> Result<(), StoreError> {
        if access_end <= access_start {
            return Err(StoreError::InvalidWindow {
                start: access_start.to_rfc3339(),
                end: access_end.to_rfc3339(),
            });
        }

        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                let display_name = display_name.map(str::to_string);
                async move {
                    let now = Utc::now().to_rfc3339();
                    conn.execute(
                        "INSERT INTO employees (employee_id, display_name, access_start, access_end, is_active, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
                         ON CONFLICT(employee_id) DO UPDATE SET
                            display_name = excluded.display_name,
                            access_start = excluded.access_start,
                            access_end = excluded.access_end,
                            is_active = excluded.is_active,
                            updated_at = ?6",
                        params![
                            employee_id,
                            display_name,
                            access_start.to_rfc3339(),
                            access_end.to_rfc3339(),
                            is_active as i64,
                            now,
                        ],
                    )
                    .await?;
                    Ok(())
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_period(
        &self,
        employee_id: &str,
        access_start: DateTime<Utc>,
        access_end: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        if access_end <= access_start {
            return Err(StoreError::InvalidWindow {
                start: access_start.to_rfc3339(),
                end: access_end.to_rfc3339(),
            });
        }

        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                async move {
                    let rows = conn
                        .execute(
                            "UPDATE employees SET access_start = ?2, access_end = ?3, updated_at = ?4
                             WHERE employee_id = ?1",
                            params![
                                employee_id,
                                access_start.to_rfc3339(),
                                access_end.to_rfc3339(),
                                Utc::now().to_rfc3339(),
                            ],
                        )
                        .await?;
                    Ok(rows > 0)
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, employee_id: &str, active: bool) -> Result<bool, StoreError> {
        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                async move {
                    let rows = conn
                        .execute(
                            "UPDATE employees SET is_active = ?2, updated_at = ?3 WHERE employee_id = ?1",
                            params![employee_id, active as i64, Utc::now().to_rfc3339()],
                        )
                        .await?;
                    Ok(rows > 0)
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, employee_id: &str) -> Result<bool, StoreError> {
        self.client
            .with_write_lock(move |conn| {
                let employee_id = employee_id.to_string();
                async move {
                    let rows = conn
                        .execute(
                            "DELETE FROM employees WHERE employee_id = ?1",
                            params![employee_id],
                        )
                        .await?;
                    Ok(rows > 0)
                }
            })
            .await
    }

    #[instrument(skip(self))]
    pub async fn get(&self, employee_id: &str) -> Result<Option<Employee>, StoreError> {
        let conn = self.client.connection().await?;
        fetch_one(&conn, employee_id).await
    }

    #[instrument(skip(self))]
    pub async fn get_active_with_embeddings(&self) -> Result<Vec<(Employee, Vec<Vec<f32>>)>, StoreError> {
        let conn = self.client.connection().await?;
        let mut rows = conn
            .query(
                "SELECT employee_id, display_name, access_start, access_end, is_active, created_at, updated_at
                 FROM employees WHERE is_active = 1",
                (),
            )
            .await?;

        let mut employees = Vec::new();
        while let Some(row) = rows.next().await? {
            employees.push(row_to_employee(&row)?);
        }

        let mut out = Vec::new();
        for employee in employees {
            let vectors = super::embedding::vectors_for(&conn, &employee.employee_id).await?;
            if !vectors.is_empty() {
                out.push((employee, vectors));
            }
        }
        Ok(out)
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Employee>, StoreError> {
        let conn = self.client.connection().await?;
        let mut rows = conn
            .query(
                "SELECT employee_id, display_name, access_start, access_end, is_active, created_at, updated_at
                 FROM employees ORDER BY employee_id",
                (),
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_employee(&row)?);
        }
        Ok(out)
    }

    pub async fn active_count(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection().await?;
        count(&conn, "SELECT COUNT(*) FROM employees WHERE is_active = 1").await
    }

    pub async fn total_count(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection().await?;
        count(&conn, "SELECT COUNT(*) FROM employees").await
    }
}

async fn count(conn: &Connection, sql: &str) -> Result<u64, StoreError> {
    let mut rows = conn.query(sql, ()).await?;
    match rows.next().await? {
        Some(row) => Ok(row.get::<i64>(0)? as u64),
        None => Ok(0),
    }
}

async fn fetch_one(conn: &Connection, employee_id: &str) -> Result<Option<Employee>, StoreError> {
    let mut rows = conn
        .query(
            "SELECT employee_id, display_name, access_start, access_end, is_active, created_at, updated_at
             FROM employees WHERE employee_id = ?1",
            params![employee_id.to_string()],
        )
        .await?;
    match rows.next().await? {
        Some(row) => Ok(Some(row_to_employee(&row)?)),
        None => Ok(None),
    }
}

fn row_to_employee(row: &libsql::Row) -> Result<Employee, StoreError> {
    let parse_dt = |s: String| -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| StoreError::Mapping(e.to_string()))
    };

    Ok(Employee {
        employee_id: row.get::<String>(0)?,
        display_name: row.get::<Option<String>>(1)?,
        access_start: parse_dt(row.get::<String>(2)?)?,
        access_end: parse_dt(row.get::<String>(3)?)?,
        is_active: row.get::<i64>(4)? != 0,
        created_at: parse_dt(row.get::<String>(5)?)?,
        updated_at: parse_dt(row.get::<String>(6)?)?,
    })
}
