use sqlx::PgPool;
use uuid::Uuid;

use crate::dto::employee_dto::{EmployeeListResponse, UpdateEmployeePayload};
use crate::dto::Pagination;
use crate::error::{Error, Result};
use crate::models::employee::{is_valid_position, Employee};

#[derive(Clone)]
pub struct EmployeeService {
    pool: PgPool,
}

impl EmployeeService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>> {
        let employee = sqlx::query_as::<_, Employee>(r#"SELECT * FROM employees WHERE id = $1"#)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(employee)
    }

    pub async fn list_employees(&self, pagination: Pagination) -> Result<EmployeeListResponse> {
        let (page, page_size) = pagination.clamped();
        let items = sqlx::query_as::<_, Employee>(
            r#"SELECT * FROM employees ORDER BY created_at DESC LIMIT $1 OFFSET $2"#,
        )
        .bind(page_size)
        .bind(pagination.offset())
        .fetch_all(&self.pool)
        .await?;
        let total: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM employees"#)
            .fetch_one(&self.pool)
            .await?;
        Ok(EmployeeListResponse { page, page_size, total, items })
    }

    pub async fn update_employee(
        &self,
        id: Uuid,
        payload: UpdateEmployeePayload,
    ) -> Result<Employee> {
        if payload.is_empty() {
            return Err(Error::BadRequest("Empty body".to_string()));
        }

        let before = self
            .get_employee(id)
            .await?
            .ok_or_else(|| Error::NotFound("Employee not found".to_string()))?;

        let department = payload.department.unwrap_or(before.department);
        let position = match &payload.position {
            None => before.position,
            Some(value) => *value,
        };
        if !is_valid_position(Some(department), position) {
            tracing::warn!(
                employee_id = %id,
                department = ?department,
                position = ?position,
                "unusual department/position pairing on employee update"
            );
        }

        let employee = sqlx::query_as::<_, Employee>(
            r#"
            UPDATE employees SET
                full_name = $1, email = $2, phone = $3, department = $4, position = $5,
                notes = $6, hired_at = $7, birthday_at = $8, terminated_at = $9,
                updated_at = NOW()
            WHERE id = $10
            RETURNING *
            "#,
        )
        .bind(payload.full_name.unwrap_or(before.full_name))
        .bind(payload.email.map(|e| e.to_lowercase()).unwrap_or(before.email))
        .bind(payload.phone.unwrap_or(before.phone))
        .bind(department)
        .bind(position)
        .bind(payload.notes.unwrap_or(before.notes))
        .bind(payload.hired_at.unwrap_or(before.hired_at))
        .bind(match payload.birthday_at {
            None => before.birthday_at,
            Some(value) => value,
        })
        .bind(match payload.terminated_at {
            None => before.terminated_at,
            Some(value) => value,
        })
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        Ok(employee)
    }
}
