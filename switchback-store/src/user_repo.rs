use crate::database::{db_err, json_err};
use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use switchback_core::identity::{Role, UserProfile};
use switchback_core::{RepoError, UserRepository};
use uuid::Uuid;

pub struct PostgresUserRepository {
    pub pool: PgPool,
}

fn role_from_text(s: &str) -> Result<Role, RepoError> {
    serde_json::from_value(serde_json::Value::String(s.to_string())).map_err(json_err)
}

fn user_from_row(row: &PgRow) -> Result<UserProfile, RepoError> {
    let role: String = row.try_get("role").map_err(db_err)?;
    let vehicle: Option<serde_json::Value> = row.try_get("vehicle").map_err(db_err)?;
    Ok(UserProfile {
        id: row.try_get("id").map_err(db_err)?,
        name: row.try_get("name").map_err(db_err)?,
        phone: row.try_get("phone").map_err(db_err)?,
        role: role_from_text(&role)?,
        vehicle: vehicle
            .map(serde_json::from_value)
            .transpose()
            .map_err(json_err)?,
        photo_url: row.try_get("photo_url").map_err(db_err)?,
    })
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn get(&self, id: Uuid) -> Result<UserProfile, RepoError> {
        let row = sqlx::query("SELECT id, name, phone, role, vehicle, photo_url FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| RepoError::NotFound(format!("user {}", id)))?;
        user_from_row(&row)
    }

    async fn upsert(&self, user: &UserProfile) -> Result<(), RepoError> {
        sqlx::query(
            r#"
            INSERT INTO users (id, name, phone, role, vehicle, photo_url)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, phone = EXCLUDED.phone,
                vehicle = EXCLUDED.vehicle, photo_url = EXCLUDED.photo_url
            "#,
        )
        .bind(user.id)
        .bind(&user.name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(
            user.vehicle
                .as_ref()
                .map(serde_json::to_value)
                .transpose()
                .map_err(json_err)?,
        )
        .bind(&user.photo_url)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn set_photo_url(&self, id: Uuid, url: &str) -> Result<(), RepoError> {
        let result = sqlx::query("UPDATE users SET photo_url = $2 WHERE id = $1")
            .bind(id)
            .bind(url)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
