//! User type and user persistence.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::LOAD_MAX_ROWS;
use crate::records::{UserRecord, UserTypeRecord};

pub async fn upsert_user_type(conn: &mut PgConnection, r: &UserTypeRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO user_types (id, name, description, created_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, description = EXCLUDED.description",
    )
    .bind(r.id)
    .bind(&r.name)
    .bind(&r.description)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn upsert_user(conn: &mut PgConnection, r: &UserRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO users (id, username, email, first_name, last_name, phone,
         user_type_id, is_admin, is_active, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         ON CONFLICT (id) DO UPDATE SET
           username = EXCLUDED.username, email = EXCLUDED.email,
           first_name = EXCLUDED.first_name, last_name = EXCLUDED.last_name,
           phone = EXCLUDED.phone, user_type_id = EXCLUDED.user_type_id,
           is_admin = EXCLUDED.is_admin, is_active = EXCLUDED.is_active",
    )
    .bind(r.id)
    .bind(&r.username)
    .bind(&r.email)
    .bind(&r.first_name)
    .bind(&r.last_name)
    .bind(&r.phone)
    .bind(r.user_type_id)
    .bind(r.is_admin)
    .bind(r.is_active)
    .bind(r.created_at)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn load_user_types(pool: &PgPool) -> Result<Vec<UserTypeRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserTypeRow>(
        "SELECT id, name, description, created_at FROM user_types ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|r| UserTypeRecord {
            id: r.id,
            name: r.name,
            description: r.description,
            created_at: r.created_at,
        })
        .collect())
}

pub async fn load_users(pool: &PgPool) -> Result<Vec<UserRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, UserRow>(
        "SELECT id, username, email, first_name, last_name, phone, user_type_id,
         is_admin, is_active, created_at
         FROM users ORDER BY created_at LIMIT $1",
    )
    .bind(LOAD_MAX_ROWS)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(UserRow::into_record).collect())
}

#[derive(sqlx::FromRow)]
struct UserTypeRow {
    id: Uuid,
    name: String,
    description: String,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    username: String,
    email: String,
    first_name: Option<String>,
    last_name: Option<String>,
    phone: Option<String>,
    user_type_id: Option<Uuid>,
    is_admin: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl UserRow {
    fn into_record(self) -> UserRecord {
        UserRecord {
            id: self.id,
            username: self.username,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            phone: self.phone,
            user_type_id: self.user_type_id,
            is_admin: self.is_admin,
            is_active: self.is_active,
            created_at: self.created_at,
        }
    }
}
