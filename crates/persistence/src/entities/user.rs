//! User entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::User;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the users table.
#[derive(Debug, Clone, FromRow)]
pub struct UserEntity {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub role: String,
    pub company: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<UserEntity> for User {
    type Error = sqlx::Error;

    fn try_from(entity: UserEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            email: entity.email,
            full_name: entity.full_name,
            role: decode_text("role", &entity.role)?,
            company: entity.company,
            is_active: entity.is_active,
            created_at: entity.created_at,
        })
    }
}
