//! Title entity (database row mapping).

use chrono::{DateTime, NaiveDate, Utc};
use domain::models::Title;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the titles table.
#[derive(Debug, Clone, FromRow)]
pub struct TitleEntity {
    pub id: Uuid,
    pub number: String,
    pub title_type: String,
    pub owner_id: Uuid,
    pub description: Option<String>,
    pub issue_date: NaiveDate,
    pub expiration_date: NaiveDate,
    pub duration_years: i32,
    pub status: String,
    pub annual_fee: i64,
    pub conditions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<TitleEntity> for Title {
    type Error = sqlx::Error;

    fn try_from(entity: TitleEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            number: entity.number,
            title_type: decode_text("title_type", &entity.title_type)?,
            owner_id: entity.owner_id,
            description: entity.description,
            issue_date: entity.issue_date,
            expiration_date: entity.expiration_date,
            duration_years: entity.duration_years,
            status: decode_text("status", &entity.status)?,
            annual_fee: entity.annual_fee,
            conditions: entity.conditions,
            created_at: entity.created_at,
            updated_at: entity.updated_at,
        })
    }
}
