//! Licence request entity (database row mapping).

use chrono::{DateTime, Utc};
use domain::models::LicenseRequest;
use sqlx::FromRow;
use uuid::Uuid;

use super::decode_text;

/// Database row mapping for the license_requests table.
#[derive(Debug, Clone, FromRow)]
pub struct LicenseRequestEntity {
    pub id: Uuid,
    pub file_number: String,
    pub requester_id: Uuid,
    pub company: String,
    pub contact_email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub title_type: String,
    pub description: String,
    pub justification: Option<String>,
    pub status: String,
    pub admin_comments: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub document_urls: Vec<String>,
    pub submission_date: DateTime<Utc>,
    pub processing_date: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LicenseRequestEntity> for LicenseRequest {
    type Error = sqlx::Error;

    fn try_from(entity: LicenseRequestEntity) -> Result<Self, Self::Error> {
        Ok(Self {
            id: entity.id,
            file_number: entity.file_number,
            requester_id: entity.requester_id,
            company: entity.company,
            contact_email: entity.contact_email,
            phone: entity.phone,
            address: entity.address,
            title_type: decode_text("title_type", &entity.title_type)?,
            description: entity.description,
            justification: entity.justification,
            status: decode_text("status", &entity.status)?,
            admin_comments: entity.admin_comments,
            assignee_id: entity.assignee_id,
            document_urls: entity.document_urls,
            submission_date: entity.submission_date,
            processing_date: entity.processing_date,
            updated_at: entity.updated_at,
        })
    }
}
