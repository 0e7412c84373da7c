//! User directory repository.

use domain::models::user::CreateUserRequest;
use domain::models::{User, UserRole};
use sqlx::PgPool;
use uuid::Uuid;

use crate::entities::UserEntity;
use crate::metrics::QueryTimer;

/// Repository for users.
#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, input: &CreateUserRequest) -> Result<User, sqlx::Error> {
        let timer = QueryTimer::new("create_user");
        let entity = sqlx::query_as::<_, UserEntity>(
            r#"
            INSERT INTO users (id, email, full_name, role, company)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, email, full_name, role, company, is_active, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(input.email.to_lowercase())
        .bind(input.full_name.trim())
        .bind(input.role.as_str())
        .bind(&input.company)
        .fetch_one(&self.pool)
        .await;
        timer.record();

        entity?.try_into()
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let timer = QueryTimer::new("find_user_by_id");
        let entity = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, full_name, role, company, is_active, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await;
        timer.record();

        entity?.map(User::try_from).transpose()
    }

    /// Lists users, optionally by role, ordered by name.
    pub async fn list(
        &self,
        role: Option<UserRole>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<User>, i64), sqlx::Error> {
        let role = role.map(|r| r.as_str());

        let total: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM users WHERE ($1::text IS NULL OR role = $1)"#,
        )
        .bind(role)
        .fetch_one(&self.pool)
        .await?;

        let timer = QueryTimer::new("list_users");
        let entities = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, full_name, role, company, is_active, created_at
            FROM users
            WHERE ($1::text IS NULL OR role = $1)
            ORDER BY full_name, id
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(role)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        let users = entities?
            .into_iter()
            .map(User::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    /// Active users holding one of `roles`.
    pub async fn list_active_with_roles(
        &self,
        roles: &[UserRole],
    ) -> Result<Vec<User>, sqlx::Error> {
        let roles: Vec<&str> = roles.iter().map(UserRole::as_str).collect();
        let timer = QueryTimer::new("list_active_users_with_roles");
        let entities = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, full_name, role, company, is_active, created_at
            FROM users
            WHERE is_active AND role = ANY($1)
            ORDER BY full_name, id
            "#,
        )
        .bind(&roles)
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(User::try_from).collect()
    }

    /// Active admins and personnel.
    pub async fn list_active_staff(&self) -> Result<Vec<User>, sqlx::Error> {
        self.list_active_with_roles(&[UserRole::Admin, UserRole::Personnel])
            .await
    }

    /// Every active user, whatever the role.
    pub async fn list_active(&self) -> Result<Vec<User>, sqlx::Error> {
        let timer = QueryTimer::new("list_active_users");
        let entities = sqlx::query_as::<_, UserEntity>(
            r#"
            SELECT id, email, full_name, role, company, is_active, created_at
            FROM users
            WHERE is_active
            ORDER BY full_name, id
            "#,
        )
        .fetch_all(&self.pool)
        .await;
        timer.record();

        entities?.into_iter().map(User::try_from).collect()
    }
}
