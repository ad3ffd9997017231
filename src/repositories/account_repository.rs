use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set, SqlErr,
};
use uuid::Uuid;

use crate::entities::user_entity as users;
use crate::error::AppResult;
use crate::models::{Identity, UserRole};

#[derive(Debug, Clone)]
pub enum CreateOutcome {
    Created(Identity),
    /// The unique-phone constraint rejected the row: someone else created it first.
    Conflict,
}

/// Durable identities keyed by canonical phone. Soft-deleted rows are invisible here.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn exists_by_phone(&self, phone: &str) -> AppResult<bool>;

    /// Insert a passenger identity. The storage constraint decides conflicts, not a
    /// prior existence check.
    async fn create(&self, name: &str, phone: &str) -> AppResult<CreateOutcome>;

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<Identity>>;
}

#[derive(Clone)]
pub struct SeaOrmAccountRepository {
    pool: DatabaseConnection,
}

impl SeaOrmAccountRepository {
    pub fn new(pool: DatabaseConnection) -> Self {
        Self { pool }
    }

    fn live_by_phone(phone: &str) -> sea_orm::Select<users::Entity> {
        users::Entity::find()
            .filter(users::Column::PhoneNumber.eq(phone))
            .filter(users::Column::DeletedAt.is_null())
    }
}

#[async_trait]
impl AccountRepository for SeaOrmAccountRepository {
    async fn exists_by_phone(&self, phone: &str) -> AppResult<bool> {
        let count = Self::live_by_phone(phone).count(&self.pool).await?;
        Ok(count > 0)
    }

    async fn create(&self, name: &str, phone: &str) -> AppResult<CreateOutcome> {
        let now = Utc::now();
        let inserted = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            phone_number: Set(phone.to_string()),
            role: Set(UserRole::Passenger),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        }
        .insert(&self.pool)
        .await;

        match inserted {
            Ok(model) => Ok(CreateOutcome::Created(model.into())),
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                log::warn!("Lost account creation race for {phone}");
                Ok(CreateOutcome::Conflict)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_by_phone(&self, phone: &str) -> AppResult<Option<Identity>> {
        let model = Self::live_by_phone(phone).one(&self.pool).await?;
        Ok(model.map(Identity::from))
    }
}
