use async_trait::async_trait;
use fieldx::fxstruct;
use sea_orm::ActiveModelTrait;
use sea_orm::ColumnTrait;
use sea_orm::ConnectionTrait;
use sea_orm::Database;
use sea_orm::DatabaseConnection;
use sea_orm::DbErr;
use sea_orm::EntityTrait;
use sea_orm::IntoActiveModel;
use sea_orm::QueryFilter;
use sea_orm::QueryOrder;
use sea_orm::Set;
use sea_orm_migration::MigratorTrait;
use tracing::debug;
use tracing::info;
use tracing::instrument;

use super::entity;
use super::migrations::Migrator;
use crate::book::Book;
use crate::book::BookChanges;
use crate::book::BookFilter;
use crate::book::BookId;
use crate::book::NewBook;
use crate::book::UserId;
use crate::error::StoreError;
use crate::traits::BookStore;

/// Book store over any database SeaORM can talk to.
#[derive(Debug)]
#[fxstruct(sync, no_new)]
pub struct SeaOrmStore {
    connection: DatabaseConnection,
}

impl SeaOrmStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let connection = Database::connect(url).await?;
        let store = Self::from_connection(connection);
        if store.connection.get_database_backend() == sea_orm::DatabaseBackend::Sqlite {
            store.connection.execute_unprepared("PRAGMA journal_mode=WAL;").await?;
        }
        Ok(store)
    }

    pub fn from_connection(connection: DatabaseConnection) -> Self {
        Self { connection }
    }

    /// Bring the schema up to date.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        info!("Applying book store migrations");
        Migrator::up(&self.connection, None).await?;
        Ok(())
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.connection
    }
}

#[async_trait]
impl BookStore for SeaOrmStore {
    #[instrument(level = "trace", skip(self))]
    async fn find(&self, filter: &BookFilter) -> Result<Vec<Book>, StoreError> {
        let mut query = entity::Entity::find();
        if let BookFilter::Owner(owner) = filter {
            query = query.filter(entity::Column::Owner.eq(owner.as_ref()));
        }
        let models = query
            .order_by_desc(entity::Column::CreatedAt)
            .order_by_asc(entity::Column::Id)
            .all(&self.connection)
            .await?;
        Ok(models.into_iter().map(Book::from).collect())
    }

    #[instrument(level = "trace", skip(self))]
    async fn find_by_id(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        Ok(entity::Entity::find_by_id(id.0.clone())
            .one(&self.connection)
            .await?
            .map(Book::from))
    }

    #[instrument(level = "trace", skip(self, fields))]
    async fn create(&self, owner: &UserId, fields: NewBook) -> Result<Book, StoreError> {
        let model = entity::ActiveModel::for_new(owner, fields)
            .insert(&self.connection)
            .await?;
        debug!("Created book {} for {owner}", model.id);
        Ok(model.into())
    }

    #[instrument(level = "trace", skip(self, changes))]
    async fn find_by_id_and_update(&self, id: &BookId, changes: BookChanges) -> Result<Option<Book>, StoreError> {
        let Some(model) = entity::Entity::find_by_id(id.0.clone()).one(&self.connection).await?
        else {
            return Ok(None);
        };

        if changes.is_empty() {
            return Ok(Some(model.into()));
        }

        let mut am = model.into_active_model();
        if let Some(name) = changes.name {
            am.name = Set(name);
        }
        if let Some(description) = changes.description {
            am.description = Set(description);
        }
        if let Some(image) = changes.image {
            am.image = Set(image);
        }

        match am.update(&self.connection).await {
            Ok(model) => Ok(Some(model.into())),
            // Deleted between the lookup and the update.
            Err(DbErr::RecordNotUpdated) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn find_by_id_and_delete(&self, id: &BookId) -> Result<Option<Book>, StoreError> {
        let Some(model) = entity::Entity::find_by_id(id.0.clone()).one(&self.connection).await?
        else {
            return Ok(None);
        };

        let result = entity::Entity::delete_by_id(id.0.clone()).exec(&self.connection).await?;
        Ok((result.rows_affected > 0).then(|| model.into()))
    }
}
