use sea_orm_migration::prelude::*;

pub struct Migrator;

impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(CreateBooks)]
    }
}

pub struct CreateBooks;

impl MigrationName for CreateBooks {
    fn name(&self) -> &str {
        "m0001_create_books"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for CreateBooks {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Books::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Books::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Books::Name).string().not_null())
                    .col(ColumnDef::new(Books::Description).text().not_null())
                    .col(ColumnDef::new(Books::Image).string().not_null())
                    .col(ColumnDef::new(Books::Owner).string().not_null())
                    .col(ColumnDef::new(Books::CreatedAt).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        // Owner listings are the hot query.
        manager
            .create_index(
                Index::create()
                    .name("idx_books_owner_created_at")
                    .table(Books::Table)
                    .col(Books::Owner)
                    .col(Books::CreatedAt)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager.drop_table(Table::drop().table(Books::Table).to_owned()).await
    }
}

#[derive(Iden)]
pub enum Books {
    Table,
    Id,
    Name,
    Description,
    Image,
    Owner,
    CreatedAt,
}
