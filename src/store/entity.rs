use sea_orm::entity::prelude::*;
use sea_orm::Set;

use crate::book::Book;
use crate::book::NewBook;
use crate::book::UserId;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "books")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:          String,
    pub name:        String,
    pub description: String,
    pub image:       String,
    pub owner:       String,
    pub created_at:  DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl From<Model> for Book {
    fn from(model: Model) -> Self {
        Book {
            id:          model.id.into(),
            name:        model.name,
            description: model.description,
            image:       model.image,
            owner:       model.owner.into(),
            created_at:  model.created_at,
        }
    }
}

impl ActiveModel {
    pub fn for_new(owner: &UserId, fields: NewBook) -> Self {
        Self {
            id:          Set(crate::book::BookId::generate().0),
            name:        Set(fields.name),
            description: Set(fields.description),
            image:       Set(fields.image),
            owner:       Set(owner.0.clone()),
            created_at:  Set(chrono::Utc::now()),
        }
    }
}
