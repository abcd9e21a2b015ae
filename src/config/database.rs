//! Database configuration - `SQLite` connection and table creation using `SeaORM`.
//!
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`, so the schema always matches the Rust
//! models without hand-written SQL.

use crate::entities::{
    Comment, CommentLike, Customer, CustomerRole, Favorite, Order, Product,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::debug;

/// Used when neither `DATABASE_URL` nor the settings file names a database.
pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/nutrisport.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable, if set.
#[must_use]
pub fn database_url_from_env() -> Option<String> {
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to {}", database_url);
    Database::connect(database_url).await.map_err(Into::into)
}

/// Creates every table that does not exist yet.
///
/// Safe to call on every start.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    create_table(db, Customer).await?;
    create_table(db, CustomerRole).await?;
    create_table(db, Product).await?;
    create_table(db, Order).await?;
    create_table(db, Comment).await?;
    create_table(db, CommentLike).await?;
    create_table(db, Favorite).await?;
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DatabaseConnection, entity: E) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        comment::Model as CommentModel, customer::Model as CustomerModel,
        favorite::Model as FavoriteModel, order::Model as OrderModel,
        product::Model as ProductModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<CustomerModel> = Customer::find().limit(1).all(&db).await?;
        let _: Vec<ProductModel> = Product::find().limit(1).all(&db).await?;
        let _: Vec<OrderModel> = Order::find().limit(1).all(&db).await?;
        let _: Vec<CommentModel> = Comment::find().limit(1).all(&db).await?;
        let _: Vec<FavoriteModel> = Favorite::find().limit(1).all(&db).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_twice() -> Result<()> {
        let db = create_connection("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
