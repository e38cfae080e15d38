//! Product catalogue storage. Read access plus creation for seeding.

use sqlx::sqlite::SqlitePool;

#[derive(Clone)]
pub struct ProductStore {
    pool: SqlitePool,
}

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub price: i64,
    /// Reference to the purchasable file. Products without one never get a download link.
    /// Only revealed to buyers through an approved transaction.
    #[serde(skip_serializing)]
    pub file_url: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for inserting a product.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub price: i64,
    pub file_url: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub category: Option<&'a str>,
}

impl ProductStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a product. Returns the product ID.
    pub async fn create(&self, product: &NewProduct<'_>) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO products (name, description, price, file_url, image_url, category)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(product.name)
        .bind(product.description)
        .bind(product.price)
        .bind(product.file_url)
        .bind(product.image_url)
        .bind(product.category)
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Product>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, description, price, file_url, image_url, category, created_at, updated_at
             FROM products WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// List products, newest first, optionally restricted to one category.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<Product>, sqlx::Error> {
        sqlx::query_as(
            "SELECT id, name, description, price, file_url, image_url, category, created_at, updated_at
             FROM products
             WHERE (?1 IS NULL OR category = ?1)
             ORDER BY created_at DESC, id DESC",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn count(&self) -> Result<i64, sqlx::Error> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
