use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgExecutor;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{info, warn};
use warehouse_core::models::{
    AddProductToWarehouse, InventoryReceipt, OrderId, Product, ProductId, ReceiptId, WarehouseId,
};
use warehouse_core::{CoreError, CoreResult, WarehouseRepository};

/// PostgreSQL-backed repository over the `Product`, `Warehouse`, `Order` and
/// `Product_Warehouse` tables.
pub struct StoreWarehouseRepository {
    pool: PgPool,
}

impl StoreWarehouseRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

// Unfulfilled orders first, then earliest, so a stale fulfilled order never starves a newer one.
const MATCH_ORDER_SQL: &str = r#"
    SELECT "IdOrder"
    FROM "Order"
    WHERE "IdProduct" = $1 AND "Amount" = $2 AND "CreatedAt" < $3
    ORDER BY "FulfilledAt" IS NOT NULL, "CreatedAt", "IdOrder"
    LIMIT 1
"#;

#[derive(sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
struct ProductRow {
    id_product: i32,
    name: String,
    description: String,
    price: Decimal,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id_product: row.id_product,
            name: row.name,
            description: row.description,
            price: row.price,
        }
    }
}

#[derive(sqlx::FromRow)]
#[sqlx(rename_all = "PascalCase")]
struct ReceiptRow {
    id_product_warehouse: i32,
    id_warehouse: i32,
    id_product: i32,
    id_order: i32,
    amount: i32,
    price: Decimal,
    created_at: DateTime<Utc>,
}

impl From<ReceiptRow> for InventoryReceipt {
    fn from(row: ReceiptRow) -> Self {
        InventoryReceipt {
            id_product_warehouse: row.id_product_warehouse,
            id_warehouse: row.id_warehouse,
            id_product: row.id_product,
            id_order: row.id_order,
            amount: row.amount,
            price: row.price,
            created_at: row.created_at,
        }
    }
}

async fn fetch_product<'e, E>(executor: E, id: ProductId) -> Result<Option<Product>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    let row = sqlx::query_as::<_, ProductRow>(
        r#"SELECT "IdProduct", "Name", "Description", "Price" FROM "Product" WHERE "IdProduct" = $1"#,
    )
    .bind(id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(Product::from))
}

async fn fetch_matching_order<'e, E>(
    executor: E,
    product_id: ProductId,
    amount: i32,
    before: DateTime<Utc>,
) -> Result<Option<OrderId>, sqlx::Error>
where
    E: PgExecutor<'e>,
{
    sqlx::query_scalar::<_, OrderId>(MATCH_ORDER_SQL)
        .bind(product_id)
        .bind(amount)
        .bind(before)
        .fetch_optional(executor)
        .await
}

/// Steps of the fulfillment write. The caller owns commit and rollback.
async fn fulfill(
    tx: &mut Transaction<'_, Postgres>,
    request: &AddProductToWarehouse,
) -> CoreResult<ReceiptId> {
    let id_order = fetch_matching_order(&mut **tx, request.id_product, request.amount, request.created_at)
        .await
        .map_err(CoreError::store)?
        .ok_or(CoreError::NoMatchingOrder)?;

    let now = Utc::now();

    // Conditional stamp: a concurrent writer that got here first leaves zero rows to update.
    let stamped = sqlx::query(
        r#"UPDATE "Order" SET "FulfilledAt" = $1 WHERE "IdOrder" = $2 AND "FulfilledAt" IS NULL"#,
    )
    .bind(now)
    .bind(id_order)
    .execute(&mut **tx)
    .await
    .map_err(CoreError::store)?;

    if stamped.rows_affected() == 0 {
        return Err(CoreError::OrderAlreadyFulfilled(id_order));
    }

    let product = fetch_product(&mut **tx, request.id_product)
        .await
        .map_err(CoreError::store)?
        .ok_or(CoreError::ProductNotFound(request.id_product))?;

    let price = product.line_price(request.amount).ok_or_else(|| {
        CoreError::ValidationError(format!(
            "line price overflows for product {} x {}",
            product.id_product, request.amount
        ))
    })?;

    let id = sqlx::query_scalar::<_, ReceiptId>(
        r#"
        INSERT INTO "Product_Warehouse" ("IdWarehouse", "IdProduct", "IdOrder", "Amount", "Price", "CreatedAt")
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING "IdProductWarehouse"
        "#,
    )
    .bind(request.id_warehouse)
    .bind(product.id_product)
    .bind(id_order)
    .bind(request.amount)
    .bind(price)
    .bind(now)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            CoreError::OrderAlreadyFulfilled(id_order)
        }
        other => CoreError::store(other),
    })?;

    Ok(id)
}

#[async_trait]
impl WarehouseRepository for StoreWarehouseRepository {
    async fn product_exists(&self, id: ProductId) -> CoreResult<Option<Product>> {
        fetch_product(&self.pool, id).await.map_err(CoreError::store)
    }

    async fn warehouse_exists(&self, id: WarehouseId) -> CoreResult<bool> {
        let found = sqlx::query_scalar::<_, i32>(
            r#"SELECT 1 FROM "Warehouse" WHERE "IdWarehouse" = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::store)?;

        Ok(found.is_some())
    }

    async fn find_matching_order(
        &self,
        product_id: ProductId,
        amount: i32,
        before: DateTime<Utc>,
    ) -> CoreResult<Option<OrderId>> {
        fetch_matching_order(&self.pool, product_id, amount, before)
            .await
            .map_err(CoreError::store)
    }

    async fn order_is_unfulfilled(&self, order_id: OrderId) -> CoreResult<bool> {
        let receipt = sqlx::query_scalar::<_, i32>(
            r#"SELECT 1 FROM "Product_Warehouse" WHERE "IdOrder" = $1 LIMIT 1"#,
        )
        .bind(order_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::store)?;

        Ok(receipt.is_none())
    }

    async fn write_fulfillment(&self, request: &AddProductToWarehouse) -> CoreResult<ReceiptId> {
        let mut tx = self.pool.begin().await.map_err(CoreError::store)?;

        match fulfill(&mut tx, request).await {
            Ok(id) => {
                tx.commit().await.map_err(CoreError::store)?;
                info!(receipt_id = id, product_id = request.id_product, "Fulfillment committed");
                Ok(id)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }

    async fn write_fulfillment_procedure(
        &self,
        request: &AddProductToWarehouse,
    ) -> CoreResult<Option<ReceiptId>> {
        sqlx::query_scalar::<_, Option<ReceiptId>>("SELECT add_product_to_warehouse($1, $2, $3, $4)")
            .bind(request.id_product)
            .bind(request.id_warehouse)
            .bind(request.amount)
            .bind(request.created_at)
            .fetch_one(&self.pool)
            .await
            .map_err(CoreError::store)
    }

    async fn get_receipt(&self, id: ReceiptId) -> CoreResult<Option<InventoryReceipt>> {
        let row = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT "IdProductWarehouse", "IdWarehouse", "IdProduct", "IdOrder", "Amount", "Price", "CreatedAt"
            FROM "Product_Warehouse"
            WHERE "IdProductWarehouse" = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::store)?;

        Ok(row.map(InventoryReceipt::from))
    }
}
