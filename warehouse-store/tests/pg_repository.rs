//! Runs against a live PostgreSQL. Set `DATABASE_URL` and use
//! `cargo test -p warehouse-store -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use warehouse_core::models::AddProductToWarehouse;
use warehouse_core::{CoreError, WarehouseRepository};
use warehouse_store::app_config::DatabaseConfig;
use warehouse_store::{DbClient, StoreWarehouseRepository};

struct Seeded {
    db: DbClient,
    product: i32,
    warehouse: i32,
    order: i32,
}

async fn seed() -> Seeded {
    let config = DatabaseConfig {
        url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
        max_connections: 10,
        acquire_timeout_seconds: 5,
        run_migrations: true,
    };
    let db = DbClient::new(&config).await.expect("Failed to connect");
    db.migrate().await.expect("Failed to migrate");

    let product: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Product" ("Name", "Description", "Price") VALUES ('Widget', 'Blue widget', 9.99) RETURNING "IdProduct""#,
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();

    let warehouse: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Warehouse" ("Name", "Address") VALUES ('Main', 'Dock 1') RETURNING "IdWarehouse""#,
    )
    .fetch_one(&db.pool)
    .await
    .unwrap();

    let order: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Order" ("IdProduct", "Amount", "CreatedAt") VALUES ($1, 3, $2) RETURNING "IdOrder""#,
    )
    .bind(product)
    .bind(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
    .fetch_one(&db.pool)
    .await
    .unwrap();

    Seeded { db, product, warehouse, order }
}

fn request(seeded: &Seeded) -> AddProductToWarehouse {
    AddProductToWarehouse {
        id_product: seeded.product,
        id_warehouse: seeded.warehouse,
        amount: 3,
        created_at: Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::hours(1),
    }
}

#[tokio::test]
#[ignore]
async fn test_fulfillment_round_trip() {
    let seeded = seed().await;
    let repo = StoreWarehouseRepository::new(seeded.db.pool.clone());
    let req = request(&seeded);

    assert!(repo.product_exists(seeded.product).await.unwrap().is_some());
    assert!(repo.warehouse_exists(seeded.warehouse).await.unwrap());
    assert_eq!(
        repo.find_matching_order(req.id_product, req.amount, req.created_at).await.unwrap(),
        Some(seeded.order)
    );
    assert!(repo.order_is_unfulfilled(seeded.order).await.unwrap());

    let id = repo.write_fulfillment(&req).await.unwrap();
    let receipt = repo.get_receipt(id).await.unwrap().expect("receipt written");
    assert_eq!(receipt.id_order, seeded.order);
    assert_eq!(receipt.price, dec!(29.97));
    assert!(!repo.order_is_unfulfilled(seeded.order).await.unwrap());

    let err = repo.write_fulfillment(&req).await.unwrap_err();
    assert!(matches!(err, CoreError::OrderAlreadyFulfilled(o) if o == seeded.order));
}

#[tokio::test]
#[ignore]
async fn test_concurrent_fulfillment_writes_one_receipt() {
    let seeded = seed().await;
    let repo = Arc::new(StoreWarehouseRepository::new(seeded.db.pool.clone()));
    let req = request(&seeded);

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let repo = repo.clone();
            let req = req.clone();
            tokio::spawn(async move { repo.write_fulfillment(&req).await })
        })
        .collect();

    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => created += 1,
            Err(CoreError::OrderAlreadyFulfilled(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(created, 1);

    let receipts: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "Product_Warehouse" WHERE "IdOrder" = $1"#)
        .bind(seeded.order)
        .fetch_one(&seeded.db.pool)
        .await
        .unwrap();
    assert_eq!(receipts, 1);
}

#[tokio::test]
#[ignore]
async fn test_procedure_matches_handler_semantics() {
    let seeded = seed().await;
    let repo = StoreWarehouseRepository::new(seeded.db.pool.clone());
    let mut req = request(&seeded);

    req.id_warehouse = -1;
    assert_eq!(repo.write_fulfillment_procedure(&req).await.unwrap(), None);

    req.id_warehouse = seeded.warehouse;
    let id = repo.write_fulfillment_procedure(&req).await.unwrap().expect("receipt id");
    let receipt = repo.get_receipt(id).await.unwrap().unwrap();
    assert_eq!(receipt.price, dec!(29.97));

    assert_eq!(repo.write_fulfillment_procedure(&req).await.unwrap(), None);
}

async fn order_state(db: &DbClient, order: i32) -> (Option<chrono::DateTime<Utc>>, i64) {
    let fulfilled_at: Option<chrono::DateTime<Utc>> =
        sqlx::query_scalar(r#"SELECT "FulfilledAt" FROM "Order" WHERE "IdOrder" = $1"#)
            .bind(order)
            .fetch_one(&db.pool)
            .await
            .unwrap();
    let receipts: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM "Product_Warehouse" WHERE "IdOrder" = $1"#)
        .bind(order)
        .fetch_one(&db.pool)
        .await
        .unwrap();
    (fulfilled_at, receipts)
}

#[tokio::test]
#[ignore]
async fn test_price_overflow_after_stamp_rolls_back() {
    let seeded = seed().await;
    let amount = 1_000_000;

    let product: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Product" ("Name", "Description", "Price") VALUES ('Ingot', 'Priced at the column limit', 99999999999999999999999.99) RETURNING "IdProduct""#,
    )
    .fetch_one(&seeded.db.pool)
    .await
    .unwrap();

    let order: i32 = sqlx::query_scalar(
        r#"INSERT INTO "Order" ("IdProduct", "Amount", "CreatedAt") VALUES ($1, $2, $3) RETURNING "IdOrder""#,
    )
    .bind(product)
    .bind(amount)
    .bind(Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap())
    .fetch_one(&seeded.db.pool)
    .await
    .unwrap();

    let repo = StoreWarehouseRepository::new(seeded.db.pool.clone());
    let req = AddProductToWarehouse {
        id_product: product,
        id_warehouse: seeded.warehouse,
        amount,
        created_at: Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap(),
    };

    let err = repo.write_fulfillment(&req).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)), "unexpected error: {err}");

    let (fulfilled_at, receipts) = order_state(&seeded.db, order).await;
    assert_eq!(fulfilled_at, None);
    assert_eq!(receipts, 0);
    assert!(repo.order_is_unfulfilled(order).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn test_insert_failure_after_stamp_rolls_back() {
    let seeded = seed().await;
    let repo = StoreWarehouseRepository::new(seeded.db.pool.clone());
    let req = request(&seeded);

    assert!(repo.warehouse_exists(seeded.warehouse).await.unwrap());

    // Warehouse disappears between the checks and the write; the receipt insert hits the foreign key
    sqlx::query(r#"DELETE FROM "Warehouse" WHERE "IdWarehouse" = $1"#)
        .bind(seeded.warehouse)
        .execute(&seeded.db.pool)
        .await
        .unwrap();

    let err = repo.write_fulfillment(&req).await.unwrap_err();
    assert!(matches!(err, CoreError::StoreError(_)), "unexpected error: {err}");

    let (fulfilled_at, receipts) = order_state(&seeded.db, seeded.order).await;
    assert_eq!(fulfilled_at, None);
    assert_eq!(receipts, 0);
}
