use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::models::{
    AddProductToWarehouse, InventoryReceipt, OrderId, Product, ProductId, ReceiptId, WarehouseId,
};
use crate::CoreResult;

/// Data access for the order-fulfillment workflow.
///
/// Every method is a single round-trip to the store except
/// [`write_fulfillment`](WarehouseRepository::write_fulfillment), which runs
/// its statements inside one transaction.
#[async_trait]
pub trait WarehouseRepository: Send + Sync {
    async fn product_exists(&self, id: ProductId) -> CoreResult<Option<Product>>;

    async fn warehouse_exists(&self, id: WarehouseId) -> CoreResult<bool>;

    /// First order for `product_id` with exactly `amount` units created
    /// strictly before `before`. Unfulfilled orders rank ahead of fulfilled
    /// ones, then the earliest `CreatedAt`, then the lowest id. A fulfilled
    /// order is still returned when nothing else matches.
    async fn find_matching_order(
        &self,
        product_id: ProductId,
        amount: i32,
        before: DateTime<Utc>,
    ) -> CoreResult<Option<OrderId>>;

    /// True iff no receipt references `order_id`.
    async fn order_is_unfulfilled(&self, order_id: OrderId) -> CoreResult<bool>;

    /// Re-resolves the matching order, stamps its `FulfilledAt` if still
    /// unset, and inserts the receipt priced at the product's current price.
    /// Nothing is persisted unless every step succeeds.
    ///
    /// Fails with [`CoreError::OrderAlreadyFulfilled`](crate::CoreError) when
    /// another writer fulfilled the order first.
    async fn write_fulfillment(&self, request: &AddProductToWarehouse) -> CoreResult<ReceiptId>;

    /// Same workflow executed by the store's `add_product_to_warehouse`
    /// function. `None` when any precondition fails.
    async fn write_fulfillment_procedure(
        &self,
        request: &AddProductToWarehouse,
    ) -> CoreResult<Option<ReceiptId>>;

    async fn get_receipt(&self, id: ReceiptId) -> CoreResult<Option<InventoryReceipt>>;
}
