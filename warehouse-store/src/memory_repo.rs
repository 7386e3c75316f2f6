use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::Mutex;
use tracing::debug;
use warehouse_core::models::{
    AddProductToWarehouse, InventoryReceipt, Order, OrderId, Product, ProductId, ReceiptId,
    WarehouseId,
};
use warehouse_core::{CoreError, CoreResult, WarehouseRepository};

#[derive(Default)]
struct Tables {
    products: HashMap<ProductId, Product>,
    warehouses: HashSet<WarehouseId>,
    orders: BTreeMap<OrderId, Order>,
    receipts: BTreeMap<ReceiptId, InventoryReceipt>,
    next_receipt_id: ReceiptId,
}

impl Tables {
    fn matching_order(&self, product_id: ProductId, amount: i32, before: DateTime<Utc>) -> Option<OrderId> {
        self.orders
            .values()
            .filter(|o| o.matches(product_id, amount, before))
            .min_by_key(|o| (o.is_fulfilled(), o.created_at, o.id_order))
            .map(|o| o.id_order)
    }

    fn has_receipt(&self, order_id: OrderId) -> bool {
        self.receipts.values().any(|r| r.id_order == order_id)
    }

    // Mirrors the PostgreSQL transaction; the caller holds the lock throughout.
    fn fulfill(&mut self, request: &AddProductToWarehouse) -> CoreResult<ReceiptId> {
        let id_order = self
            .matching_order(request.id_product, request.amount, request.created_at)
            .ok_or(CoreError::NoMatchingOrder)?;

        let product = self
            .products
            .get(&request.id_product)
            .ok_or(CoreError::ProductNotFound(request.id_product))?;

        let price = product.line_price(request.amount).ok_or_else(|| {
            CoreError::ValidationError(format!(
                "line price overflows for product {} x {}",
                product.id_product, request.amount
            ))
        })?;

        let already_stamped = self.orders.get(&id_order).map_or(true, Order::is_fulfilled);
        if already_stamped || self.has_receipt(id_order) {
            return Err(CoreError::OrderAlreadyFulfilled(id_order));
        }

        let now = Utc::now();
        if let Some(order) = self.orders.get_mut(&id_order) {
            order.fulfilled_at = Some(now);
        }

        self.next_receipt_id += 1;
        let id = self.next_receipt_id;
        self.receipts.insert(id, InventoryReceipt {
            id_product_warehouse: id,
            id_warehouse: request.id_warehouse,
            id_product: request.id_product,
            id_order,
            amount: request.amount,
            price,
            created_at: now,
        });

        Ok(id)
    }
}

/// In-memory repository with the same semantics as the PostgreSQL one.
/// Backs the router tests.
#[derive(Default)]
pub struct MemoryWarehouseRepository {
    tables: Mutex<Tables>,
}

impl MemoryWarehouseRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_product(&self, product: Product) {
        self.tables.lock().await.products.insert(product.id_product, product);
    }

    pub async fn insert_warehouse(&self, id: WarehouseId) {
        self.tables.lock().await.warehouses.insert(id);
    }

    pub async fn insert_order(&self, order: Order) {
        self.tables.lock().await.orders.insert(order.id_order, order);
    }

    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.tables.lock().await.orders.get(&id).cloned()
    }

    pub async fn receipts(&self) -> Vec<InventoryReceipt> {
        self.tables.lock().await.receipts.values().cloned().collect()
    }
}

#[async_trait]
impl WarehouseRepository for MemoryWarehouseRepository {
    async fn product_exists(&self, id: ProductId) -> CoreResult<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn warehouse_exists(&self, id: WarehouseId) -> CoreResult<bool> {
        Ok(self.tables.lock().await.warehouses.contains(&id))
    }

    async fn find_matching_order(
        &self,
        product_id: ProductId,
        amount: i32,
        before: DateTime<Utc>,
    ) -> CoreResult<Option<OrderId>> {
        Ok(self.tables.lock().await.matching_order(product_id, amount, before))
    }

    async fn order_is_unfulfilled(&self, order_id: OrderId) -> CoreResult<bool> {
        Ok(!self.tables.lock().await.has_receipt(order_id))
    }

    async fn write_fulfillment(&self, request: &AddProductToWarehouse) -> CoreResult<ReceiptId> {
        let mut tables = self.tables.lock().await;
        let id = tables.fulfill(request)?;
        debug!(receipt_id = id, "In-memory fulfillment written");
        Ok(id)
    }

    async fn write_fulfillment_procedure(
        &self,
        request: &AddProductToWarehouse,
    ) -> CoreResult<Option<ReceiptId>> {
        let mut tables = self.tables.lock().await;
        if request.amount < 1
            || !tables.products.contains_key(&request.id_product)
            || !tables.warehouses.contains(&request.id_warehouse)
        {
            return Ok(None);
        }

        match tables.fulfill(request) {
            Ok(id) => Ok(Some(id)),
            Err(CoreError::NoMatchingOrder) | Err(CoreError::OrderAlreadyFulfilled(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn get_receipt(&self, id: ReceiptId) -> CoreResult<Option<InventoryReceipt>> {
        Ok(self.tables.lock().await.receipts.get(&id).cloned())
    }
}
