use serde::{Deserialize, Deserializer, Serialize};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;

pub type ProductId = i32;
pub type WarehouseId = i32;
pub type OrderId = i32;
pub type ReceiptId = i32;

/// Body of `POST /api/warehouse`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AddProductToWarehouse {
    #[serde(alias = "idProduct")]
    pub id_product: ProductId,
    #[serde(alias = "idWarehouse")]
    pub id_warehouse: WarehouseId,
    #[serde(alias = "amount")]
    pub amount: i32,
    #[serde(alias = "createdAt", deserialize_with = "lenient_timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub id_product: ProductId,
    pub name: String,
    pub description: String,
    pub price: Decimal,
}

impl Product {
    /// Price of `amount` units, `None` on `Decimal` overflow.
    pub fn line_price(&self, amount: i32) -> Option<Decimal> {
        self.price.checked_mul(Decimal::from(amount))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Order {
    pub id_order: OrderId,
    pub id_product: ProductId,
    pub amount: i32,
    pub created_at: DateTime<Utc>,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Whether this order satisfies a fulfillment request for `product`/`amount`
    /// stamped at `before`. The order must have been created strictly earlier.
    pub fn matches(&self, product: ProductId, amount: i32, before: DateTime<Utc>) -> bool {
        self.id_product == product && self.amount == amount && self.created_at < before
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfilled_at.is_some()
    }
}

/// A `Product_Warehouse` row: proof that an order's goods reached a warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryReceipt {
    pub id_product_warehouse: ReceiptId,
    pub id_warehouse: WarehouseId,
    pub id_product: ProductId,
    pub id_order: OrderId,
    pub amount: i32,
    pub price: Decimal,
    pub created_at: DateTime<Utc>,
}

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

// Accepts RFC 3339 timestamps, offset-less ones and bare dates. Anything
// without an offset is read as UTC; a bare date is midnight.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(&raw, fmt).ok())
    {
        return Ok(naive.and_utc());
    }
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
        .map_err(|_| serde::de::Error::custom(format!("invalid timestamp: {}", raw)))
}
