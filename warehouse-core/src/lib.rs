pub mod models;
pub mod repository;

pub use models::{AddProductToWarehouse, InventoryReceipt, Order, Product};
pub use repository::WarehouseRepository;

use models::{OrderId, ProductId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Product with id - {0} does not exist")]
    ProductNotFound(ProductId),
    #[error("There is no corresponding order")]
    NoMatchingOrder,
    #[error("Order with id - {0} is already fulfilled")]
    OrderAlreadyFulfilled(OrderId),
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Store error: {0}")]
    StoreError(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl CoreError {
    pub fn store<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoreError::StoreError(Box::new(err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
