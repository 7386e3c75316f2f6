use std::sync::Arc;
use warehouse_core::WarehouseRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn WarehouseRepository>,
}

impl AppState {
    pub fn new(repo: Arc<dyn WarehouseRepository>) -> Self {
        Self { repo }
    }
}
