pub mod app_config;
pub mod database;
pub mod memory_repo;
pub mod warehouse_repo;

pub use database::DbClient;
pub use memory_repo::MemoryWarehouseRepository;
pub use warehouse_repo::StoreWarehouseRepository;
