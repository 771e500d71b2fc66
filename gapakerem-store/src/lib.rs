pub mod app_config;
pub mod database;
pub mod memory;
pub mod object_store;
pub mod postgres;

pub use database::DbClient;
pub use memory::MemoryStore;
pub use object_store::CloudinaryStore;
pub use postgres::PgReferenceStore;
