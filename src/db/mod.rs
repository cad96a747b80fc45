pub mod memory;
pub mod pool;
pub mod queries;
pub mod store;

pub use memory::MemoryRecordStore;
pub use pool::create_pool;
pub use queries::PgRecordStore;
pub use store::RecordStore;
