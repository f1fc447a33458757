pub mod project;
pub mod setting;
pub mod task;

/// Identity assigned by the record store
pub type RecordId = i64;
