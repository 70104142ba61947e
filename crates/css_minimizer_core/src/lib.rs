pub mod cache;
pub mod diagnostic;
pub mod hash;
pub mod source_map;
pub mod types;
pub mod version;
