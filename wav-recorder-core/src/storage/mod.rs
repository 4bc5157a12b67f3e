pub mod fs_storage;
pub mod incremental_writer;
pub mod inspect;
pub mod memory;
pub mod metadata;
