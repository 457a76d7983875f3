mod storage_dir;
mod storage_interface;
mod storage_memory;

pub use storage_dir::{create_disk_image, DirBlockStore};
pub use storage_interface::*;
pub use storage_memory::{MemoryBlockStore, StoreStats};
