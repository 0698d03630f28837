//! Cache backends

pub mod memory;

pub use memory::MemoryCache;
