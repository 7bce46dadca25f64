//! Repository implementations backed by process memory

mod memory;

pub use memory::InMemoryStorage;
