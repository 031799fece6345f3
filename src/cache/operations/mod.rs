pub mod memory;
pub mod session;

pub use memory::MemorySessionStore;
pub use session::RedisSessionStore;
