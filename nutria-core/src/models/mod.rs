pub mod memory;
pub mod message;

pub use memory::UserMemory;
pub use message::StoredMessage;
