//! Task store: arena, single-writer actor, and transition messages

mod manager;
mod messages;
mod tree;

pub use manager::StoreHandle;
pub use messages::{StoreCommand, StoreError, StoreResponse, TreeEvent};
pub use tree::{TaskStore, TaskUpdate};
