// src/store/mod.rs — Persistent records: users, projects, tasks, time intervals

pub mod schema;
pub mod server;
pub mod sqlite;
pub mod types;

pub use server::{spawn_store_server, StoreHandle};
pub use sqlite::Store;
