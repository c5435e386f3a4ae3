//! Async services shared by the engine and its clients.

mod local_store;

pub use local_store::LocalStore;
