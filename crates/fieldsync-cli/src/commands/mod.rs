pub mod common;
pub mod draft;
pub mod photo;
pub mod status;
pub mod sync;
