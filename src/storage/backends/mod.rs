pub mod filesystem;
pub mod object_store;
pub mod register;

pub use register::select_backend;
