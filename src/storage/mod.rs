pub mod backends;
pub mod template;

pub use template::{PictureReader, StorageBackend};
