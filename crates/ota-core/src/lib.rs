pub mod blob;
pub mod config;
pub mod types;

pub use blob::{BlobRef, BlobStore, UrlPrefixBlobStore};
pub use config::OtaConfig;
pub use types::*;
