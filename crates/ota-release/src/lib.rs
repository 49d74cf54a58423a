//! ota-release: release descriptors and deployment lifecycle.
//!
//! This crate turns stored release records into the payload clients receive
//! and owns every mutation of a deployment's release history.
//!
//! # Components
//!
//! - **`descriptor`**: Builds client-facing package descriptors, including the diff map
//! - **`lifecycle`**: Create, rename, delete, list, history and atomic history purge
//! - **`token`**: Injectable random token source and deployment key parsing
//! - **`users`**: User registration with a per-user key suffix

pub mod descriptor;
pub mod error;
pub mod lifecycle;
pub mod token;
pub mod users;

pub use descriptor::{DiffPackage, PackageDescriptor, ReleaseAssembler};
pub use error::{ReleaseError, ReleaseResult};
pub use lifecycle::{DeploymentManager, DeploymentSummary};
pub use token::{ParsedKey, RandomTokenGenerator, SequenceTokenGenerator, TokenGenerator, parse_token};
pub use users::register_user;
