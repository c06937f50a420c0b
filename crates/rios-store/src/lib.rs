//! rios-store: Job input and output transfer
//!
//! This crate moves job payloads between remote storage and the job's
//! working directory:
//! - `ObjectStore` trait handed to the job executor
//! - HTTP(S) transfer (GET for inputs, PUT for outputs)
//! - `file://` transfer for shared filesystems
//! - Scheme-based routing between the two

pub mod http;
pub mod local;
pub mod router;
pub mod traits;

pub use http::HttpStore;
pub use local::{list_files, LocalStore};
pub use router::{RoutingStore, Scheme};
pub use traits::{join_reference, ObjectStore};
