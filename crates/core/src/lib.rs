//! s3p-core: Core library for the s3p object store client
//!
//! This crate provides:
//! - `Location`, the validated `scheme://container/path` value type
//! - The `TransferPort` trait that object store backends implement
//! - `Client`, with single-object operations, the local bridge and the
//!   directory sync engine
//! - Configuration and retry helpers shared by backends and the CLI
//!
//! It does not depend on any S3 SDK; `s3p-s3` provides the AWS-backed port
//! and [`memory::MemoryStore`] an in-process one.

pub mod bridge;
pub mod client;
pub mod config;
pub mod error;
pub mod location;
pub mod memory;
pub mod port;
pub mod retry;
pub mod sync;

pub use bridge::{LocalRead, LocalWrite};
pub use client::Client;
pub use config::{
    Config, ConfigManager, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY, RetryConfig, StoreConfig,
    TransferConfig,
};
pub use error::{Error, Result};
pub use location::Location;
pub use port::{ByteStream, LocationStream, ObjectInfo, TransferPort};
pub use retry::{RetryBuilder, is_retryable_error, retry_with_backoff};
pub use sync::{ProgressFn, SyncFailure, SyncOptions, SyncPlan, SyncResult, TransferTask};
