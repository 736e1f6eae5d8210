//! s3p-s3: aws-sdk-s3 transfer port for s3p
//!
//! This crate implements the `TransferPort` trait from s3p-core on top of
//! aws-sdk-s3. It is the only crate that depends on the AWS SDK.

pub mod client;
mod parts;

pub use client::S3Client;
