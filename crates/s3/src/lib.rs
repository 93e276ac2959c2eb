//! bsync-s3: S3 backend for bsync
//!
//! Implements the `ObjectStore` trait from bsync-core on top of aws-sdk-s3.

mod client;

pub use client::S3Client;
