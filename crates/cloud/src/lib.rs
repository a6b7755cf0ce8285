//! Owned object storage for archived generation outputs.

pub mod s3;

pub use s3::{S3Config, S3ObjectStorage};
