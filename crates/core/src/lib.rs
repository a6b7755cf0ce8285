pub mod channels;
pub mod error;
pub mod model_config;
pub mod naming;
pub mod pricing;
pub mod storage;
pub mod types;
pub mod webhook_auth;
