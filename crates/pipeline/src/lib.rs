//! Generation task orchestration.
//!
//! Ties pricing, billing, provider adapters and the task ledger together:
//! submit, poll-or-webhook reconciliation, and the asset archive outbox.
//! Persistence sits behind the [`store`] traits so the same flows run
//! against Postgres in production and [`memory`] in tests.

pub mod archive;
pub mod billing;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod reconcile;
pub mod service;
pub mod store;
pub mod view;

pub use archive::AssetArchiver;
pub use billing::BillingGateway;
pub use error::{GenerationError, StoreError};
pub use reconcile::{ReconcileOutcome, Reconciler};
pub use service::GenerationService;
pub use view::TaskView;
