//! openstack-seeder cloud abstraction
//!
//! This crate defines the uniform capability interface the reconciliation
//! engine uses to talk to OpenStack, the closed error taxonomy, and the
//! per-run report.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 seeder-engine                    │
//! │      reconcilers / scheduler / resolver          │
//! └─────────────────┬───────────────────────────────┘
//!                   │ Arc<dyn CloudApi>
//! ┌─────────────────▼───────────────────────────────┐
//! │                 seeder-cloud                     │
//! │  ┌──────────────────────────────────────────┐   │
//! │  │  Guarded<C>: retry / deadline / caps     │   │
//! │  └──────────────────────────────────────────┘   │
//! │  ┌──────────────┐  ┌──────────────┐            │
//! │  │ trait CloudApi│  │    Report    │            │
//! │  └──────────────┘  └──────────────┘            │
//! └───────┬─────────────────────────────────────────┘
//!         │
//! ┌───────▼────────────┐  ┌───────────────────────┐
//! │ seeder-openstack   │  │ in-memory test doubles │
//! │  (reqwest client)  │  │                        │
//! └────────────────────┘  └───────────────────────┘
//! ```

pub mod error;
pub mod guard;
pub mod kind;
pub mod provider;
pub mod report;

// Re-exports
pub use error::{CloudError, ErrorKind, Result};
pub use guard::Guarded;
pub use kind::{ResourceKind, ServiceType};
pub use provider::{AuthStatus, CloudApi, Filter, GuardConfig, Record, RetryConfig};
pub use report::{
    EXIT_AUTH_FAILED, EXIT_FAILURES, EXIT_OK, EXIT_SPEC_INVALID, EXIT_TIMEOUT, Outcome, Report,
    ReportEntry, ReportSummary,
};
