//! Reconciliation engine for openstack-seeder
//!
//! Turns a loaded spec document into a dependency plan, then drives one
//! reconciler per object through a bounded scheduler against any
//! [`seeder_cloud::CloudApi`] implementation.
//!
//! # Example
//!
//! ```ignore
//! use seeder_engine::{Engine, EngineOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = Engine::new(cloud, EngineOptions::default());
//! let report = engine.reconcile(&CancellationToken::new(), &spec).await?;
//! std::process::exit(report.exit_code());
//! ```

pub mod diff;
pub mod engine;
pub mod error;
pub mod plan;
pub mod reconcile;
pub mod resolver;
pub mod scheduler;
pub mod source;

pub use engine::{DEFAULT_CONCURRENCY, DEFAULT_RUN_TIMEOUT, Engine, EngineOptions};
pub use error::{EngineError, Result};
pub use plan::{Op, Plan, Task};
pub use resolver::Resolver;
pub use scheduler::Scheduler;
pub use source::{Controller, FileSpecSource, SpecEvent, SpecSource};
