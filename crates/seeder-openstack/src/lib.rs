//! OpenStack client for openstack-seeder
//!
//! This crate implements the `CloudApi` trait over the OpenStack REST APIs
//! with `reqwest`.
//!
//! # Features
//!
//! - Keystone v3 password and application-credential authentication
//! - Endpoint discovery from the token catalog (region, interface)
//! - Transparent pagination (keystone/designate links, neutron/nova
//!   `<collection>_links`, swift markers)
//! - Microversion headers for compute, block storage, shared file systems
//!   and placement
//! - Per-kind routing for every object class the engine reconciles
//!
//! Retries, deadlines and concurrency caps are not applied here; wrap the
//! client in `seeder_cloud::Guarded`.
//!
//! # Example
//!
//! ```ignore
//! use seeder_cloud::{CloudApi, Guarded, GuardConfig};
//! use seeder_openstack::{Credentials, OpenStackClient};
//!
//! let credentials = Credentials::password(
//!     "https://keystone.example:5000",
//!     "admin",
//!     "secret",
//!     "admin",
//! );
//! let cloud = Guarded::new(OpenStackClient::new(credentials)?, GuardConfig::default());
//!
//! let auth = cloud.check_auth().await?;
//! if !auth.authenticated {
//!     panic!("Not authenticated: {:?}", auth.error);
//! }
//! ```

mod access;
pub mod auth;
pub mod catalog;
mod client;
mod compute;
pub mod error;
mod identity;
mod network;
pub mod pagination;
mod placement;
mod quota;
pub mod routes;
mod storage;
pub mod wire;

pub use auth::{AuthMethod, Credentials, Token};
pub use client::OpenStackClient;
pub use error::{ClientError, Result};
