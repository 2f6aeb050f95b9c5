//! openstack-seeder spec model
//!
//! Typed model of the YAML document describing the desired tenancy of an
//! OpenStack cloud, with the loader that parses, normalises and validates it.
//!
//! ```yaml
//! openstack:
//!   roles:
//!     - name: admin
//!   domains:
//!     - name: acme
//!       users:
//!         - name: alice
//!       projects:
//!         - name: ops
//!           role_assignments:
//!             - {user: alice, role: admin}
//! ```

pub mod error;
pub mod key;
pub mod loader;
pub mod model;
pub mod normalize;
pub mod validate;

pub use error::{Result, SpecError};
pub use loader::{dump_canonical, load_spec, load_spec_file, load_spec_str};
pub use model::*;
