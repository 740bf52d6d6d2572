//! BareMetalHost Provisioner
//!
//! The provisioning state machine for bare-metal hosts. A reconciler binds a
//! `Provisioner` to one `BareMetalHost`, calls the single step that matches
//! the host's phase, persists the status when the step reports `dirty`, and
//! honors `requeue_after` before calling again.
//!
//! # Example
//!
//! ```
//! use host_provisioner::{Credentials, FixtureProvisioner, NoUserData, Provisioner};
//! use crds::{BareMetalHost, BareMetalHostSpec, Image};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), host_provisioner::ProvisionerError> {
//! let mut host = BareMetalHost::new("worker-0", BareMetalHostSpec {
//!     image: Some(Image { url: "http://images/os.qcow2".to_string(), checksum: String::new() }),
//!     ..Default::default()
//! });
//! let publisher = Arc::new(|reason: &str, message: &str| println!("{reason}: {message}"));
//!
//! let mut provisioner = FixtureProvisioner::new(&mut host, Credentials::new("admin", "secret"), publisher);
//! provisioner.validate_management_access().await?;
//! provisioner.inspect_hardware().await?;
//! let result = provisioner.provision(&NoUserData).await?;
//! assert!(result.dirty);
//! # Ok(())
//! # }
//! ```
//!
//! # Backends
//!
//! - **fixture**: simulated backend that edits the host status directly
//!
//! Other backends implement `Provisioner` and `ProvisionerFactory`.

pub mod config;
pub mod credentials;
pub mod error;
pub mod events;
pub mod fixture;
#[path = "trait.rs"]
pub mod provisioner_trait;
pub mod result;
pub mod user_data;

pub use config::ProvisionerConfig;
pub use credentials::Credentials;
pub use error::ProvisionerError;
pub use events::{reason, EventPublisher};
#[cfg(any(test, feature = "test-util"))]
pub use events::{HostEvent, RecordingPublisher};
pub use fixture::{FixtureFactory, FixtureProvisioner, FIXTURE_PROVISIONING_ID};
pub use provisioner_trait::{Provisioner, ProvisionerFactory};
pub use result::StepResult;
pub use user_data::{NoUserData, StaticUserData, UserDataSource};
