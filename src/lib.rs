//! Idempotent resource managers for the TrueNAS REST API.
//!
//! The crate maps a declared desired state onto at most one corrective API
//! call per invocation and reports what actually happened.
//!
//! # Module Structure
//!
//! - [`truenas`] - Connection trait and the reqwest-backed TrueNAS client
//! - [`resource`] - Resource registry, models, response classifier and reconcilers
//! - [`filter`] - Reshaping of raw jail fstab LIST responses
//! - [`config`] - Persistent connection settings
//! - [`error`] - Error taxonomy shared by every component
//!
//! # Example
//!
//! ```ignore
//! use truenas_api::resource::{LifecycleState, Reconciler, UserModel};
//! use truenas_api::truenas::client::TruenasClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = TruenasClient::new("https://nas.local", Some("api-key"), true)?;
//!     let users = Reconciler::for_kind(&client, "user", false)?;
//!     let model = UserModel { username: Some("backup".into()), ..Default::default() };
//!     let result = users.apply(LifecycleState::Present, model.into_model()?).await?;
//!     println!("changed: {}", result.changed);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod resource;
pub mod truenas;

pub use error::{Error, Result};
