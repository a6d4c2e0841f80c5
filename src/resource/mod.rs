//! Resource abstraction layer
//!
//! This module provides a data-driven approach to managing TrueNAS
//! resources. Per-kind field schemas are loaded from JSON at compile time;
//! reconcilers turn a desired state into at most one corrective call.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource kind definitions from embedded JSON
//! - [`model`] - Desired-state models and the strip-null step
//! - [`classify`] - Maps raw responses onto outcomes or errors
//! - [`reconciler`] - Lifecycle operations for collection-style kinds (users)
//! - [`jail_fstab`] - Lifecycle operations for jail fstab entries
//! - [`result`] - The result record shared by every kind
//!
//! # Example
//!
//! ```ignore
//! use truenas_api::resource::{FstabParams, JailFstab, LifecycleState};
//!
//! async fn mount(conn: &impl truenas_api::truenas::connection::Connection) -> truenas_api::Result<()> {
//!     let fstab = JailFstab::new(conn, false)?;
//!     let params = FstabParams {
//!         jail: "plex".into(),
//!         source: Some("/mnt/tank/media".into()),
//!         destination: Some("/mnt/tank/iocage/jails/plex/root/media".into()),
//!         ..Default::default()
//!     };
//!     fstab.apply(LifecycleState::Present, &params).await?;
//!     Ok(())
//! }
//! ```

pub mod classify;
pub mod jail_fstab;
pub mod model;
pub mod reconciler;
mod registry;
pub mod result;

pub use classify::{classify, extract_id, CallKind, Outcome};
pub use jail_fstab::JailFstab;
pub use model::{FsOptions, FstabParams, LifecycleState, ResourceModel, UserModel};
pub use reconciler::Reconciler;
pub use registry::*;
pub use result::{Action, ReconciliationResult};
