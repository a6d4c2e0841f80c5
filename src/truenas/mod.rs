//! TrueNAS API interaction module
//!
//! This module provides the request/response boundary the reconcilers talk
//! through, and the reqwest-backed implementation of it.
//!
//! # Module Structure
//!
//! - [`connection`] - The [`Connection`](connection::Connection) trait and [`TransportResult`](connection::TransportResult)
//! - [`client`] - TrueNAS client: base URL, API key and the `/api/v2.0` prefix
//! - [`http`] - HTTP utilities for REST API calls
//!
//! # Example
//!
//! ```ignore
//! use truenas_api::truenas::client::TruenasClient;
//! use truenas_api::truenas::connection::Connection;
//! use reqwest::Method;
//!
//! async fn example() -> truenas_api::Result<()> {
//!     let client = TruenasClient::new("https://nas.local", Some("key"), true).unwrap();
//!     let users = client.send_request(Method::GET, "user", None).await?;
//!     println!("{}", users.status_code);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod http;

#[cfg(test)]
pub(crate) mod testing;
