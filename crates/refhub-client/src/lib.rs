//! Async client for refhub servers.
//!
//! One [`Client`] owns one connection: requests are correlated with their
//! responses by id, outbound traffic goes through a serialized send queue,
//! and server-initiated `ref/update` notifications are dispatched to a
//! caller-provided [`NotificationHandler`]. The remote proxy layer of
//! `refhub-server` drives upstream connections through this same type.

pub mod client;
pub mod error;

pub use client::{Client, NotificationHandler, NullHandler};
pub use error::{ClientError, ClientResult};
