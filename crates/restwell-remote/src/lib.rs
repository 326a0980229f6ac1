//! Restwell remote store
//!
//! Client library for a PostgREST-style resource store: named collections
//! queried with `GET` and written with `POST`.

pub mod auth;
pub mod client;
pub mod error;
pub mod types;

pub use auth::ApiKeyAuth;
pub use client::RestClient;
pub use error::{Error, Result};
pub use types::*;
