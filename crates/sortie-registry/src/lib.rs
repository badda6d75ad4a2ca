//! HTTP client for the Sortie package registry.
//!
//! Thin request helpers over `reqwest`: JSON posts, multipart file uploads and
//! gets, each with or without the registry token. Callers that want a typed
//! body use [`RegistryClient::get_json_with_authentication`].

pub mod client;
pub mod error;

pub use client::{ClientBuilder, RegistryClient, TOKEN_HEADER};
pub use error::{Error, Result};
