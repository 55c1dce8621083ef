//! Core types and shared rules for the roadhire driver-application pipeline.
//!
//! Both the form engine and the application service link this crate, so date
//! parsing, SSN handling and field validation have exactly one implementation.
//! It carries no HTTP or database dependencies.

// Native `async fn`-style trait methods; see `store` and `blob`.
#![allow(async_fn_in_trait)]

pub mod application;
pub mod blob;
pub mod crypto;
pub mod dates;
pub mod error;
pub mod intake;
pub mod ssn;
pub mod store;
pub mod validation;

pub use error::{Error, Result};
