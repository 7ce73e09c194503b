//! Core types, rules and services for JustTalk fact posts.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement [`store::FactStore`]; the API and server crates drive
//! the [`manager::FactPostManager`] and [`voting::VotingService`] built on
//! top of it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod consensus;
pub mod error;
pub mod manager;
pub mod post;
pub mod store;
pub mod vote;
pub mod voting;

pub use error::{Error, Result};
