//! Storefront and membership back-end for The Mindful Musicpreneur.
//!
//! The interesting parts are the order [`fulfillment`] workflow, driven by
//! payment processor events, and the [`collective`] application workflow.
//! Everything else is plumbing around the two: accounts, checkout,
//! downloads, the mailing list and back-office reporting.

#![allow(clippy::new_without_default)]

#[macro_use]
extern crate serde_derive;

pub mod admin;
pub mod auth;
pub mod checkout;
pub mod collective;
pub mod config;
pub mod db;
pub mod download;
pub mod email;
pub mod error;
pub mod freebie;
pub mod fulfillment;
pub mod init;
pub mod mock;
pub mod order;
pub mod payment;
pub mod product;
pub mod routes;
pub mod tracing;
pub mod user;

#[cfg(feature = "axum")]
pub mod axum;

pub use config::Config;
pub use db::Database;
pub use error::{Error, ErrorKind, Result};
pub use order::{Order, OrderId};
pub use product::{Product, ProductId};
pub use user::{User, UserId};
