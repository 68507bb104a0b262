//! Taytay marketplace REST backend
//!
//! Sellers register an account together with their store, admins review
//! them, and both sign in with a password followed by an emailed one-time
//! code.
//!
//! ## Services
//!
//! - **Auth**: password check, one-time codes with lockout, session cookie
//! - **Archive**: archive/restore for admins and the store taxonomies
//! - **Stores**: expanded store views and updates with linked-account merge
//! - **Activity**: who-did-what log for every admin-side mutation

pub mod auth;
pub mod config;
pub mod db;
pub mod repository;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{MarketError, Result};
