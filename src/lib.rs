//! Client for an RSS digest backend.
//!
//! Keeps two server-computed views in step with user actions: the
//! subscription directory (with unread counts) and the daily digest of one
//! selected date. Every mutation goes to the backend and is followed by a
//! refresh of the views it affects.
//!
//! - [`gateway`] - uniform HTTP access and error classification
//! - [`sync`] - source directory and digest view models
//! - [`controller`] - operation dispatch and reconciliation
//! - [`app`] - state container and snapshots
//! - [`ui`] - text rendering of snapshots

pub mod app;
pub mod config;
pub mod controller;
pub mod gateway;
pub mod sync;
pub mod ui;
pub mod util;
