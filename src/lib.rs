//! STEP Preview Service
//!
//! This library provides the core functionality for the step-preview system:
//! an HTTP surface that accepts STEP file uploads, a bounded job queue
//! drained by a fixed worker pool that runs an external renderer per job,
//! a result store polled by clients, and a retention sweeper that removes
//! abandoned temp artifacts.

pub mod app_state;
pub mod config;
pub mod models;
pub mod routes;
pub mod services;
