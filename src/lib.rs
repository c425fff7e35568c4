//! ProjectHub - A community directory of projects and the packages they use
//!
//! This library provides the core functionality for ProjectHub.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
pub mod templates;
