//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate notebook writes into use-case level APIs.
//! - Keep session and FFI layers decoupled from storage details.

pub mod commit_service;
