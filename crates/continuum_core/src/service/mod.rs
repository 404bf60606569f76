//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep app/sync layers decoupled from storage details.

pub mod messaging_service;
pub mod social_service;
pub mod sync_service;
