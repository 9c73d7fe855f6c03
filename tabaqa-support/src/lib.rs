//! # Tabaqa Support
//!
//! Shared helpers for the Tabaqa DI crates.
//!
//! This crate provides:
//! - Rendering of dependency chains and type names for diagnostics
//! - "Did you mean?" suggestions over registered tag names

pub mod rendering;
