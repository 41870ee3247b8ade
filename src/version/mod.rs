//! Version resolution layer for SPT mods
//!
//! This module provides version parsing and ordering, engine constraint
//! matching, the engine catalog with its "current minor lines" view, and the
//! listing gate built on top of them.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Catalog   │────▶│  Resolver   │────▶│   Checker   │
//! │  (engines)  │     │ (eligible)  │     │   (gate)    │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!        │                   │                   │
//!        ▼                   ▼                   ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Semver    │◀────│ Constraint  │     │    Cache    │
//! │ (ordering)  │     │ (matching)  │     │  (storage)  │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`semver`]: Version parsing, ordering and minor line helpers
//! - [`constraint`]: Constraint expressions and engine version matching
//! - [`catalog`]: Engine version catalog and current minor lines
//! - [`resolver`]: Eligible and latest version selection for a mod
//! - [`dependency`]: Matching declared dependencies against other mods
//! - [`checker`]: Listing status and the storage trait
//! - [`cache`]: SQLite-based storage for the catalog and derived summaries
//! - [`error`]: Error types for resolution and storage
//! - [`types`]: Engine, mod and mod version records

pub mod cache;
pub mod catalog;
pub mod checker;
pub mod constraint;
pub mod dependency;
pub mod error;
pub mod resolver;
pub mod semver;
pub mod types;
