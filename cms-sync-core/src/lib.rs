#![doc = "cms-sync-core: core logic library for cms-sync."]

//! This crate contains the import pipeline for WordPress-authored content:
//! export parsing (WXR XML and CSV), reconciliation against the hosted CMS
//! store, featured-image relocation into the storage bucket, run progress
//! accounting, and sitemap rendering.
//!
//! Store access goes through the async traits in [`contract`], so every
//! pipeline stage is testable against `mockall` mocks without a live backend.

pub mod contract;
pub mod parse;
pub mod progress;
pub mod reconcile;
pub mod record;
pub mod relocate;
pub mod sitemap;
pub mod slug;
