//! Client-side state core of a self-hosted feed reader.
//!
//! Keeps folders, feeds and items consistent with the server while the user
//! filters, paginates, selects and reorganizes them, and writes preferences
//! back without blocking interaction.

pub mod api;
pub mod app;
pub mod config;
pub mod pagination;
pub mod prefs;
pub mod runtime;
pub mod selection;
pub mod stats;
pub mod util;
