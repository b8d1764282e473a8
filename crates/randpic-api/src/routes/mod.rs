//! # API Route Modules
//!
//! - [`images`]: random image, token re-fetch and download.
//! - [`stats`]: access counter report.

pub mod images;
pub mod stats;
