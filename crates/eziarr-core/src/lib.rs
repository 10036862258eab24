//! # eziarr-core
//!
//! Shared vocabulary of eziarr: what a missing item looks like, which
//! services exist, the traits the store and the upstream clients implement,
//! tunable defaults, and host-to-upstream path translation.

pub mod defaults;
pub mod error;
pub mod models;
pub mod path_map;
pub mod traits;

pub use error::{Error, Result};
pub use models::*;
pub use path_map::{translate_path, PathMapping, PathStyle};
pub use traits::*;
