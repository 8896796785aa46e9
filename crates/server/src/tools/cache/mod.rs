//! Cache administration tools.

pub mod invalidate;
pub mod status;

pub use invalidate::{InvalidateAllParams, invalidate_impl};
pub use status::{CacheStatusParams, status_impl};
