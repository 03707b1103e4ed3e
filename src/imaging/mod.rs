//! Pixel work behind a backend trait.
//!
//! [`backend`] defines the two operations the publisher needs (bounded
//! resize and square thumbnail) as a trait over parameter structs, so the
//! fallback logic in [`crate::assets`] can be tested with a recording mock
//! instead of a real encoder. [`rust_backend`] is the production
//! implementation on the `image` crate.

pub mod backend;
pub mod rust_backend;

pub use backend::{BackendError, ImageBackend, ResizeParams, ThumbnailParams};
pub use rust_backend::RustBackend;
