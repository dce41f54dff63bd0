//! Headless testing helpers: Pilot, snapshot helpers.
//!
//! Use the [`Pilot`] to mount and drive a hydrated component without a
//! browser. Use [`render_to_string`] and [`outline`] to capture markup for
//! snapshot-style assertions.

pub mod pilot;
pub mod snapshot;

pub use pilot::Pilot;
pub use snapshot::{outline, render_to_string, server_document};
