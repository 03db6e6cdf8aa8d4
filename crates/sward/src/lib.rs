//! # SWARD
//!
//! Composition root for [`sward_batch`]: owns the render registry, scatters
//! a grass field, builds one batch and drives it frame by frame.
//!
//! ```text
//! config/sward.toml ─► AppConfig ─► field scatter ─► Batch::rebuild
//!                                                      │
//!                           camera orbit ─► Batch::on_frame × frames
//!                                                      │
//!                                              Batch::dispose
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]

pub mod app;
pub mod config;
pub mod error;
pub mod field;
#[cfg(feature = "gpu")]
pub mod gpu;

pub use app::{run, RunReport};
pub use config::{AppConfig, Backend, CameraSettings, FieldSettings, RunSettings};
pub use error::{AppError, AppResult};
