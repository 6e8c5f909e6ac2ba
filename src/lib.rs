//! Photo enhancement: a classical pre-filter followed by Real-ESRGAN
//! super-resolution and GFPGAN face restoration.

pub mod config;
pub mod error;
pub mod job;
pub mod pipeline;
pub mod preprocessing;
pub mod preview;
pub mod server;
pub mod service;
pub mod services;
pub mod session;
