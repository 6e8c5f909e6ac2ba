//! Model service implementations
//!
//! The model-backed services are conditionally compiled behind the
//! `engine-rten` feature. Face geometry, the restoration flow and tiling are
//! plain image code and always available.

pub mod face;
pub mod restore;
pub mod tiling;

#[cfg(feature = "engine-rten")]
mod tensor;

#[cfg(feature = "engine-rten")]
pub mod gfpgan;

#[cfg(feature = "engine-rten")]
pub mod realesrgan;

#[cfg(feature = "engine-rten")]
pub mod retinaface;

use crate::config::Config;
use crate::error::EnhanceError;
use crate::pipeline::EnhancementPipeline;
use crate::service::{ImageService, ServiceInfo};
use std::sync::Arc;

/// The two model services the enhancement pipeline runs
#[derive(Clone)]
pub struct ServiceSet {
    super_resolution: Arc<dyn ImageService>,
    face_restoration: Arc<dyn ImageService>,
}

impl ServiceSet {
    /// Load both services from the models directory.
    ///
    /// The super-resolution service doubles as the background upsampler of
    /// the face restorer.
    #[cfg(feature = "engine-rten")]
    pub fn new(config: &Config) -> Result<Self, EnhanceError> {
        tracing::info!("Initializing super-resolution service...");
        let super_resolution: Arc<dyn ImageService> =
            Arc::new(realesrgan::RealEsrganService::new(config)?);

        tracing::info!("Initializing face restoration service...");
        let face_restoration = gfpgan::GfpganService::new(
            config,
            Some(super_resolution.clone()),
            restore::FaceRestoreOptions::default(),
        )?;

        tracing::info!("Model services initialized successfully");
        Ok(Self::from_services(super_resolution, Arc::new(face_restoration)))
    }

    #[cfg(not(feature = "engine-rten"))]
    pub fn new(config: &Config) -> Result<Self, EnhanceError> {
        let _ = config;
        Err(EnhanceError::Initialization(
            "No model backend available. Build with --features engine-rten".to_string(),
        ))
    }

    pub fn from_services(
        super_resolution: Arc<dyn ImageService>,
        face_restoration: Arc<dyn ImageService>,
    ) -> Self {
        Self {
            super_resolution,
            face_restoration,
        }
    }

    pub fn super_resolution(&self) -> Arc<dyn ImageService> {
        self.super_resolution.clone()
    }

    pub fn face_restoration(&self) -> Arc<dyn ImageService> {
        self.face_restoration.clone()
    }

    /// Get info about both services
    pub fn info(&self) -> Vec<ServiceInfo> {
        vec![self.super_resolution.info(), self.face_restoration.info()]
    }

    pub fn pipeline(&self) -> EnhancementPipeline {
        EnhancementPipeline::new(self.super_resolution(), self.face_restoration())
    }
}
