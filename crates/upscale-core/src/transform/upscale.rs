use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

use crate::UpscaleError;
use crate::transform::FrameTransform;
use crate::transform::bilateral::BilateralFilter;
use crate::types::{Frame, Result};

/// Parameters for the resize-then-smooth frame transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleParams {
    /// Size multiplier applied to both frame dimensions.
    pub scale: f64,
    /// Bilateral filter neighbourhood diameter; `<= 0` derives it from `sigma_space`.
    pub filter_diameter: i32,
    pub sigma_color: f64,
    pub sigma_space: f64,
}

impl Default for UpscaleParams {
    fn default() -> Self {
        Self {
            scale: 2.0,
            filter_diameter: 6,
            sigma_color: 75.0,
            sigma_space: 75.0,
        }
    }
}

impl UpscaleParams {
    pub fn validate(&self) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(UpscaleError::InvalidConfig(format!(
                "scale must be a positive number, got {}",
                self.scale
            )));
        }
        for (name, sigma) in [
            ("sigma_color", self.sigma_color),
            ("sigma_space", self.sigma_space),
        ] {
            if !sigma.is_finite() || sigma <= 0.0 {
                return Err(UpscaleError::InvalidConfig(format!(
                    "{name} must be a positive number, got {sigma}"
                )));
            }
        }
        Ok(())
    }

    /// Output dimensions for an input of `width` x `height`, truncated like
    /// an integer cast.
    pub fn output_size(&self, width: u32, height: u32) -> Result<(u32, u32)> {
        let scale_dim = |dim: u32| -> Result<u32> {
            let scaled = (f64::from(dim) * self.scale).floor();
            if scaled < 1.0 {
                return Err(UpscaleError::Transform(format!(
                    "scale {} collapses dimension {dim} to zero",
                    self.scale
                )));
            }
            if scaled > f64::from(u32::MAX) {
                return Err(UpscaleError::Transform(format!(
                    "scale {} overflows dimension {dim}",
                    self.scale
                )));
            }
            Ok(scaled as u32)
        };
        Ok((scale_dim(width)?, scale_dim(height)?))
    }
}

/// Bicubic upscale followed by an edge-preserving bilateral filter.
#[derive(Debug, Clone)]
pub struct UpscaleTransform {
    params: UpscaleParams,
    filter: BilateralFilter,
}

impl UpscaleTransform {
    pub fn new(params: UpscaleParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            filter: BilateralFilter::new(
                params.filter_diameter,
                params.sigma_color,
                params.sigma_space,
            ),
        })
    }

    pub fn params(&self) -> &UpscaleParams {
        &self.params
    }
}

impl FrameTransform<Frame> for UpscaleTransform {
    fn apply(&self, frame: Frame) -> Result<Frame> {
        let (width, height) = self.params.output_size(frame.width(), frame.height())?;
        let resized = imageops::resize(&frame.image, width, height, FilterType::CatmullRom);
        Ok(Frame {
            image: self.filter.apply(&resized),
            source_path: frame.source_path,
        })
    }
}
