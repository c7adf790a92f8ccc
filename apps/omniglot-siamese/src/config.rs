use std::{fmt, fs, path::Path};
use tch::Device;

use crate::{
    distance::DistanceKind,
    error::{Result, SiameseError},
};

/// Shape of a single input image, in the form `(width, height, channels)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InputShape {
    pub width: i64,
    pub height: i64,
    pub channels: i64,
}

impl InputShape {
    pub const fn new(width: i64, height: i64, channels: i64) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Per-sample tensor dimensions in libtorch's channels-first layout.
    pub fn chw(&self) -> [i64; 3] {
        [self.channels, self.height, self.width]
    }

    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.channels > 0
    }
}

impl Default for InputShape {
    fn default() -> Self {
        Self::new(105, 105, 1)
    }
}

impl fmt::Display for InputShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.width, self.height, self.channels)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSpec {
    #[default]
    Cpu,
    Cuda(usize),
    /// CUDA device 0 when available, CPU otherwise.
    Auto,
}

impl DeviceSpec {
    pub fn resolve(self) -> Device {
        match self {
            Self::Cpu => Device::Cpu,
            Self::Cuda(index) => Device::Cuda(index),
            Self::Auto => Device::cuda_if_available(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Width of the prediction layer.
    pub num_classes: i64,
    pub input_shape: InputShape,
    pub distance: DistanceKind,
    pub device: DeviceSpec,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            num_classes: 1,
            input_shape: InputShape::default(),
            distance: DistanceKind::L1,
            device: DeviceSpec::Cpu,
        }
    }
}

impl NetworkConfig {
    pub fn with_num_classes(mut self, num_classes: i64) -> Self {
        self.num_classes = num_classes;
        self
    }

    pub fn with_input_shape(mut self, input_shape: InputShape) -> Self {
        self.input_shape = input_shape;
        self
    }

    pub fn with_distance(mut self, distance: DistanceKind) -> Self {
        self.distance = distance;
        self
    }

    /// Reads a JSON config. Fields missing from the file keep their defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_classes < 1 {
            return Err(SiameseError::InvalidNumClasses(self.num_classes));
        }
        if !self.input_shape.is_valid() {
            return Err(SiameseError::InvalidInputShape(self.input_shape));
        }
        Ok(())
    }
}
