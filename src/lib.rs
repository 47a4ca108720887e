pub mod access;
pub mod config;
pub mod core;
pub mod detection;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod plates;
pub mod stream;

pub use access::AccessEngine;
pub use config::Config;
pub use crate::core::db::{NewVehicle, RegistryDb, VehicleRecord, VehicleRegistry, VehicleType};
pub use detection::{DetectorKind, PlateDetector, TextExtractor};
pub use error::{FrameSourceError, RegistryError, UnsupportedVehicleCategory};
pub use models::{AccessVerdict, Frame, Region};
pub use pipeline::RecognitionPipeline;
pub use stream::{FrameSource, ImageSequence, PlateSink, StreamDriver, StreamStats};
