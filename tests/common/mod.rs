#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from plategate for tests
pub use plategate::{
    AccessEngine, Frame, NewVehicle, RecognitionPipeline, RegistryDb, RegistryError, Region,
    VehicleRegistry, VehicleType,
};
