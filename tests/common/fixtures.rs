use std::collections::VecDeque;
use std::sync::Mutex;

use image::{DynamicImage, GrayImage, ImageBuffer, Luma, Rgb};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use plategate::{
    Frame, FrameSource, FrameSourceError, NewVehicle, PlateDetector, RegistryDb, RegistryError,
    Region, TextExtractor, VehicleRecord, VehicleRegistry, VehicleType,
};

/// Creates a RegistryDb backed by a fresh SQLite file.
/// Returns both the registry and the temp directory (which must be kept alive).
pub async fn create_test_registry() -> (RegistryDb, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let registry = RegistryDb::open(dir.path().join("registry.db"))
        .await
        .expect("Failed to create test registry");
    (registry, dir)
}

pub fn car(plate: &str) -> NewVehicle {
    NewVehicle {
        license_plate: plate.to_string(),
        vehicle_type: VehicleType::Car,
    }
}

/// Dark frame with one bright rectangle standing in for a plate.
pub fn plate_frame(width: u32, height: u32, plate: Rect) -> Frame {
    let mut img: GrayImage = ImageBuffer::from_pixel(width, height, Luma([40u8]));
    draw_filled_rect_mut(&mut img, plate, Luma([230u8]));
    Frame::new(DynamicImage::ImageLuma8(img))
}

/// Dark frame with bright filled shapes drawn by `draw`.
pub fn shapes_frame(width: u32, height: u32, draw: impl FnOnce(&mut GrayImage)) -> Frame {
    let mut img: GrayImage = ImageBuffer::from_pixel(width, height, Luma([40u8]));
    draw(&mut img);
    Frame::new(DynamicImage::ImageLuma8(img))
}

/// Uniform frame without any structure.
pub fn blank_frame(width: u32, height: u32) -> Frame {
    let img = ImageBuffer::from_pixel(width, height, Rgb([90u8, 90u8, 90u8]));
    Frame::new(DynamicImage::ImageRgb8(img))
}

/// Detector returning a fixed set of regions for every frame.
pub struct FixedDetector(pub Vec<Region>);

impl PlateDetector for FixedDetector {
    fn detect(&self, _frame: &Frame) -> Vec<Region> {
        self.0.clone()
    }

    fn name(&self) -> &str {
        "Fixed"
    }
}

/// Extractor returning fixed text and remembering the size of every crop it saw.
pub struct FixedExtractor {
    pub text: String,
    pub crops: Mutex<Vec<(u32, u32)>>,
}

impl FixedExtractor {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            crops: Mutex::new(Vec::new()),
        }
    }
}

impl TextExtractor for FixedExtractor {
    fn extract(&self, region: &DynamicImage) -> String {
        self.crops.lock().unwrap().push((region.width(), region.height()));
        self.text.clone()
    }
}

/// Registry whose every call fails as if the database were unreachable.
pub struct UnreachableRegistry;

impl VehicleRegistry for UnreachableRegistry {
    async fn find_vehicle_by_plate(&self, _plate: &str) -> Result<Option<VehicleRecord>, RegistryError> {
        Err(RegistryError::Unavailable(sqlx::Error::PoolTimedOut))
    }

    async fn add_vehicle(&self, _vehicle: &NewVehicle) -> Result<VehicleRecord, RegistryError> {
        Err(RegistryError::Unavailable(sqlx::Error::PoolTimedOut))
    }

    async fn count_vehicles(&self) -> Result<u64, RegistryError> {
        Err(RegistryError::Unavailable(sqlx::Error::PoolTimedOut))
    }
}

/// Registry held in memory, for checks that must not touch SQLite.
#[derive(Default)]
pub struct MemoryRegistry {
    pub vehicles: Mutex<Vec<VehicleRecord>>,
}

impl MemoryRegistry {
    pub fn with_plates(plates: &[&str]) -> Self {
        let vehicles = plates
            .iter()
            .enumerate()
            .map(|(i, plate)| VehicleRecord {
                id: i as i64 + 1,
                license_plate: plate.to_string(),
                vehicle_type: VehicleType::Car,
            })
            .collect();
        Self {
            vehicles: Mutex::new(vehicles),
        }
    }
}

impl VehicleRegistry for MemoryRegistry {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>, RegistryError> {
        let vehicles = self.vehicles.lock().unwrap();
        Ok(vehicles.iter().find(|v| v.license_plate == plate).cloned())
    }

    async fn add_vehicle(&self, vehicle: &NewVehicle) -> Result<VehicleRecord, RegistryError> {
        let mut vehicles = self.vehicles.lock().unwrap();
        if vehicles.iter().any(|v| v.license_plate == vehicle.license_plate) {
            return Err(RegistryError::DuplicatePlate(vehicle.license_plate.clone()));
        }
        let record = VehicleRecord {
            id: vehicles.len() as i64 + 1,
            license_plate: vehicle.license_plate.clone(),
            vehicle_type: vehicle.vehicle_type,
        };
        vehicles.push(record.clone());
        Ok(record)
    }

    async fn count_vehicles(&self) -> Result<u64, RegistryError> {
        Ok(self.vehicles.lock().unwrap().len() as u64)
    }
}

/// Frame source over an in-memory list of frames.
pub struct VecSource(pub VecDeque<Frame>);

impl VecSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self(frames.into())
    }
}

impl FrameSource for VecSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, FrameSourceError> {
        Ok(self.0.pop_front())
    }
}
