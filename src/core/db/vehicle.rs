use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, UnsupportedVehicleCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    Car,
    Truck,
    Motorcycle,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Car, VehicleType::Truck, VehicleType::Motorcycle];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Truck => "truck",
            VehicleType::Motorcycle => "motorcycle",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VehicleType {
    type Err = UnsupportedVehicleCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "car" => Ok(VehicleType::Car),
            "truck" => Ok(VehicleType::Truck),
            "motorcycle" => Ok(VehicleType::Motorcycle),
            _ => Err(UnsupportedVehicleCategory(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VehicleRecord {
    pub id: i64,
    pub license_plate: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, Clone)]
pub struct NewVehicle {
    pub license_plate: String,
    pub vehicle_type: VehicleType,
}

#[derive(Debug, sqlx::FromRow)]
pub(super) struct VehicleRow {
    pub id: i64,
    pub license_plate: String,
    pub vehicle_type: String,
}

impl TryFrom<VehicleRow> for VehicleRecord {
    type Error = RegistryError;

    fn try_from(row: VehicleRow) -> Result<Self, Self::Error> {
        let vehicle_type = row.vehicle_type.parse().map_err(|e: UnsupportedVehicleCategory| {
            RegistryError::CorruptRecord(format!("vehicle {}: {}", row.id, e))
        })?;
        Ok(VehicleRecord {
            id: row.id,
            license_plate: row.license_plate,
            vehicle_type,
        })
    }
}

/// Persistent store of authorized vehicles.
///
/// Lookups distinguish "not registered" (`Ok(None)`) from a failed lookup
/// (`Err`). Each call uses its own connection for its duration only.
pub trait VehicleRegistry: Send + Sync {
    fn find_vehicle_by_plate(
        &self,
        plate: &str,
    ) -> impl Future<Output = Result<Option<VehicleRecord>, RegistryError>> + Send;
    fn add_vehicle(
        &self,
        vehicle: &NewVehicle,
    ) -> impl Future<Output = Result<VehicleRecord, RegistryError>> + Send;
    fn count_vehicles(&self) -> impl Future<Output = Result<u64, RegistryError>> + Send;
}
