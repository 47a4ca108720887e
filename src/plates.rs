//! Plate text formatting and synthetic plate generation for seeding a registry.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::core::db::{NewVehicle, VehicleType};

/// Letters that may appear on a plate (the Cyrillic letters with Latin look-alikes).
pub const ALLOWED_LETTERS: [char; 12] = ['А', 'В', 'Е', 'К', 'М', 'Н', 'О', 'Р', 'С', 'Т', 'У', 'Х'];

/// Uppercase and strip all whitespace, e.g. `"a 123 bc 77"` → `"A123BC77"`.
pub fn normalize_plate(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Full plate string as stored in the registry: number followed by region code.
pub fn format_plate(number: &str, region: &str) -> String {
    normalize_plate(&format!("{number}{region}"))
}

/// Region codes: 01-99 and 102-199.
pub fn region_codes() -> Vec<String> {
    (1..100)
        .map(|i| format!("{i:02}"))
        .chain((102..200).map(|i| format!("{i:03}")))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedPlate {
    pub number: String,
    pub region: String,
    pub vehicle_type: VehicleType,
}

impl GeneratedPlate {
    pub fn plate(&self) -> String {
        format_plate(&self.number, &self.region)
    }

    pub fn to_new_vehicle(&self) -> NewVehicle {
        NewVehicle {
            license_plate: self.plate(),
            vehicle_type: self.vehicle_type,
        }
    }
}

pub struct PlateGenerator<R: Rng> {
    rng: R,
    regions: Vec<String>,
}

impl PlateGenerator<rand::rngs::ThreadRng> {
    pub fn new() -> Self {
        Self::with_rng(rand::thread_rng())
    }
}

impl<R: Rng> PlateGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self {
            rng,
            regions: region_codes(),
        }
    }

    fn letter(&mut self) -> char {
        *ALLOWED_LETTERS.choose(&mut self.rng).unwrap_or(&ALLOWED_LETTERS[0])
    }

    fn region(&mut self) -> String {
        self.regions
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| "01".to_string())
    }

    /// `L DDD LL`, e.g. `А123ВС`.
    fn passenger_number(&mut self) -> String {
        let digits = self.rng.gen_range(0..1000);
        format!("{}{:03}{}{}", self.letter(), digits, self.letter(), self.letter())
    }

    /// `DDDD LL`, e.g. `1234АВ`.
    fn motorcycle_number(&mut self) -> String {
        let digits = self.rng.gen_range(0..10000);
        format!("{:04}{}{}", digits, self.letter(), self.letter())
    }

    pub fn generate(&mut self, vehicle_type: VehicleType) -> GeneratedPlate {
        let number = match vehicle_type {
            VehicleType::Car | VehicleType::Truck => self.passenger_number(),
            VehicleType::Motorcycle => self.motorcycle_number(),
        };
        GeneratedPlate {
            number,
            region: self.region(),
            vehicle_type,
        }
    }

    /// `size` plates with uniformly chosen vehicle types.
    pub fn generate_dataset(&mut self, size: usize) -> Vec<GeneratedPlate> {
        (0..size)
            .map(|_| {
                let vehicle_type = *VehicleType::ALL
                    .choose(&mut self.rng)
                    .unwrap_or(&VehicleType::Car);
                self.generate(vehicle_type)
            })
            .collect()
    }
}

impl Default for PlateGenerator<rand::rngs::ThreadRng> {
    fn default() -> Self {
        Self::new()
    }
}
