//! Access decisions: a plate is admitted when it is registered or allow-listed.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use anyhow::Context;

use crate::core::db::VehicleRegistry;
use crate::error::RegistryError;
use crate::models::AccessVerdict;

/// Decides whether a plate may enter.
///
/// Holds the process-local allow-list. The set sits behind an `RwLock`: an insert
/// is applied whole before any reader sees it, and concurrent inserts are never
/// lost. The lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct AccessEngine {
    allowed_plates: RwLock<HashSet<String>>,
}

impl AccessEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_allowed_plates<I, S>(plates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_plates: RwLock::new(plates.into_iter().map(Into::into).collect()),
        }
    }

    /// Load the allow-list from a JSON array of plate strings
    pub fn from_allow_list_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read allow-list {:?}", path))?;
        let plates: Vec<String> = serde_json::from_str(&content)
            .with_context(|| format!("Allow-list {:?} is not a JSON array of strings", path))?;
        tracing::info!(count = plates.len(), "allow-list loaded from {:?}", path);
        Ok(Self::with_allowed_plates(plates))
    }

    /// Add a plate to the allow-list. Returns `false` when it was already present.
    pub fn add_allowed_plate(&self, plate: &str) -> bool {
        let inserted = self
            .allowed_plates
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(plate.to_string());
        if inserted {
            tracing::info!(plate, "plate added to allow-list");
        }
        inserted
    }

    /// Allow-list membership only; the registry is not consulted.
    pub fn is_on_allow_list(&self, plate: &str) -> bool {
        self.allowed_plates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(plate)
    }

    pub fn allowed_plates(&self) -> Vec<String> {
        let mut plates: Vec<String> = self
            .allowed_plates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        plates.sort();
        plates
    }

    /// `true` when the plate is registered or allow-listed.
    ///
    /// The plate is matched exactly; normalize it before calling. A failed registry
    /// lookup is returned as an error and never reported as a denial.
    pub async fn check_access<R>(&self, plate: &str, registry: &R) -> Result<bool, RegistryError>
    where
        R: VehicleRegistry,
    {
        let registered = registry.find_vehicle_by_plate(plate).await?.is_some();
        let granted = registered || self.is_on_allow_list(plate);
        tracing::info!(plate, registered, granted, "access decision");
        Ok(granted)
    }

    pub async fn verdict<R>(&self, plate: &str, registry: &R) -> Result<AccessVerdict, RegistryError>
    where
        R: VehicleRegistry,
    {
        let granted = self.check_access(plate, registry).await?;
        Ok(AccessVerdict {
            plate: plate.to_string(),
            granted,
        })
    }
}
