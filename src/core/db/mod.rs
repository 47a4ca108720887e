mod state;
mod vehicle;

use std::{path::Path, sync::Arc};

use state::RegistryState;

use crate::error::RegistryError;

pub use vehicle::{NewVehicle, VehicleRecord, VehicleRegistry, VehicleType};
use vehicle::VehicleRow;

/// SQLite-backed vehicle registry.
#[derive(Debug, Clone)]
pub struct RegistryDb {
    state: Arc<RegistryState>,
}

impl RegistryDb {
    /// Open (or create) the registry database file at `path`.
    pub async fn open<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(RegistryState::open_path(path).await?),
        })
    }

    /// Open a registry from a `sqlite:` URL, e.g. `sqlite://plategate.db` or `sqlite::memory:`.
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        Ok(Self {
            state: Arc::new(RegistryState::open_url(url).await?),
        })
    }

    /// Close the underlying pool. Every later call fails with `RegistryError::Unavailable`.
    pub async fn close(&self) {
        self.state.close().await
    }
}

impl VehicleRegistry for RegistryDb {
    async fn find_vehicle_by_plate(&self, plate: &str) -> Result<Option<VehicleRecord>, RegistryError> {
        let mut conn = self.state.conn().await?;
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"SELECT id, license_plate, vehicle_type FROM vehicles WHERE license_plate = $1"#,
        )
        .bind(plate)
        .fetch_optional(&mut **conn)
        .await?;

        match row {
            Some(row) => {
                let record = VehicleRecord::try_from(row)?;
                tracing::debug!(plate, id = record.id, "vehicle found in registry");
                Ok(Some(record))
            }
            None => {
                tracing::debug!(plate, "vehicle not in registry");
                Ok(None)
            }
        }
    }

    async fn add_vehicle(&self, vehicle: &NewVehicle) -> Result<VehicleRecord, RegistryError> {
        let mut conn = self.state.conn().await?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO vehicles (license_plate, vehicle_type) VALUES ($1, $2) RETURNING id"#,
        )
        .bind(&vehicle.license_plate)
        .bind(vehicle.vehicle_type.as_str())
        .fetch_one(&mut **conn)
        .await
        .map_err(|e| RegistryError::from_write(e, &vehicle.license_plate))?;

        Ok(VehicleRecord {
            id,
            license_plate: vehicle.license_plate.clone(),
            vehicle_type: vehicle.vehicle_type,
        })
    }

    async fn count_vehicles(&self) -> Result<u64, RegistryError> {
        let mut conn = self.state.conn().await?;
        let count: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM vehicles"#)
            .fetch_one(&mut **conn)
            .await?;
        Ok(count as u64)
    }
}
