//! SQLite persistence for the vehicle catalog
//!
//! Uses parameterized queries exclusively (no SQL string concatenation).
//! Every multi-row write runs in a single transaction so a failed save leaves the
//! previous catalog intact.

use crate::catalog::CatalogBackend;
use crate::error::{CatalogError, Result};
use crate::image_store::{is_uploaded_url, ImageStore};
use crate::models::{ImageRecord, VehicleRecord};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::str::FromStr;
use uuid::Uuid;

/// Column list shared by every vehicle SELECT
const VEHICLE_COLUMNS: &str = "id, make, model, year, condition, body_type, transmission,
     fuel_type, exterior_color, interior_color, engine, price, mileage, available,
     images, features, description, vin";

/// Initialize the database schema
///
/// Creates tables if they don't exist:
/// - `vehicles`: the catalog, `position` keeps list order; `images` holds only
///   external URLs
/// - `vehicle_images`: uploaded pictures, at most one primary per vehicle
/// - `retired_seed_ids`: seed vehicles an operator deleted
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS vehicles (
            id TEXT PRIMARY KEY,
            position INTEGER NOT NULL,
            make TEXT NOT NULL,
            model TEXT NOT NULL,
            year INTEGER NOT NULL,
            condition TEXT NOT NULL,
            body_type TEXT NOT NULL,
            transmission TEXT NOT NULL,
            fuel_type TEXT NOT NULL,
            exterior_color TEXT NOT NULL,
            interior_color TEXT NOT NULL,
            engine TEXT NOT NULL,
            price REAL NOT NULL,
            mileage INTEGER NOT NULL,
            available INTEGER NOT NULL,
            images TEXT NOT NULL,
            features TEXT NOT NULL,
            description TEXT NOT NULL,
            vin TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE INDEX IF NOT EXISTS idx_vehicles_position ON vehicles(position);
        CREATE INDEX IF NOT EXISTS idx_vehicles_vin ON vehicles(vin);

        CREATE TABLE IF NOT EXISTS vehicle_images (
            id TEXT PRIMARY KEY,
            vehicle_id TEXT NOT NULL,
            image_url TEXT NOT NULL,
            image_path TEXT NOT NULL,
            is_primary INTEGER NOT NULL DEFAULT 0,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY (vehicle_id) REFERENCES vehicles(id) ON DELETE CASCADE
        );

        CREATE INDEX IF NOT EXISTS idx_vehicle_images_vehicle ON vehicle_images(vehicle_id);

        CREATE TABLE IF NOT EXISTS retired_seed_ids (
            id TEXT PRIMARY KEY,
            retired_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;

    log::info!("Database schema initialized");
    Ok(())
}

/// Parse a TEXT column into one of the closed vehicle enums
fn enum_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = String>,
{
    let text: String = row.get(idx)?;
    text.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

/// Parse a JSON array column
fn json_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<String>> {
    let text: String = row.get(idx)?;
    serde_json::from_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn vehicle_from_row(row: &Row<'_>) -> rusqlite::Result<VehicleRecord> {
    Ok(VehicleRecord {
        id: row.get(0)?,
        make: row.get(1)?,
        model: row.get(2)?,
        year: row.get(3)?,
        condition: enum_column(row, 4)?,
        body_type: enum_column(row, 5)?,
        transmission: enum_column(row, 6)?,
        fuel_type: enum_column(row, 7)?,
        exterior_color: row.get(8)?,
        interior_color: row.get(9)?,
        engine: row.get(10)?,
        price: row.get(11)?,
        mileage: row.get(12)?,
        available: row.get(13)?,
        images: json_column(row, 14)?,
        features: json_column(row, 15)?,
        description: row.get(16)?,
        vin: row.get(17)?,
    })
}

fn image_from_row(row: &Row<'_>) -> rusqlite::Result<ImageRecord> {
    Ok(ImageRecord {
        id: row.get(0)?,
        vehicle_id: row.get(1)?,
        image_url: row.get(2)?,
        image_path: row.get(3)?,
        is_primary: row.get(4)?,
        sort_order: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// Insert or update one vehicle at an explicit list position
fn upsert_vehicle_tx(tx: &Transaction<'_>, record: &VehicleRecord, position: i64) -> Result<()> {
    // Uploaded images live in vehicle_images and are merged back in on read
    let external: Vec<&String> = record.images.iter().filter(|u| !is_uploaded_url(u)).collect();
    let images = serde_json::to_string(&external)?;
    let features = serde_json::to_string(&record.features)?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO vehicles
         (id, position, make, model, year, condition, body_type, transmission, fuel_type,
          exterior_color, interior_color, engine, price, mileage, available,
          images, features, description, vin, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19,
                 datetime('now'))
         ON CONFLICT(id) DO UPDATE SET
            position       = excluded.position,
            make           = excluded.make,
            model          = excluded.model,
            year           = excluded.year,
            condition      = excluded.condition,
            body_type      = excluded.body_type,
            transmission   = excluded.transmission,
            fuel_type      = excluded.fuel_type,
            exterior_color = excluded.exterior_color,
            interior_color = excluded.interior_color,
            engine         = excluded.engine,
            price          = excluded.price,
            mileage        = excluded.mileage,
            available      = excluded.available,
            images         = excluded.images,
            features       = excluded.features,
            description    = excluded.description,
            vin            = excluded.vin,
            updated_at     = excluded.updated_at",
    )?;

    stmt.execute(params![
        &record.id,
        position,
        &record.make,
        &record.model,
        record.year,
        record.condition.as_str(),
        record.body_type.as_str(),
        record.transmission.as_str(),
        record.fuel_type.as_str(),
        &record.exterior_color,
        &record.interior_color,
        &record.engine,
        record.price,
        record.mileage,
        record.available,
        images,
        features,
        &record.description,
        &record.vin,
    ])?;
    Ok(())
}

/// Delete a vehicle and its image rows, returning the image files to remove
fn delete_vehicle_tx(tx: &Transaction<'_>, id: &str) -> Result<(bool, Vec<String>)> {
    let mut stmt = tx.prepare_cached("SELECT image_path FROM vehicle_images WHERE vehicle_id = ?1")?;
    let paths: Vec<String> = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<_>>()?;

    tx.execute("DELETE FROM vehicle_images WHERE vehicle_id = ?1", params![id])?;
    let deleted = tx.execute("DELETE FROM vehicles WHERE id = ?1", params![id])?;
    Ok((deleted > 0, paths))
}

/// Uploaded image URLs per vehicle in display order, flagged when primary
fn uploaded_image_urls(
    conn: &Connection,
    vehicle_id: Option<&str>,
) -> Result<HashMap<String, Vec<(String, bool)>>> {
    let mut stmt = conn.prepare_cached(
        "SELECT vehicle_id, image_url, is_primary
         FROM vehicle_images
         WHERE ?1 IS NULL OR vehicle_id = ?1
         ORDER BY sort_order ASC, created_at ASC",
    )?;

    let mut by_vehicle: HashMap<String, Vec<(String, bool)>> = HashMap::new();
    let rows = stmt.query_map(params![vehicle_id], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, bool>(2)?))
    })?;
    for row in rows {
        let (owner, url, is_primary) = row?;
        by_vehicle.entry(owner).or_default().push((url, is_primary));
    }
    Ok(by_vehicle)
}

/// Splice uploaded images into a record's image list
///
/// The primary upload leads, external URLs keep their place after it and the
/// remaining uploads follow in sort order.
fn attach_uploaded(record: &mut VehicleRecord, uploaded: Vec<(String, bool)>) {
    let (primary, rest): (Vec<_>, Vec<_>) = uploaded.into_iter().partition(|(_, p)| *p);
    let external = std::mem::take(&mut record.images);

    record.images = primary
        .into_iter()
        .map(|(url, _)| url)
        .chain(external.into_iter().filter(|url| !is_uploaded_url(url)))
        .chain(rest.into_iter().map(|(url, _)| url))
        .collect();
}

/// SQLite-backed catalog with uploaded image storage
pub struct SqliteCatalog {
    conn: Connection,
    images: ImageStore,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database; images are stored next to it
    pub fn open(db_path: &Path) -> Result<Self> {
        let data_dir = db_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(data_dir)?;

        let conn = Connection::open(db_path)?;
        log::info!("Opened database: {}", db_path.display());
        Self::with_connection(conn, ImageStore::new(data_dir))
    }

    /// In-memory database for tests and throwaway runs
    pub fn open_in_memory(image_dir: &Path) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, ImageStore::new(image_dir))
    }

    fn with_connection(conn: Connection, images: ImageStore) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self { conn, images })
    }

    pub fn image_store(&self) -> &ImageStore {
        &self.images
    }

    /// Number of vehicles in the database
    pub fn vehicle_count(&self) -> Result<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM vehicles", [], |row| row.get(0))?)
    }

    fn remove_image_files(&self, paths: &[String]) {
        for path in paths {
            self.images.remove(path);
        }
    }

    // ── Image sub-resource ─────────────────────────────────────────────

    /// Images of a vehicle, in display order
    pub fn list_images(&self, vehicle_id: &str) -> Result<Vec<ImageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, vehicle_id, image_url, image_path, is_primary, sort_order, created_at
             FROM vehicle_images
             WHERE vehicle_id = ?1
             ORDER BY sort_order ASC, created_at ASC",
        )?;

        let images = stmt
            .query_map(params![vehicle_id], image_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(images)
    }

    fn get_image(&self, image_id: &str) -> Result<Option<ImageRecord>> {
        let image = self
            .conn
            .query_row(
                "SELECT id, vehicle_id, image_url, image_path, is_primary, sort_order, created_at
                 FROM vehicle_images WHERE id = ?1",
                params![image_id],
                image_from_row,
            )
            .optional()?;
        Ok(image)
    }

    /// Store an uploaded image for a vehicle
    ///
    /// When `is_primary` is set, any previous primary image of the vehicle is
    /// unset in the same transaction.
    pub fn upload_image(
        &mut self,
        vehicle_id: &str,
        file_name: &str,
        bytes: &[u8],
        is_primary: bool,
        sort_order: i64,
    ) -> Result<ImageRecord> {
        if self.get_by_id(vehicle_id)?.is_none() {
            return Err(CatalogError::NotFound(vehicle_id.to_string()));
        }

        let image_id = Uuid::new_v4().to_string();
        let stored = self.images.save(vehicle_id, &image_id, file_name, bytes)?;
        let record = ImageRecord {
            id: image_id,
            vehicle_id: vehicle_id.to_string(),
            image_url: stored.url,
            image_path: stored.path,
            is_primary,
            sort_order,
            created_at: chrono::Utc::now().to_rfc3339(),
        };

        let result = (|| -> Result<()> {
            let tx = self.conn.transaction()?;
            if record.is_primary {
                tx.execute(
                    "UPDATE vehicle_images SET is_primary = 0 WHERE vehicle_id = ?1",
                    params![vehicle_id],
                )?;
            }
            tx.execute(
                "INSERT INTO vehicle_images
                 (id, vehicle_id, image_url, image_path, is_primary, sort_order, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &record.id,
                    &record.vehicle_id,
                    &record.image_url,
                    &record.image_path,
                    record.is_primary,
                    record.sort_order,
                    &record.created_at,
                ],
            )?;
            tx.commit()?;
            Ok(())
        })();

        if let Err(e) = result {
            // Don't leave an orphaned file behind
            self.images.remove(&record.image_path);
            return Err(e);
        }

        log::info!("Uploaded image {} for vehicle {}", record.id, vehicle_id);
        Ok(record)
    }

    /// Remove an image row and its file, returning the removed image
    pub fn delete_image(&mut self, image_id: &str) -> Result<ImageRecord> {
        let image = self
            .get_image(image_id)?
            .ok_or_else(|| CatalogError::NotFound(image_id.to_string()))?;

        self.conn
            .execute("DELETE FROM vehicle_images WHERE id = ?1", params![image_id])?;
        self.images.remove(&image.image_path);

        log::info!("Deleted image {} of vehicle {}", image_id, image.vehicle_id);
        Ok(image)
    }

    /// Make `image_id` the only primary image of `vehicle_id`
    pub fn set_primary_image(&mut self, image_id: &str, vehicle_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT vehicle_id FROM vehicle_images WHERE id = ?1",
                params![image_id],
                |row| row.get(0),
            )
            .optional()?;
        if owner.as_deref() != Some(vehicle_id) {
            return Err(CatalogError::NotFound(format!(
                "image {} of vehicle {}",
                image_id, vehicle_id
            )));
        }

        tx.execute(
            "UPDATE vehicle_images SET is_primary = (id = ?1) WHERE vehicle_id = ?2",
            params![image_id, vehicle_id],
        )?;
        tx.commit()?;

        log::debug!("Image {} is now primary for vehicle {}", image_id, vehicle_id);
        Ok(())
    }

    /// Move an image within its vehicle's gallery
    pub fn update_image_order(&mut self, image_id: &str, sort_order: i64) -> Result<ImageRecord> {
        let mut image = self
            .get_image(image_id)?
            .ok_or_else(|| CatalogError::NotFound(image_id.to_string()))?;

        self.conn.execute(
            "UPDATE vehicle_images SET sort_order = ?1 WHERE id = ?2",
            params![sort_order, image_id],
        )?;
        image.sort_order = sort_order;

        log::debug!("Image {} moved to position {}", image_id, sort_order);
        Ok(image)
    }
}

impl CatalogBackend for SqliteCatalog {
    fn load_catalog(&self) -> Result<Vec<VehicleRecord>> {
        let sql = format!(
            "SELECT {} FROM vehicles ORDER BY position ASC",
            VEHICLE_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut vehicles = stmt
            .query_map([], vehicle_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut uploaded = uploaded_image_urls(&self.conn, None)?;
        for vehicle in &mut vehicles {
            if let Some(urls) = uploaded.remove(&vehicle.id) {
                attach_uploaded(vehicle, urls);
            }
        }
        Ok(vehicles)
    }

    /// Upserts every record in list order, deletes vehicles no longer listed
    /// together with their images and records retired seed ids, all in one
    /// transaction.
    fn save_catalog_retiring(
        &mut self,
        records: &[VehicleRecord],
        retired: &[String],
    ) -> Result<()> {
        let keep: HashSet<&str> = records.iter().map(|v| v.id.as_str()).collect();

        let tx = self.conn.transaction()?;

        {
            let mut stmt =
                tx.prepare_cached("INSERT OR IGNORE INTO retired_seed_ids (id) VALUES (?1)")?;
            for id in retired {
                stmt.execute(params![id])?;
            }
        }

        let existing: Vec<String> = {
            let mut stmt = tx.prepare_cached("SELECT id FROM vehicles")?;
            let ids = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            ids
        };

        let mut orphaned_files = Vec::new();
        for id in existing.iter().filter(|id| !keep.contains(id.as_str())) {
            let (_, paths) = delete_vehicle_tx(&tx, id)?;
            orphaned_files.extend(paths);
        }

        for (position, record) in records.iter().enumerate() {
            upsert_vehicle_tx(&tx, record, position as i64)?;
        }

        tx.commit()?;
        self.remove_image_files(&orphaned_files);

        if !retired.is_empty() {
            log::info!("Retired seed vehicles: {}", retired.join(", "));
        }
        log::debug!("Saved catalog of {} vehicles", records.len());
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<Option<VehicleRecord>> {
        let sql = format!("SELECT {} FROM vehicles WHERE id = ?1", VEHICLE_COLUMNS);
        let mut vehicle = self
            .conn
            .query_row(&sql, params![id], vehicle_from_row)
            .optional()?;

        if let Some(vehicle) = vehicle.as_mut() {
            if let Some(urls) = uploaded_image_urls(&self.conn, Some(id))?.remove(id) {
                attach_uploaded(vehicle, urls);
            }
        }
        Ok(vehicle)
    }

    /// New records are appended after the last position
    fn upsert(&mut self, record: &VehicleRecord) -> Result<()> {
        let tx = self.conn.transaction()?;
        let position: i64 = tx.query_row(
            "SELECT COALESCE(
                (SELECT position FROM vehicles WHERE id = ?1),
                (SELECT COALESCE(MAX(position) + 1, 0) FROM vehicles))",
            params![&record.id],
            |row| row.get(0),
        )?;
        upsert_vehicle_tx(&tx, record, position)?;
        tx.commit()?;
        Ok(())
    }

    fn delete_by_id(&mut self, id: &str) -> Result<bool> {
        let tx = self.conn.transaction()?;
        let (deleted, paths) = delete_vehicle_tx(&tx, id)?;
        tx.commit()?;
        self.remove_image_files(&paths);
        Ok(deleted)
    }

    fn retired_seed_ids(&self) -> Result<HashSet<String>> {
        let mut stmt = self.conn.prepare("SELECT id FROM retired_seed_ids")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<HashSet<String>>>()?;
        Ok(ids)
    }

}
