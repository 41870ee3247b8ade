use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::version::checker::{ModResolution, ResolutionStorer, VisibilityStatus};
use crate::version::dependency::ResolvedDependency;
use crate::version::error::CacheError;
use crate::version::types::EngineVersion;

/// Snapshot name under which the engine catalog's refresh time is recorded
const ENGINE_SNAPSHOT: &str = "engine_versions";

pub struct Cache {
    conn: Mutex<Connection>,
    refresh_interval: i64,
    resolution_timeout: i64,
}

impl Cache {
    pub fn new(
        db_path: &Path,
        refresh_interval: i64,
        resolution_timeout: i64,
    ) -> Result<Self, CacheError> {
        info!("Initializing cache database at {:?}", db_path);

        let conn = Connection::open(db_path)?;

        // Enable WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        debug!("Database connection established");

        let cache = Self {
            conn: Mutex::new(conn),
            refresh_interval,
            resolution_timeout,
        };

        cache.create_schema()?;
        info!("Cache initialized successfully");

        Ok(cache)
    }

    /// Acquire database connection lock with proper error handling
    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn.lock().map_err(|_| CacheError::LockPoisoned)
    }

    /// Get current timestamp in milliseconds since UNIX epoch
    fn current_timestamp_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn create_schema(&self) -> Result<(), CacheError> {
        debug!("Creating database schema");

        let conn = self.lock_conn()?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS snapshots (
                name TEXT PRIMARY KEY,
                updated_at INTEGER NOT NULL
            )
            "#,
            [],
        )?;

        // Versions are not unique: the catalog tolerates duplicates
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS engine_versions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                position INTEGER NOT NULL,
                version TEXT NOT NULL,
                color_class TEXT,
                link TEXT
            )
            "#,
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS resolutions (
                mod_id TEXT PRIMARY KEY,
                latest_version TEXT,
                latest_engine_version TEXT,
                latest_updated_version TEXT,
                total_downloads INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'noEligibleVersion',
                resolved_at INTEGER NOT NULL,
                resolving_since INTEGER
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resolved_at ON resolutions(resolved_at)",
            [],
        )?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS resolved_dependencies (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mod_id TEXT NOT NULL,
                mod_version TEXT NOT NULL,
                dependency_mod_id TEXT NOT NULL,
                constraint_text TEXT NOT NULL,
                matching_versions TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_resolved_dependencies_mod_id ON resolved_dependencies(mod_id)",
            [],
        )?;

        debug!("Database schema created successfully");
        Ok(())
    }

    /// Get the resolved dependencies stored for a mod, in insertion order
    pub fn get_resolved_dependencies(
        &self,
        mod_id: &str,
    ) -> Result<Vec<ResolvedDependency>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT mod_version, dependency_mod_id, constraint_text, matching_versions
            FROM resolved_dependencies
            WHERE mod_id = ?1
            ORDER BY id
            "#,
        )?;

        let rows = stmt
            .query_map([mod_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(
                |(mod_version, dependency_mod_id, constraint, matching_versions)| {
                    Ok(ResolvedDependency {
                        mod_version,
                        dependency_mod_id,
                        constraint,
                        matching_versions: serde_json::from_str(&matching_versions)?,
                    })
                },
            )
            .collect()
    }

    /// Ids of mods whose stored summary says they are publicly listed
    pub fn indexed_mod_ids(&self) -> Result<Vec<String>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn.prepare(
            "SELECT mod_id FROM resolutions WHERE status = ?1 AND resolved_at > 0 ORDER BY mod_id",
        )?;

        let ids = stmt
            .query_map([VisibilityStatus::Indexed.as_str()], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(ids)
    }
}

impl ResolutionStorer for Cache {
    fn get_engine_versions(&self) -> Result<Vec<EngineVersion>, CacheError> {
        let conn = self.lock_conn()?;
        let mut stmt = conn
            .prepare("SELECT version, color_class, link FROM engine_versions ORDER BY position")?;

        let versions = stmt
            .query_map([], |row| {
                Ok(EngineVersion {
                    version: row.get(0)?,
                    color_class: row.get(1)?,
                    link: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    fn replace_engine_versions(&self, versions: Vec<EngineVersion>) -> Result<(), CacheError> {
        debug!("Saving {} engine versions", versions.len());

        let now = Self::current_timestamp_ms();

        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute("DELETE FROM engine_versions", [])?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO engine_versions (position, version, color_class, link) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, version) in versions.iter().enumerate() {
                stmt.execute((
                    position as i64,
                    &version.version,
                    &version.color_class,
                    &version.link,
                ))?;
            }
        }

        tx.execute(
            r#"
            INSERT INTO snapshots (name, updated_at) VALUES (?1, ?2)
            ON CONFLICT(name) DO UPDATE SET updated_at = excluded.updated_at
            "#,
            (ENGINE_SNAPSHOT, now),
        )?;

        tx.commit()?;

        debug!("Successfully saved engine versions");
        Ok(())
    }

    fn catalog_needs_refresh(&self) -> Result<bool, CacheError> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            "SELECT updated_at FROM snapshots WHERE name = ?1",
            [ENGINE_SNAPSHOT],
            |row| row.get::<_, i64>(0),
        );

        match result {
            Ok(updated_at) => {
                let threshold = Self::current_timestamp_ms() - self.refresh_interval;
                Ok(updated_at < threshold)
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    fn try_start_resolution(&self, mod_id: &str) -> Result<bool, CacheError> {
        let now = Self::current_timestamp_ms();
        let timeout_threshold = now - self.resolution_timeout;

        let conn = self.lock_conn()?;

        // Take the lock if nobody holds it or the holder timed out
        let rows_affected = conn.execute(
            r#"
            UPDATE resolutions
            SET resolving_since = ?1
            WHERE mod_id = ?2
              AND (resolving_since IS NULL OR resolving_since < ?3)
            "#,
            (now, mod_id, timeout_threshold),
        )?;

        if rows_affected > 0 {
            return Ok(true);
        }

        // Mod might not exist yet - only the first inserter gets the lock.
        // resolved_at = 0 marks the row as never resolved.
        let rows_inserted = conn.execute(
            r#"
            INSERT OR IGNORE INTO resolutions (mod_id, resolved_at, resolving_since)
            VALUES (?1, 0, ?2)
            "#,
            (mod_id, now),
        )?;

        Ok(rows_inserted > 0)
    }

    fn finish_resolution(&self, mod_id: &str) -> Result<(), CacheError> {
        let conn = self.lock_conn()?;

        conn.execute(
            "UPDATE resolutions SET resolving_since = NULL WHERE mod_id = ?1",
            [mod_id],
        )?;

        Ok(())
    }

    fn save_resolution(&self, resolution: &ModResolution) -> Result<(), CacheError> {
        debug!(
            "Saving resolution for {}: {}",
            resolution.mod_id,
            resolution.status.as_str()
        );

        let now = Self::current_timestamp_ms();
        let total_downloads = i64::try_from(resolution.total_downloads).unwrap_or(i64::MAX);

        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO resolutions (
                mod_id, latest_version, latest_engine_version, latest_updated_version,
                total_downloads, status, resolved_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(mod_id) DO UPDATE SET
                latest_version = excluded.latest_version,
                latest_engine_version = excluded.latest_engine_version,
                latest_updated_version = excluded.latest_updated_version,
                total_downloads = excluded.total_downloads,
                status = excluded.status,
                resolved_at = excluded.resolved_at
            "#,
            (
                &resolution.mod_id,
                &resolution.latest_version,
                &resolution.latest_engine_version,
                &resolution.latest_updated_version,
                total_downloads,
                resolution.status.as_str(),
                now,
            ),
        )?;

        Ok(())
    }

    fn get_resolution(&self, mod_id: &str) -> Result<Option<ModResolution>, CacheError> {
        let conn = self.lock_conn()?;
        let result = conn.query_row(
            r#"
            SELECT latest_version, latest_engine_version, latest_updated_version,
                   total_downloads, status
            FROM resolutions
            WHERE mod_id = ?1 AND resolved_at > 0
            "#,
            [mod_id],
            |row| {
                Ok((
                    row.get::<_, Option<String>>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        );

        let (latest_version, latest_engine_version, latest_updated_version, downloads, status) =
            match result {
                Ok(row) => row,
                Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                Err(e) => return Err(e.into()),
            };

        let status = status
            .parse::<VisibilityStatus>()
            .map_err(|e| CacheError::Corrupt(format!("{e} for mod {mod_id}")))?;

        Ok(Some(ModResolution {
            mod_id: mod_id.to_string(),
            latest_version,
            latest_engine_version,
            latest_updated_version,
            total_downloads: u64::try_from(downloads).unwrap_or(0),
            status,
        }))
    }

    fn replace_resolved_dependencies(
        &self,
        mod_id: &str,
        dependencies: &[ResolvedDependency],
    ) -> Result<(), CacheError> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        tx.execute(
            "DELETE FROM resolved_dependencies WHERE mod_id = ?1",
            [mod_id],
        )?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO resolved_dependencies
                    (mod_id, mod_version, dependency_mod_id, constraint_text, matching_versions)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
            )?;
            for dependency in dependencies {
                let matching = serde_json::to_string(&dependency.matching_versions)?;
                stmt.execute((
                    mod_id,
                    &dependency.mod_version,
                    &dependency.dependency_mod_id,
                    &dependency.constraint,
                    matching,
                ))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    fn get_mods_needing_refresh(&self) -> Result<Vec<String>, CacheError> {
        let threshold = Self::current_timestamp_ms() - self.refresh_interval;

        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT mod_id FROM resolutions WHERE resolved_at < ?1 ORDER BY mod_id")?;

        let mods = stmt
            .query_map([threshold], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;

        Ok(mods)
    }
}
