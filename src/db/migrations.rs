// Database migrations
// Migrations are forward-only. Never edit or delete a migration after it ships.

use rusqlite::Connection;
use anyhow::Result;

/// All migrations in order. Each migration is a SQL string.
const MIGRATIONS: &[&str] = &[
    // Migration 1: Loads table
    r#"
    CREATE TABLE loads (
        id INTEGER PRIMARY KEY AUTOINCREMENT,

        test_weapon TEXT,
        caliber TEXT NOT NULL CHECK (length(trim(caliber)) > 0),

        bullet_manufacturer TEXT,
        bullet_type TEXT,
        bullet_weight_grains REAL CHECK (bullet_weight_grains IS NULL OR bullet_weight_grains > 0),
        bullet_weight_grams REAL,
        bullet_diameter_inches REAL,
        bullet_diameter_mm REAL,

        powder_manufacturer TEXT,
        powder_type TEXT,
        charge_weight_grains REAL CHECK (charge_weight_grains IS NULL OR charge_weight_grains >= 0),

        primer_manufacturer TEXT,
        primer_type TEXT,

        case_manufacturer TEXT,
        total_cartridge_length_mm REAL,
        free_travel_mm REAL,

        velocity_ms REAL CHECK (velocity_ms IS NULL OR velocity_ms >= 0),
        velocity_sd REAL,
        velocity_es REAL,
        group_size_mm REAL,
        distance_meters REAL,
        tested_date TEXT,

        temperature_celsius REAL,
        humidity_percent REAL,
        barrel_length_inches REAL,
        twist_rate TEXT,

        loading_date TEXT,
        cartridges_loaded INTEGER,
        batch_number TEXT,
        group_photo_path TEXT,

        notes TEXT,
        -- NULL is tolerated and counts as non-user for reconciliation
        source TEXT DEFAULT 'user',
        in_my_collection INTEGER NOT NULL DEFAULT 0,

        search_text TEXT NOT NULL DEFAULT '',
        created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );

    CREATE INDEX idx_loads_caliber ON loads(caliber);
    CREATE INDEX idx_loads_source ON loads(source);
    CREATE INDEX idx_loads_bullet_weight ON loads(bullet_weight_grains);
    CREATE INDEX idx_loads_powder_type ON loads(powder_type);
    CREATE INDEX idx_loads_created_at ON loads(created_at);
    "#,

    // Migration 2: Preset lists for form autocomplete
    r#"
    CREATE TABLE caliber_presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE bullet_brand_presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE powder_manufacturer_presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    );

    CREATE TABLE powder_type_presets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        manufacturer TEXT NOT NULL,
        name TEXT NOT NULL,
        UNIQUE(manufacturer, name)
    );
    CREATE INDEX idx_powder_type_presets_manufacturer ON powder_type_presets(manufacturer);

    INSERT INTO caliber_presets (name) VALUES
        ('.223 Remington'), ('.243 Winchester'), ('.270 Winchester'), ('.308 Winchester'),
        ('.30-06 Springfield'), ('.338 Lapua Magnum'), ('6.5 Creedmoor'), ('6.5x55 SE'),
        ('7mm-08 Remington'), ('9.3x62');

    INSERT INTO bullet_brand_presets (name) VALUES
        ('Barnes'), ('Berger'), ('Hornady'), ('Lapua'), ('Norma'), ('Nosler'), ('Sako'), ('Sierra');

    INSERT INTO powder_manufacturer_presets (name) VALUES
        ('Alliant'), ('Hodgdon'), ('IMR'), ('Norma'), ('Vihtavuori');

    INSERT INTO powder_type_presets (manufacturer, name) VALUES
        ('Alliant', 'Reloder 15'), ('Alliant', 'Reloder 16'), ('Alliant', 'Reloder 22'),
        ('Hodgdon', 'H4350'), ('Hodgdon', 'H4895'), ('Hodgdon', 'Varget'),
        ('IMR', 'IMR 4064'), ('IMR', 'IMR 4350'),
        ('Norma', 'Norma 203B'), ('Norma', 'Norma 204'),
        ('Vihtavuori', 'N140'), ('Vihtavuori', 'N150'), ('Vihtavuori', 'N160'), ('Vihtavuori', 'N550');
    "#,
];

/// Get current schema version from database
fn get_schema_version(conn: &Connection) -> Result<u32> {
    let version: u32 = conn.query_row(
        "PRAGMA user_version",
        [],
        |row| row.get(0)
    )?;
    Ok(version)
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    let target_version = MIGRATIONS.len() as u32;

    // Refuse to open a DB created by a newer build
    if current_version > target_version {
        anyhow::bail!(
            "Database schema version {} is newer than this build supports (max {}). Please upgrade Loadbook.",
            current_version,
            target_version
        );
    }

    if current_version == target_version {
        return Ok(());
    }

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let migration_version = (i + 1) as u32;
        if migration_version <= current_version {
            continue;
        }

        // Each migration and its version bump commit together
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(migration)?;
        tx.execute_batch(&format!("PRAGMA user_version = {}", migration_version))?;
        tx.commit()?;

        log::info!("Applied migration {}", migration_version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), MIGRATIONS.len() as u32);
    }

    #[test]
    fn newer_schema_is_refused() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA user_version = 99").unwrap();
        let err = run_migrations(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than this build supports"));
    }

    #[test]
    fn empty_caliber_is_rejected_by_schema() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        let result = conn.execute("INSERT INTO loads (caliber) VALUES ('   ')", []);
        assert!(result.is_err());
    }
}
