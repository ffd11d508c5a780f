// Preset lists for form autocomplete

use rusqlite::{params_from_iter, Connection};

use crate::error::Result;

fn collect_names(conn: &Connection, sql: &str, manufacturer: Option<&str>) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(manufacturer), |row| row.get::<_, String>(0))?;

    let mut names = Vec::new();
    for name in rows {
        names.push(name?);
    }
    Ok(names)
}

pub fn get_caliber_presets(conn: &Connection) -> Result<Vec<String>> {
    collect_names(conn, "SELECT name FROM caliber_presets ORDER BY name", None)
}

pub fn get_bullet_brand_presets(conn: &Connection) -> Result<Vec<String>> {
    collect_names(conn, "SELECT name FROM bullet_brand_presets ORDER BY name", None)
}

pub fn get_powder_manufacturer_presets(conn: &Connection) -> Result<Vec<String>> {
    collect_names(conn, "SELECT name FROM powder_manufacturer_presets ORDER BY name", None)
}

/// Powder types for one manufacturer, or every known type when none is given.
pub fn get_powder_type_presets(conn: &Connection, manufacturer: Option<&str>) -> Result<Vec<String>> {
    match manufacturer.filter(|m| !m.is_empty()) {
        Some(m) => collect_names(
            conn,
            "SELECT name FROM powder_type_presets WHERE manufacturer = ?1 ORDER BY name",
            Some(m),
        ),
        None => collect_names(conn, "SELECT DISTINCT name FROM powder_type_presets ORDER BY name", None),
    }
}
