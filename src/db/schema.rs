// Database schema types and query helpers

use std::fmt;

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::constants::{DISTINCT_COLUMNS, SOURCE_IMPORTED, SOURCE_USER};
use crate::error::{LoadbookError, Result};

// ----- Source classification -----

/// Provenance of a load. `User` marks manually authored records; every other
/// label is imported data and may be replaced by a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    User,
    Imported(String),
}

impl Source {
    /// The default label for spreadsheet rows.
    pub fn imported() -> Self {
        Source::Imported(SOURCE_IMPORTED.to_string())
    }

    pub fn parse(label: &str) -> Self {
        if label == SOURCE_USER {
            Source::User
        } else {
            Source::Imported(label.to_string())
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Source::User => SOURCE_USER,
            Source::Imported(label) => label,
        }
    }

    pub fn is_user(&self) -> bool {
        matches!(self, Source::User)
    }
}

impl Default for Source {
    fn default() -> Self {
        Source::User
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Source {
    fn from(label: String) -> Self {
        if label == SOURCE_USER {
            Source::User
        } else {
            Source::Imported(label)
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        match source {
            Source::User => SOURCE_USER.to_string(),
            Source::Imported(label) => label,
        }
    }
}

impl ToSql for Source {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Source {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(Source::parse)
    }
}

// ----- Load -----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Load {
    pub id: i64,
    pub test_weapon: Option<String>,
    pub caliber: String,
    pub bullet_manufacturer: Option<String>,
    pub bullet_type: Option<String>,
    pub bullet_weight_grains: Option<f64>,
    pub bullet_weight_grams: Option<f64>,
    pub bullet_diameter_inches: Option<f64>,
    pub bullet_diameter_mm: Option<f64>,
    pub powder_manufacturer: Option<String>,
    pub powder_type: Option<String>,
    pub charge_weight_grains: Option<f64>,
    pub primer_manufacturer: Option<String>,
    pub primer_type: Option<String>,
    pub case_manufacturer: Option<String>,
    pub total_cartridge_length_mm: Option<f64>,
    pub free_travel_mm: Option<f64>,
    pub velocity_ms: Option<f64>,
    pub velocity_sd: Option<f64>,
    pub velocity_es: Option<f64>,
    pub group_size_mm: Option<f64>,
    pub distance_meters: Option<f64>,
    pub tested_date: Option<String>,
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub barrel_length_inches: Option<f64>,
    pub twist_rate: Option<String>,
    pub loading_date: Option<String>,
    pub cartridges_loaded: Option<i64>,
    pub batch_number: Option<String>,
    pub group_photo_path: Option<String>,
    pub notes: Option<String>,
    /// `None` only for rows written outside this crate with a NULL source.
    pub source: Option<Source>,
    pub in_my_collection: bool,
    pub search_text: String,
    pub created_at: String,
}

/// Writable fields of a load. Used for create, update, import and preview.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadInput {
    pub test_weapon: Option<String>,
    pub caliber: String,
    pub bullet_manufacturer: Option<String>,
    pub bullet_type: Option<String>,
    pub bullet_weight_grains: Option<f64>,
    pub bullet_weight_grams: Option<f64>,
    pub bullet_diameter_inches: Option<f64>,
    pub bullet_diameter_mm: Option<f64>,
    pub powder_manufacturer: Option<String>,
    pub powder_type: Option<String>,
    pub charge_weight_grains: Option<f64>,
    pub primer_manufacturer: Option<String>,
    pub primer_type: Option<String>,
    pub case_manufacturer: Option<String>,
    pub total_cartridge_length_mm: Option<f64>,
    pub free_travel_mm: Option<f64>,
    pub velocity_ms: Option<f64>,
    pub velocity_sd: Option<f64>,
    pub velocity_es: Option<f64>,
    pub group_size_mm: Option<f64>,
    pub distance_meters: Option<f64>,
    pub tested_date: Option<String>,
    pub temperature_celsius: Option<f64>,
    pub humidity_percent: Option<f64>,
    pub barrel_length_inches: Option<f64>,
    pub twist_rate: Option<String>,
    pub loading_date: Option<String>,
    pub cartridges_loaded: Option<i64>,
    pub batch_number: Option<String>,
    pub group_photo_path: Option<String>,
    pub notes: Option<String>,
    pub source: Option<Source>,
    pub in_my_collection: bool,
}

impl LoadInput {
    pub fn new(caliber: impl Into<String>) -> Self {
        Self {
            caliber: caliber.into(),
            ..Default::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.caliber.trim().is_empty() {
            return Err(LoadbookError::Validation("Caliber is required".to_string()));
        }
        Ok(())
    }

    /// Lowercase haystack for the `search` filter. An unclassified load
    /// contributes no source label.
    pub fn search_text(&self) -> String {
        let parts = [
            Some(self.caliber.as_str()),
            self.test_weapon.as_deref(),
            self.bullet_manufacturer.as_deref(),
            self.bullet_type.as_deref(),
            self.powder_manufacturer.as_deref(),
            self.powder_type.as_deref(),
            self.primer_manufacturer.as_deref(),
            self.primer_type.as_deref(),
            self.case_manufacturer.as_deref(),
            self.batch_number.as_deref(),
            self.notes.as_deref(),
            self.source.as_ref().map(Source::as_str),
        ];
        parts
            .iter()
            .flatten()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl From<&Load> for LoadInput {
    fn from(load: &Load) -> Self {
        Self {
            test_weapon: load.test_weapon.clone(),
            caliber: load.caliber.clone(),
            bullet_manufacturer: load.bullet_manufacturer.clone(),
            bullet_type: load.bullet_type.clone(),
            bullet_weight_grains: load.bullet_weight_grains,
            bullet_weight_grams: load.bullet_weight_grams,
            bullet_diameter_inches: load.bullet_diameter_inches,
            bullet_diameter_mm: load.bullet_diameter_mm,
            powder_manufacturer: load.powder_manufacturer.clone(),
            powder_type: load.powder_type.clone(),
            charge_weight_grains: load.charge_weight_grains,
            primer_manufacturer: load.primer_manufacturer.clone(),
            primer_type: load.primer_type.clone(),
            case_manufacturer: load.case_manufacturer.clone(),
            total_cartridge_length_mm: load.total_cartridge_length_mm,
            free_travel_mm: load.free_travel_mm,
            velocity_ms: load.velocity_ms,
            velocity_sd: load.velocity_sd,
            velocity_es: load.velocity_es,
            group_size_mm: load.group_size_mm,
            distance_meters: load.distance_meters,
            tested_date: load.tested_date.clone(),
            temperature_celsius: load.temperature_celsius,
            humidity_percent: load.humidity_percent,
            barrel_length_inches: load.barrel_length_inches,
            twist_rate: load.twist_rate.clone(),
            loading_date: load.loading_date.clone(),
            cartridges_loaded: load.cartridges_loaded,
            batch_number: load.batch_number.clone(),
            group_photo_path: load.group_photo_path.clone(),
            notes: load.notes.clone(),
            source: load.source.clone(),
            in_my_collection: load.in_my_collection,
        }
    }
}

pub const LOAD_COLUMNS: &str = "id, test_weapon, caliber,
    bullet_manufacturer, bullet_type, bullet_weight_grains, bullet_weight_grams,
    bullet_diameter_inches, bullet_diameter_mm,
    powder_manufacturer, powder_type, charge_weight_grains,
    primer_manufacturer, primer_type,
    case_manufacturer, total_cartridge_length_mm, free_travel_mm,
    velocity_ms, velocity_sd, velocity_es, group_size_mm, distance_meters, tested_date,
    temperature_celsius, humidity_percent, barrel_length_inches, twist_rate,
    loading_date, cartridges_loaded, batch_number, group_photo_path,
    notes, source, in_my_collection, search_text, created_at";

pub(crate) fn map_load(row: &rusqlite::Row) -> rusqlite::Result<Load> {
    Ok(Load {
        id: row.get("id")?,
        test_weapon: row.get("test_weapon")?,
        caliber: row.get("caliber")?,
        bullet_manufacturer: row.get("bullet_manufacturer")?,
        bullet_type: row.get("bullet_type")?,
        bullet_weight_grains: row.get("bullet_weight_grains")?,
        bullet_weight_grams: row.get("bullet_weight_grams")?,
        bullet_diameter_inches: row.get("bullet_diameter_inches")?,
        bullet_diameter_mm: row.get("bullet_diameter_mm")?,
        powder_manufacturer: row.get("powder_manufacturer")?,
        powder_type: row.get("powder_type")?,
        charge_weight_grains: row.get("charge_weight_grains")?,
        primer_manufacturer: row.get("primer_manufacturer")?,
        primer_type: row.get("primer_type")?,
        case_manufacturer: row.get("case_manufacturer")?,
        total_cartridge_length_mm: row.get("total_cartridge_length_mm")?,
        free_travel_mm: row.get("free_travel_mm")?,
        velocity_ms: row.get("velocity_ms")?,
        velocity_sd: row.get("velocity_sd")?,
        velocity_es: row.get("velocity_es")?,
        group_size_mm: row.get("group_size_mm")?,
        distance_meters: row.get("distance_meters")?,
        tested_date: row.get("tested_date")?,
        temperature_celsius: row.get("temperature_celsius")?,
        humidity_percent: row.get("humidity_percent")?,
        barrel_length_inches: row.get("barrel_length_inches")?,
        twist_rate: row.get("twist_rate")?,
        loading_date: row.get("loading_date")?,
        cartridges_loaded: row.get("cartridges_loaded")?,
        batch_number: row.get("batch_number")?,
        group_photo_path: row.get("group_photo_path")?,
        notes: row.get("notes")?,
        source: row.get("source")?,
        in_my_collection: row.get::<_, i64>("in_my_collection")? != 0,
        search_text: row.get("search_text")?,
        created_at: row.get("created_at")?,
    })
}

/// Insert a load and return its id. A missing source is stored as `user`.
pub fn insert_load(conn: &Connection, input: &LoadInput) -> Result<i64> {
    input.validate()?;
    let source = input.source.clone().unwrap_or_default();
    let search_text = LoadInput { source: Some(source.clone()), ..input.clone() }.search_text();

    conn.execute(
        "INSERT INTO loads (
            test_weapon, caliber,
            bullet_manufacturer, bullet_type, bullet_weight_grains, bullet_weight_grams,
            bullet_diameter_inches, bullet_diameter_mm,
            powder_manufacturer, powder_type, charge_weight_grains,
            primer_manufacturer, primer_type,
            case_manufacturer, total_cartridge_length_mm, free_travel_mm,
            velocity_ms, velocity_sd, velocity_es, group_size_mm, distance_meters, tested_date,
            temperature_celsius, humidity_percent, barrel_length_inches, twist_rate,
            loading_date, cartridges_loaded, batch_number, group_photo_path,
            notes, source, in_my_collection, search_text
        ) VALUES (
            ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
            ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26, ?27, ?28, ?29, ?30, ?31, ?32, ?33, ?34
        )",
        params![
            input.test_weapon,
            input.caliber.trim(),
            input.bullet_manufacturer,
            input.bullet_type,
            input.bullet_weight_grains,
            input.bullet_weight_grams,
            input.bullet_diameter_inches,
            input.bullet_diameter_mm,
            input.powder_manufacturer,
            input.powder_type,
            input.charge_weight_grains,
            input.primer_manufacturer,
            input.primer_type,
            input.case_manufacturer,
            input.total_cartridge_length_mm,
            input.free_travel_mm,
            input.velocity_ms,
            input.velocity_sd,
            input.velocity_es,
            input.group_size_mm,
            input.distance_meters,
            input.tested_date,
            input.temperature_celsius,
            input.humidity_percent,
            input.barrel_length_inches,
            input.twist_rate,
            input.loading_date,
            input.cartridges_loaded,
            input.batch_number,
            input.group_photo_path,
            input.notes,
            source,
            input.in_my_collection,
            search_text,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_load(conn: &Connection, id: i64) -> Result<Option<Load>> {
    let sql = format!("SELECT {} FROM loads WHERE id = ?1", LOAD_COLUMNS);
    let result = conn.query_row(&sql, params![id], map_load).optional()?;
    Ok(result)
}

/// Replace every descriptive field of a load. Provenance (`source`) and the
/// collection flag are left as stored. Returns false when the id is unknown.
pub fn update_load(conn: &Connection, id: i64, input: &LoadInput) -> Result<bool> {
    input.validate()?;

    let existing = match get_load(conn, id)? {
        Some(load) => load,
        None => return Ok(false),
    };
    let search_text = LoadInput { source: existing.source.clone(), ..input.clone() }.search_text();

    let changed = conn.execute(
        "UPDATE loads SET
            test_weapon = ?1,
            caliber = ?2,
            bullet_manufacturer = ?3,
            bullet_type = ?4,
            bullet_weight_grains = ?5,
            bullet_weight_grams = ?6,
            bullet_diameter_inches = ?7,
            bullet_diameter_mm = ?8,
            powder_manufacturer = ?9,
            powder_type = ?10,
            charge_weight_grains = ?11,
            primer_manufacturer = ?12,
            primer_type = ?13,
            case_manufacturer = ?14,
            total_cartridge_length_mm = ?15,
            free_travel_mm = ?16,
            velocity_ms = ?17,
            velocity_sd = ?18,
            velocity_es = ?19,
            group_size_mm = ?20,
            distance_meters = ?21,
            tested_date = ?22,
            temperature_celsius = ?23,
            humidity_percent = ?24,
            barrel_length_inches = ?25,
            twist_rate = ?26,
            loading_date = ?27,
            cartridges_loaded = ?28,
            batch_number = ?29,
            group_photo_path = ?30,
            notes = ?31,
            search_text = ?32
         WHERE id = ?33",
        params![
            input.test_weapon,
            input.caliber.trim(),
            input.bullet_manufacturer,
            input.bullet_type,
            input.bullet_weight_grains,
            input.bullet_weight_grams,
            input.bullet_diameter_inches,
            input.bullet_diameter_mm,
            input.powder_manufacturer,
            input.powder_type,
            input.charge_weight_grains,
            input.primer_manufacturer,
            input.primer_type,
            input.case_manufacturer,
            input.total_cartridge_length_mm,
            input.free_travel_mm,
            input.velocity_ms,
            input.velocity_sd,
            input.velocity_es,
            input.group_size_mm,
            input.distance_meters,
            input.tested_date,
            input.temperature_celsius,
            input.humidity_percent,
            input.barrel_length_inches,
            input.twist_rate,
            input.loading_date,
            input.cartridges_loaded,
            input.batch_number,
            input.group_photo_path,
            input.notes,
            search_text,
            id,
        ],
    )?;
    Ok(changed > 0)
}

pub fn delete_load(conn: &Connection, id: i64) -> Result<bool> {
    let changed = conn.execute("DELETE FROM loads WHERE id = ?1", params![id])?;
    Ok(changed > 0)
}

// ----- My collection -----

pub fn set_in_collection(conn: &Connection, id: i64, in_collection: bool) -> Result<bool> {
    let changed = conn.execute(
        "UPDATE loads SET in_my_collection = ?1 WHERE id = ?2",
        params![in_collection, id],
    )?;
    Ok(changed > 0)
}

/// Flip the collection flag. Returns the new value, or None for an unknown id.
pub fn toggle_in_collection(conn: &Connection, id: i64) -> Result<Option<bool>> {
    let current: Option<bool> = conn
        .query_row(
            "SELECT in_my_collection FROM loads WHERE id = ?1",
            params![id],
            |row| Ok(row.get::<_, i64>(0)? != 0),
        )
        .optional()?;

    match current {
        Some(value) => {
            set_in_collection(conn, id, !value)?;
            Ok(Some(!value))
        }
        None => Ok(None),
    }
}

// ----- Counts and reconciliation -----

pub fn count_loads(conn: &Connection) -> Result<usize> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM loads", [], |row| row.get(0))?;
    Ok(count as usize)
}

// Both predicates bind SOURCE_USER as ?1.
/// Rows the delete phase must never touch.
pub const USER_PREDICATE: &str = "source = ?1";
/// Everything else, including rows with no classification at all.
pub const NON_USER_PREDICATE: &str = "source != ?1 OR source IS NULL";

pub fn count_user_loads(conn: &Connection) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM loads WHERE {}", USER_PREDICATE);
    let count: i64 = conn.query_row(&sql, params![SOURCE_USER], |row| row.get(0))?;
    Ok(count as usize)
}

pub fn count_non_user_loads(conn: &Connection) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM loads WHERE {}", NON_USER_PREDICATE);
    let count: i64 = conn.query_row(&sql, params![SOURCE_USER], |row| row.get(0))?;
    Ok(count as usize)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub deleted_count: usize,
    pub preserved_count: usize,
    pub expected_deletes: usize,
}

/// Delete every non-user load. The counts are taken independently of the
/// DELETE so the caller can verify them.
pub fn delete_imported_loads(conn: &Connection) -> Result<DeleteOutcome> {
    let preserved_count = count_user_loads(conn)?;
    let expected_deletes = count_non_user_loads(conn)?;

    let sql = format!("DELETE FROM loads WHERE {}", NON_USER_PREDICATE);
    let deleted_count = conn.execute(&sql, params![SOURCE_USER])?;

    Ok(DeleteOutcome {
        deleted_count,
        preserved_count,
        expected_deletes,
    })
}

// ----- Distinct values -----

/// A single distinct column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// Distinct non-NULL values of an allow-listed column, ascending.
pub fn get_distinct_values(conn: &Connection, column: &str) -> Result<Vec<FieldValue>> {
    // The column name is interpolated, so it must come from the allow-list
    let column = DISTINCT_COLUMNS
        .iter()
        .find(|c| **c == column)
        .ok_or_else(|| LoadbookError::ColumnNotAllowed(column.to_string()))?;

    let sql = format!(
        "SELECT DISTINCT {col} FROM loads WHERE {col} IS NOT NULL ORDER BY {col}",
        col = column
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], |row| {
        Ok(match row.get_ref(0)? {
            ValueRef::Integer(i) => FieldValue::Number(i as f64),
            ValueRef::Real(f) => FieldValue::Number(f),
            other => FieldValue::Text(other.as_str().map(str::to_string).unwrap_or_default()),
        })
    })?;

    let mut values = Vec::new();
    for value in rows {
        values.push(value?);
    }
    Ok(values)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterOptions {
    pub calibers: Vec<String>,
    pub bullet_manufacturers: Vec<String>,
    pub powder_types: Vec<String>,
}

pub fn get_filter_options(conn: &Connection) -> Result<FilterOptions> {
    let as_strings = |values: Vec<FieldValue>| -> Vec<String> {
        values.into_iter().map(|v| v.to_string()).collect()
    };
    Ok(FilterOptions {
        calibers: as_strings(get_distinct_values(conn, "caliber")?),
        bullet_manufacturers: as_strings(get_distinct_values(conn, "bullet_manufacturer")?),
        powder_types: as_strings(get_distinct_values(conn, "powder_type")?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_in_memory;

    fn sample(caliber: &str, source: Source) -> LoadInput {
        LoadInput {
            bullet_manufacturer: Some("Lapua".to_string()),
            bullet_type: Some("Scenar".to_string()),
            bullet_weight_grains: Some(155.0),
            powder_type: Some("N150".to_string()),
            source: Some(source),
            ..LoadInput::new(caliber)
        }
    }

    #[test]
    fn insert_defaults_source_to_user() {
        let conn = open_in_memory().unwrap();
        let id = insert_load(&conn, &LoadInput::new(".308 Winchester")).unwrap();
        let load = get_load(&conn, id).unwrap().unwrap();
        assert_eq!(load.source, Some(Source::User));
        assert!(!load.in_my_collection);
        assert!(load.created_at.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&load.created_at).is_ok());
    }

    #[test]
    fn insert_rejects_blank_caliber() {
        let conn = open_in_memory().unwrap();
        let err = insert_load(&conn, &LoadInput::new("  ")).unwrap_err();
        assert!(matches!(err, LoadbookError::Validation(_)));
        assert_eq!(count_loads(&conn).unwrap(), 0);
    }

    #[test]
    fn search_text_is_lowercase_and_maintained_on_update() {
        let conn = open_in_memory().unwrap();
        let id = insert_load(&conn, &sample("6.5 Creedmoor", Source::imported())).unwrap();
        let load = get_load(&conn, id).unwrap().unwrap();
        assert_eq!(load.search_text, "6.5 creedmoor lapua scenar n150 imported");

        let mut input = LoadInput::from(&load);
        input.notes = Some("Sub-MOA at 300m".to_string());
        assert!(update_load(&conn, id, &input).unwrap());
        let load = get_load(&conn, id).unwrap().unwrap();
        assert!(load.search_text.contains("sub-moa at 300m"));
    }

    #[test]
    fn update_keeps_source_and_collection_flag() {
        let conn = open_in_memory().unwrap();
        let id = insert_load(&conn, &sample(".223 Remington", Source::imported())).unwrap();
        set_in_collection(&conn, id, true).unwrap();

        let input = LoadInput { source: Some(Source::User), ..LoadInput::new(".223 Remington") };
        assert!(update_load(&conn, id, &input).unwrap());

        let load = get_load(&conn, id).unwrap().unwrap();
        assert_eq!(load.source, Some(Source::imported()));
        assert!(load.in_my_collection);
        assert_eq!(load.bullet_manufacturer, None);
    }

    #[test]
    fn missing_ids_are_reported_as_absent() {
        let conn = open_in_memory().unwrap();
        assert!(get_load(&conn, 42).unwrap().is_none());
        assert!(!update_load(&conn, 42, &LoadInput::new(".308 Winchester")).unwrap());
        assert!(!delete_load(&conn, 42).unwrap());
        assert_eq!(toggle_in_collection(&conn, 42).unwrap(), None);
    }

    #[test]
    fn ids_are_never_reused() {
        let conn = open_in_memory().unwrap();
        let first = insert_load(&conn, &LoadInput::new(".308 Winchester")).unwrap();
        assert!(delete_load(&conn, first).unwrap());
        let second = insert_load(&conn, &LoadInput::new(".308 Winchester")).unwrap();
        assert!(second > first);
    }

    #[test]
    fn toggle_flips_collection_flag() {
        let conn = open_in_memory().unwrap();
        let id = insert_load(&conn, &sample(".308 Winchester", Source::imported())).unwrap();
        assert_eq!(toggle_in_collection(&conn, id).unwrap(), Some(true));
        assert_eq!(toggle_in_collection(&conn, id).unwrap(), Some(false));
    }

    #[test]
    fn delete_imported_keeps_user_rows_and_removes_null_source() {
        let conn = open_in_memory().unwrap();
        for _ in 0..2 {
            insert_load(&conn, &sample(".308 Winchester", Source::User)).unwrap();
        }
        insert_load(&conn, &sample(".308 Winchester", Source::imported())).unwrap();
        insert_load(&conn, &sample(".308 Winchester", Source::parse("Ladeboken"))).unwrap();
        conn.execute("INSERT INTO loads (caliber, source) VALUES ('9.3x62', NULL)", []).unwrap();

        let outcome = delete_imported_loads(&conn).unwrap();
        assert_eq!(outcome, DeleteOutcome { deleted_count: 3, preserved_count: 2, expected_deletes: 3 });
        assert_eq!(count_loads(&conn).unwrap(), 2);
        assert_eq!(count_user_loads(&conn).unwrap(), 2);
    }

    #[test]
    fn updating_unclassified_load_keeps_source_out_of_search_text() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO loads (caliber, source) VALUES ('9.3x62', NULL)", []).unwrap();
        let id = conn.last_insert_rowid();

        let input = LoadInput { notes: Some("Moose load".into()), ..LoadInput::new("9.3x62") };
        assert!(update_load(&conn, id, &input).unwrap());

        let load = get_load(&conn, id).unwrap().unwrap();
        assert_eq!(load.source, None);
        assert_eq!(load.search_text, "9.3x62 moose load");
        let found = crate::db::query::count_matching(
            &conn,
            &crate::db::query::LoadFilters::from_pairs([("search", "user")]),
        )
        .unwrap();
        assert_eq!(found, 0);
        assert_eq!(count_non_user_loads(&conn).unwrap(), 1);
    }

    #[test]
    fn null_source_reads_back_as_none() {
        let conn = open_in_memory().unwrap();
        conn.execute("INSERT INTO loads (caliber, source) VALUES ('9.3x62', NULL)", []).unwrap();
        let load = get_load(&conn, conn.last_insert_rowid()).unwrap().unwrap();
        assert_eq!(load.source, None);
    }

    #[test]
    fn distinct_values_respects_allow_list() {
        let conn = open_in_memory().unwrap();
        insert_load(&conn, &sample(".308 Winchester", Source::User)).unwrap();
        insert_load(&conn, &sample(".223 Remington", Source::User)).unwrap();
        insert_load(&conn, &sample(".308 Winchester", Source::User)).unwrap();

        let calibers = get_distinct_values(&conn, "caliber").unwrap();
        assert_eq!(
            calibers,
            vec![FieldValue::Text(".223 Remington".into()), FieldValue::Text(".308 Winchester".into())]
        );
        let weights = get_distinct_values(&conn, "bullet_weight_grains").unwrap();
        assert_eq!(weights, vec![FieldValue::Number(155.0)]);

        let err = get_distinct_values(&conn, "caliber; DROP TABLE loads").unwrap_err();
        assert!(matches!(err, LoadbookError::ColumnNotAllowed(_)));
        let err = get_distinct_values(&conn, "search_text").unwrap_err();
        assert!(matches!(err, LoadbookError::ColumnNotAllowed(_)));
    }

    #[test]
    fn filter_options_lists_dropdown_values() {
        let conn = open_in_memory().unwrap();
        insert_load(&conn, &sample(".308 Winchester", Source::User)).unwrap();
        insert_load(&conn, &LoadInput::new("6.5x55 SE")).unwrap();

        let options = get_filter_options(&conn).unwrap();
        assert_eq!(options.calibers, vec![".308 Winchester", "6.5x55 SE"]);
        assert_eq!(options.bullet_manufacturers, vec!["Lapua"]);
        assert_eq!(options.powder_types, vec!["N150"]);
    }

    #[test]
    fn source_label_round_trip() {
        assert_eq!(Source::parse("user"), Source::User);
        assert_eq!(Source::parse("User"), Source::Imported("User".into()));
        let json = serde_json::to_string(&Source::imported()).unwrap();
        assert_eq!(json, "\"imported\"");
        let back: Source = serde_json::from_str("\"user\"").unwrap();
        assert!(back.is_user());
    }
}
