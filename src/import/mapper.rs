// Swedish spreadsheet columns -> load fields

use crate::db::schema::{LoadInput, Source};
use super::{CellValue, SourceRow};

pub const COL_CALIBER: &str = "Kaliber";
pub const COL_BULLET_MANUFACTURER: &str = "Kultillverkare";
pub const COL_BULLET_TYPE: &str = "Kultyp";
pub const COL_BULLET_WEIGHT_GRAINS: &str = "Kulvikt (grains)";
pub const COL_BULLET_WEIGHT_GRAMS: &str = "Kulvikt (gram)";
pub const COL_BULLET_DIAMETER_INCHES: &str = "Kuldiameter (tum)";
pub const COL_BULLET_DIAMETER_MM: &str = "Kuldiameter (mm)";
pub const COL_CARTRIDGE_LENGTH_MM: &str = "Patronlängd (mm)";
pub const COL_POWDER_MANUFACTURER: &str = "Kruttillverkare";
pub const COL_POWDER_TYPE: &str = "Kruttsort";
pub const COL_CHARGE_WEIGHT_GRAINS: &str = "Laddvikt (grains)";
pub const COL_VELOCITY_MS: &str = "Hastighet (m/s)";
pub const COL_SOURCE: &str = "Källa";

/// True when the row carries a caliber. Rows without one are skipped, not mapped.
pub fn has_required_field(row: &SourceRow) -> bool {
    row.get(COL_CALIBER).map_or(false, |cell| !cell.is_blank())
}

/// Map one row. Performs no validation; fields absent from the format are None
/// and `source` is None unless the row names one.
pub fn map_row(row: &SourceRow) -> LoadInput {
    LoadInput {
        caliber: text(row, COL_CALIBER).unwrap_or_default(),
        bullet_manufacturer: text(row, COL_BULLET_MANUFACTURER),
        bullet_type: text(row, COL_BULLET_TYPE),
        bullet_weight_grains: number(row, COL_BULLET_WEIGHT_GRAINS),
        bullet_weight_grams: number(row, COL_BULLET_WEIGHT_GRAMS),
        bullet_diameter_inches: number(row, COL_BULLET_DIAMETER_INCHES),
        bullet_diameter_mm: number(row, COL_BULLET_DIAMETER_MM),
        total_cartridge_length_mm: number(row, COL_CARTRIDGE_LENGTH_MM),
        powder_manufacturer: text(row, COL_POWDER_MANUFACTURER),
        powder_type: text(row, COL_POWDER_TYPE),
        charge_weight_grains: number(row, COL_CHARGE_WEIGHT_GRAINS),
        velocity_ms: number(row, COL_VELOCITY_MS),
        source: text(row, COL_SOURCE).map(|label| Source::parse(&label)),

        test_weapon: None,
        primer_manufacturer: None,
        primer_type: None,
        case_manufacturer: None,
        free_travel_mm: None,
        velocity_sd: None,
        velocity_es: None,
        group_size_mm: None,
        distance_meters: None,
        tested_date: None,
        temperature_celsius: None,
        humidity_percent: None,
        barrel_length_inches: None,
        twist_rate: None,
        loading_date: None,
        cartridges_loaded: None,
        batch_number: None,
        group_photo_path: None,
        notes: None,
        in_my_collection: false,
    }
}

fn text(row: &SourceRow, column: &str) -> Option<String> {
    let value = match row.get(column)? {
        CellValue::Empty => return None,
        CellValue::Text(s) => s.trim().to_string(),
        CellValue::Number(n) if !n.is_finite() => return None,
        // Whole numbers read back from a numeric cell lose the trailing ".0"
        CellValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        CellValue::Number(n) => n.to_string(),
        CellValue::Bool(b) => b.to_string(),
    };
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

fn number(row: &SourceRow, column: &str) -> Option<f64> {
    let parsed = match row.get(column)? {
        CellValue::Number(n) => *n,
        // Swedish sheets often carry a decimal comma in text cells
        CellValue::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok()?,
        CellValue::Empty | CellValue::Bool(_) => return None,
    };
    if parsed.is_finite() {
        Some(parsed)
    } else {
        None
    }
}
