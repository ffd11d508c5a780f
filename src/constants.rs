// Loadbook Constants

// Paths
pub const APP_DIR_NAME: &str = "loadbook";
pub const DB_FILENAME: &str = "loadbook.db";

// Environment keys (read after .env is loaded)
pub const ENV_DATABASE_PATH: &str = "LOADBOOK_DATABASE_PATH";
pub const ENV_PAGE_LIMIT: &str = "LOADBOOK_PAGE_LIMIT";

// SQLite
pub const BUSY_TIMEOUT_MS: u32 = 5000;

// Classification labels
pub const SOURCE_USER: &str = "user";
pub const SOURCE_IMPORTED: &str = "imported";

// Pagination
pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_PAGE_LIMIT: i64 = 50;

// Import
pub const DEFAULT_PREVIEW_LIMIT: usize = 10;
/// Spreadsheet rows are 1-indexed and the first one is the header.
pub const HEADER_ROW_OFFSET: usize = 2;
pub const SPREADSHEET_EXTENSIONS: [&str; 4] = ["xlsx", "xlsm", "xls", "ods"];

// Sorting: allow-listed columns for ORDER BY
pub const DEFAULT_SORT_FIELD: &str = "created_at";
pub const SORT_FIELDS: [&str; 11] = [
    "created_at", "caliber", "bullet_manufacturer", "bullet_type",
    "bullet_weight_grains", "powder_manufacturer", "powder_type",
    "charge_weight_grains", "velocity_ms", "total_cartridge_length_mm", "source",
];

// Columns that may be queried for distinct dropdown values
pub const DISTINCT_COLUMNS: [&str; 20] = [
    "caliber", "test_weapon",
    "bullet_manufacturer", "bullet_type", "bullet_weight_grains",
    "powder_manufacturer", "powder_type", "charge_weight_grains",
    "primer_manufacturer", "primer_type",
    "case_manufacturer", "total_cartridge_length_mm",
    "velocity_ms", "group_size_mm", "distance_meters",
    "source", "batch_number",
    "bullet_weight_grams", "bullet_diameter_inches", "bullet_diameter_mm",
];
