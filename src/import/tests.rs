// --- Import pipeline and replace-reconciliation tests ---

use super::*;
use super::mapper::*;
use crate::db::open_in_memory;
use crate::db::schema::{self, count_loads, count_user_loads, insert_load, LoadInput, Source};
use crate::error::LoadbookError;
use rusqlite::Connection;
use std::path::Path;
use tempfile::TempDir;

fn row(cells: &[(&str, CellValue)]) -> SourceRow {
    cells.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

fn valid_row(caliber: &str, weight: f64) -> SourceRow {
    row(&[
        (COL_CALIBER, caliber.into()),
        (COL_BULLET_MANUFACTURER, "Sierra".into()),
        (COL_BULLET_TYPE, "MatchKing".into()),
        (COL_BULLET_WEIGHT_GRAINS, weight.into()),
        (COL_POWDER_TYPE, "N140".into()),
        (COL_CHARGE_WEIGHT_GRAINS, "44,5".into()),
        (COL_VELOCITY_MS, 810.0.into()),
    ])
}

fn blank_row() -> SourceRow {
    row(&[(COL_CALIBER, "".into()), (COL_BULLET_TYPE, "Scenar".into())])
}

/// Seed `user` hand-entered loads and `imported` spreadsheet loads.
fn seed(conn: &Connection, user: usize, imported: usize) {
    for _ in 0..user {
        insert_load(conn, &LoadInput::new(".308 Winchester")).unwrap();
    }
    for _ in 0..imported {
        let input = LoadInput { source: Some(Source::imported()), ..LoadInput::new("6.5 Creedmoor") };
        insert_load(conn, &input).unwrap();
    }
}

struct FailingSource;

impl RowSource for FailingSource {
    fn describe(&self) -> String {
        "broken.xlsx".to_string()
    }

    fn read_rows(&self) -> crate::error::Result<Vec<SourceRow>> {
        Err(LoadbookError::Spreadsheet("File is not a zip archive".to_string()))
    }
}

fn write_workbook(path: &Path, rows: &[Vec<Option<&str>>]) {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let worksheet = workbook.add_worksheet();
    for (r, cells) in rows.iter().enumerate() {
        for (c, cell) in cells.iter().enumerate() {
            if let Some(value) = cell {
                match value.parse::<f64>() {
                    Ok(n) if !value.contains(',') => {
                        worksheet.write_number(r as u32, c as u16, n).unwrap();
                    }
                    _ => {
                        worksheet.write_string(r as u32, c as u16, *value).unwrap();
                    }
                }
            }
        }
    }
    workbook.save(path).unwrap();
}

const HEADER: [Option<&str>; 6] = [
    Some(COL_CALIBER),
    Some(COL_BULLET_MANUFACTURER),
    Some(COL_BULLET_WEIGHT_GRAINS),
    Some(COL_CHARGE_WEIGHT_GRAINS),
    Some(COL_VELOCITY_MS),
    Some(COL_SOURCE),
];

// ---------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------

#[test]
fn test_import_rows_counts_skips_and_row_errors() {
    let conn = open_in_memory().unwrap();
    let rows = vec![
        valid_row(".308 Winchester", 168.0),
        blank_row(),
        valid_row(".308 Winchester", -5.0),
        valid_row("6.5x55 SE", 139.0),
    ];

    let summary = import_rows(&conn, &rows, &Source::imported());

    assert!(summary.success);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.errors.len(), 1);
    // Header is line 1, so the third data row is line 4
    assert_eq!(summary.errors[0].row, RowRef::Line(4));
    assert!(summary.errors[0].error.contains("CHECK"));
    assert_eq!(count_loads(&conn).unwrap(), 2);
}

#[test]
fn test_imported_rows_are_labelled_and_searchable() {
    let conn = open_in_memory().unwrap();
    let rows = vec![valid_row(".308 Winchester", 168.0)];
    import_rows(&conn, &rows, &Source::imported());

    let load = schema::get_load(&conn, 1).unwrap().unwrap();
    assert_eq!(load.source, Some(Source::imported()));
    assert_eq!(load.charge_weight_grains, Some(44.5));
    assert!(load.search_text.contains("matchking"));
    assert!(!load.in_my_collection);
}

#[test]
fn test_row_label_wins_over_default_but_never_user() {
    let conn = open_in_memory().unwrap();
    let mut labelled = valid_row(".308 Winchester", 168.0);
    labelled.insert(COL_SOURCE.to_string(), "Ladeboken".into());
    let mut claims_user = valid_row(".223 Remington", 55.0);
    claims_user.insert(COL_SOURCE.to_string(), "user".into());

    let summary = import_rows(&conn, &[labelled, claims_user], &Source::imported());
    assert_eq!(summary.imported, 2);

    assert_eq!(schema::get_load(&conn, 1).unwrap().unwrap().source, Some(Source::parse("Ladeboken")));
    assert_eq!(schema::get_load(&conn, 2).unwrap().unwrap().source, Some(Source::imported()));
    assert_eq!(count_user_loads(&conn).unwrap(), 0);
}

#[test]
fn test_empty_input_imports_nothing() {
    let conn = open_in_memory().unwrap();
    let summary = import_rows(&conn, &[], &Source::imported());
    assert_eq!(summary, ImportSummary { success: true, ..Default::default() });
}

#[test]
fn test_unreadable_source_reports_general_error() {
    let conn = open_in_memory().unwrap();
    let summary = import_from_source(&conn, &FailingSource, &Source::imported());

    assert!(!summary.success);
    assert_eq!(summary.imported, 0);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.errors[0].row, RowRef::General);

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["errors"][0]["row"], "general");
}

#[test]
fn test_row_error_serializes_line_number() {
    let err = RowError { row: RowRef::Line(7), error: "bad".to_string() };
    let json = serde_json::to_value(&err).unwrap();
    assert_eq!(json["row"], 7);
}

#[test]
fn test_preview_maps_without_writing() {
    let conn = open_in_memory().unwrap();
    let rows: Vec<SourceRow> = (0..15).map(|i| valid_row(".308 Winchester", 150.0 + i as f64)).collect();

    let preview = preview_rows(&rows, 10);
    assert_eq!(preview.total, 15);
    assert_eq!(preview.preview.len(), 10);
    assert_eq!(preview.preview[0].source, Some(Source::imported()));
    assert_eq!(preview.preview[9].bullet_weight_grains, Some(159.0));
    assert_eq!(count_loads(&conn).unwrap(), 0);
}

// ---------------------------------------------------------------
// Spreadsheet files
// ---------------------------------------------------------------

#[test]
fn test_xlsx_file_import() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("laddningar.xlsx");
    write_workbook(
        &path,
        &[
            HEADER.to_vec(),
            vec![Some(".308 Winchester"), Some("Lapua"), Some("155"), Some("46,2"), Some("850"), None],
            vec![None, Some("Sierra"), Some("168"), None, None, None],
            vec![Some("6.5x55 SE"), Some("Norma"), Some("139"), None, None, Some("Ladeboken")],
        ],
    );

    let conn = open_in_memory().unwrap();
    let summary = import_from_source(&conn, &SpreadsheetFile::new(&path), &Source::imported());

    assert!(summary.success);
    assert_eq!(summary.imported, 2);
    assert_eq!(summary.skipped, 1);
    assert!(summary.errors.is_empty());

    let first = schema::get_load(&conn, 1).unwrap().unwrap();
    assert_eq!(first.caliber, ".308 Winchester");
    assert_eq!(first.bullet_weight_grains, Some(155.0));
    assert_eq!(first.charge_weight_grains, Some(46.2));
    assert_eq!(first.velocity_ms, Some(850.0));
    assert_eq!(first.source, Some(Source::imported()));

    let second = schema::get_load(&conn, 2).unwrap().unwrap();
    assert_eq!(second.source, Some(Source::parse("Ladeboken")));
}

#[test]
fn test_xlsx_preview_reads_headers_with_whitespace() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("preview.xlsx");
    write_workbook(
        &path,
        &[
            vec![Some(" Kaliber "), Some("Kultyp")],
            vec![Some(".222 Remington"), Some("V-Max")],
        ],
    );

    let preview = pipeline::preview_source(&SpreadsheetFile::new(&path), 10).unwrap();
    assert_eq!(preview.total, 1);
    assert_eq!(preview.preview[0].caliber, ".222 Remington");
    assert_eq!(preview.preview[0].bullet_type.as_deref(), Some("V-Max"));
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("loads.csv");
    std::fs::write(&path, "Kaliber\n.308 Winchester\n").unwrap();

    let err = SpreadsheetFile::new(&path).read_rows().unwrap_err();
    assert!(matches!(err, LoadbookError::Spreadsheet(_)));
}

#[test]
fn test_missing_file_is_a_spreadsheet_error() {
    let tmp = TempDir::new().unwrap();
    let err = SpreadsheetFile::new(tmp.path().join("nowhere.xlsx")).read_rows().unwrap_err();
    assert!(matches!(err, LoadbookError::Spreadsheet(_)));
}

// ---------------------------------------------------------------
// Replace-reconciliation
// ---------------------------------------------------------------

#[test]
fn test_replace_preserves_user_loads() {
    let mut conn = open_in_memory().unwrap();
    seed(&conn, 3, 5);
    let rows = vec![
        valid_row(".308 Winchester", 155.0),
        valid_row(".308 Winchester", 168.0),
        blank_row(),
        valid_row("6.5x55 SE", 139.0),
        valid_row("6.5x55 SE", 144.0),
    ];

    let summary = replace_imported_data(&mut conn, &rows).unwrap();

    assert_eq!(summary.deleted, 5);
    assert_eq!(summary.preserved, 3);
    assert_eq!(summary.imported, 4);
    assert_eq!(summary.skipped, 1);
    assert!(summary.errors.is_empty());
    assert_eq!(summary.counts, ReplaceCounts { before: 8, after: 7, user_loads: 3 });

    // The user rows are the very same records
    for id in 1..=3 {
        let load = schema::get_load(&conn, id).unwrap().unwrap();
        assert_eq!(load.source, Some(Source::User));
    }

    let json = serde_json::to_value(&summary).unwrap();
    assert_eq!(json["counts"]["userLoads"], 3);
}

#[test]
fn test_replace_counts_failed_rows() {
    let mut conn = open_in_memory().unwrap();
    seed(&conn, 2, 4);
    let rows = vec![
        valid_row(".308 Winchester", 155.0),
        valid_row(".308 Winchester", -1.0),
        blank_row(),
        valid_row("6.5x55 SE", -139.0),
        valid_row("6.5x55 SE", 144.0),
        valid_row(".223 Remington", 69.0),
    ];

    let summary = replace_imported_data(&mut conn, &rows).unwrap();

    // imported = rows - skipped - failed
    assert_eq!(summary.imported, rows.len() - 1 - 2);
    assert_eq!(summary.skipped, 1);
    let lines: Vec<RowRef> = summary.errors.iter().map(|e| e.row).collect();
    assert_eq!(lines, vec![RowRef::Line(3), RowRef::Line(5)]);
    assert_eq!(summary.counts.after, 2 + 3);
}

#[test]
fn test_replace_removes_unclassified_rows() {
    let mut conn = open_in_memory().unwrap();
    seed(&conn, 1, 1);
    conn.execute("INSERT INTO loads (caliber, source) VALUES ('9.3x62', NULL)", []).unwrap();

    let summary = replace_imported_data(&mut conn, &Vec::<SourceRow>::new()).unwrap();
    assert_eq!(summary.deleted, 2);
    assert_eq!(summary.counts, ReplaceCounts { before: 3, after: 1, user_loads: 1 });
}

#[test]
fn test_replace_delete_mismatch_rolls_back() {
    let mut conn = open_in_memory().unwrap();
    seed(&conn, 1, 2);
    // Silently keep one imported row so the DELETE reports fewer rows than counted
    conn.execute_batch(
        "CREATE TRIGGER keep_row BEFORE DELETE ON loads WHEN OLD.id = 2
         BEGIN SELECT RAISE(IGNORE); END;",
    )
    .unwrap();
    let rows = vec![valid_row(".308 Winchester", 155.0)];

    let err = replace_imported_data(&mut conn, &rows).unwrap_err();

    match err {
        LoadbookError::DeleteCountMismatch { expected, actual } => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 1);
        }
        other => panic!("unexpected error: {}", other),
    }
    // Nothing deleted, nothing imported
    assert_eq!(count_loads(&conn).unwrap(), 3);
    assert!(schema::get_load(&conn, 3).unwrap().is_some());
}

#[test]
fn test_replace_with_unreadable_source_restores_deleted_rows() {
    let mut conn = open_in_memory().unwrap();
    seed(&conn, 2, 3);

    let err = replace_imported_data(&mut conn, &FailingSource).unwrap_err();

    match &err {
        LoadbookError::ImportFailedAfterDelete { deleted, errors } => {
            assert_eq!(*deleted, 3);
            assert_eq!(errors[0].row, RowRef::General);
        }
        other => panic!("unexpected error: {}", other),
    }
    assert!(err.to_string().contains("rollback"));
    assert_eq!(count_loads(&conn).unwrap(), 5);
    assert_eq!(count_user_loads(&conn).unwrap(), 2);
}

#[test]
fn test_replace_from_xlsx_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("export.xlsx");
    write_workbook(
        &path,
        &[
            HEADER.to_vec(),
            vec![Some(".308 Winchester"), Some("Lapua"), Some("155"), None, None, None],
            vec![Some(".308 Winchester"), Some("Lapua"), Some("167"), None, None, None],
        ],
    );

    let mut conn = open_in_memory().unwrap();
    seed(&conn, 1, 4);
    let summary = replace_imported_data(&mut conn, &SpreadsheetFile::new(&path)).unwrap();
    assert_eq!(summary.counts, ReplaceCounts { before: 5, after: 3, user_loads: 1 });
}

#[test]
fn test_replace_waits_for_other_writers() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("loadbook.db");
    let holder = crate::db::open_db(&db_path).unwrap();
    let mut conn = crate::db::open_db(&db_path).unwrap();
    seed(&conn, 1, 1);
    conn.busy_timeout(std::time::Duration::from_millis(50)).unwrap();

    holder.execute_batch("BEGIN IMMEDIATE;").unwrap();
    let err = replace_imported_data(&mut conn, &Vec::<SourceRow>::new()).unwrap_err();
    assert!(matches!(err, LoadbookError::Database(_)));
    holder.execute_batch("ROLLBACK;").unwrap();

    let summary = replace_imported_data(&mut conn, &Vec::<SourceRow>::new()).unwrap();
    assert_eq!(summary.deleted, 1);
}
