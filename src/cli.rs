// Loadbook CLI binary

use std::path::{Path, PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use anyhow::{Context, Result};
use serde::Serialize;

use loadbook_lib::constants::{DEFAULT_PREVIEW_LIMIT, HEADER_ROW_OFFSET};
use loadbook_lib::{AppConfig, Load, LoadBook, LoadFilters, LoadInput, RowError, Source};

#[derive(Parser)]
#[command(name = "loadbook")]
#[command(about = "Loadbook - A reloading load library", long_about = None)]
#[command(version)]
struct Cli {
    /// Database file (overrides LOADBOOK_DATABASE_PATH)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List loads matching the filters
    List {
        /// Raw filter, e.g. caliber=.308 Winchester (repeatable)
        #[arg(short, long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,
        /// Free-text search
        #[arg(short, long)]
        search: Option<String>,
        /// Sort column
        #[arg(long)]
        sort: Option<String>,
        /// Sort direction (asc or desc)
        #[arg(long)]
        order: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        limit: Option<i64>,
        /// Only loads in my collection
        #[arg(long)]
        collection: bool,
    },

    /// Show one load
    Show {
        id: i64,
    },

    /// Create a load from a JSON file
    Add {
        file: PathBuf,
    },

    /// Replace the fields of a load from a JSON file
    Update {
        id: i64,
        file: PathBuf,
    },

    /// Delete a load
    Delete {
        id: i64,
    },

    /// Toggle (or set) the my-collection flag
    Collect {
        id: i64,
        #[arg(long, conflicts_with = "remove")]
        add: bool,
        #[arg(long)]
        remove: bool,
    },

    /// Import loads from a spreadsheet
    Import {
        path: PathBuf,
        /// Label for rows without a Källa value
        #[arg(long, default_value = "imported")]
        source: String,
    },

    /// Show how a spreadsheet would be mapped, without importing
    Preview {
        path: PathBuf,
        #[arg(long, default_value_t = DEFAULT_PREVIEW_LIMIT)]
        limit: usize,
    },

    /// Delete all imported loads and re-import from a spreadsheet
    Replace {
        path: PathBuf,
    },

    /// Distinct values of a column
    Distinct {
        column: String,
    },

    /// Dropdown values for the list filters
    Filters,

    /// Autocomplete presets
    Presets {
        #[arg(value_enum)]
        kind: PresetKind,
        /// Powder manufacturer (powder-types only)
        #[arg(short, long)]
        manufacturer: Option<String>,
    },

    /// Whether imported loads exist
    Status,
}

#[derive(Clone, Copy, ValueEnum)]
enum PresetKind {
    Calibers,
    BulletBrands,
    PowderManufacturers,
    PowderTypes,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let config = AppConfig::load()?.with_database_path(cli.database);
    let mut book = LoadBook::open(&config.database_path)
        .with_context(|| format!("Cannot open load store at {}", config.database_path.display()))?;
    let json = cli.json;

    match cli.command {
        Commands::List { filters, search, sort, order, page, limit, collection } => {
            let mut pairs = parse_pairs(&filters)?;
            pairs.extend(search.map(|v| ("search".to_string(), v)));
            pairs.extend(sort.map(|v| ("sort_field".to_string(), v)));
            pairs.extend(order.map(|v| ("sort_order".to_string(), v)));
            pairs.extend(page.map(|v| ("page".to_string(), v.to_string())));
            pairs.extend(limit.map(|v| ("limit".to_string(), v.to_string())));
            if collection {
                pairs.push(("my_collection".to_string(), "true".to_string()));
            }
            let mut filters = LoadFilters::from_pairs(pairs);
            if filters.limit.is_none() {
                filters.limit = Some(config.page_limit);
            }
            cmd_list(&book, &filters, json)
        }
        Commands::Show { id } => cmd_show(&book, id, json),
        Commands::Add { file } => {
            let load = book.create_load(&read_input(&file)?)?;
            print_load_saved("Created", &load, json)
        }
        Commands::Update { id, file } => {
            let load = book
                .update_load(id, &read_input(&file)?)?
                .ok_or_else(|| anyhow::anyhow!("Load {} not found", id))?;
            print_load_saved("Updated", &load, json)
        }
        Commands::Delete { id } => {
            if !book.delete_load(id)? {
                anyhow::bail!("Load {} not found", id);
            }
            println!("Deleted load {}", id);
            Ok(())
        }
        Commands::Collect { id, add, remove } => {
            let load = if add {
                book.add_to_collection(id)?
            } else if remove {
                book.remove_from_collection(id)?
            } else {
                book.toggle_collection(id)?
            };
            let load = load.ok_or_else(|| anyhow::anyhow!("Load {} not found", id))?;
            let state = if load.in_my_collection { "in" } else { "not in" };
            println!("Load {} is {} my collection", load.id, state);
            Ok(())
        }
        Commands::Import { path, source } => cmd_import(&book, &path, &source, json),
        Commands::Preview { path, limit } => {
            let preview = book.preview_spreadsheet(&path, limit)?;
            if json {
                return print_json(&preview);
            }
            println!("{} rows in {}; first {}:", preview.total, path.display(), preview.preview.len());
            println!();
            for (i, input) in preview.preview.iter().enumerate() {
                println!("{:>4}  {}", i + HEADER_ROW_OFFSET, describe(input));
            }
            Ok(())
        }
        Commands::Replace { path } => cmd_replace(&mut book, &path, json),
        Commands::Distinct { column } => {
            let values = book.distinct_values(&column)?;
            if json {
                return print_json(&values);
            }
            for value in values {
                println!("{}", value);
            }
            Ok(())
        }
        Commands::Filters => {
            let options = book.filter_options()?;
            if json {
                return print_json(&options);
            }
            println!("Calibers:            {}", options.calibers.join(", "));
            println!("Bullet manufacturers: {}", options.bullet_manufacturers.join(", "));
            println!("Powder types:        {}", options.powder_types.join(", "));
            Ok(())
        }
        Commands::Presets { kind, manufacturer } => {
            let names = match kind {
                PresetKind::Calibers => book.caliber_presets()?,
                PresetKind::BulletBrands => book.bullet_brand_presets()?,
                PresetKind::PowderManufacturers => book.powder_manufacturer_presets()?,
                PresetKind::PowderTypes => book.powder_type_presets(manufacturer.as_deref())?,
            };
            if json {
                return print_json(&names);
            }
            for name in names {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Status => {
            let status = book.import_status()?;
            if json {
                return print_json(&status);
            }
            if status.has_imported_loads {
                println!("{} imported loads", status.imported_count);
            } else {
                println!("No imported loads. Use 'loadbook import <file>' to add some.");
            }
            Ok(())
        }
    }
}

fn cmd_list(book: &LoadBook, filters: &LoadFilters, json: bool) -> Result<()> {
    let page = book.list_loads(filters)?;
    if json {
        return print_json(&page);
    }

    if page.records.is_empty() {
        println!("No loads found.");
        return Ok(());
    }

    println!("{:>5}  {:<20}  {:<24}  {:>7}  {:<14}  {:>7}  {:>7}  {}",
        "ID", "Caliber", "Bullet", "Weight", "Powder", "Charge", "m/s", "Source");
    println!("{}", "-".repeat(110));

    for load in &page.records {
        let bullet = [load.bullet_manufacturer.as_deref(), load.bullet_type.as_deref()]
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        let marker = if load.in_my_collection { "*" } else { "" };
        println!("{:>5}  {:<20}  {:<24}  {:>7}  {:<14}  {:>7}  {:>7}  {}{}",
            load.id,
            truncate(&load.caliber, 20),
            truncate(&bullet, 24),
            format_number(load.bullet_weight_grains),
            truncate(load.powder_type.as_deref().unwrap_or("-"), 14),
            format_number(load.charge_weight_grains),
            format_number(load.velocity_ms),
            load.source.as_ref().map(|s| s.as_str()).unwrap_or("-"),
            marker
        );
    }

    let p = page.pagination;
    println!();
    println!("Page {} of {} ({} loads)", p.page, p.total_pages.max(1), p.total);
    Ok(())
}

fn cmd_show(book: &LoadBook, id: i64, json: bool) -> Result<()> {
    let load = book.get_load(id)?
        .ok_or_else(|| anyhow::anyhow!("Load {} not found", id))?;
    if json {
        return print_json(&load);
    }

    println!("Load #{}", load.id);
    println!();
    println!("Caliber:     {}", load.caliber);
    let rows = [
        ("Weapon", load.test_weapon.clone()),
        ("Bullet", join_some(&[&load.bullet_manufacturer, &load.bullet_type])),
        ("Weight", load.bullet_weight_grains.map(|w| format!("{} gr", w))),
        ("Diameter", load.bullet_diameter_inches.map(|d| format!("{} in", d))),
        ("Powder", join_some(&[&load.powder_manufacturer, &load.powder_type])),
        ("Charge", load.charge_weight_grains.map(|c| format!("{} gr", c))),
        ("Primer", join_some(&[&load.primer_manufacturer, &load.primer_type])),
        ("Case", load.case_manufacturer.clone()),
        ("COAL", load.total_cartridge_length_mm.map(|l| format!("{} mm", l))),
        ("Velocity", load.velocity_ms.map(|v| format!("{} m/s", v))),
        ("SD / ES", match (load.velocity_sd, load.velocity_es) {
            (None, None) => None,
            (sd, es) => Some(format!("{} / {}", format_number(sd), format_number(es))),
        }),
        ("Group", load.group_size_mm.map(|g| format!("{} mm", g))),
        ("Distance", load.distance_meters.map(|d| format!("{} m", d))),
        ("Tested", load.tested_date.clone()),
        ("Batch", load.batch_number.clone()),
        ("Notes", load.notes.clone()),
    ];
    for (label, value) in rows {
        if let Some(value) = value {
            println!("{:<12} {}", format!("{}:", label), value);
        }
    }
    println!();
    println!("Source:      {}", load.source.as_ref().map(|s| s.as_str()).unwrap_or("(none)"));
    println!("Collection:  {}", if load.in_my_collection { "yes" } else { "no" });
    println!("Created:     {}", format_timestamp(&load.created_at));
    Ok(())
}

fn cmd_import(book: &LoadBook, path: &Path, source: &str, json: bool) -> Result<()> {
    let summary = book.import_from_spreadsheet(path, &Source::parse(source))?;
    if json {
        return print_json(&summary);
    }
    if !summary.success {
        print_row_errors(&summary.errors);
        anyhow::bail!("Import from {} failed", path.display());
    }

    println!("Import complete:");
    println!("  Imported:  {}", summary.imported);
    println!("  Skipped:   {}", summary.skipped);
    println!("  Errors:    {}", summary.errors.len());
    print_row_errors(&summary.errors);
    Ok(())
}

fn cmd_replace(book: &mut LoadBook, path: &Path, json: bool) -> Result<()> {
    let summary = book.replace_imported_data(path)?;
    if json {
        return print_json(&summary);
    }

    println!("Replace complete:");
    println!("  Deleted:     {}", summary.deleted);
    println!("  Preserved:   {}", summary.preserved);
    println!("  Imported:    {}", summary.imported);
    println!("  Skipped:     {}", summary.skipped);
    println!("  Errors:      {}", summary.errors.len());
    println!("  Loads:       {} -> {} ({} user)", summary.counts.before, summary.counts.after, summary.counts.user_loads);
    print_row_errors(&summary.errors);
    Ok(())
}

// ----- Helpers -----

fn parse_pairs(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
                .ok_or_else(|| anyhow::anyhow!("Filter {:?} must look like key=value", pair))
        })
        .collect()
}

fn read_input(file: &Path) -> Result<LoadInput> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Cannot read {}", file.display()))?;
    let input = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a valid load", file.display()))?;
    Ok(input)
}

fn print_load_saved(verb: &str, load: &Load, json: bool) -> Result<()> {
    if json {
        return print_json(load);
    }
    println!("{} load {} ({})", verb, load.id, load.caliber);
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_row_errors(errors: &[RowError]) {
    for err in errors {
        println!("  [{}] {}", serde_json::to_string(&err.row).unwrap_or_default(), err.error);
    }
}

fn describe(input: &LoadInput) -> String {
    let mut parts = vec![input.caliber.clone()];
    parts.extend(join_some(&[&input.bullet_manufacturer, &input.bullet_type]));
    parts.extend(input.bullet_weight_grains.map(|w| format!("{} gr", w)));
    parts.extend(input.powder_type.clone());
    parts.extend(input.charge_weight_grains.map(|c| format!("{} gr", c)));
    if let Some(source) = &input.source {
        parts.push(format!("[{}]", source));
    }
    parts.join("  ")
}

fn join_some(values: &[&Option<String>]) -> Option<String> {
    let joined = values
        .iter()
        .filter_map(|v| v.as_deref())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() { None } else { Some(joined) }
}

/// Stored UTC timestamps are shown in local time.
fn format_timestamp(stored: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(stored)
        .map(|t| t.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|_| stored.to_string())
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        format!("{}...", s.chars().take(max - 3).collect::<String>())
    } else {
        s.to_string()
    }
}
