// Filtered, sorted, paginated load queries
//
// Filters are collected once into a FilterSet; the paged statement and the
// count statement are both rendered from it so their predicates and bound
// parameters cannot drift apart.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, DEFAULT_SORT_FIELD, SORT_FIELDS, SOURCE_IMPORTED, SOURCE_USER};
use crate::db::schema::{map_load, Load, LOAD_COLUMNS};
use crate::error::Result;

// ----- Filter input -----

/// Typed filter request. Build it directly or from raw query-string pairs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadFilters {
    pub caliber: Option<String>,
    pub bullet_manufacturer: Option<String>,
    pub bullet_type: Option<String>,
    pub bullet_weight_grains: Option<f64>,
    pub powder_manufacturer: Option<String>,
    pub powder_type: Option<String>,
    pub charge_weight_grains: Option<f64>,
    pub velocity_ms: Option<f64>,
    pub total_cartridge_length_mm: Option<f64>,
    pub source: Option<String>,
    pub my_collection: bool,
    pub bullet_weight_min: Option<f64>,
    pub bullet_weight_max: Option<f64>,
    pub search: Option<String>,
    pub sort_field: Option<String>,
    pub sort_order: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl LoadFilters {
    /// Parse raw key/value pairs. Unknown keys and empty values are ignored;
    /// a numeric key without a leading number still filters, and matches nothing.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Self::default();
        for (key, value) in pairs {
            filters.set(key.as_ref(), value.as_ref());
        }
        filters
    }

    /// Apply one raw filter value. Returns false for an unrecognized key.
    pub fn set(&mut self, key: &str, value: &str) -> bool {
        match key {
            "caliber" => self.caliber = text(value),
            "bullet_manufacturer" => self.bullet_manufacturer = text(value),
            "bullet_type" => self.bullet_type = text(value),
            "bullet_weight_grains" => self.bullet_weight_grains = number(key, value),
            "powder_manufacturer" => self.powder_manufacturer = text(value),
            "powder_type" => self.powder_type = text(value),
            "charge_weight_grains" => self.charge_weight_grains = number(key, value),
            "velocity_ms" => self.velocity_ms = number(key, value),
            "total_cartridge_length_mm" => self.total_cartridge_length_mm = number(key, value),
            "source" => self.source = text(value),
            "my_collection" => self.my_collection = flag(value),
            "bullet_weight_min" => self.bullet_weight_min = number(key, value),
            "bullet_weight_max" => self.bullet_weight_max = number(key, value),
            "search" => self.search = text(value),
            "sort_field" => self.sort_field = text(value),
            "sort_order" => self.sort_order = text(value),
            "page" => self.page = integer(value),
            "limit" => self.limit = integer(value),
            _ => return false,
        }
        true
    }

    /// Filters matching every load with the default imported label.
    pub fn imported() -> Self {
        Self {
            source: Some(SOURCE_IMPORTED.to_string()),
            ..Default::default()
        }
    }
}

fn text(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a numeric filter from its longest leading number ("820abc" is 820).
/// Text with no leading number becomes NaN: the filter stays applied and
/// matches nothing.
fn number(key: &str, value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match leading_number(trimmed) {
        Some(n) => Some(n),
        None => {
            log::debug!("Non-numeric value {:?} for filter {} matches no loads", value, key);
            Some(f64::NAN)
        }
    }
}

fn leading_number(text: &str) -> Option<f64> {
    (1..=text.len())
        .rev()
        .filter(|end| text.is_char_boundary(*end))
        .find_map(|end| text[..end].parse::<f64>().ok().filter(|n| n.is_finite()))
}

/// NaN binds as NULL, which no comparison matches.
fn number_value(n: f64) -> Value {
    if n.is_finite() {
        Value::Real(n)
    } else {
        Value::Null
    }
}

fn integer(value: &str) -> Option<i64> {
    value.trim().parse::<i64>().ok()
}

fn flag(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

// ----- Predicates -----

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Equals(&'static str, Value),
    AtLeast(&'static str, Value),
    AtMost(&'static str, Value),
    /// Case-insensitive substring match; the needle is stored lowercase and unescaped.
    Contains(&'static str, String),
    MyCollection,
}

impl Predicate {
    fn sql(&self) -> String {
        match self {
            Predicate::Equals(column, _) => format!("{} = ?", column),
            Predicate::AtLeast(column, _) => format!("{} >= ?", column),
            Predicate::AtMost(column, _) => format!("{} <= ?", column),
            Predicate::Contains(column, _) => format!("{} LIKE ? ESCAPE '\\'", column),
            Predicate::MyCollection => "(source = ? OR in_my_collection = 1)".to_string(),
        }
    }

    fn param(&self) -> Value {
        match self {
            Predicate::Equals(_, v) | Predicate::AtLeast(_, v) | Predicate::AtMost(_, v) => v.clone(),
            Predicate::Contains(_, needle) => Value::Text(format!("%{}%", escape_like(needle))),
            Predicate::MyCollection => Value::Text(SOURCE_USER.to_string()),
        }
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// The single predicate list shared by the paged and count statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
}

impl FilterSet {
    pub fn from_filters(filters: &LoadFilters) -> Self {
        let mut set = Self::default();

        set.push_text("caliber", &filters.caliber);
        set.push_text("bullet_manufacturer", &filters.bullet_manufacturer);
        set.push_text("bullet_type", &filters.bullet_type);
        set.push_number("bullet_weight_grains", filters.bullet_weight_grains);
        set.push_text("powder_manufacturer", &filters.powder_manufacturer);
        set.push_text("powder_type", &filters.powder_type);
        set.push_number("charge_weight_grains", filters.charge_weight_grains);
        set.push_number("velocity_ms", filters.velocity_ms);
        set.push_number("total_cartridge_length_mm", filters.total_cartridge_length_mm);
        set.push_text("source", &filters.source);

        if filters.my_collection {
            set.predicates.push(Predicate::MyCollection);
        }

        if let Some(min) = filters.bullet_weight_min {
            set.predicates.push(Predicate::AtLeast("bullet_weight_grains", number_value(min)));
        }
        if let Some(max) = filters.bullet_weight_max {
            set.predicates.push(Predicate::AtMost("bullet_weight_grains", number_value(max)));
        }

        if let Some(search) = filters.search.as_deref().filter(|s| !s.is_empty()) {
            set.predicates.push(Predicate::Contains("search_text", search.to_lowercase()));
        }

        set
    }

    fn push_text(&mut self, column: &'static str, value: &Option<String>) {
        if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
            self.predicates.push(Predicate::Equals(column, Value::Text(v.to_string())));
        }
    }

    fn push_number(&mut self, column: &'static str, value: Option<f64>) {
        if let Some(v) = value {
            self.predicates.push(Predicate::Equals(column, number_value(v)));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    /// ` WHERE a = ? AND b = ?`, or an empty string when nothing is filtered.
    pub fn where_clause(&self) -> String {
        if self.predicates.is_empty() {
            return String::new();
        }
        let parts: Vec<String> = self.predicates.iter().map(Predicate::sql).collect();
        format!(" WHERE {}", parts.join(" AND "))
    }

    /// Bound values in the same order as the placeholders in `where_clause`.
    pub fn params(&self) -> Vec<Value> {
        self.predicates.iter().map(Predicate::param).collect()
    }
}

// ----- Sorting and paging -----

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: &'static str,
    pub order: SortOrder,
}

impl Sort {
    /// Resolve against the allow-list; anything unknown sorts by creation time.
    pub fn from_filters(filters: &LoadFilters) -> Self {
        let requested = filters.sort_field.as_deref().unwrap_or(DEFAULT_SORT_FIELD);
        let field = SORT_FIELDS
            .iter()
            .copied()
            .find(|f| *f == requested)
            .unwrap_or(DEFAULT_SORT_FIELD);
        Self {
            field,
            order: SortOrder::parse(filters.sort_order.as_deref()),
        }
    }

    fn order_by(&self) -> String {
        // id breaks ties so pages never overlap
        let order = self.order.as_sql();
        format!(" ORDER BY {} {}, id {}", self.field, order, order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn from_filters(filters: &LoadFilters) -> Self {
        Self {
            page: filters.page.filter(|p| *p >= 1).unwrap_or(DEFAULT_PAGE),
            limit: filters.limit.filter(|l| *l >= 1).unwrap_or(DEFAULT_PAGE_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

// ----- Statements -----

/// Rendered SQL with its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadQuery {
    pub filters: FilterSet,
    pub sort: Sort,
    pub page: PageRequest,
}

impl LoadQuery {
    pub fn new(filters: &LoadFilters) -> Self {
        Self {
            filters: FilterSet::from_filters(filters),
            sort: Sort::from_filters(filters),
            page: PageRequest::from_filters(filters),
        }
    }

    pub fn page_statement(&self) -> Statement {
        let sql = format!(
            "SELECT {} FROM loads{}{} LIMIT ? OFFSET ?",
            LOAD_COLUMNS,
            self.filters.where_clause(),
            self.sort.order_by(),
        );
        let mut params = self.filters.params();
        params.push(Value::Integer(self.page.limit));
        params.push(Value::Integer(self.page.offset()));
        Statement { sql, params }
    }

    pub fn count_statement(&self) -> Statement {
        Statement {
            sql: format!("SELECT COUNT(*) FROM loads{}", self.filters.where_clause()),
            params: self.filters.params(),
        }
    }
}

// ----- Results -----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: PageRequest, total: i64) -> Self {
        Self {
            page: page.page,
            limit: page.limit,
            total,
            total_pages: total / page.limit + i64::from(total % page.limit != 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadPage {
    pub records: Vec<Load>,
    pub pagination: Pagination,
}

/// Run the paged query and its count query.
pub fn list_loads(conn: &Connection, filters: &LoadFilters) -> Result<LoadPage> {
    let query = LoadQuery::new(filters);

    let page = query.page_statement();
    let mut stmt = conn.prepare(&page.sql)?;
    let rows = stmt.query_map(params_from_iter(page.params.iter()), map_load)?;
    let mut records = Vec::new();
    for load in rows {
        records.push(load?);
    }

    let total = run_count(conn, &query.count_statement())?;

    Ok(LoadPage {
        records,
        pagination: Pagination::new(query.page, total),
    })
}

/// Number of loads matching the filters; paging and sorting keys are ignored.
pub fn count_matching(conn: &Connection, filters: &LoadFilters) -> Result<i64> {
    run_count(conn, &LoadQuery::new(filters).count_statement())
}

fn run_count(conn: &Connection, count: &Statement) -> Result<i64> {
    let total: i64 = conn.query_row(&count.sql, params_from_iter(count.params.iter()), |row| row.get(0))?;
    Ok(total)
}
