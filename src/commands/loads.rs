// Loadbook - Load Commands
// CRUD, collection flag, lookups and presets

use crate::db::presets;
use crate::db::query::{self, LoadFilters, LoadPage};
use crate::db::schema::{self, FieldValue, FilterOptions, Load, LoadInput};
use crate::error::{LoadbookError, Result};
use super::LoadBook;

impl LoadBook {
    /// Filtered, sorted, paginated listing.
    pub fn list_loads(&self, filters: &LoadFilters) -> Result<LoadPage> {
        query::list_loads(&self.conn, filters)
    }

    pub fn get_load(&self, id: i64) -> Result<Option<Load>> {
        schema::get_load(&self.conn, id)
    }

    /// Create a load. Without an explicit source it is recorded as user data.
    pub fn create_load(&self, input: &LoadInput) -> Result<Load> {
        let id = schema::insert_load(&self.conn, input)?;
        schema::get_load(&self.conn, id)?
            .ok_or_else(|| LoadbookError::Other(format!("Load {} vanished after insert", id)))
    }

    pub fn update_load(&self, id: i64, input: &LoadInput) -> Result<Option<Load>> {
        if !schema::update_load(&self.conn, id, input)? {
            return Ok(None);
        }
        schema::get_load(&self.conn, id)
    }

    pub fn delete_load(&self, id: i64) -> Result<bool> {
        schema::delete_load(&self.conn, id)
    }

    // ----- My collection -----

    pub fn toggle_collection(&self, id: i64) -> Result<Option<Load>> {
        match schema::toggle_in_collection(&self.conn, id)? {
            Some(_) => schema::get_load(&self.conn, id),
            None => Ok(None),
        }
    }

    pub fn add_to_collection(&self, id: i64) -> Result<Option<Load>> {
        self.set_collection(id, true)
    }

    pub fn remove_from_collection(&self, id: i64) -> Result<Option<Load>> {
        self.set_collection(id, false)
    }

    fn set_collection(&self, id: i64, in_collection: bool) -> Result<Option<Load>> {
        if !schema::set_in_collection(&self.conn, id, in_collection)? {
            return Ok(None);
        }
        schema::get_load(&self.conn, id)
    }

    // ----- Lookups -----

    pub fn distinct_values(&self, column: &str) -> Result<Vec<FieldValue>> {
        schema::get_distinct_values(&self.conn, column)
    }

    pub fn filter_options(&self) -> Result<FilterOptions> {
        schema::get_filter_options(&self.conn)
    }

    pub fn caliber_presets(&self) -> Result<Vec<String>> {
        presets::get_caliber_presets(&self.conn)
    }

    pub fn bullet_brand_presets(&self) -> Result<Vec<String>> {
        presets::get_bullet_brand_presets(&self.conn)
    }

    pub fn powder_manufacturer_presets(&self) -> Result<Vec<String>> {
        presets::get_powder_manufacturer_presets(&self.conn)
    }

    pub fn powder_type_presets(&self, manufacturer: Option<&str>) -> Result<Vec<String>> {
        presets::get_powder_type_presets(&self.conn, manufacturer)
    }
}
