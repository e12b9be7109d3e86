//! Read-only service category lookup.
//!
//! Categories live in their own database maintained elsewhere; the core
//! treats category IDs as opaque integers and only ever resolves them to
//! display names for the owner UI. The hierarchical category browser is
//! deliberately not part of this module.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: u32,
    pub name: String,
}

/// Read-only handle on the category database.
pub struct CategoryStore {
    conn: Connection,
}

impl CategoryStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS category_list (
                cat_id   INTEGER PRIMARY KEY NOT NULL,
                cat_name TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { conn })
    }

    /// Resolves a category ID to its display name.
    pub fn lookup(&self, cat_id: u32) -> Result<Option<String>, StoreError> {
        let name = self
            .conn
            .query_row(
                "SELECT cat_name FROM category_list WHERE cat_id = ?1",
                params![cat_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    /// All categories, flat, ordered by ID.
    pub fn all(&self) -> Result<Vec<Category>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT cat_id, cat_name FROM category_list ORDER BY cat_id ASC")?;
        let categories = stmt
            .query_map([], |row| {
                Ok(Category {
                    id: row.get::<_, i64>(0)? as u32,
                    name: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(categories)
    }
}
