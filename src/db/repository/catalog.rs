use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::CatalogTest;

/// Insert or replace a catalog entry (admin tooling collaborator).
pub fn upsert_catalog_test(conn: &Connection, test: &CatalogTest) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_catalog (code, name, unit, unit_price, ref_min, ref_max, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(code) DO UPDATE SET
            name = excluded.name,
            unit = excluded.unit,
            unit_price = excluded.unit_price,
            ref_min = excluded.ref_min,
            ref_max = excluded.ref_max,
            updated_at = excluded.updated_at",
        params![
            test.code,
            test.name,
            test.unit,
            test.unit_price,
            test.ref_min,
            test.ref_max,
            super::now_timestamp(),
        ],
    )?;
    Ok(())
}

pub fn get_catalog_test(conn: &Connection, code: &str) -> Result<Option<CatalogTest>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT code, name, unit, unit_price, ref_min, ref_max
         FROM test_catalog WHERE code = ?1",
    )?;

    let result = stmt.query_row(params![code], |row| {
        Ok(CatalogTest {
            code: row.get(0)?,
            name: row.get(1)?,
            unit: row.get(2)?,
            unit_price: row.get(3)?,
            ref_min: row.get(4)?,
            ref_max: row.get(5)?,
        })
    });

    match result {
        Ok(test) => Ok(Some(test)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Change the live catalog price. Orders already placed keep their own copy.
pub fn update_catalog_price(conn: &Connection, code: &str, unit_price: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE test_catalog SET unit_price = ?2, updated_at = ?3 WHERE code = ?1",
        params![code, unit_price, super::now_timestamp()],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "CatalogTest".into(),
            id: code.into(),
        });
    }
    Ok(())
}
