use std::str::FromStr;

use rusqlite::{params, Connection};
use uuid::Uuid;

use crate::db::DatabaseError;
use crate::models::enums::VisitStatus;
use crate::models::*;

pub fn insert_visit(conn: &Connection, visit: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO visits (id, branch_ref, patient_ref, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            visit.id.to_string(),
            visit.branch_ref,
            visit.patient_ref,
            visit.status.as_str(),
            visit.created_at,
            visit.updated_at,
        ],
    )?;
    Ok(())
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<Option<Visit>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, branch_ref, patient_ref, status, created_at, updated_at
         FROM visits WHERE id = ?1",
    )?;

    let result = stmt.query_row(params![id.to_string()], |row| {
        Ok(VisitRow {
            id: row.get(0)?,
            branch_ref: row.get(1)?,
            patient_ref: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    });

    match result {
        Ok(row) => Ok(Some(visit_from_row(row)?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Conditionally move a visit from `from` to `to`.
///
/// Returns `false` when the visit was not in `from` (someone else already
/// advanced it); the storage guard rejects backward moves outright.
pub fn advance_visit_status(
    conn: &Connection,
    id: &Uuid,
    from: VisitStatus,
    to: VisitStatus,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE visits SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
        params![id.to_string(), from.as_str(), to.as_str(), super::now_timestamp()],
    )?;
    Ok(changed == 1)
}

pub fn insert_test_order(conn: &Connection, order: &TestOrder) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO test_orders (id, visit_id, test_code, test_name, unit, unit_price,
         ref_min, ref_max, position, ordered_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            order.id.to_string(),
            order.visit_id.to_string(),
            order.test_code,
            order.test_name,
            order.unit,
            order.unit_price,
            order.ref_min,
            order.ref_max,
            order.position,
            order.ordered_at,
        ],
    )?;
    Ok(())
}

/// Orders for a visit in the order they were placed.
pub fn get_test_orders(conn: &Connection, visit_id: &Uuid) -> Result<Vec<TestOrder>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, visit_id, test_code, test_name, unit, unit_price,
         ref_min, ref_max, position, ordered_at
         FROM test_orders WHERE visit_id = ?1 ORDER BY position ASC",
    )?;

    let rows = stmt.query_map(params![visit_id.to_string()], |row| Ok(order_row_from_rusqlite(row)))?;

    let mut orders = Vec::new();
    for row in rows {
        orders.push(order_from_row(row??)?);
    }
    Ok(orders)
}

pub fn next_order_position(conn: &Connection, visit_id: &Uuid) -> Result<i64, DatabaseError> {
    let next = conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM test_orders WHERE visit_id = ?1",
        params![visit_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Billing total from frozen order prices only.
pub fn visit_billing_total(conn: &Connection, visit_id: &Uuid) -> Result<i64, DatabaseError> {
    let total = conn.query_row(
        "SELECT COALESCE(SUM(unit_price), 0) FROM test_orders WHERE visit_id = ?1",
        params![visit_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(total)
}

// Internal row types for Visit / TestOrder mapping
struct VisitRow {
    id: String,
    branch_ref: String,
    patient_ref: String,
    status: String,
    created_at: String,
    updated_at: String,
}

fn visit_from_row(row: VisitRow) -> Result<Visit, DatabaseError> {
    Ok(Visit {
        id: super::parse_uuid(&row.id)?,
        branch_ref: row.branch_ref,
        patient_ref: row.patient_ref,
        status: VisitStatus::from_str(&row.status)?,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

struct OrderRow {
    id: String,
    visit_id: String,
    test_code: String,
    test_name: String,
    unit: Option<String>,
    unit_price: i64,
    ref_min: f64,
    ref_max: f64,
    position: i64,
    ordered_at: String,
}

fn order_row_from_rusqlite(row: &rusqlite::Row<'_>) -> Result<OrderRow, rusqlite::Error> {
    Ok(OrderRow {
        id: row.get(0)?,
        visit_id: row.get(1)?,
        test_code: row.get(2)?,
        test_name: row.get(3)?,
        unit: row.get(4)?,
        unit_price: row.get(5)?,
        ref_min: row.get(6)?,
        ref_max: row.get(7)?,
        position: row.get(8)?,
        ordered_at: row.get(9)?,
    })
}

fn order_from_row(row: OrderRow) -> Result<TestOrder, DatabaseError> {
    Ok(TestOrder {
        id: super::parse_uuid(&row.id)?,
        visit_id: super::parse_uuid(&row.visit_id)?,
        test_code: row.test_code,
        test_name: row.test_name,
        unit: row.unit,
        unit_price: row.unit_price,
        ref_min: row.ref_min,
        ref_max: row.ref_max,
        position: row.position,
        ordered_at: row.ordered_at,
    })
}
