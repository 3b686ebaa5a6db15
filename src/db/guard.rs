//! Immutability guard: classification of storage-level rejections.
//!
//! The guard itself lives in SQLite (migrations 002 and 003 under `resources/migrations/`):
//! triggers abort any write against a finalized report version, its results,
//! frozen test orders, or a completed visit. This module turns those trigger
//! aborts into typed errors so they can never be mistaken for ordinary
//! constraint failures.

use rusqlite::ErrorCode;

use super::DatabaseError;

/// Message prefix raised by triggers guarding finalized/frozen rows.
pub const IMMUTABLE_PREFIX: &str = "IMMUTABLE:";

/// Message prefix raised by triggers guarding illegal state transitions.
pub const INVALID_PREFIX: &str = "INVALID:";

/// Tracing target for immutability alerts.
pub const ALERT_TARGET: &str = "labvault::immutability";

/// Map a raw SQLite error onto the database error taxonomy.
pub fn classify(err: rusqlite::Error) -> DatabaseError {
    let message = match &err {
        rusqlite::Error::SqliteFailure(e, Some(msg)) if e.code == ErrorCode::ConstraintViolation => {
            msg.clone()
        }
        _ => return DatabaseError::Sqlite(err),
    };

    if let Some(rest) = message.strip_prefix(IMMUTABLE_PREFIX) {
        let detail = rest.trim().to_string();
        tracing::error!(target: ALERT_TARGET, detail = %detail, "Storage rejected write to immutable record");
        DatabaseError::ImmutabilityViolation(detail)
    } else if let Some(rest) = message.strip_prefix(INVALID_PREFIX) {
        DatabaseError::ConstraintViolation(rest.trim().to_string())
    } else {
        DatabaseError::Sqlite(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use rusqlite::{params, Connection};

    /// Seed a visit with one order and one finalized report version,
    /// using raw SQL the way an admin tool with direct access would.
    fn seed_finalized(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, status, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', 'awaiting_results', '2024-01-01', '2024-01-01');
             INSERT INTO test_orders (id, visit_id, test_code, test_name, unit_price, ref_min, ref_max, position, ordered_at)
             VALUES ('o1', 'v1', 'CBC', 'Complete Blood Count', 35000, 4.0, 11.0, 0, '2024-01-01');
             INSERT INTO report_versions (id, visit_id, version_number, status, created_at, updated_at)
             VALUES ('r1', 'v1', 1, 'draft', '2024-01-01', '2024-01-01');
             INSERT INTO test_results (id, version_id, order_id, value, flag, notes)
             VALUES ('t1', 'r1', 'o1', 12.0, 'high', NULL);
             UPDATE report_versions
                SET status = 'finalized', finalized_at = '2024-01-02T00:00:00Z', access_token = 'tok'
              WHERE id = 'r1';
             UPDATE visits SET status = 'completed' WHERE id = 'v1';",
        )
        .unwrap();
    }

    fn snapshot(conn: &Connection) -> (String, Option<String>, Option<String>, f64, String) {
        conn.query_row(
            "SELECT rv.status, rv.notes, rv.access_token, tr.value, tr.flag
             FROM report_versions rv JOIN test_results tr ON tr.version_id = rv.id
             WHERE rv.id = 'r1'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
        )
        .unwrap()
    }

    fn expect_immutable(result: Result<usize, rusqlite::Error>) {
        let err = DatabaseError::from(result.unwrap_err());
        assert!(err.is_immutability_violation(), "expected immutability violation, got {err:?}");
    }

    #[test]
    fn finalized_version_rejects_direct_updates() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        let before = snapshot(&conn);

        expect_immutable(conn.execute("UPDATE report_versions SET notes = 'edited' WHERE id = 'r1'", []));
        expect_immutable(conn.execute("UPDATE report_versions SET status = 'draft' WHERE id = 'r1'", []));
        expect_immutable(conn.execute("UPDATE report_versions SET access_token = 'other' WHERE id = 'r1'", []));
        expect_immutable(conn.execute("DELETE FROM report_versions WHERE id = 'r1'", []));

        assert_eq!(snapshot(&conn), before);
    }

    #[test]
    fn finalized_results_reject_insert_update_delete() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        let before = snapshot(&conn);

        expect_immutable(conn.execute("UPDATE test_results SET value = 1.0 WHERE id = 't1'", []));
        expect_immutable(conn.execute("UPDATE test_results SET notes = 'x' WHERE id = 't1'", []));
        expect_immutable(conn.execute("DELETE FROM test_results WHERE version_id = 'r1'", []));
        expect_immutable(conn.execute(
            "INSERT INTO test_results (id, version_id, order_id, value) VALUES (?1, 'r1', 'o1', 1.0)",
            params!["t2"],
        ));

        assert_eq!(snapshot(&conn), before);
    }

    #[test]
    fn completed_visit_and_orders_are_frozen() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);

        expect_immutable(conn.execute("UPDATE visits SET patient_ref = 'p2' WHERE id = 'v1'", []));
        expect_immutable(conn.execute("DELETE FROM visits WHERE id = 'v1'", []));
        expect_immutable(conn.execute("UPDATE test_orders SET unit_price = 1 WHERE id = 'o1'", []));
        expect_immutable(conn.execute("DELETE FROM test_orders WHERE id = 'o1'", []));
    }

    #[test]
    fn guard_holds_inside_transactions() {
        let mut conn = open_memory_database().unwrap();
        seed_finalized(&conn);

        let tx = conn.transaction().unwrap();
        let err = tx
            .execute("UPDATE report_versions SET notes = 'edited' WHERE id = 'r1'", [])
            .unwrap_err();
        assert!(DatabaseError::from(err).is_immutability_violation());
        tx.rollback().unwrap();

        let notes: Option<String> = conn
            .query_row("SELECT notes FROM report_versions WHERE id = 'r1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(notes, None);
    }

    #[test]
    fn draft_version_remains_editable() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', '2024-01-01', '2024-01-01');
             INSERT INTO report_versions (id, visit_id, version_number, created_at, updated_at)
             VALUES ('r1', 'v1', 1, '2024-01-01', '2024-01-01');",
        )
        .unwrap();

        let changed = conn
            .execute("UPDATE report_versions SET notes = 'edited' WHERE id = 'r1'", [])
            .unwrap();
        assert_eq!(changed, 1);
    }

    #[test]
    fn finalizing_without_token_is_rejected() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', '2024-01-01', '2024-01-01');
             INSERT INTO report_versions (id, visit_id, version_number, created_at, updated_at)
             VALUES ('r1', 'v1', 1, '2024-01-01', '2024-01-01');",
        )
        .unwrap();

        let err = conn
            .execute("UPDATE report_versions SET status = 'finalized' WHERE id = 'r1'", [])
            .unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn versions_cannot_be_inserted_as_finalized() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', '2024-01-01', '2024-01-01');",
        )
        .unwrap();

        let err = conn
            .execute(
                "INSERT INTO report_versions (id, visit_id, version_number, status, created_at, updated_at,
                 finalized_at, access_token)
                 VALUES ('r1', 'v1', 1, 'finalized', '2024-01-01', '2024-01-01', '2024-01-01', 'tok')",
                [],
            )
            .unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn visit_status_cannot_move_backwards() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, status, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', 'awaiting_results', '2024-01-01', '2024-01-01');",
        )
        .unwrap();

        let err = conn
            .execute("UPDATE visits SET status = 'draft' WHERE id = 'v1'", [])
            .unwrap_err();
        assert!(matches!(DatabaseError::from(err), DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn second_draft_for_same_visit_is_rejected() {
        let conn = open_memory_database().unwrap();
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, created_at, updated_at)
             VALUES ('v1', 'b1', 'p1', '2024-01-01', '2024-01-01');
             INSERT INTO report_versions (id, visit_id, version_number, created_at, updated_at)
             VALUES ('r1', 'v1', 1, '2024-01-01', '2024-01-01');",
        )
        .unwrap();

        let result = conn.execute(
            "INSERT INTO report_versions (id, visit_id, version_number, created_at, updated_at)
             VALUES ('r2', 'v1', 2, '2024-01-01', '2024-01-01')",
            [],
        );
        let err = DatabaseError::from(result.unwrap_err());
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }

    /// A second visit still open for editing: order `o2`, draft `r2`.
    fn seed_open_visit(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO visits (id, branch_ref, patient_ref, status, created_at, updated_at)
             VALUES ('v2', 'b1', 'p2', 'awaiting_results', '2024-01-01', '2024-01-01');
             INSERT INTO test_orders (id, visit_id, test_code, test_name, unit_price, ref_min, ref_max, position, ordered_at)
             VALUES ('o2', 'v2', 'CBC', 'Complete Blood Count', 35000, 4.0, 11.0, 0, '2024-01-01');
             INSERT INTO report_versions (id, visit_id, version_number, status, created_at, updated_at)
             VALUES ('r2', 'v2', 1, 'draft', '2024-01-01', '2024-01-01');",
        )
        .unwrap();
    }

    #[test]
    fn replace_cannot_reopen_finalized_version() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        let before = snapshot(&conn);

        for verb in ["INSERT OR REPLACE", "REPLACE"] {
            expect_immutable(conn.execute(
                &format!(
                    "{verb} INTO report_versions (id, visit_id, version_number, status, notes, created_at, updated_at)
                     VALUES ('r1', 'v1', 1, 'draft', 'tampered', '2024-01-01', '2024-01-01')"
                ),
                [],
            ));
            // Same (visit, version number) under a fresh id.
            expect_immutable(conn.execute(
                &format!(
                    "{verb} INTO report_versions (id, visit_id, version_number, status, created_at, updated_at)
                     VALUES ('r9', 'v1', 1, 'draft', '2024-01-01', '2024-01-01')"
                ),
                [],
            ));
        }

        assert_eq!(snapshot(&conn), before);
    }

    #[test]
    fn replace_cannot_reset_completed_visit() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);

        for verb in ["INSERT OR REPLACE", "REPLACE"] {
            expect_immutable(conn.execute(
                &format!(
                    "{verb} INTO visits (id, branch_ref, patient_ref, status, created_at, updated_at)
                     VALUES ('v1', 'b1', 'p1', 'draft', '2024-01-01', '2024-01-01')"
                ),
                [],
            ));
        }

        let status: String = conn
            .query_row("SELECT status FROM visits WHERE id = 'v1'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(status, "completed");
    }

    #[test]
    fn replace_cannot_rewrite_frozen_order_price() {
        let conn = open_memory_database().unwrap();
        seed_open_visit(&conn);

        for verb in ["INSERT OR REPLACE", "REPLACE"] {
            for id in ["o2", "o9"] {
                expect_immutable(conn.execute(
                    &format!(
                        "{verb} INTO test_orders (id, visit_id, test_code, test_name, unit_price, ref_min, ref_max, position, ordered_at)
                         VALUES (?1, 'v2', 'CBC', 'Complete Blood Count', 1, 4.0, 11.0, 0, '2024-01-01')"
                    ),
                    params![id],
                ));
            }
        }

        let price: i64 = conn
            .query_row("SELECT unit_price FROM test_orders WHERE visit_id = 'v2'", [], |row| row.get(0))
            .unwrap();
        assert_eq!(price, 35000);
    }

    #[test]
    fn replace_cannot_remove_finalized_result() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        seed_open_visit(&conn);
        let before = snapshot(&conn);

        for verb in ["INSERT OR REPLACE", "REPLACE"] {
            // Re-homes result t1 onto the open draft r2.
            expect_immutable(conn.execute(
                &format!(
                    "{verb} INTO test_results (id, version_id, order_id, value)
                     VALUES ('t1', 'r2', 'o2', 1.0)"
                ),
                [],
            ));
        }

        assert_eq!(snapshot(&conn), before);
    }

    #[test]
    fn update_or_replace_cannot_collide_with_protected_rows() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        seed_open_visit(&conn);
        conn.execute(
            "INSERT INTO test_results (id, version_id, order_id, value) VALUES ('t2', 'r2', 'o2', 5.0)",
            [],
        )
        .unwrap();
        let before = snapshot(&conn);

        expect_immutable(conn.execute(
            "UPDATE OR REPLACE report_versions SET access_token = 'tok' WHERE id = 'r2'",
            [],
        ));
        expect_immutable(conn.execute("UPDATE OR REPLACE test_results SET id = 't1' WHERE id = 't2'", []));
        expect_immutable(conn.execute("UPDATE OR REPLACE visits SET id = 'v1' WHERE id = 'v2'", []));

        assert_eq!(snapshot(&conn), before);
        let visits: i64 = conn
            .query_row("SELECT COUNT(*) FROM visits", [], |row| row.get(0))
            .unwrap();
        assert_eq!(visits, 2);
    }

    #[test]
    fn draft_rows_still_accept_normal_writes() {
        let conn = open_memory_database().unwrap();
        seed_finalized(&conn);
        seed_open_visit(&conn);

        conn.execute(
            "INSERT INTO test_results (id, version_id, order_id, value) VALUES ('t2', 'r2', 'o2', 5.0)",
            [],
        )
        .unwrap();
        conn.execute("UPDATE test_results SET value = 6.0 WHERE id = 't2'", []).unwrap();
        conn.execute("DELETE FROM test_results WHERE version_id = 'r2'", []).unwrap();
        conn.execute(
            "UPDATE report_versions SET status = 'finalized', finalized_at = '2024-01-03', access_token = 'tok2'
             WHERE id = 'r2'",
            [],
        )
        .unwrap();
    }

    #[test]
    fn non_constraint_errors_pass_through() {
        let err = classify(rusqlite::Error::QueryReturnedNoRows);
        assert!(matches!(err, DatabaseError::Sqlite(rusqlite::Error::QueryReturnedNoRows)));
    }
}
