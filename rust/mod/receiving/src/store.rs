use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use openerp_core::{ListParams, ListResult};
use openerp_sql::{Row, SQLError, SQLExec, SQLStore, TxOutcome, Value};
use rust_decimal::Decimal;

use crate::error::ReceivingError;
use crate::identity::{PackPrefix, PackScope, generate_keys};
use crate::model::{
    HeaderGroup, HeaderStatus, PackRecord, Progress, Readiness, ReceiptLine, VerificationStatus,
};

/// SQL DDL for the receiving tables.
///
/// `AUTOINCREMENT` keeps header and line ids from being reused after a
/// delete, which keeps pack identifiers unique over time.
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS receipt_headers (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        document_ref TEXT NOT NULL,
        supplier     TEXT,
        status       TEXT NOT NULL,
        approved_by  TEXT,
        approved_at  TEXT,
        created_at   TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS receipt_lines (
        id             INTEGER PRIMARY KEY AUTOINCREMENT,
        header_id      INTEGER NOT NULL REFERENCES receipt_headers(id) ON DELETE CASCADE,
        item_code      TEXT NOT NULL,
        total_quantity TEXT NOT NULL,
        pack_count     INTEGER NOT NULL DEFAULT 0,
        next_sub_index INTEGER NOT NULL DEFAULT 1,
        created_at     TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_line_header ON receipt_lines(header_id)",
    "CREATE TABLE IF NOT EXISTS pack_records (
        pack_identifier TEXT PRIMARY KEY,
        header_id       INTEGER NOT NULL,
        line_id         INTEGER NOT NULL REFERENCES receipt_lines(id) ON DELETE CASCADE,
        sub_index       INTEGER NOT NULL,
        pack_sequence   INTEGER NOT NULL,
        pack_quantity   INTEGER NOT NULL CHECK (pack_quantity >= 0),
        lot_no          TEXT,
        expiry_date     TEXT,
        status          TEXT NOT NULL,
        verified_at     TEXT,
        verified_by     TEXT,
        created_at      TEXT NOT NULL,
        UNIQUE (line_id, sub_index, pack_sequence)
    )",
    "CREATE INDEX IF NOT EXISTS idx_pack_header_status ON pack_records(header_id, status)",
    "CREATE INDEX IF NOT EXISTS idx_pack_line ON pack_records(line_id)",
];

const PACK_COLUMNS: &str = "pack_identifier, header_id, line_id, sub_index, pack_sequence, \
     pack_quantity, lot_no, expiry_date, status, verified_at, verified_by, created_at";

/// One pack group to be written by [`ReceivingStore::replace_packs`].
#[derive(Debug, Clone)]
pub struct PackGroupPlan {
    pub quantities: Vec<i64>,
    pub lot_no: Option<String>,
    pub expiry_date: Option<NaiveDate>,
}

/// Result of a guarded write that may be refused by current state.
#[derive(Debug)]
pub enum Guarded<T> {
    Done(T),
    HeaderApproved,
    Locked { verified: u64 },
}

/// Persistent storage for headers, lines and packs, backed by SQLStore (SQLite).
pub struct ReceivingStore {
    db: Arc<dyn SQLStore>,
}

impl ReceivingStore {
    /// Create a new ReceivingStore and initialise the schema.
    pub fn new(db: Arc<dyn SQLStore>) -> Result<Self, ReceivingError> {
        for stmt in SCHEMA {
            db.exec(stmt, &[])
                .map_err(|e| ReceivingError::Storage(format!("receiving schema init: {e}")))?;
        }
        Ok(Self { db })
    }

    // -----------------------------------------------------------------------
    // Headers
    // -----------------------------------------------------------------------

    pub fn insert_header(
        &self,
        document_ref: &str,
        supplier: Option<&str>,
        created_at: &str,
    ) -> Result<HeaderGroup, ReceivingError> {
        let rows = self.db.query(
            "INSERT INTO receipt_headers (document_ref, supplier, status, created_at) \
             VALUES (?1, ?2, ?3, ?4) RETURNING *",
            &[
                Value::from(document_ref),
                Value::from(supplier),
                Value::from(HeaderStatus::Draft.as_str()),
                Value::from(created_at),
            ],
        )?;
        let row = rows
            .first()
            .ok_or_else(|| ReceivingError::Storage("header insert returned no row".into()))?;
        Ok(row_to_header(row)?)
    }

    pub fn get_header(&self, id: i64) -> Result<HeaderGroup, ReceivingError> {
        header_on(&*self.db, id)?
            .ok_or_else(|| ReceivingError::NotFound(format!("receipt header {id} not found")))
    }

    pub fn list_headers(&self, params: &ListParams) -> Result<ListResult<HeaderGroup>, ReceivingError> {
        let total = count_on(&*self.db, "SELECT COUNT(*) AS cnt FROM receipt_headers", &[])?;
        let rows = self.db.query(
            "SELECT * FROM receipt_headers ORDER BY id DESC LIMIT ?1 OFFSET ?2",
            &[
                Value::Integer(params.limit as i64),
                Value::Integer(params.offset as i64),
            ],
        )?;
        let items = rows
            .iter()
            .map(row_to_header)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ListResult {
            items,
            total: total as usize,
        })
    }

    /// Delete a header; its lines and packs go with it.
    pub fn delete_header(&self, id: i64) -> Result<(), ReceivingError> {
        let affected = self
            .db
            .exec("DELETE FROM receipt_headers WHERE id = ?1", &[Value::Integer(id)])?;
        if affected == 0 {
            return Err(ReceivingError::NotFound(format!("receipt header {id} not found")));
        }
        Ok(())
    }

    /// Approve a header if, inside the same transaction, every line has
    /// packs and every pack is verified.
    ///
    /// Returns the readiness that was evaluated; the header is approved iff
    /// `readiness.ready`.
    pub fn approve_if_ready(
        &self,
        header_id: i64,
        approved_by: Option<&str>,
        approved_at: &str,
    ) -> Result<Readiness, ReceivingError> {
        let mut readiness = None;
        self.db.transaction(&mut |tx: &dyn SQLExec| -> Result<TxOutcome, SQLError> {
            let r = readiness_on(tx, header_id)?;
            readiness = Some(r);
            if !r.ready {
                return Ok(TxOutcome::Rollback);
            }
            tx.exec(
                "UPDATE receipt_headers SET status = ?1, approved_by = ?2, approved_at = ?3 \
                 WHERE id = ?4 AND status = ?5",
                &[
                    Value::from(HeaderStatus::Approved.as_str()),
                    Value::from(approved_by),
                    Value::from(approved_at),
                    Value::Integer(header_id),
                    Value::from(HeaderStatus::Draft.as_str()),
                ],
            )?;
            Ok(TxOutcome::Commit)
        })?;
        readiness.ok_or_else(|| ReceivingError::Storage("approval transaction did not run".into()))
    }

    // -----------------------------------------------------------------------
    // Lines
    // -----------------------------------------------------------------------

    /// Insert a line under a header that is still a draft.
    pub fn insert_line(
        &self,
        header_id: i64,
        item_code: &str,
        total_quantity: Decimal,
        created_at: &str,
    ) -> Result<Guarded<ReceiptLine>, ReceivingError> {
        let mut result = None;
        self.db.transaction(&mut |tx: &dyn SQLExec| -> Result<TxOutcome, SQLError> {
            let Some(header) = header_on(tx, header_id)? else {
                return Ok(TxOutcome::Rollback);
            };
            if header.status == HeaderStatus::Approved {
                result = Some(Guarded::HeaderApproved);
                return Ok(TxOutcome::Rollback);
            }
            let rows = tx.query(
                "INSERT INTO receipt_lines (header_id, item_code, total_quantity, created_at) \
                 VALUES (?1, ?2, ?3, ?4) RETURNING *",
                &[
                    Value::Integer(header_id),
                    Value::from(item_code),
                    Value::Text(total_quantity.to_string()),
                    Value::from(created_at),
                ],
            )?;
            let row = rows
                .first()
                .ok_or_else(|| SQLError::Execution("line insert returned no row".into()))?;
            result = Some(Guarded::Done(row_to_line(row)?));
            Ok(TxOutcome::Commit)
        })?;
        result.ok_or_else(|| ReceivingError::NotFound(format!("receipt header {header_id} not found")))
    }

    pub fn get_line(&self, id: i64) -> Result<ReceiptLine, ReceivingError> {
        line_on(&*self.db, id)?
            .ok_or_else(|| ReceivingError::NotFound(format!("receipt line {id} not found")))
    }

    pub fn list_lines(&self, header_id: i64) -> Result<Vec<ReceiptLine>, ReceivingError> {
        let rows = self.db.query(
            "SELECT * FROM receipt_lines WHERE header_id = ?1 ORDER BY id",
            &[Value::Integer(header_id)],
        )?;
        Ok(rows.iter().map(row_to_line).collect::<Result<Vec<_>, _>>()?)
    }

    /// Delete a line of a draft header; its packs go with it.
    ///
    /// The header status check and the delete share one transaction, so an
    /// approval cannot slip in between them.
    pub fn delete_line(&self, id: i64) -> Result<Guarded<()>, ReceivingError> {
        let mut result = None;
        self.db.transaction(&mut |tx: &dyn SQLExec| -> Result<TxOutcome, SQLError> {
            let Some(line) = line_on(tx, id)? else {
                return Ok(TxOutcome::Rollback);
            };
            let header_status = header_on(tx, line.header_id)?.map(|h| h.status);
            if header_status == Some(HeaderStatus::Approved) {
                result = Some(Guarded::HeaderApproved);
                return Ok(TxOutcome::Rollback);
            }
            tx.exec("DELETE FROM receipt_lines WHERE id = ?1", &[Value::Integer(id)])?;
            result = Some(Guarded::Done(()));
            Ok(TxOutcome::Commit)
        })?;
        result.ok_or_else(|| ReceivingError::NotFound(format!("receipt line {id} not found")))
    }

    // -----------------------------------------------------------------------
    // Packs
    // -----------------------------------------------------------------------

    /// Replace every pack of a line with freshly generated pack groups.
    ///
    /// Runs as one transaction that first re-checks the header is a draft
    /// and no pack of the line is verified. Each group receives a new
    /// sub-index from the line's counter, so identifiers of deleted packs
    /// are never handed out again.
    pub fn replace_packs(
        &self,
        line_id: i64,
        total_quantity: Decimal,
        groups: &[PackGroupPlan],
        prefix: &PackPrefix,
        created_at: &str,
    ) -> Result<Guarded<Vec<PackRecord>>, ReceivingError> {
        let mut result = None;
        self.db.transaction(&mut |tx: &dyn SQLExec| -> Result<TxOutcome, SQLError> {
            let Some(line) = line_on(tx, line_id)? else {
                return Ok(TxOutcome::Rollback);
            };
            let header_status = header_on(tx, line.header_id)?.map(|h| h.status);
            if header_status == Some(HeaderStatus::Approved) {
                result = Some(Guarded::HeaderApproved);
                return Ok(TxOutcome::Rollback);
            }
            let verified = count_on(
                tx,
                "SELECT COUNT(*) AS cnt FROM pack_records WHERE line_id = ?1 AND status = ?2",
                &[
                    Value::Integer(line_id),
                    Value::from(VerificationStatus::Verified.as_str()),
                ],
            )?;
            if verified > 0 {
                result = Some(Guarded::Locked { verified });
                return Ok(TxOutcome::Rollback);
            }

            tx.exec(
                "DELETE FROM pack_records WHERE line_id = ?1",
                &[Value::Integer(line_id)],
            )?;

            let mut sub_index = next_sub_index_on(tx, line_id)?;
            let mut created = Vec::new();
            for group in groups {
                let count = u32::try_from(group.quantities.len())
                    .map_err(|_| SQLError::Execution("pack group too large".into()))?;
                let keys = generate_keys(line.header_id, line_id, sub_index, count);
                for (key, qty) in keys.into_iter().zip(&group.quantities) {
                    let pack = PackRecord {
                        pack_identifier: key.identifier(prefix),
                        header_id: key.header_id,
                        line_id: key.line_id,
                        sub_index: key.sub_index,
                        pack_sequence: key.pack_sequence,
                        pack_quantity: *qty,
                        lot_no: group.lot_no.clone(),
                        expiry_date: group.expiry_date,
                        verification_status: VerificationStatus::Pending,
                        verified_at: None,
                        verified_by: None,
                        created_at: created_at.to_string(),
                    };
                    insert_pack_on(tx, &pack)?;
                    created.push(pack);
                }
                sub_index += 1;
            }

            tx.exec(
                "UPDATE receipt_lines SET total_quantity = ?1, pack_count = ?2, next_sub_index = ?3 \
                 WHERE id = ?4",
                &[
                    Value::Text(total_quantity.to_string()),
                    Value::Integer(created.len() as i64),
                    Value::Integer(i64::from(sub_index)),
                    Value::Integer(line_id),
                ],
            )?;
            result = Some(Guarded::Done(created));
            Ok(TxOutcome::Commit)
        })?;
        result.ok_or_else(|| ReceivingError::NotFound(format!("receipt line {line_id} not found")))
    }

    /// Exact-match lookup. Never matches on a prefix.
    pub fn get_pack(&self, pack_identifier: &str) -> Result<Option<PackRecord>, ReceivingError> {
        let rows = self.db.query(
            &format!("SELECT {PACK_COLUMNS} FROM pack_records WHERE pack_identifier = ?1"),
            &[Value::from(pack_identifier)],
        )?;
        Ok(rows.first().map(row_to_pack).transpose()?)
    }

    pub fn list_packs(&self, line_id: i64) -> Result<Vec<PackRecord>, ReceivingError> {
        let rows = self.db.query(
            &format!(
                "SELECT {PACK_COLUMNS} FROM pack_records WHERE line_id = ?1 \
                 ORDER BY sub_index, pack_sequence"
            ),
            &[Value::Integer(line_id)],
        )?;
        Ok(rows.iter().map(row_to_pack).collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of packs sharing a pack group.
    pub fn group_size(&self, line_id: i64, sub_index: u32) -> Result<u32, ReceivingError> {
        let n = count_on(
            &*self.db,
            "SELECT COUNT(*) AS cnt FROM pack_records WHERE line_id = ?1 AND sub_index = ?2",
            &[Value::Integer(line_id), Value::Integer(i64::from(sub_index))],
        )?;
        Ok(n as u32)
    }

    /// Atomically move one pack PENDING → VERIFIED.
    ///
    /// Returns `true` if this call performed the transition, `false` if the
    /// pack was already verified (or is gone).
    pub fn mark_verified(
        &self,
        pack_identifier: &str,
        verified_by: Option<&str>,
        verified_at: &str,
    ) -> Result<bool, ReceivingError> {
        let affected = self.db.exec(
            "UPDATE pack_records SET status = ?1, verified_at = ?2, verified_by = ?3 \
             WHERE pack_identifier = ?4 AND status = ?5",
            &[
                Value::from(VerificationStatus::Verified.as_str()),
                Value::from(verified_at),
                Value::from(verified_by),
                Value::from(pack_identifier),
                Value::from(VerificationStatus::Pending.as_str()),
            ],
        )?;
        Ok(affected > 0)
    }

    // -----------------------------------------------------------------------
    // Aggregates (always scoped)
    // -----------------------------------------------------------------------

    pub fn progress(&self, scope: PackScope) -> Result<Progress, ReceivingError> {
        Ok(progress_on(&*self.db, scope)?)
    }

    pub fn readiness(&self, header_id: i64) -> Result<Readiness, ReceivingError> {
        Ok(readiness_on(&*self.db, header_id)?)
    }
}

// ---------------------------------------------------------------------------
// Statement helpers, usable on the store or inside a transaction
// ---------------------------------------------------------------------------

fn scope_predicate(scope: PackScope) -> (&'static str, Vec<Value>) {
    match scope {
        PackScope::Header(header_id) => ("header_id = ?1", vec![Value::Integer(header_id)]),
        PackScope::Line { header_id, line_id } => (
            "header_id = ?1 AND line_id = ?2",
            vec![Value::Integer(header_id), Value::Integer(line_id)],
        ),
    }
}

fn progress_on<E: SQLExec + ?Sized>(db: &E, scope: PackScope) -> Result<Progress, SQLError> {
    let (predicate, params) = scope_predicate(scope);
    let rows = db.query(
        &format!(
            "SELECT COUNT(*) AS total, \
             COALESCE(SUM(CASE WHEN status = 'VERIFIED' THEN 1 ELSE 0 END), 0) AS verified \
             FROM pack_records WHERE {predicate}"
        ),
        &params,
    )?;
    let row = rows.first();
    Ok(Progress {
        verified: row.and_then(|r| r.get_i64("verified")).unwrap_or(0) as u64,
        total: row.and_then(|r| r.get_i64("total")).unwrap_or(0) as u64,
    })
}

fn readiness_on<E: SQLExec + ?Sized>(db: &E, header_id: i64) -> Result<Readiness, SQLError> {
    let progress = progress_on(db, PackScope::Header(header_id))?;
    let lines_without_packs = count_on(
        db,
        "SELECT COUNT(*) AS cnt FROM receipt_lines l WHERE l.header_id = ?1 \
         AND NOT EXISTS (SELECT 1 FROM pack_records p WHERE p.line_id = l.id)",
        &[Value::Integer(header_id)],
    )?;
    let pending_count = progress.pending();
    Ok(Readiness {
        ready: pending_count == 0 && lines_without_packs == 0 && progress.total > 0,
        pending_count,
        verified: progress.verified,
        total: progress.total,
        lines_without_packs,
    })
}

fn count_on<E: SQLExec + ?Sized>(db: &E, sql: &str, params: &[Value]) -> Result<u64, SQLError> {
    let rows = db.query(sql, params)?;
    Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as u64)
}

fn header_on<E: SQLExec + ?Sized>(db: &E, id: i64) -> Result<Option<HeaderGroup>, SQLError> {
    let rows = db.query(
        "SELECT * FROM receipt_headers WHERE id = ?1",
        &[Value::Integer(id)],
    )?;
    rows.first().map(row_to_header).transpose()
}

fn line_on<E: SQLExec + ?Sized>(db: &E, id: i64) -> Result<Option<ReceiptLine>, SQLError> {
    let rows = db.query(
        "SELECT * FROM receipt_lines WHERE id = ?1",
        &[Value::Integer(id)],
    )?;
    rows.first().map(row_to_line).transpose()
}

fn next_sub_index_on<E: SQLExec + ?Sized>(db: &E, line_id: i64) -> Result<u32, SQLError> {
    let rows = db.query(
        "SELECT next_sub_index FROM receipt_lines WHERE id = ?1",
        &[Value::Integer(line_id)],
    )?;
    rows.first()
        .and_then(|r| r.get_i64("next_sub_index"))
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| malformed("receipt_lines", "next_sub_index"))
}

fn insert_pack_on<E: SQLExec + ?Sized>(db: &E, pack: &PackRecord) -> Result<(), SQLError> {
    db.exec(
        &format!(
            "INSERT INTO pack_records ({PACK_COLUMNS}) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        &[
            Value::from(pack.pack_identifier.as_str()),
            Value::Integer(pack.header_id),
            Value::Integer(pack.line_id),
            Value::Integer(i64::from(pack.sub_index)),
            Value::Integer(i64::from(pack.pack_sequence)),
            Value::Integer(pack.pack_quantity),
            Value::from(pack.lot_no.clone()),
            Value::from(pack.expiry_date.map(|d| d.to_string())),
            Value::from(pack.verification_status.as_str()),
            Value::from(pack.verified_at.clone()),
            Value::from(pack.verified_by.clone()),
            Value::from(pack.created_at.as_str()),
        ],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn malformed(table: &str, column: &str) -> SQLError {
    SQLError::Query(format!("malformed {table}.{column}"))
}

fn req_i64(row: &Row, table: &str, column: &str) -> Result<i64, SQLError> {
    row.get_i64(column).ok_or_else(|| malformed(table, column))
}

fn req_str<'a>(row: &'a Row, table: &str, column: &str) -> Result<&'a str, SQLError> {
    row.get_str(column).ok_or_else(|| malformed(table, column))
}

fn opt_string(row: &Row, column: &str) -> Option<String> {
    row.get_str(column).map(str::to_string)
}

fn row_to_header(row: &Row) -> Result<HeaderGroup, SQLError> {
    const T: &str = "receipt_headers";
    Ok(HeaderGroup {
        id: req_i64(row, T, "id")?,
        document_ref: req_str(row, T, "document_ref")?.to_string(),
        supplier: opt_string(row, "supplier"),
        status: HeaderStatus::from_str(req_str(row, T, "status")?)
            .ok_or_else(|| malformed(T, "status"))?,
        approved_by: opt_string(row, "approved_by"),
        approved_at: opt_string(row, "approved_at"),
        created_at: req_str(row, T, "created_at")?.to_string(),
    })
}

fn row_to_line(row: &Row) -> Result<ReceiptLine, SQLError> {
    const T: &str = "receipt_lines";
    Ok(ReceiptLine {
        id: req_i64(row, T, "id")?,
        header_id: req_i64(row, T, "header_id")?,
        item_code: req_str(row, T, "item_code")?.to_string(),
        total_quantity: Decimal::from_str(req_str(row, T, "total_quantity")?)
            .map_err(|_| malformed(T, "total_quantity"))?,
        pack_count: u32::try_from(req_i64(row, T, "pack_count")?)
            .map_err(|_| malformed(T, "pack_count"))?,
        created_at: req_str(row, T, "created_at")?.to_string(),
    })
}

fn row_to_pack(row: &Row) -> Result<PackRecord, SQLError> {
    const T: &str = "pack_records";
    let expiry_date = match row.get_str("expiry_date") {
        Some(s) => Some(
            s.parse::<NaiveDate>()
                .map_err(|_| malformed(T, "expiry_date"))?,
        ),
        None => None,
    };
    Ok(PackRecord {
        pack_identifier: req_str(row, T, "pack_identifier")?.to_string(),
        header_id: req_i64(row, T, "header_id")?,
        line_id: req_i64(row, T, "line_id")?,
        sub_index: u32::try_from(req_i64(row, T, "sub_index")?)
            .map_err(|_| malformed(T, "sub_index"))?,
        pack_sequence: u32::try_from(req_i64(row, T, "pack_sequence")?)
            .map_err(|_| malformed(T, "pack_sequence"))?,
        pack_quantity: req_i64(row, T, "pack_quantity")?,
        lot_no: opt_string(row, "lot_no"),
        expiry_date,
        verification_status: VerificationStatus::from_str(req_str(row, T, "status")?)
            .ok_or_else(|| malformed(T, "status"))?,
        verified_at: opt_string(row, "verified_at"),
        verified_by: opt_string(row, "verified_by"),
        created_at: req_str(row, T, "created_at")?.to_string(),
    })
}
