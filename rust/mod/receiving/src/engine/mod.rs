mod gate;
mod scan;

use std::sync::Arc;

use openerp_core::{ListParams, ListResult, now_rfc3339};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::ReceivingConfig;
use crate::error::ReceivingError;
use crate::identity::PackPrefix;
use crate::label::{LabelContext, LabelPayload, build_label_payload};
use crate::model::{HeaderGroup, LotGroup, PackRecord, ReceiptLine};
use crate::quantity::{distribute, round_half_up};
use crate::store::{Guarded, PackGroupPlan, ReceivingStore};

/// Upper bound on packs in one pack group.
pub const MAX_PACKS_PER_GROUP: i64 = 10_000;

// ---------------------------------------------------------------------------
// ReceivingEngine: pack definition, scan verification, approval gate
// ---------------------------------------------------------------------------

/// The receiving engine.
///
/// Synchronous and request-driven. It:
/// - Splits line quantities into packs and assigns their identifiers.
/// - Builds label payloads for printing.
/// - Verifies scans, one pack at a time (see `scan.rs`).
/// - Gates header approval on every pack being verified (see `gate.rs`).
///
/// Independent packs can be scanned concurrently; each scan touches only
/// its own pack row.
pub struct ReceivingEngine {
    store: Arc<ReceivingStore>,
    prefix: PackPrefix,
}

impl ReceivingEngine {
    /// Create a new engine backed by the given store.
    pub fn new(store: Arc<ReceivingStore>, config: &ReceivingConfig) -> Result<Self, ReceivingError> {
        Ok(Self {
            store,
            prefix: PackPrefix::new(&config.pack_prefix)?,
        })
    }

    /// Access the underlying store.
    pub fn store(&self) -> &Arc<ReceivingStore> {
        &self.store
    }

    pub fn prefix(&self) -> &PackPrefix {
        &self.prefix
    }

    // =======================================================================
    // Headers and lines
    // =======================================================================

    pub fn create_header(
        &self,
        document_ref: &str,
        supplier: Option<&str>,
    ) -> Result<HeaderGroup, ReceivingError> {
        let document_ref = document_ref.trim();
        if document_ref.is_empty() {
            return Err(ReceivingError::InvalidInput("document reference is required".into()));
        }
        let header = self.store.insert_header(document_ref, supplier, &now_rfc3339())?;
        info!("receipt header {} created for {}", header.id, header.document_ref);
        Ok(header)
    }

    pub fn get_header(&self, id: i64) -> Result<HeaderGroup, ReceivingError> {
        self.store.get_header(id)
    }

    pub fn list_headers(&self, params: &ListParams) -> Result<ListResult<HeaderGroup>, ReceivingError> {
        self.store.list_headers(params)
    }

    /// Delete a header with all of its lines and packs.
    pub fn delete_header(&self, id: i64) -> Result<(), ReceivingError> {
        self.store.delete_header(id)?;
        info!("receipt header {id} deleted");
        Ok(())
    }

    pub fn add_line(
        &self,
        header_id: i64,
        item_code: &str,
        total_quantity: Decimal,
    ) -> Result<ReceiptLine, ReceivingError> {
        let item_code = item_code.trim();
        if item_code.is_empty() {
            return Err(ReceivingError::InvalidInput("item code is required".into()));
        }
        round_half_up(total_quantity)?;

        match self
            .store
            .insert_line(header_id, item_code, total_quantity, &now_rfc3339())?
        {
            Guarded::Done(line) => Ok(line),
            Guarded::HeaderApproved | Guarded::Locked { .. } => {
                Err(ReceivingError::HeaderApproved(header_id))
            }
        }
    }

    pub fn get_line(&self, id: i64) -> Result<ReceiptLine, ReceivingError> {
        self.store.get_line(id)
    }

    pub fn list_lines(&self, header_id: i64) -> Result<Vec<ReceiptLine>, ReceivingError> {
        self.store.get_header(header_id)?;
        self.store.list_lines(header_id)
    }

    /// Delete a line with all of its packs.
    pub fn delete_line(&self, id: i64) -> Result<(), ReceivingError> {
        match self.store.delete_line(id)? {
            Guarded::Done(()) => {
                info!("receipt line {id} deleted");
                Ok(())
            }
            Guarded::HeaderApproved | Guarded::Locked { .. } => {
                let header_id = self.store.get_line(id)?.header_id;
                Err(ReceivingError::HeaderApproved(header_id))
            }
        }
    }

    // =======================================================================
    // Pack definition
    // =======================================================================

    /// Split `total_quantity` of a line into `pack_count` packs.
    ///
    /// Replaces any packs the line already has, as long as none of them has
    /// been verified. Once a pack is verified the line's packs are frozen.
    pub fn define_packs(
        &self,
        line_id: i64,
        total_quantity: Decimal,
        pack_count: i64,
    ) -> Result<Vec<PackRecord>, ReceivingError> {
        self.define_lot_packs(
            line_id,
            &[LotGroup {
                lot_no: None,
                total_quantity,
                pack_count,
                expiry_date: None,
            }],
        )
    }

    /// Define one pack group per lot.
    ///
    /// The line total becomes the sum of the distributed pack quantities,
    /// so a line's packs always add up to its rounded total even when
    /// individual lot totals are fractional.
    pub fn define_lot_packs(
        &self,
        line_id: i64,
        groups: &[LotGroup],
    ) -> Result<Vec<PackRecord>, ReceivingError> {
        if groups.is_empty() {
            return Err(ReceivingError::InvalidInput("at least one pack group is required".into()));
        }

        let mut plans = Vec::with_capacity(groups.len());
        let mut line_total: i64 = 0;
        for group in groups {
            if group.pack_count > MAX_PACKS_PER_GROUP {
                return Err(ReceivingError::InvalidInput(format!(
                    "pack count {} exceeds the limit of {MAX_PACKS_PER_GROUP}",
                    group.pack_count
                )));
            }
            let quantities = distribute(group.total_quantity, group.pack_count)?;
            line_total = quantities
                .iter()
                .try_fold(line_total, |acc, q| acc.checked_add(*q))
                .ok_or_else(|| {
                    ReceivingError::InvalidInput("sum of pack group quantities overflows".into())
                })?;
            plans.push(PackGroupPlan {
                quantities,
                lot_no: group.lot_no.clone(),
                expiry_date: group.expiry_date,
            });
        }
        let line_total = Decimal::from(line_total);

        let created = match self.store.replace_packs(
            line_id,
            line_total,
            &plans,
            &self.prefix,
            &now_rfc3339(),
        )? {
            Guarded::Done(created) => created,
            Guarded::Locked { verified } => {
                warn!("pack redefinition refused for line {line_id}: {verified} pack(s) verified");
                return Err(ReceivingError::RedefinitionLocked { line_id, verified });
            }
            Guarded::HeaderApproved => {
                let header_id = self.store.get_line(line_id)?.header_id;
                return Err(ReceivingError::HeaderApproved(header_id));
            }
        };

        info!(
            "defined {} pack(s) in {} group(s) for line {line_id} (total {line_total})",
            created.len(),
            plans.len()
        );
        Ok(created)
    }

    pub fn list_packs(&self, line_id: i64) -> Result<Vec<PackRecord>, ReceivingError> {
        self.store.get_line(line_id)?;
        self.store.list_packs(line_id)
    }

    pub fn get_pack(&self, pack_identifier: &str) -> Result<PackRecord, ReceivingError> {
        self.store
            .get_pack(pack_identifier)?
            .ok_or_else(|| ReceivingError::UnknownPack(pack_identifier.to_string()))
    }

    // =======================================================================
    // Labels
    // =======================================================================

    /// Label payload for a stored pack, with context taken from its line
    /// and header.
    pub fn label_for_pack(&self, pack_identifier: &str) -> Result<LabelPayload, ReceivingError> {
        let pack = self.get_pack(pack_identifier)?;
        let line = self.store.get_line(pack.line_id)?;
        let header = self.store.get_header(pack.header_id)?;
        let group_size = self.store.group_size(pack.line_id, pack.sub_index)?;

        let context = LabelContext::for_pack(&header, &line, &pack, group_size);
        Ok(build_label_payload(&pack, &context))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::str::FromStr;

    use openerp_sql::SqliteStore;

    use super::*;
    use crate::model::VerificationStatus;

    pub(crate) fn make_engine() -> ReceivingEngine {
        let db = Arc::new(SqliteStore::open_in_memory().unwrap());
        let store = Arc::new(ReceivingStore::new(db).unwrap());
        ReceivingEngine::new(store, &ReceivingConfig::default()).unwrap()
    }

    pub(crate) fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    /// A header with one line split into packs.
    pub(crate) fn header_with_packs(
        engine: &ReceivingEngine,
        total: &str,
        pack_count: i64,
    ) -> (HeaderGroup, ReceiptLine, Vec<PackRecord>) {
        let header = engine.create_header("PR-2026-0001", Some("ACME")).unwrap();
        let line = engine.add_line(header.id, "SKU-1", dec(total)).unwrap();
        let packs = engine.define_packs(line.id, dec(total), pack_count).unwrap();
        (header, engine.get_line(line.id).unwrap(), packs)
    }

    #[test]
    fn define_packs_distributes_and_numbers() {
        let engine = make_engine();
        let (header, line, packs) = header_with_packs(&engine, "110.5", 4);

        let quantities: Vec<_> = packs.iter().map(|p| p.pack_quantity).collect();
        assert_eq!(quantities, vec![28, 28, 28, 27]);
        assert_eq!(line.pack_count, 4);
        assert_eq!(line.total_quantity, dec("111"));
        for (i, p) in packs.iter().enumerate() {
            assert_eq!(p.pack_sequence, i as u32 + 1);
            assert_eq!(p.verification_status, VerificationStatus::Pending);
            assert_eq!(
                p.pack_identifier,
                format!("PKG-{}-{}-1-{}", header.id, line.id, i + 1)
            );
        }
    }

    #[test]
    fn define_packs_rejects_bad_input() {
        let engine = make_engine();
        let header = engine.create_header("PR-1", None).unwrap();
        let line = engine.add_line(header.id, "SKU-1", dec("10")).unwrap();

        assert!(matches!(
            engine.define_packs(line.id, dec("10"), 0),
            Err(ReceivingError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.define_packs(line.id, dec("-3"), 2),
            Err(ReceivingError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.define_packs(line.id, dec("10"), MAX_PACKS_PER_GROUP + 1),
            Err(ReceivingError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.define_packs(999, dec("10"), 2),
            Err(ReceivingError::NotFound(_))
        ));
        assert!(engine.list_packs(line.id).unwrap().is_empty());
    }

    #[test]
    fn redefinition_before_verification_replaces_packs() {
        let engine = make_engine();
        let (_, line, first) = header_with_packs(&engine, "12", 3);

        let second = engine.define_packs(line.id, dec("11"), 3).unwrap();
        let quantities: Vec<_> = second.iter().map(|p| p.pack_quantity).collect();
        assert_eq!(quantities, vec![4, 4, 3]);
        assert!(second.iter().all(|p| p.sub_index == 2));

        // Old identifiers are gone and never handed out again.
        assert!(matches!(
            engine.get_pack(&first[0].pack_identifier),
            Err(ReceivingError::UnknownPack(_))
        ));
        assert_eq!(engine.get_line(line.id).unwrap().total_quantity, dec("11"));
    }

    #[test]
    fn redefinition_after_verification_is_locked() {
        let engine = make_engine();
        let (_, line, packs) = header_with_packs(&engine, "12", 3);
        engine
            .verify_scan(&crate::model::ScanEvent {
                pack_identifier: packs[0].pack_identifier.clone(),
                claimed_quantity: dec("4"),
                scanned_by: None,
            })
            .unwrap();

        let err = engine.define_packs(line.id, dec("12"), 4).unwrap_err();
        assert_eq!(
            err,
            ReceivingError::RedefinitionLocked {
                line_id: line.id,
                verified: 1
            }
        );
        assert_eq!(engine.list_packs(line.id).unwrap().len(), 3);
    }

    #[test]
    fn lot_groups_get_their_own_sub_index() {
        let engine = make_engine();
        let header = engine.create_header("PR-LOT", None).unwrap();
        let line = engine.add_line(header.id, "SKU-MILK", dec("0")).unwrap();
        let expiry = chrono::NaiveDate::from_ymd_opt(2026, 12, 1);

        let packs = engine
            .define_lot_packs(
                line.id,
                &[
                    LotGroup {
                        lot_no: Some("A1".into()),
                        total_quantity: dec("10"),
                        pack_count: 3,
                        expiry_date: expiry,
                    },
                    LotGroup {
                        lot_no: Some("B2".into()),
                        total_quantity: dec("5"),
                        pack_count: 2,
                        expiry_date: None,
                    },
                ],
            )
            .unwrap();

        let summary: Vec<_> = packs
            .iter()
            .map(|p| (p.sub_index, p.pack_sequence, p.pack_quantity, p.lot_no.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, 1, 4, Some("A1")),
                (1, 2, 3, Some("A1")),
                (1, 3, 3, Some("A1")),
                (2, 1, 3, Some("B2")),
                (2, 2, 2, Some("B2")),
            ]
        );
        assert_eq!(packs[0].expiry_date, expiry);

        let line = engine.get_line(line.id).unwrap();
        assert_eq!(line.total_quantity, dec("15"));
        assert_eq!(line.pack_count, 5);
        assert!(engine.define_lot_packs(line.id, &[]).is_err());
    }

    #[test]
    fn fractional_lots_keep_line_total_equal_to_pack_sum() {
        let engine = make_engine();
        let header = engine.create_header("PR-FRAC", None).unwrap();
        let line = engine.add_line(header.id, "SKU-1", dec("5")).unwrap();
        let lot = |lot_no: &str| LotGroup {
            lot_no: Some(lot_no.into()),
            total_quantity: dec("2.5"),
            pack_count: 1,
            expiry_date: None,
        };

        let packs = engine.define_lot_packs(line.id, &[lot("A"), lot("B")]).unwrap();
        let pack_sum: i64 = packs.iter().map(|p| p.pack_quantity).sum();
        assert_eq!(pack_sum, 6);

        let line = engine.get_line(line.id).unwrap();
        assert_eq!(round_half_up(line.total_quantity).unwrap(), pack_sum);
        assert_eq!(line.total_quantity, dec("6"));
    }

    #[test]
    fn label_for_pack_uses_stored_context() {
        let engine = make_engine();
        let (header, _, packs) = header_with_packs(&engine, "11", 3);

        let label = engine.label_for_pack(&packs[2].pack_identifier).unwrap();
        assert_eq!(label.pack_identifier, packs[2].pack_identifier);
        assert_eq!(label.pack_quantity, 3);
        assert_eq!(label.pack_sequence, 3);
        assert_eq!(label.pack_total_count, 3);
        assert_eq!(label.item_code, "SKU-1");
        assert_eq!(label.document_ref, header.document_ref);
    }

    #[test]
    fn header_and_line_validation() {
        let engine = make_engine();
        assert!(matches!(
            engine.create_header("  ", None),
            Err(ReceivingError::InvalidInput(_))
        ));
        let header = engine.create_header("PR-9", None).unwrap();
        assert!(matches!(
            engine.add_line(header.id, "", dec("1")),
            Err(ReceivingError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.add_line(header.id, "SKU", dec("-1")),
            Err(ReceivingError::InvalidInput(_))
        ));
        assert!(matches!(
            engine.add_line(4242, "SKU", dec("1")),
            Err(ReceivingError::NotFound(_))
        ));
    }

    #[test]
    fn deleting_a_line_removes_its_packs() {
        let engine = make_engine();
        let (header, line, packs) = header_with_packs(&engine, "4", 2);
        engine.delete_line(line.id).unwrap();
        assert!(engine.get_pack(&packs[0].pack_identifier).is_err());
        assert!(engine.list_lines(header.id).unwrap().is_empty());
    }
}
