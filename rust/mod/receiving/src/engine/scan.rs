use openerp_core::now_rfc3339;
use tracing::{debug, info, warn};

use super::ReceivingEngine;
use crate::error::ReceivingError;
use crate::identity::PackKey;
use crate::label::decode_label_payload;
use crate::model::{Progress, ScanEvent, ScanOutcome, ScanResponse, ScanStatus};
use crate::quantity::round_half_up;

impl ReceivingEngine {
    /// Verify one scanned pack.
    ///
    /// Only an exact identifier match counts. A verified pack answers
    /// `AlreadyVerified` and is left untouched. A quantity mismatch leaves
    /// the pack pending. The PENDING → VERIFIED transition is a
    /// compare-and-set, so of two concurrent scans exactly one wins.
    pub fn verify_scan(&self, scan: &ScanEvent) -> Result<ScanOutcome, ReceivingError> {
        let id = scan.pack_identifier.as_str();
        let Some(pack) = self.store.get_pack(id)? else {
            warn!("scan of unknown pack '{id}'");
            return Err(ReceivingError::UnknownPack(id.to_string()));
        };

        if pack.is_verified() {
            debug!("pack {id} scanned again, already verified");
            let header_progress = self.store.progress(pack.key().header_scope())?;
            return Ok(ScanOutcome {
                status: ScanStatus::AlreadyVerified,
                pack,
                header_progress,
            });
        }

        let claimed = round_half_up(scan.claimed_quantity)?;
        if claimed != pack.pack_quantity {
            warn!(
                "quantity mismatch on pack {id}: expected {}, claimed {claimed}",
                pack.pack_quantity
            );
            return Err(ReceivingError::QuantityMismatch {
                pack_identifier: pack.pack_identifier,
                expected: pack.pack_quantity,
                claimed,
            });
        }

        let won = self
            .store
            .mark_verified(id, scan.scanned_by.as_deref(), &now_rfc3339())?;
        let pack = self
            .store
            .get_pack(id)?
            .ok_or_else(|| ReceivingError::UnknownPack(id.to_string()))?;
        let header_progress = self.store.progress(pack.key().header_scope())?;

        let status = if won {
            info!(
                "pack {id} verified ({}/{} in header {})",
                header_progress.verified, header_progress.total, pack.header_id
            );
            ScanStatus::Success
        } else {
            debug!("pack {id} verified by a concurrent scan");
            ScanStatus::AlreadyVerified
        };

        Ok(ScanOutcome {
            status,
            pack,
            header_progress,
        })
    }

    /// Verify raw label text as read by a scanner.
    pub fn verify_label_text(
        &self,
        text: &str,
        scanned_by: Option<String>,
    ) -> Result<ScanOutcome, ReceivingError> {
        let payload = decode_label_payload(text)?;
        self.verify_scan(&payload.scan_event(scanned_by))
    }

    /// Verify a scan and fold every recoverable outcome into a
    /// [`ScanResponse`].
    ///
    /// Unknown packs and mismatches become response statuses. Invalid input
    /// and storage failures are still returned as errors.
    pub fn scan(&self, scan: &ScanEvent) -> Result<ScanResponse, ReceivingError> {
        let result = self.verify_scan(scan);
        self.fold_scan_result(&scan.pack_identifier, result)
    }

    /// Same as [`ReceivingEngine::scan`] for raw label text.
    pub fn scan_label(
        &self,
        text: &str,
        scanned_by: Option<String>,
    ) -> Result<ScanResponse, ReceivingError> {
        let payload = decode_label_payload(text)?;
        self.scan(&payload.scan_event(scanned_by))
    }

    fn fold_scan_result(
        &self,
        pack_identifier: &str,
        result: Result<ScanOutcome, ReceivingError>,
    ) -> Result<ScanResponse, ReceivingError> {
        match result {
            Ok(outcome) => Ok(ScanResponse::from_outcome(outcome)),
            Err(ReceivingError::QuantityMismatch {
                pack_identifier,
                expected,
                claimed,
            }) => {
                let header_progress = self.progress_for_identifier(&pack_identifier)?;
                Ok(ScanResponse {
                    status: ScanStatus::Mismatch,
                    message: format!("quantity mismatch: label says {expected}, scan claimed {claimed}"),
                    pack_identifier,
                    header_progress,
                    expected_quantity: Some(expected),
                    claimed_quantity: Some(claimed),
                })
            }
            Err(err @ ReceivingError::UnknownPack(_)) => Ok(ScanResponse {
                status: ScanStatus::NotFound,
                pack_identifier: pack_identifier.to_string(),
                header_progress: self.progress_for_identifier(pack_identifier)?,
                message: err.to_string(),
                expected_quantity: None,
                claimed_quantity: None,
            }),
            Err(err) => Err(err),
        }
    }

    /// Progress of the header a well-formed identifier points at; zero when
    /// the identifier does not parse.
    fn progress_for_identifier(&self, pack_identifier: &str) -> Result<Progress, ReceivingError> {
        match PackKey::parse(&self.prefix, pack_identifier) {
            Some(key) => self.store.progress(key.header_scope()),
            None => Ok(Progress::default()),
        }
    }
}

impl ScanResponse {
    pub fn from_outcome(outcome: ScanOutcome) -> Self {
        let message = match outcome.status {
            ScanStatus::Success => format!(
                "pack verified ({}/{})",
                outcome.header_progress.verified, outcome.header_progress.total
            ),
            _ => "pack already verified".to_string(),
        };
        Self {
            status: outcome.status,
            pack_identifier: outcome.pack.pack_identifier,
            header_progress: outcome.header_progress,
            message,
            expected_quantity: None,
            claimed_quantity: None,
        }
    }
}
