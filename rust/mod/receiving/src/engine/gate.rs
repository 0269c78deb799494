use openerp_core::now_rfc3339;
use tracing::{info, warn};

use super::ReceivingEngine;
use crate::error::ReceivingError;
use crate::identity::PackScope;
use crate::model::{HeaderGroup, HeaderStatus, Progress, Readiness};

impl ReceivingEngine {
    /// Verified vs. total packs of one header.
    pub fn header_progress(&self, header_id: i64) -> Result<Progress, ReceivingError> {
        self.store.progress(PackScope::Header(header_id))
    }

    /// Verified vs. total packs of one line.
    pub fn line_progress(&self, line_id: i64) -> Result<Progress, ReceivingError> {
        let line = self.store.get_line(line_id)?;
        self.store.progress(PackScope::Line {
            header_id: line.header_id,
            line_id,
        })
    }

    /// Whether a header may be approved: every line has packs and every
    /// pack under the header is verified. Packs of other headers never
    /// take part.
    pub fn check_header_ready_for_approval(&self, header_id: i64) -> Result<Readiness, ReceivingError> {
        self.store.get_header(header_id)?;
        self.store.readiness(header_id)
    }

    /// Approve a header.
    ///
    /// Readiness is re-evaluated inside the approving transaction. Approving
    /// an approved header returns it unchanged.
    pub fn approve_header(
        &self,
        header_id: i64,
        approved_by: Option<&str>,
    ) -> Result<HeaderGroup, ReceivingError> {
        let header = self.store.get_header(header_id)?;
        if header.status == HeaderStatus::Approved {
            return Ok(header);
        }

        let readiness = self
            .store
            .approve_if_ready(header_id, approved_by, &now_rfc3339())?;
        if !readiness.ready {
            warn!(
                "approval of header {header_id} blocked: {} pending, {} line(s) without packs",
                readiness.pending_count, readiness.lines_without_packs
            );
            return Err(ReceivingError::ApprovalBlocked {
                header_id,
                pending_count: readiness.pending_count,
                lines_without_packs: readiness.lines_without_packs,
            });
        }

        info!("receipt header {header_id} approved ({} packs)", readiness.total);
        self.store.get_header(header_id)
    }
}
