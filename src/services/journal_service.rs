//! Journal service - vision snapshots, quarterly summaries and future letters

use std::sync::Arc;

use tracing::debug;

use crate::db::letters::{self, LetterRow};
use crate::db::summaries::{self, SummaryRow};
use crate::db::visions::{self, VisionRow};
use crate::db::{now, Database};
use crate::types::requests::{
    validate_period, CreateLetterRequest, CreateVisionRequest, UpsertSummaryRequest,
};
use crate::types::{FieldErrors, Result};

pub struct JournalService {
    db: Arc<Database>,
}

impl JournalService {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Record a new vision snapshot. Replaying a known `clientKey` returns
    /// the stored snapshot instead.
    pub fn create_vision(
        &self,
        user_id: &str,
        request: &CreateVisionRequest,
    ) -> Result<VisionRow> {
        let vision = request.validate()?;

        self.db.with_conn(|conn| {
            if let Some(key) = vision.client_key.as_deref() {
                if let Some(existing) = visions::find_by_client_key(conn, user_id, key)? {
                    debug!(vision_id = %existing.id, "Vision create replayed");
                    return Ok(existing);
                }
            }
            let row = visions::insert_vision(conn, user_id, &vision, now())?;
            debug!(vision_id = %row.id, "Vision recorded");
            Ok(row)
        })
    }

    /// The current vision, if any
    pub fn latest_vision(&self, user_id: &str) -> Result<Option<VisionRow>> {
        self.db.with_conn(|conn| visions::latest_vision(conn, user_id))
    }

    pub fn upsert_summary(
        &self,
        user_id: &str,
        request: &UpsertSummaryRequest,
    ) -> Result<SummaryRow> {
        let summary = request.validate()?;
        self.db
            .with_conn(|conn| summaries::upsert(conn, user_id, &summary, now()))
    }

    pub fn get_summary(&self, user_id: &str, year: i32, quarter: u8) -> Result<Option<SummaryRow>> {
        let mut errors = FieldErrors::new();
        let period = validate_period(&mut errors, Some(year), Some(quarter));
        errors.into_result()?;

        match period {
            Some((year, quarter)) => self
                .db
                .with_conn(|conn| summaries::get(conn, user_id, year, quarter)),
            None => Ok(None),
        }
    }

    pub fn create_letter(&self, user_id: &str, request: &CreateLetterRequest) -> Result<LetterRow> {
        let letter = request.validate()?;
        self.db
            .with_conn(|conn| letters::insert(conn, user_id, &letter, now()))
    }

    /// Letters ordered by delivery date, latest first
    pub fn list_letters(&self, user_id: &str) -> Result<Vec<LetterRow>> {
        self.db.with_conn(|conn| letters::list(conn, user_id))
    }
}
