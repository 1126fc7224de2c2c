//! Batched create-if-absent import of candidate students.

use crate::import::outcome::ImportOutcome;
use crate::import::parser::ParsedRoster;
use crate::import::record::CandidateRecord;
use crate::import::store::{OwnerId, StoreError, StudentStore};
use thiserror::Error;

/// Number of records handled per batch. Batches run one after another to
/// bound the load placed on the store.
pub const STUDENT_IMPORT_BATCH_SIZE: usize = 10;

pub const DUPLICATE_STUDENT_MESSAGE: &str = "Student with same name and major already exists";

/// Run-level failure. No outcome is produced; records processed before the
/// failure may already have been inserted.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("import aborted at row {row}: {source}")]
    Aborted { row: usize, source: StoreError },
}

impl ImportError {
    pub fn store_error(&self) -> &StoreError {
        match self {
            ImportError::Aborted { source, .. } => source,
        }
    }
}

enum RecordResult {
    Imported,
    Skipped(String),
}

/// Imports candidate records into a [`StudentStore`].
pub struct ImportPipeline<S> {
    store: S,
    batch_size: usize,
}

impl<S: StudentStore> ImportPipeline<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            batch_size: STUDENT_IMPORT_BATCH_SIZE,
        }
    }

    /// Override the batch size (minimum 1).
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Import a decoded roster. Rows the parser rejected count as skipped and
    /// are merged into the outcome's errors in row order.
    pub async fn run_roster(
        &self,
        owner: OwnerId,
        roster: ParsedRoster,
    ) -> Result<ImportOutcome, ImportError> {
        let ParsedRoster { records, rejected } = roster;
        let mut outcome = self.run(owner, records).await?;
        outcome.merge_rejected(rejected);
        Ok(outcome)
    }

    /// Import `records` for `owner`, in input order.
    ///
    /// Per-row failures (duplicates, rejected inserts, failed lookups, a
    /// transient outage mid-run) are recorded in the returned outcome. The run
    /// ends early only when the store rejects the owner, or cannot be reached
    /// before any row got through to it; the error is then returned instead of
    /// an outcome.
    pub async fn run(
        &self,
        owner: OwnerId,
        records: Vec<CandidateRecord>,
    ) -> Result<ImportOutcome, ImportError> {
        let total = records.len();
        let total_batches = total.div_ceil(self.batch_size);
        log::info!(
            "student import: owner {} submitted {} records ({} batches of up to {})",
            owner,
            total,
            total_batches,
            self.batch_size
        );

        let mut outcome = ImportOutcome::default();
        let mut remaining = records.into_iter().peekable();
        let mut batch_index = 0;
        let mut store_reached = false;

        while remaining.peek().is_some() {
            batch_index += 1;
            let batch: Vec<CandidateRecord> = remaining.by_ref().take(self.batch_size).collect();
            log::debug!(
                "student import: processing batch {}/{} ({} records)",
                batch_index,
                total_batches,
                batch.len()
            );

            for record in batch {
                let row = record.row_number();
                match self.process_record(owner, record).await {
                    Ok(RecordResult::Imported) => outcome.record_imported(),
                    Ok(RecordResult::Skipped(message)) => {
                        log::debug!("student import: row {} skipped: {}", row, message);
                        outcome.record_skipped(row, message);
                    }
                    Err(source)
                        if source.is_fatal() || (!store_reached && source.is_unreachable()) =>
                    {
                        log::error!(
                            "student import: aborting at row {} for owner {}: {}",
                            row,
                            owner,
                            source
                        );
                        return Err(ImportError::Aborted { row, source });
                    }
                    Err(err) => {
                        log::warn!("student import: row {} failed: {}", row, err);
                        outcome.record_skipped(row, err.to_string());
                    }
                }
                store_reached = true;
            }
        }

        log::info!(
            "student import: owner {} finished: {} imported, {} skipped",
            owner,
            outcome.imported_count,
            outcome.skipped_count
        );
        Ok(outcome)
    }

    async fn process_record(
        &self,
        owner: OwnerId,
        record: CandidateRecord,
    ) -> Result<RecordResult, StoreError> {
        let existing = self
            .store
            .find_active(owner, record.name(), record.major())
            .await?;

        if existing.is_some() {
            return Ok(RecordResult::Skipped(DUPLICATE_STUDENT_MESSAGE.to_string()));
        }

        match self.store.insert(owner, record.into_new_student()).await {
            Ok(_) => Ok(RecordResult::Imported),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => Ok(RecordResult::Skipped(err.message)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::record::StudentFields;
    use crate::import::store::StoreErrorKind;
    use crate::test_support::MemoryStudentStore;

    fn candidate(row: usize, name: &str, major: &str) -> CandidateRecord {
        StudentFields {
            name: name.to_string(),
            major: major.to_string(),
            academic_level: "Junior".to_string(),
            ..Default::default()
        }
        .into_candidate(row)
        .expect("valid candidate")
    }

    #[tokio::test]
    async fn batch_size_never_drops_below_one() {
        let pipeline = ImportPipeline::new(MemoryStudentStore::new()).with_batch_size(0);
        assert_eq!(pipeline.batch_size(), 1);

        let outcome = pipeline
            .run(OwnerId(1), vec![candidate(1, "A", "Physics")])
            .await
            .expect("run completes");
        assert_eq!(outcome.imported_count, 1);
    }

    #[tokio::test]
    async fn existing_students_of_other_owners_do_not_count_as_duplicates() {
        let store = MemoryStudentStore::new();
        let pipeline = ImportPipeline::new(&store);

        pipeline
            .run(OwnerId(1), vec![candidate(1, "Grace", "CS")])
            .await
            .expect("first owner");
        let outcome = pipeline
            .run(OwnerId(2), vec![candidate(1, "Grace", "CS")])
            .await
            .expect("second owner");

        assert_eq!(outcome.imported_count, 1);
        assert_eq!(store.students().await.len(), 2);
    }

    #[tokio::test]
    async fn inactive_students_do_not_block_reimport() {
        let store = MemoryStudentStore::new();
        let pipeline = ImportPipeline::new(&store);
        pipeline
            .run(OwnerId(1), vec![candidate(1, "Alan", "Math")])
            .await
            .expect("seed");
        store.deactivate_all(OwnerId(1)).await;

        let outcome = pipeline
            .run(OwnerId(1), vec![candidate(1, "Alan", "Math")])
            .await
            .expect("reimport");
        assert_eq!(outcome.imported_count, 1);
        assert!(outcome.errors.is_empty());
    }

    #[tokio::test]
    async fn transient_insert_error_skips_only_its_row() {
        let store = MemoryStudentStore::new();
        store
            .fail_insert(
                "Bob",
                StoreError::new(StoreErrorKind::Unavailable, "connection refused"),
            )
            .await;
        let pipeline = ImportPipeline::new(&store);

        let outcome = pipeline
            .run(
                OwnerId(1),
                vec![
                    candidate(1, "Alice", "Art"),
                    candidate(2, "Bob", "Art"),
                    candidate(3, "Carol", "Art"),
                ],
            )
            .await
            .expect("run completes");

        assert_eq!(outcome.imported_count, 2);
        assert_eq!(outcome.skipped_count, 1);
        assert_eq!(outcome.errors[0].row_number, 2);
        assert_eq!(outcome.errors[0].message, "connection refused");
        assert_eq!(store.insert_calls().await, 3);
    }

    #[tokio::test]
    async fn transient_error_on_the_first_insert_is_still_per_row() {
        let store = MemoryStudentStore::new();
        store
            .fail_insert(
                "Alice",
                StoreError::new(StoreErrorKind::Unavailable, "connection reset"),
            )
            .await;

        let outcome = ImportPipeline::new(&store)
            .run(
                OwnerId(1),
                vec![candidate(1, "Alice", "Art"), candidate(2, "Bob", "Art")],
            )
            .await
            .expect("lookup reached the store, so the run continues");

        assert_eq!(outcome.imported_count, 1);
        assert_eq!(outcome.errors[0].row_number, 1);
    }

    #[tokio::test]
    async fn rejected_owner_aborts_the_run() {
        let store = MemoryStudentStore::new();
        store
            .fail_insert(
                "Bob",
                StoreError::new(StoreErrorKind::Unauthorized, "permission denied"),
            )
            .await;

        let err = ImportPipeline::new(&store)
            .run(
                OwnerId(1),
                vec![
                    candidate(1, "Alice", "Art"),
                    candidate(2, "Bob", "Art"),
                    candidate(3, "Carol", "Art"),
                ],
            )
            .await
            .expect_err("run aborts");

        let ImportError::Aborted { row, source } = err;
        assert_eq!(row, 2);
        assert_eq!(source.kind, StoreErrorKind::Unauthorized);
        // Row 1 was already written and is not rolled back.
        assert_eq!(store.students().await.len(), 1);
        assert_eq!(store.insert_calls().await, 2);
    }

    #[tokio::test]
    async fn parser_rejections_merge_into_the_outcome_in_row_order() {
        let roster = crate::import::parse_students_csv(
            "name,major,academic_level,gpa\nA,Art,Junior,3.0\nB,Art,Junior,9.5\nA,Art,Junior,2.0\nD,Art,Professor,\nE,Art,Senior,\n",
        )
        .expect("parses");
        let total = roster.row_count();

        let store = MemoryStudentStore::new();
        let outcome = ImportPipeline::new(&store)
            .run_roster(OwnerId(1), roster)
            .await
            .expect("run completes");

        assert_eq!(total, 5);
        assert_eq!(outcome.imported_count + outcome.skipped_count, total);
        assert_eq!(outcome.imported_count, 2);
        let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row_number).collect();
        assert_eq!(rows, [2, 3, 4]);
        assert_eq!(outcome.errors[1].message, DUPLICATE_STUDENT_MESSAGE);
        assert_eq!(store.lookup_calls().await, 3);
    }
}
