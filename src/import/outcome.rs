//! Import outcome accounting.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// A skipped row and the reason it was skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub row_number: usize,
    pub message: String,
}

/// Aggregate result of one import run.
///
/// Built incrementally by the pipeline: every processed record lands in
/// exactly one of the two counters, and every skipped record contributes
/// exactly one [`RowError`], in processing order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub imported_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<RowError>,
}

impl ImportOutcome {
    pub fn record_imported(&mut self) {
        self.imported_count += 1;
    }

    pub fn record_skipped(&mut self, row_number: usize, message: impl Into<String>) {
        self.skipped_count += 1;
        self.errors.push(RowError {
            row_number,
            message: message.into(),
        });
    }

    /// Add rows rejected before reaching the store, keeping errors ordered
    /// by row number.
    pub fn merge_rejected(&mut self, rejected: Vec<RowError>) {
        if rejected.is_empty() {
            return;
        }
        self.skipped_count += rejected.len();
        self.errors.extend(rejected);
        self.errors.sort_by_key(|error| error.row_number);
    }

    /// Total number of records accounted for.
    pub fn processed(&self) -> usize {
        self.imported_count + self.skipped_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skipped_rows_carry_one_error_each() {
        let mut outcome = ImportOutcome::default();
        outcome.record_imported();
        outcome.record_skipped(2, "duplicate");
        outcome.record_imported();
        outcome.record_skipped(4, "constraint violation");

        assert_eq!(outcome.processed(), 4);
        assert_eq!(outcome.skipped_count, outcome.errors.len());
        assert_eq!(outcome.errors[1].row_number, 4);
    }

    #[test]
    fn merged_rejections_interleave_by_row() {
        let mut outcome = ImportOutcome::default();
        outcome.record_imported();
        outcome.record_skipped(3, "duplicate");
        outcome.merge_rejected(vec![
            RowError {
                row_number: 2,
                message: "name is required".into(),
            },
            RowError {
                row_number: 5,
                message: "invalid GPA 'x'".into(),
            },
        ]);

        assert_eq!(outcome.skipped_count, 3);
        assert_eq!(outcome.processed(), 4);
        let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row_number).collect();
        assert_eq!(rows, [2, 3, 5]);
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let mut outcome = ImportOutcome::default();
        outcome.record_skipped(5, "Student with same name and major already exists");

        let json = serde_json::to_value(&outcome).expect("serializes");
        assert_eq!(json["importedCount"], 0);
        assert_eq!(json["skippedCount"], 1);
        assert_eq!(json["errors"][0]["rowNumber"], 5);
    }
}
