//! Student import system.
//!
//! Turns an uploaded CSV file into student rows for one teacher:
//!
//! 1. **Parsing** (`parser`) - Maps CSV headers, decodes rows into validated records and sets aside invalid rows
//! 2. **Records** (`record`) - Candidate student records and their field rules
//! 3. **Pipeline** (`pipeline`) - Batched create-if-absent import with per-row error capture
//! 4. **Store** (`store`, `postgres`) - Storage abstraction and its Postgres implementation
//! 5. **Outcome** (`outcome`) - Imported/skipped counts and per-row errors
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use crate::import::{ImportPipeline, OwnerId, PgStudentStore, parse_students_csv};
//!
//! let roster = parse_students_csv(&csv_text)?;
//! let pipeline = ImportPipeline::new(PgStudentStore::new(pool));
//! let outcome = pipeline.run_roster(OwnerId(teacher_id), roster).await?;
//!
//! println!("imported {} students", outcome.imported_count);
//! ```

pub mod outcome;
pub mod parser;
pub mod pipeline;
pub mod postgres;
pub mod record;
pub mod store;

pub use outcome::{ImportOutcome, RowError};
pub use parser::{CsvImportError, ParsedRoster, parse_students_csv};
pub use pipeline::{DUPLICATE_STUDENT_MESSAGE, ImportError, ImportPipeline, STUDENT_IMPORT_BATCH_SIZE};
pub use postgres::PgStudentStore;
pub use record::{CandidateRecord, RecordError, StudentFields};
pub use store::{OwnerId, StoreError, StoreErrorKind, StudentStore};
