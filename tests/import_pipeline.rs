use classroom_api::import::{
    CandidateRecord, DUPLICATE_STUDENT_MESSAGE, ImportPipeline, OwnerId, STUDENT_IMPORT_BATCH_SIZE,
    StoreError, StoreErrorKind, StudentFields, parse_students_csv,
};
use classroom_api::test_support::MemoryStudentStore;

const OWNER: OwnerId = OwnerId(7);

fn candidate(row: usize, name: &str, major: &str) -> CandidateRecord {
    StudentFields {
        name: name.to_string(),
        email: Some(format!("{}@example.edu", name.to_lowercase())),
        major: major.to_string(),
        academic_level: "Sophomore".to_string(),
        gpa: Some(3.2),
        career_interests: vec!["Research".to_string()],
    }
    .into_candidate(row)
    .expect("valid candidate")
}

fn distinct_records(count: usize) -> Vec<CandidateRecord> {
    (1..=count)
        .map(|row| candidate(row, &format!("Student {row}"), "Biology"))
        .collect()
}

#[tokio::test]
async fn every_record_is_either_imported_or_skipped() {
    let store = MemoryStudentStore::new();
    store
        .fail_insert(
            "Student 4",
            StoreError::new(StoreErrorKind::Validation, "invalid input value"),
        )
        .await;

    let mut records = distinct_records(23);
    records.push(candidate(24, "Student 1", "Biology"));

    let outcome = ImportPipeline::new(&store)
        .run(OWNER, records)
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count + outcome.skipped_count, 24);
    assert_eq!(outcome.errors.len(), outcome.skipped_count);
    assert_eq!(outcome.imported_count, 22);
    assert_eq!(store.students().await.len(), 22);
}

#[tokio::test]
async fn error_rows_increase_regardless_of_batch_size() {
    for batch_size in [1, 3, STUDENT_IMPORT_BATCH_SIZE, 50] {
        let store = MemoryStudentStore::new();
        for name in ["Student 2", "Student 9", "Student 11", "Student 20"] {
            store
                .fail_insert(name, StoreError::new(StoreErrorKind::Constraint, "constraint violation"))
                .await;
        }

        let outcome = ImportPipeline::new(&store)
            .with_batch_size(batch_size)
            .run(OWNER, distinct_records(21))
            .await
            .expect("run completes");

        let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row_number).collect();
        assert_eq!(rows, vec![2, 9, 11, 20], "batch size {batch_size}");
        assert!(rows.windows(2).all(|pair| pair[0] < pair[1]));
    }
}

#[tokio::test]
async fn duplicate_within_one_file_is_skipped() {
    let store = MemoryStudentStore::new();
    let outcome = ImportPipeline::new(&store)
        .run(
            OWNER,
            vec![
                candidate(1, "Ada", "Mathematics"),
                candidate(2, "Ada", "Mathematics"),
                candidate(3, "Ada", "Physics"),
            ],
        )
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 2);
    assert_eq!(outcome.skipped_count, 1);
    assert_eq!(outcome.errors[0].row_number, 2);
    assert_eq!(outcome.errors[0].message, DUPLICATE_STUDENT_MESSAGE);
    assert_eq!(
        DUPLICATE_STUDENT_MESSAGE,
        "Student with same name and major already exists"
    );
}

#[tokio::test]
async fn a_failed_lookup_only_affects_its_own_row() {
    let store = MemoryStudentStore::new();
    store
        .fail_lookup(
            "Student 3",
            StoreError::new(StoreErrorKind::Internal, "lookup failed"),
        )
        .await;

    let outcome = ImportPipeline::new(&store)
        .run(OWNER, distinct_records(5))
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 4);
    assert_eq!(outcome.skipped_count, 1);
    assert_eq!(outcome.errors[0].row_number, 3);
    assert_eq!(outcome.errors[0].message, "lookup failed");
    // The failed lookup never reaches insert.
    assert_eq!(store.insert_calls().await, 4);
    assert_eq!(store.lookup_calls().await, 5);
}

#[tokio::test]
async fn unreachable_store_on_the_first_row_aborts_the_run() {
    let store = MemoryStudentStore::new();
    store
        .fail_lookup(
            "Student 1",
            StoreError::new(StoreErrorKind::Unavailable, "pool timed out"),
        )
        .await;

    let err = ImportPipeline::new(&store)
        .run(OWNER, distinct_records(15))
        .await
        .expect_err("run aborts");

    assert_eq!(err.store_error().kind, StoreErrorKind::Unavailable);
    assert!(store.students().await.is_empty());
    assert_eq!(store.lookup_calls().await, 1);
}

#[tokio::test]
async fn outage_after_the_store_was_reached_skips_rows_instead_of_aborting() {
    let store = MemoryStudentStore::new();
    store
        .fail_lookup(
            "Student 12",
            StoreError::new(StoreErrorKind::Unavailable, "pool timed out"),
        )
        .await;
    store
        .fail_insert(
            "Student 13",
            StoreError::new(StoreErrorKind::Unavailable, "connection reset"),
        )
        .await;

    let outcome = ImportPipeline::new(&store)
        .run(OWNER, distinct_records(15))
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 13);
    let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row_number).collect();
    assert_eq!(rows, vec![12, 13]);
    assert_eq!(outcome.errors[0].message, "pool timed out");
    assert_eq!(store.lookup_calls().await, 15);
}

#[tokio::test]
async fn invalid_csv_rows_are_skipped_and_the_rest_imported() {
    let csv = "\
Name,Major,Academic Level,GPA
Ada,Mathematics,Senior,3.0
Bea,Mathematics,Junior,9.5
,Mathematics,Junior,3.1

Cy,Mathematics,Junior,2.0
";
    let roster = parse_students_csv(csv).expect("file-level structure is valid");
    assert_eq!(roster.row_count(), 4);

    let store = MemoryStudentStore::new();
    let outcome = ImportPipeline::new(&store)
        .run_roster(OWNER, roster)
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 2);
    assert_eq!(outcome.skipped_count, 2);
    let rows: Vec<usize> = outcome.errors.iter().map(|e| e.row_number).collect();
    assert_eq!(rows, vec![2, 3]);
    assert_eq!(outcome.errors[1].message, "name is required");
    let names: Vec<String> = store.students().await.into_iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["Ada".to_string(), "Cy".to_string()]);
}

#[tokio::test]
async fn empty_input_produces_empty_outcome() {
    let store = MemoryStudentStore::new();
    let outcome = ImportPipeline::new(&store)
        .run(OWNER, Vec::new())
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 0);
    assert_eq!(outcome.skipped_count, 0);
    assert!(outcome.errors.is_empty());
    assert_eq!(store.lookup_calls().await, 0);
}

#[tokio::test]
async fn twelve_row_roster_with_one_duplicate_and_one_rejected_row() {
    let mut csv = String::from("Name,Email,Major,Academic Level,GPA,Career Interests\n");
    for row in 1..=12 {
        let name = if row == 5 {
            "Student 2".to_string()
        } else {
            format!("Student {row}")
        };
        csv.push_str(&format!(
            "{name},s{row}@example.edu,Chemistry,Junior,3.{row},Lab work;Teaching\n"
        ));
    }

    let roster = parse_students_csv(&csv).expect("roster parses");
    assert_eq!(roster.records.len(), 12);
    assert!(roster.rejected.is_empty());

    let store = MemoryStudentStore::new();
    store
        .fail_insert(
            "Student 10",
            StoreError::new(StoreErrorKind::Constraint, "constraint violation"),
        )
        .await;

    let outcome = ImportPipeline::new(&store)
        .run_roster(OWNER, roster)
        .await
        .expect("run completes");

    assert_eq!(outcome.imported_count, 10);
    assert_eq!(outcome.skipped_count, 2);
    assert_eq!(outcome.errors.len(), 2);
    assert_eq!(outcome.errors[0].row_number, 5);
    assert_eq!(outcome.errors[0].message, DUPLICATE_STUDENT_MESSAGE);
    assert_eq!(outcome.errors[1].row_number, 10);
    assert_eq!(outcome.errors[1].message, "constraint violation");

    let stored = store.students().await;
    assert_eq!(stored.len(), 10);
    assert!(stored.iter().all(|s| s.teacher_id == OWNER.0 && s.active));
    assert_eq!(
        stored[0].career_interests,
        vec!["Lab work".to_string(), "Teaching".to_string()]
    );
}
