use classroom_api::audit::ACTION_STUDENTS_IMPORTED;
use classroom_api::auth::{AuthConfig, AuthState, JwtService, PasswordService};
use classroom_api::import::ImportOutcome;
use classroom_api::models::{DataResponse, PaginatedResponse, Student};
use classroom_api::routes::students::{import_students, list_students};
use classroom_api::test_support::{TestDatabase, TestDatabaseError, TestFixtures, TestRocketBuilder};
use rocket::http::{ContentType, Header, Status};
use rocket::routes;
use serde_json::json;

fn auth_state() -> AuthState {
    let config = AuthConfig {
        issuer: "https://classroom.test".into(),
        audience: "classroom-api".into(),
        access_token_ttl_secs: 900,
        max_failed_logins: 5,
        lockout_secs: 300,
        jwt_secret: "integration-secret".into(),
        jwt_kid: None,
    };
    let jwt = JwtService::from_config(&config).expect("jwt service");
    let passwords = PasswordService::new().expect("password service");
    AuthState::new(config, passwords, jwt)
}

async fn provision() -> Option<TestDatabase> {
    match TestDatabase::new().await {
        Ok(db) => Some(db),
        Err(TestDatabaseError::Container(err)) => {
            eprintln!("skipping import route test: no container runtime ({err})");
            None
        }
        Err(err) => panic!("failed to provision test database: {err:?}"),
    }
}

const ROSTER: &str = "\
Name,Email,Major,Academic Level,GPA,Career Interests
Ada Lovelace,ada@example.edu,Mathematics,Senior,3.9,Research;Teaching
Alan Turing,alan@example.edu,Computer Science,Graduate,4.0,Cryptography
Ada Lovelace,ada2@example.edu,Mathematics,Junior,3.1,
Grace Hopper,,Computer Science,Junior,,Compilers
";

#[tokio::test]
async fn import_route_reports_duplicates_and_writes_audit_entry() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();
    let teacher_id = TestFixtures::new(&pool)
        .insert_teacher("teacher@example.edu", None)
        .await
        .expect("teacher inserted");

    let state = auth_state();
    let token = state
        .jwt_service
        .issue_access_token(teacher_id, "teacher@example.edu", "teacher", 0)
        .expect("token issued")
        .token;

    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![import_students, list_students])
        .manage_pg_pool(pool.clone())
        .manage_auth_state(state)
        .async_client()
        .await;
    let bearer = Header::new("Authorization", format!("Bearer {token}"));

    let response = client
        .post("/api/v1/students/import")
        .header(ContentType::JSON)
        .header(bearer.clone())
        .body(json!({ "fileName": "roster.csv", "csv": ROSTER }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);

    let outcome: DataResponse<ImportOutcome> = response.into_json().await.expect("outcome json");
    assert_eq!(outcome.data.imported_count, 3);
    assert_eq!(outcome.data.skipped_count, 1);
    assert_eq!(outcome.data.errors[0].row_number, 3);

    // Re-importing the same roster skips every row.
    let response = client
        .post("/api/v1/students/import")
        .header(ContentType::JSON)
        .header(bearer.clone())
        .body(json!({ "csv": ROSTER }).to_string())
        .dispatch()
        .await;
    let outcome: DataResponse<ImportOutcome> = response.into_json().await.expect("outcome json");
    assert_eq!(outcome.data.imported_count, 0);
    assert_eq!(outcome.data.skipped_count, 4);

    let response = client
        .get("/api/v1/students?search=ada")
        .header(bearer)
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let page: PaginatedResponse<Student> = response.into_json().await.expect("list json");
    assert_eq!(page.page.total, 1);
    assert_eq!(page.data[0].career_interests, vec!["Research", "Teaching"]);

    let audits = TestFixtures::new(&pool)
        .audit_count(teacher_id, ACTION_STUDENTS_IMPORTED)
        .await
        .expect("audit count");
    assert_eq!(audits, 2);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}

#[tokio::test]
async fn import_route_rejects_bad_files_but_skips_bad_rows() {
    let Some(test_db) = provision().await else {
        return;
    };
    let pool = test_db.pool_clone();
    let teacher_id = TestFixtures::new(&pool)
        .insert_teacher("csv@example.edu", None)
        .await
        .expect("teacher inserted");

    let state = auth_state();
    let token = state
        .jwt_service
        .issue_access_token(teacher_id, "csv@example.edu", "teacher", 0)
        .expect("token issued")
        .token;

    let client = TestRocketBuilder::new()
        .mount_api_routes(routes![import_students])
        .manage_pg_pool(pool.clone())
        .manage_auth_state(state)
        .async_client()
        .await;

    let response = client
        .post("/api/v1/students/import")
        .header(ContentType::JSON)
        .body(json!({ "csv": ROSTER }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Unauthorized);
    drop(response);

    let bearer = Header::new("Authorization", format!("Bearer {token}"));
    let response = client
        .post("/api/v1/students/import")
        .header(ContentType::JSON)
        .header(bearer.clone())
        .body(json!({ "csv": "name,email\nA,a@example.edu\n" }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::BadRequest);
    drop(response);

    let mixed = "name,major,academic_level,gpa\nA,Art,Junior,3.0\nB,Art,Junior,9.5\nC,Art,Junior,2.0\n";
    let response = client
        .post("/api/v1/students/import")
        .header(ContentType::JSON)
        .header(bearer)
        .body(json!({ "csv": mixed }).to_string())
        .dispatch()
        .await;
    assert_eq!(response.status(), Status::Ok);
    let outcome: DataResponse<ImportOutcome> = response.into_json().await.expect("outcome json");
    assert_eq!(outcome.data.imported_count, 2);
    assert_eq!(outcome.data.skipped_count, 1);
    assert_eq!(outcome.data.errors[0].row_number, 2);

    drop(client);
    test_db.close().await.expect("failed to drop test database");
}
