#[macro_use]
extern crate rocket;

pub mod audit;
pub mod auth;
pub mod db;
pub mod error;
pub mod generation;
pub mod import;
pub mod models;
pub mod request_logger;
pub mod retry;
pub mod routes;

use crate::auth::AuthState;
use crate::db::ClassroomDb;
use crate::generation::{GenerationClient, GenerationConfig};
use crate::request_logger::RequestLogger;
use env_logger::Env;
use rocket::fairing::AdHoc;
use rocket::http::Method;
use rocket::{Build, Rocket};
use rocket_cors::{AllowedOrigins, CorsOptions};
use rocket_db_pools::Database;
use rocket_okapi::{
    openapi_get_routes,
    rapidoc::{GeneralConfig, HideShowConfig, RapiDocConfig, make_rapidoc},
    settings::UrlObject,
    swagger_ui::{SwaggerUIConfig, make_swagger_ui},
};
use std::sync::Once;

static LOGGER: Once = Once::new();

fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(
            Env::default().default_filter_or("info,rocket::server=warn,rocket::request=warn"),
        )
        .init();
    });
}

pub fn rocket() -> Rocket<Build> {
    init_logger();

    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .allowed_methods(
            vec![Method::Get, Method::Post, Method::Put, Method::Delete]
                .into_iter()
                .map(From::from)
                .collect(),
        )
        .to_cors()
        .expect("Error creating CORS");

    rocket::build()
        .attach(RequestLogger)
        .attach(ClassroomDb::init())
        .attach(cors)
        .attach(AdHoc::try_on_ignite(
            "Run Migrations",
            |rocket| async move {
                match ClassroomDb::fetch(&rocket) {
                    Some(db) => match db::run_migrations(db).await {
                        Ok(()) => {
                            log::info!("database migrations successful");
                            Ok(rocket)
                        }
                        Err(e) => {
                            log::error!("database migrations failed: {}", e);
                            Err(rocket)
                        }
                    },
                    None => {
                        log::error!("database pool not available for migrations");
                        Err(rocket)
                    }
                }
            },
        ))
        // Route guards and handlers take the pool as plain managed state.
        .attach(AdHoc::try_on_ignite("Manage DB Pool", |rocket| async move {
            match ClassroomDb::fetch(&rocket) {
                Some(db) => {
                    let pool = (**db).clone();
                    Ok(rocket.manage(pool))
                }
                None => Err(rocket),
            }
        }))
        .attach(AdHoc::try_on_ignite(
            "Auth Configuration",
            |rocket| async move {
                match AuthState::from_env() {
                    Ok(state) => Ok(rocket.manage(state)),
                    Err(err) => {
                        log::error!("failed to initialize authentication: {}", err);
                        Err(rocket)
                    }
                }
            },
        ))
        .attach(AdHoc::on_ignite(
            "Question Generation",
            |rocket| async move {
                let config = GenerationConfig::from_env();
                let client = if config.is_enabled() {
                    match GenerationClient::new(config) {
                        Ok(client) => Some(client),
                        Err(err) => {
                            log::error!(
                                "failed to initialize generation client: {}. Question generation disabled.",
                                err
                            );
                            None
                        }
                    }
                } else {
                    log::info!("GENERATION_API_URL not set; question generation disabled");
                    None
                };
                rocket.manage(client)
            },
        ))
        .mount(
            "/api/v1",
            openapi_get_routes![
                // Health routes
                routes::health::health_check,
                // Auth routes
                auth::routes::login,
                auth::routes::me,
                // Student routes
                routes::students::list_students,
                routes::students::get_student,
                routes::students::create_student,
                routes::students::update_student,
                routes::students::delete_student,
                routes::students::import_students,
                // Question routes
                routes::questions::list_questions,
                routes::questions::create_question,
                routes::questions::delete_question,
                routes::questions::generate_questions,
                // Exam routes
                routes::exams::list_exams,
                routes::exams::create_exam,
                routes::exams::get_exam,
                routes::exams::delete_exam,
                // Audit routes
                routes::audit_logs::list_audit_logs,
            ],
        )
        .mount(
            "/api/docs/swagger/",
            make_swagger_ui(&SwaggerUIConfig {
                url: "../../v1/openapi.json".to_owned(),
                ..Default::default()
            }),
        )
        .mount(
            "/api/docs/rapidoc/",
            make_rapidoc(&RapiDocConfig {
                general: GeneralConfig {
                    spec_urls: vec![UrlObject::new("Classroom API", "../../v1/openapi.json")],
                    ..Default::default()
                },
                hide_show: HideShowConfig {
                    allow_spec_url_load: false,
                    allow_spec_file_load: false,
                    ..Default::default()
                },
                ..Default::default()
            }),
        )
}

#[cfg_attr(not(test), allow(dead_code))]
pub mod test_support {
    use rocket::config::LogLevel;
    use rocket::figment::Figment;
    use rocket::local::asynchronous::Client as AsyncClient;
    use rocket::local::blocking::Client;
    use rocket::{Build, Rocket, Route};
    use rocket_db_pools::sqlx::{self, PgPool};

    pub use database::{TestDatabase, TestDatabaseError};
    pub use memory::MemoryStudentStore;

    /// Convenience helpers for seeding account rows in tests.
    pub struct TestFixtures<'a> {
        pool: &'a PgPool,
    }

    impl<'a> TestFixtures<'a> {
        pub fn new(pool: &'a PgPool) -> Self {
            Self { pool }
        }

        /// Insert a teacher row and optional local credentials, returning the new user id.
        pub async fn insert_teacher(
            &self,
            email: &str,
            password_hash: Option<&str>,
        ) -> Result<i32, sqlx::Error> {
            let user_id: i32 = sqlx::query_scalar(
                "INSERT INTO users (auth_provider, email, role) VALUES ($1, $2, $3) RETURNING id",
            )
            .bind("local")
            .bind(email)
            .bind("teacher")
            .fetch_one(self.pool)
            .await?;

            if let Some(hash) = password_hash {
                sqlx::query(
                    "INSERT INTO local_user_credentials (user_id, password_hash) VALUES ($1, $2)",
                )
                .bind(user_id)
                .bind(hash)
                .execute(self.pool)
                .await?;
            }

            Ok(user_id)
        }

        /// Count the audit entries a teacher has for `action`.
        pub async fn audit_count(&self, teacher_id: i32, action: &str) -> Result<i64, sqlx::Error> {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM audit_logs WHERE teacher_id = $1 AND action = $2",
            )
            .bind(teacher_id)
            .bind(action)
            .fetch_one(self.pool)
            .await
        }
    }

    pub mod memory {
        use crate::import::{OwnerId, StoreError, StudentStore};
        use crate::models::{NewStudent, Student};
        use chrono::Utc;
        use std::collections::HashMap;
        use tokio::sync::Mutex;
        use uuid::Uuid;

        #[derive(Default)]
        struct Inner {
            students: Vec<Student>,
            insert_failures: HashMap<String, StoreError>,
            lookup_failures: HashMap<String, StoreError>,
            insert_calls: usize,
            lookup_calls: usize,
        }

        /// In-memory [`StudentStore`] with scriptable failures, keyed by
        /// student name.
        #[derive(Default)]
        pub struct MemoryStudentStore {
            inner: Mutex<Inner>,
        }

        impl MemoryStudentStore {
            pub fn new() -> Self {
                Self::default()
            }

            /// Every stored student, active or not, in insertion order.
            pub async fn students(&self) -> Vec<Student> {
                self.inner.lock().await.students.clone()
            }

            pub async fn deactivate_all(&self, owner: OwnerId) {
                let mut inner = self.inner.lock().await;
                for student in inner.students.iter_mut().filter(|s| s.teacher_id == owner.0) {
                    student.active = false;
                }
            }

            /// Make every insert of a student named `name` fail with `error`.
            pub async fn fail_insert(&self, name: &str, error: StoreError) {
                self.inner
                    .lock()
                    .await
                    .insert_failures
                    .insert(name.to_string(), error);
            }

            /// Make every duplicate lookup for `name` fail with `error`.
            pub async fn fail_lookup(&self, name: &str, error: StoreError) {
                self.inner
                    .lock()
                    .await
                    .lookup_failures
                    .insert(name.to_string(), error);
            }

            pub async fn insert_calls(&self) -> usize {
                self.inner.lock().await.insert_calls
            }

            pub async fn lookup_calls(&self) -> usize {
                self.inner.lock().await.lookup_calls
            }
        }

        #[rocket::async_trait]
        impl StudentStore for MemoryStudentStore {
            async fn find_active(
                &self,
                owner: OwnerId,
                name: &str,
                major: &str,
            ) -> Result<Option<Student>, StoreError> {
                let mut inner = self.inner.lock().await;
                inner.lookup_calls += 1;
                if let Some(err) = inner.lookup_failures.get(name) {
                    return Err(err.clone());
                }

                Ok(inner
                    .students
                    .iter()
                    .find(|s| s.active && s.teacher_id == owner.0 && s.name == name && s.major == major)
                    .cloned())
            }

            async fn insert(
                &self,
                owner: OwnerId,
                student: NewStudent,
            ) -> Result<Student, StoreError> {
                let mut inner = self.inner.lock().await;
                inner.insert_calls += 1;
                if let Some(err) = inner.insert_failures.get(&student.name) {
                    return Err(err.clone());
                }

                let now = Utc::now();
                let stored = Student {
                    id: Uuid::new_v4(),
                    teacher_id: owner.0,
                    name: student.name,
                    email: student.email,
                    major: student.major,
                    academic_level: student.academic_level,
                    gpa: student.gpa,
                    career_interests: student.career_interests,
                    additional_info: student.additional_info,
                    active: true,
                    created_at: now,
                    updated_at: now,
                };
                inner.students.push(stored.clone());
                Ok(stored)
            }
        }
    }

    pub mod database {
        use crate::db::MIGRATOR;
        use log::LevelFilter;
        use rocket_db_pools::sqlx::postgres::{PgConnectOptions, PgPoolOptions};
        use rocket_db_pools::sqlx::{self, ConnectOptions, PgPool};
        use testcontainers::{GenericImage, ImageExt, core::WaitFor};
        use testcontainers_modules::testcontainers::{
            ContainerAsync, core::error::TestcontainersError, runners::AsyncRunner,
        };
        use thiserror::Error;
        use tokio::runtime::Handle;
        use uuid::Uuid;

        #[derive(Debug, Error)]
        pub enum TestDatabaseError {
            #[error("database error: {0}")]
            Sqlx(#[from] sqlx::Error),
            #[error("migration error: {0}")]
            Migration(#[from] sqlx::migrate::MigrateError),
            #[error("container error: {0}")]
            Container(#[from] TestcontainersError),
        }

        /// Ephemeral, migrated database running in a disposable Postgres container.
        pub struct TestDatabase {
            pool: Option<PgPool>,
            admin_options: PgConnectOptions,
            database_name: String,
            container: Option<ContainerAsync<GenericImage>>,
        }

        impl TestDatabase {
            pub async fn new() -> Result<Self, TestDatabaseError> {
                let container = GenericImage::new("postgres", "16-alpine")
                    .with_wait_for(WaitFor::message_on_stdout(
                        "database system is ready to accept connections",
                    ))
                    .with_wait_for(WaitFor::message_on_stderr(
                        "database system is ready to accept connections",
                    ))
                    .with_env_var("POSTGRES_DB", "postgres")
                    .with_env_var("POSTGRES_USER", "postgres")
                    .with_env_var("POSTGRES_PASSWORD", "postgres")
                    .start()
                    .await?;

                let host = container.get_host().await?.to_string();
                let port = container.get_host_port_ipv4(5432).await?;
                let admin_url = format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

                let base_options: PgConnectOptions = admin_url.parse()?;
                let base_options = base_options.log_statements(LevelFilter::Off);
                let admin_options = base_options.clone().database("postgres");

                let admin_pool = PgPoolOptions::new()
                    .max_connections(1)
                    .connect_with(admin_options.clone())
                    .await?;

                let database_name = format!("classroom_{}", Uuid::new_v4().simple());
                sqlx::query(&format!(
                    "CREATE DATABASE \"{}\" TEMPLATE template0",
                    database_name
                ))
                .execute(&admin_pool)
                .await?;
                admin_pool.close().await;

                let pool = PgPoolOptions::new()
                    .max_connections(5)
                    .connect_with(base_options.database(&database_name))
                    .await?;

                MIGRATOR.run(&pool).await?;

                Ok(Self {
                    pool: Some(pool),
                    admin_options,
                    database_name,
                    container: Some(container),
                })
            }

            pub fn pool(&self) -> &PgPool {
                self.pool.as_ref().expect("test database pool is available")
            }

            pub fn pool_clone(&self) -> PgPool {
                self.pool().clone()
            }

            /// Close pool connections and drop the ephemeral database.
            pub async fn close(mut self) -> Result<(), TestDatabaseError> {
                if let Some(pool) = self.pool.take() {
                    pool.close().await;
                }

                drop_database(self.admin_options.clone(), &self.database_name).await?;

                if let Some(container) = self.container.take() {
                    drop(container);
                }

                Ok(())
            }
        }

        async fn drop_database(
            admin_options: PgConnectOptions,
            database_name: &str,
        ) -> Result<(), sqlx::Error> {
            let admin_pool = PgPoolOptions::new()
                .max_connections(1)
                .connect_with(admin_options)
                .await?;

            sqlx::query(&format!("DROP DATABASE \"{}\" WITH (FORCE)", database_name))
                .execute(&admin_pool)
                .await?;
            Ok(())
        }

        impl Drop for TestDatabase {
            fn drop(&mut self) {
                if let Some(pool) = self.pool.take() {
                    let admin_options = self.admin_options.clone();
                    let db_name = self.database_name.clone();
                    if let Ok(handle) = Handle::try_current() {
                        handle.spawn(async move {
                            pool.close().await;
                            let _ = drop_database(admin_options, &db_name).await;
                        });
                    }
                }

                if let Some(container) = self.container.take() {
                    drop(container);
                }
            }
        }
    }

    /// Builder for constructing Rocket instances tailored for integration tests.
    #[derive(Default)]
    pub struct TestRocketBuilder {
        figment: Figment,
        mounts: Vec<(String, Vec<Route>)>,
        pg_pool: Option<PgPool>,
        auth_state: Option<crate::auth::AuthState>,
    }

    impl TestRocketBuilder {
        /// Start a builder with sensible defaults: random port, logging disabled.
        pub fn new() -> Self {
            let figment = rocket::Config::figment()
                .merge(("port", 0))
                .merge(("log_level", LogLevel::Off))
                .merge(("cli_colors", false));

            Self {
                figment,
                ..Default::default()
            }
        }

        /// Mount routes under `/api/v1`.
        pub fn mount_api_routes(mut self, routes: Vec<Route>) -> Self {
            self.mounts.push(("/api/v1".to_string(), routes));
            self
        }

        pub fn manage_pg_pool(mut self, pool: PgPool) -> Self {
            self.pg_pool = Some(pool);
            self
        }

        pub fn manage_auth_state(mut self, state: crate::auth::AuthState) -> Self {
            self.auth_state = Some(state);
            self
        }

        pub fn build(self) -> Rocket<Build> {
            let mut rocket = rocket::custom(self.figment);

            for (base, routes) in self.mounts {
                rocket = rocket.mount(base, routes);
            }

            if let Some(pool) = self.pg_pool {
                rocket = rocket.manage(pool);
            }
            if let Some(state) = self.auth_state {
                rocket = rocket.manage(state);
            }

            rocket
        }

        pub fn blocking_client(self) -> Client {
            Client::tracked(self.build()).expect("valid Rocket instance")
        }

        pub async fn async_client(self) -> AsyncClient {
            AsyncClient::tracked(self.build())
                .await
                .expect("valid Rocket instance")
        }
    }
}
