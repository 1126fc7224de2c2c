//! HTTP route handlers grouped by resource domain.
//!
//! Each submodule corresponds to a logical area of the API
//! (students, questions, exams, audit logs) and exposes typed Rocket
//! handlers annotated with `#[openapi]` so `rocket_okapi` can derive
//! an OpenAPI document automatically.

pub mod audit_logs;
pub mod exams;
pub mod health;
pub(crate) mod helpers;
pub mod params;
pub mod questions;
pub mod students;
