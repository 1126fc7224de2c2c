use log::Level;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::Status;
use rocket::{Data, Request, Response};
use std::time::Instant;

/// Fairing that writes one access-log line per request with its latency.
pub struct RequestLogger;

/// Log level for a finished request: server errors stand out, health probes
/// stay quiet.
fn level_for(path: &str, status: Status) -> Level {
    if status.code >= 500 {
        Level::Warn
    } else if path.ends_with("/health") {
        Level::Debug
    } else {
        Level::Info
    }
}

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(Instant::now);
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed_ms = request.local_cache(Instant::now).elapsed().as_secs_f64() * 1000.0;
        let status = response.status();

        log::log!(
            level_for(request.uri().path().as_str(), status),
            "{} {} -> {} ({:.2}ms)",
            request.method(),
            request.uri(),
            status.code,
            elapsed_ms
        );
    }
}
