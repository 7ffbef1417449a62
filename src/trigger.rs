//! HTTP trigger for scheduled runs.
//!
//! A scheduler hits `GET /api/cron`; the handler runs the pipeline once and
//! answers with a plain-text acknowledgement. When a shared secret is
//! configured the request must carry it as a bearer token.

use actix_web::http::header;
use actix_web::{App, HttpRequest, HttpResponse, HttpServer, middleware, web};
use tracing::{error, info, warn};

use crate::cache::CacheStore;
use crate::fetch::HttpClient;
use crate::pipeline::Pipeline;

pub const CRON_PATH: &str = "/api/cron";
pub const SUCCESS_BODY: &str = "Cron job executed successfully.";

pub struct TriggerState<C, S> {
    pipeline: Pipeline<C, S>,
    cron_secret: Option<String>,
}

impl<C, S> TriggerState<C, S> {
    pub fn new(pipeline: Pipeline<C, S>, cron_secret: Option<String>) -> Self {
        Self {
            pipeline,
            cron_secret,
        }
    }

    fn authorized(&self, req: &HttpRequest) -> bool {
        let Some(secret) = &self.cron_secret else {
            return true;
        };
        req.headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .is_some_and(|token| secrets_match(token.as_bytes(), secret.as_bytes()))
    }
}

/// Compares without short-circuiting on the first differing byte.
fn secrets_match(given: &[u8], expected: &[u8]) -> bool {
    if given.len() != expected.len() {
        return false;
    }
    given
        .iter()
        .zip(expected)
        .fold(0u8, |diff, (a, b)| diff | (a ^ b))
        == 0
}

/// Registers the trigger routes. State must be added with `app_data`.
pub fn configure<C, S>(cfg: &mut web::ServiceConfig)
where
    C: HttpClient + 'static,
    S: CacheStore + 'static,
{
    cfg.route(CRON_PATH, web::get().to(run_cron::<C, S>))
        .route("/health", web::get().to(health));
}

async fn run_cron<C, S>(req: HttpRequest, state: web::Data<TriggerState<C, S>>) -> HttpResponse
where
    C: HttpClient + 'static,
    S: CacheStore + 'static,
{
    if !state.authorized(&req) {
        warn!("Rejected cron trigger without a valid secret");
        return HttpResponse::Unauthorized()
            .content_type("text/plain")
            .body("Unauthorized");
    }

    info!("Cron job triggered, starting data processing");
    match state.pipeline.run().await {
        Ok(outcome) => {
            info!(?outcome, "Data processing finished");
            HttpResponse::Ok()
                .content_type("text/plain")
                .body(SUCCESS_BODY)
        }
        Err(e) => {
            error!(kind = e.kind(), error = %e, "Data processing failed");
            HttpResponse::InternalServerError()
                .content_type("text/plain")
                .body(format!("Pipeline failed: {}", e.kind()))
        }
    }
}

async fn health() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}

/// Serves the trigger on `bind` until shut down.
pub async fn serve<C, S>(state: TriggerState<C, S>, bind: &str) -> std::io::Result<()>
where
    C: HttpClient + 'static,
    S: CacheStore + 'static,
{
    let data = web::Data::new(state);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .wrap(middleware::Logger::default())
            .configure(configure::<C, S>)
    })
    .bind(bind)?
    .run()
    .await
}
