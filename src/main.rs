use actix_cors::Cors;
use actix_web::{web, App, HttpServer, HttpResponse, middleware, error, http::StatusCode};
use skillswap_match::config::{LedgerBackend, Settings};
use skillswap_match::core::Matcher;
use skillswap_match::routes::{self, AppState};
use skillswap_match::services::{InMemoryLedger, PostgresLedger, RestLedger, DEFAULT_PAGE_SIZE};
use std::sync::Arc;
use tracing::{info, error};
use tracing_subscriber::EnvFilter;

/// JSON error response for JSON payload errors
#[derive(Debug, serde::Serialize)]
pub struct JsonError {
    pub error: String,
    pub message: String,
    pub status_code: u16,
}

impl std::fmt::Display for JsonError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.error, self.message)
    }
}

impl std::error::Error for JsonError {}

impl error::ResponseError for JsonError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::BAD_REQUEST))
            .json(self)
    }
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &actix_web::HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    JsonError {
        error: "invalid_json".to_string(),
        message: format!("Invalid JSON: {}", err),
        status_code: 400,
    }
    .into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &actix_web::HttpRequest) -> actix_web::Error {
    JsonError {
        error: "invalid_query".to_string(),
        message: format!("Invalid query: {}", err),
        status_code: 400,
    }
    .into()
}

/// Install the global subscriber
///
/// RUST_LOG wins over the configured level; LOG_FORMAT over the configured format.
fn init_tracing(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| format.to_string());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = match Settings::load() {
        Ok(settings) => settings,
        Err(e) => {
            init_tracing("info", "pretty");
            return Err(startup_error("Failed to load configuration", e));
        }
    };

    init_tracing(&settings.logging.level, &settings.logging.format);

    info!("Starting SkillSwap match service...");

    let weights = settings.scoring_weights();
    let max_concurrent_reads = settings.matching.max_concurrent_reads.unwrap_or(16);
    let matcher = Matcher::new(weights, max_concurrent_reads);

    info!("Matcher initialized with weights: {:?}", weights);

    let default_limit = settings.default_limit();
    let max_limit = settings.max_limit();

    let app_state = match settings.ledger.backend {
        LedgerBackend::Rest => {
            let ledger = RestLedger::new(
                settings.rest.endpoint.clone(),
                settings.rest.api_key.clone(),
                settings.rest.timeout_secs.unwrap_or(30),
                settings.rest.tables.clone(),
            )
            .map_err(|e| startup_error("Failed to build REST client", e))?
            .with_page_size(settings.rest.page_size.unwrap_or(DEFAULT_PAGE_SIZE));

            info!("REST ledger initialized ({})", settings.rest.endpoint);
            AppState::from_backend(Arc::new(ledger), matcher, default_limit, max_limit)
        }
        LedgerBackend::Postgres => {
            let options = settings.database.pool_options();
            let ledger = PostgresLedger::connect(&settings.database.url, &options)
                .await
                .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;

            info!("PostgreSQL ledger initialized (max: {} connections)", options.max_connections);
            AppState::from_backend(Arc::new(ledger), matcher, default_limit, max_limit)
        }
        LedgerBackend::Memory => {
            info!("In-memory ledger initialized, data is lost on shutdown");
            AppState::from_backend(Arc::new(InMemoryLedger::new()), matcher, default_limit, max_limit)
        }
    };

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
