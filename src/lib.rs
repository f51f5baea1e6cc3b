//! paedia manages membership onboarding of paediatric doctors and the review
//! of their applications.

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
mod database;
pub mod error;
mod middleware;
pub mod notification;
pub mod onboarding;
pub mod profile;
pub mod revalidate;
pub mod review;
mod router;
pub mod steps;
pub mod store;
pub mod telemetry;
pub mod user;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::{Method, StatusCode, header};
use axum::routing::get;
use axum::{Router, middleware as AxumMiddleware};
pub use error::ServerError;
use tower::ServiceBuilder;
use tower_http::LatencyUnit;
use tower_http::cors::{Any, CorsLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};

use crate::clock::{Clock, SystemClock};
use crate::notification::{Inbox, NotificationDispatcher, ReviewNotifier};
use crate::onboarding::OnboardingService;
use crate::review::ReviewService;
use crate::store::Store;

/// MUST NEVER be used in production.
#[cfg(test)]
pub async fn make_request(
    token: Option<&str>,
    app: Router,
    method: Method,
    path: &str,
    body: String,
) -> axum::http::Response<axum::body::Body> {
    use axum::extract::Request;
    use tower::util::ServiceExt;

    let mut request = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    app.oneshot(request.body(axum::body::Body::from(body)).unwrap())
        .await
        .unwrap()
}

/// State sharing between routes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<config::Configuration>,
    pub store: Arc<dyn Store>,
    pub review: ReviewService,
    pub onboarding: OnboardingService,
    pub inbox: Inbox,
}

impl AppState {
    /// Wire services over a store.
    pub fn new(
        config: Arc<config::Configuration>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn ReviewNotifier>,
        clock: Arc<dyn Clock>,
        revalidator: Arc<dyn revalidate::Revalidator>,
    ) -> Self {
        Self {
            review: ReviewService::new(
                Arc::clone(&store),
                Arc::clone(&notifier),
                clock,
                Arc::clone(&revalidator),
            ),
            onboarding: OnboardingService::new(Arc::clone(&store), notifier, revalidator),
            inbox: Inbox::new(Arc::clone(&store)),
            config,
            store,
        }
    }
}

/// Create router.
pub fn app(state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        // Add high level tracing/logging to all requests.
        .layer(
            TraceLayer::new_for_http()
                .on_body_chunk(|chunk: &Bytes, latency: Duration, _span: &tracing::Span| {
                    tracing::trace!(size_bytes = chunk.len(), latency = ?latency, "sending body chunk")
                })
                .make_span_with(DefaultMakeSpan::new().include_headers(true).level(tracing::Level::INFO))
                .on_request(DefaultOnRequest::new())
                .on_response(DefaultOnResponse::new().include_headers(true).latency_unit(LatencyUnit::Micros)),
        )
        // Set a timeout.
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)))
        // Remove senstive headers from trace.
        .layer(SetSensitiveHeadersLayer::new([header::AUTHORIZATION, header::COOKIE]))
        // Add CORS preflight support.
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
                .allow_headers(Any)
                .vary([header::AUTHORIZATION]),
        );

    let authenticated = Router::new()
        .nest("/onboarding", router::onboarding::router())
        .nest("/notifications", router::notifications::router())
        .nest("/membership", router::membership::router())
        .route_layer(AxumMiddleware::from_fn_with_state(state.clone(), middleware::auth));

    Router::new()
        // `GET /status.json` goes to `status`.
        .route("/status.json", get(router::status::status))
        .merge(authenticated)
        .with_state(state)
        .route_layer(AxumMiddleware::from_fn(telemetry::track))
        .layer(middleware)
}

/// Initialize the application state.
pub async fn initialize_state() -> Result<AppState, Box<dyn std::error::Error>> {
    // read configuration file. let it in memory.
    let config = config::Configuration::default().read()?;

    let Some(postgres) = &config.postgres else {
        tracing::error!("missing `postgres` entry on `config.yaml` file");
        return Err("missing `postgres` configuration".into());
    };
    let db = database::Database::new(
        &postgres.address,
        postgres
            .username
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .password
            .as_deref()
            .unwrap_or(database::DEFAULT_CREDENTIALS),
        postgres
            .database
            .as_deref()
            .unwrap_or(database::DEFAULT_DATABASE_NAME),
        postgres.pool_size.unwrap_or(database::DEFAULT_POOL_SIZE),
    )
    .await?;

    // execute migrations scripts on start.
    sqlx::migrate!().run(&db.postgres).await?;

    let store: Arc<dyn Store> = Arc::new(store::PostgresStore::new(db.postgres));
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let channels = config.notifications.channels()?;
    tracing::info!(
        whatsapp = channels.whatsapp.is_some(),
        telegram = channels.telegram.is_some(),
        "outbound channels configured"
    );
    let notifier = Arc::new(NotificationDispatcher::new(
        Arc::clone(&store),
        Arc::clone(&clock),
        channels,
    ));
    let revalidator = config.revalidator()?;

    Ok(AppState::new(config, store, notifier, clock, revalidator))
}
