//! Public configuration page for front-end identification.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;

use crate::config::Configuration;

/// Public server status (configuration).
pub async fn status(State(config): State<Arc<Configuration>>) -> Json<Configuration> {
    Json(Configuration::clone(&config))
}
