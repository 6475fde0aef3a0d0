//! HTTP surface: the sitemap endpoint and the payment-intent endpoint.
//!
//! The sitemap route never fails outward: missing credentials or a failed
//! posts query degrade to an empty, well-formed urlset so crawlers always
//! receive valid XML with a 200.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use cms_sync_core::contract::ContentStore;
use cms_sync_core::sitemap::{render_empty_urlset, render_urlset};

use crate::load_config::{backend_credentials, payment_secret, CliConfig};
use crate::store::RestContentStore;

const PAYMENT_INTENTS_URL: &str = "https://api.stripe.com/v1/payment_intents";

#[derive(Clone)]
struct AppState {
    /// Absent when backend credentials are not configured; the sitemap
    /// route then serves the empty urlset.
    store: Option<Arc<RestContentStore>>,
    site_url: String,
    payment_secret: Option<String>,
    min_payment_amount: i64,
    currency: String,
    client: reqwest::Client,
}

pub async fn run_server(config: &CliConfig) -> Result<()> {
    let store = match backend_credentials() {
        Some(credentials) => Some(Arc::new(RestContentStore::new(&credentials))),
        None => {
            warn!("backend credentials not configured; sitemap will be empty");
            None
        }
    };
    let state = AppState {
        store,
        site_url: config.site.base_url.clone(),
        payment_secret: payment_secret(),
        min_payment_amount: config.server.min_payment_amount,
        currency: config.server.currency.clone(),
        client: reqwest::Client::new(),
    };

    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "listening");
    axum::serve(listener, app(state))
        .await
        .context("server terminated")?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/sitemap.xml", get(sitemap_xml))
        .route("/api/payments/intent", post(create_payment_intent))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Always 200 with well-formed XML, even when the backend is unreachable.
async fn sitemap_xml(State(state): State<AppState>) -> Response {
    let xml = match &state.store {
        None => render_empty_urlset("backend credentials not configured"),
        Some(store) => match store.list_published_posts().await {
            Ok(posts) => render_urlset(&state.site_url, &posts),
            Err(e) => {
                warn!(error = %e, "published posts query failed");
                render_empty_urlset("posts query failed")
            }
        },
    };
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/xml")],
        xml,
    )
        .into_response()
}

#[derive(Debug, Deserialize)]
struct PaymentIntentRequest {
    /// Amount in minor currency units.
    amount: i64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct PaymentIntentResponse {
    client_secret: String,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiError {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Provider response, trimmed to the field the client needs.
#[derive(Debug, Deserialize)]
struct ProviderIntent {
    client_secret: String,
}

async fn create_payment_intent(
    State(state): State<AppState>,
    Json(request): Json<PaymentIntentRequest>,
) -> Response {
    if let Err(message) = validate_amount(request.amount, state.min_payment_amount) {
        return error_response(StatusCode::BAD_REQUEST, message);
    }
    let secret = match &state.payment_secret {
        Some(secret) => secret.clone(),
        None => {
            error!("payment provider secret key is not configured");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment provider is not configured",
            );
        }
    };

    let mut form = vec![
        ("amount".to_string(), request.amount.to_string()),
        ("currency".to_string(), state.currency.clone()),
        (
            "automatic_payment_methods[enabled]".to_string(),
            "true".to_string(),
        ),
    ];
    if let Some(description) = &request.description {
        form.push(("description".to_string(), description.clone()));
    }
    if let Some(email) = &request.email {
        form.push(("metadata[email]".to_string(), email.clone()));
    }
    if let Some(name) = &request.name {
        form.push(("metadata[name]".to_string(), name.clone()));
    }

    let response = match state
        .client
        .post(PAYMENT_INTENTS_URL)
        .bearer_auth(&secret)
        .form(&form)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            error!(error = %e, "payment intent request failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment provider unreachable",
            );
        }
    };
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!(%status, body, "payment provider rejected intent");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "payment intent creation failed",
        );
    }
    match response.json::<ProviderIntent>().await {
        Ok(intent) => Json(PaymentIntentResponse {
            client_secret: intent.client_secret,
        })
        .into_response(),
        Err(e) => {
            error!(error = %e, "payment provider returned unexpected body");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "payment intent creation failed",
            )
        }
    }
}

fn validate_amount(amount: i64, minimum: i64) -> Result<(), String> {
    if amount < minimum {
        return Err(format!(
            "amount must be at least {minimum} (got {amount})"
        ));
    }
    Ok(())
}
