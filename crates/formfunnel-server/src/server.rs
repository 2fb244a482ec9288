use crate::config::{Config, MailTransport};
use crate::flows::{self, Page, LEADS_TABLE, MEMBERSHIP_TABLE, TEMPLATE_KINDS};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;
use formfunnel_core::{Catalog, Payload};
use formfunnel_mail::{LogMailer, Mailer, SmtpMailer, TemplateSet};
use formfunnel_store::Store;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

pub const QUERY_KIND_HEADER: &str = "query-kind";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Leadgen,
    Membership,
    Verification,
}

impl QueryKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "leadgen" => Some(QueryKind::Leadgen),
            "membership" => Some(QueryKind::Membership),
            "verification" => Some(QueryKind::Verification),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Leadgen => "leadgen",
            QueryKind::Membership => "membership",
            QueryKind::Verification => "verification",
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<Catalog>,
    pub store: Store,
    pub templates: Arc<TemplateSet>,
    pub mailer: Arc<dyn Mailer>,
    pub redirect_base: Arc<str>,
}

impl AppState {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let catalog = Catalog::load([
            (LEADS_TABLE, Path::new(&config.tables.leads)),
            (
                MEMBERSHIP_TABLE,
                Path::new(&config.tables.membership_applicants),
            ),
        ])?;
        let templates = TemplateSet::load(&config.mail.templates_dir, &TEMPLATE_KINDS)?;
        let mailer: Arc<dyn Mailer> = match config.mail.transport {
            MailTransport::Smtp => {
                let smtp = config
                    .mail
                    .smtp
                    .as_ref()
                    .ok_or_else(|| anyhow::anyhow!("missing [mail.smtp] settings"))?;
                Arc::new(SmtpMailer::new(smtp)?)
            }
            MailTransport::Log => Arc::new(LogMailer),
        };
        Ok(Self {
            catalog: Arc::new(catalog),
            store: Store::new(&config.storage.database_path),
            templates: Arc::new(templates),
            mailer,
            redirect_base: Arc::from(config.server.redirect_base.trim_end_matches('/')),
        })
    }

    fn redirect(&self, page: Page) -> Redirect {
        Redirect::to(&format!("{}/{}", self.redirect_base, page.path()))
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(submit))
        .route("/verification", get(verification_link))
        .with_state(state)
}

pub async fn run(config: Config) -> anyhow::Result<()> {
    if config.metrics.enabled {
        spawn_metrics_listener(&config.metrics.listen_addr).await?;
    }

    let state = AppState::from_config(&config)?;
    let listener = TcpListener::bind(&config.server.listen_addr).await?;
    info!("formfunnel listening on {}", config.server.listen_addr);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("formfunnel stopped");
    Ok(())
}

async fn spawn_metrics_listener(addr: &str) -> anyhow::Result<()> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    let listener = TcpListener::bind(addr).await?;
    info!("metrics listening on {}", addr);
    tokio::spawn(async move {
        let app = Router::new()
            .route(
                "/metrics",
                get(move || {
                    let handle = handle.clone();
                    async move { handle.render() }
                }),
            )
            .route("/health", get(|| async { "ok" }))
            .route("/ready", get(|| async { "ok" }));
        if let Err(err) = axum::serve(listener, app).await {
            error!("metrics listener error: {err}");
        }
    });
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[derive(Debug, Default, Deserialize)]
pub struct TokenQuery {
    token: Option<String>,
}

/// Anything that is not a JSON object is treated as an empty payload, which
/// the flows then reject as incomplete.
fn decode_payload(body: &[u8]) -> Payload {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            debug!("request body is not a JSON object");
            Payload::new()
        }
        Err(err) => {
            debug!("request body is not JSON: {err}");
            Payload::new()
        }
    }
}

async fn submit(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<TokenQuery>,
    body: Bytes,
) -> Response {
    let kind = headers
        .get(QUERY_KIND_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(QueryKind::parse);
    let Some(kind) = kind else {
        warn!("rejecting request with missing or unknown {QUERY_KIND_HEADER} header");
        return (StatusCode::BAD_REQUEST, "unknown query-kind").into_response();
    };
    dispatch(state, kind, body, query.token).await
}

async fn verification_link(
    State(state): State<AppState>,
    Query(query): Query<TokenQuery>,
) -> Response {
    dispatch(state, QueryKind::Verification, Bytes::new(), query.token).await
}

async fn dispatch(state: AppState, kind: QueryKind, body: Bytes, token: Option<String>) -> Response {
    let request_id = Uuid::new_v4();
    let span = info_span!("submission", %request_id, kind = kind.as_str());
    async move {
        counter!("submission_total", "kind" => kind.as_str()).increment(1);
        let page = match kind {
            QueryKind::Leadgen => flows::leadgen(&state, decode_payload(&body)).await,
            QueryKind::Membership => flows::membership(&state, decode_payload(&body)).await,
            QueryKind::Verification => flows::verification(&state, token.as_deref()).await,
        };
        if page.is_rejection() {
            counter!("submission_rejected_total", "kind" => kind.as_str()).increment(1);
        }
        info!("redirecting to {}", page.path());
        state.redirect(page).into_response()
    }
    .instrument(span)
    .await
}
