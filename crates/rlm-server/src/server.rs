//! HTTP endpoint handlers
//!
//! The six decision endpoints a RADIUS-to-REST gateway calls, one per
//! protocol phase, plus health probes. Auth-phase handlers fail closed:
//! a fault can only produce a reject. The accounting handler fails open:
//! it always acknowledges, because a NAS must never be blocked from
//! tearing down a session over a backend fault. Keep that asymmetry.

use crate::audit::{AuditEntry, AuditEventType, AuditLogger};
use crate::directory::SubscriberDirectory;
use crate::evaluator::{Entitlement, Evaluation, Evaluator, RejectReason};
use crate::ledger::{LedgerError, SessionLedger, SessionStatus, SessionUpdate};
use crate::reply::build_accept_attributes;
use crate::subscriber::{CredentialKind, CustomerRecord, CustomerStatus, Subscriber, VoucherStatus};
use axum::async_trait;
use axum::extract::{FromRequest, Request, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use rlm_proto::{
    AccountingRequest, AcctStatusType, AttributeMap, AuthenticateRequest, AuthorizeRequest,
    CheckSimulRequest, Decision, PostAuthRequest, PreacctRequest,
};
use serde::de::DeserializeOwned;
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn SubscriberDirectory>,
    pub ledger: Arc<dyn SessionLedger>,
    pub evaluator: Arc<Evaluator>,
    pub audit: Arc<AuditLogger>,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn SubscriberDirectory>,
        ledger: Arc<dyn SessionLedger>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        let evaluator = Arc::new(Evaluator::new(directory.clone()));
        AppState {
            directory,
            ledger,
            evaluator,
            audit,
        }
    }
}

/// Why a request body could not be parsed
#[derive(Debug)]
pub struct BodyError(String);

impl fmt::Display for BodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl IntoResponse for BodyError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.0).into_response()
    }
}

/// Request body that may arrive as JSON or form-urlencoded
///
/// The gateway's REST module speaks either depending on configuration, so
/// every endpoint takes both. Anything without a JSON content type is
/// parsed as a form.
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = BodyError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();

        if content_type.starts_with("application/json") {
            let Json(payload) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| BodyError(e.to_string()))?;
            return Ok(JsonOrForm(payload));
        }

        let Form(payload) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| BodyError(e.to_string()))?;
        Ok(JsonOrForm(payload))
    }
}

fn accept_response(attributes: AttributeMap) -> Response {
    (StatusCode::OK, Json(attributes)).into_response()
}

fn empty_accept_response() -> Response {
    accept_response(AttributeMap::new())
}

fn reject_response(reason: RejectReason) -> Response {
    let attributes = Decision::reject(reason.message()).into_attributes();
    (StatusCode::OK, Json(attributes)).into_response()
}

/// Generic reject body; internal detail stays in the logs
fn server_error_response() -> Response {
    let attributes = Decision::reject(RejectReason::InternalError.message()).into_attributes();
    (StatusCode::INTERNAL_SERVER_ERROR, Json(attributes)).into_response()
}

/// Concurrent-session rules for a registered customer
///
/// Only sessions on the same credential pair conflict. PPPoE allows one
/// live session; hotspot pairs conflict only when the package caps the
/// customer at a single device.
async fn simultaneous_use_gate(
    ledger: &dyn SessionLedger,
    customer: &CustomerRecord,
    kind: CredentialKind,
) -> Result<Option<RejectReason>, LedgerError> {
    let Some(connection) = ledger.connection(&customer.id).await? else {
        return Ok(None);
    };

    if connection.session_status != SessionStatus::Online || connection.connection_kind != kind {
        return Ok(None);
    }

    match kind {
        CredentialKind::Pppoe => Ok(Some(RejectReason::SessionAlreadyActive)),
        CredentialKind::Hotspot => {
            let single_device = customer
                .package
                .as_ref()
                .and_then(|p| p.max_devices)
                .is_some_and(|max| max <= 1);
            if single_device {
                Ok(Some(RejectReason::MaxDeviceLimitReached))
            } else {
                Ok(None)
            }
        }
    }
}

async fn audit_auth_reject(
    audit: &AuditLogger,
    event: AuditEventType,
    username: &str,
    nas_ip: Option<&str>,
    reason: RejectReason,
) {
    let mut entry = AuditEntry::new(event)
        .with_username(username)
        .with_reason(reason.code());
    if let Some(ip) = nas_ip {
        entry = entry.with_nas_ip(ip);
    }
    audit.log(entry).await;
}

/// Full decision: entitlement, concurrency gate, reply attributes
async fn authorize_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<AuthorizeRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed authorize request");
            return server_error_response();
        }
    };
    let now = Utc::now();

    let evaluation = match state.evaluator.evaluate(&request.username, now).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            error!(username = %request.username, error = %e, "authorize lookup failed");
            return server_error_response();
        }
    };

    let entitlement = match evaluation {
        Evaluation::Accept(entitlement) => entitlement,
        Evaluation::Reject(reason) => {
            info!(username = %request.username, reason = %reason, "authorize reject");
            audit_auth_reject(
                &state.audit,
                AuditEventType::AuthorizeReject,
                &request.username,
                request.nas_ip_address.as_deref(),
                reason,
            )
            .await;
            return reject_response(reason);
        }
    };

    if let Subscriber::Customer(customer) = &entitlement.subscriber {
        match simultaneous_use_gate(state.ledger.as_ref(), customer, entitlement.kind).await {
            Ok(None) => {}
            Ok(Some(reason)) => {
                info!(username = %request.username, reason = %reason, "authorize reject");
                audit_auth_reject(
                    &state.audit,
                    AuditEventType::AuthorizeReject,
                    &request.username,
                    request.nas_ip_address.as_deref(),
                    reason,
                )
                .await;
                return reject_response(reason);
            }
            Err(e) => {
                error!(username = %request.username, error = %e, "session lookup failed");
                return server_error_response();
            }
        }
    }

    let attributes = build_accept_attributes(&entitlement);
    info!(
        username = %request.username,
        kind = %entitlement.kind.as_str(),
        "authorize accept"
    );
    let mut entry =
        AuditEntry::new(AuditEventType::AuthorizeAccept).with_username(request.username.as_str());
    if let Some(ip) = &request.nas_ip_address {
        entry = entry.with_nas_ip(ip.as_str());
    }
    state.audit.log(entry).await;
    accept_response(attributes)
}

/// Strict credential verification, no attributes on accept
async fn authenticate_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<AuthenticateRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed authenticate request");
            return server_error_response();
        }
    };
    let now = Utc::now();

    let evaluation = match state.evaluator.evaluate(&request.username, now).await {
        Ok(evaluation) => evaluation,
        Err(e) => {
            error!(username = %request.username, error = %e, "authenticate lookup failed");
            return server_error_response();
        }
    };

    let reason = match evaluation {
        Evaluation::Accept(entitlement) => {
            match entitlement.verify_password(request.password.as_deref()) {
                Ok(()) => {
                    info!(username = %request.username, "authenticate accept");
                    state
                        .audit
                        .log(
                            AuditEntry::new(AuditEventType::AuthenticateAccept)
                                .with_username(request.username.as_str()),
                        )
                        .await;
                    return empty_accept_response();
                }
                Err(reason) => reason,
            }
        }
        Evaluation::Reject(reason) => reason,
    };

    info!(username = %request.username, reason = %reason, "authenticate reject");
    audit_auth_reject(
        &state.audit,
        AuditEventType::AuthenticateReject,
        &request.username,
        None,
        reason,
    )
    .await;
    reject_response(reason)
}

/// Existence and active-status gate before accounting is forwarded
///
/// Vouchers pass unrestricted; the accounting handler itself understands
/// their lifecycle.
async fn preacct_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<PreacctRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed preacct request");
            return server_error_response();
        }
    };

    let subscriber = match state.directory.find_by_username(&request.username).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!(username = %request.username, error = %e, "preacct lookup failed");
            return server_error_response();
        }
    };

    let reason = match subscriber {
        Some(Subscriber::Voucher(_)) => return empty_accept_response(),
        Some(Subscriber::Customer(customer)) => {
            if customer.status == CustomerStatus::Active {
                return empty_accept_response();
            }
            RejectReason::AccountInactive
        }
        None => RejectReason::UserNotFound,
    };

    info!(username = %request.username, reason = %reason, "preacct reject");
    audit_auth_reject(
        &state.audit,
        AuditEventType::PreacctReject,
        &request.username,
        request.nas_ip_address.as_deref(),
        reason,
    )
    .await;
    reject_response(reason)
}

/// Accounting event sink. Always acknowledges; faults are logged only.
async fn accounting_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<AccountingRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed accounting request, acknowledging anyway");
            return empty_accept_response();
        }
    };

    let status_type = match request.status_type() {
        Ok(status_type) => status_type,
        Err(e) => {
            warn!(username = %request.username, error = %e, "ignoring accounting event");
            return empty_accept_response();
        }
    };
    let now = Utc::now();

    let subscriber = match state.directory.find_by_username(&request.username).await {
        Ok(Some(subscriber)) => subscriber,
        Ok(None) => {
            warn!(username = %request.username, "accounting event for unknown subscriber");
            return empty_accept_response();
        }
        Err(e) => {
            error!(username = %request.username, error = %e, "accounting lookup failed");
            return empty_accept_response();
        }
    };

    match subscriber {
        Subscriber::Voucher(voucher) => {
            record_voucher_accounting(&state, &request, &voucher.code, status_type, now).await
        }
        Subscriber::Customer(customer) => {
            record_customer_accounting(&state, &request, &customer, status_type, now).await
        }
    }

    empty_accept_response()
}

/// The only accounting state a voucher has is its consumption anchor,
/// set exactly once by the first Start
async fn record_voucher_accounting(
    state: &AppState,
    request: &AccountingRequest,
    code: &str,
    status_type: AcctStatusType,
    now: chrono::DateTime<Utc>,
) {
    if status_type != AcctStatusType::Start {
        debug!(voucher = %code, status_type = %status_type, "voucher accounting event");
        return;
    }

    match state.directory.anchor_voucher(code, now).await {
        Ok(true) => {
            info!(voucher = %code, "voucher consumption window anchored");
            let mut entry = AuditEntry::new(AuditEventType::AcctStart)
                .with_username(code)
                .with_outcome("anchored");
            if let Some(session_id) = &request.acct_session_id {
                entry = entry.with_session_id(session_id.as_str());
            }
            state.audit.log(entry).await;
        }
        Ok(false) => {
            // Re-authentication within the window; the anchor stands
            debug!(voucher = %code, "voucher already anchored");
        }
        Err(e) => {
            error!(voucher = %code, error = %e, "failed to anchor voucher");
        }
    }
}

async fn record_customer_accounting(
    state: &AppState,
    request: &AccountingRequest,
    customer: &CustomerRecord,
    status_type: AcctStatusType,
    now: chrono::DateTime<Utc>,
) {
    let Some(kind) = customer.credential_kind(&request.username) else {
        warn!(username = %request.username, "accounting username matches no credential pair");
        return;
    };
    let update = SessionUpdate::from_request(request, kind);

    let (event, result) = match status_type {
        AcctStatusType::Start => (
            AuditEventType::AcctStart,
            state.ledger.record_start(&customer.id, &update, now).await,
        ),
        AcctStatusType::InterimUpdate => (
            AuditEventType::AcctInterimUpdate,
            state.ledger.record_interim(&customer.id, &update, now).await,
        ),
        AcctStatusType::Stop => (
            AuditEventType::AcctStop,
            state.ledger.record_stop(&customer.id, &update, now).await,
        ),
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => {
            error!(
                customer_id = %customer.id,
                status_type = %status_type,
                error = %e,
                "failed to record accounting event"
            );
            return;
        }
    };

    if outcome.is_applied() {
        info!(
            customer_id = %customer.id,
            status_type = %status_type,
            outcome = %outcome,
            "accounting event recorded"
        );
    } else {
        warn!(
            customer_id = %customer.id,
            status_type = %status_type,
            outcome = %outcome,
            session_id = ?update.session_id,
            "accounting event ignored"
        );
    }

    let mut entry = AuditEntry::new(event)
        .with_username(request.username.as_str())
        .with_outcome(outcome.to_string());
    if let Some(session_id) = &request.acct_session_id {
        entry = entry.with_session_id(session_id.as_str());
    }
    if let Some(nas_ip) = &request.nas_ip_address {
        entry = entry.with_nas_ip(nas_ip.as_str());
    }
    state.audit.log(entry).await;
}

/// Single-use and concurrent-session enforcement
async fn checksimul_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<CheckSimulRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed checksimul request");
            return server_error_response();
        }
    };

    let subscriber = match state.directory.find_by_username(&request.username).await {
        Ok(subscriber) => subscriber,
        Err(e) => {
            error!(username = %request.username, error = %e, "checksimul lookup failed");
            return server_error_response();
        }
    };

    let reason = match subscriber {
        None => {
            debug!(username = %request.username, "checksimul for unknown subscriber");
            return empty_accept_response();
        }
        Some(Subscriber::Voucher(voucher)) => {
            if voucher.status == VoucherStatus::Used {
                Some(RejectReason::VoucherAlreadyUsed)
            } else {
                None
            }
        }
        Some(Subscriber::Customer(customer)) => {
            let Some(kind) = customer.credential_kind(&request.username) else {
                return empty_accept_response();
            };
            match simultaneous_use_gate(state.ledger.as_ref(), &customer, kind).await {
                Ok(reason) => reason,
                Err(e) => {
                    error!(username = %request.username, error = %e, "session lookup failed");
                    return server_error_response();
                }
            }
        }
    };

    match reason {
        Some(reason) => {
            info!(username = %request.username, reason = %reason, "checksimul reject");
            audit_auth_reject(
                &state.audit,
                AuditEventType::CheckSimulReject,
                &request.username,
                None,
                reason,
            )
            .await;
            reject_response(reason)
        }
        None => empty_accept_response(),
    }
}

/// Accept-only acknowledgment hook
async fn postauth_handler(
    State(state): State<AppState>,
    body: Result<JsonOrForm<PostAuthRequest>, BodyError>,
) -> Response {
    let JsonOrForm(request) = match body {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "malformed postauth request, acknowledging anyway");
            return empty_accept_response();
        }
    };

    info!(
        username = %request.username,
        reply_message = ?request.reply_message,
        "post-auth acknowledgment"
    );
    let mut entry =
        AuditEntry::new(AuditEventType::PostAuth).with_username(request.username.as_str());
    if let Some(message) = &request.reply_message {
        entry = entry.with_details(message.as_str());
    }
    state.audit.log(entry).await;
    empty_accept_response()
}

/// Liveness payload for the gateway's module health check
async fn health_handler() -> Response {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" }))).into_response()
}

/// Readiness: both stores must answer
async fn ready_handler(State(state): State<AppState>) -> Response {
    if let Err(e) = state.directory.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("directory unavailable: {e}"),
        )
            .into_response();
    }
    if let Err(e) = state.ledger.ping().await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("ledger unavailable: {e}"),
        )
            .into_response();
    }
    (StatusCode::OK, "ready").into_response()
}

async fn live_handler() -> Response {
    (StatusCode::OK, "alive").into_response()
}

/// Build the endpoint router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/authorize", post(authorize_handler))
        .route("/authenticate", post(authenticate_handler))
        .route("/preacct", post(preacct_handler))
        .route("/accounting", post(accounting_handler))
        .route("/checksimul", post(checksimul_handler))
        .route("/postauth", post(postauth_handler))
        .route("/health", get(health_handler))
        .route("/health/ready", get(ready_handler))
        .route("/health/live", get(live_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the decision endpoints until the process is stopped
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<(), ServerError> {
    state
        .audit
        .log(AuditEntry::new(AuditEventType::ServerStart))
        .await;

    let app = create_router(state);
    info!("RLM backend listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::MemoryDirectory;
    use crate::ledger::MemoryLedger;
    use crate::subscriber::test_fixtures::{customer, hotspot_package, voucher};
    use axum::body::Body;
    use http_body_util::BodyExt;
    use rlm_proto::keys;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    async fn test_state() -> (AppState, Arc<MemoryDirectory>, Arc<MemoryLedger>) {
        let directory = Arc::new(MemoryDirectory::new());
        let ledger = Arc::new(MemoryLedger::new());
        let audit = Arc::new(AuditLogger::new(None).unwrap());
        let state = AppState::new(directory.clone(), ledger.clone(), audit);
        (state, directory, ledger)
    }

    fn post_json(uri: &str, body: Value) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap()
    }

    fn post_form(uri: &str, body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_authorize_accepts_pppoe_customer() {
        let (state, directory, _) = test_state().await;
        directory.add_customer(customer("cust-1")).await;

        let response = create_router(state)
            .oneshot(post_json(
                "/authorize",
                json!({"username": "cust-1@ppp", "password": "ppp-secret"}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[keys::CLEARTEXT_PASSWORD], "ppp-secret");
        assert_eq!(body[keys::FRAMED_PROTOCOL], "PPP");
        assert_eq!(body[keys::FRAMED_POOL], "pppoe-pool");
        assert_eq!(body[keys::IDLE_TIMEOUT], 1800);
        assert!(body.get(keys::AUTH_TYPE).is_none());
    }

    #[tokio::test]
    async fn test_authorize_rejects_unknown_user_from_form_body() {
        let (state, _, _) = test_state().await;

        let response = create_router(state)
            .oneshot(post_form("/authorize", "username=nobody&password=x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[keys::AUTH_TYPE], "Reject");
        assert_eq!(body[keys::REPLY_MESSAGE], "User not found");
    }

    #[tokio::test]
    async fn test_authorize_voucher_session_timeout_shrinks() {
        let (state, directory, _) = test_state().await;
        let now = Utc::now();
        let mut v = voucher("ABC123", now);
        v.last_used_at = Some(now - chrono::Duration::minutes(10));
        directory.add_voucher(v).await;

        let response = create_router(state)
            .oneshot(post_json("/authorize", json!({"username": "ABC123"})))
            .await
            .unwrap();

        let body = body_json(response).await;
        let timeout = body[keys::SESSION_TIMEOUT].as_u64().unwrap();
        // twenty minutes left of the thirty-minute window
        assert!(timeout > 1100 && timeout <= 1200, "timeout {timeout}");
        assert_eq!(body[keys::HOTSPOT_GROUP], "default");
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password() {
        let (state, directory, _) = test_state().await;
        directory.add_customer(customer("cust-1")).await;

        let router = create_router(state);
        let response = router
            .clone()
            .oneshot(post_json(
                "/authenticate",
                json!({"username": "cust-1@ppp", "password": "wrong"}),
            ))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body[keys::AUTH_TYPE], "Reject");
        assert_eq!(body[keys::REPLY_MESSAGE], "Invalid username or password");

        let response = router
            .oneshot(post_json(
                "/authenticate",
                json!({"username": "cust-1@ppp", "password": "ppp-secret"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_accounting_start_anchors_voucher_once() {
        let (state, directory, _) = test_state().await;
        let now = Utc::now();
        directory.add_voucher(voucher("ABC123", now)).await;

        let router = create_router(state);
        let start = json!({
            "username": "ABC123",
            "acct_status_type": "Start",
            "acct_session_id": "s1"
        });

        let response = router.clone().oneshot(post_json("/accounting", start.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let anchored = directory.voucher("ABC123").await.unwrap().last_used_at;
        assert!(anchored.is_some());

        // second Start leaves the anchor untouched
        router.oneshot(post_json("/accounting", start)).await.unwrap();
        let still = directory.voucher("ABC123").await.unwrap().last_used_at;
        assert_eq!(still, anchored);
    }

    #[tokio::test]
    async fn test_accounting_always_accepts() {
        let (state, _, _) = test_state().await;
        let router = create_router(state);

        // unknown subscriber
        let response = router
            .clone()
            .oneshot(post_json(
                "/accounting",
                json!({"username": "ghost", "acct_status_type": "Stop"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));

        // unhandled status type
        let response = router
            .clone()
            .oneshot(post_json(
                "/accounting",
                json!({"username": "ghost", "acct_status_type": "Accounting-On"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        // malformed body
        let response = router
            .oneshot(post_form("/accounting", "acct_status_type=Start"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({}));
    }

    #[tokio::test]
    async fn test_accounting_stop_accumulates_totals() {
        let (state, directory, ledger) = test_state().await;
        directory.add_customer(customer("cust-1")).await;
        let router = create_router(state);

        router
            .clone()
            .oneshot(post_json(
                "/accounting",
                json!({
                    "username": "cust-1@ppp",
                    "acct_status_type": "Start",
                    "acct_session_id": "s1",
                    "nas_ip_address": "10.0.0.1"
                }),
            ))
            .await
            .unwrap();

        let stop = json!({
            "username": "cust-1@ppp",
            "acct_status_type": "Stop",
            "acct_session_id": "s1",
            "acct_input_octets": 1000,
            "acct_output_octets": 4000,
            "acct_session_time": 120
        });
        router.clone().oneshot(post_json("/accounting", stop.clone())).await.unwrap();

        let conn = ledger.connection("cust-1").await.unwrap().unwrap();
        assert_eq!(conn.session_status, SessionStatus::Offline);
        assert_eq!(conn.total_input_octets, 1000);
        assert_eq!(conn.total_output_octets, 4000);

        // duplicate Stop is acknowledged but not double-counted
        let response = router.oneshot(post_json("/accounting", stop)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let conn = ledger.connection("cust-1").await.unwrap().unwrap();
        assert_eq!(conn.total_input_octets, 1000);
    }

    #[tokio::test]
    async fn test_checksimul_enforcement() {
        let (state, directory, ledger) = test_state().await;

        // PPPoE customer with a live session
        directory.add_customer(customer("cust-1")).await;
        // hotspot customers, capped and uncapped
        let mut capped = customer("cust-2");
        capped.package = Some(hotspot_package(1));
        directory.add_customer(capped).await;
        let mut roomy = customer("cust-3");
        roomy.package = Some(hotspot_package(3));
        directory.add_customer(roomy).await;

        let now = Utc::now();
        let pppoe_update = SessionUpdate {
            kind: CredentialKind::Pppoe,
            session_id: Some("s1".to_string()),
            nas_ip_address: None,
            nas_port: None,
            framed_ip_address: None,
            calling_station_id: None,
            called_station_id: None,
            framed_protocol: None,
            service_type: None,
            connect_info: None,
            terminate_cause: None,
            input_octets: 0,
            output_octets: 0,
            input_packets: 0,
            output_packets: 0,
            input_gigawords: 0,
            output_gigawords: 0,
            session_seconds: 0,
        };
        let hotspot_update = SessionUpdate {
            kind: CredentialKind::Hotspot,
            ..pppoe_update.clone()
        };
        ledger.record_start("cust-1", &pppoe_update, now).await.unwrap();
        ledger.record_start("cust-2", &hotspot_update, now).await.unwrap();
        ledger.record_start("cust-3", &hotspot_update, now).await.unwrap();

        let router = create_router(state);

        let body = body_json(
            router
                .clone()
                .oneshot(post_json("/checksimul", json!({"username": "cust-1@ppp"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body[keys::REPLY_MESSAGE], "Session already active");

        let body = body_json(
            router
                .clone()
                .oneshot(post_json("/checksimul", json!({"username": "cust-2@hs"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body[keys::REPLY_MESSAGE], "Maximum device limit reached");

        let body = body_json(
            router
                .clone()
                .oneshot(post_json("/checksimul", json!({"username": "cust-3@hs"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body, json!({}));

        // same customer, other credential pair, no conflict
        let body = body_json(
            router
                .oneshot(post_json("/checksimul", json!({"username": "cust-1@hs"})))
                .await
                .unwrap(),
        )
        .await;
        assert_eq!(body, json!({}));
    }

    #[tokio::test]
    async fn test_checksimul_used_voucher() {
        let (state, directory, _) = test_state().await;
        let now = Utc::now();
        let mut v = voucher("ABC123", now);
        v.status = VoucherStatus::Used;
        directory.add_voucher(v).await;

        let response = create_router(state)
            .oneshot(post_json("/checksimul", json!({"username": "ABC123"})))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body[keys::AUTH_TYPE], "Reject");
        assert_eq!(body[keys::REPLY_MESSAGE], "Voucher has already been used");
    }

    #[tokio::test]
    async fn test_postauth_and_health() {
        let (state, _, _) = test_state().await;
        let router = create_router(state);

        let response = router
            .clone()
            .oneshot(post_json(
                "/postauth",
                json!({"username": "cust-1@ppp", "reply_message": "ok"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({"status": "ok"}));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/health/ready")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_auth_body_fails_closed() {
        let (state, _, _) = test_state().await;

        // missing required username field
        let response = create_router(state)
            .oneshot(post_json("/authorize", json!({"password": "x"})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body[keys::AUTH_TYPE], "Reject");
    }
}
