//! Pathweave Web - directory-routed application server
//!
//! Routes come from the routes tree, are bound to registered controllers,
//! and are served behind the login gate together with a handful of built-in
//! endpoints (`/login`, `/logout`, `/debug/routes`).

pub mod assets;
pub mod auth;
pub mod controller;
pub mod discovery;
pub mod session;
pub mod template;

pub use assets::{resolve_asset, template_context, RouteAssets};
pub use auth::AuthGate;
pub use controller::{
    BoundRoute, Controller, ControllerRegistry, JsonController, PageController, RequestContext,
};
pub use discovery::{discover_routes, RouteTable};
pub use session::{Identity, SessionStore};
pub use template::{TemplateRequest, TemplateResolver};

use axum::{
    extract::{ConnectInfo, Extension, Form, Path, Query, Request, State},
    http::{header, Method, StatusCode, Uri},
    middleware::{self, Next},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, on, MethodFilter},
    Router,
};
use pathweave_core::{Error, Result, Settings, LOGIN_PATH};
use pathweave_logs::SessionLog;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const LOGOUT_PATH: &str = "/logout";
const DEBUG_ROUTES_PATH: &str = "/debug/routes";

const LOGIN_FORM: &str = r#"
        <form method="post">
            <input type="text" name="username" placeholder="Username">
            <button type="submit">Login</button>
        </form>
    "#;

/// Entry of `/debug/routes`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub endpoint: String,
    pub methods: Vec<String>,
    pub url: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub log: Arc<SessionLog>,
    pub sessions: Arc<SessionStore>,
    pub auth: Arc<AuthGate>,
    pub templates: Arc<TemplateResolver>,
    pub routes: Arc<RouteTable>,
    endpoints: Arc<Vec<EndpointInfo>>,
}

impl AppState {
    pub fn new(settings: &Settings, log: Arc<SessionLog>, routes: RouteTable) -> Result<Self> {
        Ok(Self {
            log,
            sessions: Arc::new(SessionStore::new(settings.secret_key.clone())),
            auth: Arc::new(AuthGate::from_settings(settings)?),
            templates: Arc::new(TemplateResolver::new(settings.routes_dir.clone())),
            routes: Arc::new(routes),
            endpoints: Arc::new(Vec::new()),
        })
    }
}

/// JSON error body with a status code
pub fn json_error(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn internal_error() -> Response {
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
}

fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!("Handler panicked: {}", detail);
    internal_error()
}

fn method_filter(methods: &[Method]) -> Result<MethodFilter> {
    let mut combined: Option<MethodFilter> = None;
    for method in methods {
        let filter = MethodFilter::try_from(method.clone())
            .map_err(|e| Error::config(format!("Unsupported method {}: {}", method, e)))?;
        combined = Some(match combined {
            Some(existing) => existing.or(filter),
            None => filter,
        });
    }
    combined.ok_or_else(|| Error::config("Route has no methods"))
}

/// Discover routes, bind controllers and build the router
pub fn build_app(
    settings: &Settings,
    log: Arc<SessionLog>,
    registry: &ControllerRegistry,
) -> Result<Router> {
    let table = RouteTable::discover(&settings.routes_dir)?;
    let bound = registry.bind(&table, &settings.routes_dir)?;
    info!("Registered {} routes from {}", bound.len(), settings.routes_dir.display());

    let state = AppState::new(settings, log, table)?;
    create_router(state, bound)
}

/// Create the application router
pub fn create_router(mut state: AppState, bound: Vec<BoundRoute>) -> Result<Router> {
    let builtins = [
        (LOGIN_PATH, "login", vec!["GET", "POST"]),
        (LOGOUT_PATH, "logout", vec!["GET"]),
        (DEBUG_ROUTES_PATH, "debug_routes", vec!["GET"]),
    ];

    let mut endpoints = Vec::with_capacity(bound.len() + builtins.len());
    for (url, endpoint, methods) in &builtins {
        if let Some(route) = bound.iter().find(|r| r.registration.url_pattern == *url) {
            return Err(Error::DuplicateRoute {
                pattern: url.to_string(),
                first: format!("built-in {}", endpoint),
                second: route.registration.handler_module_path.clone(),
            });
        }
        endpoints.push(EndpointInfo {
            endpoint: endpoint.to_string(),
            methods: methods.iter().map(|m| m.to_string()).collect(),
            url: url.to_string(),
        });
    }
    for route in &bound {
        endpoints.push(EndpointInfo {
            endpoint: route.registration.endpoint_id.clone(),
            methods: route.methods.iter().map(|m| m.to_string()).collect(),
            url: route.registration.url_pattern.clone(),
        });
    }
    state.endpoints = Arc::new(endpoints);

    // Discovered routes sit behind the login gate
    let mut dynamic = Router::new();
    for route in &bound {
        let filter = method_filter(&route.methods)?;
        let bound_route = route.clone();
        let handler = move |State(state): State<AppState>,
                            method: Method,
                            uri: Uri,
                            identity: Option<Extension<Identity>>,
                            params: Option<Path<HashMap<String, String>>>,
                            query: Option<Query<HashMap<String, String>>>| {
            let route = bound_route.clone();
            async move {
                let request = RequestContext {
                    method,
                    path: uri.path().to_string(),
                    params: params.map(|Path(p)| p.into_iter().collect()).unwrap_or_default(),
                    query: query.map(|Query(q)| q).unwrap_or_default(),
                    identity: identity.map(|Extension(i)| i).unwrap_or_default(),
                    route: route.registration.clone(),
                    templates: state.templates.clone(),
                };
                dispatch(&state, &route, &request).await
            }
        };
        dynamic = dynamic.route(&route.registration.url_pattern, on(filter, handler));
    }
    if !bound.is_empty() {
        dynamic = dynamic.route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_login,
        ));
    }

    let builtin_routes = Router::new()
        .route(LOGIN_PATH, get(login_form).post(login_submit))
        .route(LOGOUT_PATH, get(logout))
        .route(DEBUG_ROUTES_PATH, get(debug_routes));

    Ok(Router::new()
        .merge(builtin_routes)
        .merge(dynamic)
        .fallback(serve_route_static)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(middleware::from_fn_with_state(state.clone(), log_requests))
        .layer(middleware::from_fn_with_state(state.clone(), session::identify))
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

async fn dispatch(state: &AppState, route: &BoundRoute, request: &RequestContext) -> Response {
    match route.controller.handle(request).await {
        Ok(response) => response,
        Err(e) => {
            state.log.error(format!(
                "{} {} failed in {}: {}",
                request.method, request.path, route.registration.handler_module_path, e
            ));
            internal_error()
        }
    }
}

fn is_quiet_path(path: &str) -> bool {
    path.starts_with("/static/") || path.starts_with("/favicon.ico")
}

/// Write every request to the session log
async fn log_requests(
    State(state): State<AppState>,
    remote: Option<ConnectInfo<SocketAddr>>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let quiet = is_quiet_path(&path);

    if !quiet {
        match remote {
            Some(ConnectInfo(addr)) => state
                .log
                .debug(format!("Request received: {} {} from {}", method, path, addr.ip())),
            None => state.log.debug(format!("Request received: {} {}", method, path)),
        }
    }

    let response = next.run(request).await;

    if !quiet {
        state.log.request(&path, method.as_str(), response.status().as_u16());
    }
    response
}

/// Serve `styles.css` and `script.js` out of route directories; anything else is a 404
async fn serve_route_static(State(state): State<AppState>, request: Request) -> Response {
    let path = request.uri().path().to_string();

    if matches!(*request.method(), Method::GET | Method::HEAD) {
        if let Some(file) = resolve_asset(state.templates.routes_root(), &state.routes, &path) {
            return match ServeFile::new(file).oneshot(request).await {
                Ok(response) => response.into_response(),
                Err(never) => match never {},
            };
        }
    }

    state.log.error(format!("404 Not Found: {}", path));
    json_error(StatusCode::NOT_FOUND, "Route not found")
}

#[derive(Debug, Deserialize)]
struct LoginForm {
    username: Option<String>,
}

async fn login_form() -> Html<&'static str> {
    Html(LOGIN_FORM)
}

async fn login_submit(
    State(state): State<AppState>,
    identity: Option<Extension<Identity>>,
    form: Option<Form<LoginForm>>,
) -> Response {
    let username = form
        .and_then(|Form(f)| f.username)
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty());

    let Some(username) = username else {
        return Html(LOGIN_FORM).into_response();
    };

    let existing = identity.and_then(|Extension(i)| i.session_id);
    let id = state.sessions.login(existing.as_deref(), &username);
    state.log.info(format!("User logged in: {}", username));

    (
        [(header::SET_COOKIE, state.sessions.cookie(&id))],
        Json(serde_json::json!({ "success": true, "message": "Logged in" })),
    )
        .into_response()
}

async fn logout(State(state): State<AppState>, identity: Option<Extension<Identity>>) -> Response {
    if let Some(id) = identity.and_then(|Extension(i)| i.session_id) {
        state.sessions.logout(&id);
    }
    Json(serde_json::json!({ "success": true, "message": "Logged out" })).into_response()
}

async fn debug_routes(State(state): State<AppState>) -> Json<Vec<EndpointInfo>> {
    Json(state.endpoints.as_ref().clone())
}

/// Bind the application on all interfaces and serve until shutdown
pub async fn start_server(
    settings: &Settings,
    log: Arc<SessionLog>,
    registry: &ControllerRegistry,
) -> Result<()> {
    let app = build_app(settings, log.clone(), registry)?;
    let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));

    log.info(format!(
        "Starting server on port {} (debug={})",
        settings.port, settings.debug
    ));
    info!("Pathweave listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
