//! Controller trait and the in-process controller registry
//!
//! A `controller.toml` names its handler; the registry maps that name to an
//! implementation. Binding happens once at startup and fails on unknown names.

use async_trait::async_trait;
use axum::{
    http::Method,
    response::{Html, IntoResponse, Json, Response},
};
use pathweave_core::{Error, Result, RouteRegistration, PAGE_TEMPLATE};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use crate::assets::{template_context, RouteAssets};
use crate::discovery::RouteTable;
use crate::session::Identity;
use crate::template::{self, route_key, TemplateRequest, TemplateResolver};

/// Everything a controller gets to see about a request
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub params: BTreeMap<String, String>,
    pub query: HashMap<String, String>,
    pub identity: Identity,
    pub route: Arc<RouteRegistration>,
    pub templates: Arc<TemplateResolver>,
}

impl RequestContext {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn route(&self) -> &RouteRegistration {
        &self.route
    }

    /// Request path without surrounding slashes
    pub fn route_key(&self) -> &str {
        route_key(&self.path)
    }

    /// Render a template for this request.
    ///
    /// `vars` are layered over the asset and identity variables.
    pub fn render(&self, name: &str, vars: Map<String, Value>) -> Result<String> {
        let text = self.templates.resolve(&TemplateRequest {
            name,
            current_path: &self.path,
            route_dir: Some(&self.route.route_dir),
        })?;

        let assets = RouteAssets::probe(
            self.templates.routes_root(),
            &self.route.route_dir,
            self.route_key(),
        );
        let mut context = template_context(&assets, self.route_key(), &self.identity);
        context.extend(vars);

        Ok(template::render(&text, &context))
    }
}

/// Request handler bound to discovered routes
#[async_trait]
pub trait Controller: Send + Sync {
    async fn handle(&self, request: &RequestContext) -> Result<Response>;
}

/// Replace `{name}` placeholders with path parameters
pub fn interpolate(text: &str, params: &BTreeMap<String, String>) -> String {
    params.iter().fold(text.to_string(), |acc, (name, value)| {
        acc.replace(&format!("{{{}}}", name), value)
    })
}

/// Renders the route's `page.html`
pub struct PageController;

#[async_trait]
impl Controller for PageController {
    async fn handle(&self, request: &RequestContext) -> Result<Response> {
        let mut vars: Map<String, Value> = request
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();
        if let Some(title) = &request.route.controller.title {
            vars.insert(
                "title".to_string(),
                Value::String(interpolate(title, &request.params)),
            );
        }

        let html = request.render(PAGE_TEMPLATE, vars)?;
        Ok(Html(html).into_response())
    }
}

/// Echoes the matched route, path parameters and query as JSON
pub struct JsonController;

#[async_trait]
impl Controller for JsonController {
    async fn handle(&self, request: &RequestContext) -> Result<Response> {
        Ok(Json(json!({
            "endpoint": request.route.endpoint_id,
            "url": request.route.url_pattern,
            "method": request.method.as_str(),
            "params": request.params,
            "query": request.query,
            "user": request.identity.user(),
        }))
        .into_response())
    }
}

/// A discovered route joined with its controller
#[derive(Clone)]
pub struct BoundRoute {
    pub registration: Arc<RouteRegistration>,
    pub controller: Arc<dyn Controller>,
    pub methods: Vec<Method>,
}

/// Named controllers available to `controller.toml` files
#[derive(Clone)]
pub struct ControllerRegistry {
    controllers: HashMap<String, Arc<dyn Controller>>,
}

impl Default for ControllerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl ControllerRegistry {
    /// Registry without any controllers
    pub fn empty() -> Self {
        Self {
            controllers: HashMap::new(),
        }
    }

    /// Registry holding `page` and `json`
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register("page", PageController);
        registry.register("json", JsonController);
        registry
    }

    /// Add or replace a controller
    pub fn register(&mut self, name: impl Into<String>, controller: impl Controller + 'static) {
        self.controllers.insert(name.into(), Arc::new(controller));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Controller>> {
        self.controllers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.controllers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Attach a controller to every route in the table
    pub fn bind(&self, table: &RouteTable, routes_root: &Path) -> Result<Vec<BoundRoute>> {
        table
            .routes()
            .iter()
            .map(|registration| {
                let path = routes_root.join(&registration.handler_module_path);
                let controller = self.get(&registration.controller.handler).ok_or_else(|| {
                    Error::UnknownHandler {
                        path: path.clone(),
                        handler: registration.controller.handler.clone(),
                    }
                })?;
                let methods = parse_methods(&registration.controller.methods)
                    .map_err(|msg| Error::invalid_controller(&path, msg))?;

                Ok(BoundRoute {
                    registration: Arc::new(registration.clone()),
                    controller,
                    methods,
                })
            })
            .collect()
    }
}

fn parse_methods(methods: &[String]) -> std::result::Result<Vec<Method>, String> {
    if methods.is_empty() {
        return Err("no methods listed".to_string());
    }
    methods
        .iter()
        .map(|m| {
            let upper = m.trim().to_uppercase();
            match upper.as_str() {
                "GET" | "POST" | "PUT" | "DELETE" | "PATCH" | "HEAD" | "OPTIONS" | "TRACE" => {
                    Method::from_bytes(upper.as_bytes()).map_err(|e| e.to_string())
                }
                _ => Err(format!("unsupported method '{}'", m)),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::fs;
    use tempfile::TempDir;

    fn add_route(root: &Path, rel: &str, controller: &str, page: Option<&str>) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("controller.toml"), controller).unwrap();
        if let Some(page) = page {
            fs::write(dir.join("page.html"), page).unwrap();
        }
    }

    fn context(root: &Path, table: &RouteTable, path: &str) -> RequestContext {
        let (route, params) = table.match_path(path).unwrap();
        RequestContext {
            method: Method::GET,
            path: path.to_string(),
            params: params.into_iter().collect(),
            query: HashMap::new(),
            identity: Identity::default(),
            route: Arc::new(route.clone()),
            templates: Arc::new(TemplateResolver::new(root)),
        }
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_interpolate() {
        let params: BTreeMap<String, String> =
            [("id".to_string(), "7".to_string())].into_iter().collect();
        assert_eq!(interpolate("User {id} / {other}", &params), "User 7 / {other}");
    }

    #[test]
    fn test_registry_builtins() {
        let registry = ControllerRegistry::default();
        assert_eq!(registry.names(), vec!["json", "page"]);
        assert!(registry.get("page").is_some());
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn test_bind_unknown_handler_fails() {
        let dir = TempDir::new().unwrap();
        add_route(dir.path(), "x", "handler = \"nope\"", None);
        let table = RouteTable::discover(dir.path()).unwrap();

        let result = ControllerRegistry::default().bind(&table, dir.path());
        match result {
            Err(Error::UnknownHandler { path, handler }) => {
                assert_eq!(handler, "nope");
                assert!(path.ends_with("x/controller.toml"));
            }
            _ => panic!("expected unknown handler error"),
        }
    }

    #[test]
    fn test_bind_rejects_bad_methods() {
        let dir = TempDir::new().unwrap();
        add_route(dir.path(), "x", "methods = [\"FETCH\"]", None);
        let table = RouteTable::discover(dir.path()).unwrap();

        let result = ControllerRegistry::default().bind(&table, dir.path());
        assert!(matches!(result, Err(Error::InvalidController { .. })));
    }

    #[test]
    fn test_bind_methods() {
        let dir = TempDir::new().unwrap();
        add_route(dir.path(), "x", "methods = [\"get\", \"delete\"]", None);
        let table = RouteTable::discover(dir.path()).unwrap();

        let bound = ControllerRegistry::default().bind(&table, dir.path()).unwrap();
        assert_eq!(bound[0].methods, vec![Method::GET, Method::DELETE]);
    }

    #[tokio::test]
    async fn test_page_controller_renders_title() {
        let dir = TempDir::new().unwrap();
        add_route(
            dir.path(),
            "user/[id]",
            "title = \"User {id}\"",
            Some("<h1>{{ title }}</h1><p>{{ id }}</p>{% if user %}hi{% else %}anon{% endif %}"),
        );
        let table = RouteTable::discover(dir.path()).unwrap();
        let request = context(dir.path(), &table, "/user/42");

        let response = PageController.handle(&request).await.unwrap();
        let body = body_text(response).await;
        assert!(body.contains("<h1>User 42</h1><p>42</p>anon"));
        assert!(body.contains("<title>User 42</title>"));
    }

    #[tokio::test]
    async fn test_page_controller_without_template() {
        let dir = TempDir::new().unwrap();
        add_route(dir.path(), "bare", "", None);
        let table = RouteTable::discover(dir.path()).unwrap();
        let request = context(dir.path(), &table, "/bare");

        let result = PageController.handle(&request).await;
        assert!(matches!(result, Err(Error::TemplateNotFound(_))));
    }

    #[tokio::test]
    async fn test_json_controller() {
        let dir = TempDir::new().unwrap();
        add_route(dir.path(), "api/[name]", "handler = \"json\"", None);
        let table = RouteTable::discover(dir.path()).unwrap();
        let request = context(dir.path(), &table, "/api/widgets");

        let response = JsonController.handle(&request).await.unwrap();
        let value: Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(value["endpoint"], "route_api_name");
        assert_eq!(value["params"]["name"], "widgets");
        assert_eq!(value["user"], Value::Null);
    }
}
