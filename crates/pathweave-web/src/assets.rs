//! Per-route stylesheet and script injection

use pathweave_core::{INDEX_ROUTE, SCRIPT_FILE, STYLESHEET_FILE};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::discovery::RouteTable;
use crate::session::Identity;
use crate::template::route_key;

/// Asset URLs of a route, present only when the file exists in the route directory
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteAssets {
    pub style_url: Option<String>,
    pub script_url: Option<String>,
}

impl RouteAssets {
    /// Look for `styles.css` and `script.js` in `route_dir`; URLs are built from `route`
    pub fn probe(routes_root: &Path, route_dir: &str, route: &str) -> Self {
        let dir = routes_root.join(route_dir);
        let url_if_present = |file: &str| dir.join(file).is_file().then(|| asset_url(route, file));

        Self {
            style_url: url_if_present(STYLESHEET_FILE),
            script_url: url_if_present(SCRIPT_FILE),
        }
    }
}

fn asset_url(route: &str, file: &str) -> String {
    if route.is_empty() {
        format!("/{}", file)
    } else {
        format!("/{}/{}", route, file)
    }
}

/// Variables every page template can use
pub fn template_context(assets: &RouteAssets, route: &str, identity: &Identity) -> Map<String, Value> {
    let optional = |value: Option<&str>| value.map_or(Value::Null, |v| Value::String(v.to_string()));
    let current_route = if route.is_empty() { INDEX_ROUTE } else { route };

    let mut context = Map::new();
    context.insert("style_url".to_string(), optional(assets.style_url.as_deref()));
    context.insert("script_url".to_string(), optional(assets.script_url.as_deref()));
    context.insert("current_route".to_string(), Value::String(current_route.to_string()));
    context.insert("is_authenticated".to_string(), Value::Bool(identity.is_authenticated()));
    context.insert("user".to_string(), optional(identity.user()));
    context
}

/// Map a request for `/<route>/<file>` onto a route asset on disk.
///
/// Only `styles.css` and `script.js` are served. Dynamic routes are resolved
/// through the route table so `/user/42/styles.css` reads `user/[id]/styles.css`.
pub fn resolve_asset(routes_root: &Path, table: &RouteTable, request_path: &str) -> Option<PathBuf> {
    let trimmed = route_key(request_path);
    let (route, file) = trimmed.rsplit_once('/').unwrap_or(("", trimmed));

    if file != STYLESHEET_FILE && file != SCRIPT_FILE {
        return None;
    }
    if route
        .split('/')
        .any(|segment| segment == ".." || segment == "." || segment.contains('\\'))
    {
        return None;
    }

    let dir = match table.match_path(route) {
        Some((registration, _)) => registration.route_dir.clone(),
        None => route.to_string(),
    };

    let path = routes_root.join(dir).join(file);
    path.is_file().then_some(path)
}
