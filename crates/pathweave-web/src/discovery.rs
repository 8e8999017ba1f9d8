//! Route discovery from the routes directory
//!
//! Any directory that directly contains `controller.toml` becomes a route.
//! Its path relative to the routes root is the URL, with bracketed segments
//! (`[id]`) turned into path parameters (`:id`).

use once_cell::sync::Lazy;
use pathweave_core::{
    ControllerSpec, Error, Result, RouteRegistration, CONTROLLER_FILE, INDEX_ENDPOINT,
};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

static PARAM_NAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("Invalid param name regex"));

/// A single segment of a route directory path
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment<'a> {
    Literal(&'a str),
    Param(&'a str),
}

fn parse_segment(segment: &str) -> Segment<'_> {
    match segment.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
        Some(name) => Segment::Param(name),
        None => Segment::Literal(segment),
    }
}

/// Immutable table of discovered routes, sorted by URL pattern
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteRegistration>,
}

impl RouteTable {
    /// Scan `root` for controller files
    pub fn discover(root: &Path) -> Result<Self> {
        Ok(Self {
            routes: discover_routes(root)?,
        })
    }

    pub fn from_routes(mut routes: Vec<RouteRegistration>) -> Self {
        routes.sort_by(|a, b| a.url_pattern.cmp(&b.url_pattern));
        Self { routes }
    }

    pub fn routes(&self) -> &[RouteRegistration] {
        &self.routes
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Find the route matching a concrete request path.
    ///
    /// Literal segments win over parameters when several routes match.
    pub fn match_path(&self, path: &str) -> Option<(&RouteRegistration, Vec<(String, String)>)> {
        let wanted: Vec<&str> = split_path(path);

        self.routes
            .iter()
            .filter_map(|route| {
                let pattern = split_path(&route.url_pattern);
                if pattern.len() != wanted.len() {
                    return None;
                }
                let mut params = Vec::new();
                let mut literals = 0;
                for (expected, actual) in pattern.iter().zip(&wanted) {
                    match expected.strip_prefix(':') {
                        Some(name) => params.push((name.to_string(), actual.to_string())),
                        None if expected == actual => literals += 1,
                        None => return None,
                    }
                }
                Some((literals, route, params))
            })
            .max_by_key(|(literals, _, _)| *literals)
            .map(|(_, route, params)| (route, params))
    }
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Walk `root` and build a registration for every controller directory.
///
/// Fails on unreadable or malformed controller files and on two directories
/// that map onto the same URL shape.
pub fn discover_routes(root: &Path) -> Result<Vec<RouteRegistration>> {
    if !root.is_dir() {
        return Err(Error::config(format!(
            "Routes directory not found: {}",
            root.display()
        )));
    }

    let mut dirs = Vec::new();
    collect_controller_dirs(root, root, &mut dirs)?;

    let mut shapes: HashMap<String, String> = HashMap::new();
    let mut routes = Vec::with_capacity(dirs.len());

    for rel in dirs {
        let registration = build_registration(root, &rel)?;
        let shape = url_shape(&registration.url_pattern);
        if let Some(first) = shapes.insert(shape, rel.clone()) {
            return Err(Error::DuplicateRoute {
                pattern: registration.url_pattern,
                first,
                second: rel,
            });
        }
        debug!(
            "Discovered route {} -> {}",
            registration.url_pattern, registration.handler_module_path
        );
        routes.push(registration);
    }

    routes.sort_by(|a, b| a.url_pattern.cmp(&b.url_pattern));
    Ok(routes)
}

fn collect_controller_dirs(root: &Path, dir: &Path, out: &mut Vec<String>) -> Result<()> {
    if dir.join(CONTROLLER_FILE).is_file() {
        out.push(relative_route(root, dir));
    }

    let mut children: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect();
    children.sort();

    for child in children {
        collect_controller_dirs(root, &child, out)?;
    }
    Ok(())
}

/// Directory path relative to the routes root with `/` separators
fn relative_route(root: &Path, dir: &Path) -> String {
    dir.strip_prefix(root)
        .unwrap_or(dir)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn build_registration(root: &Path, rel: &str) -> Result<RouteRegistration> {
    let controller_path = root.join(rel).join(CONTROLLER_FILE);
    let handler_module_path = if rel.is_empty() {
        CONTROLLER_FILE.to_string()
    } else {
        format!("{}/{}", rel, CONTROLLER_FILE)
    };

    let (url_pattern, param_names) =
        url_pattern(rel).map_err(|msg| Error::invalid_controller(&controller_path, msg))?;

    let content = fs::read_to_string(&controller_path)?;
    let controller = ControllerSpec::parse(&content)
        .map_err(|e| Error::invalid_controller(&controller_path, e.to_string()))?;

    Ok(RouteRegistration {
        url_pattern,
        param_names,
        handler_module_path,
        endpoint_id: endpoint_id(rel),
        route_dir: rel.to_string(),
        controller,
    })
}

/// Turn a relative route directory into a router pattern and its parameter names
pub fn url_pattern(rel: &str) -> std::result::Result<(String, Vec<String>), String> {
    if rel.is_empty() {
        return Ok(("/".to_string(), Vec::new()));
    }

    let mut params: Vec<String> = Vec::new();
    let mut segments = Vec::new();

    for raw in rel.split('/') {
        match parse_segment(raw) {
            Segment::Param(name) => {
                if !PARAM_NAME_REGEX.is_match(name) {
                    return Err(format!("invalid parameter name '{}'", raw));
                }
                if params.iter().any(|p| p == name) {
                    return Err(format!("parameter '{}' appears twice", name));
                }
                params.push(name.to_string());
                segments.push(format!(":{}", name));
            }
            Segment::Literal(literal) => {
                if literal.starts_with(':') || literal.starts_with('*') {
                    return Err(format!("segment '{}' would be read as a router parameter", literal));
                }
                segments.push(literal.to_string());
            }
        }
    }

    Ok((format!("/{}", segments.join("/")), params))
}

/// Endpoint id for a relative route directory
pub fn endpoint_id(rel: &str) -> String {
    if rel.is_empty() {
        return INDEX_ENDPOINT.to_string();
    }
    let id = rel.replace('/', "_").replace(['[', ']'], "");
    format!("route_{}", id)
}

/// Pattern with parameter names erased, so `/a/:id` and `/a/:name` collide
fn url_shape(pattern: &str) -> String {
    pattern
        .split('/')
        .map(|s| if s.starts_with(':') { ":" } else { s })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn add_controller(root: &Path, rel: &str, body: &str) {
        let dir = root.join(rel);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(CONTROLLER_FILE), body).unwrap();
    }

    #[test]
    fn test_url_pattern_with_param() {
        let (pattern, params) = url_pattern("a/[id]/b").unwrap();
        assert_eq!(pattern, "/a/:id/b");
        assert_eq!(params, vec!["id".to_string()]);
    }

    #[test]
    fn test_url_pattern_root() {
        let (pattern, params) = url_pattern("").unwrap();
        assert_eq!(pattern, "/");
        assert!(params.is_empty());
    }

    #[test]
    fn test_url_pattern_rejects_bad_params() {
        assert!(url_pattern("a/[]").is_err());
        assert!(url_pattern("a/[id]/[id]").is_err());
        assert!(url_pattern("a/:raw").is_err());
    }

    #[test]
    fn test_endpoint_id() {
        assert_eq!(endpoint_id(""), "route_index");
        assert_eq!(endpoint_id("user/[id]"), "route_user_id");
        assert_eq!(endpoint_id("a/[id]/b"), "route_a_id_b");
    }

    #[test]
    fn test_discover_tree() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        add_controller(root, "", "");
        add_controller(root, "a/[id]/b", "title = \"B {id}\"");
        add_controller(root, "about", "handler = \"json\"\nmethods = [\"GET\"]");
        // A directory without a controller is not a route
        fs::create_dir_all(root.join("assets")).unwrap();
        fs::write(root.join("assets/styles.css"), "body {}").unwrap();

        let routes = discover_routes(root).unwrap();
        let patterns: Vec<&str> = routes.iter().map(|r| r.url_pattern.as_str()).collect();
        assert_eq!(patterns, vec!["/", "/a/:id/b", "/about"]);

        let nested = &routes[1];
        assert_eq!(nested.param_names, vec!["id".to_string()]);
        assert_eq!(nested.handler_module_path, "a/[id]/b/controller.toml");
        assert_eq!(nested.endpoint_id, "route_a_id_b");
        assert_eq!(nested.route_dir, "a/[id]/b");
        assert_eq!(nested.controller.title.as_deref(), Some("B {id}"));

        assert!(routes[0].is_index());
        assert_eq!(routes[0].endpoint_id, "route_index");
        assert_eq!(routes[2].controller.handler, "json");
    }

    #[test]
    fn test_intermediate_dirs_need_own_controller() {
        let dir = TempDir::new().unwrap();
        add_controller(dir.path(), "a/b/c", "");

        let routes = discover_routes(dir.path()).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].url_pattern, "/a/b/c");
    }

    #[test]
    fn test_malformed_controller_fails_fast() {
        let dir = TempDir::new().unwrap();
        add_controller(dir.path(), "broken", "handler = [");

        let result = discover_routes(dir.path());
        assert!(matches!(result, Err(Error::InvalidController { .. })));
    }

    #[test]
    fn test_conflicting_param_names_fail() {
        let dir = TempDir::new().unwrap();
        add_controller(dir.path(), "user/[id]", "");
        add_controller(dir.path(), "user/[name]", "");

        let result = discover_routes(dir.path());
        assert!(matches!(result, Err(Error::DuplicateRoute { .. })));
    }

    #[test]
    fn test_missing_root() {
        let result = discover_routes(Path::new("/nonexistent/pathweave/routes"));
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_match_path_prefers_literals() {
        let dir = TempDir::new().unwrap();
        add_controller(dir.path(), "user/[id]", "");
        add_controller(dir.path(), "user/me", "");
        let table = RouteTable::discover(dir.path()).unwrap();

        let (route, params) = table.match_path("/user/42").unwrap();
        assert_eq!(route.route_dir, "user/[id]");
        assert_eq!(params, vec![("id".to_string(), "42".to_string())]);

        let (route, params) = table.match_path("/user/me/").unwrap();
        assert_eq!(route.route_dir, "user/me");
        assert!(params.is_empty());

        assert!(table.match_path("/user/42/edit").is_none());
    }

    #[test]
    fn test_match_root() {
        let dir = TempDir::new().unwrap();
        add_controller(dir.path(), "", "");
        let table = RouteTable::discover(dir.path()).unwrap();
        let (route, _) = table.match_path("/").unwrap();
        assert!(route.is_index());
    }
}
