//! Page composition and template rendering
//!
//! A request for `page.html` looks for the fragment in the route's own
//! directory. Fragments that are not full documents get wrapped in the shared
//! `_layout.html`, or in a built-in skeleton when there is no usable layout.
//! The composed text is rendered with a small expression language:
//!
//! - `{{ name }}` and `{{ name|default('fallback') }}`
//! - `{% if name %}...{% else %}...{% endif %}` (no nesting)
//!
//! Values are HTML-escaped.

use once_cell::sync::Lazy;
use pathweave_core::{
    Error, Result, CONTENT_PLACEHOLDER, LAYOUT_FILE, PAGE_TEMPLATE, SCRIPT_FILE, STYLESHEET_FILE,
};
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

static IF_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\{%-?\s*if\s+(\w+)\s*-?%\}(.*?)(?:\{%-?\s*else\s*-?%\}(.*?))?\{%-?\s*endif\s*-?%\}")
        .expect("Invalid if block regex")
});

static EXPRESSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\{\s*(\w+)\s*(?:\|\s*default\(\s*(?:'([^']*)'|"([^"]*)")\s*\)\s*)?\}\}"#)
        .expect("Invalid expression regex")
});

/// A template lookup for one request
#[derive(Debug, Clone, Copy)]
pub struct TemplateRequest<'a> {
    /// Template name, e.g. `page.html`
    pub name: &'a str,
    /// Concrete request path, e.g. `/user/42`
    pub current_path: &'a str,
    /// Directory of the matched route relative to the routes root.
    ///
    /// For `/user/42` this is `user/[id]`. Without it the request path is
    /// used as the directory.
    pub route_dir: Option<&'a str>,
}

/// Route key of a request path: the path without surrounding slashes
pub fn route_key(path: &str) -> &str {
    path.trim_matches('/')
}

fn is_safe_relative(rel: &str) -> bool {
    !rel.starts_with('/') && !rel.split('/').any(|segment| segment == ".." || segment.contains('\\'))
}

/// Loads templates from the routes tree and composes pages
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    routes_root: PathBuf,
}

impl TemplateResolver {
    pub fn new(routes_root: impl Into<PathBuf>) -> Self {
        Self {
            routes_root: routes_root.into(),
        }
    }

    pub fn routes_root(&self) -> &Path {
        &self.routes_root
    }

    /// Produce the template text for a request
    pub fn resolve(&self, request: &TemplateRequest<'_>) -> Result<String> {
        if request.name == PAGE_TEMPLATE {
            if let Some(page) = self.compose_page(request) {
                return Ok(page);
            }
        }
        self.default_template(request.name)
    }

    /// Compose the page for a route, or `None` to fall back to default resolution
    pub fn compose_page(&self, request: &TemplateRequest<'_>) -> Option<String> {
        let route = route_key(request.current_path);
        let dir = request.route_dir.unwrap_or(route);
        if !is_safe_relative(dir) {
            return None;
        }

        let fragment_path = self.routes_root.join(dir).join(PAGE_TEMPLATE);
        let fragment = read_optional(&fragment_path)?;

        if has_document_structure(&fragment) {
            debug!("Using full document {}", fragment_path.display());
            return Some(fragment);
        }

        let layout = read_optional(&self.routes_root.join(LAYOUT_FILE));
        Some(compose(&fragment, layout.as_deref(), route))
    }

    /// Load a template by name from the routes root
    pub fn default_template(&self, name: &str) -> Result<String> {
        if name.is_empty() || !is_safe_relative(name) {
            return Err(Error::TemplateNotFound(name.to_string()));
        }

        let path = self.routes_root.join(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::TemplateNotFound(name.to_string())),
            Err(e) => {
                warn!("Failed to read template {}: {}", path.display(), e);
                Err(Error::TemplateNotFound(name.to_string()))
            }
        }
    }
}

/// Read a file, treating a missing file as `None` and logging other failures
fn read_optional(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(text) => Some(text),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Whether a fragment already is a complete HTML document
pub fn has_document_structure(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.contains("<html") && lower.contains("</html>")
}

/// Wrap a fragment in a layout.
///
/// A layout without the content placeholder is ignored in favour of the
/// built-in skeleton.
pub fn compose(fragment: &str, layout: Option<&str>, route: &str) -> String {
    match layout {
        Some(layout) if layout.contains(CONTENT_PLACEHOLDER) => {
            layout.replace(CONTENT_PLACEHOLDER, fragment)
        }
        _ => default_layout(fragment, route),
    }
}

fn asset_path(route: &str, file: &str) -> String {
    if route.is_empty() {
        format!("/{}", file)
    } else {
        format!("/{}/{}", route, file)
    }
}

/// Built-in document skeleton
pub fn default_layout(fragment: &str, route: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{{{{ title|default('Page Title') }}}}</title>
    <link rel="stylesheet" href="{style}">
</head>
<body>
{fragment}
    <script src="{script}"></script>
</body>
</html>
"#,
        style = asset_path(route, STYLESHEET_FILE),
        script = asset_path(route, SCRIPT_FILE),
        fragment = fragment,
    )
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64().map_or(true, |f| f != 0.0),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a composed template against a context
pub fn render(template: &str, context: &Map<String, Value>) -> String {
    let branched = IF_BLOCK.replace_all(template, |caps: &Captures<'_>| {
        if is_truthy(context.get(&caps[1])) {
            caps[2].to_string()
        } else {
            caps.get(3).map_or_else(String::new, |m| m.as_str().to_string())
        }
    });

    EXPRESSION
        .replace_all(&branched, |caps: &Captures<'_>| {
            let fallback = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
            match (context.get(&caps[1]), fallback) {
                (None | Some(Value::Null), Some(fallback)) => escape_html(fallback),
                (None, None) => String::new(),
                (Some(value), _) => escape_html(&display_value(value)),
            }
        })
        .into_owned()
}

/// Escape text for HTML bodies and attribute values
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn context(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn write(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    fn page<'a>(path: &'a str, route_dir: Option<&'a str>) -> TemplateRequest<'a> {
        TemplateRequest {
            name: PAGE_TEMPLATE,
            current_path: path,
            route_dir,
        }
    }

    #[test]
    fn test_document_heuristic() {
        assert!(has_document_structure("<HTML><body></body></HTML>"));
        assert!(!has_document_structure("<div>fragment</div>"));
        assert!(!has_document_structure("<html> but never closed"));
    }

    #[test]
    fn test_compose_with_layout() {
        let layout = "<html><main>{{ content }}</main><aside>{{ content }}</aside></html>";
        let composed = compose("<p>{{ x }}</p>", Some(layout), "a");
        assert_eq!(
            composed,
            "<html><main><p>{{ x }}</p></main><aside><p>{{ x }}</p></aside></html>"
        );
    }

    #[test]
    fn test_layout_without_placeholder_uses_skeleton() {
        let composed = compose("<p>hi</p>", Some("<html>no slot</html>"), "blog");
        assert!(composed.contains("<p>hi</p>"));
        assert!(composed.contains(r#"href="/blog/styles.css""#));
        assert!(composed.contains(r#"src="/blog/script.js""#));
        assert!(!composed.contains("no slot"));
    }

    #[test]
    fn test_skeleton_at_root() {
        let composed = default_layout("<p>hi</p>", "");
        assert!(composed.contains(r#"href="/styles.css""#));
        assert!(composed.contains(r#"src="/script.js""#));
        assert!(composed.contains("{{ title|default('Page Title') }}"));
    }

    #[test]
    fn test_resolve_page_with_layout() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "about/page.html", "<p>About</p>");
        write(dir.path(), "_layout.html", "<html><body>{{ content }}</body></html>");

        let resolver = TemplateResolver::new(dir.path());
        let text = resolver.resolve(&page("/about/", None)).unwrap();
        assert_eq!(text, "<html><body><p>About</p></body></html>");
    }

    #[test]
    fn test_full_document_is_unchanged() {
        let dir = TempDir::new().unwrap();
        let document = "<html><body>own</body></html>";
        write(dir.path(), "about/page.html", document);
        write(dir.path(), "_layout.html", "<div>{{ content }}</div>");

        let resolver = TemplateResolver::new(dir.path());
        assert_eq!(resolver.resolve(&page("/about", None)).unwrap(), document);
    }

    #[test]
    fn test_dynamic_route_uses_route_dir() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "user/[id]/page.html", "<p>User</p>");

        let resolver = TemplateResolver::new(dir.path());
        let text = resolver.resolve(&page("/user/42", Some("user/[id]"))).unwrap();
        assert!(text.contains("<p>User</p>"));
        assert!(text.contains("/user/42/styles.css"));
    }

    #[test]
    fn test_missing_fragment_falls_back_to_root_page() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "page.html", "root page");

        let resolver = TemplateResolver::new(dir.path());
        assert_eq!(resolver.resolve(&page("/nothing/here", None)).unwrap(), "root page");
    }

    #[test]
    fn test_missing_everything_is_not_found() {
        let dir = TempDir::new().unwrap();
        let resolver = TemplateResolver::new(dir.path());
        let result = resolver.resolve(&page("/nothing", None));
        assert!(matches!(result, Err(Error::TemplateNotFound(_))));
    }

    #[test]
    fn test_other_names_use_default_resolution() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "mail.html", "plain");
        write(dir.path(), "x/mail.html", "nested");

        let resolver = TemplateResolver::new(dir.path());
        let request = TemplateRequest {
            name: "mail.html",
            current_path: "/x",
            route_dir: None,
        };
        assert_eq!(resolver.resolve(&request).unwrap(), "plain");
    }

    #[test]
    fn test_traversal_is_rejected() {
        let dir = TempDir::new().unwrap();
        let resolver = TemplateResolver::new(dir.path());
        assert!(resolver.compose_page(&page("/../etc", None)).is_none());
        assert!(resolver.default_template("../secret.html").is_err());
    }

    #[test]
    fn test_render_expressions() {
        let ctx = context(json!({"name": "<b>Ann</b>", "count": 3, "missing_value": null}));
        assert_eq!(render("Hi {{ name }}!", &ctx), "Hi &lt;b&gt;Ann&lt;/b&gt;!");
        assert_eq!(render("{{count}}", &ctx), "3");
        assert_eq!(render("[{{ nope }}]", &ctx), "[]");
        assert_eq!(render("{{ nope|default('x') }}", &ctx), "x");
        assert_eq!(render("{{ missing_value | default(\"y\") }}", &ctx), "y");
        assert_eq!(render("{{ name|default('x') }}", &ctx), "&lt;b&gt;Ann&lt;/b&gt;");
    }

    #[test]
    fn test_render_conditionals() {
        let ctx = context(json!({"yes": true, "no": false, "empty": "", "user": "ann"}));
        assert_eq!(render("{% if yes %}A{% else %}B{% endif %}", &ctx), "A");
        assert_eq!(render("{% if no %}A{% else %}B{% endif %}", &ctx), "B");
        assert_eq!(render("{% if empty %}A{% endif %}", &ctx), "");
        assert_eq!(render("{% if absent %}A{% endif %}", &ctx), "");
        assert_eq!(
            render("{% if user %}\n<p>{{ user }}</p>\n{% endif %}", &ctx),
            "\n<p>ann</p>\n"
        );
    }

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&'"#), "&lt;a href=&#34;x&#34;&gt;&amp;&#39;");
    }
}
