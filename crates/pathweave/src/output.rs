//! Terminal output formatting

use colored::Colorize;
use pathweave_core::RouteRegistration;
use std::sync::atomic::{AtomicBool, Ordering};
use tabled::{settings::Style, Table, Tabled};

/// Global flag for JSON output mode
static JSON_MODE: AtomicBool = AtomicBool::new(false);

/// Enable or disable JSON output mode
pub fn set_json_mode(enabled: bool) {
    JSON_MODE.store(enabled, Ordering::SeqCst);
}

/// Check if JSON output mode is enabled
pub fn is_json_mode() -> bool {
    JSON_MODE.load(Ordering::SeqCst)
}

#[derive(Tabled)]
pub struct RouteRow {
    #[tabled(rename = "url")]
    pub url: String,
    #[tabled(rename = "endpoint")]
    pub endpoint: String,
    #[tabled(rename = "handler")]
    pub handler: String,
    #[tabled(rename = "methods")]
    pub methods: String,
    #[tabled(rename = "controller")]
    pub controller: String,
}

impl From<&RouteRegistration> for RouteRow {
    fn from(route: &RouteRegistration) -> Self {
        RouteRow {
            url: route.url_pattern.clone(),
            endpoint: route.endpoint_id.clone(),
            handler: route.controller.handler.clone(),
            methods: route.controller.methods.join(", "),
            controller: route.handler_module_path.clone(),
        }
    }
}

pub fn print_routes(routes: &[RouteRegistration]) {
    if is_json_mode() {
        match serde_json::to_string_pretty(routes) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Error serializing to JSON: {}", e),
        }
        return;
    }

    if routes.is_empty() {
        println!("No routes found");
        return;
    }

    let rows: Vec<RouteRow> = routes.iter().map(RouteRow::from).collect();
    let table = Table::new(rows).with(Style::rounded()).to_string();

    println!("{}", table);
}

pub fn print_error(message: &str) {
    if is_json_mode() {
        eprintln!("{}", serde_json::json!({ "success": false, "error": message }));
        return;
    }
    eprintln!("{} {}", "✗".red(), message);
}

pub fn print_info(message: &str) {
    if is_json_mode() {
        return;
    }
    println!("{} {}", "ℹ".blue(), message);
}
