//! Serve command implementation

use anyhow::{Context, Result};
use pathweave_core::{LogLevel, Settings, SESSION_ID_ENV};
use pathweave_logs::{SessionLog, SessionLogConfig};
use pathweave_web::ControllerRegistry;
use std::sync::Arc;
use tracing::debug;

use crate::cli::ServeArgs;
use crate::output::print_info;

/// Settings and session log of a server about to start
pub struct ServeSession {
    pub settings: Settings,
    pub log: Arc<SessionLog>,
}

/// Apply overrides, open the session log and export its id.
///
/// Must run before the async runtime starts: the environment is only
/// modified while the process is single-threaded.
pub fn prepare(mut settings: Settings, args: ServeArgs) -> Result<ServeSession> {
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(dir) = args.routes_dir {
        settings.routes_dir = dir;
    }
    if let Some(dir) = args.logs_dir {
        settings.logs_dir = dir;
    }

    let log = Arc::new(
        SessionLog::new(SessionLogConfig {
            session_id: settings.session_id.clone(),
            min_level: if settings.debug {
                LogLevel::Debug
            } else {
                LogLevel::Info
            },
            ..SessionLogConfig::new(settings.logs_dir.clone())
        })
        .context("Failed to open session log")?,
    );

    // Processes started from here keep writing to the same session file
    std::env::set_var(SESSION_ID_ENV, log.session_id());
    debug!("Exported {}={}", SESSION_ID_ENV, log.session_id());
    settings.session_id = Some(log.session_id().to_string());

    Ok(ServeSession { settings, log })
}

pub async fn execute(session: ServeSession) -> Result<()> {
    let ServeSession { settings, log } = session;

    if log.is_new_session() {
        log.info(format!("Starting server with session ID: {}", log.session_id()));
    }
    log.debug(format!(
        "Configuration: debug={}, port={}",
        settings.debug, settings.port
    ));
    log.debug(format!("Routes directory: {}", settings.routes_dir.display()));
    print_info(&format!("Session log: {}", log.path().display()));

    let registry = ControllerRegistry::default();
    if let Err(e) = pathweave_web::start_server(&settings, log.clone(), &registry).await {
        log.error(format!("Error starting server: {}", e));
        return Err(e).context("Server failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(logs: &TempDir) -> ServeArgs {
        ServeArgs {
            port: Some(5050),
            routes_dir: None,
            logs_dir: Some(logs.path().to_path_buf()),
        }
    }

    #[test]
    fn test_prepare_exports_session_id() {
        let logs = TempDir::new().unwrap();

        let fresh = prepare(Settings::default(), args(&logs)).unwrap();
        assert!(fresh.log.is_new_session());
        assert_eq!(fresh.settings.port, 5050);
        assert_eq!(fresh.settings.logs_dir, logs.path());
        assert_eq!(std::env::var(SESSION_ID_ENV).unwrap(), fresh.log.session_id());
        assert_eq!(fresh.settings.session_id.as_deref(), Some(fresh.log.session_id()));

        let settings = Settings {
            session_id: Some("feed0001".to_string()),
            ..Settings::default()
        };
        let reused = prepare(settings, args(&logs)).unwrap();
        assert!(!reused.log.is_new_session());
        assert_eq!(reused.log.session_id(), "feed0001");
        assert_eq!(std::env::var(SESSION_ID_ENV).unwrap(), "feed0001");
    }
}
