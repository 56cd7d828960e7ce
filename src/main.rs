//! `lsp-core` - dispatch core for a multi-language, multi-backend Language Server
//! Protocol server.
//!
//! This binary wires the core up with no language backends attached, which is a valid
//! (if inert) server: every workspace resolves with `FileHandling::Unhandled` and every
//! `LanguageService` call returns method-not-implemented. Real deployments embed
//! `lsp_core::dispatcher::Dispatcher` directly and supply their own
//! `BuildSystemManager`/`LanguageService` implementations; see the crate docs.

use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use tower_lsp::lsp_types::Url;
use tower_lsp::{LspService, Server};
use tracing::info;

use lsp_core::build_system::{BuildSettings, BuildSystemManager};
use lsp_core::config::{Cli, ServerConfig};
use lsp_core::dispatcher::Dispatcher;
use lsp_core::telemetry::init_logging;
use lsp_core::workspace::FileHandling;

/// A build system that handles nothing and adopts nothing; used when the binary is run
/// without an embedder supplying a real one.
struct NullBuildSystem;

#[async_trait]
impl BuildSystemManager for NullBuildSystem {
    fn file_handling(&self, _workspace_root: Option<&Url>, _uri: &Url) -> FileHandling {
        FileHandling::Unhandled
    }

    fn can_adopt(&self, _dir: &Url) -> bool {
        false
    }

    async fn build_settings(&self, _uri: &Url) -> Option<BuildSettings> {
        None
    }

    async fn dependencies_changed(&self, _uris: &[Url]) {}
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = ServerConfig::from_cli(&cli);
    init_logging(&config.log_level);

    info!(
        config_path = ?config.config_path,
        backend_request_timeout_ms = config.backend_request_timeout.as_millis() as u64,
        "starting lsp-core"
    );

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let timeout: Duration = config.backend_request_timeout;
    let (service, socket) = LspService::build(move |client| {
        Dispatcher::new(client, std::sync::Arc::new(NullBuildSystem), Vec::new(), None, timeout)
    })
    .custom_method("workspace/tests", Dispatcher::workspace_tests)
    .custom_method("textDocument/tests", Dispatcher::document_tests)
    .finish();
    Server::new(stdin, stdout, socket).serve(service).await;
}
