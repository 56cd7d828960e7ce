//! `BuildSystemManager`: the interface the core consumes for build settings (spec §1,
//! explicit non-goal: "Build-system plugins... The core consumes a `BuildSystemManager`
//! interface only"). No implementation lives in this crate.

use async_trait::async_trait;
use tower_lsp::lsp_types::Url;

use crate::workspace::FileHandling;

/// Compiler argument vector and working directory needed to compile a file (spec
/// GLOSSARY "Build settings").
#[derive(Debug, Clone)]
pub struct BuildSettings {
    pub compiler_arguments: Vec<String>,
    pub working_directory: std::path::PathBuf,
    /// Best-guess settings used before the real ones are available; diagnostics are
    /// withheld while a file is in fallback mode (spec GLOSSARY "Fallback settings").
    pub is_fallback: bool,
}

/// The build-system abstraction a workspace delegates to for file handling and build
/// settings. Implemented per build system (SwiftPM-like, compile-commands, build-server
/// protocol) outside this crate.
#[async_trait]
pub trait BuildSystemManager: Send + Sync {
    /// Whether this build system can serve `uri` within `workspace_root` (spec §4.3
    /// `WorkspaceRouter` file-handling capability, and §3 `BuildRootProbe`).
    fn file_handling(&self, workspace_root: Option<&Url>, uri: &Url) -> FileHandling;

    /// Returns true if `dir` looks like a root this build system can adopt as an implicit
    /// workspace (spec §4.3 step 3). Kept synchronous, like `file_handling`: the router
    /// calls this while holding its workspace lock, so the probe must be cheap (a manifest
    /// file existence check, not a build-system round trip).
    fn can_adopt(&self, dir: &Url) -> bool;

    /// Resolves build settings for `uri`'s main file (spec GLOSSARY "Main file").
    async fn build_settings(&self, uri: &Url) -> Option<BuildSettings>;

    /// Notifies the build system that generated interface or manifest files changed,
    /// possibly invalidating cached settings for dependent files.
    async fn dependencies_changed(&self, uris: &[Url]);
}
