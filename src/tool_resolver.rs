//! # Tool Path Resolver
//!
//! This module finds the external optimizers used by the local backends:
//! - Tools bundled next to the binary (`tools/` or `resources/tools/`)
//! - A directory pointed to by `ASSET_COMPRESSOR_TOOLS_DIR`
//! - System-installed tools on `PATH`

use std::env;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Tools the local backends know how to drive
pub const KNOWN_TOOLS: &[(&str, &str)] = &[
    ("svgo", "SVG"),
    ("scour", "SVG"),
    ("gifsicle", "GIF"),
];

/// Tool path resolver for different deployment environments
#[derive(Debug, Clone)]
pub struct ToolPathResolver {
    /// Directory searched before `PATH`
    tools_dir: Option<PathBuf>,
    /// Whether `PATH` is searched at all
    search_system_path: bool,
}

impl ToolPathResolver {
    /// Resolver looking at the bundled tools directory, then `PATH`
    pub fn new() -> Self {
        Self {
            tools_dir: Self::detect_bundled_tools_dir(),
            search_system_path: true,
        }
    }

    /// Resolver restricted to `dir` (no `PATH` lookup)
    pub fn isolated(dir: impl Into<PathBuf>) -> Self {
        Self {
            tools_dir: Some(dir.into()),
            search_system_path: false,
        }
    }

    /// Detect the bundled tools directory
    fn detect_bundled_tools_dir() -> Option<PathBuf> {
        if let Ok(dir) = env::var("ASSET_COMPRESSOR_TOOLS_DIR") {
            let path = PathBuf::from(dir);
            debug!("Checking ASSET_COMPRESSOR_TOOLS_DIR: {:?}", path);
            if path.is_dir() {
                return Some(path);
            }
        }

        let exe_path = env::current_exe().ok()?;
        let app_dir = exe_path.parent()?;
        [app_dir.join("tools"), app_dir.join("resources").join("tools")]
            .into_iter()
            .find(|path| {
                debug!("Checking bundled tools path: {:?}", path);
                path.is_dir()
            })
    }

    /// Resolve the path to a specific tool
    pub fn resolve_tool(&self, tool_name: &str) -> Option<PathBuf> {
        let file_name = Self::executable_name(tool_name);

        if let Some(ref tools_dir) = self.tools_dir {
            let bundled = tools_dir.join(&file_name);
            if bundled.is_file() {
                debug!("Using bundled tool: {} -> {:?}", tool_name, bundled);
                return Some(bundled);
            }
        }

        if self.search_system_path {
            if let Some(system_path) = Self::find_in_system_path(&file_name) {
                debug!("Using system tool: {} -> {:?}", tool_name, system_path);
                return Some(system_path);
            }
        }

        debug!("Tool not found: {}", tool_name);
        None
    }

    fn executable_name(tool_name: &str) -> String {
        if cfg!(windows) {
            format!("{}.exe", tool_name)
        } else {
            tool_name.to_string()
        }
    }

    /// Find tool in system PATH
    fn find_in_system_path(file_name: &str) -> Option<PathBuf> {
        let path_var = env::var_os("PATH")?;
        env::split_paths(&path_var)
            .map(|dir| dir.join(file_name))
            .find(|path| path.is_file())
    }

    /// Check if a specific tool is available
    pub fn is_tool_available(&self, tool_name: &str) -> bool {
        self.resolve_tool(tool_name).is_some()
    }

    /// First available tool among `candidates`, in order of preference
    pub fn first_available<'a>(&self, candidates: &[&'a str]) -> Option<(&'a str, PathBuf)> {
        candidates
            .iter()
            .find_map(|name| self.resolve_tool(name).map(|path| (*name, path)))
    }

    /// Get a report of tool availability
    pub fn get_tools_report(&self) -> String {
        let mut report = String::from("Tool Path Resolver Report\n");
        report.push_str(&format!("Bundled tools dir: {:?}\n", self.tools_dir));
        for (tool, category) in KNOWN_TOOLS {
            match self.resolve_tool(tool) {
                Some(path) => report.push_str(&format!("  [{}] {} -> {}\n", category, tool, path.display())),
                None => report.push_str(&format!(
                    "  [{}] {} (missing, install with: {})\n",
                    category,
                    tool,
                    Self::install_instructions(tool)
                )),
            }
        }
        report
    }

    /// Get installation instructions for a tool
    pub fn install_instructions(tool_name: &str) -> String {
        match tool_name {
            "svgo" => "npm install -g svgo".to_string(),
            "scour" => "pip install scour".to_string(),
            "gifsicle" => "sudo apt-get install gifsicle  # or: brew install gifsicle".to_string(),
            _ => format!("sudo apt-get install {}", tool_name),
        }
    }

    pub fn tools_dir(&self) -> Option<&Path> {
        self.tools_dir.as_deref()
    }
}

impl Default for ToolPathResolver {
    fn default() -> Self {
        Self::new()
    }
}
