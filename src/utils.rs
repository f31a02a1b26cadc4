//! # Utility Functions Module
//!
//! Helpers for building argument vectors passed to external optimizers.

use std::ffi::OsString;
use std::path::Path;

/// Argument vector mixing flags and paths without lossy path conversion
pub fn tool_args<'a, I>(items: I) -> Vec<OsString>
where
    I: IntoIterator<Item = ToolArg<'a>>,
{
    items
        .into_iter()
        .map(|item| match item {
            ToolArg::Flag(flag) => OsString::from(flag),
            ToolArg::Path(path) => path.as_os_str().to_os_string(),
        })
        .collect()
}

/// One argument of an external tool invocation
#[derive(Debug, Clone, Copy)]
pub enum ToolArg<'a> {
    Flag(&'a str),
    Path(&'a Path),
}

/// Builds a `Vec<String>` from heterogeneous displayable items.
///
/// ```rust
/// use asset_compressor::args;
///
/// let colors = 10;
/// assert_eq!(args!["--colors", colors], vec!["--colors", "10"]);
/// ```
#[macro_export]
macro_rules! args {
    [$($item:expr),* $(,)?] => {
        vec![$($item.to_string()),*]
    };
}
