//! # Vector Markup Optimizer
//!
//! Backend SVG basato su tool esterni, in ordine di preferenza:
//! 1. `svgo` (multipass, plugin di default)
//! 2. `scour` come fallback
//!
//! Se nessuno dei due è installato l'operazione fallisce con `ConfigurationError`.

use super::{describe_output, ensure_dir, run_tool, settle, CodecBackend, CodecOptions, CompressOutput};
use crate::error::{CompressError, CompressFailure};
use crate::tool_resolver::ToolPathResolver;
use crate::utils::{tool_args, ToolArg};
use async_trait::async_trait;
use std::path::Path;

const SVG_TOOLS: &[&str] = &["svgo", "scour"];

pub struct SvgOptimizer {
    tools: ToolPathResolver,
}

impl SvgOptimizer {
    pub fn new(tools: ToolPathResolver) -> Self {
        Self { tools }
    }

    async fn run(&self, source: &Path, output_dir: &Path, options: &CodecOptions) -> Result<CompressOutput, CompressError> {
        let (tool, program) = self.tools.first_available(SVG_TOOLS).ok_or_else(|| {
            CompressError::configuration(format!(
                "no SVG optimizer found (install with: {})",
                ToolPathResolver::install_instructions("svgo")
            ))
        })?;

        ensure_dir(output_dir).await?;
        let output_path = options.output_path(source, output_dir)?;

        let args = match tool {
            "svgo" => tool_args([
                ToolArg::Flag("--multipass"),
                ToolArg::Path(source),
                ToolArg::Flag("-o"),
                ToolArg::Path(&output_path),
            ]),
            _ => tool_args([
                ToolArg::Flag("-i"),
                ToolArg::Path(source),
                ToolArg::Flag("-o"),
                ToolArg::Path(&output_path),
                ToolArg::Flag("--enable-viewboxing"),
                ToolArg::Flag("--enable-id-stripping"),
                ToolArg::Flag("--shorten-ids"),
                ToolArg::Flag("--remove-metadata"),
            ]),
        };
        run_tool(tool, &program, &args).await?;

        describe_output(source, output_path).await
    }
}

#[async_trait]
impl CodecBackend for SvgOptimizer {
    fn name(&self) -> &'static str {
        "vector"
    }

    async fn compress(
        &self,
        source: &Path,
        output_dir: &Path,
        options: &CodecOptions,
    ) -> Result<CompressOutput, CompressFailure> {
        settle(self.name(), source, self.run(source, output_dir, options).await)
    }
}
