//! Extract command: one-shot dispatch of a single file.

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use unspool_core::DispatchOutcome;
use unspool_core::Dispatcher;
use unspool_core::ExtractionError;

use crate::cli::ExtractArgs;
use crate::cli::UnpackArgs;
use crate::error::add_input_context;
use crate::output::OutputFormatter;

pub fn execute(
    args: &ExtractArgs,
    unpack: &UnpackArgs,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let meta = std::fs::metadata(&args.file)
        .with_context(|| format!("cannot read input {}", args.file.display()))?;
    if !meta.is_file() {
        bail!("{} is not a regular file", args.file.display());
    }

    let dispatcher = Dispatcher::new(unpack.to_config());
    formatter.format_processing(&args.file);
    let result = dispatcher.dispatch(&args.file, &args.output);
    formatter.format_dispatch_result(&result)?;

    match result.outcome {
        DispatchOutcome::Extracted(_) | DispatchOutcome::Moved(_) => Ok(()),
        DispatchOutcome::Rejected => add_input_context(
            Err(ExtractionError::UnsupportedFormat {
                path: result.source,
            }),
            &args.file,
        ),
        DispatchOutcome::Failed(err) => add_input_context(Err(err), &args.file),
    }
}
