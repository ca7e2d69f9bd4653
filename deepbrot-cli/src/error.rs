use thiserror::Error;

use deepbrot_core::CoreError;
use deepbrot_render::RenderError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("job {0} did not complete")]
    Incomplete(u64),

    #[error("no level was completed, nothing to export")]
    NothingToExport,
}
