//! Running the ffmpeg executable.

use std::ffi::OsStr;
use std::path::PathBuf;

use crate::error::AppError;

/// Run `ffmpeg` with `args` and wait for it.
///
/// Output is captured; stderr is logged when ffmpeg fails.
///
/// # Errors
///
/// - `Spawn`: ffmpeg could not be started
/// - `Ffmpeg`: ffmpeg exited with a failure status
pub async fn run<I, S>(ffmpeg: &str, args: I) -> Result<(), AppError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = tokio::process::Command::new(ffmpeg)
        .args(args)
        .output()
        .await
        .map_err(|source| AppError::Spawn {
            program: PathBuf::from(ffmpeg),
            source,
        })?;

    if !output.status.success() {
        tracing::error!(
            stderr = %String::from_utf8_lossy(&output.stderr),
            "ffmpeg failed"
        );
        return Err(AppError::Ffmpeg(crate::launcher::exit_code_of(output.status)));
    }

    Ok(())
}
