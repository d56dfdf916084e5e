//! `launch`: run the Python search module in its managed environment.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::cli::LaunchArgs;
use crate::error::AppError;
use crate::launcher::{DEFAULT_ENV_FILE, EnvResolver, LaunchOptions, LaunchPlan};

pub async fn run(env_file: Option<&Path>, args: LaunchArgs) -> Result<ExitCode, AppError> {
    let options = LaunchOptions {
        env_file: env_file
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ENV_FILE)),
        env_name: args.env_name,
        module: args.module,
        query: args.query,
        workdir: args.workdir,
    };

    let resolver = EnvResolver::from_process_env(&args.envs_dirs);
    let plan = LaunchPlan::build(&options, &resolver)?;

    if args.dry_run {
        println!("{}", plan.describe());
        return Ok(ExitCode::SUCCESS);
    }

    let code = plan.run().await?;
    Ok(ExitCode::from(exit_byte(code)))
}

/// Exit codes outside `0..=255` wrap the way the OS truncates them.
fn exit_byte(code: i32) -> u8 {
    (code & 0xff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_wrap_like_the_os() {
        assert_eq!(exit_byte(0), 0);
        assert_eq!(exit_byte(3), 3);
        assert_eq!(exit_byte(256 + 7), 7);
        assert_eq!(exit_byte(-1), 255);
    }
}
