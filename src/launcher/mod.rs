//! Launcher for the Python search module.
//!
//! Reproduces the project's run script: load the environment file, activate
//! the managed environment, then run
//! `python3 -m functions.search_context --query "<query>"` and report the
//! child's exit status as our own.
//!
//! # Launch Flow
//!
//! 1. Read the environment file (fails before anything is spawned if missing)
//! 2. Resolve the managed environment
//! 3. Build a [`LaunchPlan`] (program, arguments, environment overrides)
//! 4. Spawn the child, wait for it, and return its exit code

pub mod env_file;
pub mod managed_env;

use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use crate::error::AppError;

pub use env_file::EnvFile;
pub use managed_env::{EnvResolver, ManagedEnv};

/// Query passed when none is given on the command line.
pub const DEFAULT_QUERY: &str = "a person walking on the street holding a pizza";

/// Python module run inside the managed environment.
pub const DEFAULT_MODULE: &str = "functions.search_context";

/// Managed environment activated when none is named.
pub const DEFAULT_ENV_NAME: &str = "vlog-search";

/// Environment file read when none is named.
pub const DEFAULT_ENV_FILE: &str = ".env";

/// Everything needed to build a launch.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub env_file: PathBuf,
    pub env_name: String,
    pub module: String,
    pub query: String,
    /// Working directory of the child; relative `env_file` paths resolve against it.
    pub workdir: Option<PathBuf>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(DEFAULT_ENV_FILE),
            env_name: DEFAULT_ENV_NAME.to_string(),
            module: DEFAULT_MODULE.to_string(),
            query: DEFAULT_QUERY.to_string(),
            workdir: None,
        }
    }
}

/// Placeholder printed instead of environment file values.
pub const MASKED_VALUE: &str = "***";

/// A fully resolved child invocation.
///
/// Only overrides of the inherited environment are held: the environment
/// file's pairs, then the activation variables, applied in that order.
#[derive(Debug, Clone)]
pub struct LaunchPlan {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Pairs from the environment file; may hold secrets.
    pub env_file_vars: Vec<(OsString, OsString)>,
    /// `CONDA_PREFIX`, `CONDA_DEFAULT_ENV` and the extended `PATH`.
    pub activation_vars: Vec<(OsString, OsString)>,
    pub current_dir: Option<PathBuf>,
}

impl LaunchPlan {
    /// Resolve `options` into a plan without spawning anything.
    ///
    /// # Errors
    ///
    /// - `EnvFileMissing` / `EnvFile` if the environment file cannot be read
    /// - `EnvironmentNotFound` if the managed environment does not resolve
    /// - `InvalidRequest` if the module name is empty
    pub fn build(options: &LaunchOptions, resolver: &EnvResolver) -> Result<Self, AppError> {
        if options.module.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "module name must not be empty".to_string(),
            ));
        }

        let env_path = resolve_against(options.workdir.as_deref(), &options.env_file);
        let env_file = EnvFile::load(&env_path)?;

        let managed = resolver.resolve(&options.env_name)?;

        // PATH from the env file, when present, is what activation prepends to
        let inherited_path = env_file
            .get("PATH")
            .map(OsString::from)
            .or_else(|| env::var_os("PATH"));

        let env_file_vars = env_file
            .vars()
            .iter()
            .map(|(k, v)| (OsString::from(k), OsString::from(v)))
            .collect();
        let activation_vars = managed.activation_vars(inherited_path.as_deref())?;

        Ok(Self {
            program: managed.interpreter,
            args: vec![
                "-m".to_string(),
                options.module.clone(),
                "--query".to_string(),
                options.query.clone(),
            ],
            env_file_vars,
            activation_vars,
            current_dir: options.workdir.clone(),
        })
    }

    /// Every override in the order it is applied to the child.
    pub fn overrides(&self) -> impl Iterator<Item = &(OsString, OsString)> {
        self.env_file_vars.iter().chain(&self.activation_vars)
    }

    /// Human-readable rendering used by `--dry-run`.
    ///
    /// Environment file values are masked; activation variables are shown.
    pub fn describe(&self) -> String {
        let mut out = String::new();
        if let Some(dir) = &self.current_dir {
            out.push_str(&format!("cd {}\n", dir.display()));
        }
        for (key, _) in &self.env_file_vars {
            out.push_str(&format!("{}={}\n", key.to_string_lossy(), MASKED_VALUE));
        }
        for (key, value) in &self.activation_vars {
            out.push_str(&format!(
                "{}={}\n",
                key.to_string_lossy(),
                value.to_string_lossy()
            ));
        }
        out.push_str(&self.program.display().to_string());
        for arg in &self.args {
            if arg.contains(char::is_whitespace) || arg.is_empty() {
                out.push_str(&format!(" \"{}\"", arg.replace('"', "\\\"")));
            } else {
                out.push(' ');
                out.push_str(arg);
            }
        }
        out
    }

    /// Spawn the child, wait for it, and return its exit code.
    ///
    /// Standard streams are inherited, so the module's output goes straight
    /// to our stdout/stderr.
    pub async fn run(&self) -> Result<i32, AppError> {
        let mut command = tokio::process::Command::new(&self.program);
        command.args(&self.args);
        command.envs(self.overrides().map(|(k, v)| (k, v)));
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        tracing::info!(program = %self.program.display(), module = %self.args[1], "Launching search module");
        let status = command.status().await.map_err(|source| AppError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let code = exit_code_of(status);
        tracing::info!(code, "Search module exited");
        Ok(code)
    }
}

/// Exit code of a finished child; a signal `n` maps to `128 + n` as shells report it.
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }

    1
}

/// Resolve a possibly relative path against `base`.
pub fn resolve_against(base: Option<&Path>, path: &Path) -> PathBuf {
    match base {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    struct Fixture {
        _tmp: tempfile::TempDir,
        root: PathBuf,
        resolver: EnvResolver,
    }

    fn fixture(env_contents: Option<&str>) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().to_path_buf();
        let bin = root.join("envs").join(DEFAULT_ENV_NAME).join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join("python3"), "").unwrap();
        if let Some(contents) = env_contents {
            fs::write(root.join(".env"), contents).unwrap();
        }
        let resolver = EnvResolver::new(vec![root.join("envs")], None);
        Fixture {
            _tmp: tmp,
            root,
            resolver,
        }
    }

    fn options_in(root: &Path) -> LaunchOptions {
        LaunchOptions {
            workdir: Some(root.to_path_buf()),
            ..LaunchOptions::default()
        }
    }

    #[test]
    fn default_plan_passes_the_literal_query_as_one_argument() {
        let fx = fixture(Some("OPENAI_API_KEY=sk-test\n"));
        let plan = LaunchPlan::build(&options_in(&fx.root), &fx.resolver).unwrap();

        assert_eq!(
            plan.program,
            fx.root.join("envs").join(DEFAULT_ENV_NAME).join("bin").join("python3")
        );
        assert_eq!(
            plan.args,
            vec![
                "-m",
                "functions.search_context",
                "--query",
                "a person walking on the street holding a pizza",
            ]
        );
        assert_eq!(plan.current_dir.as_deref(), Some(fx.root.as_path()));
    }

    #[test]
    fn env_file_pairs_come_before_activation() {
        let fx = fixture(Some("OPENAI_API_KEY=sk-test\nPINECONE_API_KEY=pc-test\n"));
        let plan = LaunchPlan::build(&options_in(&fx.root), &fx.resolver).unwrap();

        let keys: Vec<String> = plan
            .overrides()
            .map(|(k, _)| k.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            keys,
            vec![
                "OPENAI_API_KEY",
                "PINECONE_API_KEY",
                "CONDA_PREFIX",
                "CONDA_DEFAULT_ENV",
                "PATH",
            ]
        );
    }

    #[test]
    fn path_from_env_file_is_extended_not_replaced() {
        let fx = fixture(Some("PATH=/custom/bin\n"));
        let plan = LaunchPlan::build(&options_in(&fx.root), &fx.resolver).unwrap();

        let path = plan.activation_vars.iter().find(|(k, _)| k == "PATH").unwrap();
        let entries: Vec<PathBuf> = env::split_paths(&path.1).collect();
        assert_eq!(
            entries,
            vec![
                fx.root.join("envs").join(DEFAULT_ENV_NAME).join("bin"),
                PathBuf::from("/custom/bin"),
            ]
        );
    }

    #[test]
    fn missing_env_file_fails_before_resolving_environment() {
        let fx = fixture(None);
        let options = LaunchOptions {
            env_name: "does-not-exist".to_string(),
            ..options_in(&fx.root)
        };

        let err = LaunchPlan::build(&options, &fx.resolver).unwrap_err();
        assert!(matches!(err, AppError::EnvFileMissing(_)));
    }

    #[test]
    fn unknown_environment_is_an_error() {
        let fx = fixture(Some(""));
        let options = LaunchOptions {
            env_name: "other".to_string(),
            ..options_in(&fx.root)
        };

        let err = LaunchPlan::build(&options, &fx.resolver).unwrap_err();
        assert!(matches!(err, AppError::EnvironmentNotFound { .. }));
    }

    #[test]
    fn describe_quotes_arguments_with_spaces() {
        let plan = LaunchPlan {
            program: PathBuf::from("/envs/vlog/bin/python3"),
            args: vec!["-m".into(), "functions.search_context".into(), "--query".into(), DEFAULT_QUERY.into()],
            env_file_vars: vec![("OPENAI_API_KEY".into(), "sk-secret".into())],
            activation_vars: vec![("CONDA_DEFAULT_ENV".into(), "vlog".into())],
            current_dir: None,
        };

        assert_eq!(
            plan.describe(),
            "OPENAI_API_KEY=***\nCONDA_DEFAULT_ENV=vlog\n/envs/vlog/bin/python3 -m functions.search_context --query \"a person walking on the street holding a pizza\""
        );
    }

    #[test]
    fn resolve_against_keeps_absolute_paths() {
        let base = Path::new("/work");
        assert_eq!(resolve_against(Some(base), Path::new(".env")), PathBuf::from("/work/.env"));
        assert_eq!(resolve_against(Some(base), Path::new("/etc/env")), PathBuf::from("/etc/env"));
        assert_eq!(resolve_against(None, Path::new(".env")), PathBuf::from(".env"));
    }
}
