//! Managed environment resolution and activation.
//!
//! A managed environment is a conda-style prefix: a directory named after the
//! environment whose `bin/` holds the interpreter. Activation is reproduced by
//! the variables `conda activate` exports, applied to the child process only.

use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Name that resolves to the conda installation root instead of `envs/<name>`.
pub const BASE_ENV: &str = "base";

/// A resolved environment ready to be activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedEnv {
    pub name: String,
    pub prefix: PathBuf,
    pub interpreter: PathBuf,
}

impl ManagedEnv {
    /// Directory prepended to `PATH` on activation.
    pub fn bin_dir(&self) -> PathBuf {
        self.interpreter
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.prefix.clone())
    }

    /// Variables set by activation.
    ///
    /// # Variables
    ///
    /// - `CONDA_PREFIX`: the environment prefix
    /// - `CONDA_DEFAULT_ENV`: the environment name
    /// - `PATH`: `bin_dir()` followed by `current_path` entries
    pub fn activation_vars(
        &self,
        current_path: Option<&OsStr>,
    ) -> Result<Vec<(OsString, OsString)>, AppError> {
        let mut entries = vec![self.bin_dir()];
        if let Some(current) = current_path {
            entries.extend(env::split_paths(current).filter(|p| *p != self.bin_dir()));
        }
        let path = env::join_paths(entries)
            .map_err(|e| AppError::InvalidRequest(format!("cannot build PATH: {}", e)))?;

        Ok(vec![
            ("CONDA_PREFIX".into(), self.prefix.clone().into_os_string()),
            ("CONDA_DEFAULT_ENV".into(), self.name.clone().into()),
            ("PATH".into(), path),
        ])
    }
}

/// Finds managed environments by name across a list of `envs` directories.
#[derive(Debug, Clone, Default)]
pub struct EnvResolver {
    search_dirs: Vec<PathBuf>,
    conda_root: Option<PathBuf>,
}

impl EnvResolver {
    pub fn new(search_dirs: Vec<PathBuf>, conda_root: Option<PathBuf>) -> Self {
        let mut resolver = Self {
            search_dirs: Vec::new(),
            conda_root,
        };
        for dir in search_dirs {
            resolver.push_dir(dir);
        }
        resolver
    }

    /// Build the search list from the process environment.
    ///
    /// # Search Order
    ///
    /// 1. `extra_dirs` (from the command line)
    /// 2. Entries of `CONDA_ENVS_PATH`
    /// 3. `<conda root>/envs`, where the root is `CONDA_ROOT` or two levels above `CONDA_EXE`
    /// 4. `~/.conda/envs`, `~/miniconda3/envs`, `~/anaconda3/envs`
    pub fn from_process_env(extra_dirs: &[PathBuf]) -> Self {
        let conda_root = env::var_os("CONDA_ROOT")
            .map(PathBuf::from)
            .or_else(|| {
                let exe = PathBuf::from(env::var_os("CONDA_EXE")?);
                exe.parent()?.parent().map(Path::to_path_buf)
            });

        let mut search_dirs: Vec<PathBuf> = extra_dirs.to_vec();
        if let Some(paths) = env::var_os("CONDA_ENVS_PATH") {
            search_dirs.extend(env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        if let Some(root) = &conda_root {
            search_dirs.push(root.join("envs"));
        }
        if let Some(home) = dirs::home_dir() {
            for install in [".conda", "miniconda3", "anaconda3"] {
                search_dirs.push(home.join(install).join("envs"));
            }
        }

        Self::new(search_dirs, conda_root)
    }

    fn push_dir(&mut self, dir: PathBuf) {
        if !self.search_dirs.contains(&dir) {
            self.search_dirs.push(dir);
        }
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Resolve `name` to an environment with a usable interpreter.
    ///
    /// An absolute path is taken as the prefix itself, like `conda activate /path`.
    /// The first search directory holding `<name>/bin/python3` (or `bin/python`) wins.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for an empty name or a relative name with path separators
    /// - `EnvironmentNotFound` when no candidate holds an interpreter
    pub fn resolve(&self, name: &str) -> Result<ManagedEnv, AppError> {
        if name.is_empty() {
            return Err(AppError::InvalidRequest(
                "environment name must not be empty".to_string(),
            ));
        }

        let as_path = Path::new(name);
        let candidates: Vec<PathBuf> = if as_path.is_absolute() {
            vec![as_path.to_path_buf()]
        } else if as_path.components().count() > 1 {
            return Err(AppError::InvalidRequest(format!(
                "environment name `{}` must be a plain name or an absolute path",
                name
            )));
        } else if name == BASE_ENV {
            self.conda_root.iter().cloned().collect()
        } else {
            self.search_dirs.iter().map(|dir| dir.join(name)).collect()
        };

        for prefix in &candidates {
            if let Some(interpreter) = interpreter_in(prefix) {
                tracing::debug!(env = name, prefix = %prefix.display(), "Managed environment resolved");
                return Ok(ManagedEnv {
                    name: name.to_string(),
                    prefix: prefix.clone(),
                    interpreter,
                });
            }
        }

        let searched = candidates
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        Err(AppError::EnvironmentNotFound {
            name: name.to_string(),
            searched: if searched.is_empty() {
                "no candidate directories".to_string()
            } else {
                searched
            },
        })
    }
}

/// Interpreter inside an environment prefix, if any.
fn interpreter_in(prefix: &Path) -> Option<PathBuf> {
    [
        prefix.join("bin").join("python3"),
        prefix.join("bin").join("python"),
        prefix.join("python.exe"),
    ]
    .into_iter()
    .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn make_env(envs_dir: &Path, name: &str, interpreter: &str) -> PathBuf {
        let bin = envs_dir.join(name).join("bin");
        fs::create_dir_all(&bin).unwrap();
        fs::write(bin.join(interpreter), "").unwrap();
        envs_dir.join(name)
    }

    #[test]
    fn first_search_dir_with_interpreter_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(first.join("vlog")).unwrap(); // no interpreter here
        let prefix = make_env(&second, "vlog", "python3");
        make_env(&tmp.path().join("third"), "vlog", "python3");

        let resolver = EnvResolver::new(vec![first, second, tmp.path().join("third")], None);
        let env = resolver.resolve("vlog").unwrap();

        assert_eq!(env.prefix, prefix);
        assert_eq!(env.interpreter, prefix.join("bin").join("python3"));
        assert_eq!(env.bin_dir(), prefix.join("bin"));
    }

    #[test]
    fn falls_back_to_plain_python() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = make_env(tmp.path(), "vlog", "python");

        let env = EnvResolver::new(vec![tmp.path().to_path_buf()], None)
            .resolve("vlog")
            .unwrap();
        assert_eq!(env.interpreter, prefix.join("bin").join("python"));
    }

    #[test]
    fn base_resolves_to_conda_root() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("miniconda3");
        fs::create_dir_all(root.join("bin")).unwrap();
        fs::write(root.join("bin").join("python3"), "").unwrap();

        let env = EnvResolver::new(Vec::new(), Some(root.clone()))
            .resolve(BASE_ENV)
            .unwrap();
        assert_eq!(env.prefix, root);
    }

    #[test]
    fn absolute_path_is_used_as_prefix() {
        let tmp = tempfile::tempdir().unwrap();
        let prefix = make_env(tmp.path(), "anywhere", "python3");

        let env = EnvResolver::default()
            .resolve(prefix.to_str().unwrap())
            .unwrap();
        assert_eq!(env.prefix, prefix);
    }

    #[test]
    fn unknown_environment_lists_searched_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let resolver = EnvResolver::new(vec![tmp.path().to_path_buf()], None);

        match resolver.resolve("missing") {
            Err(AppError::EnvironmentNotFound { name, searched }) => {
                assert_eq!(name, "missing");
                assert!(searched.contains("missing"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn relative_paths_are_rejected() {
        let err = EnvResolver::default().resolve("envs/vlog").unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
        let err = EnvResolver::default().resolve("").unwrap_err();
        assert!(matches!(err, AppError::InvalidRequest(_)));
    }

    #[test]
    fn search_dirs_are_deduplicated() {
        let resolver = EnvResolver::new(
            vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/a")],
            None,
        );
        assert_eq!(resolver.search_dirs(), &[PathBuf::from("/a"), PathBuf::from("/b")]);
    }

    #[test]
    fn activation_prepends_bin_dir() {
        let env = ManagedEnv {
            name: "vlog".to_string(),
            prefix: PathBuf::from("/opt/envs/vlog"),
            interpreter: PathBuf::from("/opt/envs/vlog/bin/python3"),
        };
        let current = env::join_paths(["/usr/bin", "/opt/envs/vlog/bin", "/bin"]).unwrap();

        let vars = env.activation_vars(Some(&current)).unwrap();
        let path = &vars.iter().find(|(k, _)| k == "PATH").unwrap().1;
        let entries: Vec<PathBuf> = env::split_paths(path).collect();

        assert_eq!(
            entries,
            vec![
                PathBuf::from("/opt/envs/vlog/bin"),
                PathBuf::from("/usr/bin"),
                PathBuf::from("/bin"),
            ]
        );
        assert!(vars.contains(&("CONDA_DEFAULT_ENV".into(), "vlog".into())));
        assert!(vars.contains(&("CONDA_PREFIX".into(), "/opt/envs/vlog".into())));
    }
}
