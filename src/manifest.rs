//! Play manifests: named process groups loaded from `playbook.toml` (or a
//! `.json` file with the same shape).

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

use crate::model::{ProcessGroup, Project};

pub const DEFAULT_MANIFEST_FILE: &str = "playbook.toml";

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct PlaybookManifest {
    #[serde(default)]
    plays: IndexMap<String, ManifestPlay>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestPlay {
    #[serde(default)]
    cwd: Option<PathBuf>,
    #[serde(default)]
    projects: Vec<ManifestProject>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ManifestProject {
    name: String,
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    cwd: Option<PathBuf>,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    delay_ms: u64,
    #[serde(default)]
    direct_exec: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug)]
pub enum ManifestError {
    Read {
        path: PathBuf,
        error: std::io::Error,
    },
    ParseToml {
        path: PathBuf,
        error: toml::de::Error,
    },
    ParseJson {
        path: PathBuf,
        error: serde_json::Error,
    },
    Invalid {
        path: PathBuf,
        play: String,
        detail: String,
    },
    PlayNotFound {
        path: PathBuf,
        name: String,
        available: Vec<String>,
    },
}

impl std::fmt::Display for ManifestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManifestError::Read { path, error } => {
                write!(f, "failed to read {}: {error}", path.display())
            }
            ManifestError::ParseToml { path, error } => {
                write!(f, "failed to parse {}: {error}", path.display())
            }
            ManifestError::ParseJson { path, error } => {
                write!(f, "failed to parse {}: {error}", path.display())
            }
            ManifestError::Invalid { path, play, detail } => {
                write!(f, "invalid play `{play}` in {}: {detail}", path.display())
            }
            ManifestError::PlayNotFound {
                path,
                name,
                available,
            } => {
                if available.is_empty() {
                    write!(f, "play `{name}` not found in {} (no plays defined)", path.display())
                } else {
                    write!(
                        f,
                        "play `{name}` not found in {} (available: {})",
                        path.display(),
                        available.join(", ")
                    )
                }
            }
        }
    }
}

impl std::error::Error for ManifestError {}

/// Validated plays in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Playbook {
    pub path: PathBuf,
    pub plays: Vec<ProcessGroup>,
}

impl Playbook {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let source = std::fs::read_to_string(path).map_err(|error| ManifestError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(path, &source, &base_dir)
    }

    /// Parses `source` as JSON when `path` ends in `.json`, TOML otherwise.
    /// Relative directories resolve against `base_dir`.
    pub fn parse(path: &Path, source: &str, base_dir: &Path) -> Result<Self, ManifestError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let manifest: PlaybookManifest = if is_json {
            serde_json::from_str(source).map_err(|error| ManifestError::ParseJson {
                path: path.to_path_buf(),
                error,
            })?
        } else {
            toml::from_str(source).map_err(|error| ManifestError::ParseToml {
                path: path.to_path_buf(),
                error,
            })?
        };

        let plays = manifest
            .plays
            .into_iter()
            .map(|(name, play)| build_group(path, base_dir, name, play))
            .collect::<Result<Vec<ProcessGroup>, ManifestError>>()?;
        Ok(Self {
            path: path.to_path_buf(),
            plays,
        })
    }

    pub fn play(&self, name: &str) -> Result<&ProcessGroup, ManifestError> {
        self.plays
            .iter()
            .find(|play| play.name == name)
            .ok_or_else(|| ManifestError::PlayNotFound {
                path: self.path.clone(),
                name: name.to_owned(),
                available: self.plays.iter().map(|play| play.name.clone()).collect(),
            })
    }
}

fn build_group(
    path: &Path,
    base_dir: &Path,
    name: String,
    play: ManifestPlay,
) -> Result<ProcessGroup, ManifestError> {
    let invalid = |detail: String| ManifestError::Invalid {
        path: path.to_path_buf(),
        play: name.clone(),
        detail,
    };
    let play_dir = play.cwd.as_deref().map(|dir| resolve_dir(base_dir, dir));

    let mut projects = Vec::with_capacity(play.projects.len());
    for (index, project) in play.projects.into_iter().enumerate() {
        if project.name.trim().is_empty() {
            return Err(invalid(format!("project #{} has an empty name", index + 1)));
        }
        if project.command.trim().is_empty() {
            return Err(invalid(format!(
                "project `{}` has an empty command",
                project.name
            )));
        }
        let working_dir = match project.cwd.as_deref() {
            Some(dir) => Some(resolve_dir(play_dir.as_deref().unwrap_or(base_dir), dir)),
            None => play_dir.clone(),
        };
        let mut built = Project::new(project.name, project.command)
            .with_args(project.args)
            .with_enabled(project.enabled)
            .with_delay(Duration::from_millis(project.delay_ms))
            .with_direct_exec(project.direct_exec);
        if let Some(dir) = working_dir {
            built = built.with_working_dir(dir);
        }
        projects.push(built);
    }
    Ok(ProcessGroup::new(name, projects))
}

fn resolve_dir(base_dir: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        base_dir.join(dir)
    }
}
