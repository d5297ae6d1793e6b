//! Resolution of pretrained model artifacts.
//!
//! A model identifier is either a local directory, used as-is, or a
//! Hugging Face hub repository id (`owner/name`, optionally `@revision`)
//! whose files are downloaded into the hub cache.

use std::path::{Path, PathBuf};

use hf_hub::api::sync::Api;

use crate::errors::TtsError;

/// Where a model's files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A directory on disk that already holds the model files.
    Local(PathBuf),
    /// A hub repository, with an optional revision.
    Hub {
        repo_id: String,
        revision: Option<String>,
    },
}

impl ModelSource {
    /// Classify a model identifier.
    ///
    /// Existing directories and anything that looks like a filesystem path
    /// are local; everything else is treated as a hub repository id.
    ///
    /// ## Examples
    ///
    /// ```
    /// use speech_adapters::hub::ModelSource;
    ///
    /// assert_eq!(
    ///     ModelSource::parse("suno/bark"),
    ///     ModelSource::Hub { repo_id: "suno/bark".into(), revision: None }
    /// );
    /// assert!(matches!(ModelSource::parse("./models/bark"), ModelSource::Local(_)));
    /// ```
    pub fn parse(model: &str) -> Self {
        let path = Path::new(model);
        let looks_like_path = model.starts_with('/')
            || model.starts_with('.')
            || model.starts_with('~')
            || path.is_dir();

        if looks_like_path {
            return ModelSource::Local(expand_home(model));
        }

        match model.split_once('@') {
            Some((repo_id, rev)) => ModelSource::Hub {
                repo_id: repo_id.to_string(),
                revision: Some(rev.to_string()),
            },
            None => ModelSource::Hub {
                repo_id: model.to_string(),
                revision: None,
            },
        }
    }
}

/// Model files available on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    /// The identifier the artifacts were resolved from.
    pub model: String,
    /// Directory containing the model files.
    pub dir: PathBuf,
}

/// Resolve `model` to a local directory containing every file in `files`.
///
/// Hub downloads run on the blocking pool; already cached files are not
/// fetched again.
///
/// ## Errors
///
/// Returns `TtsError::ModelLoadFailed` if a local directory is missing a
/// file, the id is malformed, or a download fails.
pub async fn resolve_artifacts(model: &str, files: &[String]) -> Result<ModelArtifacts, TtsError> {
    let load_err = |message: String| TtsError::ModelLoadFailed {
        model: model.to_string(),
        message,
    };

    match ModelSource::parse(model) {
        ModelSource::Local(dir) => {
            if !dir.is_dir() {
                return Err(load_err(format!("{} is not a directory", dir.display())));
            }
            let missing: Vec<&str> = files
                .iter()
                .filter(|file| !dir.join(file).exists())
                .map(String::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(load_err(format!("missing files: {}", missing.join(", "))));
            }

            tracing::debug!(model, dir = %dir.display(), "Using local model directory");
            Ok(ModelArtifacts {
                model: model.to_string(),
                dir,
            })
        }
        ModelSource::Hub { repo_id, revision } => {
            if repo_id.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(load_err(format!(
                    "'{repo_id}' is neither a directory nor an owner/name hub id"
                )));
            }

            let files = files.to_vec();
            let model_owned = model.to_string();
            let dir = tokio::task::spawn_blocking(move || {
                download_files(&repo_id, revision, &files)
            })
            .await
            .map_err(|e| load_err(e.to_string()))?
            .map_err(load_err)?;

            tracing::info!(model = %model_owned, dir = %dir.display(), "Model artifacts ready");
            Ok(ModelArtifacts {
                model: model_owned,
                dir,
            })
        }
    }
}

/// Download `files` from a hub repository and return the snapshot root.
fn download_files(
    repo_id: &str,
    revision: Option<String>,
    files: &[String],
) -> Result<PathBuf, String> {
    let api = Api::new().map_err(|e| e.to_string())?;
    let repo = match revision {
        Some(rev) => api.repo(hf_hub::Repo::with_revision(
            repo_id.to_string(),
            hf_hub::RepoType::Model,
            rev,
        )),
        None => api.model(repo_id.to_string()),
    };

    let mut root = None;
    for file in files {
        tracing::debug!(repo_id, file = %file, "Fetching model file");
        let cached = repo.get(file).map_err(|e| format!("{file}: {e}"))?;
        if root.is_none() {
            root = snapshot_root(&cached, file);
        }
    }

    root.ok_or_else(|| "no model files were requested".to_string())
}

/// Strip the repository-relative `file` path from its cached location.
fn snapshot_root(cached: &Path, file: &str) -> Option<PathBuf> {
    let depth = Path::new(file).components().count();
    cached.ancestors().nth(depth).map(Path::to_path_buf)
}

fn expand_home(model: &str) -> PathBuf {
    match model.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(model)),
        None => PathBuf::from(model),
    }
}
