//! Toolkit provisioning.
//!
//! The MeloTTS backend runs out of a source checkout. Getting that
//! checkout onto the host is an explicit step: clone the repository, then
//! download the language data its tokenizer needs. Nothing here runs as a
//! side effect of constructing an adapter.

use std::future::Future;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::device::Device;
use crate::errors::TtsError;
use crate::runtime::{Invocation, WorkerCommand, run_worker};

/// Result of [`ensure_toolkit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The directory already existed; nothing was done.
    AlreadyPresent,
    /// The repository was cloned and language data installed.
    Provisioned,
}

/// The two side-effecting steps of provisioning.
pub trait Provisioner: Send + Sync {
    /// Clone `url` into `dest`.
    fn clone_repository(
        &self,
        url: &str,
        dest: &Path,
    ) -> impl Future<Output = Result<(), TtsError>> + Send;

    /// Download language data for the checkout at `dir`.
    fn install_language_data(&self, dir: &Path)
    -> impl Future<Output = Result<(), TtsError>> + Send;
}

/// Provision `dir` from `url` unless it already exists.
///
/// A checkout whose language-data step fails is removed again so a later
/// run starts from scratch instead of reporting `AlreadyPresent`.
///
/// ## Errors
///
/// Propagates the provisioner's `TtsError::ProvisionFailed`.
pub async fn ensure_toolkit<P: Provisioner>(
    dir: &Path,
    url: &str,
    provisioner: &P,
) -> Result<ProvisionOutcome, TtsError> {
    if dir.exists() {
        info!(path = %dir.display(), "Toolkit already present");
        return Ok(ProvisionOutcome::AlreadyPresent);
    }

    info!(url, path = %dir.display(), "Cloning toolkit");
    provisioner.clone_repository(url, dir).await?;

    if let Err(e) = provisioner.install_language_data(dir).await {
        warn!(path = %dir.display(), error = %e, "Language data install failed; removing checkout");
        if let Err(cleanup) = tokio::fs::remove_dir_all(dir).await {
            warn!(error = %cleanup, "Failed to remove partial checkout");
        }
        return Err(e);
    }

    info!(path = %dir.display(), "Toolkit provisioned");
    Ok(ProvisionOutcome::Provisioned)
}

/// Clones with libgit2 and installs language data with a host command.
#[derive(Debug, Clone)]
pub struct GitProvisioner {
    language_data: WorkerCommand,
}

impl GitProvisioner {
    /// `language_data` is run with the checkout as its working directory.
    pub fn new(language_data: WorkerCommand) -> Self {
        Self { language_data }
    }
}

impl Default for GitProvisioner {
    fn default() -> Self {
        Self::new(WorkerCommand::new("python3").with_args(["-m", "unidic", "download"]))
    }
}

impl Provisioner for GitProvisioner {
    async fn clone_repository(&self, url: &str, dest: &Path) -> Result<(), TtsError> {
        let url = url.to_string();
        let dest: PathBuf = dest.to_path_buf();

        tokio::task::spawn_blocking(move || git2::Repository::clone(&url, &dest).map(|_| ()))
            .await
            .map_err(|e| TtsError::ProvisionFailed {
                step: "clone".into(),
                message: e.to_string(),
            })?
            .map_err(|e| TtsError::ProvisionFailed {
                step: "clone".into(),
                message: e.message().to_string(),
            })
    }

    async fn install_language_data(&self, dir: &Path) -> Result<(), TtsError> {
        let command = self.language_data.clone().with_working_dir(dir);
        let invocation = Invocation {
            model_dir: dir,
            device: Device::Cpu,
            text: "",
            text_file: dir,
            output: dir,
            voice_preset: None,
        };

        run_worker("melo", &command, &invocation)
            .await
            .map_err(|e| TtsError::ProvisionFailed {
                step: "language data".into(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingProvisioner {
        clones: AtomicUsize,
        installs: AtomicUsize,
        fail_install: bool,
    }

    impl Provisioner for CountingProvisioner {
        async fn clone_repository(&self, _url: &str, dest: &Path) -> Result<(), TtsError> {
            self.clones.fetch_add(1, Ordering::SeqCst);
            std::fs::create_dir_all(dest)?;
            Ok(())
        }

        async fn install_language_data(&self, _dir: &Path) -> Result<(), TtsError> {
            self.installs.fetch_add(1, Ordering::SeqCst);
            if self.fail_install {
                return Err(TtsError::ProvisionFailed {
                    step: "language data".into(),
                    message: "No module named unidic".into(),
                });
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn absent_directory_triggers_exactly_one_clone() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("MeloTTS");
        let provisioner = CountingProvisioner::default();

        let outcome = ensure_toolkit(&dir, "https://example.invalid/melo.git", &provisioner)
            .await
            .unwrap();

        assert_eq!(outcome, ProvisionOutcome::Provisioned);
        assert_eq!(provisioner.clones.load(Ordering::SeqCst), 1);
        assert_eq!(provisioner.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn present_directory_triggers_no_clone() {
        let root = tempfile::tempdir().unwrap();
        let provisioner = CountingProvisioner::default();

        let outcome = ensure_toolkit(root.path(), "https://example.invalid/melo.git", &provisioner)
            .await
            .unwrap();

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert_eq!(provisioner.clones.load(Ordering::SeqCst), 0);
        assert_eq!(provisioner.installs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn second_run_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("MeloTTS");
        let provisioner = CountingProvisioner::default();

        ensure_toolkit(&dir, "u", &provisioner).await.unwrap();
        let outcome = ensure_toolkit(&dir, "u", &provisioner).await.unwrap();

        assert_eq!(outcome, ProvisionOutcome::AlreadyPresent);
        assert_eq!(provisioner.clones.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_language_data_removes_checkout() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("MeloTTS");
        let provisioner = CountingProvisioner {
            fail_install: true,
            ..Default::default()
        };

        let err = ensure_toolkit(&dir, "u", &provisioner).await.unwrap_err();
        assert!(matches!(err, TtsError::ProvisionFailed { .. }));
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn git_clone_of_missing_repository_fails() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("not-a-repo");
        let dest = root.path().join("checkout");

        let err = GitProvisioner::default()
            .clone_repository(source.to_str().unwrap(), &dest)
            .await
            .unwrap_err();
        match err {
            TtsError::ProvisionFailed { step, .. } => assert_eq!(step, "clone"),
            other => panic!("expected ProvisionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn git_clone_of_local_repository() {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("upstream");
        git2::Repository::init(&source).unwrap();
        let dest = root.path().join("checkout");

        GitProvisioner::default()
            .clone_repository(source.to_str().unwrap(), &dest)
            .await
            .unwrap();
        assert!(dest.join(".git").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn language_data_runs_inside_checkout() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner =
            GitProvisioner::new(WorkerCommand::new("sh").with_args(["-c", "touch unidic.ok"]));

        provisioner.install_language_data(dir.path()).await.unwrap();
        assert!(dir.path().join("unidic.ok").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn language_data_failure_is_provision_error() {
        let dir = tempfile::tempdir().unwrap();
        let provisioner = GitProvisioner::new(
            WorkerCommand::new("sh").with_args(["-c", "echo 'no network' >&2; exit 1"]),
        );

        let err = provisioner.install_language_data(dir.path()).await.unwrap_err();
        match err {
            TtsError::ProvisionFailed { step, message } => {
                assert_eq!(step, "language data");
                assert!(message.contains("no network"));
            }
            other => panic!("expected ProvisionFailed, got {other:?}"),
        }
    }
}
