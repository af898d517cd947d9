//! Delivery — hands a finished package to the caller.
//!
//! Two routes exist. The default returns upload handles (paths the caller
//! streams out itself, or pushes through an injected [`UploadTransport`]).
//! When relocation is configured, finished files are instead moved into
//! the configured directory under their deterministic names and the caller
//! receives URLs built from the link template.
//!
//! Any failure here is whole-job fatal: packaging already succeeded, only
//! the handoff failed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::DeliveryConfig;
use crate::error::{DeliveryError, Error, Result};
use crate::types::{Delivery, Package};

/// Injectable upload capability. When present, delivery pushes every
/// final file through it before returning; a rejection fails the job.
#[async_trait::async_trait]
pub trait UploadTransport: Send + Sync {
    /// Upload one file, with an optional user-facing label (`"2/3"` for
    /// archive parts)
    async fn upload(
        &self,
        path: &Path,
        label: Option<&str>,
    ) -> std::result::Result<(), DeliveryError>;
}

/// Deliver a package per the configuration.
pub(crate) async fn deliver(
    package: Package,
    config: &DeliveryConfig,
    transport: Option<&Arc<dyn UploadTransport>>,
) -> Result<Delivery> {
    match (&config.copy_files_path, &config.file_link_template) {
        (Some(dir), Some(template)) => relocate(package, dir, template).await,
        _ => upload(package, transport).await,
    }
}

async fn upload(
    package: Package,
    transport: Option<&Arc<dyn UploadTransport>>,
) -> Result<Delivery> {
    match package {
        Package::Single(artifact) => {
            if let Some(transport) = transport {
                transport.upload(&artifact.path, None).await?;
            }
            Ok(Delivery::Upload(artifact))
        }
        Package::Archive(parts) => {
            if let Some(transport) = transport {
                for part in &parts {
                    transport.upload(&part.path, Some(&part.label())).await?;
                }
            }
            Ok(Delivery::UploadParts(parts))
        }
    }
}

async fn relocate(package: Package, dir: &Path, template: &str) -> Result<Delivery> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        Error::Delivery(DeliveryError::TargetUnwritable {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })
    })?;

    let sources: Vec<PathBuf> = match &package {
        Package::Single(artifact) => vec![artifact.path.clone()],
        Package::Archive(parts) => parts.iter().map(|p| p.path.clone()).collect(),
    };

    let mut links = Vec::with_capacity(sources.len());
    for source in sources {
        let filename = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                Error::Delivery(DeliveryError::TargetUnwritable {
                    path: source.clone(),
                    reason: "file name is not valid UTF-8".to_string(),
                })
            })?
            .to_string();
        let dest = dir.join(&filename);
        move_file(&source, &dest).await.map_err(|e| {
            Error::Delivery(DeliveryError::TargetUnwritable {
                path: dir.to_path_buf(),
                reason: format!("moving {} failed: {}", source.display(), e),
            })
        })?;
        links.push(apply_template(template, &filename)?);
        tracing::info!(file = %dest.display(), "file relocated");
    }

    Ok(Delivery::Links(links))
}

/// Move a file, falling back to copy-and-remove when a plain rename fails
/// (relocation targets commonly sit on another filesystem).
async fn move_file(source: &Path, dest: &Path) -> std::io::Result<()> {
    match tokio::fs::rename(source, dest).await {
        Ok(()) => Ok(()),
        Err(_) => {
            tokio::fs::copy(source, dest).await?;
            tokio::fs::remove_file(source).await
        }
    }
}

/// Substitute a filename into the template's single `{0}` placeholder,
/// verbatim.
pub(crate) fn apply_template(template: &str, filename: &str) -> Result<String> {
    if template.matches("{0}").count() != 1 {
        return Err(Error::Delivery(DeliveryError::BadLinkTemplate {
            template: template.to_string(),
        }));
    }
    Ok(template.replace("{0}", filename))
}
