//! Post-training artifact export.
//!
//! After a full training run the workspace is mirrored to local storage and a
//! selection of its files is published to object storage:
//!
//! | source                         | key                                          |
//! |--------------------------------|----------------------------------------------|
//! | `mesh/{mesh.obj,mesh.mtl,albedo.png}` | `<prefix>/results/<ws>/<file>`        |
//! | `results/*_depth.mp4`          | `<prefix>/videos/depth/<ws>_depth.mp4`       |
//! | `results/*_rgb.mp4`            | `<prefix>/videos/rgb/<ws>_rgb.mp4`           |
//! | `log_df.txt`                   | `<prefix>/logs/<ws>.txt`                     |
//! | `validation/<ckpt>*_depth.png` | `<prefix>/images/depth/<ws>/<file>`          |
//! | `validation/<ckpt>*`           | `<prefix>/images/rgb/<ws>/<file>`            |
//!
//! Mesh and log uploads are fatal on failure. Video and image uploads are
//! attempted file by file and failures are only reported.

use crate::error::TrainingResult;
use crate::layout::WorkspaceLayout;
use crate::metadata::RunMetadata;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::storage::{ObjectStore, ObjectUri};
use std::fs::FileTimes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

pub const MESH_FILES: [&str; 3] = ["mesh.obj", "mesh.mtl", "albedo.png"];
pub const ALBEDO_MESH_FILES: [&str; 1] = ["mesh.obj"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderKind {
    Depth,
    Rgb,
}

impl RenderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Depth => "depth",
            Self::Rgb => "rgb",
        }
    }

    /// Kind of a rendered video, `None` for anything else.
    pub fn of_video(file_name: &str) -> Option<Self> {
        if file_name.ends_with("_depth.mp4") {
            Some(Self::Depth)
        } else if file_name.ends_with("_rgb.mp4") {
            Some(Self::Rgb)
        } else {
            None
        }
    }

    /// Validation images are depth renders or colour renders.
    pub fn of_image(file_name: &str) -> Self {
        if file_name.ends_with("_depth.png") { Self::Depth } else { Self::Rgb }
    }
}

/// Bucket and key naming for published artifacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destinations {
    pub bucket: String,
    pub prefix: String,
}

impl Destinations {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self { bucket: bucket.into(), prefix: prefix.into() }
    }

    fn uri(&self, key: String) -> ObjectUri {
        ObjectUri::new(self.bucket.clone(), key)
    }

    pub fn mesh(&self, workspace: &str, file: &str) -> ObjectUri {
        self.uri(format!("{}/results/{workspace}/{file}", self.prefix))
    }

    pub fn video(&self, workspace: &str, kind: RenderKind) -> ObjectUri {
        let kind = kind.as_str();
        self.uri(format!("{}/videos/{kind}/{workspace}_{kind}.mp4", self.prefix))
    }

    pub fn log(&self, workspace: &str) -> ObjectUri {
        self.uri(format!("{}/logs/{workspace}.txt", self.prefix))
    }

    pub fn image(&self, workspace: &str, kind: RenderKind, file: &str) -> ObjectUri {
        self.uri(format!("{}/images/{}/{workspace}/{file}", self.prefix, kind.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct FailedUpload {
    pub local: PathBuf,
    pub uri: ObjectUri,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct ExportReport {
    pub mirrored_files: u64,
    pub uploaded: Vec<ObjectUri>,
    pub failed: Vec<FailedUpload>,
    pub metadata: RunMetadata,
}

/// Uploads that may fail individually.
#[derive(Debug, Default)]
struct BatchOutcome {
    uploaded: Vec<ObjectUri>,
    failed: Vec<FailedUpload>,
}

pub struct ArtifactExporter {
    store: Arc<dyn ObjectStore>,
    destinations: Destinations,
    mirror_dir: Option<PathBuf>,
}

impl ArtifactExporter {
    pub fn new(store: Arc<dyn ObjectStore>, destinations: Destinations) -> Self {
        Self { store, destinations, mirror_dir: None }
    }

    #[must_use]
    pub fn with_mirror(mut self, mirror_dir: Option<PathBuf>) -> Self {
        self.mirror_dir = mirror_dir;
        self
    }

    /// Mirror, then publish mesh, videos, log and validation images in that order.
    pub async fn export(
        &self,
        layout: &WorkspaceLayout,
        albedo_only: bool,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<ExportReport> {
        let workspace = layout.name();

        let mirrored_files = match &self.mirror_dir {
            Some(dst) => {
                progress.on_event(ProgressEvent::Message {
                    workspace: workspace.clone(),
                    message: format!("Saving all folders and files to {}", dst.display()),
                });
                mirror_workspace(layout.root(), dst)?
            }
            None => 0,
        };

        let mut uploaded = self.upload_mesh(layout, albedo_only, progress).await?;

        let videos = self.upload_videos(layout, progress).await;
        let (metadata, log_uri) = self.upload_log(layout, progress).await?;
        let images = self.upload_validation_images(layout, metadata.checkpoint_stem(), progress).await;

        uploaded.extend(videos.uploaded);
        uploaded.push(log_uri);
        uploaded.extend(images.uploaded);

        let mut failed = videos.failed;
        failed.extend(images.failed);

        if !failed.is_empty() {
            tracing::warn!(count = failed.len(), "some artifact uploads failed");
        }

        Ok(ExportReport { mirrored_files, uploaded, failed, metadata })
    }

    async fn put(
        &self,
        workspace: &str,
        local: &Path,
        uri: &ObjectUri,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<()> {
        self.store.put_file(local, uri).await?;
        progress.on_event(ProgressEvent::Uploaded {
            workspace: workspace.to_string(),
            local: local.display().to_string(),
            uri: uri.to_string(),
        });
        Ok(())
    }

    async fn put_isolated(
        &self,
        workspace: &str,
        local: PathBuf,
        uri: ObjectUri,
        outcome: &mut BatchOutcome,
        progress: &dyn ProgressSink,
    ) {
        match self.put(workspace, &local, &uri, progress).await {
            Ok(()) => outcome.uploaded.push(uri),
            Err(e) => {
                tracing::warn!(local = %local.display(), error = %e, "upload failed");
                progress.on_event(ProgressEvent::UploadFailed {
                    workspace: workspace.to_string(),
                    local: local.display().to_string(),
                    error: e.to_string(),
                });
                outcome.failed.push(FailedUpload { local, uri, error: e.to_string() });
            }
        }
    }

    /// Mesh files; textures are skipped for albedo-only runs.
    pub async fn upload_mesh(
        &self,
        layout: &WorkspaceLayout,
        albedo_only: bool,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<Vec<ObjectUri>> {
        let workspace = layout.name();
        let files: &[&str] = if albedo_only { &ALBEDO_MESH_FILES } else { &MESH_FILES };

        let mut uploaded = Vec::with_capacity(files.len());
        for file in files {
            let uri = self.destinations.mesh(&workspace, file);
            self.put(&workspace, &layout.mesh_dir().join(file), &uri, progress).await?;
            uploaded.push(uri);
        }
        Ok(uploaded)
    }

    async fn upload_videos(&self, layout: &WorkspaceLayout, progress: &dyn ProgressSink) -> BatchOutcome {
        let workspace = layout.name();
        let mut outcome = BatchOutcome::default();

        for path in files_under(&layout.results_dir()) {
            let Some(kind) = file_name(&path).and_then(RenderKind::of_video) else {
                continue;
            };
            let uri = self.destinations.video(&workspace, kind);
            self.put_isolated(&workspace, path, uri, &mut outcome, progress).await;
        }
        outcome
    }

    /// Derive metadata, append it to the log and publish the log.
    async fn upload_log(
        &self,
        layout: &WorkspaceLayout,
        progress: &dyn ProgressSink,
    ) -> TrainingResult<(RunMetadata, ObjectUri)> {
        let workspace = layout.name();
        let log = layout.log_path();

        let metadata = RunMetadata::load(layout)?;
        metadata.append_to_log(&log)?;
        metadata.write_json(&layout.metadata_path())?;

        let uri = self.destinations.log(&workspace);
        self.put(&workspace, &log, &uri, progress).await?;
        Ok((metadata, uri))
    }

    async fn upload_validation_images(
        &self,
        layout: &WorkspaceLayout,
        checkpoint_stem: &str,
        progress: &dyn ProgressSink,
    ) -> BatchOutcome {
        let workspace = layout.name();
        let mut outcome = BatchOutcome::default();

        for path in files_under(&layout.validation_dir()) {
            let Some(name) = file_name(&path).filter(|n| n.starts_with(checkpoint_stem)) else {
                continue;
            };
            let uri = self.destinations.image(&workspace, RenderKind::of_image(name), name);
            self.put_isolated(&workspace, path, uri, &mut outcome, progress).await;
        }
        outcome
    }
}

fn file_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

/// Regular files below `dir`, sorted by path. A missing directory is empty.
fn files_under(dir: &Path) -> Vec<PathBuf> {
    if !dir.is_dir() {
        return Vec::new();
    }
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(walkdir::DirEntry::into_path)
        .collect()
}

/// Copy the tree at `src` into `dst`, keeping permissions and timestamps.
///
/// Returns the number of files copied.
pub fn mirror_workspace(src: &Path, dst: &Path) -> TrainingResult<u64> {
    std::fs::create_dir_all(dst)?;
    let mut copied = 0;

    for entry in WalkDir::new(src).follow_links(true) {
        let entry = entry.map_err(|e| std::io::Error::other(e.to_string()))?;
        let relative = entry.path().strip_prefix(src).map_err(|e| std::io::Error::other(e.to_string()))?;
        let target = dst.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }

        std::fs::copy(entry.path(), &target)?;
        let meta = entry.metadata().map_err(|e| std::io::Error::other(e.to_string()))?;
        let times = FileTimes::new().set_accessed(meta.accessed()?).set_modified(meta.modified()?);
        std::fs::File::open(&target)?.set_times(times)?;
        copied += 1;
    }

    tracing::info!(src = %src.display(), dst = %dst.display(), files = copied, "mirrored workspace");
    Ok(copied)
}
