//! End-to-end run: a fixture trainer produces a workspace, the orchestrator
//! evaluates it and the exporter mirrors and publishes it.

use async_trait::async_trait;
use dreamfusion_training::{
    ArtifactExporter, Destinations, InMemoryStore, NullProgressSink, ObjectUri, Orchestrator, ProgressSink,
    RunConfig, RunOutcome, Trainer, TrainerSession, TrainingResult, WorkspaceLayout,
};
use std::fs::FileTimes;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

const BUCKET: &str = "jerry-3d-object-generation";
const PREFIX: &str = "stable-dreamfusion";

/// Writes the files a real trainer leaves behind.
struct FixtureTrainer;

#[async_trait]
impl Trainer for FixtureTrainer {
    fn id(&self) -> &'static str {
        "fixture"
    }

    async fn train(&self, session: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
        let layout = WorkspaceLayout::new(session.workspace.clone());
        std::fs::create_dir_all(layout.validation_dir())?;
        for name in ["df_ep0100_0001_rgb.png", "df_ep0100_0001_depth.png", "df_ep0050_0001_rgb.png"] {
            std::fs::write(layout.validation_dir().join(name), name)?;
        }
        std::fs::write(
            layout.log_path(),
            "\
[INFO] Trainer: df | 2023-01-01_00-00-00 | cuda | fp16 | trial_hamburger
==> Start Training trial_hamburger Epoch 1/100, lr=0.010000 ...
==> Start Training trial_hamburger Epoch 100/100, lr=0.001000 ...
==> Finished Epoch 100/100.
[INFO] training takes 9.8500 minutes.
",
        )?;
        Ok(())
    }

    async fn test(&self, session: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
        assert!(session.guidance.is_none());
        let layout = WorkspaceLayout::new(session.workspace.clone());
        std::fs::create_dir_all(layout.results_dir())?;
        std::fs::write(layout.results_dir().join("df_ep0100_depth.mp4"), "depth")?;
        std::fs::write(layout.results_dir().join("df_ep0100_rgb.mp4"), "rgb")?;
        std::fs::write(layout.results_dir().join("notes.txt"), "skip me")?;

        let mut log = std::fs::read_to_string(layout.log_path())?;
        log.push_str(
            "\
[INFO] Trainer: df | 2023-01-01_00-10-00 | cuda | fp16 | trial_hamburger
[INFO] Latest checkpoint is trial_hamburger/checkpoints/df_ep0100.pth
[INFO] load at epoch 100, global step 10000
",
        );
        std::fs::write(layout.log_path(), log)?;
        Ok(())
    }

    async fn save_mesh(&self, session: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
        let layout = WorkspaceLayout::new(session.workspace.clone());
        std::fs::create_dir_all(layout.mesh_dir())?;
        for name in ["mesh.obj", "mesh.mtl", "albedo.png"] {
            std::fs::write(layout.mesh_dir().join(name), name)?;
        }
        Ok(())
    }

    async fn gui(&self, _: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_full_run_exports_artifacts() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("trial_hamburger");
    let mirror = temp.path().join("opt/ml/model");

    let store = Arc::new(InMemoryStore::new());
    let exporter = ArtifactExporter::new(store.clone(), Destinations::new(BUCKET, PREFIX))
        .with_mirror(Some(mirror.clone()));
    let orchestrator = Orchestrator::new(Arc::new(FixtureTrainer), Arc::new(NullProgressSink))
        .with_exporter(exporter)
        .with_argv("dreamfusion run --text hamburger");

    let config = RunConfig {
        text: Some("a hamburger".to_string()),
        workspace: workspace.to_string_lossy().to_string(),
        optimize: true,
        ..RunConfig::default()
    };

    let outcome = orchestrator.run(&config).await.unwrap();
    let RunOutcome::Trained { export: Some(report) } = outcome else {
        panic!("expected an exported training run");
    };

    let ws = workspace.to_string_lossy().to_string();
    assert!(report.failed.is_empty());
    assert_eq!(report.metadata.checkpoint, "df_ep0100.pth");
    assert_eq!(report.metadata.epochs, 100);

    let mut expected = vec![
        format!("{PREFIX}/results/{ws}/mesh.obj"),
        format!("{PREFIX}/results/{ws}/mesh.mtl"),
        format!("{PREFIX}/results/{ws}/albedo.png"),
        format!("{PREFIX}/videos/depth/{ws}_depth.mp4"),
        format!("{PREFIX}/videos/rgb/{ws}_rgb.mp4"),
        format!("{PREFIX}/logs/{ws}.txt"),
        format!("{PREFIX}/images/depth/{ws}/df_ep0100_0001_depth.png"),
        format!("{PREFIX}/images/rgb/{ws}/df_ep0100_0001_rgb.png"),
    ];
    expected.sort();
    assert_eq!(store.keys(), expected);

    // The uploaded log carries the appended attributes.
    let log = store.object(&ObjectUri::new(BUCKET, format!("{PREFIX}/logs/{ws}.txt"))).unwrap();
    let log = String::from_utf8(log).unwrap();
    assert!(log.contains("Attributes from file:"));
    assert!(log.contains("time: 0:10:00"));

    // Mirror holds the tree as it was before the log was annotated.
    assert!(mirror.join("mesh/mesh.obj").is_file());
    assert!(mirror.join("results/df_ep0100_rgb.mp4").is_file());
    assert!(!std::fs::read_to_string(mirror.join("log_df.txt")).unwrap().contains("Attributes from file:"));

    assert!(workspace.join("run_metadata.json").is_file());
}

#[tokio::test]
async fn test_metadata_failure_is_fatal() {
    let temp = TempDir::new().unwrap();
    let workspace = temp.path().join("ws");

    struct NoLogTrainer;

    #[async_trait]
    impl Trainer for NoLogTrainer {
        fn id(&self) -> &'static str {
            "no-log"
        }
        async fn train(&self, _: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
            Ok(())
        }
        async fn test(&self, _: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
            Ok(())
        }
        async fn save_mesh(&self, session: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
            let layout = WorkspaceLayout::new(session.workspace.clone());
            std::fs::create_dir_all(layout.mesh_dir())?;
            std::fs::write(layout.mesh_dir().join("mesh.obj"), "v 0 0 0\n")?;
            std::fs::write(layout.log_path(), "nothing useful\n")?;
            Ok(())
        }
        async fn gui(&self, _: &TrainerSession, _: &dyn ProgressSink) -> TrainingResult<()> {
            Ok(())
        }
    }

    let store = Arc::new(InMemoryStore::new());
    let orchestrator = Orchestrator::new(Arc::new(NoLogTrainer), Arc::new(NullProgressSink))
        .with_exporter(ArtifactExporter::new(store.clone(), Destinations::new(BUCKET, PREFIX)));
    let config = RunConfig {
        workspace: workspace.to_string_lossy().to_string(),
        albedo: true,
        ..RunConfig::default()
    };

    let err = orchestrator.run(&config).await.unwrap_err();
    assert!(err.to_string().contains("run metadata"));
    // The mesh went out before the log was parsed.
    assert_eq!(store.keys().len(), 1);
}

/// Log of a finished run whose last checkpoint is epoch `epoch`.
fn run_log(epoch: u32) -> String {
    format!(
        "\
[INFO] Trainer: df | 2023-01-01_00-00-00 | cuda | fp16 | trial_pear
==> Start Training trial_pear Epoch 1/{epoch}, lr=0.010000 ...
==> Start Training trial_pear Epoch {epoch}/{epoch}, lr=0.001000 ...
[INFO] training takes 1.5000 minutes.
[INFO] Trainer: df | 2023-01-01_00-02-00 | cuda | fp16 | trial_pear
[INFO] Latest checkpoint is trial_pear/checkpoints/df_ep{epoch:04}.pth
[INFO] load at epoch {epoch}, global step {}
",
        epoch * 100
    )
}

fn set_mtime(path: &Path, secs: u64) {
    let time = SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
    std::fs::File::open(path).unwrap().set_times(FileTimes::new().set_modified(time)).unwrap();
}

#[tokio::test]
async fn test_reused_workspace_exports_the_new_run() {
    let temp = TempDir::new().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("trial_pear"));
    std::fs::create_dir_all(layout.mesh_dir()).unwrap();
    std::fs::create_dir_all(layout.validation_dir()).unwrap();
    std::fs::write(layout.mesh_dir().join("mesh.obj"), "v 0 0 0\n").unwrap();
    std::fs::write(layout.validation_dir().join("df_ep0010_0001_rgb.png"), "first").unwrap();
    std::fs::write(layout.log_path(), run_log(10)).unwrap();

    let store = Arc::new(InMemoryStore::new());
    let exporter = ArtifactExporter::new(store.clone(), Destinations::new(BUCKET, PREFIX));

    let first = exporter.export(&layout, true, &NullProgressSink).await.unwrap();
    assert_eq!(first.metadata.checkpoint, "df_ep0010.pth");
    assert!(layout.metadata_path().is_file());

    // A resumed run rewrites the log and renders a newer checkpoint.
    std::fs::write(layout.log_path(), run_log(20)).unwrap();
    std::fs::write(layout.validation_dir().join("df_ep0020_0001_rgb.png"), "second").unwrap();
    set_mtime(&layout.metadata_path(), 1_000);
    set_mtime(&layout.log_path(), 2_000);

    let second = exporter.export(&layout, true, &NullProgressSink).await.unwrap();
    assert_eq!(second.metadata.checkpoint, "df_ep0020.pth");
    assert_eq!(second.metadata.epochs, 20);

    let ws = layout.name();
    let image = ObjectUri::new(BUCKET, format!("{PREFIX}/images/rgb/{ws}/df_ep0020_0001_rgb.png"));
    assert!(second.uploaded.contains(&image));

    let log = String::from_utf8(store.object(&ObjectUri::new(BUCKET, format!("{PREFIX}/logs/{ws}.txt"))).unwrap())
        .unwrap();
    assert!(log.contains("checkpoint: df_ep0020.pth"));
    assert!(!log.contains("df_ep0010"));
}

#[tokio::test]
async fn test_mirror_failure_stops_export() {
    let temp = TempDir::new().unwrap();
    let layout = WorkspaceLayout::new(temp.path().join("ws"));
    std::fs::create_dir_all(layout.mesh_dir()).unwrap();
    std::fs::write(layout.mesh_dir().join("mesh.obj"), "v 0 0 0\n").unwrap();
    std::fs::write(layout.log_path(), run_log(10)).unwrap();

    // The mirror destination is an existing regular file.
    let blocked = temp.path().join("model");
    std::fs::write(&blocked, "not a directory").unwrap();

    let store = Arc::new(InMemoryStore::new());
    let exporter =
        ArtifactExporter::new(store.clone(), Destinations::new(BUCKET, PREFIX)).with_mirror(Some(blocked));

    assert!(exporter.export(&layout, true, &NullProgressSink).await.is_err());
    assert!(store.attempts().is_empty());
    assert_eq!(std::fs::read_to_string(layout.log_path()).unwrap(), run_log(10));
}
