use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use pivot_export::config::JobConfig;
use pivot_export::export::{Exporter, MeshWriter, RecordingExporter};
use pivot_export::pipeline::{
    export_all, find_anchors, mesh_nodes, CancelFlag, SessionError, SessionOptions,
};
use pivot_export::scene_graph::Scene;

/// Export anchored groups of a glTF scene as individual mesh files
#[derive(Parser)]
#[command(name = "pivot-export", version, long_about = None)]
struct Cli {
    /// Scene to export from (.gltf or .glb)
    #[arg(name = "SCENE")]
    scene: PathBuf,

    /// Job file describing groups and export settings (JSON)
    #[arg(name = "JOB")]
    job: PathBuf,

    /// Run the whole session without writing any file
    #[arg(long)]
    dry_run: bool,

    /// Print the groups and their anchors, then exit
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let job = JobConfig::load(&cli.job)
        .with_context(|| format!("Failed to load job {}", cli.job.display()))?;
    let mut scene = Scene::load_gltf(&cli.scene)?;
    log::info!(
        "Loaded {} node(s) from {}",
        scene.object_count(),
        cli.scene.display()
    );

    for warning in job.apply_groups(&mut scene) {
        eprintln!("warning: {warning}");
    }

    if cli.list {
        list_groups(&scene, &job);
        return Ok(());
    }

    let cancel = CancelFlag::new();
    let handler_flag = cancel.clone();
    ctrlc::set_handler(move || {
        log::info!("Interrupted, stopping after the current file");
        handler_flag.cancel();
    })
    .context("Failed to set the Ctrl-C handler")?;

    let options = SessionOptions {
        scene_axes: job.scene_axes,
        cancel: Some(cancel),
    };
    let recorder = RecordingExporter::new();
    let exporter: &dyn Exporter = if cli.dry_run { &recorder } else { &MeshWriter };

    let report = match export_all(&mut scene, &job.exports, exporter, &options) {
        Ok(report) => report,
        Err(SessionError::Cancelled { report }) => {
            print!("{report}");
            bail!("Export cancelled");
        }
        Err(err) => return Err(err.into()),
    };
    print!("{report}");

    if !report.is_success() {
        bail!("Nothing was exported");
    }
    Ok(())
}

fn list_groups(scene: &Scene, job: &JobConfig) {
    for config in &job.exports {
        let state = if config.enable_export { "" } else { " (disabled)" };
        println!("{}{}", config.group, state);

        let Some(group) = scene.get_group_by_name(&config.group) else {
            println!("  no such group");
            continue;
        };

        let anchors = find_anchors(scene, group);
        if anchors.is_empty() {
            println!("  no anchors, {} mesh node(s)", mesh_nodes(scene, group).len());
        }
        for anchor in anchors {
            println!("  {} ({} mesh node(s))", anchor.name, anchor.meshes.len());
        }
    }
}
