use anatomy_viewer::config::ViewerConfig;
use anatomy_viewer::fetch::http::HttpTransport;
use anatomy_viewer::params::RawParameters;
use anatomy_viewer::scene::NullSceneBackend;
use anatomy_viewer::{SubmitStatus, ViewerSession};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const USAGE: &str = "usage: fetch_mesh <ns> <nr> <d> <h> <w> [output-dir] [config.json]";

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("[fetch_mesh] error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 5 {
        return Err(USAGE.into());
    }
    let raw = RawParameters::new(
        args[0].as_str(),
        args[1].as_str(),
        args[2].as_str(),
        args[3].as_str(),
        args[4].as_str(),
    );
    let output_dir = args
        .get(5)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    let config = match args.get(6) {
        Some(path) => ViewerConfig::from_json_path(path)?,
        None => ViewerConfig::default(),
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let mut viewer = ViewerSession::new(
        config,
        Arc::new(HttpTransport::new()),
        Box::new(NullSceneBackend::default()),
    )?;

    let status = runtime.block_on(viewer.submit_raw(&raw))?;
    let SubmitStatus::Applied(summary) = status else {
        return Err(format!("nothing loaded: {status:?}").into());
    };
    if let Some(warning) = &summary.warning {
        eprintln!("[fetch_mesh] warning: {warning}");
    }

    let artifacts = viewer
        .artifacts()
        .ok_or("load finished without export artifacts")?;
    std::fs::create_dir_all(&output_dir)?;
    write_artifact(&output_dir, &artifacts.static_mesh.file_name, &artifacts.static_mesh.bytes)?;
    write_artifact(&output_dir, &artifacts.source.file_name, &artifacts.source.bytes)?;
    println!(
        "[fetch_mesh] {} points, {} polygons, labels {:?}, source digest {:016x}",
        summary.points,
        summary.polygons,
        summary.color_range.map(|range| (range.min, range.max)),
        artifacts.source.digest
    );
    Ok(())
}

fn write_artifact(dir: &Path, name: &str, bytes: &[u8]) -> std::io::Result<()> {
    let path = dir.join(name);
    std::fs::write(&path, bytes)?;
    println!("[fetch_mesh] wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
