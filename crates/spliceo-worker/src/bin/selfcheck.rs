use std::path::Path;

use spliceo_media::command::check_tool;
use spliceo_media::{probe_hardware, ProcessExecutor};
use spliceo_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    println!(
        "spliceo-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;
    for tool in ["ffmpeg", "ffprobe"] {
        let path = check_tool(tool).map_err(|e| anyhow::anyhow!("{}", e))?;
        println!("spliceo-selfcheck: {} at {}", tool, path.display());
    }

    if config.gpu_enabled {
        let profile = probe_hardware(&ProcessExecutor::new()).await;
        match &profile.disabled_reason {
            None => println!(
                "spliceo-selfcheck: nvenc usable (scale_cuda={}, workers cap={:?})",
                profile.scale_cuda_usable,
                profile.max_workers()
            ),
            Some(reason) => println!("spliceo-selfcheck: cpu only ({})", reason),
        }
    } else {
        println!("spliceo-selfcheck: gpu disabled by configuration");
    }

    println!("spliceo-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir<P: AsRef<Path>>(path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok").await?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}
