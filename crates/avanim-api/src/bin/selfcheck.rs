use std::path::Path;

use avanim_api::ApiConfig;
use avanim_media::{check_ffmpeg, check_ffprobe, AnimatorConfig, AnimatorHandle};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env();
    let animator_config = AnimatorConfig::from_env();

    println!(
        "avanim-selfcheck: starting with static_root={}",
        config.static_root.display()
    );

    let ffmpeg = check_ffmpeg()?;
    let ffprobe = check_ffprobe()?;
    println!("avanim-selfcheck: ffmpeg={} ffprobe={}", ffmpeg.display(), ffprobe.display());

    for dir in [config.avatars_dir(), config.animations_dir(), config.driving_dir()] {
        ensure_dir(&dir).await?;
    }

    let missing = animator_config.catalog.missing_files();
    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "driving videos missing for expressions: {}",
            missing.join(", ")
        ));
    }
    println!(
        "avanim-selfcheck: {} expressions available",
        animator_config.catalog.len()
    );

    let handle = tokio::task::spawn_blocking(move || AnimatorHandle::load(animator_config)).await?;
    let animator = handle.animator()?;
    println!(
        "avanim-selfcheck: model loaded on {} at {}x{}",
        animator.device(),
        animator.resolution(),
        animator.resolution()
    );

    println!("avanim-selfcheck: ok");
    Ok(())
}

async fn ensure_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {}", path.display(), e))
}
