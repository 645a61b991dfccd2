use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::{
    camera::{encode_png, CameraGuard, ScreenSource},
    controller::{CaptureSink, ScheduleConfig},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Runs until cancelled. The camera guard lives in this future, so the camera is
/// released whenever the loop ends, including when the task is aborted.
pub async fn capture_loop(
    session_id: String,
    config: ScheduleConfig,
    camera: CameraGuard,
    screen: Arc<dyn ScreenSource>,
    sink: Arc<dyn CaptureSink>,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(config.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let fut = perform_capture(&session_id, &camera, &screen, sink.as_ref());

                match tokio::time::timeout(config.tick_timeout, fut).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => log_error!("capture failed for {session_id}: {err:?}"),
                    Err(_) => log_warn!(
                        "capture timeout (> {:?}) for {session_id}",
                        config.tick_timeout
                    ),
                }
            }
            _ = cancel_token.cancelled() => {
                log_info!("capture loop for {session_id} shutting down");
                break;
            }
        }
    }
}

async fn perform_capture(
    session_id: &str,
    camera: &CameraGuard,
    screen: &Arc<dyn ScreenSource>,
    sink: &dyn CaptureSink,
) -> Result<()> {
    let started = Instant::now();

    let frame = camera.read_frame().await?;
    let screen = Arc::clone(screen);
    let (webcam_png, screenshot_png) = tokio::task::spawn_blocking(move || -> Result<_> {
        let screenshot = screen.capture().context("screen capture failed")?;
        Ok((encode_png(&frame)?, encode_png(&screenshot)?))
    })
    .await
    .context("capture encode worker join failed")??;

    let sizes = (webcam_png.len(), screenshot_png.len());
    sink.submit(session_id, webcam_png, screenshot_png)
        .await
        .context("upload failed")?;

    log_info!(
        "uploaded webcam {} bytes, screenshot {} bytes in {}ms",
        sizes.0,
        sizes.1,
        started.elapsed().as_millis()
    );
    Ok(())
}
