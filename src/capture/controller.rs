use std::{sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    camera::{CameraDevice, CameraGuard, ScreenSource},
    loop_worker::capture_loop,
};

/// Destination for one tick's pair of PNG images.
#[async_trait]
pub trait CaptureSink: Send + Sync {
    async fn submit(&self, session_id: &str, webcam_png: Vec<u8>, screenshot_png: Vec<u8>)
        -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub interval: Duration,
    /// Upper bound for one tick: frame grab, encoding and upload.
    pub tick_timeout: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            tick_timeout: Duration::from_secs(10),
        }
    }
}

pub struct CaptureScheduler {
    config: ScheduleConfig,
    handle: Option<JoinHandle<()>>,
    cancel_token: Option<CancellationToken>,
}

impl CaptureScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            handle: None,
            cancel_token: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Opens the camera and starts capturing for `session_id`.
    pub fn start(
        &mut self,
        session_id: String,
        camera: Box<dyn CameraDevice>,
        screen: Arc<dyn ScreenSource>,
        sink: Arc<dyn CaptureSink>,
    ) -> Result<()> {
        if self.handle.is_some() {
            bail!("capture already active");
        }

        let camera = CameraGuard::open(camera)?;
        let cancel_token = CancellationToken::new();

        info!("Starting capture for {session_id} every {:?}", self.config.interval);
        let handle = tokio::spawn(capture_loop(
            session_id,
            self.config,
            camera,
            screen,
            sink,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        Ok(())
    }

    pub async fn stop(&mut self) -> Result<()> {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        if let Some(handle) = self.handle.take() {
            handle
                .await
                .context("capture loop task failed to join")
                .map(|_| ())
        } else {
            Ok(())
        }
    }
}

impl Drop for CaptureScheduler {
    fn drop(&mut self) {
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    use image::{DynamicImage, RgbImage};

    use super::*;

    struct FakeCamera {
        opened: Arc<AtomicBool>,
        released: Arc<AtomicBool>,
        fail_open: bool,
    }

    impl CameraDevice for FakeCamera {
        fn open(&mut self) -> Result<()> {
            if self.fail_open {
                bail!("no camera");
            }
            self.opened.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn read_frame(&mut self) -> Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(RgbImage::new(8, 8)))
        }

        fn release(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    struct BlankScreen;

    impl ScreenSource for BlankScreen {
        fn capture(&self) -> Result<DynamicImage> {
            Ok(DynamicImage::ImageRgb8(RgbImage::new(16, 9)))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        submissions: Mutex<Vec<(String, usize, usize)>>,
        attempts: AtomicUsize,
        fail_first: usize,
    }

    #[async_trait]
    impl CaptureSink for RecordingSink {
        async fn submit(
            &self,
            session_id: &str,
            webcam_png: Vec<u8>,
            screenshot_png: Vec<u8>,
        ) -> Result<()> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_first {
                bail!("server unavailable");
            }
            self.submissions.lock().unwrap().push((
                session_id.to_string(),
                webcam_png.len(),
                screenshot_png.len(),
            ));
            Ok(())
        }
    }

    fn camera() -> (Box<dyn CameraDevice>, Arc<AtomicBool>, Arc<AtomicBool>) {
        let opened = Arc::new(AtomicBool::new(false));
        let released = Arc::new(AtomicBool::new(false));
        let camera = FakeCamera {
            opened: opened.clone(),
            released: released.clone(),
            fail_open: false,
        };
        (Box::new(camera), opened, released)
    }

    fn fast() -> ScheduleConfig {
        ScheduleConfig {
            interval: Duration::from_millis(40),
            tick_timeout: Duration::from_secs(2),
        }
    }

    #[tokio::test]
    async fn submits_each_tick_and_releases_camera_on_stop() {
        let (camera, opened, released) = camera();
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = CaptureScheduler::new(fast());

        scheduler
            .start("session_1".into(), camera, Arc::new(BlankScreen), sink.clone())
            .unwrap();
        assert!(opened.load(Ordering::SeqCst));

        tokio::time::sleep(Duration::from_millis(300)).await;
        scheduler.stop().await.unwrap();

        let submissions = sink.submissions.lock().unwrap().clone();
        assert!(submissions.len() >= 2, "got {} submissions", submissions.len());
        assert!(submissions
            .iter()
            .all(|(id, webcam, screen)| id == "session_1" && *webcam > 0 && *screen > 0));
        assert!(released.load(Ordering::SeqCst));
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn failed_uploads_do_not_stop_the_schedule() {
        let (camera, _, _) = camera();
        let sink = Arc::new(RecordingSink {
            fail_first: 2,
            ..Default::default()
        });
        let mut scheduler = CaptureScheduler::new(fast());

        scheduler
            .start("session_1".into(), camera, Arc::new(BlankScreen), sink.clone())
            .unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        scheduler.stop().await.unwrap();

        assert!(sink.attempts.load(Ordering::SeqCst) > 2);
        assert!(!sink.submissions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn refuses_to_start_twice() {
        let (first, _, _) = camera();
        let (second, second_opened, _) = camera();
        let sink = Arc::new(RecordingSink::default());
        let mut scheduler = CaptureScheduler::new(fast());

        scheduler
            .start("session_1".into(), first, Arc::new(BlankScreen), sink.clone())
            .unwrap();
        assert!(scheduler
            .start("session_1".into(), second, Arc::new(BlankScreen), sink)
            .is_err());
        assert!(!second_opened.load(Ordering::SeqCst));

        scheduler.stop().await.unwrap();
    }

    #[tokio::test]
    async fn camera_open_failure_is_reported() {
        let camera = FakeCamera {
            opened: Arc::new(AtomicBool::new(false)),
            released: Arc::new(AtomicBool::new(false)),
            fail_open: true,
        };
        let mut scheduler = CaptureScheduler::new(fast());

        let result = scheduler.start(
            "session_1".into(),
            Box::new(camera),
            Arc::new(BlankScreen),
            Arc::new(RecordingSink::default()),
        );

        assert!(result.is_err());
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn dropping_the_scheduler_releases_the_camera() {
        let (camera, _, released) = camera();
        let mut scheduler = CaptureScheduler::new(fast());
        scheduler
            .start(
                "session_1".into(),
                camera,
                Arc::new(BlankScreen),
                Arc::new(RecordingSink::default()),
            )
            .unwrap();

        drop(scheduler);
        for _ in 0..50 {
            if released.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(released.load(Ordering::SeqCst));
    }
}
