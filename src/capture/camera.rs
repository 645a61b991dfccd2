use std::{
    io::Cursor,
    sync::{Arc, Mutex, MutexGuard},
};

use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, ImageFormat};
use log::{info, warn};

/// A webcam that stays open for the length of a capture schedule.
pub trait CameraDevice: Send + 'static {
    fn open(&mut self) -> Result<()>;
    fn read_frame(&mut self) -> Result<DynamicImage>;
    fn release(&mut self);
}

pub trait ScreenSource: Send + Sync + 'static {
    fn capture(&self) -> Result<DynamicImage>;
}

/// Owns an opened camera and releases it when dropped, however the owner exits.
pub struct CameraGuard {
    device: Arc<Mutex<Box<dyn CameraDevice>>>,
}

impl CameraGuard {
    pub fn open(mut device: Box<dyn CameraDevice>) -> Result<Self> {
        device.open().context("failed to open camera")?;
        info!("Camera opened");
        Ok(Self {
            device: Arc::new(Mutex::new(device)),
        })
    }

    /// Reads one frame on the blocking pool.
    pub async fn read_frame(&self) -> Result<DynamicImage> {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || lock(&device).read_frame())
            .await
            .context("camera read worker join failed")?
    }
}

impl Drop for CameraGuard {
    fn drop(&mut self) {
        lock(&self.device).release();
        info!("Camera released");
    }
}

fn lock(device: &Mutex<Box<dyn CameraDevice>>) -> MutexGuard<'_, Box<dyn CameraDevice>> {
    match device.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("camera mutex poisoned by a panicking reader, recovering");
            poisoned.into_inner()
        }
    }
}

pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, ImageFormat::Png)
        .map_err(|err| anyhow!("PNG encoding failed: {err}"))?;
    Ok(bytes.into_inner())
}
