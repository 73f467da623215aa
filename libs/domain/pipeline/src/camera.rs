//! Camera adapters. Driver details (V4L2/USB, RTSP/IP, CSI ribbon) are
//! explicitly out of scope; this module supplies the single-writer/
//! single-reader latest-frame slot and thread lifecycle, while the actual
//! byte production is dependency-injected as an opaque `RawFrameSource` —
//! the same "caller supplies the real function, we supply the contract"
//! split used for `Detector` and `Embedder`.

use crate::frame::Frame;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("camera already open")]
    AlreadyOpen,
    #[error("camera not open")]
    NotOpen,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
}

/// Produces one raw frame per call; blocking is fine, it runs on its own
/// thread. Supplied by the composition root — no concrete V4L2/RTSP/CSI
/// client ships in this crate.
pub trait RawFrameSource: Send + 'static {
    fn capture(&mut self) -> Result<Frame, CameraError>;
}

impl<F> RawFrameSource for F
where
    F: FnMut() -> Result<Frame, CameraError> + Send + 'static,
{
    fn capture(&mut self) -> Result<Frame, CameraError> {
        (self)()
    }
}

pub trait CameraSource: Send {
    fn open(&mut self) -> Result<(), CameraError>;
    fn read_latest_frame(&self) -> Option<Frame>;
    fn release(&mut self);
    fn is_open(&self) -> bool;
}

struct CaptureWorker {
    slot: Arc<Mutex<Option<Frame>>>,
    running: Arc<Mutex<bool>>,
    handle: Option<JoinHandle<()>>,
}

impl CaptureWorker {
    fn start(mut source: Box<dyn RawFrameSource>, poll_interval: Duration) -> Self {
        let slot = Arc::new(Mutex::new(None));
        let running = Arc::new(Mutex::new(true));

        let slot_writer = Arc::clone(&slot);
        let running_flag = Arc::clone(&running);
        let handle = std::thread::spawn(move || {
            while *running_flag.lock().expect("capture running flag poisoned") {
                match source.capture() {
                    Ok(frame) => {
                        *slot_writer.lock().expect("frame slot poisoned") = Some(frame);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "camera capture failed");
                    }
                }
                std::thread::sleep(poll_interval);
            }
        });

        CaptureWorker {
            slot,
            running,
            handle: Some(handle),
        }
    }

    fn latest(&self) -> Option<Frame> {
        self.slot.lock().expect("frame slot poisoned").clone()
    }

    fn stop(&mut self) {
        *self.running.lock().expect("capture running flag poisoned") = false;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for CaptureWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Generic threaded camera: wraps whatever `RawFrameSource` the composition
/// root injects for a given backend label, used by all three `CameraBackend`
/// variants.
struct ThreadedCamera {
    label: &'static str,
    source_factory: Option<Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send>>,
    poll_interval: Duration,
    worker: Option<CaptureWorker>,
}

impl ThreadedCamera {
    fn new(
        label: &'static str,
        poll_interval: Duration,
        source_factory: Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send>,
    ) -> Self {
        ThreadedCamera {
            label,
            source_factory: Some(source_factory),
            poll_interval,
            worker: None,
        }
    }
}

impl CameraSource for ThreadedCamera {
    fn open(&mut self) -> Result<(), CameraError> {
        if self.worker.is_some() {
            return Err(CameraError::AlreadyOpen);
        }
        let factory = self
            .source_factory
            .take()
            .ok_or(CameraError::AlreadyOpen)?;
        tracing::info!(backend = self.label, "opening camera");
        self.worker = Some(CaptureWorker::start(factory(), self.poll_interval));
        Ok(())
    }

    fn read_latest_frame(&self) -> Option<Frame> {
        self.worker.as_ref().and_then(CaptureWorker::latest)
    }

    fn release(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            tracing::info!(backend = self.label, "releasing camera");
            worker.stop();
        }
    }

    fn is_open(&self) -> bool {
        self.worker.is_some()
    }
}

/// Closed sum type over the three supported physical transports. No
/// subtyping: selecting a backend is a config-time decision, not a runtime
/// plugin lookup.
pub enum CameraBackend {
    Usb(ThreadedCamera),
    Ip(ThreadedCamera),
    Csi(ThreadedCamera),
}

impl CameraBackend {
    pub fn usb(source_factory: Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send>) -> Self {
        CameraBackend::Usb(ThreadedCamera::new(
            "usb",
            Duration::from_millis(33),
            source_factory,
        ))
    }

    pub fn ip(source_factory: Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send>) -> Self {
        CameraBackend::Ip(ThreadedCamera::new(
            "ip",
            Duration::from_millis(33),
            source_factory,
        ))
    }

    pub fn csi(source_factory: Box<dyn FnOnce() -> Box<dyn RawFrameSource> + Send>) -> Self {
        CameraBackend::Csi(ThreadedCamera::new(
            "csi",
            Duration::from_millis(33),
            source_factory,
        ))
    }

    fn inner(&self) -> &ThreadedCamera {
        match self {
            CameraBackend::Usb(c) | CameraBackend::Ip(c) | CameraBackend::Csi(c) => c,
        }
    }

    fn inner_mut(&mut self) -> &mut ThreadedCamera {
        match self {
            CameraBackend::Usb(c) | CameraBackend::Ip(c) | CameraBackend::Csi(c) => c,
        }
    }
}

impl CameraSource for CameraBackend {
    fn open(&mut self) -> Result<(), CameraError> {
        self.inner_mut().open()
    }

    fn read_latest_frame(&self) -> Option<Frame> {
        self.inner().read_latest_frame()
    }

    fn release(&mut self) {
        self.inner_mut().release()
    }

    fn is_open(&self) -> bool {
        self.inner().is_open()
    }
}
