// Shared fixtures for asset tests

use super::registry::ResourceDescriptor;
use super::serialization::{DeserializationService, RonService};
use super::{AssetDescriptor, AssetError, AssetKind};
use crate::engine::renderer::backend::SharedBackend;
use crate::engine::renderer::headless::HeadlessBackend;
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Once;

/// A headless backend plus the same backend as a trait object
pub fn headless() -> (Rc<HeadlessBackend>, SharedBackend) {
    let headless = Rc::new(HeadlessBackend::new());
    let backend: SharedBackend = headless.clone();
    (headless, backend)
}

/// Temporary directory holding descriptor and image files
pub struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create temp dir"),
        }
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    fn ensure_parent(path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
    }

    /// Write a text file, creating parent directories
    pub fn write(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.path(relative);
        Self::ensure_parent(&path);
        std::fs::write(&path, contents).expect("failed to write fixture");
        path
    }

    /// Write a solid-colour PNG
    pub fn png(&self, relative: &str, width: u32, height: u32, color: [u8; 4]) -> PathBuf {
        let path = self.path(relative);
        Self::ensure_parent(&path);
        image::RgbaImage::from_pixel(width, height, image::Rgba(color))
            .save(&path)
            .expect("failed to write png fixture");
        path
    }

    /// Write `textures/<stem>.png` and a RON texture descriptor pointing at it
    pub fn texture(&self, stem: &str) -> PathBuf {
        self.png(&format!("textures/{}.png", stem), 2, 2, [200, 120, 40, 255]);
        self.write(
            &format!("textures/{}.ron", stem),
            &format!(r#"(name: "{}", source: "{}.png", filtering: Nearest)"#, stem, stem),
        )
    }
}

/// RON service that counts descriptor reads
pub struct CountingService {
    inner: RonService,
    calls: Cell<usize>,
}

impl CountingService {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            inner: RonService,
            calls: Cell::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl DeserializationService for CountingService {
    fn name(&self) -> &str {
        "counting"
    }

    fn deserialize(&self, kind: AssetKind, path: &Path) -> Result<AssetDescriptor, AssetError> {
        self.calls.set(self.calls.get() + 1);
        self.inner.deserialize(kind, path)
    }

    fn deserialize_resources(
        &self,
        path: &Path,
    ) -> Result<HashMap<String, ResourceDescriptor>, AssetError> {
        self.inner.deserialize_resources(path)
    }
}

thread_local! {
    static CAPTURED: RefCell<Option<Vec<(Level, String)>>> = const { RefCell::new(None) };
}

/// Records log records for threads that are currently capturing
struct CaptureLogger;

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        CAPTURED.with(|captured| {
            if let Some(records) = captured.borrow_mut().as_mut() {
                records.push((record.level(), record.args().to_string()));
            }
        });
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static INSTALL: Once = Once::new();

/// Run `f` and return its result with the log records it emitted on this thread
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<(Level, String)>) {
    INSTALL.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(LevelFilter::Trace);
        }
    });

    CAPTURED.with(|captured| *captured.borrow_mut() = Some(Vec::new()));
    let result = f();
    let records = CAPTURED
        .with(|captured| captured.borrow_mut().take())
        .unwrap_or_default();
    (result, records)
}

/// Run `f` and count the warnings it logged on this thread
pub fn capture_warnings<R>(f: impl FnOnce() -> R) -> (R, usize) {
    let (result, records) = capture_logs(f);
    let warnings = records
        .iter()
        .filter(|(level, _)| *level == Level::Warn)
        .count();
    (result, warnings)
}
