use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use image::RgbaImage;
use serde::Serialize;

use crate::geometry::ImageSize;
use crate::registry::SpriteId;

const DECODE_WORKER_QUEUE_DEPTH: usize = 16;

/// Identity of one raster inside the loaded project (its archive filename).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ImageKey(String);

impl ImageKey {
    pub fn new(filename: impl Into<String>) -> Self {
        Self(filename.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ImageKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ImageKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub key: ImageKey,
    pub size: ImageSize,
    pub pixels: Arc<RgbaImage>,
}

/// Who is waiting on a decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageWaiter {
    Sprite(SpriteId),
    Canvas,
}

pub struct DecodeJob {
    pub key: ImageKey,
    pub bytes: Arc<[u8]>,
    pub generation: u64,
}

pub struct DecodeResult {
    pub key: ImageKey,
    pub generation: u64,
    pub data: Result<DecodedImage>,
}

pub fn decode_image(key: &ImageKey, bytes: &[u8]) -> Result<DecodedImage> {
    let decoded =
        image::load_from_memory(bytes).with_context(|| format!("Failed to decode image '{key}'"))?;
    let pixels = decoded.to_rgba8();
    let size = ImageSize::new(pixels.width(), pixels.height());
    if size.is_empty() {
        anyhow::bail!("Image '{key}' has no pixels");
    }
    Ok(DecodedImage { key: key.clone(), size, pixels: Arc::new(pixels) })
}

fn run_decode_job(job: DecodeJob) -> DecodeResult {
    let data = decode_image(&job.key, &job.bytes);
    DecodeResult { key: job.key, generation: job.generation, data }
}

pub struct ImageDecodeWorker {
    senders: Vec<mpsc::SyncSender<DecodeJob>>,
    next_sender: AtomicUsize,
    rx: mpsc::Receiver<DecodeResult>,
}

impl ImageDecodeWorker {
    pub fn new(worker_count: Option<usize>) -> Option<Self> {
        let worker_count = worker_count
            .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get().clamp(2, 4)).unwrap_or(2));
        if worker_count == 0 {
            return None;
        }
        let (result_tx, result_rx) = mpsc::channel();
        let mut senders = Vec::with_capacity(worker_count);
        for index in 0..worker_count {
            let (tx, rx) = mpsc::sync_channel::<DecodeJob>(DECODE_WORKER_QUEUE_DEPTH);
            let thread_result_tx = result_tx.clone();
            if let Err(err) = thread::Builder::new().name(format!("image-decode-{index}")).spawn(move || {
                while let Ok(job) = rx.recv() {
                    if thread_result_tx.send(run_decode_job(job)).is_err() {
                        break;
                    }
                }
            }) {
                log::warn!("[images] failed to spawn decode worker thread: {err}");
                return None;
            }
            senders.push(tx);
        }
        Some(Self { senders, next_sender: AtomicUsize::new(0), rx: result_rx })
    }

    pub fn submit(&self, job: DecodeJob) -> std::result::Result<(), DecodeJob> {
        if self.senders.is_empty() {
            return Err(job);
        }
        let len = self.senders.len();
        let mut job = job;
        let start = self.next_sender.fetch_add(1, AtomicOrdering::Relaxed) % len;
        for offset in 0..len {
            match self.senders[(start + offset) % len].try_send(job) {
                Ok(()) => return Ok(()),
                Err(mpsc::TrySendError::Full(returned)) | Err(mpsc::TrySendError::Disconnected(returned)) => {
                    job = returned;
                }
            }
        }
        Err(job)
    }

    pub fn drain(&self) -> Vec<DecodeResult> {
        let mut results = Vec::new();
        while let Ok(result) = self.rx.try_recv() {
            results.push(result);
        }
        results
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<DecodeResult> {
        self.rx.recv_timeout(timeout).ok()
    }
}

/// A resolved decode and everyone who was waiting on it.
#[derive(Debug)]
pub struct ImageCompletion {
    pub key: ImageKey,
    pub waiters: Vec<ImageWaiter>,
    pub outcome: std::result::Result<ImageSize, String>,
}

/// Decoded-image cache plus per-key continuations.
///
/// Every request carries the loader's generation. `reset` bumps it, so results that belong to a
/// previous project are dropped when they arrive.
pub struct ImageLoader {
    worker: Option<ImageDecodeWorker>,
    generation: u64,
    cache: HashMap<ImageKey, DecodedImage>,
    waiters: HashMap<ImageKey, Vec<ImageWaiter>>,
    outstanding: HashMap<ImageKey, usize>,
    ready: VecDeque<DecodeResult>,
}

impl ImageLoader {
    pub fn new(worker_count: Option<usize>) -> Self {
        let worker = ImageDecodeWorker::new(worker_count);
        if worker.is_none() {
            log::info!("[images] decoding inline");
        }
        Self::with_worker(worker)
    }

    pub fn inline() -> Self {
        Self::with_worker(None)
    }

    fn with_worker(worker: Option<ImageDecodeWorker>) -> Self {
        Self {
            worker,
            generation: 0,
            cache: HashMap::new(),
            waiters: HashMap::new(),
            outstanding: HashMap::new(),
            ready: VecDeque::new(),
        }
    }

    pub fn get(&self, key: &ImageKey) -> Option<&DecodedImage> {
        self.cache.get(key)
    }

    pub fn size_of(&self, key: &ImageKey) -> Option<ImageSize> {
        self.cache.get(key).map(|image| image.size)
    }

    pub fn pending(&self) -> usize {
        self.outstanding.values().sum()
    }

    pub fn is_idle(&self) -> bool {
        self.pending() == 0
    }

    /// Queues `waiter` on `key`, starting a decode unless one is already in flight.
    pub fn request(&mut self, key: ImageKey, bytes: Arc<[u8]>, waiter: ImageWaiter) {
        let list = self.waiters.entry(key.clone()).or_default();
        if !list.contains(&waiter) {
            list.push(waiter);
        }
        if self.outstanding.get(&key).copied().unwrap_or(0) == 0 {
            self.submit(key, bytes);
        }
    }

    /// Starts a fresh decode of `key`; the result overwrites the cached image and settles `waiters`.
    pub fn redecode(&mut self, key: ImageKey, bytes: Arc<[u8]>, waiters: impl IntoIterator<Item = ImageWaiter>) {
        let list = self.waiters.entry(key.clone()).or_default();
        for waiter in waiters {
            if !list.contains(&waiter) {
                list.push(waiter);
            }
        }
        self.submit(key, bytes);
    }

    fn submit(&mut self, key: ImageKey, bytes: Arc<[u8]>) {
        *self.outstanding.entry(key.clone()).or_insert(0) += 1;
        let job = DecodeJob { key, bytes, generation: self.generation };
        let job = match self.worker.as_ref() {
            Some(worker) => match worker.submit(job) {
                Ok(()) => return,
                Err(job) => {
                    log::debug!("[images] decode queue full for '{}', decoding inline", job.key);
                    job
                }
            },
            None => job,
        };
        self.ready.push_back(run_decode_job(job));
    }

    pub fn poll(&mut self) -> Vec<ImageCompletion> {
        let mut results: Vec<DecodeResult> = self.ready.drain(..).collect();
        if let Some(worker) = self.worker.as_ref() {
            results.extend(worker.drain());
        }
        results.into_iter().filter_map(|result| self.resolve(result)).collect()
    }

    /// Blocks until every outstanding decode resolved or `timeout` elapsed.
    pub fn wait(&mut self, timeout: Duration) -> Vec<ImageCompletion> {
        let deadline = Instant::now() + timeout;
        let mut completions = self.poll();
        while !self.is_idle() {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let Some(worker) = self.worker.as_ref() else {
                break;
            };
            let Some(result) = worker.recv_timeout(deadline - now) else {
                break;
            };
            completions.extend(self.resolve(result));
        }
        completions
    }

    fn resolve(&mut self, result: DecodeResult) -> Option<ImageCompletion> {
        if result.generation != self.generation {
            log::debug!("[images] dropping stale decode of '{}'", result.key);
            return None;
        }
        if let Some(count) = self.outstanding.get_mut(&result.key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.outstanding.remove(&result.key);
            }
        }
        let waiters = self.waiters.remove(&result.key).unwrap_or_default();
        let outcome = match result.data {
            Ok(image) => {
                let size = image.size;
                self.cache.insert(result.key.clone(), image);
                Ok(size)
            }
            Err(err) => {
                log::warn!("[images] {err:#}");
                Err(format!("{err:#}"))
            }
        };
        Some(ImageCompletion { key: result.key, waiters, outcome })
    }

    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.cache.clear();
        self.waiters.clear();
        self.outstanding.clear();
        self.ready.clear();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{ImageFormat, Rgba};
    use std::io::Cursor;

    pub(crate) fn png_bytes(width: u32, height: u32) -> Arc<[u8]> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 40, 255]));
        let mut out = Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png).expect("encode png");
        Arc::from(out.into_inner())
    }

    #[test]
    fn decode_reports_size_and_rejects_garbage() {
        let key = ImageKey::from("wrench.png");
        let image = decode_image(&key, &png_bytes(32, 16)).expect("png decodes");
        assert_eq!(image.size, ImageSize::new(32, 16));
        assert!(decode_image(&ImageKey::from("art.xcf"), b"gimp xcf v011").is_err());
    }

    #[test]
    fn inline_loader_resolves_all_waiters_once() {
        let mut loader = ImageLoader::inline();
        let key = ImageKey::from("a.png");
        let first = SpriteId::new();
        let second = SpriteId::new();
        loader.request(key.clone(), png_bytes(8, 8), ImageWaiter::Sprite(first));
        loader.request(key.clone(), png_bytes(8, 8), ImageWaiter::Sprite(second));
        loader.request(key.clone(), png_bytes(8, 8), ImageWaiter::Canvas);
        let completions = loader.poll();
        assert_eq!(completions.len(), 1);
        let completion = &completions[0];
        assert_eq!(completion.outcome, Ok(ImageSize::new(8, 8)));
        assert_eq!(completion.waiters.len(), 3);
        assert!(loader.is_idle());
        assert!(loader.poll().is_empty());
    }

    #[test]
    fn threaded_loader_delivers_failures_independently() {
        let mut loader = ImageLoader::new(Some(2));
        loader.request(ImageKey::from("good.png"), png_bytes(4, 4), ImageWaiter::Canvas);
        loader.request(ImageKey::from("bad.png"), Arc::from(&b"nope"[..]), ImageWaiter::Sprite(SpriteId::new()));
        let completions = loader.wait(Duration::from_secs(10));
        assert_eq!(completions.len(), 2);
        let good = completions.iter().find(|c| c.key.as_str() == "good.png").expect("good result");
        assert!(good.outcome.is_ok());
        let bad = completions.iter().find(|c| c.key.as_str() == "bad.png").expect("bad result");
        assert!(bad.outcome.is_err());
        assert!(loader.get(&ImageKey::from("good.png")).is_some());
        assert!(loader.get(&ImageKey::from("bad.png")).is_none());
    }

    #[test]
    fn reset_discards_in_flight_results() {
        let mut loader = ImageLoader::new(Some(1));
        loader.request(ImageKey::from("old.png"), png_bytes(4, 4), ImageWaiter::Canvas);
        loader.reset();
        assert!(loader.is_idle());
        std::thread::sleep(Duration::from_millis(200));
        assert!(loader.poll().is_empty());
        assert!(loader.get(&ImageKey::from("old.png")).is_none());
    }

    #[test]
    fn redecode_overwrites_cached_image() {
        let mut loader = ImageLoader::inline();
        let key = ImageKey::from("sheet.png");
        loader.request(key.clone(), png_bytes(16, 16), ImageWaiter::Canvas);
        loader.poll();
        loader.redecode(key.clone(), png_bytes(64, 32), []);
        let completions = loader.poll();
        assert!(completions[0].waiters.is_empty());
        assert_eq!(loader.size_of(&key), Some(ImageSize::new(64, 32)));
    }
}
