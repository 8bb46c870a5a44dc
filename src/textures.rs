//! Photo textures: URI resolution, decoding and background loading.
//!
//! Photos reference their images by URI. Local files (`file://` URIs or
//! bare paths) and `http(s)://` URLs are supported. Loading happens on a
//! worker thread; the render loop polls for finished images once per frame
//! and uploads them, showing a flat placeholder until then.
//!
//! ```ignore
//! let mut loader = TextureLoader::spawn()?;
//! loader.request("file:///home/me/photo.jpg");
//!
//! // every frame:
//! for (uri, image) in loader.poll() {
//!     renderer.upload_photo(&uri, &image);
//! }
//! ```
//!
//! Failed loads are logged and never retried.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use crate::assets::{self, AssetSource};
use crate::error::AssetError;

/// Decoded RGBA8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    /// Raw RGBA pixel data (width * height * 4 bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl ImageData {
    /// Wrap raw RGBA data.
    ///
    /// # Panics
    ///
    /// Panics if `data` is not `width * height * 4` bytes.
    pub fn from_rgba(data: Vec<u8>, width: u32, height: u32) -> Self {
        assert_eq!(
            data.len(),
            (width * height * 4) as usize,
            "RGBA data size mismatch"
        );
        Self { data, width, height }
    }

    /// A 1x1 image of one color.
    pub fn solid(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            data: vec![r, g, b, a],
            width: 1,
            height: 1,
        }
    }

    /// 1x1 image from an sRGB hex color.
    pub fn solid_hex(hex: u32) -> Self {
        Self::solid((hex >> 16) as u8, (hex >> 8) as u8, hex as u8, 255)
    }

    /// Decode PNG or JPEG bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, AssetError> {
        let img = image::load_from_memory(bytes)?.into_rgba8();
        let (width, height) = img.dimensions();
        Ok(Self {
            data: img.into_raw(),
            width,
            height,
        })
    }

    /// Fetch and decode.
    pub fn load(source: &AssetSource, agent: &ureq::Agent) -> Result<Self, AssetError> {
        Self::decode(&source.fetch(agent)?)
    }
}

/// Load progress of one URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Pending,
    Ready,
    Failed,
}

type LoadResult = (String, Result<ImageData, AssetError>);

/// Background image loader with a per-URI state cache.
pub struct TextureLoader {
    requests: Sender<String>,
    results: Receiver<LoadResult>,
    states: HashMap<String, LoadState>,
}

impl TextureLoader {
    /// Start the worker thread.
    pub fn spawn() -> Result<Self, AssetError> {
        let (request_tx, request_rx) = mpsc::channel::<String>();
        let (result_tx, result_rx) = mpsc::channel::<LoadResult>();

        // The worker ends when the loader (and with it the request channel) is dropped.
        std::thread::Builder::new()
            .name("texture-loader".into())
            .spawn(move || {
                let agent = assets::http_agent();
                for uri in request_rx {
                    let result = AssetSource::parse(&uri).and_then(|source| ImageData::load(&source, &agent));
                    if result_tx.send((uri, result)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: request_tx,
            results: result_rx,
            states: HashMap::new(),
        })
    }

    /// Queue a URI unless it is already known. Returns its current state.
    pub fn request(&mut self, uri: &str) -> LoadState {
        if let Some(state) = self.states.get(uri) {
            return *state;
        }
        let state = if self.requests.send(uri.to_string()).is_ok() {
            LoadState::Pending
        } else {
            log::warn!("texture loader is gone, {} keeps its placeholder", uri);
            LoadState::Failed
        };
        self.states.insert(uri.to_string(), state);
        state
    }

    pub fn state(&self, uri: &str) -> Option<LoadState> {
        self.states.get(uri).copied()
    }

    /// Drop what is known about a URI whose texture was released, so the
    /// next `request` loads it again. Failed URIs stay failed.
    pub fn forget(&mut self, uri: &str) {
        if self.states.get(uri) != Some(&LoadState::Failed) {
            self.states.remove(uri);
        }
    }

    /// Drain finished loads. Returns the images that loaded successfully.
    pub fn poll(&mut self) -> Vec<(String, ImageData)> {
        let mut ready = Vec::new();
        while let Ok(result) = self.results.try_recv() {
            self.apply(result, &mut ready);
        }
        ready
    }

    /// Block until every queued request has finished or `timeout` passes.
    pub fn wait(&mut self, timeout: Duration) -> Vec<(String, ImageData)> {
        let deadline = std::time::Instant::now() + timeout;
        let mut ready = Vec::new();
        while self.states.values().any(|s| *s == LoadState::Pending) {
            let remaining = deadline.saturating_duration_since(std::time::Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.results.recv_timeout(remaining) {
                Ok(result) => self.apply(result, &mut ready),
                Err(_) => break,
            }
        }
        ready.extend(self.poll());
        ready
    }

    fn apply(&mut self, (uri, result): LoadResult, ready: &mut Vec<(String, ImageData)>) {
        // Forgotten while in flight.
        if !self.states.contains_key(&uri) {
            return;
        }
        match result {
            Ok(image) => {
                log::info!("loaded {} ({}x{})", uri, image.width, image.height);
                self.states.insert(uri.clone(), LoadState::Ready);
                ready.push((uri, image));
            }
            Err(e) => {
                log::warn!("failed to load {}: {}", uri, e);
                self.states.insert(uri, LoadState::Failed);
            }
        }
    }
}
