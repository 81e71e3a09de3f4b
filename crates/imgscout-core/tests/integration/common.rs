use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use imgscout_core::{
    AppError, ImageExtractor, ImageFetcher, Orchestrator, PageRequest, RunConfig, RunEvent,
    RunReporter, Throttle, ThrottleConfig, Transport,
};

/// Transport serving fixed pages by URL. Unknown URLs answer with `status`.
#[derive(Clone)]
pub struct ScriptedTransport {
    pages: Arc<HashMap<String, String>>,
    status: u16,
    pub calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: Arc::new(
                pages
                    .iter()
                    .map(|(url, body)| (url.to_string(), body.to_string()))
                    .collect(),
            ),
            status: 404,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Transport for ScriptedTransport {
    async fn fetch(&self, request: &PageRequest) -> Result<Vec<u8>, AppError> {
        self.calls.lock().unwrap().push(request.url.clone());
        match self.pages.get(&request.url) {
            Some(body) => Ok(body.clone().into_bytes()),
            None => Err(AppError::from_status(self.status, &request.url)),
        }
    }

    async fn establish_session(&self, _request: &PageRequest) -> Result<(), AppError> {
        Ok(())
    }
}

/// Extracts the `content` of the first `data-image="..."` attribute.
#[derive(Clone)]
pub struct AttrExtractor;

impl ImageExtractor for AttrExtractor {
    fn extract(&self, content: &str) -> Result<Option<String>, AppError> {
        let Some(start) = content.find("data-image=\"") else {
            return Ok(None);
        };
        let rest = &content[start + "data-image=\"".len()..];
        Ok(rest.split('"').next().map(str::to_string))
    }
}

pub fn page_with_image(image: &str) -> String {
    format!("<html><body><img data-image=\"{image}\"></body></html>")
}

pub fn write_catalog(dir: &Path, urls: &[String]) -> PathBuf {
    let records: Vec<_> = urls
        .iter()
        .enumerate()
        .map(|(i, u)| serde_json::json!({ "name": format!("entity {i}"), "canonical_url": u }))
        .collect();
    let path = dir.join("catalog.json");
    fs::write(&path, serde_json::to_string_pretty(&records).unwrap()).unwrap();
    path
}

pub fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("http://x/{i}")).collect()
}

pub fn orchestrator(
    transport: ScriptedTransport,
    catalog: &Path,
    output: &Path,
) -> Orchestrator<ScriptedTransport, AttrExtractor> {
    let fetcher = ImageFetcher::new(
        transport,
        AttrExtractor,
        Throttle::new(ThrottleConfig::immediate()),
    );
    let config = RunConfig::new(catalog, output).with_warmup_pause(Duration::ZERO);
    Orchestrator::new(fetcher, config)
}

/// Reporter counting events by kind.
#[derive(Default)]
pub struct CountingReporter {
    pub cooldowns: Mutex<usize>,
    pub flushes: Mutex<Vec<usize>>,
}

impl RunReporter for CountingReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::Cooldown { .. } => *self.cooldowns.lock().unwrap() += 1,
            RunEvent::Flushed { completed, .. } => self.flushes.lock().unwrap().push(completed),
            _ => {}
        }
    }
}
