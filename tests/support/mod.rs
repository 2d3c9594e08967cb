//! Shared fixtures: a scripted in-memory transport and test configuration

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use streetview_survey::fetcher::retry_formatter::RetryErrorType;
use streetview_survey::fetcher::streetview_config::StreetViewConfig;
use streetview_survey::fetcher::{HttpResponse, HttpTransport, TransportError};

pub const IMAGE_URL: &str = "http://streetview.test/api/streetview";
pub const METADATA_URL: &str = "http://streetview.test/api/streetview/metadata";

/// One scripted answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, &'static [u8]),
    RateLimited(Option<&'static str>),
    Offline,
}

impl Reply {
    pub fn metadata(json: &'static str) -> Self {
        Reply::Status(200, json.as_bytes())
    }

    pub fn image() -> Self {
        Reply::Status(200, b"\xff\xd8\xff\xe0jpeg")
    }

    fn into_result(self) -> Result<HttpResponse, TransportError> {
        match self {
            Reply::Status(status, body) => Ok(HttpResponse::new(status, body)),
            Reply::RateLimited(retry_after) => {
                let response = HttpResponse::new(429, &b""[..]);
                Ok(match retry_after {
                    Some(value) => response.with_retry_after(value),
                    None => response,
                })
            }
            Reply::Offline => Err(TransportError::new(
                RetryErrorType::NetworkOffline,
                "connection refused",
            )),
        }
    }
}

/// A request the transport saw.
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub params: Vec<(String, String)>,
}

impl Call {
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

struct Route {
    queue: VecDeque<Reply>,
    fallback: Reply,
}

impl Route {
    fn next(&mut self) -> Reply {
        self.queue.pop_front().unwrap_or_else(|| self.fallback.clone())
    }
}

/// Routes metadata and image requests to separate scripts. Once a script's
/// queue is drained its fallback answers every further call.
pub struct MockTransport {
    metadata: Mutex<Route>,
    image: Mutex<Route>,
    calls: Mutex<Vec<Call>>,
}

impl MockTransport {
    /// Metadata answers OK without a pano id or location; images answer 200.
    pub fn new() -> Self {
        Self {
            metadata: Mutex::new(Route {
                queue: VecDeque::new(),
                fallback: Reply::metadata(r#"{"status":"OK"}"#),
            }),
            image: Mutex::new(Route {
                queue: VecDeque::new(),
                fallback: Reply::image(),
            }),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn metadata_fallback(self, reply: Reply) -> Self {
        self.metadata.lock().unwrap().fallback = reply;
        self
    }

    pub fn image_fallback(self, reply: Reply) -> Self {
        self.image.lock().unwrap().fallback = reply;
        self
    }

    pub fn then_metadata(self, reply: Reply) -> Self {
        self.metadata.lock().unwrap().queue.push_back(reply);
        self
    }

    pub fn then_image(self, reply: Reply) -> Self {
        self.image.lock().unwrap().queue.push_back(reply);
        self
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn image_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.url == IMAGE_URL)
            .collect()
    }

    pub fn metadata_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| call.url == METADATA_URL)
            .collect()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn get(
        &self,
        url: &str,
        params: &[(&str, String)],
        _timeout: Duration,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(Call {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(key, value)| (key.to_string(), value.clone()))
                .collect(),
        });

        let reply = if url == METADATA_URL {
            self.metadata.lock().unwrap().next()
        } else {
            self.image.lock().unwrap().next()
        };
        reply.into_result()
    }
}

pub fn test_config() -> StreetViewConfig {
    StreetViewConfig::new("test-key")
        .unwrap()
        .with_endpoints(IMAGE_URL, METADATA_URL)
}

/// Data rows of `downloads.csv`, header excluded.
pub fn ledger_rows(dir: &std::path::Path) -> Vec<Vec<String>> {
    let mut reader = csv::Reader::from_path(dir.join("downloads.csv")).unwrap();
    reader
        .records()
        .map(|record| record.unwrap().iter().map(str::to_string).collect())
        .collect()
}

/// Names of the `.jpg` files in `dir`, sorted.
pub fn image_files(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .filter_map(Result::ok)
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".jpg"))
        .collect();
    names.sort();
    names
}
