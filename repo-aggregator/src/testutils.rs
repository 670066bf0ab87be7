use crate::errors::UpstreamError;
use crate::model::{DetailPayload, PrimaryItem};
use crate::upstream::Upstream;
use async_trait::async_trait;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::{TokioExecutor, TokioIo};
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

pub struct MockRequest {
    pub path: String,
    pub headers: HeaderMap,
}

pub struct MockResponse {
    status: StatusCode,
    body: Bytes,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self::raw(StatusCode::OK, value.to_string())
    }

    pub fn status(status: StatusCode) -> Self {
        Self::raw(status, "{}")
    }

    pub fn raw(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

pub struct MockServer {
    port: u16,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockServer {
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}{}", self.port, path)).unwrap()
    }

    /// Paths received so far, in arrival order.
    pub fn request_paths(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

/// Start a mock HTTP server that answers every request with `response_fn`
pub async fn start_mock_server<F>(response_fn: F) -> MockServer
where
    F: Fn(&MockRequest) -> MockResponse + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let response_fn = Arc::new(response_fn);
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        loop {
            let (stream, _) = listener.accept().await.unwrap();
            let io = TokioIo::new(stream);
            let response_fn = response_fn.clone();
            let recorded = recorded.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let mock_request = MockRequest {
                        path: req.uri().path().to_string(),
                        headers: req.headers().clone(),
                    };
                    recorded.lock().unwrap().push(mock_request.path.clone());
                    let mock_response = (*response_fn)(&mock_request);

                    async move {
                        let mut response = Response::new(Full::new(mock_response.body));
                        *response.status_mut() = mock_response.status;
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new())
                    .serve_connection(io, service)
                    .await;
            });
        }
    });

    MockServer { port, requests }
}

/// How a fake detail fetch fails.
#[derive(Clone, Copy, Debug)]
pub enum FakeFailure {
    Status(StatusCode),
    /// The upstream answered with a body that is not a language map.
    Decode,
}

impl FakeFailure {
    fn into_error(self) -> UpstreamError {
        match self {
            FakeFailure::Status(status) => UpstreamError::Status(status),
            FakeFailure::Decode => {
                match serde_json::from_str::<DetailPayload>("[\"not\", \"a map\"]") {
                    Err(e) => UpstreamError::Decode(e),
                    Ok(_) => unreachable!("a JSON array never decodes into a map"),
                }
            }
        }
    }
}

struct FakeDetail {
    delay: Duration,
    outcome: Result<DetailPayload, FakeFailure>,
}

/// In-memory `Upstream` with per-item latency and failures.
///
/// Tracks how many detail fetches are in flight, the peak of that number, and
/// how many ran to completion.
#[derive(Default)]
pub struct FakeUpstream {
    items: Vec<PrimaryItem>,
    details: HashMap<String, FakeDetail>,
    list_error: Option<StatusCode>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    completed: AtomicUsize,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(self, full_name: &str, languages: &[(&str, u64)], delay: Duration) -> Self {
        let payload = languages
            .iter()
            .map(|(label, bytes)| (label.to_string(), *bytes))
            .collect();
        self.push(full_name, delay, Ok(payload))
    }

    pub fn with_failing_item(self, full_name: &str, status: StatusCode, delay: Duration) -> Self {
        self.push(full_name, delay, Err(FakeFailure::Status(status)))
    }

    pub fn with_undecodable_item(self, full_name: &str, delay: Duration) -> Self {
        self.push(full_name, delay, Err(FakeFailure::Decode))
    }

    pub fn with_list_error(mut self, status: StatusCode) -> Self {
        self.list_error = Some(status);
        self
    }

    fn push(
        mut self,
        full_name: &str,
        delay: Duration,
        outcome: Result<DetailPayload, FakeFailure>,
    ) -> Self {
        self.items.push(test_item(full_name));
        self.details
            .insert(full_name.to_string(), FakeDetail { delay, outcome });
        self
    }

    pub fn items(&self) -> Vec<PrimaryItem> {
        self.items.clone()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn list_items(&self) -> Result<Vec<PrimaryItem>, UpstreamError> {
        match self.list_error {
            Some(status) => Err(UpstreamError::Status(status)),
            None => Ok(self.items.clone()),
        }
    }

    async fn fetch_details(&self, item: &PrimaryItem) -> Result<DetailPayload, UpstreamError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(&self.in_flight);
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let detail = &self.details[&item.full_name];
        tokio::time::sleep(detail.delay).await;
        self.completed.fetch_add(1, Ordering::SeqCst);

        detail.outcome.clone().map_err(FakeFailure::into_error)
    }
}

/// A primary item owned by the part of `full_name` before the slash.
pub fn test_item(full_name: &str) -> PrimaryItem {
    let (owner, name) = full_name.split_once('/').unwrap();
    PrimaryItem {
        full_name: full_name.to_string(),
        owner_login: owner.to_string(),
        name: name.to_string(),
        detail_url: Url::parse(&format!("http://fake.invalid/repos/{full_name}/languages"))
            .unwrap(),
    }
}

#[derive(Default)]
struct RecordedGauge {
    // (current, peak)
    state: Mutex<(f64, f64)>,
}

impl RecordedGauge {
    fn adjust(&self, delta: f64) {
        let mut state = self.state.lock().unwrap();
        state.0 += delta;
        state.1 = state.1.max(state.0);
    }
}

impl metrics::GaugeFn for RecordedGauge {
    fn increment(&self, value: f64) {
        self.adjust(value);
    }

    fn decrement(&self, value: f64) {
        self.adjust(-value);
    }

    fn set(&self, value: f64) {
        let mut state = self.state.lock().unwrap();
        *state = (value, state.1.max(value));
    }
}

/// Metrics recorder that keeps gauge values by name and ignores the rest.
/// Install it with `metrics::with_local_recorder`.
#[derive(Default)]
pub struct GaugeRecorder {
    gauges: Mutex<HashMap<String, Arc<RecordedGauge>>>,
}

impl GaugeRecorder {
    fn gauge(&self, name: &str) -> Arc<RecordedGauge> {
        self.gauges
            .lock()
            .unwrap()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    pub fn value(&self, name: &str) -> f64 {
        self.gauge(name).state.lock().unwrap().0
    }

    pub fn peak(&self, name: &str) -> f64 {
        self.gauge(name).state.lock().unwrap().1
    }
}

impl metrics::Recorder for GaugeRecorder {
    fn describe_counter(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}

    fn describe_gauge(&self, _: metrics::KeyName, _: Option<metrics::Unit>, _: metrics::SharedString) {}

    fn describe_histogram(
        &self,
        _: metrics::KeyName,
        _: Option<metrics::Unit>,
        _: metrics::SharedString,
    ) {
    }

    fn register_counter(&self, _: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Counter {
        metrics::Counter::noop()
    }

    fn register_gauge(&self, key: &metrics::Key, _: &metrics::Metadata<'_>) -> metrics::Gauge {
        metrics::Gauge::from_arc(self.gauge(key.name()))
    }

    fn register_histogram(
        &self,
        _: &metrics::Key,
        _: &metrics::Metadata<'_>,
    ) -> metrics::Histogram {
        metrics::Histogram::noop()
    }
}
