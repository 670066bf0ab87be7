//! HTTP surface of the aggregator.
//!
//! | method | path                    | response                         |
//! |--------|-------------------------|----------------------------------|
//! | GET    | `/ping`                 | `{"status": "pong"}`             |
//! | GET    | `/repos`                | every enriched repository        |
//! | GET    | `/repos/lang/{lang}`    | repositories containing `lang`   |
//! | GET    | `/repos/owner/{owner}`  | repositories owned by `owner`    |
//!
//! Failures are reported as `{"error": "..."}` with a status derived from
//! the error; a response never carries both `repositories` and `error`.

use crate::errors::AggregatorError;
use crate::filter::FilterSpec;
use crate::metrics_defs::{REQUEST_DURATION, REQUESTS_INFLIGHT};
use crate::model::RepositoriesResponse;
use crate::pipeline::Pipeline;
use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::service::Service;
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use shared::http::{json_response, make_json_error_response};
use shared::routing::{RouteMatch, RouteTable};
use shared::{gauge, histogram};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

pub type ServiceBody = BoxBody<Bytes, AggregatorError>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    Ping,
    AllRepositories,
    ByLanguage,
    ByOwner,
}

impl Endpoint {
    fn name(&self) -> &'static str {
        match self {
            Endpoint::Ping => "ping",
            Endpoint::AllRepositories => "repos",
            Endpoint::ByLanguage => "repos_lang",
            Endpoint::ByOwner => "repos_owner",
        }
    }

    fn filter(&self, route: &RouteMatch<'_, Endpoint>) -> FilterSpec {
        let kind = match self {
            Endpoint::ByLanguage => "lang",
            Endpoint::ByOwner => "owner",
            Endpoint::Ping | Endpoint::AllRepositories => return FilterSpec::None,
        };
        FilterSpec::from_parts(kind, route.param(kind).unwrap_or_default())
    }
}

/// Counts a request in `requests.inflight` for as long as it is alive,
/// including when hyper drops the response future early.
struct InflightGuard;

impl InflightGuard {
    fn new() -> Self {
        gauge!(REQUESTS_INFLIGHT).increment(1.0);
        Self
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        gauge!(REQUESTS_INFLIGHT).decrement(1.0);
    }
}

fn routes() -> RouteTable<Endpoint> {
    RouteTable::new()
        .route("/ping", Endpoint::Ping)
        .route("/repos", Endpoint::AllRepositories)
        .route("/repos/lang/{lang}", Endpoint::ByLanguage)
        .route("/repos/owner/{owner}", Endpoint::ByOwner)
}

struct Inner {
    pipeline: Pipeline,
    routes: RouteTable<Endpoint>,
}

#[derive(Clone)]
pub struct RepositoriesService {
    inner: Arc<Inner>,
}

impl RepositoriesService {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            inner: Arc::new(Inner {
                pipeline,
                routes: routes(),
            }),
        }
    }

    /// Resolves and answers one request. Never fails: errors become responses.
    pub async fn handle(&self, method: &Method, path: &str) -> Response<ServiceBody> {
        let Some(route) = self.inner.routes.resolve(path) else {
            tracing::debug!(%method, path, "No route matched");
            return make_json_error_response(StatusCode::NOT_FOUND, "not found");
        };
        let endpoint = *route.action;

        if method != Method::GET {
            return make_json_error_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");
        }

        let started = Instant::now();
        let inflight = InflightGuard::new();

        let result = match endpoint {
            Endpoint::Ping => {
                json_response(StatusCode::OK, &json!({"status": "pong"})).map_err(Into::into)
            }
            _ => self.repositories(endpoint.filter(&route)).await,
        };

        let response = result.unwrap_or_else(|e| {
            let status = e.status();
            if status.is_server_error() {
                tracing::error!(error = %e, route = endpoint.name(), "Request failed");
            }
            make_json_error_response(status, &e.to_string())
        });

        drop(inflight);
        histogram!(
            REQUEST_DURATION,
            "route" => endpoint.name(),
            "status" => response.status().as_u16().to_string()
        )
        .record(started.elapsed().as_secs_f64());

        response
    }

    async fn repositories(
        &self,
        filter: FilterSpec,
    ) -> Result<Response<ServiceBody>, AggregatorError> {
        let enriched = self.inner.pipeline.run().await?;
        let response = RepositoriesResponse {
            repositories: filter.apply(enriched),
        };
        Ok(json_response(StatusCode::OK, &response)?)
    }
}

impl Service<Request<Incoming>> for RepositoriesService {
    type Response = Response<ServiceBody>;
    type Error = AggregatorError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let service = self.clone();
        Box::pin(async move { Ok(service.handle(req.method(), req.uri().path()).await) })
    }
}
