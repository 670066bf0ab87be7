use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::service::Service;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Binds `host:port` without accepting yet, so callers can act once the
/// port is known to be ours.
pub async fn bind(host: &str, port: u16) -> std::io::Result<TcpListener> {
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "Listening");
    Ok(listener)
}

/// Accept loop over an already bound listener.
///
/// Each connection is handed to hyper on its own task. Stops accepting new
/// connections once `shutdown` resolves; in-flight connections are left to
/// finish on their own.
pub async fn serve<S, E>(
    listener: TcpListener,
    service: S,
    shutdown: impl Future<Output = ()>,
) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let service_arc = Arc::new(service);
    tokio::pin!(shutdown);

    loop {
        let (stream, _peer_addr) = tokio::select! {
            accepted = listener.accept() => accepted?,
            _ = &mut shutdown => {
                tracing::info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
        };
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        // Hand the connection to hyper; auto-detect h1/h2 on this socket
        tokio::spawn(async move {
            if let Err(e) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(error = %e, "Connection closed with error");
            }
        });
    }
}

/// Wraps bytes into a boxed body with an arbitrary error type.
pub fn full_body<E>(bytes: impl Into<Bytes>) -> BoxBody<Bytes, E> {
    Full::new(bytes.into()).map_err(|e| match e {}).boxed()
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

/// Serializes `value` as the JSON body of a response with the given status.
pub fn json_response<T, E>(
    status: StatusCode,
    value: &T,
) -> Result<Response<BoxBody<Bytes, E>>, serde_json::Error>
where
    T: Serialize + ?Sized,
{
    let bytes = serde_json::to_vec(value)?;
    let mut response = Response::new(full_body(bytes));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Ok(response)
}

/// A `{"error": message}` response.
pub fn make_json_error_response<E>(status: StatusCode, message: &str) -> Response<BoxBody<Bytes, E>> {
    match json_response(status, &ErrorBody { error: message }) {
        Ok(response) => response,
        // A struct with a single string field always serializes
        Err(_) => make_error_response(status),
    }
}

/// A plain-text response carrying the canonical reason of `status`.
pub fn make_error_response<E>(status: StatusCode) -> Response<BoxBody<Bytes, E>> {
    let reason = status.canonical_reason().unwrap_or("error");
    let mut response = Response::new(full_body(format!("{reason}\n")));
    *response.status_mut() = status;
    response
}
