// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Single-route HTTP responder announcing which release served the request.

use crate::config::Config;
use crate::error::Result;
use crate::types::Release;
use bytes::Bytes;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, info, instrument, warn};

/// Build the response for a request. Only `/` exists; it answers GET and HEAD.
pub fn respond<B>(release: Release, req: &Request<B>) -> Response<Full<Bytes>> {
    if req.uri().path() != "/" {
        return status_only(StatusCode::NOT_FOUND);
    }

    match *req.method() {
        Method::GET | Method::HEAD => {
            let body = Bytes::from_static(release.body().as_bytes());
            let mut response = Response::new(Full::new(body));
            response.headers_mut().insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            response
        }
        _ => {
            let mut response = status_only(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            response
        }
    }
}

fn status_only(status: StatusCode) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = status;
    response
}

/// Accept connections on `listener` until `shutdown` resolves.
/// Pause after a failed accept, e.g. when the process is out of file descriptors
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

async fn back_off_after_accept_error(e: std::io::Error) {
    warn!("Failed to accept connection: {}", e);
    tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
}

/// Each connection is served on its own task; its errors never stop the loop.
#[instrument(skip(listener, shutdown))]
pub async fn serve(
    release: Release,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("{} responder listening on {}", release, addr);

    tokio::pin!(shutdown);

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    back_off_after_accept_error(e).await;
                    continue;
                }
            },
            _ = &mut shutdown => {
                info!("Shutdown requested, {} responder stops accepting connections", release);
                return Ok(());
            }
        };

        tokio::spawn(async move {
            let service = service_fn(move |req: Request<Incoming>| async move {
                debug!("{} {}", req.method(), req.uri());
                Ok::<_, Infallible>(respond(release, &req))
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Connection from {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Bind the configured address and serve until ctrl-c.
pub async fn run(release: Release, config: &Config) -> Result<()> {
    let listener = TcpListener::bind(config.listen_addr).await?;

    serve(release, listener, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    })
    .await
}
