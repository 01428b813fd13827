use crate::adapter::{collect_parameters, header_list, request_meta};
use crate::collector::{Beacon, Collector};
use anyhow::{Context as AnyhowContext, Result};
use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;

/// 1x1 transparent GIF returned for every beacon.
pub const PIXEL_GIF: &[u8] = &[
    0x47, 0x49, 0x46, 0x38, 0x39, 0x61, 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00,
    0x00, 0xff, 0xff, 0xff, 0x21, 0xf9, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x2c, 0x00, 0x00,
    0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, 0x02, 0x02, 0x44, 0x01, 0x00, 0x3b,
];

/// Bodies larger than this are dropped and the beacon is handled as if none was sent.
pub const MAX_FORM_BODY_BYTES: usize = 10 << 20;

/// Every method and path lands on the beacon handler.
pub fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .fallback(beacon_handler)
        .layer(DefaultBodyLimit::disable())
        .with_state(collector)
}

pub async fn serve(listener: TcpListener, collector: Arc<Collector>) -> Result<()> {
    let app = router(collector);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Beacon listener stopped")?;
    Ok(())
}

async fn beacon_handler(
    State(collector): State<Arc<Collector>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let body = read_body(body, MAX_FORM_BODY_BYTES).await;
    let peer = connect_info.map(|ConnectInfo(addr)| addr);
    let beacon = Beacon {
        meta: request_meta(&method, &uri, &headers, peer),
        headers: header_list(&headers),
        params: collect_parameters(&method, &uri, &headers, &body),
    };

    let outcome = collector.process(beacon).await;
    if let Err(err) = write_report(&outcome.report) {
        log::warn!("Failed to write beacon report: {err}");
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "image/gif")],
        PIXEL_GIF,
    )
        .into_response()
}

async fn read_body(body: Body, limit: usize) -> Bytes {
    match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => {
            log::debug!("Ignoring beacon body: {err}");
            Bytes::new()
        }
    }
}

fn write_report(report: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(report.as_bytes())
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err);
    }
    Ok(())
}
