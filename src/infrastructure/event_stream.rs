// Chunked event streaming - length-prefixed JSON frames, optionally Brotli per frame
use crate::domain::event::EventEnvelope;
use async_compression::tokio::bufread::BrotliEncoder;
use axum::body::Body;
use axum::http::{Response, StatusCode, header};
use bytes::{BufMut, Bytes, BytesMut};
use futures::StreamExt;
use futures::stream::Stream;
use tokio::io::AsyncReadExt;

/// Frames are compressed one by one, so the response carries no Content-Encoding.
pub fn chunked_event_stream<S>(stream: S, compress: bool) -> Result<Response<Body>, StatusCode>
where
    S: Stream<Item = EventEnvelope> + Send + 'static,
{
    let byte_stream = stream.then(move |event| async move { encode_frame(&event, compress).await });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/x-ndframe+json")
        .header("x-frame-compression", if compress { "br" } else { "none" })
        .body(Body::from_stream(byte_stream))
        .map_err(|e| {
            tracing::error!("failed to build event stream response: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        })
}

/// 4-byte big-endian payload length followed by the payload
pub async fn encode_frame(event: &EventEnvelope, compress: bool) -> std::io::Result<Bytes> {
    let json = serde_json::to_vec(event)?;
    let payload = if compress {
        brotli(json).await?
    } else {
        json
    };

    let length = u32::try_from(payload.len())
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidData, "frame too large"))?;
    let mut frame = BytesMut::with_capacity(4 + payload.len());
    frame.put_u32(length);
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

pub async fn brotli(data: Vec<u8>) -> std::io::Result<Vec<u8>> {
    let mut encoder = BrotliEncoder::new(std::io::Cursor::new(data));
    let mut compressed = Vec::new();
    encoder.read_to_end(&mut compressed).await?;
    Ok(compressed)
}
