//! Bounded body buffering.

use std::time::Duration;

use axum::body::Bytes;
use futures_util::StreamExt;

use super::client::BodyStream;
use crate::error::ProxyError;

/// Collect a whole body into memory.
///
/// Fails with [`ProxyError::Timeout`] once `deadline` passes and with
/// [`ProxyError::StylesheetTooLarge`] as soon as `max_bytes` is exceeded.
pub async fn read_body(
    mut body: BodyStream,
    max_bytes: usize,
    deadline: Duration,
) -> Result<Bytes, ProxyError> {
    let collect = async move {
        let mut buffer = Vec::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if buffer.len() + chunk.len() > max_bytes {
                return Err(ProxyError::StylesheetTooLarge(max_bytes));
            }
            buffer.extend_from_slice(&chunk);
        }
        Ok::<_, ProxyError>(Bytes::from(buffer))
    };

    tokio::time::timeout(deadline, collect)
        .await
        .map_err(|_| ProxyError::Timeout(deadline))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::FetchError;
    use futures_util::stream;

    fn chunks(parts: &[&'static str]) -> BodyStream {
        stream::iter(
            parts
                .iter()
                .map(|p| Ok(Bytes::from_static(p.as_bytes())))
                .collect::<Vec<_>>(),
        )
        .boxed()
    }

    #[tokio::test]
    async fn test_reads_all_chunks() {
        let body = read_body(chunks(&["a { ", "color: red", " }"]), 1024, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(&body[..], b"a { color: red }");
    }

    #[tokio::test]
    async fn test_size_limit() {
        let err = read_body(chunks(&["12345", "67890"]), 8, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::StylesheetTooLarge(8)));
    }

    #[tokio::test]
    async fn test_stream_error_propagates() {
        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"a")),
            Err(FetchError::Other("connection reset".into())),
        ])
        .boxed();
        let err = read_body(body, 1024, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ProxyError::Network(FetchError::Other(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_body_times_out() {
        let body = stream::pending().boxed();
        let err = read_body(body, 1024, Duration::from_secs(30)).await.unwrap_err();
        assert!(matches!(err, ProxyError::Timeout(d) if d == Duration::from_secs(30)));
    }
}
