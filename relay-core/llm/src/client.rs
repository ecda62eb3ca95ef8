use crate::LlmError;
use crate::framing::FrameDecoder;
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use reqwest::header::HeaderMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Client { client }
    }

    /// POST `request` and decode the response body incrementally.
    ///
    /// The token is raced against sending the request and against every
    /// body read. URLs are stripped from transport errors since some vendors
    /// take the credential as a query parameter. Once it fires the stream yields `LlmError::Cancelled`
    /// and ends; dropping the stream closes the connection.
    #[instrument(level = "trace", skip_all)]
    pub async fn post_stream<S, D>(
        &self,
        url: &str,
        headers: HeaderMap,
        request: &S,
        decoder: D,
        cancel: CancellationToken,
    ) -> Result<BoxedStream<Result<D::Item, LlmError>>, LlmError>
    where
        S: Serialize + ?Sized,
        D: FrameDecoder,
    {
        let send = self.client.post(url).headers(headers).json(request).send();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(LlmError::Cancelled),
            response = send => response.map_err(|e| LlmError::Transport(e.without_url()))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LlmError::Cancelled),
                body = response.text() => body.unwrap_or_default(),
            };
            return Err(LlmError::Status { status, body });
        }
        if response.content_length() == Some(0) {
            return Err(LlmError::EmptyBody(status));
        }
        debug!(%status, "vendor stream opened");

        Ok(decode_body(response.bytes_stream(), decoder, cancel))
    }
}

struct DecodeState<D: FrameDecoder> {
    body: BoxedStream<reqwest::Result<Bytes>>,
    decoder: D,
    pending: VecDeque<Result<D::Item, LlmError>>,
    cancel: CancellationToken,
    finished: bool,
}

/// Drive `decoder` over a chunked body, stopping at the first error.
pub(crate) fn decode_body<B, D>(
    body: B,
    decoder: D,
    cancel: CancellationToken,
) -> BoxedStream<Result<D::Item, LlmError>>
where
    B: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
    D: FrameDecoder,
{
    let state = DecodeState {
        body: Box::pin(body),
        decoder,
        pending: VecDeque::new(),
        cancel,
        finished: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                if item.is_err() {
                    state.finished = true;
                    state.pending.clear();
                }
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            tokio::select! {
                biased;
                _ = state.cancel.cancelled() => {
                    state.finished = true;
                    return Some((Err(LlmError::Cancelled), state));
                }
                chunk = state.body.next() => match chunk {
                    Some(Ok(bytes)) => state.pending.extend(state.decoder.push(&bytes)),
                    Some(Err(e)) => state.pending.push_back(Err(LlmError::Transport(e.without_url()))),
                    None => {
                        state.finished = true;
                        state.pending.extend(state.decoder.finish());
                    }
                },
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::{JsonArrayDecoder, SseDecoder};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestEvent {
        id: u32,
    }

    fn body(chunks: &[&'static [u8]]) -> impl Stream<Item = reqwest::Result<Bytes>> + Send + 'static {
        let chunks: Vec<reqwest::Result<Bytes>> =
            chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
        stream::iter(chunks)
    }

    #[tokio::test]
    async fn test_decode_body_sse() {
        let stream = decode_body(
            body(&[b"data: {\"id\":1}\n", b"\ndata: {\"i", b"d\":2}\n"]),
            SseDecoder::<TestEvent>::new(),
            CancellationToken::new(),
        );

        let ids: Vec<u32> = stream.map(|e| e.unwrap().id).collect().await;
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_decode_body_json_array() {
        let stream = decode_body(
            body(&[b"[{\"id\":1}", b",{\"id\"", b":2}]"]),
            JsonArrayDecoder::<TestEvent>::new(),
            CancellationToken::new(),
        );

        let ids: Vec<u32> = stream.map(|e| e.unwrap().id).collect().await;
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_cancel_ends_stream() {
        let cancel = CancellationToken::new();
        let pending = stream::pending::<reqwest::Result<Bytes>>();
        let mut stream = decode_body(pending, SseDecoder::<TestEvent>::new(), cancel.clone());

        cancel.cancel();

        assert!(matches!(stream.next().await, Some(Err(LlmError::Cancelled))));
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_nothing_after_first_error() {
        let stream = decode_body(
            body(&[b"data: {\"id\":1}\ndata: nope\ndata: {\"id\":3}\n"]),
            SseDecoder::<TestEvent>::new(),
            CancellationToken::new(),
        );

        let items: Vec<_> = stream.collect().await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(LlmError::Decode(_))));
    }
}
