use crate::error::ApiError;
use futures::stream::Stream;
use futures::{
    stream::{self},
    StreamExt,
};
use reqwest::header::HeaderMap;
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt::Debug, pin::Pin, time::Duration};
use tracing::{event, instrument, Level};

#[derive(Clone)]
pub struct Client {
    client: reqwest::Client,
}

pub type BoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

impl Client {
    pub fn with_headers(headers: HeaderMap, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Client {
            client: builder.build()?,
        })
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Failed to read error body".to_string());
        Err(ApiError::Status { status, body })
    }

    #[instrument(level = "trace", skip(self, request))]
    pub async fn post<U, S, T>(&self, url: U, request: &S) -> Result<T, ApiError>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned,
    {
        let response = self.client.post(url).json(request).send().await?;
        let response = Self::check_status(response).await?;
        let text = response.text().await?;
        event!(Level::TRACE, response = text);

        Ok(serde_json::from_str::<T>(&text)?)
    }

    /// POST a request and decode the newline-delimited reply as it arrives.
    ///
    /// `process` maps each raw line to the JSON payload to decode, or `None`
    /// to skip it (keep-alives, `[DONE]` markers and the like).
    #[instrument(level = "trace", skip(self, request, process))]
    pub async fn post_stream<U, S, F, T>(
        &self,
        url: U,
        request: &S,
        process: F,
    ) -> Result<BoxedStream<Result<T, ApiError>>, ApiError>
    where
        U: reqwest::IntoUrl + Debug,
        S: Serialize + Sized,
        T: DeserializeOwned + Send + 'static,
        F: Fn(&str) -> Option<&str> + 'static + Send,
    {
        let response = self.client.post(url).json(&request).send().await?;
        let response = Self::check_status(response).await?;

        Ok(decode_lines(response.bytes_stream(), process))
    }
}

/// Re-frame a byte stream into lines and decode each selected line.
/// Partial lines are carried across chunk boundaries as raw bytes, so a
/// multi-byte character split between chunks survives intact.
fn decode_lines<B, E, F, T>(bytes: B, process: F) -> BoxedStream<Result<T, ApiError>>
where
    B: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: Into<ApiError>,
    T: DeserializeOwned + Send + 'static,
    F: Fn(&str) -> Option<&str> + 'static + Send,
{
    let buffered_stream = bytes.scan(Vec::<u8>::new(), move |buffer, chunk| {
        let chunk = match chunk {
            Ok(c) => c,
            Err(e) => {
                buffer.clear();
                return futures::future::ready(Some(vec![Err(e.into())]));
            }
        };

        buffer.extend_from_slice(&chunk);

        let mut messages: Vec<Result<T, ApiError>> = vec![];
        let mut last_newline_pos = 0;

        while let Some(rel) = buffer[last_newline_pos..].iter().position(|b| *b == b'\n') {
            let end = last_newline_pos + rel;
            let raw = &buffer[last_newline_pos..end];
            last_newline_pos = end + 1;

            let line = match std::str::from_utf8(raw) {
                Ok(line) => line,
                Err(e) => {
                    messages.push(Err(ApiError::from(e)));
                    continue;
                }
            };
            if let Some(processed) = process(line) {
                if !processed.trim().is_empty() {
                    messages.push(serde_json::from_str::<T>(processed).map_err(ApiError::from));
                }
            }
        }

        // Keep incomplete line in buffer
        buffer.drain(..last_newline_pos);

        futures::future::ready(Some(messages))
    });

    Box::pin(buffered_stream.flat_map(stream::iter))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct TestEvent {
        id: u32,
        text: String,
    }

    fn data_lines(line: &str) -> Option<&str> {
        line.strip_prefix("data: ")
    }

    fn chunks(parts: &[&[u8]]) -> impl Stream<Item = Result<bytes::Bytes, ApiError>> + Send {
        let owned: Vec<Result<bytes::Bytes, ApiError>> = parts
            .iter()
            .map(|p| Ok(bytes::Bytes::from(p.to_vec())))
            .collect();
        stream::iter(owned)
    }

    #[tokio::test]
    async fn test_decode_lines_split_across_chunks() {
        let input = chunks(&[
            b"data: {\"id\":1,\"te",
            b"xt\":\"hello\"}\ndata: {\"id\":2",
            b",\"text\":\"world\"}\n",
        ]);

        let results: Vec<TestEvent> = decode_lines(input, data_lines)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            results,
            vec![
                TestEvent { id: 1, text: "hello".to_string() },
                TestEvent { id: 2, text: "world".to_string() },
            ]
        );
    }

    #[tokio::test]
    async fn test_decode_lines_multibyte_split_across_chunks() {
        let line = "data: {\"id\":7,\"text\":\"Début →\"}\n".as_bytes();
        // Split inside the two bytes of 'é' and inside the three bytes of '→'
        let e_acute = line.iter().position(|b| *b == 0xC3).unwrap();
        let arrow = line.iter().position(|b| *b == 0xE2).unwrap();
        let input = chunks(&[
            &line[..e_acute + 1],
            &line[e_acute + 1..arrow + 2],
            &line[arrow + 2..],
        ]);

        let results: Vec<TestEvent> = decode_lines(input, data_lines)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(
            results,
            vec![TestEvent { id: 7, text: "Début →".to_string() }]
        );
    }

    #[tokio::test]
    async fn test_decode_lines_reports_invalid_utf8() {
        let input = chunks(&[b"data: {\"id\":1,\"text\":\"\xff\"}\ndata: {\"id\":2,\"text\":\"ok\"}\n"]);

        let results: Vec<Result<TestEvent, ApiError>> =
            decode_lines(input, data_lines).collect().await;

        assert_eq!(results.len(), 2);
        assert!(matches!(results[0], Err(ApiError::Utf8(_))));
        assert_eq!(results[1].as_ref().unwrap().text, "ok");
    }

    #[tokio::test]
    async fn test_decode_lines_skips_unselected_and_incomplete() {
        let input = chunks(&[
            b"\n: keep-alive\ndata: {\"id\":1,\"text\":\"hello\"}\n\ndata: {\"id\":2,\"text\":\"cut",
        ]);

        let results: Vec<Result<TestEvent, ApiError>> =
            decode_lines(input, data_lines).collect().await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_decode_lines_reports_malformed_json() {
        let input = chunks(&[b"data: {\"id\":1,\"text\":\"a\"}\ndata: {broken}\n"]);

        let results: Vec<Result<TestEvent, ApiError>> =
            decode_lines(input, data_lines).collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(ApiError::Decode(_))));
    }
}
