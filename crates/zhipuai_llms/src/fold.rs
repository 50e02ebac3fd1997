//! Folding a chunk stream into a single result.

use futures::{Stream, StreamExt};

use crate::error::{Error, Result};
use crate::types::{ChatGenerationChunk, ChatResult};

/// Consume `stream` and concatenate its chunks into one generation.
///
/// Generation metadata comes from the terminal chunk. The returned result
/// has no `llm_output`; callers that know the model fill it in.
pub async fn generate_from_stream<S>(stream: S) -> Result<ChatResult>
where
    S: Stream<Item = Result<ChatGenerationChunk>>,
{
    futures::pin_mut!(stream);

    let mut folded: Option<ChatGenerationChunk> = None;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        match folded.as_mut() {
            Some(acc) => acc.append(chunk),
            None => folded = Some(chunk),
        }
    }

    let generation = folded.ok_or_else(|| Error::stream_error("No chunks received from stream"))?;

    Ok(ChatResult {
        generations: vec![generation.into()],
        llm_output: None,
    })
}
