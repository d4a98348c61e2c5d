use async_trait::async_trait;
use tracing::debug;

use mindtrace_core::TranscriptFragment;

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("could not read media file: {0}")]
    Io(#[from] std::io::Error),

    #[error("transcription request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("transcription api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed transcription payload: {0}")]
    Malformed(String),
}

/// External transcription capability: media in, full text plus timed
/// fragments out.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(
        &self,
        media_locator: &str,
    ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError>;
}

const WHISPER_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Whisper API client (verbose_json with segment timestamps).
pub struct WhisperApiTranscriber {
    api_key: String,
    http: reqwest::Client,
}

impl WhisperApiTranscriber {
    pub fn new(api_key: String, http: reqwest::Client) -> Self {
        Self { api_key, http }
    }
}

#[async_trait]
impl Transcriber for WhisperApiTranscriber {
    async fn transcribe(
        &self,
        media_locator: &str,
    ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError> {
        let bytes = tokio::fs::read(media_locator).await?;
        let file_name = std::path::Path::new(media_locator)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "media".to_string());

        let form = reqwest::multipart::Form::new()
            .text("model", "whisper-1")
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .part("file", reqwest::multipart::Part::bytes(bytes).file_name(file_name));

        let response = self
            .http
            .post(WHISPER_URL)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let data: serde_json::Value = response.json().await?;
        let full_text = data["text"]
            .as_str()
            .ok_or_else(|| TranscriptionError::Malformed("missing text field".to_string()))?
            .to_string();

        let raw_segments = data["segments"]
            .as_array()
            .ok_or_else(|| TranscriptionError::Malformed("missing segments array".to_string()))?;

        let mut fragments = Vec::with_capacity(raw_segments.len());
        for (i, seg) in raw_segments.iter().enumerate() {
            let text = seg["text"]
                .as_str()
                .ok_or_else(|| TranscriptionError::Malformed("segment missing text".to_string()))?;
            fragments.push(TranscriptFragment {
                id: i as u32,
                text: text.trim().to_string(),
                start_time: seg["start"].as_f64().unwrap_or(0.0),
                end_time: seg["end"].as_f64().unwrap_or(0.0),
                confidence: seg["confidence"].as_f64().unwrap_or(1.0),
            });
        }

        debug!(fragments = fragments.len(), "transcription complete");
        Ok((full_text, fragments))
    }
}

/// Deterministic built-in lecture used when no transcription key is
/// configured, so the rest of the pipeline can be exercised end to end.
pub struct DemoTranscriber;

const DEMO_LECTURE: &str = "\
Hello everyone, today we're going to learn about Python decorators. \
Decorators are a very powerful feature in Python that allow you to modify the behavior of functions or classes. \
Let me start by explaining what a decorator actually is. A decorator is essentially a function that takes another function as an argument. \
It wraps the original function and extends its behavior without permanently modifying it. \
The syntax uses the at symbol followed by the decorator name, placed above the function definition. \
Let's look at a simple example. Suppose we have a function that prints hello world. \
We can create a decorator that adds some logging before and after the function executes. \
This is incredibly useful for cross-cutting concerns like logging, authentication, or timing. \
Now, you might be wondering, how does this actually work under the hood? \
When you use the decorator syntax, Python is actually doing something called syntactic sugar. \
It's equivalent to calling the decorator function and passing your original function to it. \
The decorator returns a new function which replaces the original one. \
This pattern is extremely common in web frameworks like Flask and Django. \
You'll see decorators used for routing, requiring login, caching, and many other purposes. \
Let me show you a more advanced example with a decorator that takes arguments. \
This requires an additional level of function nesting, which can be confusing at first. \
But once you understand the pattern, it becomes very straightforward to use. \
To summarize, decorators let you add functionality to existing code in a clean, readable way. \
They're one of Python's most elegant features and worth mastering. \
Does anyone have any questions about what we've covered so far?";

#[async_trait]
impl Transcriber for DemoTranscriber {
    async fn transcribe(
        &self,
        _media_locator: &str,
    ) -> Result<(String, Vec<TranscriptFragment>), TranscriptionError> {
        let sentences: Vec<String> = DEMO_LECTURE
            .split('.')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("{s}."))
            .collect();

        let mut fragments = Vec::with_capacity(sentences.len());
        let mut current_time = 0.0;
        for (i, sentence) in sentences.iter().enumerate() {
            // Rough estimate: half a second per word.
            let duration = sentence.split_whitespace().count() as f64 * 0.5;
            fragments.push(TranscriptFragment {
                id: i as u32,
                text: sentence.clone(),
                start_time: current_time,
                end_time: current_time + duration,
                confidence: 0.95,
            });
            current_time += duration;
        }

        Ok((sentences.join(" "), fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn demo_transcript_is_deterministic_and_ordered() {
        let (text_a, frags_a) = DemoTranscriber.transcribe("ignored").await.unwrap();
        let (text_b, frags_b) = DemoTranscriber.transcribe("ignored").await.unwrap();
        assert_eq!(text_a, text_b);
        assert_eq!(frags_a.len(), frags_b.len());
        assert!(!frags_a.is_empty());
        for pair in frags_a.windows(2) {
            assert!(pair[0].start_time <= pair[1].start_time);
            assert!(pair[0].end_time <= pair[1].start_time + 1e-9);
        }
    }
}
