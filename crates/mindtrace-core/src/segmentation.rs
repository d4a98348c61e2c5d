use tracing::debug;

use crate::config::SegmenterConfig;
use crate::types::{LogicalSegment, TranscriptFragment};

/// Cue phrases that open a topic shift. Checked against the start of
/// the next fragment when the running buffer has reached its minimum.
const TOPIC_SHIFT_MARKERS: &[&str] = &[
    "now",
    "next",
    "let me",
    "let's",
    "moving on",
    "another",
    "first",
    "second",
    "third",
    "finally",
    "to summarize",
    "in conclusion",
    "the key point",
    "remember that",
    "so",
    "okay",
    "alright",
    "well",
    "basically",
    "what we",
    "what i",
    "the next",
    "going to",
    "important",
    "note that",
    "keep in mind",
];

/// Merges timed transcript fragments into logical explanation units.
/// Output is a pure function of the input: no randomness, no I/O.
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    config: SegmenterConfig,
}

struct Buffer {
    texts: Vec<String>,
    start_time: f64,
    word_count: usize,
    confidences: Vec<f64>,
}

impl Buffer {
    fn start(fragment: &TranscriptFragment) -> Self {
        Self {
            texts: Vec::new(),
            start_time: fragment.start_time,
            word_count: 0,
            confidences: Vec::new(),
        }
    }

    fn push(&mut self, fragment: &TranscriptFragment) {
        self.word_count += fragment.text.split_whitespace().count();
        self.texts.push(fragment.text.clone());
        self.confidences.push(fragment.confidence);
    }

    fn close(self, id: u32, end_time: f64) -> LogicalSegment {
        let confidence = if self.confidences.is_empty() {
            1.0
        } else {
            self.confidences.iter().sum::<f64>() / self.confidences.len() as f64
        };
        LogicalSegment {
            id,
            text: self.texts.join(" "),
            start_time: self.start_time,
            end_time,
            confidence,
        }
    }
}

impl Segmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self { config }
    }

    pub fn segment(&self, fragments: &[TranscriptFragment]) -> Vec<LogicalSegment> {
        if fragments.is_empty() {
            return Vec::new();
        }

        // Already-coarse inputs gain nothing from merging.
        if fragments.len() <= self.config.passthrough_fragments {
            return fragments
                .iter()
                .enumerate()
                .map(|(i, f)| LogicalSegment {
                    id: i as u32,
                    text: f.text.clone(),
                    start_time: f.start_time,
                    end_time: f.end_time,
                    confidence: f.confidence,
                })
                .collect();
        }

        let mut segments = Vec::new();
        let mut buffer = Buffer::start(&fragments[0]);

        for (i, fragment) in fragments.iter().enumerate() {
            buffer.push(fragment);

            let last = i == fragments.len() - 1;
            let at_max = buffer.word_count >= self.config.max_segment_words;
            let shift_ahead = buffer.word_count >= self.config.min_segment_words
                && fragments
                    .get(i + 1)
                    .is_some_and(|next| opens_topic_shift(&next.text));

            if last || at_max || shift_ahead {
                let id = segments.len() as u32;
                let next = if last { fragment } else { &fragments[i + 1] };
                let closed = std::mem::replace(&mut buffer, Buffer::start(next));
                segments.push(closed.close(id, fragment.end_time));
            }
        }

        debug!(
            raw = fragments.len(),
            logical = segments.len(),
            "segmented transcript"
        );
        segments
    }
}

fn opens_topic_shift(text: &str) -> bool {
    let lowered = text.trim_start().to_lowercase();
    TOPIC_SHIFT_MARKERS
        .iter()
        .any(|marker| lowered.starts_with(marker))
}
