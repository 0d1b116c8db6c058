//! Reading-time estimate

use super::normalize::ContentBlock;

pub const DEFAULT_WORDS_PER_MINUTE: u32 = 200;

/// Reading speed used to turn word counts into minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingTime {
    words_per_minute: u32,
}

impl Default for ReadingTime {
    fn default() -> Self {
        Self::new(DEFAULT_WORDS_PER_MINUTE)
    }
}

impl ReadingTime {
    /// A zero speed is clamped to one word per minute.
    pub fn new(words_per_minute: u32) -> Self {
        Self {
            words_per_minute: words_per_minute.max(1),
        }
    }

    #[cfg(test)]
    pub fn words_per_minute(&self) -> u32 {
        self.words_per_minute
    }

    /// Minutes to read `words` words, rounded up
    pub fn minutes_for(&self, words: usize) -> usize {
        words.div_ceil(self.words_per_minute as usize)
    }

    /// Minutes to read a post's content blocks
    pub fn estimate(&self, blocks: &[ContentBlock]) -> usize {
        self.minutes_for(count_words(blocks))
    }
}

/// Whitespace-separated words across every heading and body node
pub fn count_words(blocks: &[ContentBlock]) -> usize {
    blocks
        .iter()
        .map(|block| {
            let heading = block.heading.split_whitespace().count();
            let body: usize = block
                .body
                .iter()
                .map(|node| node.text.split_whitespace().count())
                .sum();
            heading + body
        })
        .sum()
}
