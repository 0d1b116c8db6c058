//! Content module - raw API documents, normalization and reading time

mod normalize;
mod raw;
mod reading;

pub use normalize::{
    normalize_detail, normalize_post, Banner, ContentBlock, NormalizeError, Normalized, Post,
    PostDetail,
};
pub use raw::{
    parse_timestamp, Embed, PostData, RawContentBlock, RawDocument, RawImage, RichTextNode, Span,
    SpanData, TextField,
};
pub use reading::{count_words, ReadingTime, DEFAULT_WORDS_PER_MINUTE};
