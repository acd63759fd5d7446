pub mod normalize;

pub use normalize::{normalize, TranscriptSegment};
