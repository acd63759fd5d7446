use crate::enumerate::VideoRef;
use crate::transcript::TranscriptSegment;

/// Characters that are illegal or unsafe in filenames on common filesystems.
const ILLEGAL_FILENAME_CHARS: [char; 9] = ['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Format a start offset as a zero-padded `HH:MM:SS` timestamp.
///
/// Sub-second precision is floored. Hours are always emitted so documents
/// stay column-aligned regardless of video length.
pub fn format_timestamp(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Render a video's transcript as a Markdown document.
///
/// Pure function: writing the result to disk is the caller's concern.
pub fn render_document(video: &VideoRef, segments: &[TranscriptSegment]) -> String {
    let mut lines = Vec::with_capacity(segments.len());
    for segment in segments {
        lines.push(format!(
            "[{}] {}",
            format_timestamp(segment.start_seconds),
            segment.text
        ));
    }

    format!(
        "# {}\n\nURL: {}\n\n## Transcript\n\n{}\n",
        video.title,
        video.url,
        lines.join("\n")
    )
}

/// Sanitize a title for use as a filename.
///
/// Strips filesystem-illegal and control characters, trims surrounding
/// whitespace, and truncates to `max_len` characters on a char boundary.
/// Falls back to `transcript` when nothing survives.
pub fn sanitize_filename(title: &str, max_len: usize) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();

    let trimmed = cleaned.trim();
    let truncated: String = trimmed.chars().take(max_len).collect();
    let result = truncated.trim_end().to_string();

    if result.is_empty() {
        "transcript".to_string()
    } else {
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(title: &str) -> VideoRef {
        VideoRef {
            id: "ABC123def45".to_string(),
            title: title.to_string(),
            url: "https://www.youtube.com/watch?v=ABC123def45".to_string(),
        }
    }

    #[test]
    fn test_timestamp_floor_and_padding() {
        assert_eq!(format_timestamp(3725.9), "01:02:05");
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(59.999), "00:00:59");
        assert_eq!(format_timestamp(3600.0), "01:00:00");
    }

    #[test]
    fn test_timestamp_always_emits_hours() {
        // Under an hour still renders HH:MM:SS
        assert_eq!(format_timestamp(65.0), "00:01:05");
    }

    #[test]
    fn test_render_document_shape() {
        let segments = vec![
            TranscriptSegment {
                start_seconds: 0.0,
                text: "hi".to_string(),
            },
            TranscriptSegment {
                start_seconds: 5.0,
                text: "there".to_string(),
            },
        ];
        let doc = render_document(&video("Test Video"), &segments);

        assert!(doc.starts_with("# Test Video\n\n"));
        assert!(doc.contains("URL: https://www.youtube.com/watch?v=ABC123def45\n"));
        assert!(doc.contains("## Transcript\n\n"));
        assert!(doc.contains("[00:00:00] hi\n[00:00:05] there"));
        assert!(doc.ends_with("\n"));
    }

    #[test]
    fn test_render_is_idempotent() {
        let segments = vec![TranscriptSegment {
            start_seconds: 12.3,
            text: "stable".to_string(),
        }];
        let a = render_document(&video("Same"), &segments);
        let b = render_document(&video("Same"), &segments);
        assert_eq!(a, b);
    }

    #[test]
    fn test_sanitize_removes_illegal_chars() {
        assert_eq!(
            sanitize_filename("a/b\\c:d*e?f\"g<h>i|j", 150),
            "abcdefghij"
        );
    }

    #[test]
    fn test_sanitize_truncates_on_char_boundary() {
        let title = "日本語のタイトル".repeat(40);
        let name = sanitize_filename(&title, 150);
        assert_eq!(name.chars().count(), 150);
    }

    #[test]
    fn test_sanitize_fallback() {
        assert_eq!(sanitize_filename("///???", 150), "transcript");
        assert_eq!(sanitize_filename("   ", 150), "transcript");
    }
}
