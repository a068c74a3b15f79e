//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Render
//!
//! ```text
//! thumb.png ← photos/dawn.jpg
//!     Crop 400x500, Png (image/png, 48.2 KB)
//! ```
//!
//! ## Batch
//!
//! ```text
//! 001 dawn-thumb.jpg ← photos/dawn.jpg (image/jpeg, 31.0 KB)
//! 002 missing.png ← photos/gone.jpg
//!     Error: Source image not found: photos/gone.jpg
//!
//! Rendered 1 of 2 jobs, 1 failed
//! Cache: 0 cached, 2 rendered (2 total)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure and perform no I/O.

use crate::batch::BatchResult;
use crate::imaging::TransformRequest;
use crate::service::Rendered;
use std::path::Path;

fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn describe_request(request: &TransformRequest) -> String {
    let (w, h) = request.dimensions();
    match request {
        TransformRequest::Raw(_) if (w, h) == (0, 0) => "Raw".to_string(),
        TransformRequest::Raw(_) => format!("Raw within {w}x{h}"),
        _ => format!("{} {w}x{h}", request.mode()),
    }
}

// ============================================================================
// render
// ============================================================================

pub fn format_render_output(
    source: &str,
    output: &Path,
    request: &TransformRequest,
    rendered: &Rendered,
) -> Vec<String> {
    vec![
        format!("{} ← {}", output.display(), source),
        format!(
            "{}{}, {} ({}, {})",
            indent(1),
            describe_request(request),
            rendered.format,
            rendered.content_type,
            format_size(rendered.bytes.len())
        ),
    ]
}

pub fn print_render_output(
    source: &str,
    output: &Path,
    request: &TransformRequest,
    rendered: &Rendered,
) {
    for line in format_render_output(source, output, request, rendered) {
        println!("{}", line);
    }
}

// ============================================================================
// batch
// ============================================================================

pub fn format_batch_output(result: &BatchResult) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, outcome) in result.outcomes.iter().enumerate() {
        let header = format!("{} {} ← {}", format_index(i + 1), outcome.output, outcome.source);
        match &outcome.result {
            Ok(written) => lines.push(format!(
                "{} ({}, {})",
                header,
                written.content_type,
                format_size(written.bytes)
            )),
            Err(e) => {
                lines.push(header);
                lines.push(format!("{}Error: {}", indent(1), e));
            }
        }
    }

    let total = result.outcomes.len();
    let failed = result.failures();
    lines.push(String::new());
    if failed > 0 {
        lines.push(format!(
            "Rendered {} of {} jobs, {} failed",
            total - failed,
            total,
            failed
        ));
    } else {
        lines.push(format!("Rendered {} jobs", total));
    }
    if let Some(stats) = &result.cache_stats {
        lines.push(format!("Cache: {}", stats));
    }
    lines
}

pub fn print_batch_output(result: &BatchResult) {
    for line in format_batch_output(result) {
        println!("{}", line);
    }
}

// ============================================================================
// save-for-web
// ============================================================================

pub fn format_save_for_web_output(file_name: &str, target_dir: &str, saved: bool) -> Vec<String> {
    if saved {
        vec![format!("{} → {}", file_name, target_dir)]
    } else {
        vec![format!("{}: no such upload, nothing saved", file_name)]
    }
}

pub fn print_save_for_web_output(file_name: &str, target_dir: &str, saved: bool) {
    for line in format_save_for_web_output(file_name, target_dir, saved) {
        println!("{}", line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{JobOutcome, Written};
    use crate::cache::CacheStats;
    use crate::error::Error;
    use crate::imaging::{Anchor, OutputFormat};
    use std::path::PathBuf;

    #[test]
    fn format_size_units() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KB");
        assert_eq!(format_size(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn render_output_lines() {
        let rendered = Rendered {
            bytes: vec![0u8; 2048].into(),
            format: OutputFormat::Png,
            content_type: "image/png",
        };
        let lines = format_render_output(
            "photos/dawn.jpg",
            Path::new("thumb.png"),
            &TransformRequest::crop(400, 500, Anchor::Top),
            &rendered,
        );
        assert_eq!(
            lines,
            vec![
                "thumb.png ← photos/dawn.jpg",
                "    Crop 400x500, Png (image/png, 2.0 KB)",
            ]
        );
    }

    #[test]
    fn describe_raw_variants() {
        assert_eq!(describe_request(&TransformRequest::raw()), "Raw");
        assert_eq!(
            describe_request(&TransformRequest::raw_max(50)),
            "Raw within 50x50"
        );
    }

    #[test]
    fn batch_output_with_failure_and_stats() {
        let result = BatchResult {
            outcomes: vec![
                JobOutcome {
                    source: "a.jpg".into(),
                    output: "a.png".into(),
                    result: Ok(Written {
                        path: PathBuf::from("out/a.png"),
                        content_type: "image/png",
                        bytes: 100,
                    }),
                },
                JobOutcome {
                    source: "gone.jpg".into(),
                    output: "gone.png".into(),
                    result: Err(Error::SourceNotFound("gone.jpg".into())),
                },
            ],
            cache_stats: Some(CacheStats {
                hits: 0,
                misses: 2,
                expired: 0,
            }),
        };
        assert_eq!(
            format_batch_output(&result),
            vec![
                "001 a.png ← a.jpg (image/png, 100 B)",
                "002 gone.png ← gone.jpg",
                "    Error: Source image not found: gone.jpg",
                "",
                "Rendered 1 of 2 jobs, 1 failed",
                "Cache: 2 rendered",
            ]
        );
    }

    #[test]
    fn batch_output_all_ok_without_cache() {
        let result = BatchResult {
            outcomes: vec![],
            cache_stats: None,
        };
        assert_eq!(format_batch_output(&result), vec!["", "Rendered 0 jobs"]);
    }

    #[test]
    fn save_for_web_lines() {
        assert_eq!(
            format_save_for_web_output("a.jpg", "Images/", true),
            vec!["a.jpg → Images/"]
        );
        assert_eq!(
            format_save_for_web_output("a.jpg", "Images/", false),
            vec!["a.jpg: no such upload, nothing saved"]
        );
    }
}
