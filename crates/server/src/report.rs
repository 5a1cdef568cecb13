//! Markdown report persistence for analysis results.

use std::io;
use std::path::{Path, PathBuf};
use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

const FILE_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

const HEADER_TIMESTAMP: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Compact UTC timestamp for artifact names.
pub fn file_timestamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(FILE_TIMESTAMP)
        .unwrap_or_else(|_| now.unix_timestamp().to_string())
}

/// Normalize analysis output: drop stray bold markers and collapse runs of
/// blank lines to a single blank line.
pub fn clean_result_content(content: &str) -> String {
    let stripped = content.replace("***", "").replace("**", "");

    let mut out = String::with_capacity(stripped.len());
    let mut blank_run = 0usize;
    for line in stripped.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }

    out.trim_end().to_string()
}

/// Write the analysis result as a timestamped markdown report.
///
/// Returns the report path and the full markdown content.
pub async fn save_markdown_report(
    reports_dir: &Path,
    client_type: &str,
    task_name: &str,
    result: &str,
) -> io::Result<(PathBuf, String)> {
    tokio::fs::create_dir_all(reports_dir).await?;

    let now = OffsetDateTime::now_utc();
    let file_stamp = now
        .format(FILE_TIMESTAMP)
        .map_err(|e| io::Error::other(e.to_string()))?;
    let header_stamp = now
        .format(HEADER_TIMESTAMP)
        .map_err(|e| io::Error::other(e.to_string()))?;

    let safe_client = sanitize_fragment(client_type);
    let filename = format!("Secure_Report_{safe_client}_{file_stamp}.md");
    let path = reports_dir.join(filename);

    let markdown = format!(
        "# Analysis Report - {safe_client} (Encrypted)\n\n\
         **Generated:** {header_stamp}\n\n\
         **Task:** {task_name}\n\n\
         **Processing Mode:** Encrypted Documents\n\n---\n\n{result}"
    );

    tokio::fs::write(&path, &markdown).await?;
    Ok((path, markdown))
}

/// Reduce an untrusted string to a filesystem-safe fragment.
pub fn sanitize_fragment(raw: &str) -> String {
    let cleaned: String = Path::new(raw)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        "document".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_result_strips_bold_and_collapses_blanks() {
        let raw = "**Summary**\n\n\n\n- item one\n***\n- item two";
        let cleaned = clean_result_content(raw);
        assert_eq!(cleaned, "Summary\n\n- item one\n\n- item two");
    }

    #[test]
    fn test_sanitize_fragment() {
        assert_eq!(sanitize_fragment("form 16.pdf"), "form_16.pdf");
        assert_eq!(sanitize_fragment("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_fragment("salaried"), "salaried");
        assert_eq!(sanitize_fragment(""), "document");
        assert_eq!(sanitize_fragment(".."), "document");
    }

    #[tokio::test]
    async fn test_save_markdown_report() {
        let dir = tempfile::tempdir().unwrap();
        let (path, markdown) =
            save_markdown_report(dir.path(), "salaried", "secure_analysis_salaried", "body text")
                .await
                .unwrap();

        assert!(path.exists());
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Secure_Report_salaried_"));
        assert!(markdown.contains("**Task:** secure_analysis_salaried"));
        assert!(markdown.ends_with("body text"));

        let on_disk = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(on_disk, markdown);
    }
}
