use crate::config::Config;
use crate::error::AppError;

use std::path::Path;
use std::process::Stdio;
use time::macros::format_description;
use time::OffsetDateTime;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, error};

/// The report body is fixed; only the emoji get swapped for CDN images, since
/// the PDF renderer has no color-emoji font.
const REPORT_TEMPLATE: &str = r#"
<h1>🤖 Atom.Ai — WhatsApp Relay Report</h1>
<p>✅ Webhook relay online and answering inbound messages.</p>
<p>📈 Conversations are being logged with model name, temperature and latency.</p>
<p>📄 Export the full conversation log as CSV from <code>/save_messages_csv</code>.</p>
<p>⚠️ Delivery failures are recorded per message with an error code and text.</p>
"#;

const EMOJI_CDN: &str = "https://twemoji.maxcdn.com/v/latest/72x72";

/// Fixed emoji set used by the template, mapped to Twemoji codepoint files.
const EMOJI_IMAGES: &[(&str, &str)] = &[
    ("🤖", "1f916"),
    ("✅", "2705"),
    ("📈", "1f4c8"),
    ("📄", "1f4c4"),
    ("⚠️", "26a0"),
];

pub fn replace_emoji(html: &str) -> String {
    let mut out = html.to_string();
    for (emoji, code) in EMOJI_IMAGES {
        // alt text uses the codepoint slug; the emoji itself must not survive
        // substitution or the renderer falls back to its emoji-less font.
        let img = format!(
            "<img src=\"{EMOJI_CDN}/{code}.png\" width=\"16\" height=\"16\" alt=\"emoji-{code}\"/>"
        );
        out = out.replace(emoji, &img);
    }
    out
}

pub fn wrap_page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\
         <html><head><meta charset=\"utf-8\">\
         <style>body {{ font-family: sans-serif; margin: 2em; }}</style>\
         </head><body>{body}</body></html>"
    )
}

fn report_filename(now: OffsetDateTime) -> String {
    let fmt = format_description!("[year][month][day]T[hour][minute][second]");
    let stamp = now
        .format(&fmt)
        .unwrap_or_else(|_| now.unix_timestamp().to_string());
    format!("report_{stamp}.pdf")
}

/// Render the fixed report template to a timestamped PDF under the reports
/// directory, via the external `wkhtmltopdf` binary.  Returns the relative
/// output path.
pub async fn render_report(config: &Config) -> Result<String, AppError> {
    let html = wrap_page(&replace_emoji(REPORT_TEMPLATE));

    tokio::fs::create_dir_all(&config.reports_dir).await?;
    let out_path =
        Path::new(&config.reports_dir).join(report_filename(OffsetDateTime::now_utc()));

    // wkhtmltopdf reads the page from stdin, writes straight to the file.
    let mut child = Command::new(&config.wkhtmltopdf_path)
        .arg("--quiet")
        .arg("-")
        .arg(&out_path)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            error!(error=%e, binary=%config.wkhtmltopdf_path, "failed to spawn pdf renderer");
            AppError::Report(format!("failed to spawn {}: {e}", config.wkhtmltopdf_path))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(html.as_bytes()).await?;
    }
    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!(status=?output.status.code(), stderr=%stderr, "pdf renderer failed");
        return Err(AppError::Report(format!(
            "renderer exited with {:?}: {}",
            output.status.code(),
            stderr.trim()
        )));
    }

    let rel = out_path.to_string_lossy().to_string();
    debug!(path=%rel, "rendered report pdf");
    Ok(rel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn emoji_become_cdn_images() {
        let out = replace_emoji("status: ✅ done 📄");
        assert!(out.contains("2705.png"));
        assert!(out.contains("1f4c4.png"));
        assert!(out.contains("alt=\"emoji-2705\""));
        assert!(!out.contains('✅'));
        assert!(!out.contains('📄'));
        assert!(out.contains("status: "));
    }

    #[test]
    fn template_emoji_all_covered() {
        let out = replace_emoji(REPORT_TEMPLATE);
        for (emoji, _) in EMOJI_IMAGES {
            assert!(!out.contains(emoji), "{emoji} left unsubstituted");
        }
    }

    #[test]
    fn page_shell_wraps_body() {
        let page = wrap_page("<p>hi</p>");
        assert!(page.starts_with("<!DOCTYPE html>"));
        assert!(page.contains("<meta charset=\"utf-8\">"));
        assert!(page.contains("<body><p>hi</p></body>"));
    }

    #[test]
    fn filename_is_timestamped() {
        let name = report_filename(datetime!(2024-06-01 09:30:15 UTC));
        assert_eq!(name, "report_20240601T093015.pdf");
    }

    #[tokio::test]
    async fn missing_renderer_is_a_structured_failure() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::for_tests();
        config.reports_dir = dir.path().join("reports").to_string_lossy().to_string();
        config.wkhtmltopdf_path = "/nonexistent/wkhtmltopdf".to_string();

        let err = render_report(&config).await.unwrap_err();
        assert!(matches!(err, AppError::Report(_)));
    }
}
