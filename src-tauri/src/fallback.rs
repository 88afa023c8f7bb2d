//! Static "no connection" screen shown in place of the remote page.

use crate::{FALLBACK_MESSAGE, FALLBACK_SCHEME, FALLBACK_TITLE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackView {
    pub title: String,
    pub message: String,
}

impl Default for FallbackView {
    fn default() -> Self {
        Self {
            title: FALLBACK_TITLE.to_string(),
            message: FALLBACK_MESSAGE.to_string(),
        }
    }
}

impl FallbackView {
    /// Centered title and message, no controls. Recovery happens only through
    /// connectivity changes.
    pub fn to_html(&self) -> String {
        format!(
            r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<meta name="viewport" content="width=device-width, initial-scale=1">
<title>{title}</title>
<style>
  html, body {{ height: 100%; margin: 0; }}
  body {{
    display: flex;
    flex-direction: column;
    align-items: center;
    justify-content: center;
    padding: 20px;
    box-sizing: border-box;
    background: #ffffff;
    font-family: -apple-system, "Apple SD Gothic Neo", "Noto Sans KR", sans-serif;
    text-align: center;
  }}
  h1 {{ font-size: 18px; font-weight: bold; margin: 0 0 10px; }}
  p {{ font-size: 14px; color: #666666; margin: 0; }}
</style>
</head>
<body>
<h1>{title}</h1>
<p>{message}</p>
</body>
</html>
"#,
            title = escape_html(&self.title),
            message = escape_html(&self.message),
        )
    }
}

/// Where the webview loads the fallback page from. Windows and Android expose
/// custom schemes as `http://<scheme>.localhost`.
pub fn fallback_url() -> String {
    if cfg!(any(target_os = "windows", target_os = "android")) {
        format!("http://{FALLBACK_SCHEME}.localhost/")
    } else {
        format!("{FALLBACK_SCHEME}://localhost/")
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
