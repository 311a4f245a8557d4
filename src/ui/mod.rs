//! Server-rendered HTML
//!
//! Pages are plain strings built from the current snapshot and device state.
//! All dynamic text goes through [`escape_html`].

pub mod assets;
pub mod pages;

/// Escape text for HTML element content and quoted attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// A one-off notice shown at the top of a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub success: bool,
    pub text: String,
}

impl Flash {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            success: false,
            text: text.into(),
        }
    }

    fn render(&self) -> String {
        let class = if self.success { "success" } else { "error" };
        format!(
            "<div class=\"message {class}\">{}</div>\n",
            escape_html(&self.text)
        )
    }
}

/// Wrap page content in the shared document shell
pub(crate) fn layout(title: &str, body: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <link rel="stylesheet" href="/assets/styles.css">
    <script src="/assets/script.js" defer></script>
</head>
<body>
<div class="content-wrapper">
{body}
</div>
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    )
}
