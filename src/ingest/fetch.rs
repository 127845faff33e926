//! URL retrieval and visible-text extraction from fetched markup.

use reqwest::Client;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, instrument};

use super::IngestError;
use crate::config::DocloomConfig;

/// Elements whose subtrees carry no readable content.
const NON_CONTENT_TAGS: [&str; 7] = [
    "script", "style", "nav", "footer", "header", "aside", "noscript",
];

/// A fetched page reduced to its readable text.
#[derive(Clone, Debug)]
pub struct FetchedPage {
    /// Declared title, truncated, or the URL itself when absent.
    pub title: String,
    /// Visible text with blank lines discarded.
    pub text: String,
    /// `Content-Type` header of the final response, if any.
    pub content_type: Option<String>,
    /// Final status code after redirects.
    pub status: u16,
}

/// Build the HTTP client used for every fetch: bounded timeout, fixed
/// identifying user agent, redirects followed.
pub fn build_client(config: &DocloomConfig) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(config.fetch_timeout)
        .user_agent(config.user_agent.clone())
        .build()
}

/// Fetch `url` and reduce the response markup to title and readable text.
///
/// Non-2xx responses are fetch failures; so is exceeding the configured
/// timeout. Redirects are followed by the client.
#[instrument(skip(client, config))]
pub async fn fetch_page(
    client: &Client,
    url: &str,
    config: &DocloomConfig,
) -> Result<FetchedPage, IngestError> {
    let response = client.get(url).send().await?.error_for_status()?;
    let status = response.status().as_u16();
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from);
    let body = response.text().await?;

    let (text, title) = extract_readable(&body);
    let title = title
        .map(|t| truncate_title(&t, config.title_max_chars))
        .unwrap_or_else(|| url.to_string());

    debug!(status, chars = text.len(), "page fetched");

    Ok(FetchedPage {
        title,
        text,
        content_type,
        status,
    })
}

/// Strip non-content markup and collapse the remainder into one line per
/// text node, blank lines discarded. Returns the text and the declared
/// `<title>`, if present and non-empty.
pub fn extract_readable(html: &str) -> (String, Option<String>) {
    let document = Html::parse_document(html);

    let title_selector = Selector::parse("title").expect("title selector parses");
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let mut lines = Vec::new();
    collect_text(document.root_element(), &mut lines);

    (lines.join("\n"), title)
}

fn collect_text(element: ElementRef<'_>, lines: &mut Vec<String>) {
    if NON_CONTENT_TAGS.contains(&element.value().name()) {
        return;
    }
    for child in element.children() {
        if let Node::Text(text) = child.value() {
            for line in text.lines() {
                let line = line.trim();
                if !line.is_empty() {
                    lines.push(line.to_string());
                }
            }
        } else if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, lines);
        }
    }
}

fn truncate_title(title: &str, max_chars: usize) -> String {
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let truncated: String = title.chars().take(max_chars).collect();
    format!("{truncated}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html>
          <head><title>  Release Notes  </title><style>.x { color: red }</style></head>
          <body>
            <nav>Home | About</nav>
            <header>Site header</header>
            <h1>Release Notes</h1>
            <p>Version one shipped.</p>
            <script>console.log("hidden")</script>
            <aside>Related links</aside>
            <footer>Copyright</footer>
          </body>
        </html>
    "#;

    #[test]
    fn strips_non_content_elements() {
        let (text, title) = extract_readable(PAGE);
        assert_eq!(title.as_deref(), Some("Release Notes"));
        assert!(text.contains("Version one shipped."));
        assert!(!text.contains("console.log"));
        assert!(!text.contains("Home | About"));
        assert!(!text.contains("Site header"));
        assert!(!text.contains("Related links"));
        assert!(!text.contains("Copyright"));
        assert!(!text.contains("color: red"));
    }

    #[test]
    fn blank_lines_are_discarded() {
        let (text, _) = extract_readable("<p>one</p>\n\n\n<p>two</p>");
        assert_eq!(text, "one\ntwo");
    }

    #[test]
    fn missing_title_yields_none() {
        let (_, title) = extract_readable("<body><p>no title here</p></body>");
        assert_eq!(title, None);
    }

    #[test]
    fn long_titles_are_truncated_with_marker() {
        let long = "t".repeat(260);
        let truncated = truncate_title(&long, 200);
        assert_eq!(truncated.chars().count(), 203);
        assert!(truncated.ends_with("..."));
    }
}
