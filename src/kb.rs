//! SUSE knowledge-base lookups for applicable findings.
//!
//! The search page is fetched over HTTPS and result anchors are scraped from
//! the HTML. Any failure, network or parse, yields an empty result list so
//! analysis never blocks on the knowledge base.

use std::time::Duration;

use regex::Regex;
use reqwest::blocking::Client;
use tracing::{debug, warn};

use crate::domain::patterns::{KbEntry, KnowledgeBase};

const KB_SERVER: &str = "https://www.suse.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

pub struct SuseKb {
    client: Client,
}

impl SuseKb {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("clusterlens/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn fetch(&self, product: &str, terms: &str) -> reqwest::Result<String> {
        let url = format!("{KB_SERVER}/support/kb/");
        debug!(product, terms, "querying knowledge base");
        self.client
            .get(&url)
            .query(&[("id", product), ("q", terms)])
            .send()?
            .error_for_status()?
            .text()
    }
}

impl Default for SuseKb {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeBase for SuseKb {
    fn search(&self, product: &str, terms: &str, max_results: usize) -> Vec<KbEntry> {
        match self.fetch(product, terms) {
            Ok(body) => extract_entries(&body, max_results),
            Err(err) => {
                warn!(error = %err, "knowledge base unreachable, continuing without references");
                Vec::new()
            }
        }
    }
}

/// Pull document anchors out of the result listing. Each looks like
/// `<a href="/support/kb/doc/?id=...">Title <span>(000012345)</span></a>`.
fn extract_entries(html: &str, max_results: usize) -> Vec<KbEntry> {
    let anchor_re =
        Regex::new(r#"(?s)<a\s+href="(/support/kb/doc/\?id=[^"]+)"[^>]*>(.*?)</a>"#).unwrap();
    let span_re = Regex::new(r"(?s)<span[^>]*>\((.*?)\)</span>").unwrap();
    let tag_re = Regex::new(r"<[^>]+>").unwrap();

    let mut entries = Vec::new();
    for caps in anchor_re.captures_iter(html) {
        if max_results > 0 && entries.len() >= max_results {
            break;
        }
        let url = format!("{KB_SERVER}{}", &caps[1]);
        let inner = &caps[2];
        let id = span_re
            .captures(inner)
            .map(|c| c[1].trim().to_string())
            .unwrap_or_default();
        // The span duplicates the id; drop it before stripping the markup.
        let title = tag_re
            .replace_all(&span_re.replace_all(inner, ""), "")
            .trim()
            .to_string();
        if id.is_empty() || title.is_empty() {
            continue;
        }
        entries.push(KbEntry { id, title, url });
    }
    debug!(count = entries.len(), "knowledge base entries extracted");
    entries
}
