//! HTTP-backed `Encyclopedia` implementation: search + article fetch against the
//! external encyclopedia endpoint (spec §6).
//!
//! Search results and articles are parsed with `scraper`'s CSS selectors.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};

use crate::config::AgentConfig;
use crate::error::AgentError;
use crate::sources::encyclopedia::{split_into_sections, HeaderOrProse};
use crate::sources::traits::{ArticlePage, Encyclopedia};

/// Per-outbound-HTTP-request timeout (spec `HTTP_TIMEOUT`, design value 10s; default,
/// overridable via `AgentConfig`).
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpEncyclopedia {
    client: reqwest::Client,
    search_url: String,
    user_agent: String,
}

impl HttpEncyclopedia {
    pub fn new(search_url: impl Into<String>, cfg: &AgentConfig) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .build()
            .map_err(|e| AgentError::HttpFailed(e.to_string()))?;
        Ok(Self {
            client,
            search_url: search_url.into(),
            user_agent: "noesis-research-bot".to_string(),
        })
    }
}

#[async_trait]
impl Encyclopedia for HttpEncyclopedia {
    async fn search(&self, query: &str) -> Result<Option<(String, String)>, AgentError> {
        let response = self
            .client
            .get(&self.search_url)
            .query(&[("query", query)])
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AgentError::HttpFailed(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::HttpFailed(e.to_string()))?;
        Ok(parse_first_search_result(&body))
    }

    async fn fetch_article(&self, url: &str) -> Result<ArticlePage, AgentError> {
        let response = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .send()
            .await
            .map_err(|e| AgentError::HttpFailed(e.to_string()))?;
        let body = response
            .text()
            .await
            .map_err(|e| AgentError::HttpFailed(e.to_string()))?;
        Ok(parse_article(&body))
    }
}

fn parse_first_search_result(html: &str) -> Option<(String, String)> {
    let doc = Html::parse_document(html);
    let listing_sel = Selector::parse("div.result_listing").ok()?;
    let title_sel = Selector::parse("div.result_title a").ok()?;

    let listing = doc.select(&listing_sel).next()?;
    let link = listing.select(&title_sel).next()?;
    let href = link.value().attr("href")?.to_string();
    let title = link.text().collect::<String>().trim().to_string();
    Some((title, href))
}

fn parse_article(html: &str) -> ArticlePage {
    let doc = Html::parse_document(html);

    let title = meta_content(&doc, "citation_title").unwrap_or_default();
    let authors = meta_contents(&doc, "citation_author");
    let publication_date = meta_content(&doc, "citation_publication_date").unwrap_or_default();

    let sections = main_content_sections(&doc);

    ArticlePage {
        title,
        authors,
        publication_date,
        sections,
    }
}

fn meta_content(doc: &Html, property: &str) -> Option<String> {
    let selector = Selector::parse(&format!("meta[property=\"{property}\"]")).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.to_string())
}

fn meta_contents(doc: &Html, property: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(&format!("meta[property=\"{property}\"]")) else {
        return Vec::new();
    };
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(|s| s.to_string())
        .collect()
}

fn main_content_sections(doc: &Html) -> Vec<crate::sources::traits::Section> {
    let Ok(main_sel) = Selector::parse("#main-text") else {
        return Vec::new();
    };
    let Some(main) = doc.select(&main_sel).next() else {
        return Vec::new();
    };
    let Ok(child_sel) = Selector::parse("h1,h2,h3,h4,h5,h6,p") else {
        return Vec::new();
    };

    let children: Vec<(HeaderOrProse, String)> = main
        .select(&child_sel)
        .map(|el| {
            let kind = match el.value().name() {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => HeaderOrProse::Header,
                _ => HeaderOrProse::Prose,
            };
            let text = el.text().collect::<String>().trim().to_string();
            (kind, text)
        })
        .filter(|(_, text)| !text.is_empty())
        .collect();

    split_into_sections(&children)
}
