//! Cursor pagination over `Link: <...>; rel="next"` headers
//!
//! Pages are fetched strictly one after another because the next cursor is
//! only known once the previous page is parsed. Every page request goes
//! through the credential's rate limiter. A fetch always terminates: visited
//! URLs are remembered and a page cap bounds servers that keep minting new
//! cursors.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{HeaderMap, LINK};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::providers::http_client::{read_json, ClientContext};
use crate::providers::traits::ProviderError;

static NEXT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid regex"));

/// Why a paginated fetch stopped
#[derive(Debug)]
pub enum PageTermination {
    /// No further `rel="next"` link
    Exhausted,
    /// The server pointed back at an already visited URL
    CycleDetected { url: String },
    /// Page cap reached with a next link still present
    PageLimit { max_pages: usize },
    /// A page failed; earlier pages are kept
    Failed(ProviderError),
}

/// Items accumulated by a paginated fetch and how it ended
#[derive(Debug)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    pub pages: usize,
    pub termination: PageTermination,
}

impl<T> PagedResult<T> {
    pub fn failed(error: ProviderError) -> Self {
        PagedResult {
            items: Vec::new(),
            pages: 0,
            termination: PageTermination::Failed(error),
        }
    }

    /// True only when the server ran out of pages
    pub fn is_complete(&self) -> bool {
        matches!(self.termination, PageTermination::Exhausted)
    }

    /// Items when complete, otherwise the reason they may be partial
    pub fn into_complete(self) -> Result<Vec<T>, PageTermination> {
        match self.termination {
            PageTermination::Exhausted => Ok(self.items),
            other => Err(other),
        }
    }
}

/// Extract the `rel="next"` target from one or more `Link` headers
pub fn next_link(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| NEXT_LINK.captures(value).map(|c| c[1].to_string()))
}

/// Follows next-page links for one credential
pub struct PagedFetcher<'a> {
    context: &'a ClientContext,
    max_pages: usize,
}

impl<'a> PagedFetcher<'a> {
    pub fn new(context: &'a ClientContext, max_pages: usize) -> Self {
        PagedFetcher {
            context,
            max_pages: max_pages.max(1),
        }
    }

    /// Fetch every page starting at `endpoint`, collecting the array under
    /// `field` of each JSON body.
    #[instrument(skip(self))]
    pub async fn fetch_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        field: &str,
        credential_index: usize,
    ) -> PagedResult<T> {
        let start = match self.context.endpoint(endpoint) {
            Ok(url) => url,
            Err(e) => return PagedResult::failed(e.into()),
        };

        let mut items = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut next = Some(start);
        let mut pages = 0;

        let termination = loop {
            let Some(url) = next.take() else {
                break PageTermination::Exhausted;
            };

            if !visited.insert(url.as_str().to_string()) {
                warn!(url = %url, "Pagination stopped: URL already visited");
                break PageTermination::CycleDetected { url: url.to_string() };
            }

            if pages >= self.max_pages {
                warn!(max_pages = self.max_pages, "Pagination stopped: page limit reached");
                break PageTermination::PageLimit { max_pages: self.max_pages };
            }

            match self.fetch_page::<T>(&url, field, credential_index).await {
                Ok((page, link)) => {
                    pages += 1;
                    debug!(page = pages, count = page.len(), "Fetched page");
                    items.extend(page);
                    next = match link.map(|target| url.join(&target)) {
                        Some(Ok(target)) => Some(target),
                        Some(Err(e)) => {
                            break PageTermination::Failed(ProviderError::UnexpectedShape(format!(
                                "invalid next link: {}",
                                e
                            )));
                        }
                        None => None,
                    };
                }
                Err(e) => {
                    warn!(url = %url, error = %e, "Pagination aborted");
                    break PageTermination::Failed(e);
                }
            }
        };

        PagedResult {
            items,
            pages,
            termination,
        }
    }

    async fn fetch_page<T: DeserializeOwned>(
        &self,
        url: &Url,
        field: &str,
        credential_index: usize,
    ) -> Result<(Vec<T>, Option<String>), ProviderError> {
        let response = self
            .context
            .get(url.clone(), credential_index)?
            .send_with_retry()
            .await?;
        let link = next_link(response.headers());
        let mut body: serde_json::Value = read_json(response).await?;
        let page = match body.get_mut(field).map(serde_json::Value::take) {
            Some(serde_json::Value::Array(values)) => values
                .into_iter()
                .map(serde_json::from_value)
                .collect::<Result<Vec<T>, _>>()
                .map_err(|e| ProviderError::UnexpectedShape(format!("{}: {}", field, e)))?,
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(_) => {
                return Err(ProviderError::UnexpectedShape(format!(
                    "'{}' is not an array",
                    field
                )))
            }
        };

        Ok((page, link))
    }
}
