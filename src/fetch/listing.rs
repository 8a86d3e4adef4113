//! Paginated listing fetch
//!
//! One [`DocumentFetcher`] serves the whole run; the session is passed
//! per call so rotation can swap credentials between entities (or
//! between retries of the same entity) without rebuilding the fetcher.

use crate::auth::Session;
use crate::config::FetchConfig;
use crate::fetch::client::session_headers;
use crate::fetch::envelope::{classify_failure, ApiEnvelope};
use crate::fetch::normalize::normalize_notice;
use crate::fetch::{FetchError, FetchErrorKind};
use crate::storage::DocumentRecord;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Fetches and normalizes the notice listing for one entity at a time
pub struct DocumentFetcher {
    client: Client,
    listing_url: Url,
    origin: Url,
    config: FetchConfig,
}

impl DocumentFetcher {
    pub fn new(
        client: Client,
        base_url: &Url,
        listing_path: &str,
        config: FetchConfig,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            client,
            listing_url: base_url.join(listing_path)?,
            origin: base_url.clone(),
            config,
        })
    }

    /// Fetches every listing page for one entity and returns the
    /// normalized records
    ///
    /// # Arguments
    ///
    /// * `session` - Authentication to ride on
    /// * `code` - The entity's portal code (used in the query payload)
    /// * `short_name` - The entity's short name (recorded on each document)
    ///
    /// # Errors
    ///
    /// Rate-limit and token-expiry responses surface as tagged errors for
    /// the rotation controller. Exceeding the page cap is an error, never
    /// an endless loop.
    pub async fn fetch_documents(
        &self,
        session: &Session,
        code: &str,
        short_name: &str,
    ) -> Result<Vec<DocumentRecord>, FetchError> {
        let referer = self.entity_referer(code)?;
        let size = self.config.page_size;

        let mut documents = Vec::new();
        let mut skip: u32 = 0;
        let mut page: u32 = 1;

        loop {
            if page > self.config.max_pages {
                return Err(FetchError::new(
                    FetchErrorKind::PageLimitExceeded,
                    format!("{}: exceeded {} pages", short_name, self.config.max_pages),
                ));
            }

            tracing::debug!(entity = short_name, page, skip, "Fetching listing page");
            let envelope = self.fetch_page(session, code, &referer, skip).await?;

            if !envelope.is_ok() {
                let info = envelope.info_message().to_string();
                let kind = classify_failure(&info);
                if kind == FetchErrorKind::NoData {
                    tracing::info!(entity = short_name, "Portal reports no notices");
                    break;
                }
                return Err(FetchError::new(kind, info));
            }

            let items = envelope.items();
            if items.is_empty() {
                tracing::debug!(entity = short_name, page, "Empty page, stopping");
                break;
            }

            let raw_count = items.len();
            documents.extend(
                items
                    .iter()
                    .filter_map(|item| normalize_notice(item, short_name, &self.origin)),
            );

            if raw_count < size as usize {
                tracing::debug!(entity = short_name, page, "Short page, stopping");
                break;
            }

            skip += size;
            page += 1;
            self.page_delay().await;
        }

        tracing::info!(
            entity = short_name,
            documents = documents.len(),
            pages = page,
            "Listing fetch complete"
        );
        Ok(documents)
    }

    /// One POST to the listing endpoint, with bounded local retries for
    /// transport failures and 5xx responses (linear backoff)
    async fn fetch_page(
        &self,
        session: &Session,
        code: &str,
        referer: &str,
        skip: u32,
    ) -> Result<ApiEnvelope, FetchError> {
        let size = self.config.page_size.to_string();
        let skip_str = skip.to_string();
        let form = [
            ("code", code),
            ("skip", skip_str.as_str()),
            ("size", size.as_str()),
            ("type", "co"),
            ("tab", "notice_bond_coRelated"),
        ];

        let mut attempt = 1;
        loop {
            let headers = session_headers(session, referer)?;
            let result = self
                .client
                .post(self.listing_url.clone())
                .headers(headers)
                .form(&form)
                .send()
                .await;

            let retryable = match &result {
                Ok(response) if response.status().is_server_error() => {
                    Some(format!("HTTP {}", response.status().as_u16()))
                }
                Err(e) => Some(e.to_string()),
                Ok(_) => None,
            };

            if let Some(reason) = retryable {
                if attempt < self.config.retry_attempts {
                    let backoff = Duration::from_secs(self.config.retry_delay_secs * attempt as u64);
                    tracing::warn!(
                        attempt,
                        reason,
                        "Transient listing failure, retrying in {:?}",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                return match result {
                    Ok(response) => Err(FetchError::new(
                        FetchErrorKind::Http(response.status().as_u16()),
                        reason,
                    )),
                    Err(e) => Err(e.into()),
                };
            }

            let response = result?;
            let status = response.status();
            if !status.is_success() {
                return Err(FetchError::new(
                    FetchErrorKind::Http(status.as_u16()),
                    format!("listing request returned {}", status),
                ));
            }

            return response
                .json::<ApiEnvelope>()
                .await
                .map_err(|e| FetchError::new(FetchErrorKind::Unknown, format!("bad envelope: {}", e)));
        }
    }

    fn entity_referer(&self, code: &str) -> Result<String, FetchError> {
        let mut url = self
            .origin
            .join("/detail/bond/notice")
            .map_err(|e| FetchError::new(FetchErrorKind::Network, e.to_string()))?;
        url.set_query(Some(&format!("code={}&type=co", code)));
        Ok(url.to_string())
    }

    /// Mandatory randomized inter-page delay
    async fn page_delay(&self) {
        let (min, max) = (
            self.config.page_delay_min_ms,
            self.config.page_delay_max_ms,
        );
        let delay = if max > min {
            rand::thread_rng().gen_range(min..=max)
        } else {
            min
        };
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }
}
