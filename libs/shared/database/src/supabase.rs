use anyhow::{Result, anyhow};
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_RANGE, CONTENT_TYPE, AUTHORIZATION},
    Method, Response,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin PostgREST client. Every table access in the service goes through here.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // PostgREST treats the anon key as a bearer token when no user token is given
        let bearer = auth_token.unwrap_or(&self.anon_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", bearer))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, extra_headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Exact row count for a filtered table path, read from `Content-Range`.
    pub async fn count(&self, path: &str, auth_token: Option<&str>) -> Result<u64> {
        let response = self.send(Method::HEAD, path, auth_token, None, Some(Self::count_exact())).await?;
        content_range_total(response.headers())?
            .ok_or_else(|| anyhow!("Missing row count in response to {}", path))
    }

    /// Reads every row behind `path`, a page at a time. PostgREST may cap a
    /// page below `page_size` (`max-rows`), so paging follows the total the
    /// server reports rather than the size of each page.
    pub async fn fetch_all<T>(&self, path: &str, auth_token: Option<&str>, page_size: usize)
                              -> Result<Vec<T>>
    where T: DeserializeOwned {
        let page_size = page_size.max(1);
        let separator = if path.contains('?') { '&' } else { '?' };
        let mut rows: Vec<T> = Vec::new();

        loop {
            let page_path = format!("{}{}limit={}&offset={}", path, separator, page_size, rows.len());
            let response = self
                .send(Method::GET, &page_path, auth_token, None, Some(Self::count_exact()))
                .await?;
            let total = content_range_total(response.headers())?;
            let page: Vec<T> = response.json().await?;
            let received = page.len();
            rows.extend(page);

            let done = match total {
                Some(total) => received == 0 || rows.len() as u64 >= total,
                None => received < page_size,
            };
            if done {
                break;
            }
            debug!("Fetched {} rows from {}, continuing", rows.len(), path);
        }

        Ok(rows)
    }

    async fn send(&self, method: Method, path: &str,
                  auth_token: Option<&str>, body: Option<Value>,
                  extra_headers: Option<HeaderMap>)
                  -> Result<Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        Ok(response)
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    fn count_exact() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("count=exact"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

/// Total from a PostgREST `Content-Range` such as `0-24/311` or `*/0`.
/// `Ok(None)` when the header is absent or the total is unknown (`*`).
pub fn content_range_total(headers: &HeaderMap) -> Result<Option<u64>> {
    let Some(value) = headers.get(CONTENT_RANGE) else {
        return Ok(None);
    };

    let value = value.to_str()?;
    let total = value
        .rsplit_once('/')
        .map(|(_, total)| total)
        .ok_or_else(|| anyhow!("Malformed Content-Range: {}", value))?;

    if total == "*" {
        return Ok(None);
    }
    Ok(Some(total.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_range(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_RANGE, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(content_range_total(&with_range("0-24/311")).unwrap(), Some(311));
        assert_eq!(content_range_total(&with_range("*/0")).unwrap(), Some(0));
        assert_eq!(content_range_total(&with_range("0-24/*")).unwrap(), None);
        assert_eq!(content_range_total(&HeaderMap::new()).unwrap(), None);
        assert!(content_range_total(&with_range("garbage")).is_err());
    }
}
