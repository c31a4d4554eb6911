use crate::db::{ProductRow, SearchResultRow, SupabaseClient};
use crate::http::build_client;
use crate::models::ScrapeParams;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use serde_with::{DefaultOnNull, serde_as};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Minimum review count a competitor needs before its search row is worth
/// persisting; anything below is low-traffic noise.
const MIN_COMPETITOR_REVIEWS: i64 = 50;

const DEFAULT_BASE_URL: &str = "https://scraper-api.smartproxy.com";

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("missing DECODO_KEY env variable")]
    MissingCredential,
    #[error("request failed: {0}")]
    Request(String),
    #[error("scrape provider error: {0}")]
    Upstream(String),
    #[error("unexpected scrape payload: {0}")]
    UnexpectedShape(String),
    #[error(transparent)]
    Persist(#[from] crate::db::SupabaseError),
}

/// Scrape provider client plus the persistence side effects that follow a
/// successful call: product scrapes upsert `products`, search scrapes insert
/// filtered `search_results` rows.
#[derive(Debug, Clone)]
pub struct ScrapeService {
    base_url: String,
    credential: Option<String>,
    http: Client,
    db: SupabaseClient,
}

impl ScrapeService {
    pub fn new(
        base_url: impl Into<String>,
        credential: Option<String>,
        http: Client,
        db: SupabaseClient,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credential,
            http,
            db,
        }
    }

    pub fn from_env(db: SupabaseClient) -> Self {
        let base_url =
            std::env::var("DECODO_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        Self::new(base_url, credential_from_env(), build_client(), db)
    }

    /// Forward a parameter bundle to the provider, persist what came back,
    /// and return the provider JSON verbatim.
    pub async fn scrape(&self, params: &ScrapeParams) -> Result<Value, ScrapeError> {
        let credential = self
            .credential
            .as_deref()
            .ok_or(ScrapeError::MissingCredential)?;
        debug!(
            target = "listinglift.decodo",
            scrape_target = %params.target,
            query = %params.query,
            credential = %mask_credential(credential),
            "firing scrape request"
        );

        let started = std::time::Instant::now();
        let response = self
            .http
            .post(format!("{}/v2/scrape", self.base_url))
            .header("Accept", "application/json")
            .header("Authorization", credential)
            .json(params)
            .send()
            .await
            .map_err(|err| ScrapeError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ScrapeError::Upstream(format!(
                "Decodo API error: {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|err| ScrapeError::Request(err.to_string()))?;
        crate::metrics::scrape_elapsed(&params.target, started.elapsed().as_millis());

        match params.target.as_str() {
            "amazon_product" => {
                let row = product_row_from_response(&payload)?;
                self.db.upsert_product(&row).await?;
                info!(
                    target = "listinglift.decodo",
                    asin = %row.asin,
                    "product saved"
                );
            }
            "amazon_search" => {
                // The provider omits the organic block for empty result pages;
                // nothing to persist in that case.
                if let Some(organic) = organic_results(&payload) {
                    let hero_keyword = search_query(&payload)
                        .unwrap_or_else(|| params.query.clone());
                    let rows = persistable_search_rows(&hero_keyword, organic);
                    let count = rows.len();
                    self.db.insert_search_results(&rows).await?;
                    info!(
                        target = "listinglift.decodo",
                        hero_keyword = %hero_keyword,
                        rows = count,
                        "search results saved"
                    );
                } else {
                    warn!(
                        target = "listinglift.decodo",
                        query = %params.query,
                        "search response had no organic results"
                    );
                }
            }
            _ => {}
        }

        Ok(payload)
    }

    /// Fire-and-collect fan-out, one task per bundle. Any failed call fails
    /// the whole batch; there is no partial-failure isolation.
    pub async fn scrape_batch(&self, batch: Vec<ScrapeParams>) -> Result<Vec<Value>, ScrapeError> {
        let mut handles = Vec::with_capacity(batch.len());
        for params in batch {
            let service = self.clone();
            handles.push(tokio::spawn(async move { service.scrape(&params).await }));
        }
        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let payload = handle
                .await
                .map_err(|err| ScrapeError::Request(err.to_string()))??;
            results.push(payload);
        }
        Ok(results)
    }
}

/// `DECODO_KEY` holds the ready-made Authorization value; alternatively a
/// username/password pair is folded into Basic credentials.
fn credential_from_env() -> Option<String> {
    if let Ok(key) = std::env::var("DECODO_KEY")
        && !key.trim().is_empty()
    {
        return Some(key);
    }
    match (
        std::env::var("DECODO_USERNAME"),
        std::env::var("DECODO_PASSWORD"),
    ) {
        (Ok(user), Ok(pass)) => Some(format!("Basic {}", BASE64.encode(format!("{user}:{pass}")))),
        _ => None,
    }
}

fn mask_credential(credential: &str) -> String {
    let chars: Vec<char> = credential.chars().collect();
    if chars.len() > 8 {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}...{tail}")
    } else {
        credential.to_string()
    }
}

/// Product fields as the provider returns them under
/// `results[0].content.results`.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedProduct {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub reviews_count: i64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// One organic search hit under
/// `results[0].content.results.results.organic[]`.
#[serde_as]
#[derive(Debug, Clone, Deserialize)]
pub struct ScrapedOrganic {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub reviews_count: i64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pos: Option<i32>,
}

fn product_row_from_response(payload: &Value) -> Result<ProductRow, ScrapeError> {
    let content = payload
        .pointer("/results/0/content/results")
        .cloned()
        .ok_or_else(|| ScrapeError::UnexpectedShape("missing results[0].content.results".into()))?;
    let scraped: ScrapedProduct = serde_json::from_value(content)
        .map_err(|err| ScrapeError::UnexpectedShape(err.to_string()))?;
    Ok(ProductRow {
        asin: scraped.asin,
        title: scraped.title,
        reviews_count: Some(scraped.reviews_count),
        rating: scraped.rating,
        bullet_points: scraped.bullet_points,
        description: scraped.description,
        created_at: Utc::now(),
    })
}

fn organic_results(payload: &Value) -> Option<Vec<ScrapedOrganic>> {
    let organic = payload
        .pointer("/results/0/content/results/results/organic")?
        .clone();
    serde_json::from_value(organic).ok()
}

fn search_query(payload: &Value) -> Option<String> {
    payload
        .pointer("/results/0/content/results/query")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Filter out low-traffic competitors and attach 1-based positions (provider
/// rank when present, rank among the surviving rows otherwise).
pub(crate) fn persistable_search_rows(
    hero_keyword: &str,
    organic: Vec<ScrapedOrganic>,
) -> Vec<SearchResultRow> {
    organic
        .into_iter()
        .filter(|item| item.reviews_count >= MIN_COMPETITOR_REVIEWS)
        .enumerate()
        .map(|(idx, item)| SearchResultRow {
            hero_keyword: hero_keyword.to_string(),
            asin: item.asin,
            title: item.title,
            reviews_count: item.reviews_count,
            rating: item.rating,
            bullet_points: item.bullet_points,
            description: item.description,
            position: item.pos.unwrap_or(idx as i32 + 1),
            created_at: Utc::now(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn organic(asin: &str, reviews_count: i64, pos: Option<i32>) -> ScrapedOrganic {
        ScrapedOrganic {
            asin: asin.into(),
            title: Some(format!("{asin} title")),
            reviews_count,
            rating: Some(4.4),
            bullet_points: None,
            description: None,
            pos,
        }
    }

    #[test]
    fn low_review_competitors_are_not_persisted() {
        let rows = persistable_search_rows(
            "matcha powder",
            vec![organic("A", 10, Some(1)), organic("B", 80, Some(2))],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asin, "B");
        assert_eq!(rows[0].hero_keyword, "matcha powder");
    }

    #[test]
    fn exactly_fifty_reviews_is_persisted() {
        let rows = persistable_search_rows("tea", vec![organic("C", 50, None)]);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn position_falls_back_to_list_order() {
        let rows = persistable_search_rows(
            "tea",
            vec![organic("A", 90, None), organic("B", 70, Some(7))],
        );
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[1].position, 7);
    }

    #[test]
    fn fallback_positions_rank_surviving_rows_only() {
        // A filtered-out row must not shift the fallback rank of the rows
        // that survive.
        let rows = persistable_search_rows(
            "matcha powder",
            vec![organic("LOW", 10, None), organic("BIG", 80, None)],
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asin, "BIG");
        assert_eq!(rows[0].position, 1);
    }

    #[test]
    fn product_row_extracts_nested_content() {
        let payload = json!({
            "results": [{
                "content": {
                    "results": {
                        "asin": "B07DJ1KVDP",
                        "title": "Organic Matcha Powder",
                        "reviews_count": 1234,
                        "rating": 4.6,
                        "bullet_points": "line one\nline two",
                        "description": "A fine matcha."
                    }
                }
            }]
        });
        let row = product_row_from_response(&payload).expect("row");
        assert_eq!(row.asin, "B07DJ1KVDP");
        assert_eq!(row.reviews_count, Some(1234));
        assert!(row.bullet_points.as_deref().unwrap().contains('\n'));
    }

    #[test]
    fn product_row_rejects_missing_content() {
        let err = product_row_from_response(&json!({"results": []})).expect_err("shape");
        assert!(matches!(err, ScrapeError::UnexpectedShape(_)));
    }

    #[test]
    fn null_review_counts_default_to_zero() {
        let payload = json!({
            "results": [{
                "content": {
                    "results": {
                        "results": {
                            "organic": [
                                {"asin": "A", "reviews_count": null},
                                {"asin": "B", "reviews_count": 120}
                            ]
                        },
                        "query": "matcha powder"
                    }
                }
            }]
        });
        let organic = organic_results(&payload).expect("organic");
        assert_eq!(organic[0].reviews_count, 0);
        assert_eq!(search_query(&payload).as_deref(), Some("matcha powder"));
        let rows = persistable_search_rows("matcha powder", organic);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].asin, "B");
    }

    #[test]
    fn credentials_are_masked_in_logs() {
        assert_eq!(mask_credential("Basic c2VjcmV0a2V5"), "Basi...a2V5");
        assert_eq!(mask_credential("short"), "short");
    }

    #[test]
    fn masking_handles_multibyte_credentials() {
        assert_eq!(mask_credential("Basic sécrets-clés"), "Basi...clés");
    }
}
