use crate::http::build_client;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;

/// Typed PostgREST access to the two persisted entities, `products` and
/// `search_results`. All cross-request state lives here; the process itself
/// keeps nothing.
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    http: Client,
}

#[derive(Debug, Error)]
pub enum SupabaseError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

/// `products` row, keyed by ASIN. Overwritten on every product scrape,
/// never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRow {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reviews_count: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// `search_results` row, keyed by (hero_keyword, asin). Append-only: repeat
/// searches insert new rows rather than upserting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResultRow {
    pub hero_keyword: String,
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    pub reviews_count: i64,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub position: i32,
    pub created_at: DateTime<Utc>,
}

/// Column subset used by the bullet-points endpoint and title prefill.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductSummary {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductSummary {
    /// A product with a null or empty bullet or description blob still needs
    /// a targeted scrape before the wizard can use it.
    pub fn needs_backfill(&self) -> bool {
        fn blank(value: Option<&str>) -> bool {
            value.is_none_or(|text| text.trim().is_empty())
        }
        blank(self.bullet_points.as_deref()) || blank(self.description.as_deref())
    }
}

/// Column subset for the competitor backfill pass.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductFill {
    pub asin: String,
    #[serde(default)]
    pub bullet_points: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Competitor row as surfaced to the wizard, ranked by search position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorRow {
    pub asin: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub reviews_count: Option<i64>,
    #[serde(default)]
    pub rating: Option<f64>,
    pub position: i32,
}

/// How many competitors the comparison views work from.
pub const COMPETITOR_LIMIT: usize = 10;

impl SupabaseClient {
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>, http: Client) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            http,
        }
    }

    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_SERVICE_KEY"))
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()?;
        Some(Self::new(base_url, service_key, build_client()))
    }

    pub async fn fetch_product(&self, asin: &str) -> Result<Option<ProductSummary>, SupabaseError> {
        let url = format!(
            "{}/rest/v1/products?select=asin,title,bullet_points,description&asin=eq.{}&limit=1",
            self.base_url,
            encode(asin)
        );
        let mut rows: Vec<ProductSummary> = self.get_rows(url).await?;
        Ok(rows.pop())
    }

    pub async fn fetch_product_title(&self, asin: &str) -> Result<Option<String>, SupabaseError> {
        Ok(self
            .fetch_product(asin)
            .await?
            .and_then(|product| product.title)
            .filter(|title| !title.trim().is_empty()))
    }

    pub async fn product_exists(&self, asin: &str) -> Result<bool, SupabaseError> {
        let url = format!(
            "{}/rest/v1/products?select=asin&asin=eq.{}&limit=1",
            self.base_url,
            encode(asin)
        );
        let rows: Vec<serde_json::Value> = self.get_rows(url).await?;
        Ok(!rows.is_empty())
    }

    pub async fn search_results_exist(&self, hero_keyword: &str) -> Result<bool, SupabaseError> {
        let url = format!(
            "{}/rest/v1/search_results?select=asin&hero_keyword=eq.{}&limit=1",
            self.base_url,
            encode(hero_keyword)
        );
        let rows: Vec<serde_json::Value> = self.get_rows(url).await?;
        Ok(!rows.is_empty())
    }

    /// Top competitors for a hero keyword, best search rank first.
    pub async fn fetch_competitors(
        &self,
        hero_keyword: &str,
    ) -> Result<Vec<CompetitorRow>, SupabaseError> {
        let url = format!(
            "{}/rest/v1/search_results?select=asin,title,reviews_count,rating,position\
             &hero_keyword=eq.{}&order=position.asc&limit={}",
            self.base_url,
            encode(hero_keyword),
            COMPETITOR_LIMIT
        );
        self.get_rows(url).await
    }

    pub async fn fetch_products_by_asins(
        &self,
        asins: &[String],
    ) -> Result<Vec<ProductFill>, SupabaseError> {
        if asins.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!(
            "{}/rest/v1/products?select=asin,bullet_points,description&asin={}",
            self.base_url,
            in_filter(asins)
        );
        self.get_rows(url).await
    }

    pub async fn upsert_product(&self, row: &ProductRow) -> Result<(), SupabaseError> {
        let url = format!("{}/rest/v1/products?on_conflict=asin", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&[row])
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn insert_search_results(
        &self,
        rows: &[SearchResultRow],
    ) -> Result<(), SupabaseError> {
        if rows.is_empty() {
            return Ok(());
        }
        let url = format!("{}/rest/v1/search_results", self.base_url);
        let response = self
            .http
            .post(url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }
        Ok(())
    }

    async fn get_rows<T: DeserializeOwned>(&self, url: String) -> Result<Vec<T>, SupabaseError> {
        let response = self
            .http
            .get(url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .send()
            .await
            .map_err(|err| SupabaseError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(SupabaseError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|err| SupabaseError::Deserialize(err.to_string()))
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// PostgREST `in.(a,b,c)` filter value over pre-encoded members.
fn in_filter(values: &[String]) -> String {
    let joined = values
        .iter()
        .map(|value| encode(value))
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hero_keywords_are_url_encoded() {
        assert_eq!(encode("matcha powder"), "matcha%20powder");
    }

    #[test]
    fn in_filter_joins_asins() {
        let asins = vec!["B07DJ1KVDP".to_string(), "B01HQPPWHG".to_string()];
        assert_eq!(in_filter(&asins), "in.(B07DJ1KVDP,B01HQPPWHG)");
    }

    #[test]
    fn needs_backfill_on_any_null_blob() {
        let full = ProductSummary {
            asin: "A".into(),
            title: Some("t".into()),
            bullet_points: Some("b".into()),
            description: Some("d".into()),
        };
        assert!(!full.needs_backfill());
        assert!(
            ProductSummary {
                bullet_points: None,
                ..full.clone()
            }
            .needs_backfill()
        );
        assert!(
            ProductSummary {
                description: None,
                ..full.clone()
            }
            .needs_backfill()
        );
        // An empty blob is as useless as a missing one.
        assert!(
            ProductSummary {
                bullet_points: Some("  ".into()),
                ..full
            }
            .needs_backfill()
        );
    }
}
