use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error body shared by every endpoint: `error` is the failing stage,
/// `detail` the upstream or validation message.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Parameter bundle forwarded verbatim to the scrape provider. Unknown flags
/// ride along in `extra` so the passthrough stays faithful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeParams {
    pub target: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parse: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoselect_variant: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_from: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ScrapeParams {
    pub fn product(asin: &str) -> Self {
        Self {
            target: "amazon_product".into(),
            query: asin.to_string(),
            parse: Some(true),
            autoselect_variant: Some(false),
            page_from: None,
            extra: Map::new(),
        }
    }

    pub fn search(hero_keyword: &str) -> Self {
        Self {
            target: "amazon_search".into(),
            query: hero_keyword.to_string(),
            parse: Some(true),
            autoselect_variant: None,
            page_from: Some("1".into()),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletPointsRequest {
    pub asin: String,
    pub hero_keyword: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BulletPointsResponse {
    pub product: Option<crate::db::ProductSummary>,
    pub competitors: Vec<CompetitorListing>,
}

/// Competitor row merged with backfilled copy for the bullet/description steps.
#[derive(Debug, Clone, Serialize)]
pub struct CompetitorListing {
    pub asin: String,
    pub title: Option<String>,
    pub position: i32,
    pub bullet_points: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TitleSuggestRequest {
    pub current_title: String,
    pub competitor_titles: Vec<String>,
    pub hero_keyword: String,
}

/// One of the five optimized title candidates the model returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TitleSuggestion {
    pub title: String,
    #[serde(default)]
    pub ctr_increase: String,
    #[serde(default)]
    pub cr_increase: String,
    #[serde(default)]
    pub justification: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub focus: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeywordGapRequest {
    pub current_title: String,
    pub competitor_titles: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletGapRequest {
    pub current_bullets: Vec<String>,
    pub competitor_bullets: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulletIdeasRequest {
    pub competitor_bullets: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionIdeasRequest {
    pub competitor_descriptions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingKeyword {
    pub keyword: String,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub competitors_using: Vec<String>,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub priority: String,
}

/// Keyword-gap analysis result for either titles or bullet points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordGapReport {
    #[serde(default)]
    pub missing_keywords: Vec<MissingKeyword>,
    #[serde(default)]
    pub our_existing_keywords: Vec<String>,
    #[serde(default)]
    pub high_value_gaps: Vec<String>,
}

impl KeywordGapReport {
    /// Derived-field consistency: every high-value gap should also appear in
    /// the missing-keyword list. The rule is prompt-embedded, not enforced,
    /// so callers only warn on violations.
    pub fn is_consistent(&self) -> bool {
        self.high_value_gaps.iter().all(|gap| {
            self.missing_keywords
                .iter()
                .any(|missing| missing.keyword.eq_ignore_ascii_case(gap))
        })
    }
}

/// One listing's copy, in the wire shape the front end exchanges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingContent {
    pub title: String,
    pub bullet_points: Vec<String>,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub original_listing: ListingContent,
    pub optimized_listing: ListingContent,
    pub hero_keyword: String,
}

/// Before/after improvement estimate. All four metric fields are clamped to
/// be non-negative before leaving the server, whatever the model said.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingMetrics {
    pub ctr_improvement: f64,
    pub conversion_improvement: f64,
    pub keyword_improvement: f64,
    pub total_sales_lift: f64,
    #[serde(default)]
    pub analysis_summary: String,
}

impl ListingMetrics {
    /// Fixed estimate served when the LLM provider is unreachable or not
    /// configured; the preview must never fail outright on this path.
    pub fn fallback() -> Self {
        Self {
            ctr_improvement: 12.0,
            conversion_improvement: 8.0,
            keyword_improvement: 45.0,
            total_sales_lift: 18.0,
            analysis_summary: "Fallback metrics - OpenAI API not configured".into(),
        }
    }

    pub fn clamp_non_negative(&mut self) {
        self.ctr_improvement = self.ctr_improvement.max(0.0);
        self.conversion_improvement = self.conversion_improvement.max(0.0);
        self.keyword_improvement = self.keyword_improvement.max(0.0);
        self.total_sales_lift = self.total_sales_lift.max(0.0);
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpellcheckRequest {
    pub text: String,
}

/// A genuine misspelling: `start`/`end` index into the checked text,
/// `suggestion` is guaranteed to differ from `word`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellingError {
    pub word: String,
    pub start: usize,
    pub end: usize,
    pub suggestion: String,
}
