use crate::db::{CompetitorRow, ProductFill, SupabaseClient};
use crate::gateway::GatewayError;
use crate::models::{BulletPointsResponse, CompetitorListing, ScrapeParams};
use crate::scrape::ScrapeService;
use std::collections::HashMap;
use tracing::info;

/// Demo listing used by the seeded walkthrough.
pub const SAMPLE_ASIN: &str = "B07DJ1KVDP";
pub const SAMPLE_HERO_KEYWORD: &str = "matcha powder";

/// Product + competitor copy for the bullet and description steps,
/// backfilling any listing whose full copy was never scraped.
///
/// Search scrapes only persist the fields present on a result page, so
/// competitor rows routinely lack bullets and descriptions until a targeted
/// product scrape fills them in. Existence checks come first; repeat calls
/// with warm data issue no provider traffic.
pub async fn bullet_points(
    scraper: &ScrapeService,
    db: &SupabaseClient,
    asin: &str,
    hero_keyword: &str,
) -> Result<BulletPointsResponse, GatewayError> {
    if asin.trim().is_empty() || hero_keyword.trim().is_empty() {
        return Err(GatewayError::invalid_input(
            "bullet-points",
            "Missing asin or heroKeyword",
        ));
    }

    let mut product = db
        .fetch_product(asin)
        .await
        .map_err(db_err)?;
    if product.as_ref().is_none_or(|p| p.needs_backfill()) {
        info!(target = "listinglift.api", asin = %asin, "backfilling product copy");
        scraper
            .scrape(&ScrapeParams::product(asin))
            .await
            .map_err(scrape_err)?;
        product = db.fetch_product(asin).await.map_err(db_err)?;
    }

    let competitors = db.fetch_competitors(hero_keyword).await.map_err(db_err)?;
    let asins: Vec<String> = competitors.iter().map(|c| c.asin.clone()).collect();
    let mut fills = db.fetch_products_by_asins(&asins).await.map_err(db_err)?;

    let missing = asins_needing_backfill(&competitors, &fills);
    if !missing.is_empty() {
        info!(
            target = "listinglift.api",
            count = missing.len(),
            "backfilling competitor copy"
        );
        let batch: Vec<ScrapeParams> = missing.iter().map(|a| ScrapeParams::product(a)).collect();
        scraper.scrape_batch(batch).await.map_err(scrape_err)?;
        fills = db.fetch_products_by_asins(&asins).await.map_err(db_err)?;
    }

    Ok(BulletPointsResponse {
        product,
        competitors: merge_competitors(competitors, fills),
    })
}

/// Everything the wizard needs before its first step: guaranteed product and
/// search data plus the ranked competitor set and a title seed.
#[derive(Debug, Clone)]
pub struct RunSeed {
    pub asin: String,
    pub hero_keyword: String,
    pub competitors: Vec<CompetitorRow>,
    pub title_seed: Option<String>,
}

/// Warm the persisted data for a new optimization run. At most one product
/// scrape and one search scrape fire, and only when nothing is stored yet.
pub async fn seed_optimization_run(
    scraper: &ScrapeService,
    db: &SupabaseClient,
    asin: &str,
    hero_keyword: &str,
) -> Result<RunSeed, GatewayError> {
    if !db.product_exists(asin).await.map_err(db_err)? {
        scraper
            .scrape(&ScrapeParams::product(asin))
            .await
            .map_err(scrape_err)?;
    }
    if !db.search_results_exist(hero_keyword).await.map_err(db_err)? {
        scraper
            .scrape(&ScrapeParams::search(hero_keyword))
            .await
            .map_err(scrape_err)?;
    }

    let competitors = db.fetch_competitors(hero_keyword).await.map_err(db_err)?;
    let title_seed = db.fetch_product_title(asin).await.map_err(db_err)?;
    Ok(RunSeed {
        asin: asin.to_string(),
        hero_keyword: hero_keyword.to_string(),
        competitors,
        title_seed,
    })
}

/// Competitor ASINs with no stored copy, or stored copy missing either blob.
fn asins_needing_backfill(competitors: &[CompetitorRow], fills: &[ProductFill]) -> Vec<String> {
    let filled: HashMap<&str, &ProductFill> =
        fills.iter().map(|fill| (fill.asin.as_str(), fill)).collect();
    competitors
        .iter()
        .filter(|competitor| {
            filled
                .get(competitor.asin.as_str())
                .is_none_or(|fill| fill.bullet_points.is_none() || fill.description.is_none())
        })
        .map(|competitor| competitor.asin.clone())
        .collect()
}

/// Join ranked competitor rows with their backfilled copy, preserving rank
/// order.
fn merge_competitors(
    competitors: Vec<CompetitorRow>,
    fills: Vec<ProductFill>,
) -> Vec<CompetitorListing> {
    let mut filled: HashMap<String, ProductFill> = fills
        .into_iter()
        .map(|fill| (fill.asin.clone(), fill))
        .collect();
    competitors
        .into_iter()
        .map(|competitor| {
            let fill = filled.remove(&competitor.asin);
            CompetitorListing {
                asin: competitor.asin,
                title: competitor.title,
                position: competitor.position,
                bullet_points: fill.as_ref().and_then(|f| f.bullet_points.clone()),
                description: fill.and_then(|f| f.description),
            }
        })
        .collect()
}

fn db_err(err: crate::db::SupabaseError) -> GatewayError {
    GatewayError::upstream("supabase", err.to_string())
}

fn scrape_err(err: crate::scrape::ScrapeError) -> GatewayError {
    GatewayError::upstream("decodo", err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn competitor(asin: &str, position: i32) -> CompetitorRow {
        CompetitorRow {
            asin: asin.into(),
            title: Some(format!("{asin} title")),
            reviews_count: Some(120),
            rating: Some(4.5),
            position,
        }
    }

    fn fill(asin: &str, bullets: Option<&str>, description: Option<&str>) -> ProductFill {
        ProductFill {
            asin: asin.into(),
            bullet_points: bullets.map(str::to_string),
            description: description.map(str::to_string),
        }
    }

    #[test]
    fn backfill_targets_missing_and_partial_copy() {
        let competitors = vec![competitor("A", 1), competitor("B", 2), competitor("C", 3)];
        let fills = vec![
            fill("A", Some("bullets"), Some("desc")),
            fill("B", Some("bullets"), None),
        ];
        let missing = asins_needing_backfill(&competitors, &fills);
        assert_eq!(missing, vec!["B".to_string(), "C".to_string()]);
    }

    #[test]
    fn merge_keeps_rank_order_and_attaches_copy() {
        let competitors = vec![competitor("A", 1), competitor("B", 2)];
        let fills = vec![fill("B", Some("b-bullets"), Some("b-desc"))];
        let merged = merge_competitors(competitors, fills);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].asin, "A");
        assert!(merged[0].bullet_points.is_none());
        assert_eq!(merged[1].bullet_points.as_deref(), Some("b-bullets"));
        assert_eq!(merged[1].position, 2);
    }
}
