use crate::llm::{LlmClient, LlmError, LlmMessage, MalformedAiResponse, Sampling, parse_fenced_json};
use crate::models::{
    AnalysisRequest, BulletGapRequest, BulletIdeasRequest, DescriptionIdeasRequest,
    KeywordGapReport, KeywordGapRequest, ListingMetrics, SpellingError, TitleSuggestRequest,
    TitleSuggestion,
};
use crate::prompts;
use std::time::Instant;
use thiserror::Error;
use tracing::warn;

/// One error type for every handler, tagged with the failing stage and a
/// kind the HTTP layer maps to a status code.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {message}")]
pub struct GatewayError {
    stage: &'static str,
    message: String,
    kind: GatewayErrorKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Missing or malformed request fields -> 400.
    InvalidInput,
    /// Scrape provider, LLM provider, or database failure -> 500.
    Upstream,
    /// The model answered, but not with the JSON we asked for -> 500.
    MalformedAi,
}

impl GatewayError {
    pub fn invalid_input(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: GatewayErrorKind::InvalidInput,
        }
    }

    pub fn upstream(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
            kind: GatewayErrorKind::Upstream,
        }
    }

    pub fn malformed(stage: &'static str, err: MalformedAiResponse) -> Self {
        Self {
            stage,
            message: err.to_string(),
            kind: GatewayErrorKind::MalformedAi,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    pub fn kind(&self) -> GatewayErrorKind {
        self.kind
    }

    pub fn detail(&self) -> &str {
        &self.message
    }

    fn from_llm(stage: &'static str, err: LlmError) -> Self {
        Self::upstream(stage, err.to_string())
    }
}

async fn chat_for(
    llm: &LlmClient,
    stage: &'static str,
    action: &'static str,
    messages: &[LlmMessage],
    sampling: Sampling,
) -> Result<String, GatewayError> {
    let started = Instant::now();
    let text = llm
        .chat(messages, sampling)
        .await
        .map_err(|err| GatewayError::from_llm(stage, err))?;
    crate::metrics::llm_elapsed(action, started.elapsed().as_millis());
    Ok(text)
}

/// Five optimized title candidates for the current listing.
pub async fn suggest_titles(
    llm: &LlmClient,
    request: &TitleSuggestRequest,
) -> Result<Vec<TitleSuggestion>, GatewayError> {
    if request.current_title.trim().is_empty() {
        return Err(GatewayError::invalid_input(
            "gpt-suggest",
            "Missing currentTitle or competitorTitles",
        ));
    }
    if request.hero_keyword.trim().is_empty() {
        return Err(GatewayError::invalid_input("gpt-suggest", "Missing heroKeyword"));
    }

    let prompt = prompts::title_suggestions(
        &request.current_title,
        &request.competitor_titles,
        &request.hero_keyword,
    );
    let text = chat_for(
        llm,
        "gpt-suggest",
        "title-suggest",
        &[LlmMessage::user(prompt)],
        Sampling::creative(),
    )
    .await?;
    parse_fenced_json(&text).map_err(|err| GatewayError::malformed("gpt-suggest", err))
}

/// Keyword-gap analysis over titles.
pub async fn title_keyword_gap(
    llm: &LlmClient,
    request: &KeywordGapRequest,
) -> Result<KeywordGapReport, GatewayError> {
    if request.current_title.trim().is_empty() {
        return Err(GatewayError::invalid_input(
            "keyword-gap",
            "Missing currentTitle or competitorTitles",
        ));
    }

    let prompt = prompts::title_keyword_gap(&request.current_title, &request.competitor_titles);
    let text = chat_for(
        llm,
        "keyword-gap",
        "keyword-gap",
        &[LlmMessage::user(prompt)],
        Sampling::analytic(),
    )
    .await?;
    let report: KeywordGapReport =
        parse_fenced_json(&text).map_err(|err| GatewayError::malformed("keyword-gap", err))?;
    warn_on_inconsistent_gaps("keyword-gap", &report);
    Ok(report)
}

/// Keyword-gap analysis over bullet points.
pub async fn bullet_keyword_gap(
    llm: &LlmClient,
    request: &BulletGapRequest,
) -> Result<KeywordGapReport, GatewayError> {
    let prompt = prompts::bullet_keyword_gap(&request.current_bullets, &request.competitor_bullets);
    let text = chat_for(
        llm,
        "bullet-gap",
        "bullet-gap",
        &[LlmMessage::user(prompt)],
        Sampling::analytic(),
    )
    .await?;
    let report: KeywordGapReport =
        parse_fenced_json(&text).map_err(|err| GatewayError::malformed("bullet-gap", err))?;
    warn_on_inconsistent_gaps("bullet-gap", &report);
    Ok(report)
}

/// Ten single-bullet candidates derived from competitor bullets.
pub async fn bullet_ideas(
    llm: &LlmClient,
    request: &BulletIdeasRequest,
) -> Result<Vec<String>, GatewayError> {
    let prompt = prompts::bullet_ideas(&request.competitor_bullets);
    let text = chat_for(
        llm,
        "bullet-ideas",
        "bullet-ideas",
        &[LlmMessage::user(prompt)],
        Sampling::creative(),
    )
    .await?;
    parse_fenced_json(&text).map_err(|err| GatewayError::malformed("bullet-ideas", err))
}

/// Five description candidates derived from competitor descriptions.
pub async fn description_ideas(
    llm: &LlmClient,
    request: &DescriptionIdeasRequest,
) -> Result<Vec<String>, GatewayError> {
    let prompt = prompts::description_ideas(&request.competitor_descriptions);
    let text = chat_for(
        llm,
        "description-ideas",
        "description-ideas",
        &[LlmMessage::user(prompt)],
        Sampling::creative(),
    )
    .await?;
    parse_fenced_json(&text).map_err(|err| GatewayError::malformed("description-ideas", err))
}

/// Before/after improvement estimate. Degrades to fixed fallback metrics
/// when the LLM provider is unconfigured or unreachable; the preview screen
/// must always get an answer.
pub async fn analyze_listing(
    llm: &LlmClient,
    request: &AnalysisRequest,
) -> Result<ListingMetrics, GatewayError> {
    if request.hero_keyword.trim().is_empty() {
        return Err(GatewayError::invalid_input(
            "listing-analysis",
            "Missing required fields",
        ));
    }

    if !llm.is_configured() {
        warn!(
            target = "listinglift.llm",
            "OPENAI_API_KEY not set, serving fallback metrics"
        );
        return Ok(ListingMetrics::fallback());
    }

    let prompt = prompts::listing_analysis(
        &request.original_listing,
        &request.optimized_listing,
        &request.hero_keyword,
    );
    let messages = [
        LlmMessage::system(prompts::LISTING_ANALYSIS_SYSTEM),
        LlmMessage::user(prompt),
    ];
    let sampling = Sampling::analytic().with_model("gpt-4").with_max_tokens(500);
    let text = match chat_for(llm, "listing-analysis", "listing-analysis", &messages, sampling)
        .await
    {
        Ok(text) => text,
        Err(err) => {
            warn!(
                target = "listinglift.llm",
                error = %err,
                "analysis provider unreachable, serving fallback metrics"
            );
            return Ok(ListingMetrics::fallback());
        }
    };

    let mut metrics: ListingMetrics = parse_fenced_json(&text)
        .map_err(|err| GatewayError::malformed("listing-analysis", err))?;
    metrics.clamp_non_negative();
    Ok(metrics)
}

/// Spellcheck free text. Empty input short-circuits without an LLM call.
pub async fn spellcheck(llm: &LlmClient, text: &str) -> Result<Vec<SpellingError>, GatewayError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let prompt = prompts::spellcheck(text);
    let raw = chat_for(
        llm,
        "spellcheck",
        "spellcheck",
        &[LlmMessage::user(prompt)],
        Sampling::deterministic().with_model("gpt-3.5-turbo"),
    )
    .await?;
    let corrections: Vec<SpellingError> =
        parse_fenced_json(&raw).map_err(|err| GatewayError::malformed("spellcheck", err))?;
    Ok(filter_spelling_errors(corrections))
}

/// Drop entries the model should never have produced: empty fields or a
/// suggestion identical to the word.
pub(crate) fn filter_spelling_errors(corrections: Vec<SpellingError>) -> Vec<SpellingError> {
    corrections
        .into_iter()
        .filter(|correction| {
            !correction.word.is_empty()
                && !correction.suggestion.is_empty()
                && correction.word != correction.suggestion
        })
        .collect()
}

fn warn_on_inconsistent_gaps(stage: &'static str, report: &KeywordGapReport) {
    // Prompt contract, not a server-side guarantee; surface drift in logs.
    if !report.is_consistent() {
        warn!(
            target = "listinglift.llm",
            stage = stage,
            "high_value_gaps contains keywords absent from missing_keywords"
        );
    }
}

/// Apply one correction to the text it was produced for. Model-reported
/// indices drift when the user keeps typing, so this tries the exact span
/// first, then a nearby window, then a whole-word scan, and leaves the text
/// unchanged when no safe match exists.
pub fn apply_suggestion(text: &str, correction: &SpellingError) -> String {
    if correction.start < correction.end
        && correction.end <= text.len()
        && text.is_char_boundary(correction.start)
        && text.is_char_boundary(correction.end)
        && &text[correction.start..correction.end] == correction.word
    {
        return format!(
            "{}{}{}",
            &text[..correction.start],
            correction.suggestion,
            &text[correction.end..]
        );
    }

    const SEARCH_WINDOW: usize = 10;
    let window_start = snap_down(text, correction.start.saturating_sub(SEARCH_WINDOW));
    let window_end = snap_up(text, correction.end.saturating_add(SEARCH_WINDOW));
    if window_start < window_end
        && let Some(found) = text[window_start..window_end].find(&correction.word)
    {
        let actual_start = window_start + found;
        let actual_end = actual_start + correction.word.len();
        return format!(
            "{}{}{}",
            &text[..actual_start],
            correction.suggestion,
            &text[actual_end..]
        );
    }

    // Whole-word scan over the full text as a last resort.
    let mut cursor = 0;
    while let Some(rel) = text[cursor..].find(&correction.word) {
        let abs = cursor + rel;
        let end = abs + correction.word.len();
        let starts_word = abs == 0
            || text[..abs]
                .chars()
                .next_back()
                .is_none_or(|ch| ch.is_whitespace());
        let ends_word = end == text.len()
            || text[end..].chars().next().is_none_or(|ch| ch.is_whitespace());
        if starts_word && ends_word {
            return format!("{}{}{}", &text[..abs], correction.suggestion, &text[end..]);
        }
        cursor = end;
    }

    text.to_string()
}

fn snap_down(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while !text.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn snap_up(text: &str, mut idx: usize) -> usize {
    idx = idx.min(text.len());
    while idx < text.len() && !text.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
