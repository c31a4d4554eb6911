//! Fixed instruction templates for each AI action. Pure string builders:
//! every business rule that lives in a prompt (the 2+ competitor priority
//! rule, the sales-lift weighting) is embedded here and nowhere else.

use crate::models::ListingContent;

fn numbered(items: &[String]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| format!("{}. {}", idx + 1, item))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Five optimized title candidates built from competitor n-gram frequency.
pub fn title_suggestions(
    current_title: &str,
    competitor_titles: &[String],
    hero_keyword: &str,
) -> String {
    format!(
        "You are a world-class Amazon title copywriter and SEO strategist.\n\
         You will be given:\n\
         A current product title\n\
         A hero keyword\n\
         A list of bestselling competitor titles\n\n\
         Your task:\n\n\
         1. Extract the most frequently occurring words and phrases (n-grams of 1, 2, or 3 words) \
         from the competitor titles, giving priority to those that appear in the first 100 \
         characters of competitor titles.\n\
         2. Generate 5 optimized product title suggestions:\n\n\
         Each should maximize use of the most frequent words/phrases from competitors.\n\n\
         Do NOT invent or insert unrelated words (like \"Gourmet\", \"Deluxe\", \"Feast\", or \
         \"Selection\") unless those words are frequent across competitors.\n\n\
         Favor high-frequency phrases as close to the front of title as possible (within Amazon's \
         200 character limit).\n\n\
         Maintain compliance with Amazon style guidelines (avoid excess symbols, capitalization, \
         or unnatural structures).\n\n\
         The hero keyword must appear near the front (top 5 words) of the title.\n\n\
         - For each suggestion, respond with a JSON object in the following format:\n\
         {{\n\
           \"title\": \"[Optimized title suggestion]\",\n\
           \"ctr_increase\": \"[X]\",\n\
           \"cr_increase\": \"[X]\",\n\
           \"justification\": \"[Key reason this will outperform current title]\",\n\
           \"priority\": \"primary\",\n\
           \"focus\": \"SEO\"\n\
         }}\n\
         - Respond ONLY with a JSON array of 5 such objects, one for each focus, in the order \
         listed above. No extra commentary.\n\n\
         Current Title:\n{current_title}\n\n\
         Hero Keyword:\n{hero_keyword}\n\n\
         Bestselling Competitor Titles:\n{competitors}\n\
         Respond ONLY with the JSON array, no extra commentary.",
        competitors = numbered(competitor_titles),
    )
}

fn keyword_gap_criteria() -> &'static str {
    "INCLUDE as meaningful keywords:\n\n\
     Product descriptors: Primary product terms (matcha, powder, tea, blend)\n\
     Quality indicators: Premium, superior, authentic, pure, organic, natural\n\
     Certifications/Standards: USDA, JAS, FDA approved, certified, grade A\n\
     Functional benefits: Energy, antioxidant, ceremonial, culinary, barista\n\
     Packaging/Size details: 100g, 3.5oz, tin, resealable, bulk\n\
     Geographic/Origin: Japanese, Uji, Kyoto, imported, grown in\n\
     Use case keywords: Latte, smoothie, baking, cooking, drinking\n\
     Target audience: Professional, home, kitchen, cafe grade\n\
     Process/Method: Stone ground, shade grown, first harvest, traditional\n\
     Product variants: Unsweetened, sugar-free, instant, concentrate\n\n\
     EXCLUDE as non-meaningful:\n\n\
     Common articles/prepositions: the, and, or, for, with, from, by\n\
     Generic qualifiers: best, great, amazing, perfect (unless part of specific phrase)\n\
     Filler words: your, our, this, that, new, fresh\n\
     Brand names: non dictionary words (focus on descriptive terms)\n\
     Generic containers: bag, container, package (including size-specific)\n\n\
     PHRASE EXTRACTION:\n\n\
     Multi-word phrases: \"ceremonial grade\", \"first harvest\", \"stone ground\"\n\
     Benefit phrases: \"perfect for lattes\", \"ideal for baking\"\n\
     Quality phrases: \"premium quality\", \"authentic Japanese\""
}

fn keyword_gap_output_format() -> &'static str {
    "Output Format (JSON):\n\
     json{\n\
       \"missing_keywords\": [\n\
         {\n\
           \"keyword\": \"premium\",\n\
           \"frequency\": 3,\n\
           \"competitors_using\": [\"Competitor 1\", \"Competitor 2\"],\n\
           \"category\": \"quality_indicator\",\n\
           \"priority\": \"high\"\n\
         }\n\
       ],\n\
       \"our_existing_keywords\": [\"organic\", \"matcha\", \"powder\"],\n\
       \"high_value_gaps\": [\"ceremonial\", \"premium\", \"japanese\"]\n\
     }"
}

/// Title keyword-gap analysis. High priority means the keyword shows up in
/// 2+ competitor titles.
pub fn title_keyword_gap(current_title: &str, competitor_titles: &[String]) -> String {
    format!(
        "You are a keyword gap analysis expert. Extract meaningful keywords from competitor \
         titles and identify what our title is missing.\n\
         Input Data:\n\n\
         Our Current Title: {current_title}\n\
         Competitor Titles: {competitors}\n\n\
         Step 1: Extract meaningful keywords from competitor titles using these criteria:\n\
         {criteria}\n\n\
         Step 2: Compare against our title and identify gaps\n\
         {output_format}\n\
         Prioritization: Mark as high priority if keyword appears in 2+ competitor titles and \
         represents searchable product attributes or customer needs.\n\
         Respond ONLY with the JSON object, no extra commentary.",
        competitors = numbered(competitor_titles),
        criteria = keyword_gap_criteria(),
        output_format = keyword_gap_output_format(),
    )
}

/// Bullet-point keyword-gap analysis; same criteria applied per competitor
/// bullet set.
pub fn bullet_keyword_gap(current_bullets: &[String], competitor_bullets: &[Vec<String>]) -> String {
    let competitors = competitor_bullets
        .iter()
        .enumerate()
        .map(|(idx, bullets)| format!("Competitor {}:\n{}", idx + 1, numbered(bullets)))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are a keyword gap analysis expert. Extract meaningful keywords from competitor \
         bullet points and identify what our bullet points are missing.\n\
         Input Data:\n\n\
         Our Bullet Points:\n{ours}\n\
         Competitor Bullet Points:\n{competitors}\n\n\
         Step 1: Extract meaningful keywords from all competitor bullet points using these \
         criteria (same as for titles, but applied to bullet points):\n\
         {criteria}\n\n\
         Step 2: Compare against our bullet points and identify gaps.\n\
         {output_format}\n\
         Prioritization: Mark as high priority if keyword appears in 2+ competitors and \
         represents searchable product attributes or customer needs.\n\
         Respond ONLY with the JSON object, no extra commentary.",
        ours = numbered(current_bullets),
        criteria = keyword_gap_criteria(),
        output_format = keyword_gap_output_format(),
    )
}

/// Ten single-bullet candidates, 200-250 characters each.
pub fn bullet_ideas(competitor_bullets: &[String]) -> String {
    format!(
        "You are a world-class Amazon listing copywriter and SEO strategist.\n\
         You will be given:\n\
         Our current product bullet points\n\
         A hero keyword\n\
         A list of bestselling competitor bullet points\n\n\
         Your task:\n\
         Extract the most frequently occurring words and phrases (n-grams of 1, 2, or 3 words) \
         from the competitor bullets (and optionally titles), giving priority to phrases that \
         appear at least twice across listings.\n\
         Generate 10 creative, high-converting ideas for a single bullet point for our product:\n\
         Each idea must be 200-250 characters.\n\
         Each should maximize use of the most frequent words/phrases from competitors.\n\
         Do NOT copy bullet points directly - rephrase and improve upon what competitors are \
         doing.\n\
         Include unique benefits or features where possible (based on patterns seen in \
         competitor listings).\n\
         No repeated ideas - ensure variety across the 10 ideas.\n\n\
         Competitor Bullet Points:\n{competitors}\n\n\
         Output as a JSON array of strings.\n\
         Respond ONLY with the JSON array, no extra commentary.",
        competitors = numbered(competitor_bullets),
    )
}

/// Five description candidates, 3-6 sentences each.
pub fn description_ideas(competitor_descriptions: &[String]) -> String {
    let competitors = competitor_descriptions
        .iter()
        .enumerate()
        .map(|(idx, description)| format!("{}. {}", idx + 1, description))
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "You are an expert Amazon listing copywriter. Given the product descriptions from top \
         competitors, generate 5 creative, high-converting Amazon product descriptions for our \
         product. Each idea should be 3-6 sentences, persuasive, and unique. Avoid direct \
         copying - rephrase and improve upon what competitors are doing. Focus on clarity, \
         customer appeal, and keyword inclusion.\n\n\
         Competitor Descriptions:\n{competitors}\n\n\
         Instructions:\n\
         - Each idea should be 3-6 sentences.\n\
         - Use persuasive language and highlight unique selling points.\n\
         - Incorporate relevant keywords where appropriate.\n\
         - Do not repeat the same idea or phrasing.\n\
         - Output as a JSON array of strings.\n\n\
         Example Output:\n\
         [\n\
           \"Experience the vibrant taste of our ceremonial grade matcha, stone-ground from the \
         finest Japanese tea leaves. ...\",\n\
           \"Unlock clean energy and focus with our organic matcha, shade-grown and hand-picked \
         for maximum flavor. ...\"\n\
         ]\n\
         Respond ONLY with the JSON array, no extra commentary.",
    )
}

pub const LISTING_ANALYSIS_SYSTEM: &str =
    "You are an expert Amazon listing optimization analyst. Always respond with valid JSON only.";

/// Before/after scoring prompt. The 0.6/0.4/0.1 sales-lift weighting is a
/// model-computed business rule; the caller still clamps the result to >= 0.
pub fn listing_analysis(
    original: &ListingContent,
    optimized: &ListingContent,
    hero_keyword: &str,
) -> String {
    format!(
        "You are an expert Amazon listing optimization analyst. Compare the original listing \
         with the optimized listing and provide specific percentage improvements.\n\n\
         HERO KEYWORD: \"{hero_keyword}\"\n\n\
         ORIGINAL LISTING:\n\
         Title: \"{original_title}\"\n\
         Bullet Points:\n{original_bullets}\n\
         Description: \"{original_description}\"\n\n\
         OPTIMIZED LISTING:\n\
         Title: \"{optimized_title}\"\n\
         Bullet Points:\n{optimized_bullets}\n\
         Description: \"{optimized_description}\"\n\n\
         Analyze the improvements and provide ONLY positive percentages (0% minimum) for:\n\n\
         1. **Click-Through Rate (CTR) Improvement**: Based on title optimization, keyword \
         placement, emotional triggers, and search relevance\n\
         2. **Conversion Rate Improvement**: Based on bullet point quality, benefit clarity, \
         social proof, and persuasive elements\n\
         3. **Keyword Coverage Improvement**: Based on additional relevant keywords, long-tail \
         variations, and search term density\n\n\
         Calculate a **Total Sales Lift %** by combining the improvements using this formula:\n\
         Total Sales Lift = (CTR Improvement * 0.6) + (Conversion Improvement * 0.4) + \
         (Keyword Coverage Improvement * 0.1)\n\n\
         Respond ONLY with valid JSON in this exact format:\n\
         {{\n\
           \"ctr_improvement\": 12,\n\
           \"conversion_improvement\": 8,\n\
           \"keyword_improvement\": 45,\n\
           \"total_sales_lift\": 8.5,\n\
           \"analysis_summary\": \"Brief 1-sentence explanation of the main improvements\"\n\
         }}\n\n\
         Be conservative and realistic. Typical Amazon listing optimizations see 3-15% sales \
         lift. Base improvements on actual Amazon listing optimization principles and realistic \
         market performance.",
        original_title = original.title,
        original_bullets = numbered(&original.bullet_points),
        original_description = original.description,
        optimized_title = optimized.title,
        optimized_bullets = numbered(&optimized.bullet_points),
        optimized_description = optimized.description,
    )
}

/// Spellcheck prompt: genuine misspellings only, never identity suggestions.
pub fn spellcheck(text: &str) -> String {
    format!(
        "Check the following product title for actual spelling mistakes that need correction.\n\n\
         IMPORTANT RULES:\n\
         - Only return words that are genuinely misspelled (wrong spelling)\n\
         - Do NOT return suggestions where the word and suggestion are identical\n\
         - Do NOT suggest changes for correctly spelled words, proper nouns, or brand names\n\
         - Do NOT suggest changes for stylistic preferences or grammar issues\n\
         - Focus only on clear spelling errors\n\n\
         For each genuinely misspelled word, return a JSON array with:\n\
         - word: the exact misspelled word as it appears\n\
         - start: start index in the string (inclusive)\n\
         - end: end index in the string (exclusive)\n\
         - suggestion: the correct spelling (must be different from the original word)\n\n\
         Text: \"{text}\"\n\n\
         Examples of what TO include:\n\
         - \"teh\" -> \"the\"\n\
         - \"recieve\" -> \"receive\"\n\
         - \"seperate\" -> \"separate\"\n\n\
         Examples of what NOT to include:\n\
         - \"don't\" -> \"don't\" (identical)\n\
         - \"iPhone\" -> \"iphone\" (brand name)\n\
         - \"WiFi\" -> \"Wi-Fi\" (stylistic)\n\n\
         Respond ONLY with a JSON array. If no spelling mistakes exist, return [].",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles() -> Vec<String> {
        vec![
            "Jade Leaf Organic Matcha Green Tea Powder".to_string(),
            "Naoki Matcha Superior Ceremonial Blend".to_string(),
        ]
    }

    #[test]
    fn title_prompt_numbers_competitors_and_carries_inputs() {
        let prompt = title_suggestions("Old title", &titles(), "matcha powder");
        assert!(prompt.contains("Old title"));
        assert!(prompt.contains("matcha powder"));
        assert!(prompt.contains("1. Jade Leaf Organic Matcha Green Tea Powder"));
        assert!(prompt.contains("2. Naoki Matcha Superior Ceremonial Blend"));
        assert!(prompt.contains("JSON array of 5 such objects"));
    }

    #[test]
    fn gap_prompts_embed_the_two_plus_competitor_rule() {
        let title_gap = title_keyword_gap("Old title", &titles());
        assert!(title_gap.contains("2+ competitor titles"));

        let bullet_gap = bullet_keyword_gap(
            &["our bullet".to_string()],
            &[vec!["their bullet".to_string()]],
        );
        assert!(bullet_gap.contains("2+ competitors"));
        assert!(bullet_gap.contains("Competitor 1:"));
    }

    #[test]
    fn idea_prompts_fix_candidate_counts_and_lengths() {
        let bullets = bullet_ideas(&["bullet".to_string()]);
        assert!(bullets.contains("10 creative"));
        assert!(bullets.contains("200-250 characters"));

        let descriptions = description_ideas(&["desc".to_string()]);
        assert!(descriptions.contains("generate 5"));
        assert!(descriptions.contains("3-6 sentences"));
    }

    #[test]
    fn analysis_prompt_embeds_sales_lift_weights() {
        let listing = ListingContent {
            title: "T".into(),
            bullet_points: vec!["B1".into()],
            description: "D".into(),
        };
        let prompt = listing_analysis(&listing, &listing, "matcha powder");
        assert!(prompt.contains("(CTR Improvement * 0.6)"));
        assert!(prompt.contains("(Conversion Improvement * 0.4)"));
        assert!(prompt.contains("(Keyword Coverage Improvement * 0.1)"));
        assert!(prompt.contains("HERO KEYWORD: \"matcha powder\""));
    }

    #[test]
    fn spellcheck_prompt_forbids_identity_suggestions() {
        let prompt = spellcheck("Ths is a smple title");
        assert!(prompt.contains("Ths is a smple title"));
        assert!(prompt.contains("must be different from the original word"));
    }
}
