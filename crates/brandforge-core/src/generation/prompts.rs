//! Prompt construction for strategy layers, refinement and assets

use crate::domain::{
    AssetType, BusinessInput, ConsistencySignature, LayerAnalysis, Strategy, StrategyLayer,
};

/// Upper bound on prior signatures listed in one asset prompt
pub const MAX_PROMPT_REFERENCES: usize = 6;

fn earlier(layers: &[LayerAnalysis], layer: StrategyLayer, key: &str) -> String {
    layers
        .iter()
        .find(|l| l.layer == layer)
        .and_then(|l| l.content.get(key))
        .map(|v| match v.as_str() {
            Some(s) => s.to_string(),
            None => v.to_string(),
        })
        .unwrap_or_default()
}

fn business_block(input: &BusinessInput) -> String {
    let mut block = format!(
        "BUSINESS: {}\nDESCRIPTION: {}\nINDUSTRY: {}\nTARGET AUDIENCE: {}\nVALUES: {}",
        input.business_name,
        input.business_description,
        or_unspecified(&input.industry),
        or_unspecified(&input.target_audience),
        input.values_line(),
    );
    if let Some(stage) = input.business_stage.as_deref().filter(|s| !s.trim().is_empty()) {
        block.push_str(&format!("\nBUSINESS STAGE: {}", stage));
    }
    if let Some(req) = input.special_requirements.as_deref().filter(|s| !s.trim().is_empty()) {
        block.push_str(&format!("\nSPECIAL REQUIREMENTS: {}", req));
    }
    block
}

fn or_unspecified(value: &str) -> &str {
    if value.trim().is_empty() { "not specified" } else { value }
}

/// Prompt for one strategy layer; `previous` holds layers generated so far
pub fn layer_prompt(layer: StrategyLayer, input: &BusinessInput, previous: &[LayerAnalysis]) -> String {
    let business = business_block(input);
    match layer {
        StrategyLayer::MarketAnalysis => format!(
            r#"As a senior market research analyst, analyze this business concept:

{business}

Respond with JSON only:
{{
  "market_size": "estimated market size and growth",
  "key_trends": ["trend1", "trend2", "trend3"],
  "opportunities": ["opportunity1", "opportunity2", "opportunity3"],
  "challenges": ["challenge1", "challenge2", "challenge3"],
  "market_positioning": "recommended market position",
  "differentiation_potential": "unique positioning opportunities"
}}"#
        ),
        StrategyLayer::CompetitiveAnalysis => format!(
            r#"As a competitive intelligence expert, analyze the competitive landscape for:

{business}
MARKET POSITION: {market}

Respond with JSON only:
{{
  "direct_competitors": ["competitor1", "competitor2", "competitor3"],
  "indirect_competitors": ["competitor1", "competitor2"],
  "competitive_gaps": ["gap1", "gap2", "gap3"],
  "differentiation_opportunities": ["opportunity1", "opportunity2"],
  "positioning_strategy": "recommended positioning vs competitors",
  "competitive_advantages": ["advantage1", "advantage2", "advantage3"]
}}"#,
            market = earlier(previous, StrategyLayer::MarketAnalysis, "market_positioning"),
        ),
        StrategyLayer::BrandPersonality => format!(
            r#"As an expert brand strategist, develop a brand personality for:

{business}
STYLE PREFERENCE: {style}
MARKET CONTEXT: {market}
COMPETITIVE POSITION: {competitive}

Respond with JSON only:
{{
  "primary_traits": ["trait1", "trait2", "trait3", "trait4", "trait5"],
  "secondary_traits": ["trait1", "trait2", "trait3"],
  "brand_archetype": "The [Archetype Name]",
  "brand_essence": "one sentence brand essence",
  "tone_of_voice": {{ "primary_tone": "main tone", "communication_style": "how the brand speaks" }},
  "emotional_connection": {{ "desired_emotions": ["emotion1", "emotion2"], "customer_relationship": "how customers feel" }}
}}"#,
            style = input.preferred_style,
            market = earlier(previous, StrategyLayer::MarketAnalysis, "market_positioning"),
            competitive = earlier(previous, StrategyLayer::CompetitiveAnalysis, "positioning_strategy"),
        ),
        StrategyLayer::VisualDirection => format!(
            r##"As a senior creative director, create a visual direction brief for:

BRAND: {name}
INDUSTRY: {industry}
PERSONALITY TRAITS: {traits}
BRAND ARCHETYPE: {archetype}
BRAND ESSENCE: {essence}
PREFERRED STYLE: {style}
COLOR PREFERENCE: {colors}

Respond with JSON only:
{{
  "design_style": "design style description",
  "visual_mood": "overall visual mood",
  "color_strategy": {{
    "primary_colors": ["#hex1", "#hex2", "#hex3"],
    "secondary_colors": ["#hex4", "#hex5"],
    "accent_colors": ["#hex6"],
    "color_psychology": "why these colors work"
  }},
  "typography_direction": {{ "logo_typography": "style", "heading_style": "style", "body_text_style": "style" }},
  "imagery_style": {{ "photography_style": "direction", "illustration_style": "approach", "iconography": "style" }},
  "logo_direction": {{ "logo_concept": "concept", "symbol_approach": "approach", "wordmark_style": "style" }},
  "layout_principles": {{ "composition_style": "approach", "spacing_philosophy": "approach", "hierarchy_style": "principles" }}
}}"##,
            name = input.business_name,
            industry = or_unspecified(&input.industry),
            traits = earlier(previous, StrategyLayer::BrandPersonality, "primary_traits"),
            archetype = earlier(previous, StrategyLayer::BrandPersonality, "brand_archetype"),
            essence = earlier(previous, StrategyLayer::BrandPersonality, "brand_essence"),
            style = input.preferred_style,
            colors = input.preferred_colors,
        ),
        StrategyLayer::Recommendations => format!(
            r#"As a senior brand messaging strategist, write messaging and consistency recommendations for:

{business}
PERSONALITY: {traits}
ESSENCE: {essence}
DESIGN STYLE: {style}

Respond with JSON only:
{{
  "brand_tagline": "memorable tagline",
  "elevator_pitch": "30-second brand description",
  "brand_promise": "what the brand promises customers",
  "key_messages": {{ "primary_message": "message", "supporting_messages": ["m1", "m2"] }},
  "communication_guidelines": {{ "do_say": ["phrase"], "dont_say": ["phrase"] }},
  "consistency_rules": {{ "logo_usage": "rules", "color_usage": "rules", "typography": "rules" }}
}}"#,
            traits = earlier(previous, StrategyLayer::BrandPersonality, "primary_traits"),
            essence = earlier(previous, StrategyLayer::BrandPersonality, "brand_essence"),
            style = earlier(previous, StrategyLayer::VisualDirection, "design_style"),
        ),
    }
}

/// Prompt asking for a JSON patch of changed strategy elements
pub fn refinement_prompt(strategy: &Strategy, request: &str) -> String {
    format!(
        r##"As a brand strategist, refine this existing brand strategy based on the modification request.

CURRENT STRATEGY:
- Brand Name: {name}
- Primary Traits: {traits}
- Brand Essence: {essence}
- Visual Style: {style}
- Primary Colors: {colors}
- Tagline: {tagline}

MODIFICATION REQUEST: {request}

Respond with JSON only, including only elements that change:
{{
  "modified_elements": ["list of what changed"],
  "brand_personality_updates": {{ "primary_traits": ["..."], "brand_essence": "..." }},
  "visual_direction_updates": {{ "design_style": "...", "color_strategy": {{ "primary_colors": ["#hex"] }} }},
  "messaging_updates": {{ "brand_tagline": "...", "brand_promise": "..." }},
  "rationale": "explanation of changes"
}}"##,
        name = strategy.business_name,
        traits = strategy.primary_traits().join(", "),
        essence = strategy.brand_essence(),
        style = strategy.design_style(),
        colors = strategy.primary_colors().join(", "),
        tagline = strategy.tagline(),
    )
}

/// Image prompt for one asset type
pub fn asset_prompt(
    strategy: &Strategy,
    asset_type: AssetType,
    variant: &str,
    context: Option<&str>,
    references: &[ConsistencySignature],
) -> String {
    let spec = asset_type.spec();
    let requirements: String = spec
        .requirements
        .iter()
        .map(|r| format!("- {}\n", r))
        .collect();
    let colors = strategy.primary_colors().join(", ");
    let guidance = strategy
        .focus_guidance(spec.focus)
        .and_then(|g| serde_json::to_string_pretty(g).ok())
        .unwrap_or_else(|| "Follow general brand guidelines".to_string());

    let mut prompt = format!(
        r#"Create a {base} for {name}.

BRAND IDENTITY:
- Brand Name: {name}
- Brand Personality: {traits}
- Brand Essence: {essence}
- Brand Archetype: {archetype}

VISUAL DIRECTION:
- Design Style: {style}
- Visual Mood: {mood}
- Primary Colors: {colors}
- Typography Style: {typography}

CONSISTENCY REQUIREMENTS:
- Brand DNA Seed: {seed}
- Maintain a consistent {style} style
- Use the brand colors: {colors}

SPECIFIC GUIDANCE FOR {upper}:
{guidance}
"#,
        base = spec.base_prompt,
        name = strategy.business_name,
        traits = strategy.primary_traits().join(", "),
        essence = strategy.brand_essence(),
        archetype = strategy.brand_archetype(),
        style = strategy.design_style(),
        mood = strategy.visual_mood(),
        typography = strategy.typography(),
        seed = strategy.consistency_seed,
        upper = asset_type.as_str().to_uppercase(),
    );

    if !references.is_empty() {
        prompt.push_str("\nCONSISTENCY REFERENCE:\n");
        prompt.push_str("- This asset joins an existing brand family; match its visual language\n");
        for sig in references {
            prompt.push_str(&format!(
                "- {} (seed {}, signature {})\n",
                sig.asset_type.as_str(),
                sig.consistency_seed,
                sig.payload_digest
            ));
        }
    }

    prompt.push_str(&format!(
        "\nTECHNICAL REQUIREMENTS:\n{}- Dimensions: {}\n- Professional quality and resolution\n\nVARIANT: {}\n",
        requirements,
        spec.dimensions(),
        variant,
    ));
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("ADDITIONAL CONTEXT: {}\n", context));
    }
    prompt
}
