//! Layered brand strategy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::asset::StyleFocus;
use crate::image::{DEFAULT_BRAND_COLOR, parse_hex_color};

/// Confidence assigned to a layer whose response could not be parsed
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

/// Analysis layers, in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyLayer {
    MarketAnalysis,
    CompetitiveAnalysis,
    BrandPersonality,
    VisualDirection,
    Recommendations,
}

impl StrategyLayer {
    pub const ALL: [StrategyLayer; 5] = [
        StrategyLayer::MarketAnalysis,
        StrategyLayer::CompetitiveAnalysis,
        StrategyLayer::BrandPersonality,
        StrategyLayer::VisualDirection,
        StrategyLayer::Recommendations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyLayer::MarketAnalysis => "market_analysis",
            StrategyLayer::CompetitiveAnalysis => "competitive_analysis",
            StrategyLayer::BrandPersonality => "brand_personality",
            StrategyLayer::VisualDirection => "visual_direction",
            StrategyLayer::Recommendations => "recommendations",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    /// Weight in the overall confidence mean
    pub fn weight(&self) -> f64 {
        match self {
            StrategyLayer::BrandPersonality | StrategyLayer::VisualDirection => 1.5,
            _ => 1.0,
        }
    }

    /// Top-level keys a complete response carries
    pub fn expected_keys(&self) -> &'static [&'static str] {
        match self {
            StrategyLayer::MarketAnalysis => &[
                "market_size",
                "key_trends",
                "opportunities",
                "challenges",
                "market_positioning",
                "differentiation_potential",
            ],
            StrategyLayer::CompetitiveAnalysis => &[
                "direct_competitors",
                "indirect_competitors",
                "competitive_gaps",
                "differentiation_opportunities",
                "positioning_strategy",
                "competitive_advantages",
            ],
            StrategyLayer::BrandPersonality => &[
                "primary_traits",
                "secondary_traits",
                "brand_archetype",
                "brand_essence",
                "tone_of_voice",
                "emotional_connection",
            ],
            StrategyLayer::VisualDirection => &[
                "design_style",
                "visual_mood",
                "color_strategy",
                "typography_direction",
                "imagery_style",
                "logo_direction",
                "layout_principles",
            ],
            StrategyLayer::Recommendations => &[
                "brand_tagline",
                "elevator_pitch",
                "brand_promise",
                "key_messages",
                "communication_guidelines",
                "consistency_rules",
            ],
        }
    }

    /// Conservative content used when the model's answer is unusable
    pub fn fallback_content(&self) -> Value {
        match self {
            StrategyLayer::MarketAnalysis => json!({
                "market_size": "Growing market with opportunities",
                "key_trends": ["digital transformation", "sustainability focus", "customer experience"],
                "opportunities": ["market gap identification", "unique positioning", "customer needs"],
                "challenges": ["competition", "market saturation", "customer acquisition"],
                "market_positioning": "Differentiated positioning in target market",
                "differentiation_potential": "Strong potential for unique market position"
            }),
            StrategyLayer::CompetitiveAnalysis => json!({
                "direct_competitors": ["Competitor A", "Competitor B"],
                "indirect_competitors": ["Alternative Solution"],
                "competitive_gaps": ["service gap", "quality gap", "innovation gap"],
                "differentiation_opportunities": ["unique approach", "better service"],
                "positioning_strategy": "Position as premium alternative",
                "competitive_advantages": ["superior quality", "better service", "innovation"]
            }),
            StrategyLayer::BrandPersonality => json!({
                "primary_traits": ["professional", "innovative", "trustworthy", "approachable", "reliable"],
                "secondary_traits": ["creative", "efficient", "customer-focused"],
                "brand_archetype": "The Expert",
                "brand_essence": "Trusted expertise that delivers results"
            }),
            StrategyLayer::VisualDirection => json!({
                "design_style": "clean modern minimalism",
                "visual_mood": "confident and approachable",
                "color_strategy": { "primary_colors": ["#6366f1", "#1f2937"] },
                "typography_direction": { "logo_typography": "geometric sans-serif" }
            }),
            StrategyLayer::Recommendations => json!({
                "brand_tagline": "",
                "key_messages": { "primary_message": "Quality you can rely on" }
            }),
        }
    }
}

/// One analysis layer with its confidence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerAnalysis {
    pub layer: StrategyLayer,
    pub content: Value,
    pub confidence: f64,
    /// True when `content` is the fallback structure
    pub fallback: bool,
}

impl LayerAnalysis {
    /// A parsed layer scores 0.5 plus half its expected-key coverage
    pub fn parsed(layer: StrategyLayer, content: Value) -> Self {
        let confidence = 0.5 + 0.5 * key_coverage(layer, &content);
        Self {
            layer,
            content,
            confidence: confidence.clamp(0.0, 1.0),
            fallback: false,
        }
    }

    pub fn fallback(layer: StrategyLayer) -> Self {
        Self {
            layer,
            content: layer.fallback_content(),
            confidence: FALLBACK_CONFIDENCE,
            fallback: true,
        }
    }

    fn rescore(&mut self) {
        if !self.fallback {
            self.confidence = (0.5 + 0.5 * key_coverage(self.layer, &self.content)).clamp(0.0, 1.0);
        }
    }
}

/// Fraction of expected keys present with a non-empty value
pub fn key_coverage(layer: StrategyLayer, content: &Value) -> f64 {
    let expected = layer.expected_keys();
    let Some(map) = content.as_object() else {
        return 0.0;
    };
    let present = expected
        .iter()
        .filter(|key| map.get(**key).is_some_and(|v| !is_empty_value(v)))
        .count();
    present as f64 / expected.len() as f64
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Weighted mean of layer confidences, clamped to [0, 1]
pub fn overall_confidence(layers: &[LayerAnalysis]) -> f64 {
    let total_weight: f64 = layers.iter().map(|l| l.layer.weight()).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    let weighted: f64 = layers.iter().map(|l| l.confidence * l.layer.weight()).sum();
    (weighted / total_weight).clamp(0.0, 1.0)
}

/// First 8 hex chars of SHA-256 over the brand's visual identity inputs
pub fn consistency_seed(
    business_name: &str,
    primary_traits: &[String],
    design_style: &str,
    primary_colors: &[String],
) -> String {
    let identity = json!({
        "business_name": business_name,
        "primary_traits": primary_traits,
        "design_style": design_style,
        "primary_colors": primary_colors,
    });
    let digest = Sha256::digest(identity.to_string().as_bytes());
    hex::encode(digest)[..8].to_string()
}

/// Complete brand strategy for one project
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    pub id: String,
    pub project_id: String,
    pub business_name: String,
    /// Incremented by each refinement
    pub version: u32,
    pub layers: Vec<LayerAnalysis>,
    pub overall_confidence: f64,
    pub consistency_seed: String,
    #[serde(default)]
    pub refinements: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Strategy {
    /// Assemble a fresh strategy from generated layers
    pub fn assemble(
        project_id: impl Into<String>,
        business_name: impl Into<String>,
        layers: Vec<LayerAnalysis>,
    ) -> Self {
        let now = Utc::now();
        let mut strategy = Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            business_name: business_name.into(),
            version: 1,
            layers,
            overall_confidence: 0.0,
            consistency_seed: String::new(),
            refinements: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        strategy.recompute();
        strategy
    }

    /// Refresh derived fields after layer content changed
    pub fn recompute(&mut self) {
        for layer in &mut self.layers {
            layer.rescore();
        }
        self.overall_confidence = overall_confidence(&self.layers);
        self.consistency_seed = consistency_seed(
            &self.business_name,
            &self.primary_traits(),
            &self.design_style(),
            &self.primary_colors(),
        );
    }

    pub fn layer(&self, layer: StrategyLayer) -> Option<&LayerAnalysis> {
        self.layers.iter().find(|l| l.layer == layer)
    }

    /// Deep-merge an object of updates into one layer
    pub fn merge_layer(&mut self, layer: StrategyLayer, updates: &Map<String, Value>) -> bool {
        let Some(target) = self.layers.iter_mut().find(|l| l.layer == layer) else {
            return false;
        };
        let mut changed = false;
        for (key, value) in updates {
            if is_empty_value(value) {
                continue;
            }
            if let Some(map) = target.content.as_object_mut() {
                deep_merge(map.entry(key.clone()).or_insert(Value::Null), value);
                changed = true;
            }
        }
        changed
    }

    fn field(&self, layer: StrategyLayer, key: &str) -> Option<&Value> {
        self.layer(layer).and_then(|l| l.content.get(key))
    }

    fn text(&self, layer: StrategyLayer, key: &str) -> String {
        self.field(layer, key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn primary_traits(&self) -> Vec<String> {
        string_list(self.field(StrategyLayer::BrandPersonality, "primary_traits"))
    }

    pub fn brand_archetype(&self) -> String {
        self.text(StrategyLayer::BrandPersonality, "brand_archetype")
    }

    pub fn brand_essence(&self) -> String {
        self.text(StrategyLayer::BrandPersonality, "brand_essence")
    }

    pub fn design_style(&self) -> String {
        self.text(StrategyLayer::VisualDirection, "design_style")
    }

    pub fn visual_mood(&self) -> String {
        self.text(StrategyLayer::VisualDirection, "visual_mood")
    }

    pub fn primary_colors(&self) -> Vec<String> {
        string_list(
            self.field(StrategyLayer::VisualDirection, "color_strategy")
                .and_then(|c| c.get("primary_colors")),
        )
    }

    /// Full palette: primary, secondary then accent colors
    pub fn palette(&self) -> Vec<String> {
        let strategy = self.field(StrategyLayer::VisualDirection, "color_strategy");
        ["primary_colors", "secondary_colors", "accent_colors"]
            .iter()
            .flat_map(|key| string_list(strategy.and_then(|c| c.get(*key))))
            .collect()
    }

    pub fn typography(&self) -> String {
        self.field(StrategyLayer::VisualDirection, "typography_direction")
            .and_then(|t| t.get("logo_typography"))
            .and_then(Value::as_str)
            .unwrap_or("professional")
            .to_string()
    }

    pub fn tagline(&self) -> String {
        self.text(StrategyLayer::Recommendations, "brand_tagline")
    }

    /// Section of the visual direction relevant to an asset type
    pub fn focus_guidance(&self, focus: StyleFocus) -> Option<&Value> {
        self.field(StrategyLayer::VisualDirection, focus.key())
            .filter(|v| !is_empty_value(v))
    }

    /// First parseable primary color, or the default brand color
    pub fn brand_color(&self) -> [u8; 3] {
        self.primary_colors()
            .iter()
            .find_map(|c| parse_hex_color(c))
            .unwrap_or(DEFAULT_BRAND_COLOR)
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => {
            s.split(',').map(|p| p.trim().to_string()).filter(|p| !p.is_empty()).collect()
        }
        _ => Vec::new(),
    }
}

fn deep_merge(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (key, value) in incoming {
                if is_empty_value(value) {
                    continue;
                }
                deep_merge(existing.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (slot, value) => *slot = value.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_layers() -> Vec<LayerAnalysis> {
        StrategyLayer::ALL
            .into_iter()
            .map(|layer| {
                let content: Map<String, Value> = layer
                    .expected_keys()
                    .iter()
                    .map(|k| (k.to_string(), json!("value")))
                    .collect();
                LayerAnalysis::parsed(layer, Value::Object(content))
            })
            .collect()
    }

    #[test]
    fn test_parsed_confidence_from_key_coverage() {
        let full = LayerAnalysis::parsed(
            StrategyLayer::MarketAnalysis,
            json!({
                "market_size": "big", "key_trends": ["a"], "opportunities": ["b"],
                "challenges": ["c"], "market_positioning": "d", "differentiation_potential": "e"
            }),
        );
        assert_eq!(full.confidence, 1.0);

        let half = LayerAnalysis::parsed(
            StrategyLayer::MarketAnalysis,
            json!({ "market_size": "big", "key_trends": ["a"], "opportunities": ["b"], "challenges": [] }),
        );
        assert!((half.confidence - 0.75).abs() < 1e-9);

        let not_object = LayerAnalysis::parsed(StrategyLayer::MarketAnalysis, json!(["x"]));
        assert_eq!(not_object.confidence, 0.5);
    }

    #[test]
    fn test_fallback_layer() {
        let layer = LayerAnalysis::fallback(StrategyLayer::BrandPersonality);
        assert!(layer.fallback);
        assert_eq!(layer.confidence, FALLBACK_CONFIDENCE);
        assert!(layer.content.get("primary_traits").is_some());
    }

    #[test]
    fn test_overall_confidence_weighted_mean() {
        let mut layers = full_layers();
        assert_eq!(overall_confidence(&layers), 1.0);

        layers[2] = LayerAnalysis::fallback(StrategyLayer::BrandPersonality);
        // (1 + 1 + 0.3*1.5 + 1.5 + 1) / 6
        let expected = (1.0 + 1.0 + 0.45 + 1.5 + 1.0) / 6.0;
        assert!((overall_confidence(&layers) - expected).abs() < 1e-9);

        assert_eq!(overall_confidence(&[]), 0.0);
    }

    #[test]
    fn test_seed_is_deterministic() {
        let traits = vec!["bold".to_string()];
        let colors = vec!["#112233".to_string()];
        let a = consistency_seed("Acme", &traits, "flat", &colors);
        let b = consistency_seed("Acme", &traits, "flat", &colors);
        let c = consistency_seed("Acme", &traits, "retro", &colors);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 8);
    }

    #[test]
    fn test_accessors() {
        let mut layers = full_layers();
        layers[2] = LayerAnalysis::parsed(
            StrategyLayer::BrandPersonality,
            json!({ "primary_traits": ["bold", "warm"], "brand_archetype": "The Sage" }),
        );
        layers[3] = LayerAnalysis::parsed(
            StrategyLayer::VisualDirection,
            json!({
                "design_style": "flat",
                "color_strategy": { "primary_colors": ["not-a-color", "#102030"], "accent_colors": ["#ffffff"] },
                "logo_direction": { "logo_concept": "monogram" },
                "layout_principles": {}
            }),
        );
        let strategy = Strategy::assemble("p1", "Acme", layers);

        assert_eq!(strategy.primary_traits(), vec!["bold", "warm"]);
        assert_eq!(strategy.brand_archetype(), "The Sage");
        assert_eq!(strategy.design_style(), "flat");
        assert_eq!(strategy.brand_color(), [0x10, 0x20, 0x30]);
        assert_eq!(strategy.palette(), vec!["not-a-color", "#102030", "#ffffff"]);
        assert_eq!(strategy.typography(), "professional");
        assert!(strategy.focus_guidance(StyleFocus::LogoDirection).is_some());
        assert!(strategy.focus_guidance(StyleFocus::LayoutPrinciples).is_none());
        assert_eq!(strategy.version, 1);
        assert_eq!(strategy.consistency_seed.len(), 8);
    }

    #[test]
    fn test_merge_layer_updates_seed_and_skips_empty() {
        let mut strategy = Strategy::assemble("p1", "Acme", full_layers());
        let before = strategy.consistency_seed.clone();

        let updates = json!({ "design_style": "brutalist", "visual_mood": "" });
        let changed = strategy.merge_layer(
            StrategyLayer::VisualDirection,
            updates.as_object().unwrap(),
        );
        strategy.recompute();

        assert!(changed);
        assert_eq!(strategy.design_style(), "brutalist");
        assert_eq!(strategy.visual_mood(), "value");
        assert_ne!(strategy.consistency_seed, before);
    }

    #[test]
    fn test_brand_color_default() {
        let strategy = Strategy::assemble("p1", "Acme", full_layers());
        assert_eq!(strategy.brand_color(), DEFAULT_BRAND_COLOR);
    }
}
