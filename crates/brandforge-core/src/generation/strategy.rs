//! Strategy generation and refinement

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::prompts;
use crate::domain::{LayerAnalysis, Project, Strategy, StrategyLayer};
use crate::error::{Error, Result};
use crate::provider::TextModel;

/// Runs the layered analysis against a text model
#[derive(Clone)]
pub struct StrategyGenerator {
    model: Arc<dyn TextModel>,
}

impl StrategyGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Generate all layers in order; later prompts see earlier results
    pub async fn generate(&self, project: &Project) -> Result<Strategy> {
        project.input.validate()?;

        info!(
            project_id = %project.id,
            model = self.model.model_name(),
            "Generating brand strategy"
        );

        let mut layers: Vec<LayerAnalysis> = Vec::with_capacity(StrategyLayer::ALL.len());
        for layer in StrategyLayer::ALL {
            let prompt = prompts::layer_prompt(layer, &project.input, &layers);
            let reply = self
                .model
                .generate_text(&prompt)
                .await
                .map_err(|e| upstream(layer.as_str(), e))?;

            let analysis = parse_layer(layer, &reply);
            debug!(
                project_id = %project.id,
                layer = layer.as_str(),
                confidence = analysis.confidence,
                fallback = analysis.fallback,
                "Strategy layer complete"
            );
            layers.push(analysis);
        }

        let strategy = Strategy::assemble(&project.id, &project.input.business_name, layers);
        info!(
            project_id = %project.id,
            confidence = strategy.overall_confidence,
            seed = %strategy.consistency_seed,
            "Brand strategy generated"
        );
        Ok(strategy)
    }

    /// Apply a free-form change request, producing the next strategy version
    pub async fn refine(&self, strategy: &Strategy, request: &str) -> Result<Strategy> {
        if request.trim().is_empty() {
            return Err(Error::Validation("refinement request cannot be empty".to_string()));
        }

        let prompt = prompts::refinement_prompt(strategy, request);
        let reply = self
            .model
            .generate_text(&prompt)
            .await
            .map_err(|e| upstream("refinement", e))?;

        let patch = parse_json_object(&reply).ok_or_else(|| {
            Error::Upstream("refinement response was not a JSON object".to_string())
        })?;

        let mut refined = strategy.clone();
        let mut touched = Vec::new();
        for (key, layer) in REFINEMENT_SECTIONS {
            if let Some(Value::Object(updates)) = patch.get(*key)
                && refined.merge_layer(*layer, updates)
            {
                touched.push(layer.as_str());
            }
        }

        refined.version = strategy.version + 1;
        refined.refinements.push(request.trim().to_string());
        refined.updated_at = Utc::now();
        refined.recompute();

        info!(
            project_id = %strategy.project_id,
            version = refined.version,
            layers = ?touched,
            "Strategy refined"
        );
        Ok(refined)
    }
}

const REFINEMENT_SECTIONS: &[(&str, StrategyLayer)] = &[
    ("market_analysis_updates", StrategyLayer::MarketAnalysis),
    ("competitive_analysis_updates", StrategyLayer::CompetitiveAnalysis),
    ("brand_personality_updates", StrategyLayer::BrandPersonality),
    ("visual_direction_updates", StrategyLayer::VisualDirection),
    ("messaging_updates", StrategyLayer::Recommendations),
];

fn upstream(stage: &str, error: Error) -> Error {
    match error {
        Error::Validation(_) | Error::ApiKeyMissing | Error::Config(_) => error,
        other => Error::Upstream(format!("{} generation failed: {}", stage, other)),
    }
}

/// Parse a layer reply; unusable replies fall back to the default structure
pub fn parse_layer(layer: StrategyLayer, reply: &str) -> LayerAnalysis {
    match parse_json_object(reply) {
        Some(map) => LayerAnalysis::parsed(layer, Value::Object(map)),
        None => {
            let excerpt: String = reply.chars().take(200).collect();
            warn!(layer = layer.as_str(), response = %excerpt, "Unparseable layer response, using fallback");
            LayerAnalysis::fallback(layer)
        }
    }
}

/// Parse a JSON object, tolerating markdown fences and surrounding prose
pub fn parse_json_object(reply: &str) -> Option<serde_json::Map<String, Value>> {
    let cleaned = strip_code_fences(reply);
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(cleaned) {
        return Some(map);
    }
    let start = cleaned.find('{')?;
    let end = cleaned.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&cleaned[start..=end]) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Remove a surrounding ```json ... ``` fence
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches("json"),
    };
    body.trim_end().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BusinessInput;
    use crate::domain::strategy::FALLBACK_CONFIDENCE;
    use crate::generation::testing::ScriptedText;

    fn project() -> Project {
        Project::new(
            BusinessInput::new("RetryTest Solutions", "Resilient cloud tooling")
                .with_industry("Technology")
                .with_values(["reliability", "clarity"]),
        )
    }

    const PERSONALITY: &str = r#"```json
{"primary_traits": ["dependable", "sharp"], "secondary_traits": ["calm"],
 "brand_archetype": "The Sage", "brand_essence": "Calm under load",
 "tone_of_voice": {"primary_tone": "assured"}, "emotional_connection": {"desired_emotions": ["trust"]}}
```"#;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("  {\"a\":1}  "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_json_object_with_prose() {
        let map = parse_json_object("Sure! Here it is: {\"a\": 1} Hope that helps").unwrap();
        assert_eq!(map["a"], 1);
        assert!(parse_json_object("[1, 2, 3]").is_none());
        assert!(parse_json_object("no json here").is_none());
    }

    #[test]
    fn test_parse_layer_fallback() {
        let layer = parse_layer(StrategyLayer::MarketAnalysis, "definitely not json");
        assert!(layer.fallback);
        assert_eq!(layer.confidence, FALLBACK_CONFIDENCE);

        let parsed = parse_layer(StrategyLayer::BrandPersonality, PERSONALITY);
        assert!(!parsed.fallback);
        assert_eq!(parsed.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_generate_runs_five_layers_in_order() {
        let model = Arc::new(ScriptedText::new(vec![
            Ok(r#"{"market_positioning": "reliability leader"}"#.to_string()),
            Ok("garbage".to_string()),
            Ok(PERSONALITY.to_string()),
            Ok(r##"{"design_style": "precise", "color_strategy": {"primary_colors": ["#0f172a"]}}"##.to_string()),
            Ok(r#"{"brand_tagline": "Retries, resolved."}"#.to_string()),
        ]));
        let generator = StrategyGenerator::new(model.clone());
        let project = project();

        let strategy = generator.generate(&project).await.unwrap();

        assert_eq!(model.calls(), 5);
        assert_eq!(strategy.layers.len(), 5);
        assert_eq!(strategy.project_id, project.id);
        assert!(strategy.layer(StrategyLayer::CompetitiveAnalysis).unwrap().fallback);
        assert_eq!(strategy.primary_traits(), vec!["dependable", "sharp"]);
        assert_eq!(strategy.tagline(), "Retries, resolved.");
        assert!((0.0..=1.0).contains(&strategy.overall_confidence));

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("reliability leader"));
        assert!(prompts[3].contains("The Sage"));
    }

    #[tokio::test]
    async fn test_missing_name_rejected_before_upstream() {
        let model = Arc::new(ScriptedText::always("{}"));
        let generator = StrategyGenerator::new(model.clone());
        let project = Project::new(BusinessInput::new("", "Something"));

        let result = generator.generate(&project).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces() {
        let model = Arc::new(ScriptedText::new(vec![
            Ok("{}".to_string()),
            Err(Error::RateLimited(30)),
        ]));
        let generator = StrategyGenerator::new(model.clone());

        let err = generator.generate(&project()).await.unwrap_err();
        assert!(matches!(err, Error::Upstream(_)));
        assert!(err.to_string().contains("competitive_analysis"));
        assert!(err.is_retryable());
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_refine_bumps_version_and_merges() {
        let model = Arc::new(ScriptedText::new(vec![
            Ok(PERSONALITY.to_string()),
            Ok(PERSONALITY.to_string()),
            Ok(PERSONALITY.to_string()),
            Ok(r#"{"design_style": "precise"}"#.to_string()),
            Ok("{}".to_string()),
            Ok(r##"{"modified_elements": ["style"],
                   "visual_direction_updates": {"design_style": "playful", "color_strategy": {"primary_colors": ["#ff6600"]}},
                   "messaging_updates": {"brand_tagline": "Fun retries"},
                   "rationale": "lighter tone"}"##
                .to_string()),
        ]));
        let generator = StrategyGenerator::new(model.clone());
        let original = generator.generate(&project()).await.unwrap();

        let refined = generator.refine(&original, "make it more playful").await.unwrap();

        assert_eq!(refined.version, original.version + 1);
        assert_eq!(refined.id, original.id);
        assert_eq!(refined.design_style(), "playful");
        assert_eq!(refined.primary_colors(), vec!["#ff6600"]);
        assert_eq!(refined.tagline(), "Fun retries");
        assert_eq!(refined.refinements, vec!["make it more playful"]);
        assert_ne!(refined.consistency_seed, original.consistency_seed);
    }

    #[tokio::test]
    async fn test_refine_rejects_blank_request_and_bad_reply() {
        let model = Arc::new(ScriptedText::always("not json"));
        let generator = StrategyGenerator::new(model.clone());
        let strategy = Strategy::assemble("p1", "Acme", Vec::new());

        assert!(matches!(
            generator.refine(&strategy, "  ").await,
            Err(Error::Validation(_))
        ));
        assert_eq!(model.calls(), 0);

        assert!(matches!(
            generator.refine(&strategy, "bolder").await,
            Err(Error::Upstream(_))
        ));
    }
}
