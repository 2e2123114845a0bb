//! Asset types and generated asset records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::image::ImageDataUri;

/// Section of the visual direction an asset type leans on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleFocus {
    LogoDirection,
    LayoutPrinciples,
    ImageryStyle,
    DesignSystem,
}

impl StyleFocus {
    /// Key of the focus section inside the visual direction layer
    pub fn key(&self) -> &'static str {
        match self {
            StyleFocus::LogoDirection => "logo_direction",
            StyleFocus::LayoutPrinciples => "layout_principles",
            StyleFocus::ImageryStyle => "imagery_style",
            StyleFocus::DesignSystem => "typography_direction",
        }
    }
}

/// Static generation settings for one asset type
#[derive(Debug, Clone, Copy)]
pub struct AssetSpec {
    pub base_prompt: &'static str,
    pub requirements: &'static [&'static str],
    pub width: u32,
    pub height: u32,
    pub focus: StyleFocus,
}

impl AssetSpec {
    pub fn dimensions(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

/// Kinds of visual asset BrandForge can generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetType {
    Logo,
    BusinessCard,
    Letterhead,
    SocialMediaPost,
    Flyer,
    Banner,
    Poster,
    Brochure,
    Packaging,
    WebsiteMockup,
    PresentationTemplate,
    EmailTemplate,
}

const DEFAULT_PACKAGE: [AssetType; 6] = [
    AssetType::Logo,
    AssetType::BusinessCard,
    AssetType::Letterhead,
    AssetType::SocialMediaPost,
    AssetType::Flyer,
    AssetType::Banner,
];

impl AssetType {
    pub const ALL: [AssetType; 12] = [
        AssetType::Logo,
        AssetType::BusinessCard,
        AssetType::Letterhead,
        AssetType::SocialMediaPost,
        AssetType::Flyer,
        AssetType::Banner,
        AssetType::Poster,
        AssetType::Brochure,
        AssetType::Packaging,
        AssetType::WebsiteMockup,
        AssetType::PresentationTemplate,
        AssetType::EmailTemplate,
    ];

    /// The ordered set generated by a complete package
    pub fn package_defaults() -> &'static [AssetType] {
        &DEFAULT_PACKAGE
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetType::Logo => "logo",
            AssetType::BusinessCard => "business_card",
            AssetType::Letterhead => "letterhead",
            AssetType::SocialMediaPost => "social_media_post",
            AssetType::Flyer => "flyer",
            AssetType::Banner => "banner",
            AssetType::Poster => "poster",
            AssetType::Brochure => "brochure",
            AssetType::Packaging => "packaging",
            AssetType::WebsiteMockup => "website_mockup",
            AssetType::PresentationTemplate => "presentation_template",
            AssetType::EmailTemplate => "email_template",
        }
    }

    /// Parse a type name; dashes are accepted in place of underscores
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }

    /// Human-readable label
    pub fn label(&self) -> String {
        self.as_str()
            .split('_')
            .map(|word| {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn spec(&self) -> AssetSpec {
        match self {
            AssetType::Logo => AssetSpec {
                base_prompt: "Professional logo design",
                requirements: &[
                    "Scalable vector-style design",
                    "Works on light and dark backgrounds",
                    "Memorable and distinctive",
                    "Professional quality",
                ],
                width: 512,
                height: 512,
                focus: StyleFocus::LogoDirection,
            },
            AssetType::BusinessCard => AssetSpec {
                base_prompt: "Professional business card design",
                requirements: &[
                    "Standard business card proportions",
                    "Clear contact information layout",
                    "Professional typography",
                    "Brand-consistent design",
                ],
                width: 512,
                height: 320,
                focus: StyleFocus::LayoutPrinciples,
            },
            AssetType::Letterhead => AssetSpec {
                base_prompt: "Professional letterhead design",
                requirements: &[
                    "Corporate letterhead format",
                    "Logo placement and branding",
                    "Clean, professional layout",
                    "Consistent with brand identity",
                ],
                width: 512,
                height: 700,
                focus: StyleFocus::LayoutPrinciples,
            },
            AssetType::SocialMediaPost => AssetSpec {
                base_prompt: "Social media post template",
                requirements: &[
                    "Square format for Instagram",
                    "Eye-catching visual design",
                    "Brand-consistent styling",
                    "Space for text overlay",
                ],
                width: 512,
                height: 512,
                focus: StyleFocus::ImageryStyle,
            },
            AssetType::Flyer => AssetSpec {
                base_prompt: "Marketing flyer design",
                requirements: &[
                    "Attention-grabbing design",
                    "Clear information hierarchy",
                    "Professional layout",
                    "Brand-aligned visual style",
                ],
                width: 512,
                height: 700,
                focus: StyleFocus::LayoutPrinciples,
            },
            AssetType::Banner => AssetSpec {
                base_prompt: "Web banner design",
                requirements: &[
                    "Wide banner format",
                    "Web-optimized design",
                    "Clear call-to-action space",
                    "Brand-consistent styling",
                ],
                width: 768,
                height: 256,
                focus: StyleFocus::ImageryStyle,
            },
            AssetType::Poster => AssetSpec {
                base_prompt: "Professional poster design",
                requirements: &[
                    "Portrait poster format",
                    "Strong focal point visible from a distance",
                    "Bold headline area",
                    "Brand-consistent styling",
                ],
                width: 512,
                height: 768,
                focus: StyleFocus::ImageryStyle,
            },
            AssetType::Brochure => AssetSpec {
                base_prompt: "Tri-fold brochure cover design",
                requirements: &[
                    "Panel-based layout",
                    "Clear information hierarchy",
                    "Room for product or service imagery",
                    "Brand-aligned typography",
                ],
                width: 768,
                height: 512,
                focus: StyleFocus::LayoutPrinciples,
            },
            AssetType::Packaging => AssetSpec {
                base_prompt: "Product packaging design",
                requirements: &[
                    "Front-of-pack hierarchy",
                    "Shelf-visible branding",
                    "Space for product information",
                    "Consistent with brand identity",
                ],
                width: 512,
                height: 512,
                focus: StyleFocus::LogoDirection,
            },
            AssetType::WebsiteMockup => AssetSpec {
                base_prompt: "Website homepage mockup",
                requirements: &[
                    "Desktop landing page layout",
                    "Hero section with call to action",
                    "Navigation and content sections",
                    "Brand-consistent color usage",
                ],
                width: 768,
                height: 512,
                focus: StyleFocus::LayoutPrinciples,
            },
            AssetType::PresentationTemplate => AssetSpec {
                base_prompt: "Presentation slide template",
                requirements: &[
                    "Widescreen title slide",
                    "Consistent header and footer areas",
                    "Readable typography",
                    "Brand-aligned visual style",
                ],
                width: 768,
                height: 432,
                focus: StyleFocus::DesignSystem,
            },
            AssetType::EmailTemplate => AssetSpec {
                base_prompt: "Email newsletter template",
                requirements: &[
                    "Single-column email layout",
                    "Header with logo placement",
                    "Clear call-to-action button",
                    "Brand-consistent styling",
                ],
                width: 512,
                height: 768,
                focus: StyleFocus::DesignSystem,
            },
        }
    }
}

impl std::fmt::Display for AssetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of a successfully generated asset, fed into later prompts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsistencySignature {
    pub asset_id: String,
    pub asset_type: AssetType,
    pub consistency_seed: String,
    /// First 16 hex chars of SHA-256 over the decoded image bytes
    pub payload_digest: String,
    pub mime_type: String,
}

impl ConsistencySignature {
    pub fn derive(
        asset_id: &str,
        asset_type: AssetType,
        consistency_seed: &str,
        image: &ImageDataUri,
        image_bytes: &[u8],
    ) -> Self {
        let digest = hex::encode(Sha256::digest(image_bytes));
        Self {
            asset_id: asset_id.to_string(),
            asset_type,
            consistency_seed: consistency_seed.to_string(),
            payload_digest: digest[..16].to_string(),
            mime_type: image.mime_type().to_string(),
        }
    }
}

/// How an asset came to be
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    /// Upstream attempts made, including the successful one
    pub attempts: u32,
    pub placeholder: bool,
    /// Present only for non-placeholder assets
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<ConsistencySignature>,
    /// Asset ids whose signatures fed this asset's prompt
    #[serde(default)]
    pub reference_asset_ids: Vec<String>,
    pub variant: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub prompt_excerpt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Size-based score in [0,1], set by `GeneratedAsset::new`
    #[serde(default)]
    pub quality_score: f64,
}

/// Encoded payload length that scores 1.0
const FULL_QUALITY_BASE64_LEN: f64 = 500_000.0;

/// Score given to every placeholder
pub const PLACEHOLDER_QUALITY: f64 = 0.1;

/// Rough quality from encoded payload size, rounded to three decimals
pub fn quality_score(image: &ImageDataUri) -> f64 {
    let ratio = (image.base64_data().len() as f64 / FULL_QUALITY_BASE64_LEN).min(1.0);
    (ratio * 1000.0).round() / 1000.0
}

/// A generated (or placeholder) visual asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub id: String,
    pub project_id: String,
    pub asset_type: AssetType,
    pub image: ImageDataUri,
    pub metadata: AssetMetadata,
    pub created_at: DateTime<Utc>,
}

impl GeneratedAsset {
    /// Build an asset record with a fresh id
    pub fn new(
        project_id: impl Into<String>,
        asset_type: AssetType,
        image: ImageDataUri,
        mut metadata: AssetMetadata,
    ) -> Self {
        metadata.quality_score = if metadata.placeholder {
            PLACEHOLDER_QUALITY
        } else {
            quality_score(&image)
        };
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            asset_type,
            image,
            metadata,
            created_at: Utc::now(),
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.metadata.placeholder
    }

    pub fn signature(&self) -> Option<&ConsistencySignature> {
        if self.metadata.placeholder {
            None
        } else {
            self.metadata.signature.as_ref()
        }
    }
}
