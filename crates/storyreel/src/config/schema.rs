use serde::{Deserialize, Serialize};

pub const CONFIG_VERSION: &str = "1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub workflow: WorkflowConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub text: TextConfig,
    #[serde(default)]
    pub scenes: SceneConfig,
    #[serde(default)]
    pub stages: StageWeights,
    #[serde(default)]
    pub image: ImageConfig,
    #[serde(default)]
    pub voice: VoiceConfig,
    #[serde(default)]
    pub music: MusicConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION.to_string(),
            workflow: WorkflowConfig::default(),
            retry: RetryConfig::default(),
            text: TextConfig::default(),
            scenes: SceneConfig::default(),
            stages: StageWeights::default(),
            image: ImageConfig::default(),
            voice: VoiceConfig::default(),
            music: MusicConfig::default(),
            database: DatabaseConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Scene count used when a caller does not ask for one.
    pub default_max_scenes: usize,
    /// Start the pipeline as soon as a job is confirmed.
    pub auto_start_generation: bool,
    pub poll_interval_ms: u64,
    /// Reported as the remaining time before any progress is made.
    pub initial_estimate_secs: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            default_max_scenes: 4,
            auto_start_generation: true,
            poll_interval_ms: 2000,
            initial_estimate_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub max_tokens: u32,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self { max_tokens: 2048 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub duration_secs: u32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self { duration_secs: 5 }
    }
}

/// Relative share of overall progress given to each pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StageWeights {
    pub scene_breakdown: u32,
    pub image_generation: u32,
    pub voice_synthesis: u32,
    pub music_generation: u32,
    pub video_assembly: u32,
}

impl Default for StageWeights {
    fn default() -> Self {
        Self {
            scene_breakdown: 10,
            image_generation: 50,
            voice_synthesis: 15,
            music_generation: 15,
            video_assembly: 10,
        }
    }
}

impl StageWeights {
    pub fn total(&self) -> u32 {
        self.scene_breakdown
            + self.image_generation
            + self.voice_synthesis
            + self.music_generation
            + self.video_assembly
    }
}

/// Unknown names deserialize as `Realistic`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ImageStyle {
    #[default]
    Realistic,
    Artistic,
    Cartoon,
    Cinematic,
    Fantasy,
}

impl ImageStyle {
    /// Parses a style name; unknown names map to `Realistic`.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "artistic" => ImageStyle::Artistic,
            "cartoon" => ImageStyle::Cartoon,
            "cinematic" => ImageStyle::Cinematic,
            "fantasy" => ImageStyle::Fantasy,
            _ => ImageStyle::Realistic,
        }
    }

    pub fn directive(&self) -> &'static str {
        match self {
            ImageStyle::Realistic => "photorealistic, detailed, high quality",
            ImageStyle::Artistic => "artistic, painterly style, creative",
            ImageStyle::Cartoon => "cartoon style, animated, colorful",
            ImageStyle::Cinematic => "cinematic lighting, dramatic composition, film still",
            ImageStyle::Fantasy => "fantasy art style, magical, ethereal",
        }
    }

    /// `prompt` with this style's directive appended.
    pub fn apply(&self, prompt: &str) -> String {
        format!("{}, {}, high resolution", prompt.trim(), self.directive())
    }
}

impl From<String> for ImageStyle {
    fn from(s: String) -> Self {
        Self::parse_lenient(&s)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ImageConfig {
    pub style: ImageStyle,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceConfig {
    pub voice_id: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            voice_id: "21m00Tcm4TlvDq8ikWAM".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MusicConfig {
    pub mood: String,
    pub style: String,
    /// Defaults to the total scene duration when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_duration_secs: Option<u64>,
}

impl Default for MusicConfig {
    fn default() -> Self {
        Self {
            mood: "adventurous".to_string(),
            style: "orchestral".to_string(),
            target_duration_secs: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file for job metadata. Persistence is disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.workflow.default_max_scenes, 4);
        assert!(config.workflow.auto_start_generation);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.base_delay_ms, 1000);
        assert_eq!(config.stages.total(), 100);
        assert_eq!(config.image.style, ImageStyle::Realistic);
        assert!(config.database.path.is_none());
    }

    #[test]
    fn test_style_apply() {
        assert_eq!(
            ImageStyle::Cartoon.apply(" a fox in snow "),
            "a fox in snow, cartoon style, animated, colorful, high resolution"
        );
    }

    #[test]
    fn test_style_parse_lenient() {
        assert_eq!(ImageStyle::parse_lenient("Fantasy"), ImageStyle::Fantasy);
        assert_eq!(ImageStyle::parse_lenient("watercolour"), ImageStyle::Realistic);

        let image: ImageConfig = serde_json::from_str(r#"{"style": "cinematic"}"#).unwrap();
        assert_eq!(image.style, ImageStyle::Cinematic);
        assert_eq!(serde_json::to_string(&image.style).unwrap(), "\"cinematic\"");
    }
}
