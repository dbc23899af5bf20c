//! Ordered stage descriptors and their progress bands.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::StageWeights;
use crate::workflow::job::ArtifactKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    SceneBreakdown,
    ImageGeneration,
    VoiceSynthesis,
    MusicGeneration,
    VideoAssembly,
}

impl StageKind {
    /// Execution order.
    pub const ALL: [StageKind; 5] = [
        StageKind::SceneBreakdown,
        StageKind::ImageGeneration,
        StageKind::VoiceSynthesis,
        StageKind::MusicGeneration,
        StageKind::VideoAssembly,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StageKind::SceneBreakdown => "scene_breakdown",
            StageKind::ImageGeneration => "image_generation",
            StageKind::VoiceSynthesis => "voice_synthesis",
            StageKind::MusicGeneration => "music_generation",
            StageKind::VideoAssembly => "video_assembly",
        }
    }

    /// Progress label shown while the stage runs.
    pub fn label(&self) -> &'static str {
        match self {
            StageKind::SceneBreakdown => "Breaking story into scenes",
            StageKind::ImageGeneration => "Generating scene images",
            StageKind::VoiceSynthesis => "Synthesizing narration",
            StageKind::MusicGeneration => "Composing background music",
            StageKind::VideoAssembly => "Assembling video",
        }
    }

    /// Kind of artifact the stage records, if any.
    pub fn artifact_kind(&self) -> Option<ArtifactKind> {
        match self {
            StageKind::SceneBreakdown => None,
            StageKind::ImageGeneration => Some(ArtifactKind::Image),
            StageKind::VoiceSynthesis => Some(ArtifactKind::Audio),
            StageKind::MusicGeneration => Some(ArtifactKind::Music),
            StageKind::VideoAssembly => Some(ArtifactKind::Video),
        }
    }

    fn weight(&self, weights: &StageWeights) -> u32 {
        match self {
            StageKind::SceneBreakdown => weights.scene_breakdown,
            StageKind::ImageGeneration => weights.image_generation,
            StageKind::VoiceSynthesis => weights.voice_synthesis,
            StageKind::MusicGeneration => weights.music_generation,
            StageKind::VideoAssembly => weights.video_assembly,
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One stage and the slice `[start, end]` of overall progress it owns.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageDescriptor {
    pub kind: StageKind,
    pub weight: u32,
    pub start: f32,
    pub end: f32,
}

impl StageDescriptor {
    /// Overall percentage after `fraction` of this stage is done.
    pub fn at(&self, fraction: f32) -> f32 {
        self.start + (self.end - self.start) * fraction.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StagePlan {
    stages: Vec<StageDescriptor>,
}

impl StagePlan {
    /// Lays out contiguous bands covering 0..=100 in stage order.
    ///
    /// All-zero weights fall back to equal bands.
    pub fn from_weights(weights: &StageWeights) -> Self {
        let equal = weights.total() == 0;
        let weight_of = |kind: &StageKind| if equal { 1 } else { kind.weight(weights) };
        let total: u32 = StageKind::ALL.iter().map(weight_of).sum();

        let mut cumulative = 0u32;
        let last = StageKind::ALL.len() - 1;
        let stages = StageKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| {
                let weight = weight_of(kind);
                let start = cumulative as f32 * 100.0 / total as f32;
                cumulative += weight;
                let end = if i == last {
                    100.0
                } else {
                    cumulative as f32 * 100.0 / total as f32
                };
                StageDescriptor {
                    kind: *kind,
                    weight,
                    start,
                    end,
                }
            })
            .collect();

        Self { stages }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageDescriptor> {
        self.stages.iter()
    }

    pub fn get(&self, kind: StageKind) -> Option<&StageDescriptor> {
        self.stages.iter().find(|s| s.kind == kind)
    }
}

impl Default for StagePlan {
    fn default() -> Self {
        Self::from_weights(&StageWeights::default())
    }
}
