// THEORY:
// Every tunable number of the engine lives in `PipelineConfig`; no stage keeps
// a hard-coded constant at its call site. A config is assembled in two steps:
//
// 1.  **Preset**: one of three named bundles picks the preprocessing strategy,
//     morphology composition, classifier profile and counting policy that
//     belong together.
// 2.  **Overrides**: a TOML file may name a preset and then override any
//     section. Fields a section leaves out keep their default value.
//
// The result is validated once, before the pipeline is built, so a bad kernel
// size or an inverted threshold pair never reaches the frame loop.

use crate::core_modules::census::CountingPolicy;
use crate::core_modules::classifier::ClassifierProfile;
use crate::core_modules::contour_extractor::ContourConfig;
use crate::core_modules::morphology::{MorphologyComposition, MorphologyConfig};
use crate::core_modules::preprocess::PreprocessingConfig;
use crate::error::{CensusError, Result};
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Named bundles of defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    /// Edge preprocessing, household table, cumulative dedup counting.
    #[default]
    Household,
    /// Edge preprocessing, posture table, per-frame counting.
    PostureEdges,
    /// Background subtraction, posture table, per-frame counting.
    PostureMotion,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Household, Preset::PostureEdges, Preset::PostureMotion];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Household => "household",
            Preset::PostureEdges => "posture-edges",
            Preset::PostureMotion => "posture-motion",
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Preset::ALL
            .into_iter()
            .find(|preset| preset.name() == s)
            .ok_or_else(|| {
                let known: Vec<_> = Preset::ALL.iter().map(|p| p.name()).collect();
                format!("unknown preset '{}', expected one of {}", s, known.join(", "))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub preprocessing: PreprocessingConfig,
    pub morphology: MorphologyConfig,
    pub contours: ContourConfig,
    pub classifier: ClassifierProfile,
    pub counting: CountingPolicy,
    /// Keep a copy of every intermediate raster for the render sink.
    pub capture_stages: bool,
}

impl PipelineConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Household => Self {
                preprocessing: PreprocessingConfig::edge_based(),
                morphology: MorphologyConfig::dilate_erode(),
                contours: ContourConfig::default(),
                classifier: ClassifierProfile::household(),
                counting: CountingPolicy::CumulativeDedup,
                capture_stages: false,
            },
            Preset::PostureEdges => Self {
                preprocessing: PreprocessingConfig::edge_based(),
                morphology: MorphologyConfig::dilate_erode(),
                contours: ContourConfig::default(),
                classifier: ClassifierProfile::posture(),
                counting: CountingPolicy::PerFrame,
                capture_stages: false,
            },
            Preset::PostureMotion => Self {
                preprocessing: PreprocessingConfig::background_subtraction(),
                morphology: MorphologyConfig::close_open(),
                contours: ContourConfig::default(),
                classifier: ClassifierProfile::posture(),
                counting: CountingPolicy::PerFrame,
                capture_stages: false,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.preprocessing.validate()?;
        self.morphology.validate()?;
        self.contours.validate()?;
        self.classifier.validate()
    }

    /// Parses a TOML document. `origin` names the document in error messages.
    pub fn from_toml_str(text: &str, origin: &Path) -> Result<Self> {
        let file: ConfigFile = toml::from_str(text).map_err(|e| CensusError::ConfigParse {
            path: origin.to_path_buf(),
            message: e.to_string(),
        })?;
        let config = file.resolve();
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| CensusError::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        log::debug!("loaded configuration from {}", path.display());
        Self::from_toml_str(&text, path)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::preset(Preset::default())
    }
}

/// On-disk layout of a configuration file.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    preset: Preset,
    capture_stages: Option<bool>,
    preprocessing: Option<PreprocessingConfig>,
    morphology: Option<MorphologyOverrides>,
    contours: Option<ContourConfig>,
    classifier: Option<ClassifierProfile>,
    counting: Option<CountingSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MorphologyOverrides {
    composition: Option<MorphologyComposition>,
    kernel_size: Option<u32>,
    iterations: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CountingSection {
    policy: CountingPolicy,
}

impl ConfigFile {
    fn resolve(self) -> PipelineConfig {
        let mut config = PipelineConfig::preset(self.preset);

        if let Some(preprocessing) = self.preprocessing {
            config.preprocessing = preprocessing;
        }
        if let Some(morphology) = self.morphology {
            if let Some(composition) = morphology.composition {
                config.morphology.composition = composition;
            }
            if let Some(kernel_size) = morphology.kernel_size {
                config.morphology.kernel_size = kernel_size;
            }
            if let Some(iterations) = morphology.iterations {
                config.morphology.iterations = iterations;
            }
        }
        if let Some(contours) = self.contours {
            config.contours = contours;
        }
        if let Some(classifier) = self.classifier {
            config.classifier = classifier;
        }
        if let Some(counting) = self.counting {
            config.counting = counting.policy;
        }
        if let Some(capture_stages) = self.capture_stages {
            config.capture_stages = capture_stages;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::classifier::HouseholdThresholds;
    use crate::core_modules::preprocess::{BackgroundConfig, EdgeConfig};
    use std::path::PathBuf;

    fn parse(text: &str) -> Result<PipelineConfig> {
        PipelineConfig::from_toml_str(text, &PathBuf::from("test.toml"))
    }

    #[test]
    fn presets_are_valid_and_distinct() {
        for preset in Preset::ALL {
            PipelineConfig::preset(preset).validate().unwrap();
        }
        let household = PipelineConfig::default();
        assert_eq!(household.counting, CountingPolicy::CumulativeDedup);
        assert_eq!(household.morphology.kernel_size, 3);

        let motion = PipelineConfig::preset(Preset::PostureMotion);
        assert_eq!(motion.morphology.composition, MorphologyComposition::CloseOpen);
        assert_eq!(motion.morphology.kernel_size, 5);
        assert!(matches!(motion.preprocessing, PreprocessingConfig::BackgroundSubtraction(_)));
    }

    #[test]
    fn preset_names_round_trip_through_from_str() {
        for preset in Preset::ALL {
            assert_eq!(preset.to_string().parse::<Preset>().unwrap(), preset);
        }
        assert!("kitchen".parse::<Preset>().is_err());
    }

    #[test]
    fn empty_document_is_the_default_preset() {
        assert_eq!(parse("").unwrap(), PipelineConfig::default());
    }

    #[test]
    fn sections_override_the_preset() {
        let config = parse(
            r#"
            preset = "posture-motion"
            capture_stages = true

            [preprocessing]
            strategy = "background-subtraction"
            blur_kernel_size = 7

            [preprocessing.model]
            history = 200

            [morphology]
            iterations = 2

            [contours]
            min_area = 800.0

            [counting]
            policy = "cumulative-dedup"
            "#,
        )
        .unwrap();

        match &config.preprocessing {
            PreprocessingConfig::BackgroundSubtraction(BackgroundConfig {
                blur_kernel_size, model, ..
            }) => {
                assert_eq!(*blur_kernel_size, 7);
                assert_eq!(model.history, 200);
                assert_eq!(model.var_threshold, 16.0);
            }
            other => panic!("unexpected preprocessing {other:?}"),
        }
        assert_eq!(config.morphology.kernel_size, 5);
        assert_eq!(config.morphology.iterations, 2);
        assert_eq!(config.contours.min_area, 800.0);
        assert_eq!(config.counting, CountingPolicy::CumulativeDedup);
        assert!(config.capture_stages);
    }

    #[test]
    fn classifier_section_selects_a_profile() {
        let config = parse(
            r#"
            [classifier]
            profile = "household"
            child_max_area = 700.0
            "#,
        )
        .unwrap();
        assert_eq!(
            config.classifier,
            ClassifierProfile::Household(HouseholdThresholds {
                child_max_area: 700.0,
                ..HouseholdThresholds::default()
            })
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(matches!(
            parse("[morphology]\nkernel_size = 4"),
            Err(CensusError::InvalidConfig(_))
        ));
        assert!(matches!(
            parse("[preprocessing]\nstrategy = \"edge-based\"\ncanny_low = 200.0\ncanny_high = 100.0"),
            Err(CensusError::InvalidConfig(_))
        ));
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        assert!(matches!(parse("colour = \"red\""), Err(CensusError::ConfigParse { .. })));
        assert!(matches!(parse("preset = \"garage\""), Err(CensusError::ConfigParse { .. })));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("census.toml");
        fs::write(&path, "preset = \"posture-edges\"\n").unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config, PipelineConfig::preset(Preset::PostureEdges));
        assert_eq!(
            match config.preprocessing {
                PreprocessingConfig::EdgeBased(edge) => edge,
                _ => unreachable!(),
            },
            EdgeConfig::default()
        );

        assert!(matches!(
            PipelineConfig::load(dir.path().join("missing.toml")),
            Err(CensusError::ConfigParse { .. })
        ));
    }
}
