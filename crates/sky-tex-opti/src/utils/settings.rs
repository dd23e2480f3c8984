//! Optimization settings: which suffixes to resize to what, and what to skip.
//!
//! Settings come either from a `.json`/`.toml` file or from the per-texture-type
//! command line options.

use crate::errors::CliError;
use camino::Utf8Path;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use stx_pipeline::TargetMapping;

/// Filename patterns skipped unless overridden.
pub const DEFAULT_EXCLUDED_FILENAMES: &[&str] = &[
    "*_color.dds",
    "*_emissive.dds",
    "*_opengl.dds",
    "icewall*.dds",
    "*drj*.dds",
    "*envmask.dds",
    "*_s.dds",
    "*_a.dds",
    "*pot_n.dds",
    "*tg_field_rocks.dds",
    "*tg_field_rocks_n.dds",
    "*tg_snow_pebbles.dds",
    "*tg_snow_pebbles_n.dds",
    "*clgorehowl*.dds",
    "*woodcut.dds",
    "*woodcut_n.dds",
    "*dummy.dds",
    "*lod*_p.dds",
    "*default_n.dds",
    "*basket01.dds",
];

/// Directory substrings skipped unless overridden.
pub const DEFAULT_EXCLUDED_PATHS: &[&str] = &[
    "/interface",
    "/effects03/newmiller/jewels2",
    "/littlebaron",
    "/luxonbeacon",
    "/landscape/mountains",
    "/landscape/rocks",
    "/terrain",
    "/lod",
    "/alduin",
    "/dragon",
    "/durnehviir",
    "/odahviing",
    "/paarthurnax",
    "/actors/dragon",
    "/actors/alduin",
    "/dlc01/actors/undeaddragon",
    "/dyndolod",
    "/lodgen",
    "!_rudy_misc",
    "!sr",
    "!!sr",
];

/// Settings file contents.
///
/// ```json
/// {
///   "targets": [{ "suffixes": ["_n.dds"], "resolution": 1024 }],
///   "exclusions": { "filenames": ["*_g.dds"], "paths": ["/interface"] }
/// }
/// ```
///
/// Capitalized keys (`Targets`, `Suffixes`, ...) are accepted too. JSON is
/// parsed strictly: comments and trailing commas are errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(alias = "Targets")]
    pub targets: Vec<TargetSettings>,
    #[serde(default, alias = "Exclusions")]
    pub exclusions: ExclusionSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSettings {
    #[serde(alias = "Suffixes")]
    pub suffixes: Vec<String>,
    #[serde(alias = "Resolution")]
    pub resolution: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExclusionSettings {
    #[serde(default, alias = "Filenames")]
    pub filenames: Vec<String>,
    #[serde(default, alias = "Paths")]
    pub paths: Vec<String>,
}

impl Settings {
    /// Load a settings file; the format follows the extension.
    pub fn load(path: &Utf8Path) -> Result<Self, CliError> {
        if !path.exists() {
            return Err(CliError::SettingsNotFound {
                path: path.to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        let parse_error = |source: Box<dyn std::error::Error + Send + Sync>| CliError::SettingsParse {
            path: path.to_string(),
            source,
        };

        let settings: Settings = match path.extension().map(str::to_ascii_lowercase).as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_error(Box::new(e)))?,
            Some("toml") => toml::from_str(&content).map_err(|e| parse_error(Box::new(e)))?,
            _ => {
                return Err(CliError::UnsupportedSettingsFormat {
                    path: path.to_string(),
                })
            }
        };

        tracing::debug!(
            "Loaded {} target groups from {}",
            settings.targets.len(),
            path
        );
        Ok(settings)
    }

    /// Settings built from per-type resolutions.
    ///
    /// Types that are not included get a `*<suffix>` filename exclusion for
    /// each of their suffixes, so the catch-all diffuse suffix never picks them
    /// up.
    pub fn from_texture_types(resolutions: &TypeResolutions, included: &[TextureType]) -> Self {
        let mut targets = Vec::new();
        let mut filenames: Vec<String> = DEFAULT_EXCLUDED_FILENAMES
            .iter()
            .map(|s| s.to_string())
            .collect();

        for texture_type in TextureType::lookup_order() {
            if included.contains(texture_type) {
                targets.push(TargetSettings {
                    suffixes: texture_type.suffixes().iter().map(|s| s.to_string()).collect(),
                    resolution: resolutions.for_type(*texture_type),
                });
            } else if *texture_type != TextureType::Diffuse {
                filenames.extend(texture_type.suffixes().iter().map(|s| format!("*{}", s)));
            }
        }

        Self {
            targets,
            exclusions: ExclusionSettings {
                filenames,
                paths: DEFAULT_EXCLUDED_PATHS.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    /// Flatten the target groups into one ordered mapping.
    pub fn target_mapping(&self) -> TargetMapping {
        let mut mapping = TargetMapping::new();
        for target in &self.targets {
            for suffix in &target.suffixes {
                mapping.insert(suffix, target.resolution);
            }
        }
        mapping
    }
}

/// Texture kinds, by filename suffix convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TextureType {
    Diffuse,
    Normal,
    ModelSpaceNormal,
    Reflection,
    SubsurfaceScattering,
    Specular,
    Glow,
    Backlighting,
    #[value(alias = "environment-and-cubemap")]
    Environment,
    Height,
}

impl TextureType {
    /// Order in which suffixes are tried. Diffuse ends with the catch-all
    /// `.dds`, so it goes last.
    pub fn lookup_order() -> &'static [TextureType] {
        &[
            TextureType::Normal,
            TextureType::ModelSpaceNormal,
            TextureType::Reflection,
            TextureType::SubsurfaceScattering,
            TextureType::Specular,
            TextureType::Glow,
            TextureType::Backlighting,
            TextureType::Environment,
            TextureType::Height,
            TextureType::Diffuse,
        ]
    }

    pub fn suffixes(&self) -> &'static [&'static str] {
        match self {
            TextureType::Diffuse => &["_d.dds", ".dds"],
            TextureType::Normal => &["_n.dds"],
            TextureType::ModelSpaceNormal => &["_msn.dds"],
            TextureType::Reflection => &["_m.dds"],
            TextureType::SubsurfaceScattering => &["_sk.dds"],
            TextureType::Specular => &["_s.dds"],
            TextureType::Glow => &["_g.dds"],
            TextureType::Backlighting => &["_b.dds"],
            TextureType::Environment => &["_e.dds", "_em.dds"],
            TextureType::Height => &["_p.dds"],
        }
    }
}

/// Target resolution for every texture type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeResolutions {
    pub diffuse: u32,
    pub normal: u32,
    pub model_space_normal: u32,
    pub reflection: u32,
    pub subsurface_scattering: u32,
    pub specular: u32,
    pub glow: u32,
    pub backlighting: u32,
    pub environment: u32,
    pub height: u32,
}

impl Default for TypeResolutions {
    fn default() -> Self {
        Self {
            diffuse: 2048,
            normal: 1024,
            model_space_normal: 1024,
            reflection: 1024,
            subsurface_scattering: 1024,
            specular: 1024,
            glow: 1024,
            backlighting: 1024,
            environment: 1024,
            height: 1024,
        }
    }
}

impl TypeResolutions {
    pub fn for_type(&self, texture_type: TextureType) -> u32 {
        match texture_type {
            TextureType::Diffuse => self.diffuse,
            TextureType::Normal => self.normal,
            TextureType::ModelSpaceNormal => self.model_space_normal,
            TextureType::Reflection => self.reflection,
            TextureType::SubsurfaceScattering => self.subsurface_scattering,
            TextureType::Specular => self.specular,
            TextureType::Glow => self.glow,
            TextureType::Backlighting => self.backlighting,
            TextureType::Environment => self.environment,
            TextureType::Height => self.height,
        }
    }
}
