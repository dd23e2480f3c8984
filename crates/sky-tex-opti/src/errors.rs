use miette::Diagnostic;
use stx_pipeline::ConfigError;
use thiserror::Error;

#[derive(Error, Debug, Diagnostic)]
pub enum CliError {
    #[error("No mod source given")]
    #[diagnostic(
        code(mods::source_missing),
        help("Pass --profile <MO2 profile directory> or --mod-list <file with one mod directory per line>")
    )]
    ModSourceMissing,

    #[error("Not a Mod Organizer 2 profile: {path}")]
    #[diagnostic(
        code(mods::invalid_profile),
        help("Point --profile at a directory like <MO2 instance>/profiles/Default that contains modlist.txt")
    )]
    InvalidProfile { path: String },

    #[error("Failed to read the mod stack")]
    #[diagnostic(code(mods::read_failed))]
    ModSource {
        #[source]
        source: stx_mod_core::Error,
    },

    #[error("Settings file not found: {path}")]
    #[diagnostic(
        code(settings::not_found),
        help("Make sure the file exists and the path is correct")
    )]
    SettingsNotFound { path: String },

    #[error("Unsupported settings file: {path}")]
    #[diagnostic(
        code(settings::unsupported_format),
        help("Settings files must end in .json or .toml")
    )]
    UnsupportedSettingsFormat { path: String },

    #[error("Settings file error: {path}")]
    #[diagnostic(
        code(settings::parse_error),
        help("Expected {{ \"targets\": [{{ \"suffixes\": [...], \"resolution\": N }}], \"exclusions\": {{ \"filenames\": [...], \"paths\": [...] }} }}")
    )]
    SettingsParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration")]
    #[diagnostic(code(config::invalid))]
    InvalidConfig {
        #[source]
        source: ConfigError,
        #[help]
        advice: Option<String>,
    },

    #[error("Optimization failed")]
    #[diagnostic(code(pipeline::failed))]
    Pipeline {
        #[source]
        source: stx_pipeline::Error,
    },

    #[error("IO operation failed")]
    #[diagnostic(code(io::operation_failed))]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl CliError {
    pub fn invalid_config(source: ConfigError) -> Self {
        let advice = match &source {
            ConfigError::OutputNotEmpty(_) => {
                Some("Pass --resume to continue a previous run, or pick an empty output directory".to_string())
            }
            ConfigError::NoTargets => {
                Some("Include at least one texture type, or add targets to the settings file".to_string())
            }
            ConfigError::ZeroTarget(_) => Some("Resolutions must be at least 1".to_string()),
            ConfigError::InvalidPattern { .. } => {
                Some("Filename exclusions are globs such as *_n.dds or icewall*.dds".to_string())
            }
            ConfigError::ZeroConcurrency => Some("Use --jobs 1 or more".to_string()),
            ConfigError::OutputNotADirectory(_) => None,
        };
        Self::InvalidConfig { source, advice }
    }
}

impl From<stx_pipeline::Error> for CliError {
    fn from(error: stx_pipeline::Error) -> Self {
        match error {
            stx_pipeline::Error::Config(source) => Self::invalid_config(source),
            source => Self::Pipeline { source },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(source: ConfigError) -> Self {
        Self::invalid_config(source)
    }
}

impl From<stx_mod_core::Error> for CliError {
    fn from(error: stx_mod_core::Error) -> Self {
        match error {
            stx_mod_core::Error::InvalidProfile(path) => Self::InvalidProfile {
                path: path.to_string(),
            },
            source => Self::ModSource { source },
        }
    }
}
