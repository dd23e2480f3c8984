use super::ModSourceArgs;
use crate::errors::CliError;
use crate::println_pad;
use crate::utils::settings::{Settings, TextureType, TypeResolutions};
use crate::utils::{format_count, print_ansi_boxed_lines};
use camino::Utf8PathBuf;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use miette::Result;
use std::sync::Arc;
use std::time::Duration;
use stx_pipeline::{
    ArchiveReaders, BsaArchiveReader, PipelineBuilder, PipelineConfig, PipelineProgress,
    PipelineReport, PipelineStage, ZipArchiveReader,
};

#[derive(Debug, Clone, clap::Args)]
pub struct OptimizeArgs {
    #[command(flatten)]
    pub source: ModSourceArgs,

    /// Directory the optimized textures are written to
    #[arg(short, long)]
    pub output: Utf8PathBuf,

    /// JSON or TOML settings file with targets and exclusions.
    /// Replaces the per-type resolutions and --included-types
    #[arg(short, long)]
    pub settings: Option<Utf8PathBuf>,

    /// Texture types to resize
    #[arg(
        long,
        value_enum,
        value_delimiter = ',',
        default_values = ["diffuse", "normal", "height", "environment"]
    )]
    pub included_types: Vec<TextureType>,

    #[arg(long, default_value_t = 2048)]
    pub diffuse: u32,
    #[arg(long, default_value_t = 1024)]
    pub normal: u32,
    #[arg(long, default_value_t = 1024)]
    pub model_space_normal: u32,
    #[arg(long, default_value_t = 1024)]
    pub reflection: u32,
    #[arg(long, default_value_t = 1024)]
    pub subsurface_scattering: u32,
    #[arg(long, default_value_t = 1024)]
    pub specular: u32,
    #[arg(long, default_value_t = 1024)]
    pub glow: u32,
    #[arg(long, default_value_t = 1024)]
    pub backlighting: u32,
    #[arg(long, default_value_t = 1024)]
    pub environment: u32,
    #[arg(long, default_value_t = 1024)]
    pub height: u32,

    /// Filename globs to skip, replacing the defaults (e.g. "*_g.dds,icewall*.dds")
    #[arg(long, value_delimiter = ',')]
    pub excluded_filenames: Option<Vec<String>>,

    /// Directory substrings to skip, replacing the defaults (e.g. "/interface,/lod")
    #[arg(long, value_delimiter = ',')]
    pub excluded_paths: Option<Vec<String>>,

    /// Continue a previous run: keep existing outputs and skip their sources
    #[arg(long)]
    pub resume: bool,

    /// Write main.log, exclusions.log and errors.log to the output directory
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub logging: bool,

    /// Maximum number of textures processed at once (defaults to the CPU count)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// File extensions read as Bethesda archives
    #[arg(long, value_delimiter = ',', default_value = "bsa")]
    pub bsa_extensions: Vec<String>,

    /// File extensions read as zip archives
    #[arg(long, value_delimiter = ',', default_value = "zip")]
    pub zip_extensions: Vec<String>,
}

impl OptimizeArgs {
    fn archive_readers(&self) -> ArchiveReaders {
        ArchiveReaders::new()
            .with_reader(BsaArchiveReader::new(&self.bsa_extensions))
            .with_reader(ZipArchiveReader::new(&self.zip_extensions))
    }

    fn resolutions(&self) -> TypeResolutions {
        TypeResolutions {
            diffuse: self.diffuse,
            normal: self.normal,
            model_space_normal: self.model_space_normal,
            reflection: self.reflection,
            subsurface_scattering: self.subsurface_scattering,
            specular: self.specular,
            glow: self.glow,
            backlighting: self.backlighting,
            environment: self.environment,
            height: self.height,
        }
    }

    /// Settings file or per-type options, with the exclusion overrides applied.
    fn resolve_settings(&self) -> Result<Settings, CliError> {
        let mut settings = match &self.settings {
            Some(path) => Settings::load(path)?,
            None => Settings::from_texture_types(&self.resolutions(), &self.included_types),
        };

        if let Some(filenames) = &self.excluded_filenames {
            settings.exclusions.filenames = filenames.clone();
        }
        if let Some(paths) = &self.excluded_paths {
            settings.exclusions.paths = paths.clone();
        }
        Ok(settings)
    }

    fn pipeline_config(&self, settings: &Settings) -> PipelineConfig {
        let mut config = PipelineConfig::new(self.output.clone(), settings.target_mapping())
            .with_excluded_filenames(&settings.exclusions.filenames)
            .with_excluded_paths(&settings.exclusions.paths)
            .with_resume(self.resume)
            .with_audit_logging(self.logging);
        if let Some(jobs) = self.jobs {
            config = config.with_max_in_flight(jobs);
        }
        config
    }
}

pub fn optimize_textures(args: OptimizeArgs) -> Result<()> {
    let mods = args.source.load_mods()?;
    let settings = args.resolve_settings()?;
    let config = args.pipeline_config(&settings);
    config.validate().map_err(CliError::from)?;

    print_header(&config, mods.len());

    let bar = progress_bar();
    let bar_handle = bar.clone();
    let builder = PipelineBuilder::new(config)
        .with_archive_reader(Arc::new(args.archive_readers()))
        .with_progress(move |progress| render_progress(&bar_handle, &progress));

    let result = builder.run(&mods);
    bar.finish_and_clear();
    let report = result.map_err(CliError::from)?;

    print_report(&report, &args);
    Ok(())
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    let style = ProgressStyle::with_template(
        "{spinner:.green} {prefix:>11.bold} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} | {msg}",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

fn render_progress(bar: &ProgressBar, progress: &PipelineProgress) {
    let stage = match progress.stage {
        PipelineStage::Discovering => "Discovering",
        PipelineStage::Probing => "Probing",
        PipelineStage::Resizing => "Resizing",
        PipelineStage::Complete => "Done",
    };
    bar.set_prefix(stage);
    bar.set_length(progress.total as u64);
    bar.set_position(progress.current as u64);
    if let Some(item) = &progress.current_item {
        bar.set_message(item.clone());
    }
}

fn print_header(config: &PipelineConfig, mod_count: usize) {
    let targets = config
        .targets
        .iter()
        .map(|(suffix, resolution)| format!("{}={}", suffix, resolution))
        .collect::<Vec<_>>()
        .join(" ");

    print_ansi_boxed_lines(&[
        format!(
            "{} {}",
            "sky-tex-opti".bright_cyan().bold(),
            env!("CARGO_PKG_VERSION").dimmed()
        ),
        format!("{} {}", "Mods:".bright_green(), mod_count),
        format!("{} {}", "Output:".bright_green(), config.output_root),
        format!("{} {}", "Targets:".bright_green(), targets),
        format!(
            "{} {} filename patterns, {} paths",
            "Exclusions:".bright_green(),
            config.effective_filename_patterns().len(),
            config.excluded_paths.len()
        ),
        format!(
            "{} {}",
            "Resume:".bright_green(),
            if config.resume { "yes" } else { "no" }
        ),
    ]);
}

fn print_report(report: &PipelineReport, args: &OptimizeArgs) {
    let headline = if report.failed == 0 {
        "✅ Optimization complete".bright_green().bold()
    } else {
        "⚠️ Optimization finished with failures".bright_yellow().bold()
    };
    println_pad!(
        "{} {}",
        headline,
        format!("in {:.1}s", report.elapsed.as_secs_f64()).dimmed()
    );

    let rows = [
        ("Mods scanned", report.mods_scanned),
        ("Textures found", report.candidates),
        ("Overridden", report.duplicates),
        ("Excluded", report.excluded),
        ("Unreadable", report.probe_failures),
        ("Resized", report.resized),
        ("Failed", report.failed),
    ];
    for (label, value) in rows {
        println_pad!(
            "   {} {:<15} {}",
            "•".bright_cyan(),
            label,
            format_count(value).bright_white().bold()
        );
    }
    if report.discovery_errors > 0 {
        println_pad!(
            "   {} {} mods or archives could not be read",
            "•".bright_yellow(),
            report.discovery_errors
        );
    }

    println_pad!(
        "{} {}",
        "📍 Output:".bright_green(),
        args.output.as_str().bright_white().bold()
    );
    if args.logging && (report.failed > 0 || report.probe_failures > 0) {
        println_pad!(
            "{} {}",
            "🧾 Details:".bright_yellow(),
            args.output.join("errors.log").as_str().bright_white()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: OptimizeArgs,
    }

    fn parse(argv: &[&str]) -> OptimizeArgs {
        let mut full = vec!["sky-tex-opti"];
        full.extend_from_slice(argv);
        TestCli::try_parse_from(full).unwrap().args
    }

    #[test]
    fn test_defaults() {
        let args = parse(&["--mod-list", "mods.txt", "--output", "out"]);
        assert_eq!(
            args.included_types,
            vec![
                TextureType::Diffuse,
                TextureType::Normal,
                TextureType::Height,
                TextureType::Environment
            ]
        );
        assert_eq!(args.resolutions(), TypeResolutions::default());
        assert!(args.logging);
        assert!(!args.resume);
        assert_eq!(args.bsa_extensions, vec!["bsa"]);
        assert_eq!(args.zip_extensions, vec!["zip"]);
    }

    #[test]
    fn test_archive_extensions() {
        use stx_pipeline::ArchiveReader;

        let args = parse(&[
            "--mod-list",
            "mods.txt",
            "--output",
            "out",
            "--zip-extensions",
            "zip,7z",
        ]);
        let readers = args.archive_readers();
        assert!(readers.is_container(camino::Utf8Path::new("mods/a/Textures.BSA")));
        assert!(readers.is_container(camino::Utf8Path::new("mods/a/pack.7z")));
        assert!(!readers.is_container(camino::Utf8Path::new("mods/a/Textures.ba2")));
    }

    #[test]
    fn test_profile_conflicts_with_mod_list() {
        let result = TestCli::try_parse_from([
            "sky-tex-opti",
            "--profile",
            "p",
            "--mod-list",
            "m",
            "--output",
            "out",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_from_type_options() {
        let args = parse(&[
            "--mod-list",
            "mods.txt",
            "--output",
            "out",
            "--included-types",
            "diffuse,glow",
            "--diffuse",
            "1024",
            "--glow",
            "256",
            "--logging",
            "false",
            "-j",
            "3",
        ]);
        let settings = args.resolve_settings().unwrap();
        let config = args.pipeline_config(&settings);

        assert_eq!(config.targets.lookup("textures/a_g.dds"), Some(("_g.dds", 256)));
        assert_eq!(config.targets.lookup("textures/a.dds"), Some((".dds", 1024)));
        assert_eq!(config.targets.lookup("textures/a_n.dds"), Some((".dds", 1024)));
        assert!(config
            .effective_filename_patterns()
            .contains(&"*_n.dds".to_string()));
        assert!(!config.audit_logging);
        assert_eq!(config.max_in_flight, 3);
    }

    #[test]
    fn test_exclusion_overrides() {
        let args = parse(&[
            "--mod-list",
            "mods.txt",
            "--output",
            "out",
            "--excluded-filenames",
            "*_G.dds,icewall*.dds",
            "--excluded-paths",
            "/Interface",
        ]);
        let settings = args.resolve_settings().unwrap();
        assert_eq!(settings.exclusions.filenames, vec!["*_G.dds", "icewall*.dds"]);

        let config = args.pipeline_config(&settings);
        assert_eq!(config.excluded_filenames, vec!["*_g.dds", "icewall*.dds"]);
        assert_eq!(config.excluded_paths, vec!["/interface"]);
    }

    #[test]
    fn test_settings_file_replaces_type_options() {
        let dir = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(dir.path().join("settings.toml")).unwrap();
        std::fs::write(
            &path,
            "[[targets]]\nsuffixes = [\"_n.dds\"]\nresolution = 512\n\n[exclusions]\npaths = [\"/lod\"]\n",
        )
        .unwrap();

        let args = parse(&[
            "--mod-list",
            "mods.txt",
            "--output",
            "out",
            "--settings",
            path.as_str(),
        ]);
        let settings = args.resolve_settings().unwrap();
        let config = args.pipeline_config(&settings);

        assert_eq!(config.targets.len(), 1);
        assert_eq!(config.targets.lookup("textures/a_n.dds"), Some(("_n.dds", 512)));
        assert!(config.excluded_filenames.is_empty());
        assert_eq!(config.excluded_paths, vec!["/lod"]);
    }
}
