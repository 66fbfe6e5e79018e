mod cli_args;
mod output;
mod vcs;

use anyhow::{Context, Result};
use clap::Parser;
use colored::*;
use log;
use std::process;

use cli_args::Cli;
use codecontext_core::{AppError, Config, PromptEngine};

fn main() {
    let cli_args = Cli::parse();

    setup_logging(cli_args.quiet, cli_args.verbose);
    let quiet = cli_args.quiet;

    log::debug!("CLI args parsed: {:?}", cli_args);

    let exit_code = match run_app(cli_args) {
        Ok(_) => {
            log::info!("Application finished successfully.");
            0
        }
        Err(e) => {
            let exit_code = exit_code_for(&e);
            if !quiet || exit_code == 1 {
                eprintln!("{} {:#}", "Error:".red().bold(), e);
            } else {
                log::error!("Application failed: {:#}", e);
            }
            exit_code
        }
    };
    log::debug!("Exiting with code {}", exit_code);
    process::exit(exit_code);
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AppError>() {
        Some(core_err) if core_err.is_configuration() => 1,
        Some(AppError::Io(_))
        | Some(AppError::FileRead { .. })
        | Some(AppError::FileWrite { .. })
        | Some(AppError::Ignore(_)) => 2,
        Some(AppError::Format { .. }) => 6,
        Some(AppError::TikToken(_)) => 8,
        Some(_) => 1,
        None => 1,
    }
}

fn setup_logging(quiet: bool, verbose: u8) {
    let log_level = if quiet {
        log::LevelFilter::Off
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();
    log::trace!("Logger initialized with level: {:?}", log_level);
}

fn run_app(cli: Cli) -> Result<()> {
    let project_root = Config::determine_project_root(cli.project_config.project_root.as_ref())
        .context("Failed to determine codebase root")?;
    log::info!("Codebase root determined: {}", project_root.display());

    let config = load_config(&project_root, &cli)?;
    if cli.prompt_text.is_none()
        && config.filters.include.is_empty()
        && config.filters.exclude.is_empty()
    {
        return Err(AppError::Config(
            "Provide a prompt text or at least one --include/--exclude pattern".to_string(),
        )
        .into());
    }

    let engine = PromptEngine::new(&project_root, &config).context("Invalid configuration")?;
    let vcs = vcs::collect(&project_root, &cli.git).context("Failed to collect git context")?;
    let result = engine
        .run(cli.prompt_text.as_deref(), &vcs)
        .context("Failed to assemble context")?;

    output::print_warnings(&result.warnings, cli.quiet);
    output::deliver(&result.text, cli.output.output_file.as_deref(), cli.quiet)?;
    if let Some(summary) = &result.token_summary {
        output::print_token_summary(summary);
    }
    Ok(())
}

fn load_config(project_root: &std::path::Path, cli: &Cli) -> Result<Config> {
    let config_path = Config::resolve_config_path(
        project_root,
        cli.project_config.config_file.as_ref(),
        cli.project_config.disable_config,
    )
    .context("Failed to resolve configuration path")?;

    let config = match &config_path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };
    Ok(merge_config_with_cli_overrides(config, cli))
}

/// CLI flags win over the config file; list flags extend the configured lists.
fn merge_config_with_cli_overrides(mut config: Config, cli: &Cli) -> Config {
    log::trace!("Applying CLI overrides to config...");

    config.filters.include.extend(cli.filters.include.iter().cloned());
    config.filters.exclude.extend(cli.filters.exclude.iter().cloned());
    if cli.filters.include_priority {
        config.filters.include_priority = true;
    }
    if cli.filters.hidden {
        config.general.include_hidden = true;
    }
    if cli.filters.follow_symlinks {
        config.general.follow_symlinks = true;
    }
    if cli.filters.no_ignore {
        config.general.use_gitignore = false;
    }
    config
        .general
        .ignore_files
        .extend(cli.filters.ignore_files.iter().cloned());

    if cli.render.line_numbers {
        config.render.line_numbers = true;
    }
    if cli.render.absolute_paths {
        config.render.absolute_paths = true;
    }
    if cli.render.no_codeblock {
        config.render.code_fencing = false;
    }
    if cli.render.full_directory_tree {
        config.render.full_directory_tree = true;
    }
    if let Some(sort) = &cli.render.sort {
        config.render.sort = sort.clone();
    }
    if let Some(size) = &cli.render.max_file_size {
        config.render.max_file_size = Some(size.clone());
    }

    if let Some(format) = &cli.output.format {
        config.output.format = format.clone();
    }
    if let Some(template) = &cli.output.template {
        config.output.template = Some(template.clone());
    }
    if let Some(tokenizer) = &cli.output.tokenizer {
        config.output.tokenizer = tokenizer.clone();
    }
    if let Some(tokens) = &cli.output.tokens {
        config.output.tokens = Some(tokens.clone());
    }

    log::trace!("Config after CLI overrides: {:?}", config);
    config
}
