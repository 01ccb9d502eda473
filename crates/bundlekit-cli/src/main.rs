//! Command-line interface for bundlekit plugin bundles.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bundlekit_core::config::env_vars;
use bundlekit_core::{BundleDescriptor, BundleManifest, BundleScanner, LoaderConfig, PluginLoader};
use bundlekit_sdk::Plugin;
use clap::{Parser, Subcommand};
use serde_json::json;

/// bundlekit - discover and inspect plugin bundles.
#[derive(Parser, Debug)]
#[command(name = "bundlekit")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Loader configuration file (TOML).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Plugin root directory, may be repeated. Appended after configured roots.
    #[arg(short, long = "root", global = true)]
    roots: Vec<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the plugin roots and print the bundles found.
    Scan {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Build a plugin loader over the plugin roots and list its plugins.
    List {
        /// Instantiate every plugin and show what it reports about itself.
        #[arg(short, long)]
        describe: bool,
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Show the manifest of one bundle archive.
    Inspect {
        /// Path to the bundle archive.
        #[arg(required = true)]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;

    match args.command {
        Command::Scan { json } => run_scan(&config, json),
        Command::List { describe, json } => run_list(&config, describe, json),
        Command::Inspect { path } => run_inspect(&config, &path),
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var("BUNDLEKIT_LOG_JSON")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    let default_directive = if verbose { "bundlekit=debug" } else { "bundlekit=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Configuration file (or the environment), then `--root` flags.
fn load_config(args: &Args) -> Result<LoaderConfig> {
    let mut config = match &args.config {
        Some(path) => LoaderConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => LoaderConfig::from_env(),
    };
    config.roots.extend(args.roots.iter().cloned());
    config.validate()?;

    Ok(config)
}

fn require_roots(config: &LoaderConfig) -> Result<()> {
    if config.roots.is_empty() {
        bail!(
            "No plugin roots configured. Use --root, a --config file or {}",
            env_vars::PLUGIN_PATH
        );
    }
    Ok(())
}

fn run_scan(config: &LoaderConfig, json: bool) -> Result<()> {
    require_roots(config)?;
    let descriptors = BundleScanner::from_config(config)
        .scan()
        .context("Failed to scan plugin roots")?;

    if json {
        let bundles: Vec<_> = descriptors.iter().map(descriptor_json).collect();
        println!("{}", serde_json::to_string_pretty(&bundles)?);
        return Ok(());
    }

    if descriptors.is_empty() {
        println!("No bundles found");
        return Ok(());
    }

    for descriptor in &descriptors {
        println!("{:<24} {}", descriptor.plugin_name(), descriptor.entry_point());
        for location in descriptor.resource_locations() {
            println!("  {}", location.display());
        }
    }

    Ok(())
}

fn descriptor_json(descriptor: &BundleDescriptor) -> serde_json::Value {
    json!({
        "name": descriptor.plugin_name(),
        "entry_point": descriptor.entry_point(),
        "resource_locations": descriptor.resource_locations(),
    })
}

fn run_list(config: &LoaderConfig, describe: bool, json: bool) -> Result<()> {
    require_roots(config)?;
    let loader = PluginLoader::<dyn Plugin>::from_config(config)
        .context("Failed to build plugin loader")?;

    let mut plugins = Vec::new();
    for (name, factory) in loader.iter() {
        let mut entry = json!({
            "name": name,
            "entry_point": factory.entry_point(),
        });

        if describe {
            entry["status"] = match factory.create() {
                Ok(plugin) => json!({
                    "about": plugin.about(),
                    "version": plugin.version(),
                }),
                Err(e) => json!({ "error": e.to_string() }),
            };
        }
        plugins.push(entry);
    }
    loader.close();

    if json {
        println!("{}", serde_json::to_string_pretty(&plugins)?);
        return Ok(());
    }

    if plugins.is_empty() {
        println!("No plugins registered");
        return Ok(());
    }

    for plugin in &plugins {
        let name = plugin["name"].as_str().unwrap_or_default();
        let entry_point = plugin["entry_point"].as_str().unwrap_or_default();
        println!("{name:<24} {entry_point}");

        let status = &plugin["status"];
        if let Some(error) = status["error"].as_str() {
            println!("  unavailable: {error}");
        } else if let Some(about) = status["about"].as_str() {
            let version = status["version"].as_str().unwrap_or_default();
            println!("  {about} (version {version})");
        }
    }

    Ok(())
}

fn run_inspect(config: &LoaderConfig, path: &Path) -> Result<()> {
    let manifest = BundleManifest::read(path, &config.manifest_entry)
        .with_context(|| format!("{} is not a valid bundle", path.display()))?;
    let entry_point = manifest
        .require_entry_point()
        .with_context(|| format!("{} is not a valid bundle", path.display()))?;
    let descriptor = BundleDescriptor::for_archive(entry_point, path, &config.archive_suffix());

    println!("Name:            {}", descriptor.plugin_name());
    println!("Entry point:     {}", descriptor.entry_point());
    if let Some(name) = &manifest.name {
        println!("Display name:    {name}");
    }
    if let Some(version) = &manifest.version {
        println!("Version:         {version}");
    }
    if let Some(description) = &manifest.description {
        println!("Description:     {description}");
    }
    println!("Locations:");
    for location in descriptor.resource_locations() {
        let marker = if location.exists() { "" } else { " (missing)" };
        println!("  {}{marker}", location.display());
    }

    Ok(())
}
