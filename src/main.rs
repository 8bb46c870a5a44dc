//! Evergreen viewer.
//!
//! Usage:
//!   evergreen [--config <scene.toml>] [--seed <n>] [--image <uri>]... [--music <uri>] [--formed]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use evergreen::{RunOptions, SceneConfig, TreeState};

#[derive(Parser)]
#[command(name = "evergreen")]
#[command(about = "A Christmas tree that assembles itself from particles")]
struct Args {
    /// Scene config file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Fixed random seed for the scene layout
    #[arg(long)]
    seed: Option<u64>,

    /// Photo to show on the tree, in order (file path, file:// or http(s):// URI)
    #[arg(long = "image")]
    images: Vec<String>,

    /// Background music track (file path, file:// or http(s):// URI; "" for silence)
    #[arg(long)]
    music: Option<String>,

    /// Start with the tree assembled
    #[arg(long)]
    formed: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("evergreen=info")).init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match SceneConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("{}", e);
                return ExitCode::FAILURE;
            }
        },
        None => SceneConfig::default(),
    };
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    if args.music.is_some() {
        config.audio.track = args.music;
    }

    let options = RunOptions {
        config,
        initial: if args.formed { TreeState::Formed } else { TreeState::Chaos },
        images: args.images,
    };

    match evergreen::run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
