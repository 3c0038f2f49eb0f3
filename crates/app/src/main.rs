//! Entry point for the glTF viewer.
//! Logging + CLI flags, then hands over to `platform::run`.

mod args;

use anyhow::Result;

use crate::args::ViewerArgs;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = ViewerArgs::parse(std::env::args().skip(1));
    for warning in &args.warnings {
        log::warn!("{warning}");
    }
    let config = args.config;
    log::info!(
        "Starting viewer. Model: {}, backend: {:?}, window_size={}x{}, spin={} rad/s",
        config.model.display(),
        config.backends,
        config.width,
        config.height,
        config.spin
    );

    platform::run(config)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
