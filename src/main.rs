#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use wamble_server::config::Config;

fn main() -> anyhow::Result<()> {
    let config = Config::load()?;
    simple_logger::init_with_level(config.log.level.as_level())?;

    if config.profiles.is_empty() {
        log::warn!("no profiles configured, nothing to listen on");
        return Ok(());
    }

    wamble_server::startup(config)
}
