mod platform;
mod simulation;

pub use simulation::*;

fn main() -> anyhow::Result<()> {
    #[cfg(not(target_arch = "wasm32"))]
    platform::start()?;

    Ok(())
}
