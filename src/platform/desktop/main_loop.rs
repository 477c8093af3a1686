use std::{path::Path, time::Duration};

use anyhow::Context;
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use log::info;

use crate::{
    scene::SceneConfig,
    simulation_parameters::{load_yaml_config, FluidConfig},
    statistics::write_statistics,
    Fluid,
};

const CARGO_PKG_AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const CARGO_PKG_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

fn init_logging(verbosity: u64) {
    let default_filter = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    // `RUST_LOG` still takes precedence
    let result = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).try_init();
    if let Err(err) = result {
        // another logger is installed and keeps receiving records
        log::debug!("keeping the existing logger: {}", err);
    }
}

pub fn start() -> anyhow::Result<()> {
    let matches = App::new("Position Based Fluids")
        .version(CARGO_PKG_VERSION)
        .author(CARGO_PKG_AUTHORS)
        .about(CARGO_PKG_DESCRIPTION)
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(
            Arg::with_name("v")
                .short("v")
                .multiple(true)
                .help("Sets the level of verbosity"),
        )
        .subcommand(
            SubCommand::with_name("run")
                .about("Run simulation with given config")
                .arg(
                    Arg::with_name("SIMULATION_CONFIG")
                        .help("Sets the fluid paramaters")
                        .required(true)
                        .index(1),
                )
                .arg(
                    Arg::with_name("SCENE_CONFIG")
                        .help("Scene setup: time step, accelerations and collision objects")
                        .required(true)
                        .index(2),
                )
                .arg(
                    Arg::with_name("FRAMES")
                        .long("frames")
                        .short("f")
                        .required(false)
                        .takes_value(true)
                        .help("Number of frames to simulate, overrides the scene config"),
                )
                .arg(
                    Arg::with_name("OVERWRITE_CONFIG_FILE")
                        .long("overwrite-config-file")
                        .short("c")
                        .required(false)
                        .takes_value(true)
                        .help("Overwrite config"),
                )
                .arg(
                    Arg::with_name("STATISTICS_ENABLED")
                        .help("Track performance of individual steps")
                        .short("p")
                        .long("statistics-enabled")
                        .takes_value(false),
                )
                .arg(
                    Arg::with_name("STATISTICS_PATH")
                        .long("statistics-path")
                        .short("w")
                        .required(false)
                        .takes_value(true)
                        .help("Where to write statistics to"),
                )
                .arg(
                    Arg::with_name("RENDER_BUFFER_PATH")
                        .long("render-buffer")
                        .required(false)
                        .takes_value(true)
                        .help("Write the final particle positions and colors as YAML"),
                ),
        )
        .subcommand(
            SubCommand::with_name("print-default-config")
                .about("Print the default fluid config as YAML")
                .arg(
                    Arg::with_name("OUTPUT_YAML")
                        .help("YAML file where the config is written to instead of stdout")
                        .takes_value(true)
                        .required(false),
                ),
        )
        .get_matches();

    init_logging(matches.occurrences_of("v"));

    if let Some(run_matches) = matches.subcommand_matches("run") {
        run(run_matches)
    } else if let Some(subcmd_matches) = matches.subcommand_matches("print-default-config") {
        let yaml = serde_yaml::to_string(&FluidConfig::default()).context("failed serializing default config")?;
        match subcmd_matches.value_of("OUTPUT_YAML") {
            Some(path) => {
                std::fs::write(path, yaml).with_context(|| format!("failed writing `{}`", path))?;
                info!("wrote default config to `{}`", path);
            }
            None => print!("{}", yaml),
        }
        Ok(())
    } else {
        unreachable!()
    }
}

fn run(run_matches: &ArgMatches) -> anyhow::Result<()> {
    let parameter_file = run_matches
        .value_of("SIMULATION_CONFIG")
        .context("missing simulation config")?;
    let overwrite_file = run_matches.value_of("OVERWRITE_CONFIG_FILE").map(Path::new);
    let config: FluidConfig = load_yaml_config(Path::new(parameter_file), overwrite_file)
        .with_context(|| format!("failed loading simulation config `{}`", parameter_file))?;
    config.validate().context("invalid simulation config")?;
    info!("{:?}", config);

    let scene_file = run_matches.value_of("SCENE_CONFIG").context("missing scene config")?;
    let mut scene_config = SceneConfig::load(Path::new(scene_file))
        .with_context(|| format!("failed loading scene config `{}`", scene_file))?;
    if let Some(frames) = run_matches.value_of("FRAMES") {
        scene_config.frames = frames
            .parse::<usize>()
            .with_context(|| format!("invalid frame count `{}`", frames))?;
    }
    info!("{:?}", scene_config);

    let counters_enabled = run_matches.is_present("STATISTICS_ENABLED");
    let fluid = fluid_main(config, &scene_config, counters_enabled);

    if counters_enabled {
        let s = write_statistics(&fluid);
        print!("{}", s);
        if let Some(statistics_path) = run_matches.value_of("STATISTICS_PATH") {
            std::fs::write(statistics_path, s)
                .with_context(|| format!("failed writing statistics to `{}`", statistics_path))?;
        }
    }

    if let Some(render_buffer_path) = run_matches.value_of("RENDER_BUFFER_PATH") {
        let render_buffer = fluid.render_buffer(scene_config.color_source);
        let yaml = serde_yaml::to_string(&render_buffer).context("failed serializing render buffer")?;
        std::fs::write(render_buffer_path, yaml)
            .with_context(|| format!("failed writing render buffer to `{}`", render_buffer_path))?;
        info!(
            "wrote {} particles to `{}`",
            render_buffer.len(),
            render_buffer_path
        );
    }

    Ok(())
}

fn fluid_main(config: FluidConfig, scene_config: &SceneConfig, counters_enabled: bool) -> Fluid {
    let mut fluid = Fluid::new(config, counters_enabled);

    let mut total_duration = Duration::ZERO;
    for frame_number in 0..scene_config.frames {
        let a = std::time::Instant::now();
        scene_config.step_frame(&mut fluid);
        let frame_duration = std::time::Instant::now() - a;
        total_duration += frame_duration;

        info!(
            "{:05}: {} fluid particles {}msec ({}msec AVG)",
            frame_number,
            fluid.num_particles(),
            frame_duration.as_secs_f64() * 1000.,
            total_duration.as_secs_f64() * 1000. / (frame_number + 1) as f64,
        );
    }

    fluid
}
