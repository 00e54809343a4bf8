use anyhow::Context;
use clap::Parser;
use isochron_core::{
    total_duration, MonotonicClock, PlaybackController, PlaybackStatus, Program, SchedulerConfig,
    SignalGraph,
};
use isochron_native::{format_clock, render_offline, run_realtime, Cli, RunOptions};
use log::{info, LevelFilter};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    env_logger::builder()
        .filter_level(if cli.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        })
        .parse_default_env()
        .init();

    let program = cli.program()?;
    let config = cli.scheduler_config()?;

    if cli.print_program {
        println!("{}", program.to_json_string()?);
        return Ok(());
    }

    info!(
        "program: start {:.2} Hz, {} stages over {}, carrier {:.1} Hz, then {:?}",
        program.start_beat_hz,
        program.stages.len(),
        format_clock(total_duration(&program)),
        program.carrier_hz,
        program.end_action
    );

    if cli.offline {
        return offline(&cli, program, config);
    }

    let options = RunOptions {
        max_seconds: cli.max_seconds,
        status_every: cli.status_every,
    };
    match play(&cli, program, config, &options)? {
        status @ PlaybackStatus::Failed(_) => anyhow::bail!("{status}"),
        status => println!("{status}"),
    }
    Ok(())
}

fn offline(cli: &Cli, program: Program, config: SchedulerConfig) -> anyhow::Result<()> {
    let report = render_offline(program, config, cli.volume, cli.muted, cli.max_seconds)
        .context("offline render")?;
    if cli.dump_pulses {
        for (t, beat) in &report.onsets {
            println!("{t:10.4}  {beat:7.3}");
        }
    }
    println!(
        "{}: {} pulses over {} (peak {:.3}, rms {:.3})",
        report.status,
        report.pulses(),
        format_clock(report.rendered_seconds),
        report.peak,
        report.rms
    );
    Ok(())
}

#[cfg(feature = "audio")]
fn play(
    cli: &Cli,
    program: Program,
    config: SchedulerConfig,
    options: &RunOptions,
) -> anyhow::Result<PlaybackStatus> {
    use isochron_native::CpalGraph;

    let clock = MonotonicClock::new();
    let device_clock = clock.clone();
    let controller = PlaybackController::new(clock, move |_: &Program| {
        CpalGraph::open(device_clock.clone())
    });
    drive(cli, controller, program, config, options)
}

#[cfg(not(feature = "audio"))]
fn play(
    cli: &Cli,
    program: Program,
    config: SchedulerConfig,
    options: &RunOptions,
) -> anyhow::Result<PlaybackStatus> {
    use isochron_native::VoiceGraph;

    log::warn!("built without the `audio` feature; running silently");
    let controller = PlaybackController::new(MonotonicClock::new(), |_: &Program| {
        Ok(VoiceGraph::new(isochron_native::runner::OFFLINE_SAMPLE_RATE))
    });
    drive(cli, controller, program, config, options)
}

fn drive<G: SignalGraph>(
    cli: &Cli,
    controller: PlaybackController<MonotonicClock, G>,
    program: Program,
    config: SchedulerConfig,
    options: &RunOptions,
) -> anyhow::Result<PlaybackStatus> {
    let mut controller = controller
        .with_scheduler_config(config)
        .with_volume(cli.volume);
    controller.set_muted(cli.muted);
    run_realtime(&mut controller, program, options)
}
