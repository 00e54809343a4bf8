// Command-line parsing and program resolution.

use clap::Parser;
use isochron_core::{EndAction, Program, Stage, DEFAULT_START_BEAT_HZ, LOOKAHEAD_SEC};
use isochron_native::Cli;
use std::io::Write;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["isochron"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
fn stage_flags_build_a_program() {
    let cli = parse(&["--start-beat", "7", "--stage", "4@30m", "--stage", "2:600"]);
    let p = cli.program().unwrap();
    assert_eq!(p.start_beat_hz, 7.0);
    assert_eq!(p.stages, vec![Stage::new(4.0, 1800.0), Stage::new(2.0, 600.0)]);
    assert_eq!(p.end_action, EndAction::Hold);
}

#[test]
fn no_flags_give_a_steady_default_beat() {
    let p = parse(&[]).program().unwrap();
    assert_eq!(p.start_beat_hz, DEFAULT_START_BEAT_HZ);
    assert!(p.stages.is_empty());
}

#[test]
fn preset_with_overrides() {
    let cli = parse(&["--preset", "relax", "--carrier", "300", "--end-action", "stop"]);
    let p = cli.program().unwrap();
    let relax = Program::preset("relax").unwrap();
    assert_eq!(p.stages, relax.stages);
    assert_eq!(p.carrier_hz, 300.0);
    assert_eq!(p.end_action, EndAction::Stop);
}

#[test]
fn unknown_preset_lists_the_available_ones() {
    let err = parse(&["--preset", "nap"]).program().unwrap_err();
    let msg = format!("{err:#}");
    assert!(msg.contains("relax, focus, sleep"), "{msg}");
    assert!(msg.contains("nap"), "{msg}");
}

#[test]
fn malformed_stage_is_rejected_by_the_parser() {
    assert!(Cli::try_parse_from(["isochron", "--stage", "fast"]).is_err());
    assert!(Cli::try_parse_from(["isochron", "--end-action", "loop"]).is_err());
}

#[test]
fn invalid_program_fails_validation() {
    let cli = parse(&["--start-beat", "0"]);
    assert!(cli.program().is_err());
    let cli = parse(&["--stage", "0:10", "--stage", "4:10"]);
    assert!(cli.program().is_err());
}

#[test]
fn program_file_is_loaded_and_overridden() {
    let path = std::env::temp_dir().join(format!("isochron-cli-{}.json", std::process::id()));
    {
        let mut f = std::fs::File::create(&path).unwrap();
        write!(
            f,
            r#"{{"startBeatHz": 12, "stages": [{{"targetBeatHz": 6, "durationSeconds": 60}}]}}"#
        )
        .unwrap();
    }
    let cli = parse(&["--program", path.to_str().unwrap(), "--end-action", "stop"]);
    let p = cli.program().unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(p.start_beat_hz, 12.0);
    assert_eq!(p.stages, vec![Stage::new(6.0, 60.0)]);
    assert_eq!(p.end_action, EndAction::Stop);
}

#[test]
fn missing_program_file_names_the_path() {
    let cli = parse(&["--program", "/nonexistent/isochron.json"]);
    let msg = format!("{:#}", cli.program().unwrap_err());
    assert!(msg.contains("/nonexistent/isochron.json"), "{msg}");
}

#[test]
fn scheduler_config_requires_interval_below_lookahead() {
    let cfg = parse(&[]).scheduler_config().unwrap();
    assert_eq!(cfg.lookahead, LOOKAHEAD_SEC);
    assert!(parse(&["--interval", "0.3"]).scheduler_config().is_err());
    assert!(parse(&["--lookahead", "0"]).scheduler_config().is_err());
    let cfg = parse(&["--lookahead", "0.5", "--interval", "0.2"])
        .scheduler_config()
        .unwrap();
    assert_eq!((cfg.lookahead, cfg.interval), (0.5, 0.2));
}

#[test]
fn program_and_preset_conflict() {
    assert!(Cli::try_parse_from(["isochron", "--program", "a.json", "--preset", "relax"]).is_err());
}
