mod script;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command, ValueEnum};
use log::info;
use simplelog::{ConfigBuilder, LevelFilter, LevelPadding, WriteLogger};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use time::macros::format_description;

use northbridge_ios::{create_disk_image, disk_file_name, hex_dump, BiosSettings, BootMode,
                      BootSource, BusProtocolEngine, ClockMode, DirBlockStore, DiskEmulator,
                      HostClock, HostTicks, Peripherals, SerialConsole, VirtualBus,
                      DISK_IMAGE_SIZE, MAX_DISK_NUM, MAX_DISK_SETS, MAX_SECTORS, MAX_TRACKS,
                      SECTOR_SIZE};

use crate::script::{parse_script, Replay};

const ROOT: &str = "root";
const DISK_SET: &str = "disk-set";
const COUNT: &str = "count";
const DISK: &str = "disk";
const TRACK: &str = "track";
const SECTOR: &str = "sector";
const SCRIPT: &str = "SCRIPT";
const BOOT_MODE: &str = "boot-mode";
const CLOCK: &str = "clock";
const AUTOEXEC: &str = "autoexec";
const ILOAD: &str = "iload";
const LOG_PATH: &str = "log";
const LOG_LEVEL: &str = "log-level";

/// Possible log levels.
#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum ClockArg {
    Fast,
    Slow,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone, ValueEnum)]
enum BootModeArg {
    Basic,
    Forth,
    #[value(name = "disk")]
    OsOnDisk,
    Auto,
    #[value(name = "iload")]
    ILoad,
}

fn root_arg() -> Arg {
    Arg::new(ROOT)
        .help("The directory standing in for the memory card.")
        .short('r')
        .long("root")
        .action(ArgAction::Set)
        .value_parser(value_parser!(PathBuf))
        .required(true)
}

fn disk_set_arg() -> Arg {
    Arg::new(DISK_SET)
        .help("The disk set to work with.")
        .short('s')
        .long("disk-set")
        .action(ArgAction::Set)
        .value_parser(value_parser!(u8).range(0..MAX_DISK_SETS as i64))
        .default_value("0")
}

fn cli() -> Command {
    // Hack to make the build dirty when the toml changes.
    include_str!("../../Cargo.toml");

    clap::command!()
        .subcommand_required(true)
        .after_help("\
This is the Northbridge I/O controller host tool. Virtual disks live as \
DS<set>N<nn>.DSK files in a directory that stands in for the memory card. \
Use 'format' to create blank disks, 'dump' to inspect a sector, and 'replay' \
to drive the full controller with a script of host bus cycles.")
        .arg(Arg::new(LOG_PATH)
            .help("If set, a debug log will be written to the given path.")
            .short('l')
            .long("log")
            .action(ArgAction::Set)
            .value_parser(value_parser!(PathBuf))
            .global(true))
        .arg(Arg::new(LOG_LEVEL)
            .help("Set the log level. Has no effect without \
                   specifying --log as well. Case insensitive.")
            .short('L')
            .long("log-level")
            .action(ArgAction::Set)
            .value_parser(value_parser!(LogLevel))
            .default_value("trace")
            .ignore_case(true)
            .global(true))
        .subcommand(Command::new("format")
            .about("Create blank disk images for a disk set.")
            .arg(root_arg())
            .arg(disk_set_arg())
            .arg(Arg::new(COUNT)
                .help("How many disks to create, starting from disk 0.")
                .short('c')
                .long("count")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u8).range(1..=(MAX_DISK_NUM as i64 + 1)))
                .default_value("16")))
        .subcommand(Command::new("dump")
            .about("Print one sector of a virtual disk.")
            .arg(root_arg())
            .arg(disk_set_arg())
            .arg(Arg::new(DISK)
                .help("The disk number.")
                .short('d')
                .long("disk")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u8))
                .required(true))
            .arg(Arg::new(TRACK)
                .help("The track number.")
                .short('t')
                .long("track")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u16))
                .required(true))
            .arg(Arg::new(SECTOR)
                .help("The sector number.")
                .short('S')
                .long("sector")
                .action(ArgAction::Set)
                .value_parser(value_parser!(u8))
                .required(true)))
        .subcommand(Command::new("replay")
            .about("Run a script of host bus cycles through the controller.")
            .arg(root_arg())
            .arg(disk_set_arg())
            .arg(Arg::new(SCRIPT)
                .help("The script to replay.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))
                .required(true))
            .arg(Arg::new(BOOT_MODE)
                .help("What the 'boot' command loads.")
                .short('b')
                .long("boot-mode")
                .action(ArgAction::Set)
                .value_parser(value_parser!(BootModeArg))
                .default_value("basic")
                .ignore_case(true))
            .arg(Arg::new(CLOCK)
                .help("The host clock speed.")
                .long("clock")
                .action(ArgAction::Set)
                .value_parser(value_parser!(ClockArg))
                .default_value("fast")
                .ignore_case(true))
            .arg(Arg::new(AUTOEXEC)
                .help("Report the autoexec flag to the host.")
                .long("autoexec")
                .action(ArgAction::SetTrue))
            .arg(Arg::new(ILOAD)
                .help("The built-in image used by the iload boot mode.")
                .long("iload")
                .action(ArgAction::Set)
                .value_parser(value_parser!(PathBuf))))
}

/// Initialise logging to the given file.
fn init_logging(logfile: File, level: LevelFilter) -> Result<(), String> {
    let config = ConfigBuilder::new()
        .set_level_padding(LevelPadding::Right)
        .set_location_level(LevelFilter::Off)
        .set_target_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond digits:6]"))
        .build();

    WriteLogger::init(level, config, logfile)
        .map_err(|e| format!("Failed to initialise logging: {}", e))
}

/// Ensure that the given path exists and is a directory.
fn check_root(path: &Path) -> Result<(), String> {
    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(format!("'{}' is not a directory.", path.display())),
        Err(e) => Err(format!("Could not access '{}': {}", path.display(), e)),
    }
}

fn format_disks(args: &ArgMatches) -> Result<(), String> {
    let root = args.get_one::<PathBuf>(ROOT).unwrap();
    let disk_set = *args.get_one::<u8>(DISK_SET).unwrap();
    let count = *args.get_one::<u8>(COUNT).unwrap();
    fs::create_dir_all(root)
        .map_err(|e| format!("Failed to create '{}': {}", root.display(), e))?;

    for number in 0..count {
        let name = disk_file_name(disk_set, number);
        let path = root.join(&name);
        let created = create_disk_image(&path, DISK_IMAGE_SIZE)
            .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
        if created {
            info!("Created {}.", path.display());
            println!("{}: created", name);
        } else {
            println!("{}: exists, left alone", name);
        }
    }
    Ok(())
}

fn dump_sector(args: &ArgMatches) -> Result<(), String> {
    let root = args.get_one::<PathBuf>(ROOT).unwrap();
    check_root(root)?;
    let disk_set = *args.get_one::<u8>(DISK_SET).unwrap();
    let disk_number = *args.get_one::<u8>(DISK).unwrap();
    let track = *args.get_one::<u16>(TRACK).unwrap();
    let sector = *args.get_one::<u8>(SECTOR).unwrap();

    let mut disk = DiskEmulator::new(DirBlockStore::new(root), disk_set);
    let code = disk.mount();
    if code != 0 {
        return Err(format!("Failed to mount '{}': disk error {}", root.display(), code));
    }
    let code = disk.select_disk(disk_number);
    if code != 0 {
        return Err(format!("Failed to select disk {}: disk error {}", disk_number, code));
    }
    disk.select_track(track);
    let code = disk.select_sector(sector);
    if code != 0 {
        return Err(format!("Failed to select track {} sector {} (limits {}/{}): disk error {}",
                           track, sector, MAX_TRACKS, MAX_SECTORS, code));
    }

    let mut data = Vec::with_capacity(SECTOR_SIZE);
    for position in 0..SECTOR_SIZE as u16 {
        data.push(disk.read_sector_byte(position).0);
    }
    if disk.last_error() != 0 {
        return Err(format!("Failed to read sector: disk error {}", disk.last_error()));
    }
    print!("{}", hex_dump(&data, 0));
    Ok(())
}

fn replay(args: &ArgMatches) -> Result<(), String> {
    let root = args.get_one::<PathBuf>(ROOT).unwrap();
    check_root(root)?;
    let script_path = args.get_one::<PathBuf>(SCRIPT).unwrap();
    let text = fs::read_to_string(script_path)
        .map_err(|e| format!("Failed to read script '{}': {}", script_path.display(), e))?;
    let commands = parse_script(&text)
        .map_err(|e| format!("Bad script '{}': {}", script_path.display(), e))?;

    let clock_mode = match args.get_one::<ClockArg>(CLOCK).unwrap() {
        ClockArg::Fast => ClockMode::Fast,
        ClockArg::Slow => ClockMode::Slow,
    };
    let boot_mode = match args.get_one::<BootModeArg>(BOOT_MODE).unwrap() {
        BootModeArg::Basic => BootMode::Basic,
        BootModeArg::Forth => BootMode::Forth,
        BootModeArg::OsOnDisk => BootMode::OsOnDisk,
        BootModeArg::Auto => BootMode::Auto,
        BootModeArg::ILoad => BootMode::ILoad,
    };
    let settings = BiosSettings::new(clock_mode,
                                     *args.get_one::<u8>(DISK_SET).unwrap(),
                                     args.get_flag(AUTOEXEC),
                                     boot_mode);
    let embedded = match args.get_one::<PathBuf>(ILOAD) {
        Some(path) => Some(fs::read(path)
            .map_err(|e| format!("Failed to read image '{}': {}", path.display(), e))?),
        None => None,
    };
    // Only a 'boot' line reports a missing source.
    let boot_source = BootSource::for_settings(&settings, embedded);

    let (serial_tx, serial_rx) = mpsc::channel();
    let peripherals = Peripherals::absent()
        .with_serial(Box::new(SerialConsole::new(serial_rx, io::stdout())))
        .with_rtc(Box::new(HostClock::new()));
    let mut engine = BusProtocolEngine::new(
        VirtualBus::new(),
        DirBlockStore::new(root),
        peripherals,
        &settings,
        HostTicks::new());

    Replay::new(&mut engine, serial_tx, boot_source, io::stdout()).run(&commands)
}

/// Main run function; returns an exit code.
fn run(args: ArgMatches) -> u8 {
    return match _run(args) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    };

    fn _run(args: ArgMatches) -> Result<(), String> {
        // Initialise logging if configured.
        if let Some(log_path) = args.get_one::<PathBuf>(LOG_PATH) {
            let logfile = File::create(log_path)
                .map_err(|e| format!("Failed to create log file: {}", e))?;
            let level = match args.get_one::<LogLevel>(LOG_LEVEL).unwrap() {
                LogLevel::Trace => LevelFilter::Trace,
                LogLevel::Debug => LevelFilter::Debug,
                LogLevel::Info => LevelFilter::Info,
            };
            init_logging(logfile, level)?;
        }

        match args.subcommand() {
            Some(("format", sub)) => format_disks(sub),
            Some(("dump", sub)) => dump_sector(sub),
            Some(("replay", sub)) => replay(sub),
            _ => unreachable!(),
        }
    }
}

fn main() {
    let args = cli().get_matches();
    std::process::exit(run(args).into());
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile;

    macro_rules! invoke {
        ($($args:expr),+) => {{
            let args = cli().try_get_matches_from(
                    vec!["northbridge".to_string(), $($args.to_string()),*])
                .unwrap();
            run(args)
        }}
    }

    #[test]
    fn test_cli_is_well_formed() {
        cli().debug_assert();
    }

    #[test]
    fn test_format_then_dump() {
        let tempdir = tempfile::tempdir().unwrap();
        let root = tempdir.path().to_str().unwrap();
        assert_eq!(invoke!("format", "--root", root, "--disk-set", "2", "--count", "3"), 0);
        for n in 0..3 {
            let meta = fs::metadata(tempdir.path().join(disk_file_name(2, n))).unwrap();
            assert_eq!(meta.len(), DISK_IMAGE_SIZE);
        }
        assert!(fs::metadata(tempdir.path().join("DS2N03.DSK")).is_err());

        assert_eq!(invoke!("dump", "-r", root, "-s", "2", "-d", "1", "-t", "511", "-S", "31"), 0);
        // Missing disk, then an illegal sector.
        assert_eq!(invoke!("dump", "-r", root, "-s", "2", "-d", "5", "-t", "0", "-S", "0"), 1);
        assert_eq!(invoke!("dump", "-r", root, "-s", "2", "-d", "1", "-t", "0", "-S", "32"), 1);
    }

    #[test]
    fn test_format_default_count() {
        let tempdir = tempfile::tempdir().unwrap();
        assert_eq!(invoke!("format", "-r", tempdir.path().to_str().unwrap(), "-s", "3"), 0);
        assert!(tempdir.path().join("DS3N15.DSK").is_file());
        assert!(!tempdir.path().join("DS3N16.DSK").exists());
    }

    #[test]
    fn test_format_leaves_existing_images() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("DS0N00.DSK");
        fs::write(&path, [1, 2, 3]).unwrap();
        assert_eq!(invoke!("format", "-r", tempdir.path().to_str().unwrap(), "-c", "1"), 0);
        assert_eq!(fs::read(&path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_bad_arguments() {
        assert!(cli().try_get_matches_from(vec!["northbridge", "format", "-r", ".", "-s", "6"]).is_err());
        assert!(cli().try_get_matches_from(vec!["northbridge", "dump", "-r", "."]).is_err());
        assert!(cli().try_get_matches_from(vec!["northbridge"]).is_err());
    }

    #[test]
    fn test_replay_script() {
        let tempdir = tempfile::tempdir().unwrap();
        let root = tempdir.path().to_str().unwrap();
        assert_eq!(invoke!("format", "-r", root, "-c", "1"), 0);
        fs::write(tempdir.path().join("BASIC47.BIN"), [0x3E, 0x01, 0x76]).unwrap();
        let script = tempdir.path().join("script.txt");
        fs::write(&script, "boot\nstore 87\nread\nstore 09\nwrite 00\nstore 85\nread\n").unwrap();
        assert_eq!(invoke!("replay", "-r", root, script.to_str().unwrap()), 0);

        fs::write(&script, "store\n").unwrap();
        assert_eq!(invoke!("replay", "-r", root, script.to_str().unwrap()), 1);
    }

    #[test]
    fn test_replay_iload() {
        let tempdir = tempfile::tempdir().unwrap();
        let root = tempdir.path().to_str().unwrap();
        let script = tempdir.path().join("script.txt");
        fs::write(&script, "boot\n").unwrap();
        let script = script.to_str().unwrap();
        // No built-in image to boot.
        assert_eq!(invoke!("replay", "-r", root, "-b", "iload", script), 1);

        let image = tempdir.path().join("image.bin");
        fs::write(&image, [0xC3, 0x00, 0x01]).unwrap();
        assert_eq!(invoke!("replay", "-r", root, "-b", "iload",
                           "--iload", image.to_str().unwrap(), script), 0);
        // A script that never boots does not need a source.
        let idle = tempdir.path().join("idle.txt");
        fs::write(&idle, "ack\n").unwrap();
        assert_eq!(invoke!("replay", "-r", root, "-b", "iload", idle.to_str().unwrap()), 0);
    }

    #[test]
    fn test_replay_missing_root() {
        let tempdir = tempfile::tempdir().unwrap();
        let script = tempdir.path().join("script.txt");
        fs::write(&script, "ack\n").unwrap();
        let missing = tempdir.path().join("missing");
        assert_eq!(invoke!("replay", "-r", missing.to_str().unwrap(), script.to_str().unwrap()), 1);
    }
}
