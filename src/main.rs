use std::fs::{File, OpenOptions};
use std::path::Path;
use std::process;

use chunkvault::{cli, hint_doc, Archive};

fn main() {
    let matches = cli::get_app().get_matches();

    let mut builder = env_logger::Builder::from_default_env();
    if matches.is_present("verbose") {
        builder.filter_level(log::LevelFilter::Debug);
    } else {
        builder.filter_level(log::LevelFilter::Info);
    }
    builder.init();

    let result = match matches.subcommand() {
        ("backup", Some(sub)) => run_backup(sub),
        ("restore", Some(sub)) => run_restore(sub),
        ("scrub", Some(sub)) => run_scrub(sub),
        _ => {
            eprintln!("{}", matches.usage());
            process::exit(1);
        }
    };

    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn open_archive(matches: &clap::ArgMatches) -> chunkvault::Result<Archive> {
    let dir = Path::new(matches.value_of("dir").unwrap());
    let name = matches.value_of("name").unwrap();
    let chunk_size: u64 = matches
        .value_of("chunk-size")
        .unwrap()
        .parse()
        .map_err(|_| chunkvault::Error::Config("chunk-size must be an integer".to_string()))?;
    Archive::new(dir, name, chunk_size)
}

fn run_backup(matches: &clap::ArgMatches) -> chunkvault::Result<()> {
    let archive = open_archive(matches)?;
    let source_path = matches.value_of("source").unwrap();
    let mut source = File::open(source_path)?;

    let hints = match matches.value_of("hints") {
        Some(path) => {
            let document = std::fs::read_to_string(path)?;
            Some(hint_doc::parse_json_hints(&document)?)
        }
        None => None,
    };

    archive.backup(&mut source, hints.as_deref())
}

fn run_restore(matches: &clap::ArgMatches) -> chunkvault::Result<()> {
    let archive = open_archive(matches)?;
    let target_path = matches.value_of("target").unwrap();
    let mut target = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(target_path)?;

    let level = match matches.value_of("level") {
        Some(v) => Some(
            v.parse::<i64>()
                .map_err(|_| chunkvault::Error::Config("level must be an integer".to_string()))?,
        ),
        None => None,
    };

    archive.restore(&mut target, level)
}

fn run_scrub(matches: &clap::ArgMatches) -> chunkvault::Result<()> {
    let archive = open_archive(matches)?;

    let level = match matches.value_of("level") {
        Some(v) => Some(
            v.parse::<i64>()
                .map_err(|_| chunkvault::Error::Config("level must be an integer".to_string()))?,
        ),
        None => None,
    };

    match matches.value_of("source") {
        Some(source_path) => {
            let percentile: u8 = matches
                .value_of("percentile")
                .unwrap()
                .parse()
                .map_err(|_| chunkvault::Error::Config("percentile must be 0-100".to_string()))?;
            let mut source = File::open(source_path)?;
            archive.deep_scrub(&mut source, level, percentile).map(|_| ())
        }
        None => archive.scrub(level).map(|_| ()),
    }
}
