use clap::{App, Arg, SubCommand};

/// Thin command-line front end over the core: one subcommand per protocol
/// in the archive (backup/restore/scrub). Parsing and argument definitions
/// live here; none of the invariants are implemented here - every
/// subcommand is a direct call into `Archive`.
pub fn get_app() -> App<'static, 'static> {
    let dir_arg = Arg::with_name("dir")
        .short("d")
        .long("dir")
        .value_name("DIR")
        .help("Archive directory")
        .takes_value(true)
        .default_value(".");
    let chunk_size_arg = Arg::with_name("chunk-size")
        .short("c")
        .long("chunk-size")
        .value_name("BYTES")
        .help("Chunk size in bytes")
        .takes_value(true)
        .default_value("4194304");
    let name_arg = Arg::with_name("name").help("Backup name").required(true);

    App::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .author(env!("CARGO_PKG_AUTHORS"))
        .about("Incremental block image backup, restore, and scrub")
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Verbose logging")
                .takes_value(false),
        )
        .subcommand(
            SubCommand::with_name("backup")
                .about("Perform a full or incremental backup")
                .arg(dir_arg.clone())
                .arg(chunk_size_arg.clone())
                .arg(name_arg.clone())
                .arg(Arg::with_name("source").help("Source image file").required(true))
                .arg(
                    Arg::with_name("hints")
                        .short("H")
                        .long("hints")
                        .value_name("FILE")
                        .help("JSON hint document restricting the backup to dirty regions")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("restore")
                .about("Restore a generation to a target file")
                .arg(dir_arg.clone())
                .arg(chunk_size_arg.clone())
                .arg(name_arg.clone())
                .arg(Arg::with_name("target").help("Target image file").required(true))
                .arg(
                    Arg::with_name("level")
                        .short("l")
                        .long("level")
                        .value_name("N")
                        .help("Generation to restore (default: latest)")
                        .takes_value(true),
                ),
        )
        .subcommand(
            SubCommand::with_name("scrub")
                .about("Verify chunk checksums, optionally against a source image")
                .arg(dir_arg)
                .arg(chunk_size_arg)
                .arg(name_arg)
                .arg(
                    Arg::with_name("level")
                        .short("l")
                        .long("level")
                        .value_name("N")
                        .help("Level to scrub (default: Base)")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("source")
                        .short("s")
                        .long("source")
                        .value_name("FILE")
                        .help("Source image to deep-scrub against")
                        .takes_value(true),
                )
                .arg(
                    Arg::with_name("percentile")
                        .short("p")
                        .long("percentile")
                        .value_name("PERCENT")
                        .help("Percentage of chunks to sample during a deep scrub")
                        .takes_value(true)
                        .default_value("100"),
                ),
        )
}
