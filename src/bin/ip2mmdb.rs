mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::cmd_csv2mmdb;

#[derive(Parser)]
#[command(name = "ip2mmdb")]
#[command(
    about = "Convert decimal-range IP geolocation CSV datasets into MaxMind DB files",
    long_about = "ip2mmdb - Convert decimal-range IP geolocation CSV datasets into MaxMind DB files\n\n\
    Reads headerless CSV rows whose first two columns are the range start and end\n\
    written as base-10 integers, and writes an MMDB v2.0 database readable by any\n\
    MaxMind reader. IPv4 and IPv6 rows may be mixed in one file.\n\n\
    Dataset types:\n\
      • country: start, end, country_code, country_name\n\
      • city:    start, end, country_code, country_name, region, city,\n\
                 latitude, longitude, zip_code\n\n\
    Examples:\n\
      ip2mmdb csv2mmdb -i IP2LOCATION-LITE-DB1.IPV6.CSV -o country.mmdb\n\
      ip2mmdb csv2mmdb -i IP2LOCATION-LITE-DB11.IPV6.CSV.gz -o city.mmdb -t city"
)]
#[command(version)]
struct Cli {
    /// Show per-range debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only show warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a CSV dataset into an MMDB file
    Csv2mmdb {
        /// CSV file to read, "-" for stdin; .gz files are decompressed
        #[arg(short, long, value_name = "INPUT")]
        input: String,

        /// MMDB file to write
        #[arg(short, long, value_name = "OUTPUT")]
        output: String,

        /// Dataset type: country or city
        #[arg(short = 't', long = "type", default_value = "country")]
        kind: String,

        /// Database type written to the metadata (defaults per dataset type)
        #[arg(long)]
        database_type: Option<String>,

        /// Description written to the metadata
        #[arg(long)]
        description: Option<String>,

        /// Language code for the description
        #[arg(long, default_value = "en")]
        desc_lang: String,

        /// Search tree record size in bits: 24, 28 or 32
        #[arg(long, default_value = "28")]
        record_size: u16,

        /// Do not alias ::ffff:0:0/96 and 2002::/16 to the IPv4 tree
        #[arg(long)]
        no_ipv4_aliasing: bool,
    },
}

fn init_tracing(verbose: bool, quiet: bool) {
    let default_level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Csv2mmdb {
            input,
            output,
            kind,
            database_type,
            description,
            desc_lang,
            record_size,
            no_ipv4_aliasing,
        } => cmd_csv2mmdb(
            input,
            output,
            kind,
            database_type,
            description,
            desc_lang,
            record_size,
            no_ipv4_aliasing,
        ),
    }
}
