//! Short filename utility: one-off 8.3 checksums and rainbow table
//! generation for use with the tildescan scanner.

use clap::{Parser, Subcommand};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use tildescan::checksum;
use tildescan::wordlist::{self, RAINBOW_MAGIC};

/// A short filename utility.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a one-off checksum for the given filename
    Checksum {
        /// Filename to checksum
        filename: String,

        /// Use the original (Windows Server 2003 + Windows XP) algorithm
        #[arg(short, long)]
        original: bool,
    },

    /// Add checksums to a wordlist for use with tildescan
    Wordlist {
        /// Wordlist to ingest
        filename: String,

        /// Keep the original case rather than upper-casing words
        #[arg(long)]
        keepcase: bool,

        /// Keep duplicate words
        #[arg(long)]
        no_uniq: bool,

        /// Don't generate checksums for case variants of input words
        /// (e.g. ping.aspx, Ping.Aspx, PING.ASPX)
        #[arg(long)]
        no_variants: bool,
    },
}

fn main() {
    let args = Args::parse();
    if let Err(e) = run(args) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> tildescan::Result<()> {
    match args.command {
        Command::Checksum { filename, original } => {
            let c = if original {
                checksum::checksum_original(&filename)?
            } else {
                checksum::checksum(&filename)
            };
            println!("{c}");
        }

        Command::Wordlist {
            filename,
            keepcase,
            no_uniq,
            no_variants,
        } => {
            let file = File::open(&filename)?;
            let records = wordlist::ingest(BufReader::new(file), !no_variants)?;

            println!("{RAINBOW_MAGIC}");
            let mut seen = HashSet::new();
            for record in records {
                let (f, e) = if keepcase {
                    (record.filename, record.extension)
                } else {
                    (
                        record.filename.to_uppercase(),
                        record.extension.to_uppercase(),
                    )
                };

                if !no_uniq && !seen.insert(format!("{f}.{e}")) {
                    continue;
                }

                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    record.checksums, record.filename83, record.extension83, f, e
                );
            }
        }
    }
    Ok(())
}
