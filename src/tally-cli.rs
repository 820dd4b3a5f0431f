//! A simple CLI tool for tallying Botos elections offline.
//! It reads the vote dump served by the backend and decrypts only the
//! per-candidate totals, using the same tally code as the server.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;

use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use botos_backend::{
    crypto::{CryptoError, PaillierPrivateKey},
    model::api::vote::EncryptedVote,
    tally::tally_votes,
};

const PROGRAM_NAME: &str = "tally-botos";

const ABOUT_TEXT: &str = "Tally the encrypted votes of a Botos election.

EXIT CODES:
     0: Tally succeeded.
   255: Ran successfully, but the votes could not be tallied with this key.
 Other: Error.";

const VOTES_PATH: &str = "VOTES_PATH";

const VOTES_PATH_HELP: &str = "The path to a JSON dump of the cast votes,\n\
as returned by `GET /admin/election/votes`";

const KEY_PATH: &str = "KEY_PATH";

const KEY_PATH_HELP: &str = "The path to a file holding the private election key";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(VOTES_PATH)
                .help(VOTES_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
        .arg(
            Arg::new(KEY_PATH)
                .help(KEY_PATH_HELP)
                .action(ArgAction::Set)
                .required(true),
        )
}

/// Errors that this program may produce.
#[derive(Debug, PartialEq)]
enum Error {
    /// IO error described by the inner message.
    IO(String),
    /// Failed to decode the JSON dump.
    Format(String),
    /// The key file does not hold a private election key.
    Key(CryptoError),
    /// The votes could not be tallied.
    Tally(CryptoError),
}

/// Load the dump and key, and tally the votes.
fn tally(votes_path: &str, key_path: &str) -> Result<BTreeMap<String, u64>, Error> {
    let file = BufReader::new(File::open(votes_path).map_err(|e| Error::IO(e.to_string()))?);
    let votes: Vec<EncryptedVote> =
        serde_json::from_reader(file).map_err(|e| Error::Format(e.to_string()))?;

    let key: PaillierPrivateKey = fs::read_to_string(key_path)
        .map_err(|e| Error::IO(e.to_string()))?
        .trim()
        .parse()
        .map_err(Error::Key)?;

    tally_votes(&key, &votes).map_err(Error::Tally)
}

/// Order results by total, then name.
fn ranked(totals: BTreeMap<String, u64>) -> Vec<(String, u64)> {
    let mut ranked = totals.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Run the tally, report the result, and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Required arguments are guaranteed to be present.
    let votes_path: &String = args.get_one(VOTES_PATH).unwrap();
    let key_path: &String = args.get_one(KEY_PATH).unwrap();
    match tally(votes_path, key_path) {
        Ok(totals) => {
            println!("Tally succeeded.");
            for (candidate, total) in ranked(totals) {
                println!(
                    "{candidate}: {total} vote{}",
                    if total != 1 { "s" } else { "" }
                );
            }
            0
        }
        Err(Error::IO(msg)) => {
            println!("IO error: {msg}");
            1
        }
        Err(Error::Format(msg)) => {
            println!("Invalid JSON: {msg}");
            1
        }
        Err(Error::Key(err)) => {
            println!("Invalid private key: {err}");
            1
        }
        Err(Error::Tally(err)) => {
            println!("Tally failed: {err}");
            255
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
