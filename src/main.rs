use std::{fmt::Display, process};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use ftail::Ftail;
use log::{debug, error, info, LevelFilter};
use waltrac::{Command, DeviceId, Header, Payload, Position, Report, Secret};

/// Build and inspect authenticated tracker messages.
#[derive(Parser)]
#[command(name = "waltrac", version)]
struct Cli {
    /// Shared secret used for signing and verification.
    #[arg(long, env = "WALTRAC_SECRET", hide_env_values = true, global = true)]
    secret: Option<String>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Encode a position report and print it as hex.
    Position {
        #[arg(long)]
        device: DeviceId,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Seconds since the epoch, defaults to now.
        #[arg(long)]
        timestamp: Option<u32>,
        #[arg(long, default_value_t = 0)]
        interval: u8,
        #[arg(long, default_value = "")]
        name: String,
        /// Flag the fix as invalid.
        #[arg(long)]
        invalid: bool,
        /// Append sixteen zero bytes instead of a tag.
        #[arg(long)]
        unsigned: bool,
    },
    /// Encode a command and print it as hex.
    Command {
        #[command(subcommand)]
        action: ActionArg,
        /// Append sixteen zero bytes instead of a tag.
        #[arg(long, global = true)]
        unsigned: bool,
    },
    /// Decode a hex message and check its tag.
    Inspect {
        kind: Kind,
        message: String,
        /// Print positions as the gateway record instead.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ActionArg {
    Discover { device: DeviceId },
    SetInterval { seconds: u32 },
    SetName { name: String },
    Exit,
}

#[derive(Clone, Copy, ValueEnum)]
enum Kind {
    Position,
    Command,
}

fn fail(message: impl Display) -> ! {
    error!("{message}");
    process::exit(1);
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    if let Err(err) = Ftail::new().console(level).init() {
        eprintln!("unable to set up logging: {err}");
    }

    let secret = cli.secret.as_deref().map(|s| match s.parse::<Secret>() {
        Ok(secret) => secret,
        Err(err) => fail(err),
    });

    match cli.command {
        Cmd::Position {
            device,
            lat,
            lon,
            timestamp,
            interval,
            name,
            invalid,
            unsigned,
        } => {
            let timestamp = match timestamp {
                Some(timestamp) => timestamp,
                None => u32::try_from(Utc::now().timestamp())
                    .unwrap_or_else(|_| fail("current time does not fit a 32 bit timestamp")),
            };

            let mut position = Position::new(device);
            position.header = Header::position(!invalid);
            position.interval = interval;
            position.latitude = lat;
            position.longitude = lon;
            position.timestamp = timestamp;
            position.name = name.into_bytes();

            emit(&position, signing_key(secret.as_ref(), unsigned));
        }
        Cmd::Command { action, unsigned } => {
            let command = match action {
                ActionArg::Discover { device } => Ok(Command::discover(device)),
                ActionArg::SetInterval { seconds } => Command::set_interval(seconds),
                ActionArg::SetName { name } => Command::set_name(&name),
                ActionArg::Exit => Ok(Command::exit()),
            };
            let command = command.unwrap_or_else(|err| fail(err));

            emit(&command, signing_key(secret.as_ref(), unsigned));
        }
        Cmd::Inspect { kind, message, json } => {
            let bytes = hex::decode(message.trim()).unwrap_or_else(|err| fail(format!("not hex: {err}")));
            debug!("received {} bytes: {}", bytes.len(), hex::encode(&bytes));

            let verified = match kind {
                Kind::Position => {
                    let position = Position::decode(&bytes).unwrap_or_else(|err| fail(err));
                    if json {
                        let report = Report::from(&position);
                        match report.to_json() {
                            Ok(record) => println!("{} {record}", report.topic()),
                            Err(err) => fail(err),
                        }
                    } else {
                        println!("{position}");
                    }
                    secret.as_ref().map(|secret| position.verify(secret))
                }
                Kind::Command => {
                    let command = Command::decode(&bytes).unwrap_or_else(|err| fail(err));
                    println!("{command}");
                    secret.as_ref().map(|secret| command.verify(secret))
                }
            };

            match verified {
                Some(true) => info!("tag verified"),
                Some(false) => {
                    error!("tag does not match, message is not authentic");
                    process::exit(2);
                }
                None => info!("no secret given, tag not checked"),
            }
        }
    }
}

fn signing_key(secret: Option<&Secret>, unsigned: bool) -> Option<&Secret> {
    if unsigned {
        return None;
    }

    match secret {
        Some(secret) => Some(secret),
        None => fail("a secret is required to sign, pass --secret or --unsigned"),
    }
}

fn emit<P: Payload + Display>(payload: &P, secret: Option<&Secret>) {
    let bytes = payload.serialize(secret).unwrap_or_else(|err| fail(err));

    debug!("{payload}");
    println!("{}", hex::encode(bytes));
}
