#![deny(clippy::unwrap_used)]

use afgctrl::device::{FunctionGenerator, WaveformSpec};
use afgctrl::limits::{limit_table_doc, shape_table_doc, LIMITS};
use afgctrl::proto::command::State;
use afgctrl::proto::{ProtoError, Result};
use afgctrl::session::ConnectionConfig;
use afgctrl::{
    bridge::PrologixBridge, DEFAULT_ADDRESS, DEFAULT_GPIB_ADDRESS, DEFAULT_PORT, DEFAULT_TIMEOUT,
};
use clap::{arg, command, value_parser};
use log::LevelFilter;
use serde::Serialize;
use std::fmt;
use std::process::exit;
use std::time::Duration;

#[derive(Debug, Copy, Clone)]
pub enum OutputFormat {
    Text,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

impl clap::ValueEnum for OutputFormat {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Text, Self::Json]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Text => clap::builder::PossibleValue::new("text"),
            Self::Json => clap::builder::PossibleValue::new("json"),
        })
    }
}

#[tokio::main]
async fn main() {
    let matches = command!() // requires `cargo` feature
        .arg(
            arg!(
                -a --address <ADDRESS> "Address of the GPIB bridge"
            )
            .default_value(DEFAULT_ADDRESS)
            .required(false),
        )
        .arg(
            arg!(
                -p --port <PORT> "TCP port of the GPIB bridge"
            )
            .default_value(DEFAULT_PORT.to_string())
            .value_parser(value_parser!(u16)),
        )
        .arg(
            arg!(
                -g --gpib <GPIB> "GPIB address of the function generator"
            )
            .default_value(DEFAULT_GPIB_ADDRESS.to_string())
            .value_parser(value_parser!(u8).range(0..=30)),
        )
        .arg(
            arg!(
                -t --timeout <MS> "Connect and reply timeout in milliseconds"
            )
            .default_value(DEFAULT_TIMEOUT.as_millis().to_string())
            .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(arg!(
            -d --debug ... "Turn debugging information on"
        ))
        .arg(
            arg!(--"format" <fmt> "Output format")
                .default_value("text")
                .value_parser(value_parser!(OutputFormat)),
        )
        .subcommand(clap::Command::new("ident").about("Device identification"))
        .subcommand(clap::Command::new("reset").about("Factory reset"))
        .subcommand(clap::Command::new("status").about("Operation condition register"))
        .subcommand(clap::Command::new("error").about("Pop the instrument error queue"))
        .subcommand(clap::Command::new("beep").about("Beep"))
        .subcommand(
            clap::Command::new("startup")
                .about("Disable output, probe, configure 3 Vpp 1 kHz square and enable output"),
        )
        .subcommand(
            clap::Command::new("output")
                .about("Output state")
                .arg(arg!(<state> "Set output").value_parser(value_parser!(State))),
        )
        .subcommand(
            clap::Command::new("frequency")
                .about("Frequency in Hz")
                .arg(arg!(<hz> "Set frequency").value_parser(value_parser!(f64))),
        )
        .subcommand(
            clap::Command::new("shape")
                .about("Waveform shape")
                .long_about(shape_table_doc())
                .arg(arg!(<name> "Set shape")),
        )
        .subcommand(
            clap::Command::new("burst")
                .about("Burst mode with a fixed cycle count")
                .arg(
                    arg!(<cycles> "Cycles per trigger")
                        .value_parser(value_parser!(u32).range(1..=1_000_000)),
                ),
        )
        .subcommand(clap::Command::new("burst-end").about("Back to continuous output"))
        .subcommand(
            clap::Command::new("amplitude")
                .about("Amplitude")
                .arg(
                    arg!(<value> "Set amplitude")
                        .value_parser(value_parser!(f64))
                        .allow_negative_numbers(true),
                )
                .arg(arg!([unit] "Voltage unit: VPP, VRMS or DBM").default_value("VPP")),
        )
        .subcommand(
            clap::Command::new("offset").about("DC offset in Volt").arg(
                arg!(<volts> "Set offset")
                    .value_parser(value_parser!(f64))
                    .allow_negative_numbers(true),
            ),
        )
        .subcommand(
            clap::Command::new("impedance")
                .about("Output load impedance in Ohm")
                .arg(arg!(<ohms> "Set impedance").value_parser(value_parser!(f64))),
        )
        .subcommand(
            clap::Command::new("duty")
                .about("Duty cycle in %")
                .arg(arg!(<percent> "Set duty cycle").value_parser(value_parser!(f64))),
        )
        .subcommand(
            clap::Command::new("waveform")
                .about("Configure a complete waveform")
                .long_about(shape_table_doc())
                .arg(arg!(--shape <NAME> "Shape").required(true))
                .arg(
                    arg!(--frequency <HZ> "Frequency in Hz")
                        .required(true)
                        .value_parser(value_parser!(f64)),
                )
                .arg(arg!(--unit <UNIT> "Voltage unit").default_value("VPP"))
                .arg(
                    arg!(--amplitude <VALUE> "Amplitude in the given unit")
                        .required(true)
                        .value_parser(value_parser!(f64))
                        .allow_negative_numbers(true),
                )
                .arg(
                    arg!(--offset <VOLTS> "DC offset")
                        .default_value("0")
                        .value_parser(value_parser!(f64))
                        .allow_negative_numbers(true),
                )
                .arg(arg!(--impedance <OHMS> "Output load impedance").value_parser(value_parser!(f64)))
                .arg(arg!(--duty <PERCENT> "Duty cycle").value_parser(value_parser!(f64))),
        )
        .subcommand(clap::Command::new("limits").about("Show hardware limits"))
        .subcommand_required(true)
        .get_matches();

    let level = match matches.get_count("debug") {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    match handle_args(&matches).await {
        Ok(()) => {}
        Err(e) => {
            match e {
                ProtoError::Connection { address, source } => {
                    eprintln!(
                        "Unable to reach GPIB bridge at {}: {}. Check connection.",
                        address, source
                    );
                    exit(-1);
                }
                ProtoError::Address {
                    gpib_address,
                    source,
                } => {
                    eprintln!(
                        "No instrument at GPIB address {}: {}. Check IP/address.",
                        gpib_address, source
                    );
                    exit(-1);
                }
                ProtoError::Validation(err) => {
                    eprintln!("{}", err);
                    exit(-2);
                }
                ProtoError::Warning(err) => {
                    eprintln!("Instrument reported: {}", err);
                    exit(-1);
                }
                ProtoError::NotConnected(state) => {
                    eprintln!("Session is {}, aborting!", state);
                    exit(-1);
                }
                ProtoError::Io(err) => {
                    eprintln!("I/O Error: {}", err);
                    exit(-1);
                }
                ProtoError::Unexpected(err) => {
                    eprintln!(
                        "Received an unexpected response from device, aborting!: {}",
                        err
                    );
                    exit(-1);
                }
                ProtoError::Abort => {
                    eprintln!("Failed to communicate with device, aborting!");
                    exit(-1);
                }
            }
        }
    }
}

fn print<T: Serialize + fmt::Display>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Text => println!("{}", value),
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(json) => println!("{}", json),
            Err(err) => eprintln!("Unable to serialize output: {}", err),
        },
    }
}

fn connection_config(matches: &clap::ArgMatches) -> ConnectionConfig {
    let mut config = ConnectionConfig::default();
    if let Some(address) = matches.get_one::<String>("address") {
        config.address = address.clone();
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(gpib) = matches.get_one::<u8>("gpib") {
        config.gpib_address = *gpib;
    }
    if let Some(ms) = matches.get_one::<u64>("timeout") {
        config.timeout = Duration::from_millis(*ms);
    }
    config
}

async fn handle_args(matches: &clap::ArgMatches) -> Result<()> {
    let format = *matches
        .get_one::<OutputFormat>("format")
        .unwrap_or(&OutputFormat::Text);

    // Needs no instrument
    if let Some(("limits", _)) = matches.subcommand() {
        match format {
            OutputFormat::Text => {
                print!("{}", limit_table_doc(&LIMITS));
                print!("{}", shape_table_doc());
            }
            OutputFormat::Json => match serde_json::to_string_pretty(&*LIMITS) {
                Ok(json) => println!("{}", json),
                Err(err) => eprintln!("Unable to serialize output: {}", err),
            },
        }
        return Ok(());
    }

    let config = connection_config(matches);
    let mut device = FunctionGenerator::connect(&config).await?;
    eprintln!(
        "Connected to: {}:{} GPIB {}\n",
        config.address, config.port, config.gpib_address
    );

    let result = handle_command(&mut device, matches, format).await;
    let closed = device.close().await;
    result.and(closed)
}

async fn handle_command(
    device: &mut FunctionGenerator<PrologixBridge>,
    matches: &clap::ArgMatches,
    format: OutputFormat,
) -> Result<()> {
    match matches.subcommand() {
        // Device ID
        Some(("ident", _args)) => {
            let ident = device.ident().await?;
            match format {
                OutputFormat::Text => {
                    println!("Manufacturer: {}", ident.manufacturer);
                    println!("Model: {}", ident.model);
                    println!("Serial: {}", ident.serial);
                    println!("Firmware: {}", ident.firmware);
                }
                OutputFormat::Json => print(&ident, format),
            }
        }
        Some(("reset", _)) => {
            device.reset().await?;
            println!("OK");
        }
        Some(("status", _)) => {
            let status = device.status().await?;
            match format {
                OutputFormat::Text => println!("Operation condition: {:#06x}", status.bits()),
                OutputFormat::Json => print(&status.bits(), format),
            }
        }
        Some(("error", _)) => match device.next_error().await? {
            Some(err) => print(&err, format),
            None => println!("No error"),
        },
        Some(("beep", _)) => {
            device.beep().await?;
            println!("OK");
        }
        Some(("startup", _)) => {
            let state = device.startup().await?;
            println!("Startup: {}", state);
        }
        Some(("output", args)) => {
            match args.get_one::<State>("state") {
                Some(State::On) => device.enable().await?,
                _ => device.disable().await?,
            }
            println!("OK");
        }
        Some(("frequency", args)) => {
            if let Some(hz) = args.get_one::<f64>("hz") {
                device.set_frequency(*hz).await?;
                println!("OK");
            }
        }
        Some(("shape", args)) => {
            if let Some(name) = args.get_one::<String>("name") {
                let shape = device.set_shape(name).await?;
                println!("Shape: {} ({})", shape, shape.code());
            }
        }
        Some(("burst", args)) => {
            if let Some(cycles) = args.get_one::<u32>("cycles") {
                device.set_burst(*cycles).await?;
                println!("OK");
            }
        }
        Some(("burst-end", _)) => {
            device.end_burst().await?;
            println!("OK");
        }
        Some(("amplitude", args)) => {
            let unit = args
                .get_one::<String>("unit")
                .map(String::as_str)
                .unwrap_or("VPP");
            if let Some(value) = args.get_one::<f64>("value") {
                device.set_amplitude(*value, unit).await?;
                println!("OK");
            }
        }
        Some(("offset", args)) => {
            if let Some(volts) = args.get_one::<f64>("volts") {
                device.set_offset(*volts).await?;
                println!("OK");
            }
        }
        Some(("impedance", args)) => {
            if let Some(ohms) = args.get_one::<f64>("ohms") {
                device.set_impedance(*ohms).await?;
                println!("OK");
            }
        }
        Some(("duty", args)) => {
            if let Some(percent) = args.get_one::<f64>("percent") {
                device.set_duty_cycle(*percent).await?;
                println!("OK");
            }
        }
        Some(("waveform", args)) => {
            let mut spec = WaveformSpec::new(
                args.get_one::<String>("shape").cloned().unwrap_or_default(),
                *args.get_one::<f64>("frequency").unwrap_or(&0.0),
                args.get_one::<String>("unit")
                    .cloned()
                    .unwrap_or_else(|| "VPP".to_string()),
                *args.get_one::<f64>("amplitude").unwrap_or(&0.0),
                *args.get_one::<f64>("offset").unwrap_or(&0.0),
            );
            if let Some(ohms) = args.get_one::<f64>("impedance") {
                spec = spec.with_impedance(*ohms);
            }
            if let Some(percent) = args.get_one::<f64>("duty") {
                spec = spec.with_duty_cycle(*percent);
            }
            device.configure_waveform(&spec).await?;
            println!("OK");
        }
        _ => {
            unreachable!("Exhausted list of subcommands and subcommand_required prevents `None`")
        }
    }
    Ok(())
}
