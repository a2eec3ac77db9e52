//! IR-Bridge relay: entry point.
//!
//! Connects to an IR transceiver and re-emits every recognised remote
//! control command translated for another device.
//!
//! # Usage
//!
//! ```text
//! irbridge-relay [--config FILE] <COMMAND>
//!
//! Commands:
//!   run      Run the relay with the rules from the configuration
//!   derive   Derive a rule profile from two key sets
//!   convert  Relay a single rule given on the command line (debug output on)
//!   send     Transmit one signal and exit
//!   sniff    Print what the transceiver receives
//!   learn    Record a new key set by pressing every key of a template
//!   identify Find the stored key sets a pressed key belongs to
//! ```
//!
//! The configuration file defaults to the platform config directory (see
//! [`default_config_path`]).  A missing file means "all defaults".
//!
//! # Environment variable overrides
//!
//! | Variable          | Description                                  |
//! |-------------------|----------------------------------------------|
//! | `IRBRIDGE_CONFIG` | Configuration file, same as `--config`       |
//! | `RUST_LOG`        | Log filter; overrides `relay.log_level`      |
//!
//! # Shutdown
//!
//! A serial device node is read through a blocking thread that cannot be
//! interrupted.  The runtime is therefore built by hand and shut down with a
//! timeout instead of waiting for that thread forever.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use irbridge_core::domain::protocol::{protocol_by_name, protocol_name};
use irbridge_core::{KeyEvent, ProtocolId, Signal, SignalRule, SignalRuleTable};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use irbridge_relay::application::build_rules::{merge_rule_layers, MergedRules, RuleLayer};
use irbridge_relay::application::convert_signals::{SignalConverter, Transceiver, TransceiverError};
use irbridge_relay::application::events::{ConverterEvent, EventSink, TracingEventSink};
use irbridge_relay::application::key_sets::{learn_keyset, identify_key};
use irbridge_relay::infrastructure::storage::config::{
    default_config_path, load_config, AppConfig, DeviceConfig, MappingConfig,
};
use irbridge_relay::infrastructure::storage::keyset_file::{
    list_keysets, load_keyset, save_keyset,
};
use irbridge_relay::infrastructure::storage::rule_file::{
    load_rule_file, rule_file_to_string, save_rule_file,
};
use irbridge_relay::infrastructure::transceiver::{connect, DeviceLink};

/// How long runtime shutdown waits for blocking device reads.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

// ── CLI argument definitions ──────────────────────────────────────────────────

/// IR-Bridge relay.
///
/// Receives IR commands from a transceiver and re-emits them translated for
/// another device.
#[derive(Debug, Parser)]
#[command(
    name = "irbridge-relay",
    about = "Translate IR remote control commands between devices",
    version
)]
struct Cli {
    /// Configuration file.  Defaults to `relay.toml` in the platform config
    /// directory.
    #[arg(long, global = true, env = "IRBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the relay with the rules from the configuration until Ctrl+C.
    Run {
        /// Report every received, resolved and sent signal.
        #[arg(long)]
        debug: bool,
    },

    /// Derive a rule profile mapping every key of SOURCE to the same-named
    /// key of TARGET.
    Derive {
        /// Key set of the remote whose signals are received.
        #[arg(long)]
        source: PathBuf,
        /// Key set of the device the translated signals are meant for.
        #[arg(long)]
        target: PathBuf,
        /// Forwarding delay for every derived rule, in milliseconds.
        #[arg(long, default_value_t = 0)]
        delay: u64,
        /// Write the profile here instead of printing it.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Profile name stored in the file.
        #[arg(long)]
        name: Option<String>,
    },

    /// Relay a single rule given on the command line, with debug output on.
    Convert {
        #[command(flatten)]
        input: SignalArgs,
        #[arg(value_parser = parse_protocol)]
        out_protocol: ProtocolId,
        out_value: String,
        out_bits: u16,
    },

    /// Transmit one signal and exit.
    Send {
        #[command(flatten)]
        signal: SignalArgs,
    },

    /// Print every signal the transceiver decodes until Ctrl+C.
    Sniff {
        /// Switch the device to passive listening and print raw output.
        #[arg(long)]
        passive: bool,
    },

    /// Record a new key set: press every key of TEMPLATE on the remote.
    Learn {
        /// Key set whose key names are learned; its values are ignored.
        #[arg(long)]
        template: PathBuf,
        /// Where the new key set is written.
        #[arg(long)]
        output: PathBuf,
        /// Device name stored in the key set.  Defaults to the output file name.
        #[arg(long)]
        name: Option<String>,
    },

    /// Press KEY on a remote and list the stored key sets it matches.
    Identify {
        /// Directory holding `*.toml` key sets.
        #[arg(long)]
        keysets: PathBuf,
        /// Which value of the key to compare: press, down or release.
        #[arg(long, default_value = "press", value_parser = parse_key_event)]
        event: KeyEvent,
        /// Key name, as written in the key sets.
        key: String,
    },
}

/// A signal as three positional arguments.
#[derive(Debug, Args)]
struct SignalArgs {
    /// Protocol number or name (`nec`, `sony`, `rc6`, ...).
    #[arg(value_parser = parse_protocol)]
    protocol: ProtocolId,
    /// Command value in hex.
    value: String,
    /// Bit width.
    bits: u16,
}

impl SignalArgs {
    fn signal(&self) -> Signal {
        Signal::new(self.protocol, self.value.clone(), self.bits)
    }
}

/// Accepts a firmware protocol number or a protocol name.
fn parse_protocol(arg: &str) -> Result<ProtocolId, String> {
    arg.parse::<ProtocolId>()
        .ok()
        .or_else(|| protocol_by_name(arg))
        .ok_or_else(|| format!("unknown protocol '{arg}'"))
}

fn parse_key_event(arg: &str) -> Result<KeyEvent, String> {
    KeyEvent::from_name(arg).ok_or_else(|| format!("unknown key event '{arg}'"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config.clone() {
        Some(path) => Some(path),
        None => default_config_path().ok(),
    };
    let config = match &config_path {
        Some(path) => load_config(path)
            .with_context(|| format!("failed to load configuration {}", path.display()))?,
        None => AppConfig::default(),
    };

    // ── Logging setup ─────────────────────────────────────────────────────────
    //
    // `RUST_LOG` wins when set; otherwise the configured level applies.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.relay.log_level)),
        )
        .init();

    if let Some(path) = &config_path {
        info!("using configuration {}", path.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start the async runtime")?;
    let result = runtime.block_on(dispatch(cli.command, config));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    result
}

async fn dispatch(command: Command, config: AppConfig) -> anyhow::Result<()> {
    match command {
        Command::Run { debug } => {
            let merged = assemble_rules(&config.mapping, &config.rules)?;
            let debug = debug || config.relay.debug_mode;
            run_relay(&config, merged.table, debug).await
        }
        Command::Derive {
            source,
            target,
            delay,
            output,
            name,
        } => derive_profile(&source, &target, delay, output.as_deref(), name.as_deref()),
        Command::Convert {
            input,
            out_protocol,
            out_value,
            out_bits,
        } => {
            let mut table = SignalRuleTable::new();
            table.add(SignalRule::new(
                input.signal(),
                Signal::new(out_protocol, out_value, out_bits),
            ))?;
            run_relay(&config, table, true).await
        }
        Command::Send { signal } => {
            let link = open_device(&config.device).await?;
            let signal = signal.signal();
            link.transmit(&signal)
                .await
                .with_context(|| format!("failed to transmit {signal}"))?;
            info!("sent {signal}");
            Ok(())
        }
        Command::Sniff { passive } => {
            let link = open_device(&config.device).await?;
            sniff(&link, passive).await
        }
        Command::Learn {
            template,
            output,
            name,
        } => {
            let link = open_device(&config.device).await?;
            learn(&link, &template, &output, name).await
        }
        Command::Identify {
            keysets,
            event,
            key,
        } => {
            let link = open_device(&config.device).await?;
            identify(&link, &keysets, &key, event).await
        }
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Builds the relay's rule table: derived key-set rules first, then the rule
/// profile, then inline rules.
fn assemble_rules(mapping: &MappingConfig, inline: &[SignalRule]) -> anyhow::Result<MergedRules> {
    let mut layers = Vec::new();

    if let Some((source, target)) = mapping.keyset_pair() {
        let source_set = load_keyset(source)?;
        let target_set = load_keyset(target)?;
        layers.push(RuleLayer::derived(
            format!("{} -> {}", source_set.device_name, target_set.device_name),
            &source_set,
            &target_set,
            mapping.forward_delay_ms,
        ));
    } else if mapping.source_keyset.is_some() || mapping.target_keyset.is_some() {
        warn!("only one key set configured; both are needed to derive rules");
    }

    if let Some(path) = &mapping.rules_file {
        let table = load_rule_file(path)?;
        layers.push(RuleLayer::new(path.display().to_string(), table.into_rules()));
    }

    if !inline.is_empty() {
        layers.push(RuleLayer::new("inline rules", inline.to_vec()));
    }

    Ok(merge_rule_layers(layers))
}

fn derive_profile(
    source: &Path,
    target: &Path,
    delay_ms: u64,
    output: Option<&Path>,
    name: Option<&str>,
) -> anyhow::Result<()> {
    let source_set = load_keyset(source)?;
    let target_set = load_keyset(target)?;
    let table = SignalRuleTable::derive(&source_set, &target_set, delay_ms);
    info!(
        "derived {} rule(s) from {} to {}",
        table.len(),
        source_set.device_name,
        target_set.device_name
    );

    match output {
        Some(path) => {
            save_rule_file(path, &table, name)?;
            info!("rule profile written to {}", path.display());
        }
        None => print!("{}", rule_file_to_string(&table, name)?),
    }
    Ok(())
}

async fn open_device(device: &DeviceConfig) -> anyhow::Result<DeviceLink> {
    let endpoint = device.endpoint();
    let link = connect(&endpoint)
        .await
        .with_context(|| format!("failed to open transceiver at {endpoint}"))?
        .with_response_timeout(device.response_timeout());

    if device.receiver_led {
        if let Err(e) = link.set_receiver_led(true).await {
            warn!("could not switch on the receiver LED: {e}");
        }
    }
    Ok(link)
}

async fn run_relay(config: &AppConfig, table: SignalRuleTable, debug: bool) -> anyhow::Result<()> {
    let link = Arc::new(open_device(&config.device).await?);
    let converter = Arc::new(
        SignalConverter::new(table, link).with_settings(config.relay.converter_settings()),
    );
    converter.set_debug_mode(debug);

    let handle = converter.start()?;
    info!(
        "relay {} running with {} rule(s); press Ctrl+C to stop",
        converter.id(),
        converter.rule_count()
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl+C")?;
    info!("received Ctrl+C, stopping");

    handle.shutdown().await?;
    Ok(())
}

async fn sniff(link: &DeviceLink, passive: bool) -> anyhow::Result<()> {
    let sink = TracingEventSink;
    if passive {
        link.set_passive_listen(true)
            .await
            .context("failed to enter passive listening")?;
    } else {
        link.enable_receiver(true)
            .await
            .context("failed to enable the receiver")?;
    }
    info!("listening; press Ctrl+C to stop");

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        let event = tokio::select! {
            _ = &mut ctrl_c => break,
            event = next_event(link, passive) => event,
        };
        match event {
            Ok(event) => sink.emit(&event),
            Err(TransceiverError::Closed) => {
                warn!("transceiver link closed");
                break;
            }
            Err(e) => warn!("receive failed: {e}"),
        }
    }

    if passive {
        if let Err(e) = link.set_passive_listen(false).await {
            warn!("could not leave passive listening: {e}");
        }
    }
    Ok(())
}

async fn learn(
    link: &DeviceLink,
    template: &Path,
    output: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let template = load_keyset(template)?;
    let name = name.unwrap_or_else(|| device_name_from(output));
    info!(
        "learning {} key(s) of {} as {name}; press Ctrl+C to abort",
        template.keys.len(),
        template.device_name
    );

    let learned = tokio::select! {
        learned = learn_keyset(link, &template, &name, |key| {
            println!("=> press {key} on the remote");
        }) => learned?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("aborted; nothing was written"),
    };

    save_keyset(output, &learned)?;
    println!(
        "{} key(s) of {} ({}) written to {}",
        learned.keys.len(),
        learned.device_name,
        protocol_name(learned.protocol_id).unwrap_or("unknown protocol"),
        output.display()
    );
    Ok(())
}

fn device_name_from(output: &Path) -> String {
    output
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_uppercase())
        .unwrap_or_else(|| "REMOTE".to_string())
}

async fn identify(link: &DeviceLink, dir: &Path, key: &str, event: KeyEvent) -> anyhow::Result<()> {
    let candidates = list_keysets(dir)?;
    if candidates.is_empty() {
        anyhow::bail!("no key sets found in {}", dir.display());
    }
    println!("=> {event} {key} on the remote");

    let result = tokio::select! {
        result = identify_key(link, &candidates, key, event) => result?,
        _ = tokio::signal::ctrl_c() => return Ok(()),
    };

    if result.matches.is_empty() {
        println!("no key set sends {} for {key} ({event})", result.signal);
        return Ok(());
    }
    println!("{} key set(s) send {} for {key}:", result.matches.len(), result.signal);
    for (i, stored) in result.matches.iter().enumerate() {
        println!(
            "{}) {} ({})",
            i + 1,
            stored.set.device_name,
            stored.path.display()
        );
    }
    Ok(())
}

async fn next_event(link: &DeviceLink, passive: bool) -> Result<ConverterEvent, TransceiverError> {
    if passive {
        link.wait_for_frame().await.map(ConverterEvent::RawFrame)
    } else {
        link.receive().await.map(ConverterEvent::Received)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
