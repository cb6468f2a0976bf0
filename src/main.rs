// FlowChain: Provisioning and verifying linear OpenFlow chains
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

use std::{
    io::{BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use ovs_lab::{Config, Session};

use flowchain::{
    control::{ElementControl, OvsControl},
    emulator::Emulator,
    report::FlowReporter,
    shell::CommandRegistry,
    topology::Topology,
    ChainHandle,
};

/// Build a linear chain of Open vSwitch bridges between two hosts, install bidirectional
/// forwarding flows on every bridge, and verify them.
#[derive(Debug, Parser)]
struct Cli {
    /// Number of forwarding elements between the two hosts.
    #[clap(long = "hop", short = 'n', allow_negative_numbers = true)]
    hops: i64,
    /// Path to the TOML configuration file. Without it, the defaults are used.
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,
    /// Execute all commands on this SSH destination instead of the local machine.
    #[clap(long = "remote", short = 'r')]
    remote: Option<String>,
    /// Do not build the network, but use bridges that already exist.
    #[clap(long)]
    no_emulator: bool,
    /// Keep the network running after exiting.
    #[clap(long)]
    keep: bool,
    /// Exit after the initial verification instead of starting the interactive shell.
    #[clap(long)]
    no_shell: bool,
    /// Print the initial verification result as JSON.
    #[cfg(feature = "serde")]
    #[clap(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();

    // fail before touching the network
    let topology = Arc::new(Topology::build(args.hops)?);
    let config = Config::load(args.config.as_ref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(start(args, topology, config))
}

/// Connect to the machine, build the network, run the chain, and tear the network down again.
async fn start(
    args: Cli,
    topology: Arc<Topology>,
    config: Config,
) -> Result<(), Box<dyn std::error::Error>> {
    let session = match &args.remote {
        Some(dest) => Session::remote(dest, config.ovs.sudo, config.ovs.connect_timeout).await?,
        None => Session::local(config.ovs.sudo),
    };

    let emulator = if args.no_emulator {
        None
    } else {
        Some(Emulator::new(topology.clone(), session.clone(), &config))
    };
    if let Some(emulator) = &emulator {
        println!("Starting the network...");
        emulator.start().await?;
    }

    let control: Arc<dyn ElementControl> =
        Arc::new(OvsControl::new(&topology, &session, &config.ovs));
    let handle = ChainHandle::new(topology, control, args.hops);
    let result = run(handle, &args).await;

    if let Some(emulator) = emulator {
        if args.keep {
            log::info!("Keep the network running");
        } else {
            println!("Stopping the network...");
            emulator.stop().await?;
        }
    }

    result
}

/// Provision and verify the chain, and then run the interactive shell.
async fn run(handle: ChainHandle, args: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    println!("\nConfiguring flows...");
    let report = handle.provision().await?;
    print!("{report}");

    let reporter = FlowReporter::new(handle.clone());
    let (result, text) = reporter.report_verification().await?;
    print!("{text}");

    #[cfg(feature = "serde")]
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    }
    #[cfg(not(feature = "serde"))]
    let _ = result;

    if args.no_shell {
        return Ok(());
    }

    let registry = CommandRegistry::for_chain(handle);
    println!("\nAvailable commands:\n{}", registry.help());
    println!("Type `exit` to stop.");

    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("flowchain> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next() else {
            println!();
            break;
        };
        let line = line?;
        if matches!(line.trim(), "exit" | "quit") {
            break;
        }
        match registry.dispatch(&line).await {
            Ok(Some(output)) => println!("{output}"),
            Ok(None) => {}
            Err(e) => eprintln!("{e}"),
        }
    }

    Ok(())
}
