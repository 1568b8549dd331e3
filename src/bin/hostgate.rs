// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Command-line entry point.
//!
//!  `hostgate --config rp.json --listen :80`

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use hostgate::{Gate, info_fmt};

#[derive(Parser, Debug)]
#[command(name = "hostgate", version)]
#[command(about = "Host-based HTTP front door", long_about = None)]
struct Cli {
    /// Hosts configuration file [default: rp.json]
    #[arg(short, long, env = "HOSTGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, `ip:port` or `:port` [default: 0.0.0.0:80]
    #[arg(short, long, env = "HOSTGATE_LISTEN")]
    listen: Option<String>,

    /// Optional settings file (JSON, TOML or YAML)
    #[arg(short, long, env = "HOSTGATE_SETTINGS")]
    settings: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut loader = Gate::loader();
    if let Some(path) = &cli.settings {
        loader = loader.with_settings_file(path);
    }
    loader = loader.with_env_vars();
    if let Some(path) = cli.config {
        loader = loader.with_hosts_file(path);
    }
    if let Some(listen) = &cli.listen {
        loader = loader.with_listen(listen);
    }

    let gate = match loader.build() {
        Ok(gate) => gate,
        Err(e) => {
            eprintln!("hostgate: {e}");
            return ExitCode::FAILURE;
        }
    };

    match gate.start().await {
        Ok(()) => {
            info_fmt!("Startup", "hostgate stopped");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("hostgate: {e}");
            ExitCode::FAILURE
        }
    }
}
