// main.rs - main program
//
// chatircd - simple IRC-like chat server
// Copyright (C) 2022  Mateusz Szpakowski
//
// This library is free software; you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public
// License as published by the Free Software Foundation; either
// version 2.1 of the License, or (at your option) any later version.
//
// This library is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this library; if not, write to the Free Software
// Foundation, Inc., 51 Franklin Street, Fifth Floor, Boston, MA  02110-1301  USA

mod command;
mod config;
mod reply;
mod state;
mod utils;

use clap::Parser;
use std::time::Duration;
use tracing::error;
#[cfg(unix)]
use daemonize::Daemonize;

use config::*;
use state::*;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // daemonize before the runtime starts its threads
    #[cfg(unix)]
    if cli.background {
        Daemonize::new()
            .pid_file("./chatircd.pid")
            .chown_pid_file(true)
            .working_directory("./")
            .start()?;
    }

    tokio_main(cli)
}

#[tokio::main(flavor = "multi_thread")]
async fn tokio_main(cli: Cli) -> anyhow::Result<()> {
    let config = MainConfig::new(cli)?;
    initialize_logging(&config);
    let (main_state, handle) = run_server(config).await?;
    // and await for end
    if let Err(e) = handle.await {
        error!("Error in listener: {}", e);
    }
    main_state.wait_for_connections(Duration::from_secs(2)).await;
    Ok(())
}
