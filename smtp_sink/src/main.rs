// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright © 2024 RemasteredArch
//
// This file is part of smtp_command_parser.
//
// smtp_command_parser is free software: you can redistribute it and/or modify it under the terms
// of the GNU Affero General Public License as published by the Free Software Foundation, either
// version 3 of the License, or (at your option) any later version.
//
// smtp_command_parser is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License along with
// smtp_command_parser. If not, see <https://www.gnu.org/licenses/>.


//! A local SMTP sink: accepts every message sent to it and logs it.

use std::{io, net::SocketAddr, path::PathBuf, process::ExitCode, rc::Rc};

use clap::Parser;
use futures_util::{pin_mut, StreamExt};
use smtp_command_parser::{config::ServerConfig, connection::Message};
use tokio::{net::TcpListener, sync::mpsc::unbounded_channel, task::LocalSet};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Accept mail over SMTP and log it instead of delivering it.
#[derive(Parser, Debug)]
#[command(name = "smtp_sink", version, about, long_about = None)]
struct Args {
    /// Configuration file path.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<SocketAddr>,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let mut config = match &args.config {
        Some(path) => match ServerConfig::from_file(path) {
            Ok(config) => config,
            Err(error) => {
                error!(%error, "failed to load configuration");
                return ExitCode::FAILURE;
            }
        },
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(error) => {
            error!(%error, "failed to start runtime");
            return ExitCode::FAILURE;
        }
    };

    // Sessions share their configuration through `Rc`, so they all run on this thread.
    match LocalSet::new().block_on(&runtime, serve(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "server failed");
            ExitCode::FAILURE
        }
    }
}

/// Accept sessions until interrupted.
async fn serve(config: ServerConfig) -> io::Result<()> {
    let listener = TcpListener::bind(config.bind).await?;
    info!(address = %listener.local_addr()?, hostname = config.hostname.as_str(), "listening");

    let (sender, mut receiver) = unbounded_channel();
    tokio::task::spawn_local(async move {
        while let Some(message) = receiver.recv().await {
            log_message(&message);
        }
    });

    let sessions = smtp_command_parser::listen(listener, Rc::new(config), Some(sender));
    pin_mut!(sessions);

    loop {
        tokio::select! {
            next = sessions.next() => match next {
                Some(Ok(session)) => {
                    tokio::task::spawn_local(async move {
                        match session.await {
                            Ok(Ok(_)) => (),
                            Ok(Err(error)) => warn!(%error, "session failed"),
                            Err(error) => error!(%error, "session panicked"),
                        }
                    });
                }
                // Already logged by `listen`.
                Some(Err(_)) => (),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}

fn log_message(message: &Message) {
    info!(
        helo = message.helo.as_str(),
        from = message.from.as_str(),
        recipients = ?message.recipients,
        size = message.data.len(),
        "received message"
    );
    debug!(content = %String::from_utf8_lossy(&message.data), "message content");
}
