//! Terminal-Frontend für einen einzelnen Anruf

use anyhow::{Context, Result};
use audio_call::call_engine::{
    CallController, CallEvent, CallHandle, CpalMicrophone, EndReason, RtcNegotiationEngine,
};
use audio_call::{init_logging, CallConfig, SignalChannel, WebSocketRelay};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};

const HELP: &str = "Commands: call, accept, hangup, mute, unmute, status, quit";

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_logging();

    let config = CallConfig::from_env().context("Failed to load configuration")?;

    let channel = SignalChannel::new();
    let relay = WebSocketRelay::connect(&config.signaling_url, Arc::clone(&channel))
        .await
        .context("Failed to connect to relay")?;
    println!("Connected to relay at {}", relay.url());

    let engine = Arc::new(RtcNegotiationEngine::new(&config.ice_servers));
    let controller =
        CallController::new(config, engine, Arc::new(CpalMicrophone::new()), channel);
    let handle = controller.handle();
    let events = controller.subscribe();
    let runner = tokio::spawn(controller.run());

    handle.prepare().await?;
    tokio::spawn(print_events(events, handle.clone()));

    println!("{}", HELP);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let result = match line.trim() {
            "call" => handle.start_call().await,
            "accept" => handle.accept_call().await,
            "hangup" => handle.hang_up().await,
            "mute" => handle.set_muted(true).await,
            "unmute" => handle.set_muted(false).await,
            "status" => handle.state().await.map(|state| println!("State: {}", state)),
            "quit" => break,
            "" => Ok(()),
            other => {
                println!("Unknown command '{}'. {}", other, HELP);
                Ok(())
            }
        };

        if let Err(e) = result {
            println!("Error: {}", e);
        }
    }

    handle.shutdown();
    runner.await.context("Call controller task failed")?;
    Ok(())
}

/// Gibt Events aus und bereitet nach jedem Ende den nächsten Anruf vor
async fn print_events(mut events: broadcast::Receiver<CallEvent>, handle: CallHandle) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::warn!("Skipped {} call events", skipped);
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            CallEvent::StateChanged(state) => println!("[{}]", state),
            CallEvent::IncomingCall => println!("Incoming call, type 'accept' to answer."),
            CallEvent::RemoteTrack { .. } => println!("Receiving audio from the other party."),
            CallEvent::Error(e) => println!("Error: {}", e),
            CallEvent::Ended { reason } => {
                match reason {
                    EndReason::RemoteHangUp => println!("The other party has hung up the call."),
                    EndReason::ChannelClosed => println!("Lost connection to the relay."),
                    other => println!("Call ended ({:?}).", other),
                }
                if reason != EndReason::ChannelClosed && reason != EndReason::Disposed {
                    if let Err(e) = handle.prepare().await {
                        println!("Error: {}", e);
                    }
                }
            }
        }
    }
}
