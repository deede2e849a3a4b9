use std::{fs, io::ErrorKind, os::unix::fs::FileTypeExt, path::Path, sync::Arc};

use anyhow::{Context, Result, bail};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    net::{UnixListener, UnixStream},
    signal::unix::{SignalKind, signal},
    sync::{broadcast, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::{
    arbitration::{Arbiter, ArbitrationEvent, BroadcastArbitrationSink, types::Desire},
    filters::{FilterManager, InMemoryFilterServices},
    protocol::{ClientMessage, ServerMessage, encode_server_message, parse_client_message},
};

enum ExitReason {
    SocketMessage,
    Signal(&'static str),
}

/// Shared handles every client connection works against.
pub struct ServerContext {
    pub arbiter: Arc<Arbiter>,
    pub events: Arc<BroadcastArbitrationSink>,
    pub filters: Arc<FilterManager>,
    pub filter_services: Arc<InMemoryFilterServices>,
}

struct Connection {
    context: Arc<ServerContext>,
    desires_tx: mpsc::Sender<Vec<Desire>>,
    exit_tx: mpsc::UnboundedSender<()>,
}

pub async fn run(
    socket_path: &Path,
    context: ServerContext,
    desire_queue_capacity: usize,
) -> Result<()> {
    prepare_socket_path(socket_path)?;
    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("unable to bind socket {}", socket_path.display()))?;

    let mut sigint =
        signal(SignalKind::interrupt()).context("unable to listen for SIGINT (Ctrl+C)")?;
    let mut sigterm = signal(SignalKind::terminate()).context("unable to listen for SIGTERM")?;
    let (exit_tx, mut exit_rx) = mpsc::unbounded_channel::<()>();

    let context = Arc::new(context);
    let shutdown = CancellationToken::new();
    let (desires_tx, desires_rx) = mpsc::channel(desire_queue_capacity.max(1));
    let worker = spawn_desire_worker(Arc::clone(&context.arbiter), desires_rx, shutdown.clone());

    tracing::info!(
        target: "server",
        socket_path = %socket_path.display(),
        desire_queue_capacity = desire_queue_capacity,
        "server_listening"
    );

    let exit_reason = loop {
        tokio::select! {
            _ = sigint.recv() => break ExitReason::Signal("SIGINT"),
            _ = sigterm.recv() => break ExitReason::Signal("SIGTERM"),
            Some(()) = exit_rx.recv() => break ExitReason::SocketMessage,
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _)) => {
                        let connection = Connection {
                            context: Arc::clone(&context),
                            desires_tx: desires_tx.clone(),
                            exit_tx: exit_tx.clone(),
                        };
                        tokio::spawn(
                            async move {
                                if let Err(err) = handle_client(stream, connection).await {
                                    tracing::warn!(target: "server", error = %format!("{err:#}"), "client_handling_failed");
                                }
                            }
                            .in_current_span(),
                        );
                    }
                    Err(err) => {
                        tracing::warn!(target: "server", error = %err, "accept_failed");
                    }
                }
            }
        }
    };

    shutdown.cancel();
    drop(desires_tx);
    if let Err(err) = worker.await {
        tracing::error!(target: "server", error = %err, "desire_worker_join_failed");
    }

    cleanup_socket_path(socket_path)?;
    match exit_reason {
        ExitReason::SocketMessage => {
            tracing::info!(target: "server", reason = "exit_message", "server_stopped")
        }
        ExitReason::Signal(signal_name) => {
            tracing::info!(target: "server", reason = signal_name, "server_stopped")
        }
    }

    Ok(())
}

/// Single consumer of desire batches, so cycles never overlap. Cancellation is
/// only observed between cycles.
fn spawn_desire_worker(
    arbiter: Arc<Arbiter>,
    mut desires_rx: mpsc::Receiver<Vec<Desire>>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    let worker = async move {
        loop {
            let batch = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                batch = desires_rx.recv() => batch,
            };
            let Some(desires) = batch else {
                break;
            };
            arbiter.update_desire_set(desires).await;
        }
        tracing::info!(target: "server", "desire_worker_stopped");
    };
    tokio::spawn(worker.in_current_span())
}

async fn handle_client(stream: UnixStream, connection: Connection) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let writer = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            let line = match encode_server_message(&message) {
                Ok(line) => line,
                Err(err) => {
                    tracing::error!(target: "server", error = %err, "server_message_encode_failed");
                    continue;
                }
            };
            if write_half.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut lines = BufReader::new(read_half).lines();
    let mut forwarder: Option<JoinHandle<()>> = None;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message = match parse_client_message(line) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(target: "server", error = %err, "invalid_protocol_message");
                let _ = outbound_tx.send(ServerMessage::Rejected {
                    request: "unknown".to_string(),
                    message: err.to_string(),
                });
                continue;
            }
        };

        match message {
            ClientMessage::Exit => {
                let _ = connection.exit_tx.send(());
                break;
            }
            ClientMessage::Subscribe => {
                if forwarder.is_none() {
                    forwarder = Some(spawn_event_forwarder(
                        connection.context.events.subscribe(),
                        outbound_tx.clone(),
                    ));
                }
                let _ = outbound_tx.send(ServerMessage::Subscribed);
            }
            other => {
                let reply = dispatch(&connection, other).await;
                let _ = outbound_tx.send(reply);
            }
        }
    }

    if let Some(forwarder) = forwarder {
        forwarder.abort();
    }
    drop(outbound_tx);
    let _ = writer.await;

    Ok(())
}

async fn dispatch(connection: &Connection, message: ClientMessage) -> ServerMessage {
    let context = &connection.context;
    let request = message.request_name();
    let result: Result<ServerMessage, String> = match message {
        ClientMessage::AddStrategy(strategy) => {
            let strategy_id = strategy.id.clone();
            context
                .arbiter
                .register_strategy(strategy)
                .await
                .map(|outcome| ServerMessage::StrategyRegistered {
                    strategy_id,
                    outcome,
                })
                .map_err(|err| err.to_string())
        }
        ClientMessage::SetResourceMax { id, value } => context
            .arbiter
            .set_resource_ceiling(&id, value)
            .await
            .map(|snapshot| ServerMessage::ResourceMaxSet { snapshot })
            .map_err(|err| err.to_string()),
        ClientMessage::DesiresSet(desires) => {
            let count = desires.len();
            connection
                .desires_tx
                .send(desires)
                .await
                .map(|()| ServerMessage::DesiresAccepted { count })
                .map_err(|_| "arbitration worker has stopped".to_string())
        }
        ClientMessage::RegisterFilter { ns, filter_type } => context
            .filters
            .register_filter(&ns, &filter_type)
            .await
            .map(|filter| ServerMessage::FilterRegistered { filter })
            .map_err(|err| err.to_string()),
        ClientMessage::GetFilters => Ok(ServerMessage::Filters {
            filters: context.filters.get_filters().await,
        }),
        ClientMessage::SetFilterState { ns, enabled } => context
            .filters
            .set_state(&ns, enabled)
            .await
            .map(|filter| ServerMessage::FilterUpdated { filter })
            .map_err(|err| err.to_string()),
        ClientMessage::SetFilterDividerRate { ns, divider } => context
            .filters
            .set_divider_rate(&ns, divider)
            .await
            .map(|filter| ServerMessage::FilterUpdated { filter })
            .map_err(|err| err.to_string()),
        ClientMessage::AdvertiseFilterService { service } => {
            context.filter_services.advertise(service.clone()).await;
            Ok(ServerMessage::ServiceAdvertised { service })
        }
        ClientMessage::Subscribe | ClientMessage::Exit => {
            Err("request is handled by the connection loop".to_string())
        }
    };

    result.unwrap_or_else(|message| {
        tracing::warn!(target: "server", request = request, message = %message, "request_rejected");
        ServerMessage::Rejected {
            request: request.to_string(),
            message,
        }
    })
}

fn spawn_event_forwarder(
    mut events: broadcast::Receiver<ArbitrationEvent>,
    outbound_tx: mpsc::UnboundedSender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if outbound_tx.send(ServerMessage::Event { event }).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(target: "server", skipped = skipped, "subscriber_lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn prepare_socket_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("unable to create {}", parent.display()))?;
    }

    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_socket() || metadata.is_file() {
                fs::remove_file(path)
                    .with_context(|| format!("unable to remove stale socket {}", path.display()))?;
            } else {
                bail!(
                    "socket path exists but is not removable as file/socket: {}",
                    path.display()
                );
            }
        }
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => {
            return Err(err).with_context(|| format!("unable to inspect {}", path.display()));
        }
    }

    Ok(())
}

fn cleanup_socket_path(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).with_context(|| format!("unable to remove {}", path.display())),
    }
}
