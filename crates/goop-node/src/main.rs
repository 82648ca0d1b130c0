//! Goop2 peer node binary: wires the Store, Peer Table, Transport Host,
//! Relay Controller, Presence, Stream Dispatcher, Data Op Engine, Group
//! Manager and Realtime Channels together into one running node (§2).

mod config;
mod error;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use goop_data::DataOpEngine;
use goop_dispatch::{Dispatcher, DispatcherConfig};
use goop_group::{GroupManager, GroupManagerChecker};
use goop_peertable::{PeerCache, PeerTable};
use goop_presence::PresenceManager;
use goop_realtime::RealtimeManager;
use goop_relay::RelayManager;
use goop_store::Store;
use goop_transport::{GoopNode, GoopNodeConfig, PROTOCOL_CHAT, PROTOCOL_GROUP};

use config::{Cli, NodeConfig};
use error::NodeError;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = NodeConfig::load(&cli.config)
        .context("loading node config")?
        .apply_cli(&cli);

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("creating data dir {}", config.data_dir.display()))?;

    let relay = match &config.relay {
        Some(r) => Some(r.clone().into_relay_info().map_err(anyhow::Error::from)?),
        None => None,
    };

    let mut node_config = GoopNodeConfig::new()
        .key_path(config.key_path())
        .dial_timeout(config.dial_timeout());
    if let Some(relay) = relay.clone() {
        node_config = node_config.relay(relay);
    }

    let node = Arc::new(GoopNode::bind(node_config).await.map_err(NodeError::from)?);
    tracing::info!(id = %node.id(), "goop node bound");

    let store = Arc::new(Store::open(config.store_path()).map_err(NodeError::from)?);
    let peer_cache = PeerCache::new(store.clone());
    let peer_table = Arc::new(PeerTable::new());
    peer_cache
        .load_favorites_into(&peer_table)
        .map_err(NodeError::from)
        .context("loading favorite peers")?;

    let relay_manager = relay.clone().map(|r| {
        Arc::new(RelayManager::spawn(
            node.clone(),
            node.peerstore().clone(),
            r,
            config.relay_tick_interval(),
            None,
        ))
    });

    let presence = PresenceManager::spawn(node.clone(), peer_table.clone(), relay.clone())
        .await
        .map_err(NodeError::from)
        .context("joining presence topic")?;

    let group = Arc::new(GroupManager::new(node.id(), store.clone()).map_err(NodeError::from)?);
    group.clone().resume_subscriptions(node.clone()).await;

    // Kept alive for the lifetime of the node: its forwarder task bridges
    // Group Manager events into realtime channel events for the data/lua
    // surface (not wired to its own wire protocol — it rides group/chat).
    let _realtime = RealtimeManager::new(node.id(), group.clone());

    let data_engine = Arc::new(DataOpEngine::new(
        store.clone(),
        None,
        node.id(),
        config.email.clone(),
    ));

    let avatar = match &config.avatar_path {
        Some(path) => Some(
            std::fs::read(path)
                .with_context(|| format!("reading avatar file {}", path.display()))?,
        ),
        None => None,
    };

    let mut dispatcher_config = DispatcherConfig::new(config.content.clone(), avatar);
    if let Some(root) = &config.site_root {
        dispatcher_config = dispatcher_config.site_root(root.clone());
    }
    if let Some(root) = &config.docs_root {
        dispatcher_config = dispatcher_config.docs_root(root.clone());
    }

    let group_checker: Arc<dyn goop_dispatch::GroupChecker> =
        Arc::new(GroupManagerChecker(group.clone()));

    let dispatcher = Arc::new(Dispatcher::new(
        dispatcher_config,
        data_engine.clone(),
        group_checker,
        relay_manager.clone(),
        node.peerstore().clone(),
        relay.clone(),
    ));

    publish_self(&presence, &node, &config).await;

    tracing::info!("accepting streams");
    tokio::select! {
        result = run_accept_loop(node.clone(), dispatcher, group, peer_table) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown requested, publishing offline presence");
            publish_offline(&presence, &node).await;
            Ok(())
        }
    }
}

/// Announce this node online on the fixed presence topic (§4.E).
async fn publish_self(presence: &PresenceManager, node: &GoopNode, config: &NodeConfig) {
    let addrs = local_addr_strings(node);
    let msg = goop_presence::PresenceMsg::Online(goop_presence::PresenceInfo {
        identity: node.id(),
        content: config.content.clone(),
        email: config.email.clone(),
        avatar_hash: String::new(),
        video_disabled: config.video_disabled,
        active_template: config.active_template.clone(),
        addrs,
        timestamp: goop_transport::now_ms(),
    });
    if let Err(e) = presence.publish(msg).await {
        tracing::warn!(error = %e, "failed to publish initial presence");
    }
}

/// Publish an `Offline` announcement on the presence topic. Best effort:
/// a failure here just means peers fall back to presence timeout, so it
/// never blocks shutdown.
async fn publish_offline(presence: &PresenceManager, node: &GoopNode) {
    let msg = goop_presence::PresenceMsg::Offline { identity: node.id() };
    if let Err(e) = presence.publish(msg).await {
        tracing::warn!(error = %e, "failed to publish offline presence");
    }
}

fn local_addr_strings(node: &GoopNode) -> Vec<String> {
    node.addr()
        .direct_addresses
        .iter()
        .map(|a| a.to_string())
        .collect()
}

/// Accept incoming streams for the lifetime of the node, routing each
/// to its handler. `group`/`chat` tags are routed directly to the
/// Group Manager (§4.F: "never reach `Dispatcher::handle`"); every
/// other tag goes through the Stream Dispatcher.
async fn run_accept_loop(
    node: Arc<GoopNode>,
    dispatcher: Arc<Dispatcher>,
    group: Arc<GroupManager>,
    peer_table: Arc<PeerTable>,
) -> Result<()> {
    loop {
        let incoming = match node.accept_stream().await {
            Ok(i) => i,
            Err(e) => {
                tracing::warn!(error = %e, "transport shut down, exiting accept loop");
                return Ok(());
            }
        };

        if incoming.tag.as_slice() == PROTOCOL_GROUP || incoming.tag.as_slice() == PROTOCOL_CHAT {
            group.handle_incoming_stream(incoming).await;
            continue;
        }

        let dispatcher = dispatcher.clone();
        let node_for_handler = node.clone();
        let peer_table_size = peer_table.len();
        tokio::spawn(async move {
            if let Err(e) = dispatcher.handle(incoming, &node_for_handler, peer_table_size).await {
                tracing::debug!(error = %e, "stream handler returned an error");
            }
        });
    }
}
