#![no_main]

use std::sync::Arc;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use wire_playback::config::ParserConfig;
use wire_playback::protocol::{ConnectionIdentity, ConnectionRegistry, Direction, Dispatcher};
use wire_playback::replay::QueueReplayer;
use wire_playback::utils::ParserStats;

fuzz_target!(|data: &[u8]| {
    // First byte picks where the input splits into client and server streams
    let Some((&split, rest)) = data.split_first() else {
        return;
    };
    let at = usize::from(split).min(rest.len());
    let (client, server) = rest.split_at(at);

    let (replayer, _jobs) = QueueReplayer::new();
    let registry = ConnectionRegistry::new(
        ParserConfig::default(),
        Dispatcher::new(Arc::new(replayer), Arc::new(ParserStats::new())),
    );
    let id = ConnectionIdentity::new(0x7F00_0001, 40000);

    let _ = registry.deliver_bytes(id, Direction::ClientToServer, Duration::ZERO, client);
    let _ = registry.deliver_bytes(id, Direction::ServerToClient, Duration::from_millis(1), server);
    let _ = registry.notify_connection_closed(id);
});
