//! Watch command: follow the storage directory and print notifications.

use anyhow::{Context, bail};
use std::io::Write;
use std::sync::Arc;

use flexpreset::{ChangeWatcher, PresetRef, PresetStore, Settings, SyncBroadcaster, SyncEvent};

fn parse_scope(scope: &str) -> anyhow::Result<PresetRef> {
    match scope.split_once("::") {
        Some((collection, title)) if !collection.is_empty() && !title.is_empty() => {
            Ok(PresetRef::new(collection, title))
        }
        _ => bail!("scope must look like 'collection::title', got '{scope}'"),
    }
}

fn print_event(event: &SyncEvent) -> anyhow::Result<()> {
    let line = serde_json::to_string(event)?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

/// Register one session, print the current listing, then every notification
/// as a JSON line until Ctrl-C.
pub async fn run_watch(settings: &Settings, scope: Option<&str>) -> anyhow::Result<()> {
    if !settings.watch.enabled {
        bail!("watching is disabled (watch.enabled = false)");
    }
    if !settings.broadcast.enabled {
        bail!("notifications are disabled (broadcast.enabled = false)");
    }
    let scope = scope.map(parse_scope).transpose()?;

    let broadcaster = Arc::new(SyncBroadcaster::new());
    let store = Arc::new(PresetStore::from_settings(settings).with_broadcaster(broadcaster.clone()));
    let (session, mut rx) = broadcaster.subscribe(scope);

    let watcher = ChangeWatcher::new(store.clone(), &settings.watch)
        .with_context(|| format!("cannot watch {}", store.dir().display()))?;
    eprintln!("Watching {} as {session} (Ctrl-C to stop)", watcher.dir().display());

    print_event(&SyncEvent::Listing(store.listing()))?;

    let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn(watcher.watch_until(async {
        let _ = stop_rx.await;
    }));

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(event) => print_event(&event)?,
                None => break,
            },
            _ = &mut ctrl_c => break,
        }
    }

    let _ = stop_tx.send(());
    handle.await??;
    broadcaster.unregister(&session);
    Ok(())
}
