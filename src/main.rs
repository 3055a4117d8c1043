use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use voxboard::{
    Engine, EngineEvent, PlaybackRequest, SourceLocator,
    common::{
        banner::{BannerInfo, print_banner},
        logger,
    },
    configs::Config,
    transport::DumpTransport,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e}, using built-in defaults");
            Config::default()
        }
    };
    print_banner(&BannerInfo::new(config.transport.dump_path.as_str()));
    logger::init(config.logging.as_ref());

    let tracks: Vec<String> = std::env::args().skip(1).collect();
    if tracks.is_empty() {
        warn!("nothing to play; pass file paths or http(s) URLs as arguments");
        return Ok(());
    }

    let transport = Arc::new(DumpTransport::new(&config.transport.dump_path));
    let engine = Engine::spawn(transport, config.engine.clone());
    let mut events = engine.subscribe();

    let token = if config.transport.token.is_empty() {
        "local"
    } else {
        config.transport.token.as_str()
    };
    engine.connect_server(token).await?;
    engine.connect_channel(config.transport.channel_id).await?;
    info!("writing PCM to {}", config.transport.dump_path);

    for track in &tracks {
        let locator = if track.starts_with("http://") || track.starts_with("https://") {
            SourceLocator::uri(track.as_str())
        } else {
            SourceLocator::file(track.as_str())
        };

        if let Err(e) = engine.load(PlaybackRequest::new(track.as_str(), locator)).await {
            error!("skipping {}: {}", track, e);
            continue;
        }
        engine.start().await?;

        tokio::select! {
            done = wait_for_end(&mut events) => {
                if !done {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                engine.stop(true, true).await?;
                break;
            }
        }
    }

    engine.shutdown().await?;
    Ok(())
}

/// Returns `false` once the engine is gone.
async fn wait_for_end(events: &mut tokio::sync::broadcast::Receiver<EngineEvent>) -> bool {
    loop {
        match events.recv().await {
            Ok(EngineEvent::EndOfFile) => return true,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => return false,
        }
    }
}
