use std::{path::PathBuf, sync::Arc, time::Duration};

use byteorder::{LittleEndian, WriteBytesExt};
use tokio::{
    sync::broadcast::{Receiver, error::RecvError},
    time::timeout,
};
use voxboard::{
    ConnectionTier, Engine, EngineEvent, PlaybackRequest, SourceLocator,
    configs::EngineConfig,
    transport::{DumpTransport, MemoryTransport},
};

const BLOCK: usize = 3_840;

struct TempWav(PathBuf);

impl TempWav {
    fn new(sample_rate: u32, channels: u16, samples: &[i16]) -> Self {
        let path = std::env::temp_dir().join(format!("voxboard-{}.wav", uuid::Uuid::new_v4()));
        let data_len = (samples.len() * 2) as u32;
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.write_u32::<LittleEndian>(36 + data_len).unwrap();
        out.extend_from_slice(b"WAVEfmt ");
        out.write_u32::<LittleEndian>(16).unwrap();
        out.write_u16::<LittleEndian>(1).unwrap();
        out.write_u16::<LittleEndian>(channels).unwrap();
        out.write_u32::<LittleEndian>(sample_rate).unwrap();
        out.write_u32::<LittleEndian>(sample_rate * channels as u32 * 2)
            .unwrap();
        out.write_u16::<LittleEndian>(channels * 2).unwrap();
        out.write_u16::<LittleEndian>(16).unwrap();
        out.extend_from_slice(b"data");
        out.write_u32::<LittleEndian>(data_len).unwrap();
        for s in samples {
            out.write_i16::<LittleEndian>(*s).unwrap();
        }
        std::fs::write(&path, out).unwrap();
        Self(path)
    }
}

impl Drop for TempWav {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.0);
    }
}

fn config(volume: f32) -> EngineConfig {
    EngineConfig {
        volume,
        pace_output: false,
        ..Default::default()
    }
}

async fn wait_end(rx: &mut Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut seen = Vec::new();
    timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(EngineEvent::EndOfFile) => {
                    seen.push(EngineEvent::EndOfFile);
                    break;
                }
                Ok(ev) => seen.push(ev),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => panic!("engine gone"),
            }
        }
    })
    .await
    .expect("no end-of-file");
    seen
}

#[tokio::test]
async fn three_second_wav_becomes_150_blocks() {
    let wav = TempWav::new(48_000, 2, &vec![1_000; 48_000 * 2 * 3]);
    let transport = MemoryTransport::new();
    let engine = Engine::spawn(Arc::new(transport.clone()), config(0.5));
    engine.connect_server("token").await.unwrap();
    engine.connect_channel(1u64).await.unwrap();
    assert_eq!(engine.tier(), ConnectionTier::ChannelConnected);

    let mut events = engine.subscribe();
    engine
        .load(PlaybackRequest::new("tone", SourceLocator::file(&wav.0)))
        .await
        .unwrap();
    assert_eq!(engine.total_time(), Duration::from_secs(3));
    engine.start().await.unwrap();

    let seen = wait_end(&mut events).await;
    let toggles: Vec<bool> = seen
        .iter()
        .filter_map(|e| match e {
            EngineEvent::StreamStateChanged { streaming, .. } => Some(*streaming),
            _ => None,
        })
        .collect();
    assert_eq!(toggles, vec![true, false]);
    assert_eq!(
        seen.iter()
            .filter(|e| **e == EngineEvent::EndOfFile)
            .count(),
        1
    );

    let blocks = transport.blocks();
    assert_eq!(blocks.len(), 150);
    assert!(blocks.iter().all(|b| b.len() == BLOCK));
    assert!(
        blocks
            .iter()
            .all(|b| b.chunks_exact(2).all(|p| i16::from_le_bytes([p[0], p[1]]) == 500))
    );

    engine.shutdown().await.unwrap();
}

#[tokio::test]
async fn mono_22k_is_normalised_to_stereo_48k() {
    let wav = TempWav::new(22_050, 1, &vec![2_000; 22_050]);
    let transport = MemoryTransport::new();
    let engine = Engine::spawn(Arc::new(transport.clone()), config(1.0));
    engine.connect_server("token").await.unwrap();
    engine.connect_channel(1u64).await.unwrap();

    let mut events = engine.subscribe();
    engine
        .load(PlaybackRequest::new("mono", SourceLocator::file(&wav.0)))
        .await
        .unwrap();
    engine.start().await.unwrap();
    wait_end(&mut events).await;

    let blocks = transport.blocks();
    assert!((49..=51).contains(&blocks.len()), "{} blocks", blocks.len());
    assert!(blocks.iter().all(|b| b.len() == BLOCK));

    // Left and right carry the same sample once the resampler has settled.
    let mid = &blocks[25];
    for frame in mid.chunks_exact(4) {
        assert_eq!(frame[..2], frame[2..]);
    }
    assert!(engine.status().buffer_empty);
}

#[tokio::test]
async fn missing_file_is_rejected() {
    let engine = Engine::spawn(Arc::new(MemoryTransport::new()), config(1.0));
    let missing = std::env::temp_dir().join(format!("voxboard-{}.wav", uuid::Uuid::new_v4()));
    assert!(
        engine
            .load(PlaybackRequest::new("gone", SourceLocator::file(missing)))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn dump_transport_writes_raw_pcm() {
    let wav = TempWav::new(48_000, 2, &vec![7; 48_000 * 2 / 2]);
    let dump = std::env::temp_dir().join(format!("voxboard-{}.pcm", uuid::Uuid::new_v4()));
    let engine = Engine::spawn(Arc::new(DumpTransport::new(&dump)), config(1.0));
    engine.connect_server("token").await.unwrap();
    engine.connect_channel(9u64).await.unwrap();

    let mut events = engine.subscribe();
    engine
        .load(PlaybackRequest::new("half", SourceLocator::file(&wav.0)))
        .await
        .unwrap();
    engine.start().await.unwrap();
    wait_end(&mut events).await;
    engine.disconnect_server().await.unwrap();

    let bytes = std::fs::read(&dump).unwrap();
    let _ = std::fs::remove_file(&dump);
    assert_eq!(bytes.len(), 25 * BLOCK);
    assert!(bytes.chunks_exact(2).all(|p| p == [7, 0]));
}
