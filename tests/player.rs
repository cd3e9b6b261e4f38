//! Av1Player on a headless wgpu device
//!
//! Each test returns early when the machine has no usable GPU adapter.

mod support;

use std::cell::Cell;
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::Arc;

use av1_player::{Av1Player, InputSource, PlayerError, PlayerSettings, UnmanagedMemory};

use support::{i420_frame, memory_input, ScriptedCodec};

fn headless_adapter() -> Option<wgpu::Adapter> {
    pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::LowPower,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
    })
}

fn device_on(adapter: &wgpu::Adapter) -> Option<(wgpu::Device, wgpu::Queue)> {
    pollster::block_on(adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: Some("AV1 Test Device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
        },
        None,
    ))
    .ok()
}

fn headless_device() -> Option<(wgpu::Device, wgpu::Queue)> {
    let adapter = headless_adapter()?;
    device_on(&adapter)
}

/// 16x16 I420 codec with `frames` tight frames
fn small_codec(frames: u8) -> Arc<ScriptedCodec> {
    let frames = (0..frames).map(|i| i420_frame(16, 16, 16, 8, i * 40)).collect();
    Arc::new(ScriptedCodec::new(16, 16, frames))
}

#[test]
fn test_current_frame_before_play_is_not_playing() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let mut player = Av1Player::new(small_codec(1), device, queue);

    assert!(matches!(player.current_frame(), Err(PlayerError::NotPlaying)));
    assert!(!player.is_playing());
    assert_eq!(player.rescale_factor(), 1.0);
}

#[test]
fn test_play_sizes_render_target_and_decodes() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let codec = small_codec(1);
    let mut player = Av1Player::new(Arc::clone(&codec), device, queue);

    assert!(player.play(memory_input(64), true).unwrap().is_none());
    let target = player.current_frame().unwrap();
    assert_eq!((target.width(), target.height()), (16, 16));
    assert_eq!(player.upload_stats().direct, 3);

    // Exhausted without looping: the last frame stays in place
    assert!(!player.decode_and_update(1).unwrap());
    assert!(player.current_frame().is_ok());
    assert_eq!(player.upload_stats().direct, 3);
}

#[test]
fn test_second_play_reallocates_and_returns_borrowed_source() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let codec = small_codec(1);
    let mut player = Av1Player::new(Arc::clone(&codec), device, queue);
    assert!(player.play(memory_input(64), false).unwrap().is_none());

    codec.width.set(32);
    let previous = player.play(memory_input(48), true).unwrap();

    assert!(matches!(previous, Some(InputSource::Memory(ref m)) if m.len() == 64));
    assert_eq!(codec.log.borrow().iter().filter(|c| **c == "close").count(), 1);
    assert_eq!(player.render_target().unwrap().width(), 32);
    let textures = player.textures().unwrap();
    assert_eq!((textures.y.width(), textures.u.width()), (32, 16));
    assert_eq!(player.geometry().unwrap().width, 32);
}

#[test]
fn test_looping_player_keeps_producing_frames() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let codec = small_codec(2);
    let settings = PlayerSettings {
        loop_playback: true,
        ..PlayerSettings::default()
    };
    let mut player = Av1Player::with_settings(Arc::clone(&codec), device, queue, settings);
    player.play(memory_input(64), true).unwrap();

    for _ in 0..5 {
        assert!(player.decode_and_update(1).unwrap());
    }
    assert_eq!(codec.log.borrow().iter().filter(|c| **c == "reset").count(), 2);
}

#[test]
fn test_high_bit_depth_without_feature_hands_back_source() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let mut codec = ScriptedCodec::new(16, 16, Vec::new());
    codec.hbd = Some(1);
    let codec = Arc::new(codec);
    let mut player = Av1Player::new(Arc::clone(&codec), device, queue);

    let freed = Rc::new(Cell::new(0));
    let mut backing = vec![0u8; 32];
    let counter = Rc::clone(&freed);
    let ptr = NonNull::new(backing.as_mut_ptr()).unwrap();
    let memory = unsafe {
        UnmanagedMemory::from_raw_parts_with_free(ptr, backing.len(), move |_, _| {
            counter.set(counter.get() + 1)
        })
    };

    let err = player.play(InputSource::Memory(memory), false).unwrap_err();

    assert!(matches!(err.error, PlayerError::Gpu(_)));
    assert_eq!(codec.log.borrow().last(), Some(&"close"));
    assert_eq!(freed.get(), 0);
    assert!(matches!(err.into_input(), Some(InputSource::Memory(_))));
    assert_eq!(freed.get(), 1);
    assert!(!player.is_playing());
}

#[test]
fn test_set_device_rebuilds_resources() {
    let Some(adapter) = headless_adapter() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let (Some((device, queue)), Some((second_device, second_queue))) =
        (device_on(&adapter), device_on(&adapter))
    else {
        eprintln!("no GPU device, skipping");
        return;
    };
    let codec = small_codec(2);
    let mut player = Av1Player::new(Arc::clone(&codec), device, queue);
    player.play(memory_input(64), true).unwrap();
    player.current_frame().unwrap();

    player.set_device(second_device, second_queue).unwrap();

    assert!(player.is_playing());
    assert_eq!(player.render_target().unwrap().width(), 16);
    assert_eq!(player.textures().unwrap().u.width(), 8);
    assert!(player.current_frame().is_ok());
}

#[test]
fn test_stop_keeps_last_frame_and_ends_playback() {
    let Some((device, queue)) = headless_device() else {
        eprintln!("no GPU adapter, skipping");
        return;
    };
    let mut player = Av1Player::new(small_codec(1), device, queue);
    player.play(memory_input(64), false).unwrap();
    player.current_frame().unwrap();

    assert!(matches!(player.stop(), Some(InputSource::Memory(_))));
    assert!(player.render_target().is_some());
    assert!(matches!(player.current_frame(), Err(PlayerError::NotPlaying)));
}
