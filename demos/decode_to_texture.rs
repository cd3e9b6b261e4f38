//! Example: Decode AV1 frames into a GPU render target
//!
//! Usage: cargo run --example decode_to_texture <video.obu> [frames]
//!
//! Opens the stream with dav1dfile on a headless wgpu device, then decodes,
//! uploads and converts frames, reporting which upload path each plane took.

use std::env;
use std::fs::File;
use std::path::Path;

use av1_player::gpu::plane_features;
use av1_player::telemetry::init_logging;
use av1_player::{Av1Player, InputSource, PlayerSettings};

fn main() {
    let settings = PlayerSettings::load();
    let _log_guard = match init_logging(&settings.log_config()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {}", e);
            None
        }
    };

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <video.obu> [frames]", args[0]);
        std::process::exit(1);
    }

    let video_path = Path::new(&args[1]);
    let max_frames: u32 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(10);

    let file = match File::open(video_path) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error: cannot open {}: {}", video_path.display(), e);
            std::process::exit(1);
        }
    };

    // Create wgpu device (headless - no window needed)
    let (device, queue) = pollster::block_on(async {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find GPU adapter");

        println!("Using GPU: {}", adapter.get_info().name);

        adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("AV1 Demo Device"),
                    required_features: plane_features(&adapter),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device")
    });

    let mut player = match Av1Player::load(device, queue, settings) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to load dav1dfile: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = player.play(InputSource::File(file), true) {
        eprintln!("Failed to open stream: {}", e);
        std::process::exit(1);
    }

    if let Some(geometry) = player.geometry() {
        println!(
            "Stream: {}x{} {} {}-bit (rescale {})",
            geometry.width,
            geometry.height,
            geometry.layout,
            geometry.bit_depth.bits(),
            player.rescale_factor()
        );
    }

    println!("\n=== Decoding frames ===");
    let start_time = std::time::Instant::now();
    let mut decoded = 0;

    while decoded < max_frames {
        match player.decode_and_update(1) {
            Ok(true) => {
                player.render();
                decoded += 1;
            }
            Ok(false) => {
                println!("End of stream reached");
                break;
            }
            Err(e) => {
                eprintln!("Decode error: {}", e);
                break;
            }
        }
    }

    let elapsed = start_time.elapsed();
    let stats = player.upload_stats();
    println!(
        "\nDecoded {} frames in {:.2}ms ({:.1} fps)",
        decoded,
        elapsed.as_secs_f64() * 1000.0,
        decoded as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!(
        "Plane uploads: {} direct, {} repacked, {} scratch grows",
        stats.direct, stats.repacked, stats.scratch_grows
    );

    if let Some(target) = player.render_target() {
        println!("Render target: {}x{}", target.width(), target.height());
    }

    player.stop();
}
