// fakecam/examples/capture_demo.rs

use anyhow::Result;
use fakecam::prelude::*;
use fakecam_simulation::{RecordingCallbacks, SensorConfig, SimulatedPipeline};
use std::sync::Arc;
use std::time::{Duration, Instant};

const FRAMES: u32 = 30;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // 1. 模拟后端：33ms 一帧
    let pipeline = Arc::new(SimulatedPipeline::new(SensorConfig {
        frame_period: Some(Duration::from_millis(33)),
    }));
    let camera = FakeCamera3::new(0, Facing::Back, DeviceConfig::default(), pipeline.clone());

    // 2. init -> connect -> initialize
    camera.init()?;
    let info = camera.camera_info()?;
    println!(
        "Camera 0: {:?}, hardware level {:?}, sensor {}x{}",
        info.facing,
        info.static_info.hardware_level,
        info.static_info.pixel_array_size.0,
        info.static_info.pixel_array_size.1
    );
    camera.connect()?;
    let callbacks = Arc::new(RecordingCallbacks::new());
    camera.initialize(callbacks.clone())?;

    // 3. 预览流 + JPEG 流
    let mut streams = [
        Camera3Stream::output(1, 640, 480, PixelFormat::RGBA_8888),
        Camera3Stream::output(2, 640, 480, PixelFormat::BLOB),
    ];
    camera.configure_streams(&mut streams)?;
    let mapper = pipeline.mapper();
    let preview = mapper.allocate(&streams[0], streams[0].max_buffers as usize);
    let blob = mapper.allocate(&streams[1], 1);
    camera.register_stream_buffers(streams[0].id, &preview)?;
    camera.register_stream_buffers(streams[1].id, &blob)?;

    let mut settings = Some(camera.construct_default_request_settings(RequestTemplate::Preview)?);
    let start = Instant::now();

    // 4. 连续预览，最后一帧顺带拍一张 JPEG
    for frame in 0..FRAMES {
        let mut request = CaptureRequest::new(frame).output(StreamBuffer::new(
            streams[0].id,
            preview[frame as usize % preview.len()].clone(),
        ));
        if let Some(s) = settings.take() {
            request = request.settings(s);
        }
        if frame == FRAMES - 1 {
            request = request.output(StreamBuffer::new(streams[1].id, blob[0].clone()));
        }
        camera.process_capture_request(request)?;
    }

    let mut received = 0;
    while let Some(result) = callbacks.recv_result(Duration::from_secs(2)) {
        received += 1;
        if let Some(meta) = &result.result {
            let ae = meta.find_u8(Tag::CONTROL_AE_STATE);
            let ts = meta.find_i64(Tag::SENSOR_TIMESTAMP).unwrap_or_default();
            println!("Frame {:>3}: timestamp {} ns, AE state {:?}", result.frame_number, ts, ae);
        } else {
            println!(
                "Frame {:>3}: JPEG ready, {} bytes",
                result.frame_number,
                blob[0].pixels().len()
            );
        }
        if received == FRAMES + 1 {
            break;
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    println!("{} results in {:.2}s ({:.1} fps)", received, elapsed, FRAMES as f64 / elapsed);
    println!("{}", camera.dump());

    // 5. 清理 (Drop 会自动处理，但显式调用更规范)
    camera.close()?;
    Ok(())
}
