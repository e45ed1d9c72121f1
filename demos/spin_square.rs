//! Renders a spinning square and drains the output ring from a consumer
//! thread, printing per-frame statistics. Stands in for a real DAC sink.

use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use beamline::{Color, ContextConfig, Primitive, RenderContext, RenderParams};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().init();

    let (mut ctx, mut consumer) = RenderContext::new(ContextConfig::default())?;
    ctx.set_render_params(RenderParams::default());

    let done = Arc::new(AtomicBool::new(false));
    let sink_done = done.clone();
    let sink = std::thread::spawn(move || {
        let mut frames = 0usize;
        while !sink_done.load(Ordering::Relaxed) {
            let drained = consumer.read(|frame| {
                (
                    frame.len(),
                    frame
                        .points()
                        .iter()
                        .filter(|p| !p.color.is_black())
                        .count(),
                )
            });
            if let Some((samples, lit)) = drained {
                frames += 1;
                if frames % 30 == 0 {
                    println!("sink: frame {frames}: {samples} samples, {lit} lit");
                }
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
    });

    let mut time = 0.0f64;
    for _ in 0..150 {
        ctx.load_identity();
        ctx.rotate(time * PI * 0.25);
        ctx.scale(0.5, 0.5);

        ctx.begin(Primitive::LineStrip);
        ctx.vertex(-1.0, -1.0, Color::GREEN);
        ctx.vertex(1.0, -1.0, Color::GREEN);
        ctx.vertex(1.0, 1.0, Color::GREEN);
        ctx.vertex(-1.0, 1.0, Color::GREEN);
        ctx.vertex(-1.0, -1.0, Color::GREEN);
        ctx.end();

        time += ctx.render_frame(60);
    }
    let info = ctx.frame_info();
    println!(
        "render: {} objects, {} points, {} padding",
        info.objects, info.points, info.padding_points
    );

    done.store(true, Ordering::Relaxed);
    sink.join().expect("sink thread panicked");
    Ok(())
}
