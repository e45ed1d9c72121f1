use beamline::{Color, ContextConfig, FrameConsumer, Primitive, RenderContext, RenderParams};

fn interactive_params() -> RenderParams {
    RenderParams {
        rate: 48_000,
        on_speed: 0.05,
        off_speed: 0.1,
        start_wait: 8,
        start_dwell: 3,
        curve_dwell: 0,
        corner_dwell: 8,
        end_dwell: 3,
        end_wait: 7,
        curve_angle: (30.0f64).to_radians().cos(),
        snap: 1e-5,
        ..RenderParams::default()
    }
}

fn new_context(params: RenderParams) -> (RenderContext, FrameConsumer) {
    let (mut ctx, consumer) = RenderContext::new(ContextConfig {
        buffer_count: 2,
        max_points: 30_000,
    })
    .unwrap();
    ctx.set_render_params(params);
    (ctx, consumer)
}

fn draw_unit_square(ctx: &mut RenderContext) {
    ctx.begin(Primitive::LineStrip);
    ctx.vertex(-1.0, -1.0, Color::WHITE);
    ctx.vertex(1.0, -1.0, Color::WHITE);
    ctx.vertex(1.0, 1.0, Color::WHITE);
    ctx.vertex(-1.0, 1.0, Color::WHITE);
    ctx.vertex(-1.0, -1.0, Color::WHITE);
    ctx.end();
}

#[test]
fn unit_square_sample_count_is_analytic() {
    let (mut ctx, _consumer) = new_context(interactive_params());

    draw_unit_square(&mut ctx);
    let elapsed = ctx.render_frame(60);
    let info = ctx.frame_info();

    // Assembly: seed, then per edge a dwell plus ceil(2 / 0.05) = 40
    // interpolated samples. The first edge dwells start_dwell = 3, each right
    // angle corner dwells corner_dwell = 8, and sealing appends end_dwell = 3.
    let object = 1 + (3 + 40) + (8 + 40) * 3 + 3;
    assert_eq!(object, 191);
    // Composition: blanked travel from the resting beam at the origin to
    // (-1,-1) takes ceil(1 / 0.1) = 10 samples, bracketed by the waits.
    let composed = 10 + 8 + object + 7;
    assert_eq!(info.objects, 1);
    assert_eq!(info.points, composed);

    // 60 fps floor at 48 kHz: padded up to 800 samples.
    assert_eq!(info.padding_points, 800 - composed);
    assert!((elapsed - 800.0 / 48_000.0).abs() < 1e-12);

    // The beam parks where the frame ended; a second identical frame needs no
    // approach travel and no start wait.
    draw_unit_square(&mut ctx);
    ctx.render_frame(60);
    let info = ctx.frame_info();
    assert_eq!(info.points, 191 + 7);
}

#[test]
fn fully_lit_frame_respects_ceiling_and_floor() {
    let params = RenderParams {
        on_speed: 0.001,
        start_wait: 0,
        start_dwell: 0,
        corner_dwell: 0,
        curve_dwell: 0,
        end_dwell: 0,
        end_wait: 0,
        max_framelen: 500,
        ..interactive_params()
    };
    let (mut ctx, _consumer) = new_context(params);

    // The beam rests at the origin, so a stroke starting there needs no
    // travel: the composited frame contains no blanking at all.
    ctx.begin(Primitive::LineStrip);
    ctx.vertex(0.0, 0.0, Color::WHITE);
    ctx.vertex(0.9, 0.0, Color::WHITE);
    ctx.end();
    let elapsed = ctx.render_frame(100);
    let info = ctx.frame_info();

    assert_eq!(info.points, 901);
    assert_eq!(info.resampled_blacks, 0);
    let count = (elapsed * 48_000.0).round() as usize;
    assert_eq!(count, info.resampled_points);
    assert!(count <= 500, "count {count} exceeds the ceiling");
    assert!(count >= 480, "count {count} is below the 100 fps floor");
}

#[test]
fn decimation_overshoot_is_bounded_by_blanking() {
    let params = RenderParams {
        on_speed: 0.001,
        off_speed: 0.002,
        start_wait: 5,
        start_dwell: 0,
        corner_dwell: 0,
        curve_dwell: 0,
        end_dwell: 0,
        end_wait: 5,
        max_framelen: 600,
        ..interactive_params()
    };
    let (mut ctx, _consumer) = new_context(params);

    ctx.line(-0.9, -0.9, -0.8, -0.9, Color::WHITE);
    ctx.line(0.8, 0.9, 0.9, 0.9, Color::WHITE);
    let elapsed = ctx.render_frame(60);
    let info = ctx.frame_info();

    assert!(info.points > 600);
    assert!(info.resampled_blacks > 0);
    // Blanking samples are pinned to unit steps, so a blank-heavy frame may
    // exceed the ceiling, but never by more than its blanking count.
    let count = (elapsed * 48_000.0).round() as usize;
    assert!(count <= 600 + info.resampled_blacks);
}

#[test]
fn sample_count_is_independent_of_submission_order() {
    let run = |first_near: bool| {
        let (mut ctx, _consumer) = new_context(interactive_params());
        let near = (-0.5, -0.5, -0.4, -0.5);
        let far = (0.5, 0.5, 0.4, 0.5);
        let order = if first_near { [near, far] } else { [far, near] };
        for (x1, y1, x2, y2) in order {
            ctx.line(x1, y1, x2, y2, Color::WHITE);
        }
        let elapsed = ctx.render_frame(60);
        (elapsed, ctx.frame_info())
    };

    let (elapsed_a, info_a) = run(true);
    let (elapsed_b, info_b) = run(false);
    assert_eq!(info_a.objects, 2);
    assert_eq!(info_b.objects, 2);
    assert_eq!(info_a.points, info_b.points);
    assert_eq!(elapsed_a, elapsed_b);
}

#[test]
fn frames_reach_the_consumer_with_audio() {
    let (mut ctx, mut consumer) = new_context(interactive_params());
    ctx.set_audio_source(Some(Box::new(|left: &mut [f32], right: &mut [f32]| {
        left.fill(0.25);
        right.fill(-0.25);
    })));

    let producer = std::thread::spawn(move || {
        for _ in 0..5 {
            draw_unit_square(&mut ctx);
            ctx.render_frame(60);
        }
    });

    let mut frames_seen = 0usize;
    while !producer.is_finished() || frames_seen == 0 {
        let Some((len, audio_len, lit, in_bounds, audio_ok)) = consumer.read(|frame| {
            let lit = frame.points().iter().filter(|p| !p.color.is_black()).count();
            let in_bounds = frame
                .points()
                .iter()
                .all(|p| p.x.abs() <= 1.0 && p.y.abs() <= 1.0);
            let audio_ok = frame.audio_left().iter().all(|&s| s == 0.25)
                && frame.audio_right().iter().all(|&s| s == -0.25);
            (
                frame.len(),
                frame.audio_left().len(),
                lit,
                in_bounds,
                audio_ok,
            )
        }) else {
            std::thread::yield_now();
            continue;
        };
        frames_seen += 1;

        assert_eq!(len, 800);
        assert_eq!(audio_len, len);
        assert!(lit > 0);
        assert!(in_bounds);
        assert!(audio_ok);
    }
    producer.join().unwrap();
    assert!(frames_seen > 0);
}
