use image::{GrayImage, Luma, Rgb, RgbImage};
use lbsp_bgs::config::{EngineConfig, Variant};
use lbsp_bgs::{Engine, Frame};

fn solid_gray(w: u32, h: u32, v: u8) -> Frame {
    Frame::Gray(GrayImage::from_pixel(w, h, Luma([v])))
}

fn checkerboard_gray(w: u32, h: u32, cell: u32) -> Frame {
    Frame::Gray(GrayImage::from_fn(w, h, |x, y| {
        let on = ((x / cell) + (y / cell)) % 2 == 0;
        Luma([if on { 230 } else { 20 }])
    }))
}

fn warm_up(engine: &mut Engine, frame: &Frame, rounds: usize) {
    for _ in 0..rounds {
        engine.process(frame, None).unwrap();
    }
}

#[test]
fn static_solid_scene_converges_to_all_background() {
    let config = EngineConfig::default();
    let mut engine = Engine::new(config, 10).unwrap();
    let frame = solid_gray(48, 48, 128);
    engine.initialize(&frame, None).unwrap();
    warm_up(&mut engine, &frame, 15);

    let mask = engine.process(&frame, None).unwrap();
    let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
    assert_eq!(fg, 0, "a perfectly static scene should settle to zero foreground");
}

#[test]
fn localized_patch_perturbation_is_flagged_locally() {
    let config = EngineConfig::default();
    let mut engine = Engine::new(config, 11).unwrap();
    let frame = solid_gray(48, 48, 100);
    engine.initialize(&frame, None).unwrap();
    warm_up(&mut engine, &frame, 10);

    let mut perturbed = GrayImage::from_pixel(48, 48, Luma([100]));
    for y in 20..28 {
        for x in 20..28 {
            perturbed.put_pixel(x, y, Luma([255]));
        }
    }
    let mask = engine.process(&Frame::Gray(perturbed), None).unwrap();

    assert_eq!(mask.get_pixel(24, 24).0[0], 255);
    assert_eq!(mask.get_pixel(2, 2).0[0], 0);
}

#[test]
fn static_textured_scene_settles_after_warmup() {
    let mut config = EngineConfig::default();
    config.samples = 20;
    let mut engine = Engine::new(config, 12).unwrap();
    let frame = checkerboard_gray(48, 48, 6);
    engine.initialize(&frame, None).unwrap();
    warm_up(&mut engine, &frame, 25);

    let mask = engine.process(&frame, None).unwrap();
    let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
    let total = mask.width() * mask.height();
    assert!(
        fg < total / 20,
        "a static textured scene should settle to a small foreground fraction, got {fg}/{total}"
    );
}

#[test]
fn alternating_frames_produce_a_high_foreground_ratio() {
    let mut config = EngineConfig::default();
    config.required_matches = 2;
    let mut engine = Engine::new(config, 13).unwrap();
    let black = solid_gray(32, 32, 0);
    let white = solid_gray(32, 32, 255);
    engine.initialize(&black, None).unwrap();

    let mut last_fg_ratio = 0.0;
    for i in 0..11 {
        let frame = if i % 2 == 0 { &white } else { &black };
        let mask = engine.process(frame, None).unwrap();
        let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
        last_fg_ratio = fg as f64 / (mask.width() * mask.height()) as f64;
    }
    assert!(
        last_fg_ratio > 0.5,
        "strict alternation should keep most pixels classified foreground, got {last_fg_ratio}"
    );
}

#[test]
fn rgb_frames_are_classified_end_to_end() {
    let config = EngineConfig::default();
    let mut engine = Engine::new(config, 14).unwrap();
    let frame = Frame::Rgb(RgbImage::from_pixel(32, 32, Rgb([60, 120, 180])));
    engine.initialize(&frame, None).unwrap();
    warm_up(&mut engine, &frame, 10);

    let mut perturbed = RgbImage::from_pixel(32, 32, Rgb([60, 120, 180]));
    for y in 14..18 {
        for x in 14..18 {
            perturbed.put_pixel(x, y, Rgb([250, 10, 10]));
        }
    }
    let mask = engine.process(&Frame::Rgb(perturbed), None).unwrap();
    assert_eq!(mask.get_pixel(16, 16).0[0], 255);
}

#[test]
fn pbas_variant_runs_end_to_end_alongside_vibe() {
    let mut config = EngineConfig::default();
    config.variant = Variant::Pbas;
    let mut engine = Engine::new(config, 15).unwrap();
    let frame = checkerboard_gray(40, 40, 5);
    engine.initialize(&frame, None).unwrap();
    warm_up(&mut engine, &frame, 20);

    let mask = engine.process(&frame, None).unwrap();
    let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
    let total = mask.width() * mask.height();
    assert!(fg < total / 10);
}

#[test]
fn zero_required_matches_is_a_null_model_with_no_foreground() {
    let mut config = EngineConfig::default();
    config.required_matches = 0;
    let mut engine = Engine::new(config, 20).unwrap();
    let frame = solid_gray(24, 24, 60);
    engine.initialize(&frame, None).unwrap();

    let mut wild = GrayImage::from_pixel(24, 24, Luma([60]));
    for y in 0..24 {
        for x in 0..24 {
            wild.put_pixel(x, y, Luma([((x * 37 + y * 91) % 256) as u8]));
        }
    }
    let mask = engine.process(&Frame::Gray(wild), None).unwrap();
    let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
    assert_eq!(fg, 0, "required_matches == 0 is trivially satisfied everywhere");
}

#[test]
fn learning_rate_of_one_converges_the_model_to_a_new_value_within_n_frames() {
    let config = EngineConfig::default();
    let samples = config.samples;
    let mut engine = Engine::new(config, 21).unwrap();

    // A mildly noisy start frame, close enough to 100 that the constant
    // target frame below is classified background from the very first
    // call (so every sample gets a chance to refresh each frame).
    let noisy = GrayImage::from_fn(32, 32, |x, y| Luma([95 + ((x + y) % 10) as u8]));
    engine.initialize(&Frame::Gray(noisy), None).unwrap();

    let target = solid_gray(32, 32, 100);
    for _ in 0..(samples * 20) {
        let mask = engine.process(&target, Some(1.0)).unwrap();
        let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
        assert_eq!(fg, 0, "a frame within threshold of the model should never be flagged foreground");
    }

    let bg = engine.background_image().unwrap();
    assert_eq!(bg.pixel(16, 16), [100, 100, 100], "rate=1 should fully refresh every sample within O(N) frames");
}

#[test]
fn unbounded_thresholds_classify_everything_background_on_the_first_frame() {
    let mut config = EngineConfig::default();
    config.color_threshold = 255;
    config.desc_threshold = 16;
    let mut engine = Engine::new(config, 22).unwrap();
    let black = solid_gray(24, 24, 0);
    engine.initialize(&black, None).unwrap();

    let white = solid_gray(24, 24, 255);
    let mask = engine.process(&white, None).unwrap();
    let fg: u32 = mask.pixels().map(|p| (p.0[0] != 0) as u32).sum();
    assert_eq!(fg, 0, "infinite-like thresholds should admit every sample as a match immediately");
}

#[test]
fn background_image_reflects_the_learned_model() {
    let config = EngineConfig::default();
    let mut engine = Engine::new(config, 16).unwrap();
    let frame = solid_gray(24, 24, 77);
    engine.initialize(&frame, None).unwrap();
    let bg = engine.background_image().unwrap();
    assert_eq!(bg.channel(12, 12, 0), 77);
}
