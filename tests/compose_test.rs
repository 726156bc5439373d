/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

use image::{DynamicImage, GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};
use watermark_studio::codec;
use watermark_studio::{
    compose, Background, Border, Blur, OutputFormat, Position, PresetPosition,
    Shadow, Sizing, Tiling, WatermarkSettings,
};

const BASE: Rgba<u8> = Rgba([12, 34, 56, 255]);
const MARK: Rgba<u8> = Rgba([200, 30, 60, 255]);

fn photo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([12, 34, 56])))
}

fn logo(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, MARK))
}

fn top_left() -> Position {
    Position::Preset {
        preset: PresetPosition::TopLeft,
        margin_x: 0,
        margin_y: 0,
    }
}

fn assert_near(actual: Rgba<u8>, expected: Rgba<u8>, tolerance: u8) {
    for (a, e) in actual.0.iter().zip(expected.0.iter()) {
        assert!(
            a.abs_diff(*e) <= tolerance,
            "{:?} is not within {} of {:?}",
            actual,
            tolerance,
            expected
        );
    }
}

#[test]
fn default_placement_at_bottom_right() {
    let settings = WatermarkSettings {opacity: 100, ..Default::default()};
    let out = compose(&photo(1000, 800), &logo(200, 100), &settings).unwrap();

    assert_eq!(out.dimensions(), (1000, 800));

    // 25% → 250x125、右下からマージン30で(720, 645)
    assert_near(out.get_pixel(720, 645), MARK, 3);
    assert_near(out.get_pixel(969, 769), MARK, 3);
    assert_eq!(out.get_pixel(719, 645), BASE);
    assert_eq!(out.get_pixel(720, 644), BASE);
    assert_eq!(out.get_pixel(970, 770), BASE);
}

#[test]
fn zero_opacity_leaves_base_untouched() {
    let base = photo(320, 240);
    let settings = WatermarkSettings {
        opacity: 0,
        rotation: 30,
        shadow: None,
        ..Default::default()
    };

    let out = compose(&base, &logo(64, 64), &settings).unwrap();
    assert_eq!(out.to_rgba8(), base.to_rgba8());

    let tiled = WatermarkSettings {
        opacity: 0,
        tiling: Some(Tiling {
            spacing_x: 40,
            spacing_y: 40,
            rotation: -30,
            opacity: 100,
        }),
        ..Default::default()
    };

    let out = compose(&base, &logo(64, 64), &tiled).unwrap();
    assert_eq!(out.to_rgba8(), base.to_rgba8());
}

#[test]
fn full_opacity_keeps_alpha_gradient() {
    let gradient = RgbaImage::from_fn(16, 8, |x, _| {
        Rgba([255, 255, 255, (x * 16) as u8])
    });
    let transparent = DynamicImage::ImageRgba8(
        RgbaImage::from_pixel(32, 32, Rgba([0, 0, 0, 0]))
    );

    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 16, height: 8},
        position: top_left(),
        opacity: 100,
        ..Default::default()
    };

    let out = compose(&transparent, &DynamicImage::ImageRgba8(gradient), &settings)
        .unwrap();

    for x in 0..16u32 {
        let alpha = out.get_pixel(x, 4)[3];
        assert!(alpha.abs_diff((x * 16) as u8) <= 2, "x={} alpha={}", x, alpha);
    }
}

#[test]
fn custom_size_centered_anchor() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 400, height: 400},
        position: Position::Custom {x_percent: 50, y_percent: 50},
        opacity: 100,
        ..Default::default()
    };

    let out = compose(&photo(1000, 800), &logo(400, 400), &settings).unwrap();

    assert_eq!(out.get_pixel(300, 200), MARK);
    assert_eq!(out.get_pixel(699, 599), MARK);
    assert_eq!(out.get_pixel(299, 200), BASE);
    assert_eq!(out.get_pixel(700, 600), BASE);
}

#[test]
fn oversized_watermark_is_clipped() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 300, height: 300},
        opacity: 100,
        ..Default::default()
    };

    let out = compose(&photo(200, 100), &logo(300, 300), &settings).unwrap();

    assert_eq!(out.dimensions(), (200, 100));
    assert_eq!(out.get_pixel(0, 0), MARK);
    assert_eq!(out.get_pixel(199, 99), MARK);
}

#[test]
fn background_box_wraps_watermark() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 50, height: 40},
        position: top_left(),
        opacity: 100,
        background: Some(Background {
            color: Rgba([255, 0, 0, 255]),
            padding: 15,
        }),
        ..Default::default()
    };

    let out = compose(&photo(200, 200), &logo(50, 40), &settings).unwrap();

    // 背景ボックスは 80x70
    assert_eq!(out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    assert_eq!(out.get_pixel(79, 69), Rgba([255, 0, 0, 255]));
    assert_eq!(out.get_pixel(15, 15), MARK);
    assert_eq!(out.get_pixel(80, 20), BASE);
    assert_eq!(out.get_pixel(20, 70), BASE);
}

#[test]
fn border_wraps_background() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 20, height: 20},
        position: top_left(),
        opacity: 100,
        background: Some(Background {
            color: Rgba([0, 0, 255, 255]),
            padding: 5,
        }),
        border: Some(Border {
            width: 2,
            color: Rgba([255, 255, 255, 255]),
        }),
        ..Default::default()
    };

    let out = compose(&photo(100, 100), &logo(20, 20), &settings).unwrap();

    // 20 → 背景 30 → 枠線 34
    assert_eq!(out.get_pixel(0, 0), Rgba([255, 255, 255, 255]));
    assert_eq!(out.get_pixel(33, 33), Rgba([255, 255, 255, 255]));
    assert_eq!(out.get_pixel(2, 2), Rgba([0, 0, 255, 255]));
    assert_eq!(out.get_pixel(7, 7), MARK);
    assert_eq!(out.get_pixel(34, 34), BASE);
}

#[test]
fn placement_uses_decorated_size() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 40, height: 20},
        position: Position::Preset {
            preset: PresetPosition::BottomRight,
            margin_x: 10,
            margin_y: 10,
        },
        opacity: 100,
        background: Some(Background {
            color: Rgba([0, 0, 255, 255]),
            padding: 5,
        }),
        border: Some(Border {
            width: 2,
            color: Rgba([255, 255, 255, 255]),
        }),
        shadow: Some(Shadow {
            offset_x: 3,
            offset_y: 3,
            blur_radius: 0,
            opacity: 100,
        }),
        ..Default::default()
    };

    let out = compose(&photo(300, 200), &logo(40, 20), &settings).unwrap();

    // 40x20 → 背景 50x30 → 枠線 54x34 → 影 60x40、左上は(230, 150)
    assert_eq!(out.get_pixel(289, 189), Rgba([0, 0, 0, 255]));
    assert_eq!(out.get_pixel(290, 189), BASE);
    assert_eq!(out.get_pixel(289, 190), BASE);
    assert_eq!(out.get_pixel(290, 190), BASE);

    assert_eq!(out.get_pixel(229, 150), BASE);
    assert_eq!(out.get_pixel(232, 152), BASE);
    assert_eq!(out.get_pixel(233, 153), Rgba([255, 255, 255, 255]));
    assert_eq!(out.get_pixel(235, 155), Rgba([0, 0, 255, 255]));
    assert_near(out.get_pixel(240, 160), MARK, 3);
    assert_near(out.get_pixel(279, 179), MARK, 3);
}

#[test]
fn tiling_covers_the_image() {
    let settings = WatermarkSettings {
        sizing: Sizing::Custom {width: 10, height: 10},
        opacity: 100,
        tiling: Some(Tiling {
            spacing_x: 25,
            spacing_y: 25,
            rotation: 0,
            opacity: 100,
        }),
        ..Default::default()
    };

    let out = compose(&photo(100, 60), &logo(10, 10), &settings).unwrap();

    // 原点 x: -10, 15, 40, 65, 90 / y: -10, 15, 40
    for (x, y) in [(15, 15), (24, 24), (40, 40), (95, 45), (65, 15)] {
        assert_eq!(out.get_pixel(x, y), MARK, "({}, {})", x, y);
    }
    for (x, y) in [(0, 0), (25, 25), (14, 30), (99, 59)] {
        assert_eq!(out.get_pixel(x, y), BASE, "({}, {})", x, y);
    }
}

#[test]
fn compose_is_deterministic() {
    let settings = WatermarkSettings {
        opacity: 70,
        rotation: 17,
        blur: Some(Blur {radius: 1.5}),
        shadow: Some(Shadow {
            offset_x: 3,
            offset_y: -2,
            blur_radius: 4,
            opacity: 50,
        }),
        border: Some(Border {width: 2, color: Rgba([255, 255, 0, 255])}),
        ..Default::default()
    };

    let base = photo(300, 200);
    let wm = logo(90, 40);

    let first = compose(&base, &wm, &settings).unwrap();
    let second = compose(&base, &wm, &settings).unwrap();

    assert_eq!(first.as_bytes(), second.as_bytes());
}

#[test]
fn png_output_round_trips_exactly() {
    let settings = WatermarkSettings {
        opacity: 45,
        rotation: -20,
        ..Default::default()
    };

    let out = compose(&photo(240, 180), &logo(60, 30), &settings).unwrap();
    let data = codec::encode(&out, OutputFormat::Png, 95).unwrap();
    let decoded = codec::decode(&data, None).unwrap();

    assert_eq!(decoded.to_rgba8(), out.to_rgba8());
}

#[test]
fn lossy_outputs_keep_dimensions() {
    for format in [OutputFormat::Jpeg, OutputFormat::Webp] {
        let settings = WatermarkSettings {
            output_format: format,
            jpeg_quality: 80,
            ..Default::default()
        };

        let out = compose(&photo(257, 131), &logo(60, 30), &settings).unwrap();
        let data = codec::encode(&out, format, settings.jpeg_quality).unwrap();

        assert_eq!(codec::decode(&data, None).unwrap().dimensions(), (257, 131));
    }
}
