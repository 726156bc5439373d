/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 透かし画像に対する変換処理
//!
//! 変換は常に 色調整 → リサイズ → ぼかし → 回転 → 不透明度 の順で適用する。
//!

use fast_image_resize::{
    FilterType, PixelType, Resizer, ResizeOptions, ResizeAlg
};
use fast_image_resize::images::Image;
use image::{Rgba, RgbaImage};
use image::imageops::{self, replace};
use imageproc::filter::gaussian_blur_f32;
use imageproc::geometric_transformations::{rotate_about_center, Interpolation};
use tracing::debug;

use crate::error::{Result, WatermarkError};
use crate::settings::{ColorAdjust, WatermarkSettings};

/// 透明色
pub(crate) const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

///
/// 輝度(ITU-R 601-2)の算出
///
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16)
        as u8
}

///
/// 基準値と画素値の間の補間(係数1.0で画素値そのもの)
///
fn enhance(degenerate: f32, value: u8, factor: f32) -> u8 {
    (degenerate + factor * (value as f32 - degenerate)).clamp(0.0, 255.0) as u8
}

///
/// 色調整
///
/// # 引数
/// * `image` - 調整対象の画像
/// * `adjust` - 明るさ・コントラスト・彩度の係数
///
/// # 戻り値
/// 調整後の画像を返す。
///
/// # 注記
/// 明るさ、コントラスト、彩度の順に独立したパスとして画像全体に適用する。
/// コントラストの基準値は明るさ調整後の画像の平均輝度を用いる。アルファチャ
/// ネルは変更しない。
///
pub fn adjust_colors(mut image: RgbaImage, adjust: &ColorAdjust) -> RgbaImage {
    /*
     * 明るさ(黒との補間)
     */
    for Rgba([r, g, b, _]) in image.pixels_mut() {
        *r = enhance(0.0, *r, adjust.brightness);
        *g = enhance(0.0, *g, adjust.brightness);
        *b = enhance(0.0, *b, adjust.brightness);
    }

    /*
     * コントラスト(平均輝度の灰色との補間)
     */
    let count = (image.width() as u64 * image.height() as u64).max(1);
    let total: u64 = image.pixels()
        .map(|Rgba([r, g, b, _])| luma(*r, *g, *b) as u64)
        .sum();
    let mean = (total as f64 / count as f64 + 0.5).floor() as f32;

    for Rgba([r, g, b, _]) in image.pixels_mut() {
        *r = enhance(mean, *r, adjust.contrast);
        *g = enhance(mean, *g, adjust.contrast);
        *b = enhance(mean, *b, adjust.contrast);
    }

    /*
     * 彩度(画素ごとのグレースケール値との補間)
     */
    for Rgba([r, g, b, _]) in image.pixels_mut() {
        let gray = luma(*r, *g, *b) as f32;

        *r = enhance(gray, *r, adjust.saturation);
        *g = enhance(gray, *g, adjust.saturation);
        *b = enhance(gray, *b, adjust.saturation);
    }

    image
}

///
/// 画像データのリサイズ
///
/// # 引数
/// * `width` - ターゲットサイズの幅(ピクセル数)
/// * `height` - ターゲットサイズの高さ(ピクセル数)
/// * `image` - リサイズ元の画像データ
///
/// # 戻り値
/// リサイズに成功した場合は、リサイズされた画像データを`Ok()`でラップして返す。
/// 処理に失敗した場合はエラー情報を`Err()`でラップして返す。
///
/// # 注記
/// Lanczos3フィルタで畳み込みを行う。アルファチャネルは乗算済みの状態で補間
/// されるため、透明部分の色が縁に滲むことは無い。
///
pub fn resize_image(width: u32, height: u32, image: RgbaImage)
    -> Result<RgbaImage>
{
    if image.dimensions() == (width, height) {
        return Ok(image);
    }

    let src = Image::from_vec_u8(
        image.width(),
        image.height(),
        image.into_raw(),
        PixelType::U8x4
    ).map_err(|err| WatermarkError::Resize(err.to_string()))?;

    let mut dst = Image::new(width, height, PixelType::U8x4);

    let mut resizer = Resizer::new();
    let resize_opts = ResizeOptions::new()
        .resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3));

    resizer.resize(&src, &mut dst, &resize_opts)
        .map_err(|err| WatermarkError::Resize(err.to_string()))?;

    RgbaImage::from_raw(width, height, dst.into_vec())
        .ok_or_else(|| WatermarkError::Resize("invalid dimensions".into()))
}

///
/// ガウスぼかし
///
/// # 注記
/// 半径が0以下の場合は何もしない。
///
pub fn blur(image: RgbaImage, radius: f32) -> RgbaImage {
    if radius <= 0.0 {
        image
    } else {
        gaussian_blur_f32(&image, radius)
    }
}

///
/// 回転後の外接矩形のサイズの算出
///
fn expanded_size(width: u32, height: u32, degrees: i32) -> (u32, u32) {
    let theta = (degrees as f64).to_radians();
    let (sin, cos) = (theta.sin().abs(), theta.cos().abs());
    let (w, h) = (width as f64, height as f64);

    // 浮動小数点の誤差で1ピクセル膨らまないように丸める
    let fit = |v: f64| ((v * 1e6).round() / 1e6).ceil().max(1.0) as u32;

    (fit(w * cos + h * sin), fit(w * sin + h * cos))
}

///
/// 画像の回転
///
/// # 引数
/// * `image` - 回転対象の画像
/// * `degrees` - 回転角(度、正の値で反時計回り)
///
/// # 戻り値
/// 回転後の画像を返す。
///
/// # 注記
/// 画像が欠けないようキャンバスを外接矩形まで拡張し、新たに露出した領域は透
/// 明で埋める。90度単位の回転は補間を伴わない転置で処理する。
///
pub fn rotate(image: RgbaImage, degrees: i32) -> RgbaImage {
    match degrees.rem_euclid(360) {
        0 => return image,
        90 => return imageops::rotate270(&image),
        180 => return imageops::rotate180(&image),
        270 => return imageops::rotate90(&image),
        _ => {}
    }

    let (width, height) = expanded_size(image.width(), image.height(), degrees);
    let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);

    replace(
        &mut canvas,
        &image,
        (width as i64 - image.width() as i64) / 2,
        (height as i64 - image.height() as i64) / 2,
    );

    // rotate_about_center()は時計回りなので符号を反転する
    rotate_about_center(
        &canvas,
        -(degrees as f32).to_radians(),
        Interpolation::Bicubic,
        TRANSPARENT,
    )
}

///
/// アルファチャネルのスケーリング
///
/// # 引数
/// * `image` - 対象画像
/// * `percent` - 不透明度(百分率)
///
/// # 戻り値
/// 各画素のアルファ値に`percent / 100`を乗じた画像を返す。既存のアルファの
/// 階調はそのまま保存される。
///
pub fn scale_alpha(mut image: RgbaImage, percent: u8) -> RgbaImage {
    if percent >= 100 {
        return image;
    }

    for pixel in image.pixels_mut() {
        pixel[3] = (pixel[3] as u32 * percent as u32 / 100) as u8;
    }

    image
}

///
/// 透かし画像への変換チェーンの適用
///
/// # 引数
/// * `watermark` - 元の透かし画像
/// * `settings` - 正規化済みの設定
/// * `target` - リサイズ後の幅と高さ
///
/// # 戻り値
/// 変換後の透かし画像を`Ok()`でラップして返す。
///
pub fn transform_watermark(
    watermark: RgbaImage,
    settings: &WatermarkSettings,
    target: (u32, u32),
) -> Result<RgbaImage> {
    let mut wm = watermark;

    if let Some(adjust) = &settings.color_adjust {
        debug!(?adjust, "adjust colors");
        wm = adjust_colors(wm, adjust);
    }

    debug!(from = ?wm.dimensions(), to = ?target, "resize watermark");
    wm = resize_image(target.0, target.1, wm)?;

    if let Some(blur_opts) = &settings.blur {
        wm = blur(wm, blur_opts.radius);
    }

    if settings.rotation != 0 {
        wm = rotate(wm, settings.rotation);
    }

    Ok(scale_alpha(wm, settings.opacity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, color: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(color))
    }

    #[test]
    fn brightness_zero_gives_black_and_keeps_alpha() {
        let adjust = ColorAdjust {brightness: 0.0, contrast: 1.0, saturation: 1.0};
        let out = adjust_colors(solid(4, 4, [200, 100, 50, 128]), &adjust);

        assert!(out.pixels().all(|p| *p == Rgba([0, 0, 0, 128])));
    }

    #[test]
    fn unit_factors_leave_image_alone() {
        let mut image = solid(3, 2, [10, 20, 30, 255]);
        image.put_pixel(1, 1, Rgba([250, 5, 99, 40]));

        let adjust = ColorAdjust {brightness: 1.0, contrast: 1.0, saturation: 1.0};
        assert_eq!(adjust_colors(image.clone(), &adjust), image);
    }

    #[test]
    fn saturation_zero_gives_gray() {
        let adjust = ColorAdjust {brightness: 1.0, contrast: 1.0, saturation: 0.0};
        let out = adjust_colors(solid(2, 2, [255, 0, 0, 255]), &adjust);
        let Rgba([r, g, b, a]) = *out.get_pixel(0, 0);

        assert_eq!((r, g, b, a), (76, 76, 76, 255));
    }

    #[test]
    fn contrast_zero_gives_mean_gray() {
        let mut image = solid(2, 1, [0, 0, 0, 255]);
        image.put_pixel(1, 0, Rgba([255, 255, 255, 255]));

        let adjust = ColorAdjust {brightness: 1.0, contrast: 0.0, saturation: 1.0};
        let out = adjust_colors(image, &adjust);

        assert_eq!(out.get_pixel(0, 0), out.get_pixel(1, 0));
        assert_eq!(out.get_pixel(0, 0)[0], 128);
    }

    #[test]
    fn resize_to_target() {
        let out = resize_image(250, 125, solid(200, 100, [0, 0, 255, 255])).unwrap();

        let Rgba([r, g, b, a]) = *out.get_pixel(125, 60);

        assert_eq!(out.dimensions(), (250, 125));
        assert!(r <= 2 && g <= 2 && b >= 253 && a >= 253);
    }

    #[test]
    fn quarter_turns_swap_dimensions_losslessly() {
        let mut image = solid(4, 2, [0, 0, 0, 255]);
        image.put_pixel(3, 0, Rgba([255, 0, 0, 255]));

        let out = rotate(image.clone(), 90);
        assert_eq!(out.dimensions(), (2, 4));
        // 反時計回りなので右上の画素は左上へ移る
        assert_eq!(*out.get_pixel(0, 0), Rgba([255, 0, 0, 255]));

        let out = rotate(image.clone(), -90);
        assert_eq!(*out.get_pixel(1, 3), Rgba([255, 0, 0, 255]));

        assert_eq!(rotate(image.clone(), 180).dimensions(), (4, 2));
        assert_eq!(rotate(image.clone(), 0), image);
    }

    #[test]
    fn arbitrary_rotation_expands_canvas() {
        let out = rotate(solid(100, 50, [255, 255, 255, 255]), 45);

        assert_eq!(out.dimensions(), expanded_size(100, 50, 45));
        assert_eq!(out.dimensions(), (107, 107));
        assert_eq!(out.get_pixel(0, 0)[3], 0);
        assert_eq!(out.get_pixel(53, 53)[3], 255);
    }

    #[test]
    fn opacity_scales_existing_alpha() {
        let mut image = solid(2, 1, [9, 9, 9, 200]);
        image.put_pixel(1, 0, Rgba([9, 9, 9, 100]));

        let out = scale_alpha(image.clone(), 50);
        assert_eq!(out.get_pixel(0, 0)[3], 100);
        assert_eq!(out.get_pixel(1, 0)[3], 50);

        assert_eq!(scale_alpha(image.clone(), 100), image);
        assert!(scale_alpha(image, 0).pixels().all(|p| p[3] == 0));
    }

    #[test]
    fn zero_blur_is_identity() {
        let image = solid(5, 5, [1, 2, 3, 4]);
        assert_eq!(blur(image.clone(), 0.0), image);
    }
}
