/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 透かしの合成処理
//!
//! ベース画像と同じサイズの透明なレイヤーに透かしを貼り付け(単一配置または
//! タイル配置)、最後にそのレイヤーをベース画像へアルファ合成する。
//!

use image::{DynamicImage, RgbImage, RgbaImage};
use image::imageops::overlay;
use tracing::debug;

use crate::decoration::decorate;
use crate::error::Result;
use crate::geometry::{compute_position, compute_size, tile_origins};
use crate::settings::{Tiling, WatermarkSettings};
use crate::transform::{
    rotate, scale_alpha, transform_watermark, TRANSPARENT
};

///
/// タイル配置によるレイヤーの描画
///
/// # 注記
/// タイル用の透かしは単一配置用の変換結果から分岐し、独自の回転と不透明度が
/// 追加で適用される。
///
fn paint_tiles(layer: &mut RgbaImage, watermark: RgbaImage, tiling: &Tiling) {
    let mut tile = watermark;

    if tiling.rotation != 0 {
        tile = rotate(tile, tiling.rotation);
    }

    let tile = scale_alpha(tile, tiling.opacity);
    let (width, height) = layer.dimensions();

    let mut count = 0usize;
    for (x, y) in tile_origins(
        width,
        height,
        tile.width(),
        tile.height(),
        tiling.spacing_x,
        tiling.spacing_y,
    ) {
        overlay(layer, &tile, x, y);
        count += 1;
    }

    debug!(tiles = count, tile_size = ?tile.dimensions(), "tiled watermark");
}

///
/// 単一配置によるレイヤーの描画
///
fn paint_single(
    layer: &mut RgbaImage,
    watermark: RgbaImage,
    settings: &WatermarkSettings,
) {
    let watermark = decorate(watermark, settings);
    let (width, height) = layer.dimensions();

    // 配置は装飾適用後のサイズで算出する
    let (x, y) = compute_position(
        width,
        height,
        watermark.width(),
        watermark.height(),
        settings.position,
    );

    debug!(x, y, size = ?watermark.dimensions(), "place watermark");

    overlay(layer, &watermark, x, y);
}

///
/// アルファチャネルの破棄
///
/// # 注記
/// RGB値はそのまま残すため、透明だった画素の色は不定となる。
///
fn drop_alpha(image: RgbaImage) -> RgbImage {
    let (width, height) = image.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        image::Rgb([r, g, b])
    })
}

///
/// 透かしの合成
///
/// # 引数
/// * `base` - ベース画像
/// * `watermark` - 透かし画像
/// * `settings` - 正規化済みの設定
///
/// # 戻り値
/// 合成に成功した場合は合成結果を`Ok()`でラップして返す。出力フォーマット
/// がアルファを持たない場合(JPEG)はRGB画像、それ以外はRGBA画像となる。
///
/// # 注記
/// 入力の画像には一切手を加えず、同じ入力に対しては常に同じ結果を返す。透か
/// しがベース画像より大きい場合も失敗とはせず、はみ出した部分を切り捨てる。
///
pub fn compose(
    base: &DynamicImage,
    watermark: &DynamicImage,
    settings: &WatermarkSettings,
) -> Result<DynamicImage> {
    let mut image = base.to_rgba8();
    let wm = watermark.to_rgba8();
    let (width, height) = image.dimensions();

    /*
     * 透かしの変換
     */
    let target = compute_size(
        width,
        height,
        wm.width(),
        wm.height(),
        settings.sizing,
        settings.maintain_aspect,
    );

    let wm = transform_watermark(wm, settings, target)?;

    /*
     * レイヤーへの描画
     */
    let mut layer = RgbaImage::from_pixel(width, height, TRANSPARENT);

    match &settings.tiling {
        Some(tiling) => paint_tiles(&mut layer, wm, tiling),
        None => paint_single(&mut layer, wm, settings),
    }

    /*
     * ベース画像への合成
     */
    overlay(&mut image, &layer, 0, 0);

    if settings.output_format.has_alpha() {
        Ok(DynamicImage::ImageRgba8(image))
    } else {
        Ok(DynamicImage::ImageRgb8(drop_alpha(image)))
    }
}
