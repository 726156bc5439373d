/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 透かしの装飾(背景ボックス・枠線・ドロップシャドウ)
//!
//! 各装飾は一回り大きなキャンバスを生成し、その上に直前の結果を貼り付ける。
//! 適用順は常に 背景 → 枠線 → 影 で、後段は前段の外接矩形を入力として扱う。
//!

use image::{Rgba, RgbaImage};
use image::imageops::overlay;
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use tracing::debug;

use crate::settings::{Background, Border, Shadow, WatermarkSettings};
use crate::transform::{blur, TRANSPARENT};

///
/// 装飾の種別
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decoration {
    /// 背景ボックス
    Background(Background),

    /// 枠線
    Border(Border),

    /// ドロップシャドウ(透かしはキャンバス内の(ぼかし半径+|ox|, ぼかし半径+|oy|)
    /// に置かれ、影はそこから(ox, oy)ずらした位置に描かれる)
    Shadow(Shadow),
}

impl Decoration {
    ///
    /// 装飾適用後のサイズ
    ///
    /// # 引数
    /// * `width` - 装飾前の幅
    /// * `height` - 装飾前の高さ
    ///
    /// # 戻り値
    /// 装飾適用後のキャンバスの幅と高さを返す。
    ///
    pub fn grown_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self {
            Self::Background(bg) => {
                (width + bg.padding * 2, height + bg.padding * 2)
            }

            Self::Border(border) => {
                (width + border.width * 2, height + border.width * 2)
            }

            Self::Shadow(shadow) => (
                width + shadow.offset_x.unsigned_abs() * 2
                    + shadow.blur_radius * 2,
                height + shadow.offset_y.unsigned_abs() * 2
                    + shadow.blur_radius * 2,
            ),
        }
    }

    ///
    /// 装飾の適用
    ///
    /// # 引数
    /// * `image` - 装飾対象の画像
    ///
    /// # 戻り値
    /// 装飾を適用した新しい画像を返す。
    ///
    pub fn apply(&self, image: RgbaImage) -> RgbaImage {
        let (width, height) = self.grown_size(image.width(), image.height());

        debug!(
            decoration = ?self,
            from = ?image.dimensions(),
            to = ?(width, height),
            "decorate"
        );

        match self {
            Self::Background(bg) => {
                let mut canvas = RgbaImage::from_pixel(width, height, bg.color);
                let pad = bg.padding as i64;

                overlay(&mut canvas, &image, pad, pad);
                canvas
            }

            Self::Border(border) => {
                let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);
                draw_frame(&mut canvas, border.width, border.color);

                let inset = border.width as i64;
                overlay(&mut canvas, &image, inset, inset);
                canvas
            }

            Self::Shadow(shadow) => {
                let blur_radius = shadow.blur_radius as i64;
                let wm_x = blur_radius + shadow.offset_x.unsigned_abs() as i64;
                let wm_y = blur_radius + shadow.offset_y.unsigned_abs() as i64;

                let alpha = (255 * shadow.opacity as u32 / 100) as u8;
                let mut canvas = RgbaImage::from_pixel(width, height, TRANSPARENT);

                draw_filled_rect_mut(
                    &mut canvas,
                    Rect::at(
                        (wm_x + shadow.offset_x as i64) as i32,
                        (wm_y + shadow.offset_y as i64) as i32,
                    ).of_size(image.width(), image.height()),
                    Rgba([0, 0, 0, alpha]),
                );

                let mut canvas = blur(canvas, shadow.blur_radius as f32);
                overlay(&mut canvas, &image, wm_x, wm_y);
                canvas
            }
        }
    }
}

///
/// キャンバスの外周に指定幅の枠を描画する
///
fn draw_frame(canvas: &mut RgbaImage, stroke: u32, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let inner = height.saturating_sub(stroke * 2);

    // 上辺・下辺
    draw_filled_rect_mut(canvas, Rect::at(0, 0).of_size(width, stroke), color);
    draw_filled_rect_mut(
        canvas,
        Rect::at(0, (height - stroke) as i32).of_size(width, stroke),
        color,
    );

    // 左辺・右辺
    if inner > 0 {
        draw_filled_rect_mut(
            canvas,
            Rect::at(0, stroke as i32).of_size(stroke, inner),
            color,
        );
        draw_filled_rect_mut(
            canvas,
            Rect::at((width - stroke) as i32, stroke as i32)
                .of_size(stroke, inner),
            color,
        );
    }
}

///
/// 設定から装飾のリストを生成する
///
/// # 戻り値
/// 有効な装飾を適用順(背景 → 枠線 → 影)に並べたリストを返す。
///
pub fn decorations(settings: &WatermarkSettings) -> Vec<Decoration> {
    [
        settings.background.map(Decoration::Background),
        settings.border.map(Decoration::Border),
        settings.shadow.map(Decoration::Shadow),
    ]
    .into_iter()
    .flatten()
    .collect()
}

///
/// 透かしへの装飾の適用
///
/// # 引数
/// * `image` - 変換チェーン適用後の透かし画像
/// * `settings` - 正規化済みの設定
///
/// # 戻り値
/// 全ての装飾を順に適用した画像を返す。装飾が無い場合は入力がそのまま返る。
///
pub fn decorate(image: RgbaImage, settings: &WatermarkSettings) -> RgbaImage {
    decorations(settings)
        .iter()
        .fold(image, |image, decoration| decoration.apply(image))
}
