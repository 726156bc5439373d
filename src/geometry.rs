/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 透かしのサイズと配置座標の算出
//!

use crate::settings::{Position, PresetPosition, Sizing, MAX_DIMENSION};

///
/// 透かしの目標サイズの算出
///
/// # 引数
/// * `base_width` - ベース画像の幅
/// * `base_height` - ベース画像の高さ
/// * `wm_width` - 透かし画像の幅
/// * `wm_height` - 透かし画像の高さ
/// * `sizing` - サイズ決定方法
/// * `maintain_aspect` - 百分率指定時にアスペクト比を維持するか否か
///
/// # 戻り値
/// 目標サイズの幅と高さをパックしたタプルを返す。
///
/// # 注記
/// 端数は切り捨て、結果は最小でも1×1になる。固定幅・固定高さ指定では
/// `maintain_aspect`に関係無く常にアスペクト比が維持される。アスペクト比から
/// 導出した辺も含め、各辺は`MAX_DIMENSION`を上限として丸められる(この場合は
/// アスペクト比が崩れる)。
///
pub fn compute_size(
    base_width: u32,
    base_height: u32,
    wm_width: u32,
    wm_height: u32,
    sizing: Sizing,
    maintain_aspect: bool,
) -> (u32, u32) {
    let wm_width = wm_width.max(1) as f64;
    let wm_height = wm_height.max(1) as f64;

    let (width, height) = match sizing {
        Sizing::Percentage(percent) => {
            let width = (base_width as u64 * percent as u64 / 100).max(1);
            let height = if maintain_aspect {
                (width as f64 * wm_height / wm_width) as u64
            } else {
                base_height as u64 * percent as u64 / 100
            };

            (width, height)
        }

        Sizing::FixedWidth(width) => {
            (width as u64, (width as f64 * wm_height / wm_width) as u64)
        }

        Sizing::FixedHeight(height) => {
            ((height as f64 * wm_width / wm_height) as u64, height as u64)
        }

        Sizing::Custom {width, height} => (width as u64, height as u64),
    };

    (
        width.clamp(1, MAX_DIMENSION as u64) as u32,
        height.clamp(1, MAX_DIMENSION as u64) as u32,
    )
}

///
/// 透かしの配置座標の算出
///
/// # 引数
/// * `base_width` - ベース画像の幅
/// * `base_height` - ベース画像の高さ
/// * `wm_width` - 透かし画像の幅(装飾適用後)
/// * `wm_height` - 透かし画像の高さ(装飾適用後)
/// * `position` - 配置方法
///
/// # 戻り値
/// 透かしの左上の座標を返す。座標は`clamp_position()`で画像内に収められて
/// いる。
///
/// # 注記
/// プリセットは角または辺を基準にするが、任意位置指定は透かしの中心を基準に
/// する。
///
pub fn compute_position(
    base_width: u32,
    base_height: u32,
    wm_width: u32,
    wm_height: u32,
    position: Position,
) -> (i64, i64) {
    let (bw, bh) = (base_width as i64, base_height as i64);
    let (w, h) = (wm_width as i64, wm_height as i64);

    let (x, y) = match position {
        Position::Preset {preset, margin_x, margin_y} => {
            let (mx, my) = (margin_x as i64, margin_y as i64);
            let right = bw - w - mx;
            let bottom = bh - h - my;
            let center_x = (bw - w).div_euclid(2);
            let center_y = (bh - h).div_euclid(2);

            match preset {
                PresetPosition::BottomRight => (right, bottom),
                PresetPosition::BottomLeft => (mx, bottom),
                PresetPosition::TopRight => (right, my),
                PresetPosition::TopLeft => (mx, my),
                PresetPosition::Center => (center_x, center_y),
                PresetPosition::BottomCenter => (center_x, bottom),
                PresetPosition::TopCenter => (center_x, my),
                PresetPosition::LeftCenter => (mx, center_y),
                PresetPosition::RightCenter => (right, center_y),
            }
        }

        Position::Custom {x_percent, y_percent} => (
            bw * x_percent as i64 / 100 - w / 2,
            bh * y_percent as i64 / 100 - h / 2,
        ),
    };

    clamp_position(base_width, base_height, wm_width, wm_height, x, y)
}

///
/// 配置座標を画像内に収める
///
/// # 注記
/// 透かしがベース画像より大きい場合は0に張り付き、はみ出した部分は貼り付け
/// 時に切り捨てられる。
///
pub fn clamp_position(
    base_width: u32,
    base_height: u32,
    wm_width: u32,
    wm_height: u32,
    x: i64,
    y: i64,
) -> (i64, i64) {
    let max_x = base_width as i64 - wm_width as i64;
    let max_y = base_height as i64 - wm_height as i64;

    (x.min(max_x).max(0), y.min(max_y).max(0))
}

///
/// タイル配置の各原点座標の列挙
///
/// # 引数
/// * `base_width` - ベース画像の幅
/// * `base_height` - ベース画像の高さ
/// * `tile_width` - タイル画像の幅
/// * `tile_height` - タイル画像の高さ
/// * `spacing_x` - 水平方向の配置間隔(0は1として扱う)
/// * `spacing_y` - 垂直方向の配置間隔(0は1として扱う)
///
/// # 戻り値
/// `(-tile_width, -tile_height)`から`(base_width + tile_width,
/// base_height + tile_height)`の手前までを間隔ごとに刻んだ座標を行優先で返す
/// イテレータ。
///
pub fn tile_origins(
    base_width: u32,
    base_height: u32,
    tile_width: u32,
    tile_height: u32,
    spacing_x: u32,
    spacing_y: u32,
) -> impl Iterator<Item = (i64, i64)> {
    let (tw, th) = (tile_width as i64, tile_height as i64);
    let end_x = base_width as i64 + tw;
    let end_y = base_height as i64 + th;
    let step_x = spacing_x.max(1) as usize;
    let step_y = spacing_y.max(1) as usize;

    (-th..end_y)
        .step_by(step_y)
        .flat_map(move |y| {
            (-tw..end_x).step_by(step_x).map(move |x| (x, y))
        })
}
