/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 透かし設定の正規形をまとめたモジュール
//!
//! 利用者から受け取った設定の束(`RawSettings`)は`resolve()`で検証され、以降
//! は読み取り専用の`WatermarkSettings`として合成処理に渡される。
//!

mod raw;

use std::fmt::Display;
use std::str::FromStr;

use clap::ValueEnum;
use image::Rgba;
use serde::Deserialize;

use crate::error::{Result, WatermarkError};

pub use raw::{
    RawBackground, RawBorder, RawColorAdjust, RawSettings, RawShadow,
    RawTiling,
};

/// 幅・高さ・マージン等に許容する最大ピクセル数
pub const MAX_DIMENSION: u32 = 16384;

/// WEBP出力時の品質(固定)
pub const WEBP_QUALITY: f32 = 95.0;

///
/// 透かしのサイズ決定方法
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sizing {
    /// ベース画像の幅に対する百分率
    Percentage(u32),

    /// 幅を固定(高さはアスペクト比から算出)
    FixedWidth(u32),

    /// 高さを固定(幅はアスペクト比から算出)
    FixedHeight(u32),

    /// 幅と高さをそのまま指定
    Custom {
        width: u32,
        height: u32,
    },
}

///
/// 透かしの配置プリセット
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "SCREAMING-KEBAB-CASE")]
pub enum PresetPosition {
    /// 右下
    BottomRight,

    /// 左下
    BottomLeft,

    /// 右上
    TopRight,

    /// 左上
    TopLeft,

    /// 画像中央
    Center,

    /// 下辺中央
    BottomCenter,

    /// 上辺中央
    TopCenter,

    /// 左辺中央
    LeftCenter,

    /// 右辺中央
    RightCenter,
}

// Displayトレイトの実装
impl Display for PresetPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", match self {
            Self::BottomRight => "BOTTOM-RIGHT",
            Self::BottomLeft => "BOTTOM-LEFT",
            Self::TopRight => "TOP-RIGHT",
            Self::TopLeft => "TOP-LEFT",
            Self::Center => "CENTER",
            Self::BottomCenter => "BOTTOM-CENTER",
            Self::TopCenter => "TOP-CENTER",
            Self::LeftCenter => "LEFT-CENTER",
            Self::RightCenter => "RIGHT-CENTER",
        })
    }
}

///
/// 透かしの配置方法
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// プリセット位置(角または辺を基準にマージン分内側へ寄せる)
    Preset {
        preset: PresetPosition,
        margin_x: u32,
        margin_y: u32,
    },

    /// 透かしの中心を画像サイズに対する百分率で指定
    Custom {
        x_percent: u32,
        y_percent: u32,
    },
}

/// ぼかし効果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blur {
    pub radius: f32,
}

///
/// ドロップシャドウ
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shadow {
    /// 透かしに対する影の水平方向のずれ
    pub offset_x: i32,

    /// 透かしに対する影の垂直方向のずれ
    pub offset_y: i32,

    /// 影のぼかし半径
    pub blur_radius: u32,

    /// 影の不透明度(百分率)
    pub opacity: u8,
}

/// 枠線
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
    pub width: u32,
    pub color: Rgba<u8>,
}

///
/// 背景ボックス
///
/// # 注記
/// `color`のアルファ値には背景の不透明度が反映済みである。
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background {
    pub color: Rgba<u8>,
    pub padding: u32,
}

///
/// タイル状の繰り返し配置
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tiling {
    /// 水平方向の配置間隔
    pub spacing_x: u32,

    /// 垂直方向の配置間隔
    pub spacing_y: u32,

    /// タイル用の追加回転角(度)
    pub rotation: i32,

    /// タイル用の追加不透明度(百分率)
    pub opacity: u8,
}

///
/// 色調整の係数
///
/// # 注記
/// いずれも乗算係数で、1.0で変化無し、0.0でそれぞれ黒・灰一色・無彩色になる。
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAdjust {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

///
/// 出力フォーマット
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OutputFormat {
    /// PNG (可逆、アルファ保持)
    Png,

    /// JPEG (非可逆、アルファ破棄)
    #[value(alias = "jpg")]
    Jpeg,

    /// WEBP (非可逆、品質固定)
    Webp,
}

impl OutputFormat {
    ///
    /// 出力ファイルの拡張子
    ///
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
        }
    }

    /// MIMEタイプ
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    ///
    /// アルファチャネルを保持できるか否か
    ///
    pub fn has_alpha(&self) -> bool {
        !matches!(self, Self::Jpeg)
    }

    pub(crate) fn name(&self) -> &'static str {
        match self {
            Self::Png => "PNG",
            Self::Jpeg => "JPEG",
            Self::Webp => "WEBP",
        }
    }
}

// Displayトレイトの実装
impl Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

// FromStrトレイトの実装
impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

///
/// 正規化済みの透かし設定
///
/// # 注記
/// 一回の処理実行ごとに一度だけ生成され、以降は読み取り専用として扱う。
/// タイル配置が有効な場合、`position`と各装飾(背景・枠線・影)は使用されない。
///
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkSettings {
    /// サイズ決定方法
    pub sizing: Sizing,

    /// 百分率指定時にアスペクト比を維持するか否か
    pub maintain_aspect: bool,

    /// 配置方法
    pub position: Position,

    /// 不透明度(百分率)
    pub opacity: u8,

    /// 回転角(度、反時計回り)
    pub rotation: i32,

    pub blur: Option<Blur>,
    pub shadow: Option<Shadow>,
    pub border: Option<Border>,
    pub background: Option<Background>,
    pub tiling: Option<Tiling>,
    pub color_adjust: Option<ColorAdjust>,

    /// 出力フォーマット
    pub output_format: OutputFormat,

    /// JPEG出力時の品質(JPEG以外では無視される)
    pub jpeg_quality: u8,
}

// Defaultトレイトの実装
impl Default for WatermarkSettings {
    fn default() -> Self {
        Self {
            sizing: Sizing::Percentage(raw::DEFAULT_SCALE_PERCENT),
            maintain_aspect: true,
            position: Position::Preset {
                preset: PresetPosition::BottomRight,
                margin_x: raw::DEFAULT_MARGIN,
                margin_y: raw::DEFAULT_MARGIN,
            },
            opacity: raw::DEFAULT_OPACITY,
            rotation: 0,
            blur: None,
            shadow: None,
            border: None,
            background: None,
            tiling: None,
            color_adjust: None,
            output_format: OutputFormat::Png,
            jpeg_quality: raw::DEFAULT_JPEG_QUALITY,
        }
    }
}

impl WatermarkSettings {
    ///
    /// 設定の束から正規化済み設定を生成する
    ///
    /// # 引数
    /// * `raw` - 利用者から受け取った未検証の設定
    ///
    /// # 戻り値
    /// 検証に成功した場合は正規化済みの設定を`Ok()`でラップして返す。範囲外の
    /// 値や排他的な設定の同時指定があった場合は`WatermarkError::Config`を返す。
    ///
    pub fn resolve(raw: &RawSettings) -> Result<Self> {
        raw.resolve()
    }
}

///
/// 16進表記の色指定のパース
///
/// # 引数
/// * `s` - `#RGB`または`#RRGGBB`形式の文字列
///
/// # 戻り値
/// パースに成功した場合は不透明の色を`Ok()`でラップして返す。
///
pub fn parse_hex_color(s: &str) -> Result<Rgba<u8>> {
    let hex = s.strip_prefix('#').ok_or_else(|| {
        WatermarkError::config(format!("color must start with '#': {}", s))
    })?;

    if !hex.is_ascii() {
        return Err(WatermarkError::config(format!("invalid color: {}", s)));
    }

    let digit = |part: &str| {
        u8::from_str_radix(part, 16).map_err(|_| {
            WatermarkError::config(format!("invalid hex digit in color: {}", s))
        })
    };

    match hex.len() {
        3 => Ok(Rgba([
            digit(&hex[0..1])? * 17,
            digit(&hex[1..2])? * 17,
            digit(&hex[2..3])? * 17,
            255,
        ])),

        6 => Ok(Rgba([
            digit(&hex[0..2])?,
            digit(&hex[2..4])?,
            digit(&hex[4..6])?,
            255,
        ])),

        _ => Err(WatermarkError::config(format!(
            "color must be #RGB or #RRGGBB: {}",
            s
        ))),
    }
}
