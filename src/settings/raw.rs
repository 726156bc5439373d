/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 未検証の設定の束と、その検証・正規化処理
//!

use std::fmt::Display;
use std::ops::RangeInclusive;

use image::Rgba;
use serde::Deserialize;

use super::{
    parse_hex_color, Background, Blur, Border, ColorAdjust, OutputFormat,
    Position, PresetPosition, Shadow, Sizing, Tiling, WatermarkSettings,
    MAX_DIMENSION,
};
use crate::error::{Result, WatermarkError};

pub(super) const DEFAULT_SCALE_PERCENT: u32 = 25;
pub(super) const DEFAULT_MARGIN: u32 = 30;
pub(super) const DEFAULT_OPACITY: u8 = 60;
pub(super) const DEFAULT_JPEG_QUALITY: u8 = 95;

const DEFAULT_SHADOW_OFFSET: i32 = 3;
const DEFAULT_SHADOW_BLUR: u32 = 5;
const DEFAULT_SHADOW_OPACITY: u8 = 50;
const DEFAULT_BORDER_WIDTH: u32 = 3;
const DEFAULT_BORDER_COLOR: &str = "#FFFFFF";
const DEFAULT_BACKGROUND_COLOR: &str = "#000000";
const DEFAULT_BACKGROUND_OPACITY: u8 = 30;
const DEFAULT_BACKGROUND_PADDING: u32 = 15;
const DEFAULT_TILE_SPACING: u32 = 200;
const DEFAULT_TILE_ROTATION: i32 = -30;
const DEFAULT_TILE_OPACITY: u8 = 15;

const PERCENT: RangeInclusive<u8> = 0..=100;
const ANGLE: RangeInclusive<i32> = -180..=180;
const PIXELS: RangeInclusive<u32> = 1..=MAX_DIMENSION;
const MARGIN: RangeInclusive<u32> = 0..=MAX_DIMENSION;

///
/// 値の範囲チェック
///
fn check<T>(name: &str, value: T, range: RangeInclusive<T>) -> Result<T>
where
    T: PartialOrd + Display + Copy,
{
    if range.contains(&value) {
        Ok(value)
    } else {
        Err(WatermarkError::config(format!(
            "{} must be within {}..={} (got {})",
            name,
            range.start(),
            range.end(),
            value
        )))
    }
}

///
/// 浮動小数点値の範囲チェック(NaN・無限大も拒否する)
///
fn check_f32(name: &str, value: f32, range: RangeInclusive<f32>)
    -> Result<f32>
{
    if !value.is_finite() {
        return Err(WatermarkError::config(format!(
            "{} must be a finite number (got {})",
            name,
            value
        )));
    }

    check(name, value, range)
}

///
/// 百分率の不透明度を8bitのアルファ値に変換
///
fn percent_to_alpha(percent: u8) -> u8 {
    (255 * percent as u32 / 100) as u8
}

///
/// ドロップシャドウの設定
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawShadow {
    pub offset_x: Option<i32>,
    pub offset_y: Option<i32>,
    pub blur: Option<u32>,
    pub opacity: Option<u8>,
}

impl RawShadow {
    fn or(self, other: Self) -> Self {
        Self {
            offset_x: self.offset_x.or(other.offset_x),
            offset_y: self.offset_y.or(other.offset_y),
            blur: self.blur.or(other.blur),
            opacity: self.opacity.or(other.opacity),
        }
    }

    fn resolve(&self) -> Result<Shadow> {
        let offset = -100..=100;

        Ok(Shadow {
            offset_x: check(
                "shadow.offset_x",
                self.offset_x.unwrap_or(DEFAULT_SHADOW_OFFSET),
                offset.clone(),
            )?,
            offset_y: check(
                "shadow.offset_y",
                self.offset_y.unwrap_or(DEFAULT_SHADOW_OFFSET),
                offset,
            )?,
            blur_radius: check(
                "shadow.blur",
                self.blur.unwrap_or(DEFAULT_SHADOW_BLUR),
                0..=100,
            )?,
            opacity: check(
                "shadow.opacity",
                self.opacity.unwrap_or(DEFAULT_SHADOW_OPACITY),
                PERCENT,
            )?,
        })
    }
}

///
/// 枠線の設定
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawBorder {
    pub width: Option<u32>,
    pub color: Option<String>,
}

impl RawBorder {
    fn or(self, other: Self) -> Self {
        Self {
            width: self.width.or(other.width),
            color: self.color.or(other.color),
        }
    }

    fn resolve(&self) -> Result<Border> {
        Ok(Border {
            width: check(
                "border.width",
                self.width.unwrap_or(DEFAULT_BORDER_WIDTH),
                1..=100,
            )?,
            color: parse_hex_color(
                self.color.as_deref().unwrap_or(DEFAULT_BORDER_COLOR)
            )?,
        })
    }
}

///
/// 背景ボックスの設定
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawBackground {
    pub color: Option<String>,
    pub opacity: Option<u8>,
    pub padding: Option<u32>,
}

impl RawBackground {
    fn or(self, other: Self) -> Self {
        Self {
            color: self.color.or(other.color),
            opacity: self.opacity.or(other.opacity),
            padding: self.padding.or(other.padding),
        }
    }

    fn resolve(&self) -> Result<Background> {
        let Rgba([r, g, b, _]) = parse_hex_color(
            self.color.as_deref().unwrap_or(DEFAULT_BACKGROUND_COLOR)
        )?;

        let opacity = check(
            "background.opacity",
            self.opacity.unwrap_or(DEFAULT_BACKGROUND_OPACITY),
            PERCENT,
        )?;

        Ok(Background {
            color: Rgba([r, g, b, percent_to_alpha(opacity)]),
            padding: check(
                "background.padding",
                self.padding.unwrap_or(DEFAULT_BACKGROUND_PADDING),
                0..=1000,
            )?,
        })
    }
}

///
/// タイル配置の設定
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawTiling {
    pub spacing_x: Option<u32>,
    pub spacing_y: Option<u32>,
    pub rotation: Option<i32>,
    pub opacity: Option<u8>,
}

impl RawTiling {
    fn or(self, other: Self) -> Self {
        Self {
            spacing_x: self.spacing_x.or(other.spacing_x),
            spacing_y: self.spacing_y.or(other.spacing_y),
            rotation: self.rotation.or(other.rotation),
            opacity: self.opacity.or(other.opacity),
        }
    }

    fn resolve(&self) -> Result<Tiling> {
        Ok(Tiling {
            spacing_x: check(
                "tiling.spacing_x",
                self.spacing_x.unwrap_or(DEFAULT_TILE_SPACING),
                PIXELS,
            )?,
            spacing_y: check(
                "tiling.spacing_y",
                self.spacing_y.unwrap_or(DEFAULT_TILE_SPACING),
                PIXELS,
            )?,
            rotation: check(
                "tiling.rotation",
                self.rotation.unwrap_or(DEFAULT_TILE_ROTATION),
                ANGLE,
            )?,
            opacity: check(
                "tiling.opacity",
                self.opacity.unwrap_or(DEFAULT_TILE_OPACITY),
                PERCENT,
            )?,
        })
    }
}

///
/// 色調整の設定
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawColorAdjust {
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
}

impl RawColorAdjust {
    fn or(self, other: Self) -> Self {
        Self {
            brightness: self.brightness.or(other.brightness),
            contrast: self.contrast.or(other.contrast),
            saturation: self.saturation.or(other.saturation),
        }
    }

    fn resolve(&self) -> Result<ColorAdjust> {
        let factor = 0.0..=10.0;

        Ok(ColorAdjust {
            brightness: check_f32(
                "color_adjust.brightness",
                self.brightness.unwrap_or(1.0),
                factor.clone(),
            )?,
            contrast: check_f32(
                "color_adjust.contrast",
                self.contrast.unwrap_or(1.0),
                factor.clone(),
            )?,
            saturation: check_f32(
                "color_adjust.saturation",
                self.saturation.unwrap_or(1.0),
                factor,
            )?,
        })
    }
}

///
/// 未検証の設定の束
///
/// # 注記
/// 全ての項目は省略可能で、コンフィギュレーションファイルの`[watermark]`テー
/// ブルおよびコマンドラインオプションから構築される。装飾等のテーブルは存在
/// するだけでその機能が有効になり、テーブル内で省略された項目には既定値が適用
/// される。
///
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    /// ベース画像の幅に対する百分率
    pub scale_percent: Option<u32>,

    /// 固定幅
    pub fixed_width: Option<u32>,

    /// 固定高さ
    pub fixed_height: Option<u32>,

    /// 任意サイズの幅(`custom_height`と対で指定)
    pub custom_width: Option<u32>,

    /// 任意サイズの高さ(`custom_width`と対で指定)
    pub custom_height: Option<u32>,

    pub maintain_aspect: Option<bool>,

    /// プリセット位置
    pub position: Option<PresetPosition>,

    /// 透かし中心の水平位置(百分率、`custom_y`と対で指定)
    pub custom_x: Option<u32>,

    /// 透かし中心の垂直位置(百分率、`custom_x`と対で指定)
    pub custom_y: Option<u32>,

    pub margin_x: Option<u32>,
    pub margin_y: Option<u32>,
    pub opacity: Option<u8>,
    pub rotation: Option<i32>,

    /// ぼかし半径
    pub blur: Option<f32>,

    pub shadow: Option<RawShadow>,
    pub border: Option<RawBorder>,
    pub background: Option<RawBackground>,
    pub tiling: Option<RawTiling>,
    pub color_adjust: Option<RawColorAdjust>,

    pub output_format: Option<OutputFormat>,
    pub jpeg_quality: Option<u8>,
}

///
/// オプションテーブル同士のマージ
///
fn merge_table<T, F>(primary: Option<T>, secondary: Option<T>, or: F)
    -> Option<T>
where
    F: FnOnce(T, T) -> T,
{
    match (primary, secondary) {
        (Some(a), Some(b)) => Some(or(a, b)),
        (a, b) => a.or(b),
    }
}

impl RawSettings {
    ///
    /// 設定の束のマージ
    ///
    /// # 引数
    /// * `other` - 補完に使用する設定(優先度が低い側)
    ///
    /// # 戻り値
    /// `self`で未設定の項目を`other`の値で埋めた設定を返す。テーブル型の項目
    /// は両方に存在する場合、テーブル内の項目単位でマージされる。
    ///
    pub fn or(self, other: Self) -> Self {
        Self {
            scale_percent: self.scale_percent.or(other.scale_percent),
            fixed_width: self.fixed_width.or(other.fixed_width),
            fixed_height: self.fixed_height.or(other.fixed_height),
            custom_width: self.custom_width.or(other.custom_width),
            custom_height: self.custom_height.or(other.custom_height),
            maintain_aspect: self.maintain_aspect.or(other.maintain_aspect),
            position: self.position.or(other.position),
            custom_x: self.custom_x.or(other.custom_x),
            custom_y: self.custom_y.or(other.custom_y),
            margin_x: self.margin_x.or(other.margin_x),
            margin_y: self.margin_y.or(other.margin_y),
            opacity: self.opacity.or(other.opacity),
            rotation: self.rotation.or(other.rotation),
            blur: self.blur.or(other.blur),
            shadow: merge_table(self.shadow, other.shadow, RawShadow::or),
            border: merge_table(self.border, other.border, RawBorder::or),
            background: merge_table(
                self.background,
                other.background,
                RawBackground::or
            ),
            tiling: merge_table(self.tiling, other.tiling, RawTiling::or),
            color_adjust: merge_table(
                self.color_adjust,
                other.color_adjust,
                RawColorAdjust::or
            ),
            output_format: self.output_format.or(other.output_format),
            jpeg_quality: self.jpeg_quality.or(other.jpeg_quality),
        }
    }

    ///
    /// サイズ決定方法の確定
    ///
    fn resolve_sizing(&self) -> Result<Sizing> {
        let custom = match (self.custom_width, self.custom_height) {
            (Some(width), Some(height)) => Some((width, height)),
            (None, None) => None,
            _ => return Err(WatermarkError::config(
                "custom_width and custom_height must be given together"
            )),
        };

        let given = [
            self.scale_percent.is_some(),
            self.fixed_width.is_some(),
            self.fixed_height.is_some(),
            custom.is_some(),
        ];

        if given.iter().filter(|set| **set).count() > 1 {
            return Err(WatermarkError::config(
                "only one of scale_percent, fixed_width, fixed_height and \
                 custom_width/custom_height may be given"
            ));
        }

        if let Some(percent) = self.scale_percent {
            return Ok(Sizing::Percentage(
                check("scale_percent", percent, 1..=100)?
            ));
        }

        if let Some(width) = self.fixed_width {
            return Ok(Sizing::FixedWidth(check("fixed_width", width, PIXELS)?));
        }

        if let Some(height) = self.fixed_height {
            return Ok(Sizing::FixedHeight(
                check("fixed_height", height, PIXELS)?
            ));
        }

        if let Some((width, height)) = custom {
            return Ok(Sizing::Custom {
                width: check("custom_width", width, PIXELS)?,
                height: check("custom_height", height, PIXELS)?,
            });
        }

        Ok(Sizing::Percentage(DEFAULT_SCALE_PERCENT))
    }

    ///
    /// 配置方法の確定
    ///
    fn resolve_position(&self) -> Result<Position> {
        let custom = match (self.custom_x, self.custom_y) {
            (Some(x), Some(y)) => Some((x, y)),
            (None, None) => None,
            _ => return Err(WatermarkError::config(
                "custom_x and custom_y must be given together"
            )),
        };

        match custom {
            Some((x, y)) => {
                if self.position.is_some() {
                    return Err(WatermarkError::config(
                        "position preset and custom_x/custom_y are exclusive"
                    ));
                }

                if self.margin_x.is_some() || self.margin_y.is_some() {
                    return Err(WatermarkError::config(
                        "margins are not applicable to a custom position"
                    ));
                }

                Ok(Position::Custom {
                    x_percent: check("custom_x", x, 0..=100)?,
                    y_percent: check("custom_y", y, 0..=100)?,
                })
            }

            None => Ok(Position::Preset {
                preset: self.position.unwrap_or(PresetPosition::BottomRight),
                margin_x: check(
                    "margin_x",
                    self.margin_x.unwrap_or(DEFAULT_MARGIN),
                    MARGIN,
                )?,
                margin_y: check(
                    "margin_y",
                    self.margin_y.unwrap_or(DEFAULT_MARGIN),
                    MARGIN,
                )?,
            }),
        }
    }

    ///
    /// 設定の検証と正規化
    ///
    /// # 戻り値
    /// 検証に成功した場合は正規化済みの設定を`Ok()`でラップして返す。失敗し
    /// た場合は`WatermarkError::Config`を返す。
    ///
    /// # 注記
    /// JPEG以外の出力フォーマットが選択されている場合、`jpeg_quality`は検証の
    /// 上で既定値に置き換えられる。
    ///
    pub fn resolve(&self) -> Result<WatermarkSettings> {
        let sizing = self.resolve_sizing()?;
        let position = self.resolve_position()?;

        let output_format = self.output_format.unwrap_or(OutputFormat::Png);
        let jpeg_quality = match self.jpeg_quality {
            Some(quality) => check("jpeg_quality", quality, 60..=100)?,
            None => DEFAULT_JPEG_QUALITY,
        };

        let blur = match self.blur {
            Some(radius) => Some(Blur {
                radius: check_f32("blur", radius, 0.0..=100.0)?,
            }),
            None => None,
        };

        Ok(WatermarkSettings {
            sizing,
            maintain_aspect: self.maintain_aspect.unwrap_or(true),
            position,
            opacity: check(
                "opacity",
                self.opacity.unwrap_or(DEFAULT_OPACITY),
                PERCENT,
            )?,
            rotation: check("rotation", self.rotation.unwrap_or(0), ANGLE)?,
            blur,
            shadow: self.shadow.as_ref().map(RawShadow::resolve).transpose()?,
            border: self.border.as_ref().map(RawBorder::resolve).transpose()?,
            background: self.background
                .as_ref()
                .map(RawBackground::resolve)
                .transpose()?,
            tiling: self.tiling.as_ref().map(RawTiling::resolve).transpose()?,
            color_adjust: self.color_adjust
                .as_ref()
                .map(RawColorAdjust::resolve)
                .transpose()?,
            output_format,
            jpeg_quality: if output_format == OutputFormat::Jpeg {
                jpeg_quality
            } else {
                DEFAULT_JPEG_QUALITY
            },
        })
    }
}
