/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 画像への透かし合成エンジン
//!
//! 処理は 設定の正規化 → サイズ・配置の算出 → 透かしの変換 → 装飾 → 合成
//! → エンコード の順に進む。合成処理(`compose()`)自体は純粋な関数で、ファ
//! イルやネットワークへのアクセスは`codec`と`batch`に閉じ込めている。
//!

pub mod batch;
pub mod codec;
pub mod compositor;
pub mod decoration;
pub mod error;
pub mod geometry;
pub mod settings;
pub mod transform;

pub use compositor::compose;
pub use error::{Result, WatermarkError};
pub use settings::{
    Background, Blur, Border, ColorAdjust, OutputFormat, Position,
    PresetPosition, RawSettings, Shadow, Sizing, Tiling, WatermarkSettings,
};
