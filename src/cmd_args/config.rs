/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! コンフィギュレーションファイル関連の処理をまとめたモジュール
//!

use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;
use watermark_studio::RawSettings;

///
/// コンフィギュレーションデータを集約する構造体
///
#[derive(Debug, Default, Deserialize)]
pub(super) struct Config {
    /// 透かし関連の設定情報の格納先
    watermark: Option<WatermarkInfo>,

    /// 出力関連の設定情報の格納先
    output: Option<OutputInfo>,
}

impl Config {
    ///
    /// 透かし画像ファイルへのパスへのアクセサ
    ///
    pub(super) fn watermark_file_path(&self) -> Option<PathBuf> {
        self.watermark
            .as_ref()
            .and_then(|watermark| watermark.file_path.as_ref())
            .cloned()
    }

    ///
    /// 透かし設定へのアクセサ
    ///
    /// # 注記
    /// `[watermark]`テーブルが無い場合は全項目が未設定の束を返す。
    ///
    pub(super) fn settings(&self) -> RawSettings {
        self.watermark
            .as_ref()
            .map(|watermark| watermark.settings.clone())
            .unwrap_or_default()
    }

    ///
    /// 出力先へのアクセサ
    ///
    pub(super) fn output_path(&self) -> Option<PathBuf> {
        self.output
            .as_ref()
            .and_then(|output| output.output_path.as_ref())
            .cloned()
    }

    ///
    /// 出力ファイル名の接頭辞へのアクセサ
    ///
    pub(super) fn prefix(&self) -> Option<String> {
        self.output
            .as_ref()
            .and_then(|output| output.prefix.as_ref())
            .cloned()
    }

    ///
    /// 並列数へのアクセサ
    ///
    pub(super) fn jobs(&self) -> Option<usize> {
        self.output.as_ref().and_then(|output| output.jobs)
    }
}

///
/// 透かし関連の設定を格納する構造体
///
#[derive(Debug, Deserialize)]
pub struct WatermarkInfo {
    /// 透かしに使用する画像ファイルへのパス
    file_path: Option<PathBuf>,

    /// 透かしの合成設定(テーブル直下に展開して記述する)
    #[serde(flatten)]
    settings: RawSettings,
}

///
/// 出力関連の設定を格納する構造体
///
#[derive(Debug, Deserialize)]
pub struct OutputInfo {
    /// 出力先
    output_path: Option<PathBuf>,

    /// 出力ファイル名の接頭辞
    prefix: Option<String>,

    /// 並列数
    jobs: Option<usize>,
}

///
/// コンフィギュレーションファイルの読み込み
///
pub(super) fn read<P>(path: P) -> Result<Config>
where
    P: AsRef<Path>
{
    Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
}
