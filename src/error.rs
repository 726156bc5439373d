/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! エラー型の定義
//!

use std::path::PathBuf;

use thiserror::Error;

///
/// ライブラリ内で共通に使用するResult型
///
pub type Result<T> = std::result::Result<T, WatermarkError>;

///
/// 透かし処理で発生するエラー
///
/// # 注記
/// 設定エラーは画像処理の開始前に、デコード/エンコードのエラーは入出力の境界
/// でのみ発生する。合成処理そのものが失敗するのはリサイズ処理が拒否した場合
/// に限られる。
///
#[derive(Debug, Error)]
pub enum WatermarkError {
    /// 設定値が範囲外、または排他的な設定が同時に指定された
    #[error("invalid configuration: {0}")]
    Config(String),

    /// 画像データのデコードに失敗した
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// 画像データのエンコードに失敗した
    #[error("failed to encode image as {format}: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },

    /// リサイズ処理の失敗
    #[error("failed to resize watermark: {0}")]
    Resize(String),

    /// ファイル入出力の失敗
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// ZIPアーカイブの生成に失敗した
    #[error("failed to build archive: {0}")]
    Archive(String),

    /// ワーカースレッドの起動に失敗した
    #[error("failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl WatermarkError {
    pub(crate) fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub(crate) fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    pub(crate) fn encode<S>(format: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::Encode {format, message: msg.into()}
    }

    ///
    /// 設定エラーか否かの判定
    ///
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
