/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 画像のデコードとエンコード
//!
//! JPEGはmozjpeg、それ以外は`image`クレート(WEBPのエンコードのみ`webp`ク
//! レート)で処理する。
//!

use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage};
use image::metadata::Orientation;
use mozjpeg::{ColorSpace, Compress, Decompress};
use tracing::debug;

use crate::error::{Result, WatermarkError};
use crate::settings::{OutputFormat, WEBP_QUALITY};

///
/// libjpegのエラー(panicとして通知される)を結果型に変換する
///
fn guard_jpeg<T, F>(what: &str, f: F) -> std::io::Result<T>
where
    F: FnOnce() -> std::io::Result<T>,
{
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(_) => Err(std::io::Error::other(format!("libjpeg aborted while {}", what))),
    }
}

///
/// JPEGデータのデコード
///
/// # 引数
/// * `data` - JPEGデータ
///
/// # 戻り値
/// 処理に成功した場合はデコードした画像を`RgbImage`オブジェクトとして`Ok()`
/// でラップして返す。失敗した場合はエラー情報を`Err()`でラップして返す。
///
fn decode_jpeg(data: &[u8]) -> Result<RgbImage> {
    if !data.windows(2).any(|pair| pair == [0xFF, 0xD9]) {
        return Err(WatermarkError::decode("missing JPEG EOI marker"));
    }

    guard_jpeg("decoding", || {
        let mut decomp = Decompress::new_mem(data)?.rgb()?;

        let width = decomp.width() as u32;
        let height = decomp.height() as u32;
        let pixels = decomp.read_scanlines::<[u8; 3]>()?.concat();
        decomp.finish()?;

        RgbImage::from_raw(width, height, pixels).ok_or_else(|| {
            std::io::Error::other("invalid dimensions")
        })
    })
    .map_err(|err| WatermarkError::decode(format!("jpeg: {}", err)))
}

///
/// EXIFのOrientationタグの読み取り
///
fn exif_orientation(data: &[u8]) -> Option<Orientation> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;

    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;

    Orientation::from_exif(u8::try_from(value).ok()?)
}

///
/// 画像データのデコード
///
/// # 引数
/// * `data` - エンコード済みの画像データ
/// * `hint` - 申告されたフォーマット(データから判別できない場合に使用する)
///
/// # 戻り値
/// 処理に成功した場合はデコードした画像を`Ok()`でラップして返す。壊れたデー
/// タや未対応のフォーマットの場合は`WatermarkError::Decode`を返す。
///
/// # 注記
/// EXIFに回転情報がある場合は、正立した状態に補正してから返す。
///
pub fn decode(data: &[u8], hint: Option<ImageFormat>) -> Result<DynamicImage> {
    let format = image::guess_format(data)
        .ok()
        .or(hint)
        .ok_or_else(|| WatermarkError::decode("unknown image format"))?;

    let mut image = match format {
        ImageFormat::Jpeg => match decode_jpeg(data) {
            Ok(image) => DynamicImage::ImageRgb8(image),

            // CMYK等、mozjpegでRGBに展開できないものは`image`クレートに任せる
            Err(err) => {
                debug!(%err, "falling back to image crate");
                image::load_from_memory_with_format(data, format)
                    .map_err(|_| err)?
            }
        },

        other => image::load_from_memory_with_format(data, other)
            .map_err(|err| WatermarkError::decode(err.to_string()))?,
    };

    if let Some(orientation) = exif_orientation(data) {
        image.apply_orientation(orientation);
    }

    Ok(image)
}

///
/// 画像ファイルの読み込み
///
/// # 引数
/// * `path` - 読み込む画像ファイルへのパス
///
/// # 戻り値
/// 処理に成功した場合はデコードした画像を`Ok()`でラップして返す。
///
pub fn open<P>(path: P) -> Result<DynamicImage>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|source| WatermarkError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    decode(&data, ImageFormat::from_path(path).ok())
}

///
/// JPEGデータへのエンコード
///
/// # 引数
/// * `image` - エンコード対象のイメージデータ
/// * `quality` - 品質(0〜100)
///
/// # 戻り値
/// 処理に成功した場合はエンコード結果を`Ok()`でラップして返す。
///
fn encode_jpeg(image: &RgbImage, quality: u8) -> std::io::Result<Vec<u8>> {
    guard_jpeg("encoding", || {
        let mut comp = Compress::new(ColorSpace::JCS_RGB);
        comp.set_size(image.width() as usize, image.height() as usize);
        comp.set_quality(quality as f32);
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new())?;
        comp.write_scanlines(image.as_raw().as_slice())?;

        comp.finish()
    })
}

///
/// 画像データのエンコード
///
/// # 引数
/// * `image` - エンコード対象の画像
/// * `format` - 出力フォーマット
/// * `jpeg_quality` - JPEG出力時の品質
///
/// # 戻り値
/// 処理に成功した場合はエンコード結果を`Ok()`でラップして返す。失敗した場合
/// は`WatermarkError::Encode`を返す。
///
/// # 注記
/// JPEGではアルファチャネルを破棄する。WEBPの品質は固定値を使用する。
///
pub fn encode(image: &DynamicImage, format: OutputFormat, jpeg_quality: u8)
    -> Result<Vec<u8>>
{
    let name = format.name();

    match format {
        OutputFormat::Png => {
            let mut buf = Vec::new();

            image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                .map_err(|err| WatermarkError::encode(name, err.to_string()))?;

            Ok(buf)
        }

        OutputFormat::Jpeg => {
            encode_jpeg(&image.to_rgb8(), jpeg_quality)
                .map_err(|err| WatermarkError::encode(name, err.to_string()))
        }

        OutputFormat::Webp => {
            let rgba = image.to_rgba8();
            let encoder = webp::Encoder::from_rgba(
                rgba.as_raw(),
                rgba.width(),
                rgba.height()
            );

            let memory = encoder.encode_simple(false, WEBP_QUALITY)
                .map_err(|err| WatermarkError::encode(name, format!("{:?}", err)))?;

            Ok(memory.to_vec())
        }
    }
}
