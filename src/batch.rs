/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! 複数画像に対する一括処理
//!
//! 画像同士に依存関係は無いため、ワーカープール上で並列に処理する。個々の画
//! 像の失敗は記録した上で残りの処理を続行する。
//!

use std::collections::HashSet;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDateTime;
use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::codec;
use crate::compositor::compose;
use crate::error::{Result, WatermarkError};
use crate::settings::{OutputFormat, WatermarkSettings};

/// 入力として受け付ける拡張子
const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "webp", "bmp", "tif", "tiff", "gif"
];

/// ファイル名の既定の接頭辞
pub const DEFAULT_PREFIX: &str = "watermarked_";

///
/// 一括処理のオプション
///
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 出力ファイル名の接頭辞
    pub prefix: String,

    /// 並列数(0の場合は利用可能なCPU数)
    pub jobs: usize,
}

// Defaultトレイトの実装
impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            jobs: 0,
        }
    }
}

///
/// 処理に成功した画像
///
#[derive(Debug, Clone)]
pub struct BatchOutput {
    /// 入力ファイルへのパス
    pub source: PathBuf,

    /// 出力ファイル名
    pub name: String,

    /// エンコード済みのデータ
    pub data: Vec<u8>,
}

///
/// 処理に失敗した画像
///
#[derive(Debug)]
pub struct BatchFailure {
    pub source: PathBuf,
    pub error: WatermarkError,
}

///
/// 一括処理の結果
///
/// # 注記
/// `outputs`と`failures`はいずれも入力順に並ぶ。
///
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outputs: Vec<BatchOutput>,
    pub failures: Vec<BatchFailure>,

    /// 中断要求により処理されなかった入力の数
    pub cancelled: usize,
}

impl BatchReport {
    ///
    /// 全ての入力が処理されたか否か
    ///
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.cancelled == 0
    }
}

/// 個々の入力の処理結果
enum Outcome {
    Done(BatchOutput),
    Failed(BatchFailure),
    Cancelled,
}

///
/// 出力ファイル名の生成
///
/// # 引数
/// * `prefix` - 接頭辞
/// * `source` - 入力ファイルへのパス
/// * `format` - 出力フォーマット
///
/// # 戻り値
/// `"{prefix}{basename}.{ext}"`形式のファイル名を返す。`basename`は入力ファ
/// イル名から最後の拡張子を除いたもの。
///
pub fn output_file_name(prefix: &str, source: &Path, format: OutputFormat)
    -> String
{
    let stem = source.file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();

    format!("{}{}.{}", prefix, stem, format.extension())
}

///
/// アーカイブの既定のファイル名
///
pub fn default_archive_name(at: NaiveDateTime) -> String {
    format!("watermarked_batch_{}.zip", at.format("%Y%m%d_%H%M%S"))
}

///
/// 画像ファイルか否かの判定(拡張子による)
///
fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

///
/// 入力ファイルのリストアップ
///
/// # 引数
/// * `paths` - ファイルまたはフォルダへのパスのリスト
///
/// # 戻り値
/// 処理対象のファイルへのパスのリストを返す。
///
/// # 注記
/// ファイルはそのまま、フォルダは再帰的に降下探査して画像ファイルを列挙する。
/// フォルダ内のファイルはパス名順に並べる。
///
pub fn discover_inputs(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut inputs = Vec::new();

    for path in paths.iter() {
        if path.is_dir() {
            inputs.extend(
                WalkDir::new(path)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_map(std::result::Result::ok)
                    .filter(|e| e.file_type().is_file())
                    .map(DirEntry::into_path)
                    .filter(|p| is_image_file(p))
            );
        } else {
            inputs.push(path.clone());
        }
    }

    inputs
}

///
/// 単一画像の処理(デコード → 合成 → エンコード)
///
/// # 引数
/// * `source` - 入力ファイルへのパス
/// * `watermark` - 透かし画像
/// * `settings` - 正規化済みの設定
/// * `prefix` - 出力ファイル名の接頭辞
///
/// # 戻り値
/// 処理に成功した場合は出力ファイル名とエンコード結果を`Ok()`でラップして返
/// す。
///
pub fn process_file(
    source: &Path,
    watermark: &DynamicImage,
    settings: &WatermarkSettings,
    prefix: &str,
) -> Result<BatchOutput> {
    let base = codec::open(source)?;
    let composed = compose(&base, watermark, settings)?;
    let data = codec::encode(
        &composed,
        settings.output_format,
        settings.jpeg_quality
    )?;

    Ok(BatchOutput {
        source: source.to_path_buf(),
        name: output_file_name(prefix, source, settings.output_format),
        data,
    })
}

///
/// 出力ファイル名の重複解消
///
/// # 注記
/// 拡張子違いの同名ファイル等で名前が衝突した場合、二つ目以降に`_2`、`_3`…
/// を付与する。付与後の名前も割り当て済みとして扱い、未使用の名前が見つかる
/// まで番号を進める。
///
fn make_names_unique(outputs: &mut [BatchOutput]) {
    let mut taken: HashSet<String> = HashSet::new();

    for output in outputs.iter_mut() {
        if taken.insert(output.name.clone()) {
            continue;
        }

        let renamed = (2usize..)
            .map(|n| match output.name.rsplit_once('.') {
                Some((stem, ext)) => format!("{}_{}.{}", stem, n, ext),
                None => format!("{}_{}", output.name, n),
            })
            .find(|name| !taken.contains(name))
            .unwrap_or_else(|| output.name.clone());

        debug!(from = %output.name, to = %renamed, "rename duplicate");
        taken.insert(renamed.clone());
        output.name = renamed;
    }
}

///
/// 一括処理の実行
///
/// # 引数
/// * `inputs` - 入力ファイルへのパスのリスト
/// * `watermark` - 透かし画像
/// * `settings` - 正規化済みの設定
/// * `options` - 一括処理のオプション
/// * `cancel` - 中断要求のフラグ
///
/// # 戻り値
/// 各入力の処理結果をまとめたレポートを`Ok()`でラップして返す。個々の画像の
/// 失敗はレポートに記録され、エラーとしては返らない。
///
/// # 注記
/// `cancel`がセットされると新たな画像の処理は開始されないが、処理中の画像は
/// 最後まで処理される。
///
pub fn run_batch(
    inputs: &[PathBuf],
    watermark: &DynamicImage,
    settings: &WatermarkSettings,
    options: &BatchOptions,
    cancel: &AtomicBool,
) -> Result<BatchReport> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.jobs)
        .build()?;

    let outcomes: Vec<Outcome> = pool.install(|| {
        inputs.par_iter()
            .map(|source| {
                if cancel.load(Ordering::SeqCst) {
                    return Outcome::Cancelled;
                }

                match process_file(source, watermark, settings, &options.prefix) {
                    Ok(output) => {
                        debug!(
                            source = %source.display(),
                            name = %output.name,
                            bytes = output.data.len(),
                            "processed"
                        );
                        Outcome::Done(output)
                    }

                    Err(error) => {
                        warn!(source = %source.display(), %error, "failed");
                        Outcome::Failed(BatchFailure {
                            source: source.clone(),
                            error,
                        })
                    }
                }
            })
            .collect()
    });

    let mut report = BatchReport::default();

    for outcome in outcomes {
        match outcome {
            Outcome::Done(output) => report.outputs.push(output),
            Outcome::Failed(failure) => report.failures.push(failure),
            Outcome::Cancelled => report.cancelled += 1,
        }
    }

    make_names_unique(&mut report.outputs);

    info!(
        processed = report.outputs.len(),
        failed = report.failures.len(),
        cancelled = report.cancelled,
        "batch finished"
    );

    Ok(report)
}

fn archive_error<E: std::fmt::Display>(err: E) -> WatermarkError {
    WatermarkError::Archive(err.to_string())
}

///
/// ZIPアーカイブへの書き出し
///
/// # 引数
/// * `writer` - 書き込み先
/// * `outputs` - アーカイブに格納する処理結果
///
/// # 戻り値
/// 処理に成功した場合は書き込み先を`Ok()`でラップして返す。
///
/// # 注記
/// エントリ名は出力ファイル名をそのまま使用し、deflateで圧縮する。
///
pub fn write_zip<W>(writer: W, outputs: &[BatchOutput]) -> Result<W>
where
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated);

    for output in outputs.iter() {
        zip.start_file(output.name.as_str(), options)
            .map_err(archive_error)?;
        zip.write_all(&output.data).map_err(archive_error)?;
    }

    zip.finish().map_err(archive_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};

    use chrono::NaiveDate;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        RgbaImage::from_pixel(width, height, Rgba([40, 80, 120, 255]))
            .save(&path)
            .unwrap();
        path
    }

    fn watermark() -> DynamicImage {
        DynamicImage::ImageRgba8(
            RgbaImage::from_pixel(8, 4, Rgba([255, 255, 255, 200]))
        )
    }

    #[test]
    fn file_name_template() {
        let name = output_file_name(
            "watermarked_",
            Path::new("/photos/holiday.beach.JPG"),
            OutputFormat::Webp
        );

        assert_eq!(name, "watermarked_holiday.beach.webp");
        assert_eq!(
            output_file_name("", Path::new("a.png"), OutputFormat::Jpeg),
            "a.jpeg"
        );
    }

    #[test]
    fn archive_name_uses_timestamp() {
        let at = NaiveDate::from_ymd_opt(2025, 3, 4)
            .unwrap()
            .and_hms_opt(5, 6, 7)
            .unwrap();

        assert_eq!(default_archive_name(at), "watermarked_batch_20250304_050607.zip");
    }

    #[test]
    fn discovers_images_in_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();

        write_png(dir.path(), "b.png", 2, 2);
        write_png(&nested, "a.PNG", 2, 2);
        std::fs::write(dir.path().join("notes.txt"), "hello").unwrap();

        let explicit = dir.path().join("notes.txt");
        let found = discover_inputs(&[dir.path().to_path_buf(), explicit.clone()]);

        assert_eq!(found, vec![
            dir.path().join("b.png"),
            nested.join("a.PNG"),
            explicit,
        ]);
    }

    #[test]
    fn partial_failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let good = write_png(dir.path(), "good.png", 64, 48);
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();
        let missing = dir.path().join("missing.png");

        let report = run_batch(
            &[good.clone(), broken.clone(), missing.clone()],
            &watermark(),
            &WatermarkSettings::default(),
            &BatchOptions {jobs: 2, ..Default::default()},
            &AtomicBool::new(false),
        ).unwrap();

        assert_eq!(report.outputs.len(), 1);
        assert_eq!(report.outputs[0].source, good);
        assert_eq!(report.outputs[0].name, "watermarked_good.png");

        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].source, broken);
        assert!(matches!(report.failures[0].error, WatermarkError::Decode(_)));
        assert_eq!(report.failures[1].source, missing);
        assert!(matches!(report.failures[1].error, WatermarkError::Io {..}));
        assert!(!report.is_complete());
    }

    #[test]
    fn cancelled_batch_starts_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let inputs = vec![
            write_png(dir.path(), "one.png", 10, 10),
            write_png(dir.path(), "two.png", 10, 10),
        ];

        let report = run_batch(
            &inputs,
            &watermark(),
            &WatermarkSettings::default(),
            &BatchOptions::default(),
            &AtomicBool::new(true),
        ).unwrap();

        assert!(report.outputs.is_empty());
        assert!(report.failures.is_empty());
        assert_eq!(report.cancelled, 2);
    }

    #[test]
    fn duplicate_names_get_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "photo.png", 10, 10);
        let b = dir.path().join("photo.bmp");
        RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]))
            .save(&b)
            .unwrap();

        let report = run_batch(
            &[a, b],
            &watermark(),
            &WatermarkSettings::default(),
            &BatchOptions {prefix: "wm_".into(), jobs: 1},
            &AtomicBool::new(false),
        ).unwrap();

        let names: Vec<_> = report.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["wm_photo.png", "wm_photo_2.png"]);
    }

    #[test]
    fn generated_suffix_never_matches_a_real_input() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_png(dir.path(), "photo.png", 10, 10);
        let b = dir.path().join("photo.bmp");
        RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]))
            .save(&b)
            .unwrap();
        let c = write_png(dir.path(), "photo_2.png", 10, 10);

        let report = run_batch(
            &[a, b, c],
            &watermark(),
            &WatermarkSettings::default(),
            &BatchOptions {prefix: "wm_".into(), jobs: 1},
            &AtomicBool::new(false),
        ).unwrap();

        let names: Vec<_> = report.outputs.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["wm_photo.png", "wm_photo_2.png", "wm_photo_2_2.png"]);

        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), 3);

        let cursor = write_zip(Cursor::new(Vec::new()), &report.outputs).unwrap();
        let archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner()))
            .unwrap();
        assert_eq!(archive.len(), 3);
    }

    #[test]
    fn zip_contains_every_output() {
        let outputs = vec![
            BatchOutput {
                source: PathBuf::from("a.png"),
                name: "watermarked_a.png".into(),
                data: vec![1, 2, 3, 4],
            },
            BatchOutput {
                source: PathBuf::from("b.png"),
                name: "watermarked_b.png".into(),
                data: vec![9; 1000],
            },
        ];

        let cursor = write_zip(Cursor::new(Vec::new()), &outputs).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(cursor.into_inner()))
            .unwrap();

        assert_eq!(archive.len(), 2);

        for (index, output) in outputs.iter().enumerate() {
            let mut entry = archive.by_index(index).unwrap();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();

            assert_eq!(entry.name(), output.name);
            assert_eq!(entry.compression(), CompressionMethod::Deflated);
            assert_eq!(data, output.data);
        }
    }
}
