/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! プログラムのエントリポイント
//!

mod cmd_args;

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::EnvFilter;
use watermark_studio::batch::{
    self, discover_inputs, run_batch, BatchOptions, BatchReport,
};

use cmd_args::Options;

///
/// プログラムのエントリポイント
///
fn main() {
    /*
     * ログ出力の初期化
     */
    init_logger();

    /*
     * コマンドラインオプションのパース
     */
    let opts = match cmd_args::parse() {
        Ok(opts) => opts,
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        },
    };

    if opts.is_show_options() {
        opts.show_options();
        std::process::exit(0);
    }

    /*
     * 実行関数の呼び出し
     */
    match run(opts) {
        Ok(true) => {}

        // 一部の画像の処理に失敗した
        Ok(false) => std::process::exit(2),

        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(1);
        }
    }
}

///
/// ログ出力の初期化
///
/// # 注記
/// 出力レベルは環境変数`RUST_LOG`で指定する(既定は`warn`)。
///
fn init_logger() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

///
/// プログラムの実行関数
///
/// # 引数
/// * `opts` - オプション情報をパックしたオブジェクト
///
/// # 戻り値
/// 全ての画像を処理できた場合は`Ok(true)`を、一部の画像で失敗または中断が
/// あった場合は`Ok(false)`を返す。処理全体が失敗した場合はエラー情報を
/// `Err()`でラップして返す。
///
fn run(opts: Arc<Options>) -> Result<bool> {
    /*
     * 中断要求(SIGINT)の受付
     */
    let cancel = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(
        signal_hook::consts::SIGINT,
        Arc::clone(&cancel)
    )?;

    /*
     * 処理対象のリストアップ
     */
    let zip_path = opts.zip_path();

    if let Some(path) = &zip_path {
        if path.exists() && !opts.is_force() {
            return Err(anyhow!("{} is already exists", path.display()));
        }
    }

    let inputs: Vec<PathBuf> = discover_inputs(&opts.inputs());

    /*
     * 一括処理
     */
    let report = run_batch(
        &inputs,
        opts.watermark_image(),
        opts.settings(),
        &BatchOptions {
            prefix: opts.prefix(),
            jobs: opts.jobs(),
        },
        &cancel,
    )?;

    /*
     * 処理結果の書き込み
     */
    match &zip_path {
        Some(path) => write_archive(path, &report)?,
        None => write_files(&opts.output_path(), &report, opts.is_force())?,
    }

    for failure in report.failures.iter() {
        eprintln!("{} => failed ({})", failure.source.display(), failure.error);
    }

    if report.cancelled > 0 {
        eprintln!("interrupted: {} file(s) not processed", report.cancelled);
    }

    Ok(report.is_complete())
}

///
/// 処理結果の個別ファイルへの書き込み
///
/// # 引数
/// * `output_dir` - 出力先ディレクトリ
/// * `report` - 一括処理の結果
/// * `force` - 既存ファイルを上書きするか否か
///
/// # 注記
/// 既存ファイルの判定は重複解消後の最終的なファイル名で行う。強制書き込みが
/// 指定されていない場合、既に存在するファイルは書き込まずにスキップする。
///
fn write_files(output_dir: &Path, report: &BatchReport, force: bool)
    -> Result<()>
{
    for output in report.outputs.iter() {
        let output_path = output_dir.join(&output.name);

        if output_path.exists() && !force {
            eprintln!(
                "{} => {} skip (already exist)",
                output.source.display(),
                output_path.display()
            );
            continue;
        }

        std::fs::write(&output_path, &output.data)
            .with_context(|| output_path.display().to_string())?;

        println!("{} => {}", output.source.display(), output_path.display());
    }

    Ok(())
}

///
/// 処理結果のZIPアーカイブへの書き込み
///
fn write_archive(path: &Path, report: &BatchReport) -> Result<()> {
    if report.outputs.is_empty() {
        eprintln!("no file to archive");
        return Ok(());
    }

    let writer = BufWriter::new(
        File::create(path).with_context(|| path.display().to_string())?
    );

    batch::write_zip(writer, &report.outputs)?;

    for output in report.outputs.iter() {
        println!(
            "{} => {}:{}",
            output.source.display(),
            path.display(),
            output.name
        );
    }

    Ok(())
}
