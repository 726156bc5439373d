/*
 * Watermark Studio
 *
 *  Copyright (C) 2025 Hiroshi KUWAGATA <kgt9221@gmail.com>
 */

//!
//! コマンドラインオプション関連の処理をまとめたモジュール
//!

mod config;

use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Local;
use clap::Parser;
use directories::BaseDirs;
use image::DynamicImage;
use watermark_studio::batch::{default_archive_name, DEFAULT_PREFIX};
use watermark_studio::codec;
use watermark_studio::settings::{
    RawBackground, RawBorder, RawColorAdjust, RawShadow, RawTiling,
};
use watermark_studio::{
    OutputFormat, PresetPosition, RawSettings, WatermarkSettings,
};

///
/// デフォルトのコンフィグレーションファイルのパス情報を生成
///
/// # 戻り値
/// コンフィギュレーションファイルのパス情報。ホームディレクトリが特定でき
/// ない環境では`None`を返す。
///
fn default_config_path() -> Option<PathBuf> {
    BaseDirs::new().map(|dirs| {
        dirs.config_local_dir()
            .join(env!("CARGO_PKG_NAME"))
            .join("config.toml")
    })
}

///
/// 幅と高さの組(WxH形式)
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dimensions {
    width: u32,
    height: u32,
}

// FromStrトレイトの実装
impl FromStr for Dimensions {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (width, height) = s.split_once('x')
            .ok_or_else(|| format!("サイズ形式が不正: {}", s))?;

        let width = width
            .parse::<u32>()
            .map_err(|_| format!("幅の指定が無効: {}", width))?;

        let height = height
            .parse::<u32>()
            .map_err(|_| format!("高さの指定が無効: {}", height))?;

        Ok(Self {width, height})
    }
}

// Displayトレイトの実装
impl Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}×{}", self.width, self.height)
    }
}

///
/// 水平・垂直方向の値の組(X,Y形式)
///
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pair<T> {
    x: T,
    y: T,
}

// FromStrトレイトの実装
impl<T> FromStr for Pair<T>
where
    T: FromStr,
{
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s.split_once(',')
            .ok_or_else(|| format!("X,Y形式で指定すること: {}", s))?;

        let x = x.trim()
            .parse::<T>()
            .map_err(|_| format!("X値の指定が無効: {}", x))?;

        let y = y.trim()
            .parse::<T>()
            .map_err(|_| format!("Y値の指定が無効: {}", y))?;

        Ok(Self {x, y})
    }
}

///
/// コマンドラインオプションの情報をまとめる構造体
///
#[derive(Parser, Debug, Clone)]
#[command(
    name = "watermark-studio",
    about = "画像に透かしを合成するCLIツール",
    version,
    long_about = None,
)]
pub struct Options {
    /// コンフィギュレーションファイルのパス
    #[arg(short = 'c', long = "config-file", value_name = "FILE")]
    config_file: Option<PathBuf>,

    /// 出力先ディレクトリ
    #[arg(short = 'o', long = "output-path", value_name = "PATH")]
    output_path: Option<PathBuf>,

    /// 透かしとして使用する画像ファイルのパス
    #[arg(short = 'w', long = "watermark", value_name = "FILE")]
    watermark_path: Option<PathBuf>,

    /// 透かしの幅(ベース画像の幅に対する百分率)
    #[arg(long = "scale", value_name = "PERCENT", group = "sizing")]
    scale: Option<u32>,

    /// 透かしの幅(ピクセル数)
    #[arg(long = "fixed-width", value_name = "PIXELS", group = "sizing")]
    fixed_width: Option<u32>,

    /// 透かしの高さ(ピクセル数)
    #[arg(long = "fixed-height", value_name = "PIXELS", group = "sizing")]
    fixed_height: Option<u32>,

    /// 透かしのサイズ(WxH形式)
    ///
    /// 使用例:
    ///   --custom-size 400x300
    #[arg(long = "custom-size", value_name = "WxH", group = "sizing")]
    custom_size: Option<Dimensions>,

    /// 百分率指定時にアスペクト比を維持しない
    #[arg(long = "ignore-aspect", default_value = "false")]
    ignore_aspect: bool,

    /// 透かしの配置位置
    #[arg(short = 'p', long = "position", value_enum, ignore_case = true,
        value_name = "POSITION", conflicts_with = "anchor")]
    position: Option<PresetPosition>,

    /// 透かし中心の位置(画像サイズに対する百分率、X,Y形式)
    #[arg(long = "anchor", value_name = "X,Y", conflicts_with = "margin")]
    anchor: Option<Pair<u32>>,

    /// プリセット位置からのマージン(X,Y形式)
    #[arg(long = "margin", value_name = "X,Y")]
    margin: Option<Pair<u32>>,

    /// 不透明度(百分率)
    #[arg(long = "opacity", value_name = "PERCENT")]
    opacity: Option<u8>,

    /// 回転角(度、反時計回り)
    #[arg(long = "rotation", value_name = "DEGREES",
        allow_hyphen_values = true)]
    rotation: Option<i32>,

    /// ぼかし半径
    #[arg(long = "blur", value_name = "RADIUS")]
    blur: Option<f32>,

    /// 明るさの係数
    #[arg(long = "brightness", value_name = "FACTOR")]
    brightness: Option<f32>,

    /// コントラストの係数
    #[arg(long = "contrast", value_name = "FACTOR")]
    contrast: Option<f32>,

    /// 彩度の係数
    #[arg(long = "saturation", value_name = "FACTOR")]
    saturation: Option<f32>,

    /// ドロップシャドウを付与する
    #[arg(long = "shadow", default_value = "false")]
    shadow: bool,

    /// ドロップシャドウのずれ(X,Y形式、指定時はシャドウを有効化)
    #[arg(long = "shadow-offset", value_name = "X,Y",
        allow_hyphen_values = true)]
    shadow_offset: Option<Pair<i32>>,

    /// 枠線を付与する
    #[arg(long = "border", default_value = "false")]
    border: bool,

    /// 枠線の色(#RGBまたは#RRGGBB、指定時は枠線を有効化)
    #[arg(long = "border-color", value_name = "COLOR")]
    border_color: Option<String>,

    /// 背景ボックスを付与する
    #[arg(long = "background", default_value = "false")]
    background: bool,

    /// 背景ボックスの色(#RGBまたは#RRGGBB、指定時は背景を有効化)
    #[arg(long = "background-color", value_name = "COLOR")]
    background_color: Option<String>,

    /// 透かしをタイル状に敷き詰める
    #[arg(long = "tile", default_value = "false")]
    tile: bool,

    /// タイルの配置間隔(X,Y形式、指定時はタイル配置を有効化)
    #[arg(long = "tile-spacing", value_name = "X,Y")]
    tile_spacing: Option<Pair<u32>>,

    /// 出力フォーマット
    #[arg(short = 'F', long = "format", value_enum, ignore_case = true,
        value_name = "FORMAT")]
    format: Option<OutputFormat>,

    /// JPEG出力時の品質
    #[arg(short = 'q', long = "jpeg-quality", value_name = "QUALITY")]
    jpeg_quality: Option<u8>,

    /// 出力ファイル名の接頭辞
    #[arg(long = "prefix", value_name = "PREFIX")]
    prefix: Option<String>,

    /// 処理結果をZIPアーカイブにまとめる(ファイル名省略時は日時から生成)
    #[arg(short = 'z', long = "zip", value_name = "FILE")]
    zip: Option<Option<PathBuf>>,

    /// 並列数(0の場合はCPU数)
    #[arg(short = 'j', long = "jobs", value_name = "NUM")]
    jobs: Option<usize>,

    /// 上書き許可
    #[arg(short = 'f', long, default_value = "false")]
    force: bool,

    /// 設定情報の表示
    #[arg(short = 's', long = "show-options", default_value = "false")]
    show_options: bool,

    /// 入力ファイルまたはディレクトリ
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    #[arg(skip)]
    raw_settings: RawSettings,

    #[arg(skip)]
    settings: Option<WatermarkSettings>,

    #[arg(skip)]
    watermark_image: Option<DynamicImage>,
}

impl Options {
    ///
    /// 出力フォルダへのアクセサ
    ///
    pub(crate) fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.output_path {
            path.clone()
        } else {
            PathBuf::from(".")
        }
    }

    ///
    /// 透かし画像ファイルへのアクセサ
    ///
    /// # 注記
    /// バリデーション関数により、self.watermark_path がNoneのままこの関数が
    /// 呼ばれることが無いことが保証されている。
    ///
    pub(crate) fn watermark_path(&self) -> PathBuf {
        self.watermark_path.clone().unwrap_or_default()
    }

    ///
    /// 透かし画像へのアクセサ
    ///
    /// # 注記
    /// バリデーション関数により読み込み済みであることが保証されている。
    ///
    pub(crate) fn watermark_image(&self) -> &DynamicImage {
        self.watermark_image.as_ref().expect("validated watermark image")
    }

    ///
    /// 正規化済みの透かし設定へのアクセサ
    ///
    pub(crate) fn settings(&self) -> &WatermarkSettings {
        self.settings.as_ref().expect("validated settings")
    }

    ///
    /// 出力ファイル名の接頭辞へのアクセサ
    ///
    pub(crate) fn prefix(&self) -> String {
        self.prefix.clone().unwrap_or_else(|| DEFAULT_PREFIX.to_string())
    }

    ///
    /// 並列数へのアクセサ
    ///
    pub(crate) fn jobs(&self) -> usize {
        self.jobs.unwrap_or(0)
    }

    ///
    /// ZIPアーカイブの出力先へのアクセサ
    ///
    /// # 戻り値
    /// ZIP出力が指定されていない場合は`None`を返す。ファイル名が省略されてい
    /// る場合は現在日時から生成した名前を出力フォルダ内に配置する。
    ///
    pub(crate) fn zip_path(&self) -> Option<PathBuf> {
        self.zip.as_ref().map(|name| {
            let name = name.clone().unwrap_or_else(|| {
                PathBuf::from(default_archive_name(Local::now().naive_local()))
            });

            self.output_path().join(name)
        })
    }

    ///
    /// 強制書き込み可否のフラグへのアクセサ
    ///
    pub(crate) fn is_force(&self) -> bool {
        self.force
    }

    ///
    /// 入力ファイルリストへのアクセサ
    ///
    pub(crate) fn inputs(&self) -> Vec<PathBuf> {
        self.inputs.clone()
    }

    ///
    /// オプション情報モードか否かのフラグへのアクセサ
    ///
    /// # 戻り値
    /// オプション情報表示モードが指定されている場合は`true`が、通常モードのが
    /// 指定されている場合は`false`が返される。
    ///
    pub(crate) fn is_show_options(&self) -> bool {
        self.show_options
    }

    ///
    /// オプション設定内容の表示
    ///
    pub(crate) fn show_options(&self) {
        let config_path = if let Some(path) = &self.config_file {
            Some(path.clone())
        } else {
            default_config_path().filter(|path| path.exists())
        };

        let settings = self.settings();

        println!("config path:       {:?}", config_path);
        println!("output path:       {:?}", self.output_path());
        println!("watermark path:    {:?}", self.watermark_path());
        println!("sizing:            {:?}", settings.sizing);
        println!("maintain aspect:   {}", settings.maintain_aspect);
        println!("position:          {:?}", settings.position);
        println!("opacity:           {}%", settings.opacity);
        println!("rotation:          {}", settings.rotation);
        println!("blur:              {:?}", settings.blur);
        println!("color adjust:      {:?}", settings.color_adjust);
        println!("shadow:            {:?}", settings.shadow);
        println!("border:            {:?}", settings.border);
        println!("background:        {:?}", settings.background);
        println!("tiling:            {:?}", settings.tiling);
        println!("output format:     {}", settings.output_format);
        println!("jpeg quality:      {}", settings.jpeg_quality);
        println!("file name prefix:  {:?}", self.prefix());
        println!("jobs:              {}", self.jobs());
        println!("zip archive:       {:?}", self.zip_path());
    }

    ///
    /// コマンドラインで指定された透かし設定の抽出
    ///
    fn cli_settings(&self) -> RawSettings {
        let color_adjust = [self.brightness, self.contrast, self.saturation]
            .iter()
            .any(Option::is_some)
            .then(|| RawColorAdjust {
                brightness: self.brightness,
                contrast: self.contrast,
                saturation: self.saturation,
            });

        RawSettings {
            scale_percent: self.scale,
            fixed_width: self.fixed_width,
            fixed_height: self.fixed_height,
            custom_width: self.custom_size.map(|size| size.width),
            custom_height: self.custom_size.map(|size| size.height),
            maintain_aspect: self.ignore_aspect.then_some(false),
            position: self.position,
            custom_x: self.anchor.map(|anchor| anchor.x),
            custom_y: self.anchor.map(|anchor| anchor.y),
            margin_x: self.margin.map(|margin| margin.x),
            margin_y: self.margin.map(|margin| margin.y),
            opacity: self.opacity,
            rotation: self.rotation,
            blur: self.blur,
            shadow: (self.shadow || self.shadow_offset.is_some())
                .then(|| RawShadow {
                    offset_x: self.shadow_offset.map(|offset| offset.x),
                    offset_y: self.shadow_offset.map(|offset| offset.y),
                    ..Default::default()
                }),
            border: (self.border || self.border_color.is_some())
                .then(|| RawBorder {
                    color: self.border_color.clone(),
                    ..Default::default()
                }),
            background: (self.background || self.background_color.is_some())
                .then(|| RawBackground {
                    color: self.background_color.clone(),
                    ..Default::default()
                }),
            tiling: (self.tile || self.tile_spacing.is_some())
                .then(|| RawTiling {
                    spacing_x: self.tile_spacing.map(|spacing| spacing.x),
                    spacing_y: self.tile_spacing.map(|spacing| spacing.y),
                    ..Default::default()
                }),
            color_adjust,
            output_format: self.format,
            jpeg_quality: self.jpeg_quality,
        }
    }

    ///
    /// コンフィギュレーションの適用
    ///
    /// # 注記
    /// config.tomlを読み込みオプション情報に反映する。
    ///
    fn apply_config(&mut self) -> Result<()> {
        let path = if let Some(path) = &self.config_file {
            // オプションでコンフィギュレーションファイルのパスが指定されて
            // いる場合、そのパスに何もなければエラー
            if !path.exists() {
                return Err(anyhow!("{} is not exists", path.display()));
            }

            // 指定されたパスを返す
            Some(path.clone())
        } else {
            // 指定されていない場合はデフォルトのパスを返す
            default_config_path()
        };

        // この時点でパスに何も無い場合はコマンドラインの設定のみを使用する
        let config = match path.filter(|path| path.exists()) {
            Some(path) => {
                // 指定されたパスにあるのがファイルでなければエラー
                if !path.is_file() {
                    return Err(anyhow!("{} is not file", path.display()));
                }

                config::read(&path)
                    .map_err(|err| anyhow!("{}: {}", path.display(), err))?
            }

            None => config::Config::default(),
        };

        if self.watermark_path.is_none() {
            self.watermark_path = config.watermark_file_path();
        }

        if self.output_path.is_none() {
            self.output_path = config.output_path();
        }

        if self.prefix.is_none() {
            self.prefix = config.prefix();
        }

        if self.jobs.is_none() {
            self.jobs = config.jobs();
        }

        let cli = self.cli_settings();
        let file = mask_overridden(&cli, config.settings());
        self.raw_settings = cli.or(file);

        Ok(())
    }

    ///
    /// 設定情報のバリデーションとキャッシュの構築
    ///
    /// # 戻り値
    /// 設定情報に問題が無い場合は`Ok(())`を返す。問題があった場合はエラー情報
    /// を`Err()`でラップして返す。
    ///
    fn validate(&mut self) -> Result<()> {
        /*
         * 出力先パスの確認
         */
        if let Some(path) = &self.output_path {
            if !path.is_dir() {
                return Err(anyhow!(
                    "output path \"{}\" is not directory",
                    path.display()
                ));
            }
        }

        /*
         * 透かし画像ファイルのパスの確認
         */
        if let Some(path) = &self.watermark_path {
            if !path.is_file() {
                return Err(anyhow!(
                    "watermark file path \"{}\" is not file",
                    path.display()
                ));
            }
        } else {
            return Err(anyhow!("watermark file path is not specified"));
        }

        /*
         * 入力ファイルまたはディレクトリの確認
         */
        for path in self.inputs.iter() {
            if !(path.is_file() || path.is_dir()) {
                return Err(anyhow!(
                    "input path \"{}\" is not file or directory",
                    path.display()
                ));
            }
        }

        /*
         * 透かし設定の正規化(画像処理の開始前に設定の誤りを検出する)
         */
        self.settings = Some(WatermarkSettings::resolve(&self.raw_settings)?);

        /*
         * 透かし画像の読み込み
         */
        self.watermark_image = Some(codec::open(self.watermark_path())?);

        Ok(())
    }
}

///
/// コマンドライン側で指定された設定系統をコンフィギュレーションから除去する
///
/// # 注記
/// サイズ指定と配置指定は複数の項目の組で一つの設定を表すため、コマンドライ
/// ンで系統内のいずれかが指定された場合はコンフィギュレーション側の同じ系統
/// の項目を全て破棄する。項目単位でマージすると排他違反になるのを防ぐ。
///
fn mask_overridden(cli: &RawSettings, mut file: RawSettings) -> RawSettings {
    let cli_sizing = cli.scale_percent.is_some()
        || cli.fixed_width.is_some()
        || cli.fixed_height.is_some()
        || cli.custom_width.is_some();

    if cli_sizing {
        file.scale_percent = None;
        file.fixed_width = None;
        file.fixed_height = None;
        file.custom_width = None;
        file.custom_height = None;
    }

    if cli.custom_x.is_some() {
        file.position = None;
        file.margin_x = None;
        file.margin_y = None;
    }

    if cli.position.is_some() || cli.margin_x.is_some() {
        file.custom_x = None;
        file.custom_y = None;
    }

    file
}

///
/// コマンドライン引数のパース
///
/// # 戻り値
/// 処理に成功した場合はオプション設定をパックしたオブジェクトを`Ok()`でラップ
/// して返す。失敗した場合はエラー情報を`Err()`でラップして返す。
///
pub(crate) fn parse() -> Result<Arc<Options>> {
    let mut opts = Options::parse();

    /*
     * コンフィギュレーションファイルの適用
     */
    opts.apply_config()?;

    /*
     * 設定情報のバリデーションとキャッシュの構築
     */
    opts.validate()?;

    /*
     * 設定情報の返却
     */
    Ok(Arc::new(opts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_parse() {
        let size: Dimensions = "400x300".parse().unwrap();
        assert_eq!(size, Dimensions {width: 400, height: 300});

        assert!("400".parse::<Dimensions>().is_err());
        assert!("ax300".parse::<Dimensions>().is_err());
    }

    #[test]
    fn pair_parse() {
        let pair: Pair<i32> = "-3, 4".parse().unwrap();
        assert_eq!(pair, Pair {x: -3, y: 4});

        assert!("10".parse::<Pair<u32>>().is_err());
        assert!("-1,2".parse::<Pair<u32>>().is_err());
    }

    #[test]
    fn cli_flags_build_raw_settings() {
        let opts = Options::try_parse_from([
            "watermark-studio",
            "--custom-size", "400x300",
            "--anchor", "50,50",
            "--rotation", "-45",
            "--shadow-offset", "-2,4",
            "--border",
            "-F", "JPG",
            "photo.jpg",
        ]).unwrap();

        let raw = opts.cli_settings();

        assert_eq!(raw.custom_width, Some(400));
        assert_eq!(raw.custom_height, Some(300));
        assert_eq!(raw.custom_x, Some(50));
        assert_eq!(raw.rotation, Some(-45));
        assert_eq!(raw.shadow.as_ref().and_then(|s| s.offset_x), Some(-2));
        assert_eq!(raw.border, Some(RawBorder::default()));
        assert!(raw.background.is_none());
        assert!(raw.color_adjust.is_none());
        assert_eq!(raw.output_format, Some(OutputFormat::Jpeg));
        assert!(raw.maintain_aspect.is_none());
    }

    #[test]
    fn exclusive_flags_are_rejected_by_clap() {
        assert!(Options::try_parse_from([
            "watermark-studio", "--scale", "20", "--fixed-width", "100", "a.png"
        ]).is_err());

        assert!(Options::try_parse_from([
            "watermark-studio", "-p", "center", "--anchor", "10,10", "a.png"
        ]).is_err());
    }

    #[test]
    fn cli_sizing_replaces_config_sizing() {
        let cli = RawSettings {fixed_width: Some(120), ..Default::default()};
        let file = RawSettings {
            scale_percent: Some(40),
            position: Some(PresetPosition::TopLeft),
            custom_x: None,
            ..Default::default()
        };

        let merged = cli.clone().or(mask_overridden(&cli, file));

        assert_eq!(merged.fixed_width, Some(120));
        assert_eq!(merged.scale_percent, None);
        assert_eq!(merged.position, Some(PresetPosition::TopLeft));
        assert!(WatermarkSettings::resolve(&merged).is_ok());
    }

    #[test]
    fn cli_anchor_replaces_config_preset() {
        let cli = RawSettings {
            custom_x: Some(10),
            custom_y: Some(90),
            ..Default::default()
        };
        let file = RawSettings {
            position: Some(PresetPosition::Center),
            margin_x: Some(5),
            ..Default::default()
        };

        let merged = cli.clone().or(mask_overridden(&cli, file));

        assert_eq!(merged.position, None);
        assert_eq!(merged.margin_x, None);
        assert!(WatermarkSettings::resolve(&merged).is_ok());
    }
}
