//! Start-frame preparation: alpha flattening and 9:16 center cropping.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageReader, Rgb, RgbImage, RgbaImage};
use thiserror::Error;

pub const TARGET_ASPECT_RATIO: f64 = 9.0 / 16.0;
pub const ASPECT_TOLERANCE: f64 = 0.01;
pub const MIN_WIDTH: u32 = 360;
pub const MIN_HEIGHT: u32 = 640;
pub const JPEG_QUALITY: u8 = 95;

/// Fill color for transparent pixels when flattening to JPEG.
pub type Background = Rgb<u8>;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("image does not exist: {}", .0.display())]
    NotFound(PathBuf),

    #[error(
        "start frame not found; place it at {} or {}",
        .jpg.display(),
        .png.display()
    )]
    StartFrameMissing { jpg: PathBuf, png: PathBuf },

    #[error(
        "{stage} size {width}x{height} is too small, minimum is {min_width}x{min_height}. \
         Provide a larger image of at least {min_width}x{min_height} pixels with an aspect ratio close to 9:16."
    )]
    TooSmall {
        stage: &'static str,
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },

    #[error("invalid background color '{0}', expected RRGGBB hex")]
    InvalidColor(String),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AspectConstraints {
    pub target_ratio: f64,
    pub tolerance: f64,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for AspectConstraints {
    fn default() -> Self {
        Self {
            target_ratio: TARGET_ASPECT_RATIO,
            tolerance: ASPECT_TOLERANCE,
            min_width: MIN_WIDTH,
            min_height: MIN_HEIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBox {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CropPlan {
    Keep { width: u32, height: u32 },
    Crop { width: u32, height: u32, crop: CropBox },
}

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    pub constraints: AspectConstraints,
    pub backup: bool,
    pub jpeg_quality: u8,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            constraints: AspectConstraints::default(),
            backup: true,
            jpeg_quality: JPEG_QUALITY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Backup {
    Written(PathBuf),
    AlreadyPresent(PathBuf),
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizeOutcome {
    Unchanged {
        width: u32,
        height: u32,
    },
    Cropped {
        original_width: u32,
        original_height: u32,
        crop: CropBox,
        backup: Backup,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlattenOutcome {
    AlreadyPresent(PathBuf),
    Converted { path: PathBuf, had_alpha: bool },
}

impl FlattenOutcome {
    pub fn path(&self) -> &Path {
        match self {
            Self::AlreadyPresent(path) => path,
            Self::Converted { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartFrameSource {
    Jpeg(PathBuf),
    Png(PathBuf),
}

/// Decides how to bring `width`x`height` to the target ratio without touching any file.
pub fn plan_crop(
    width: u32,
    height: u32,
    constraints: &AspectConstraints,
) -> Result<CropPlan, NormalizeError> {
    let too_small = |stage, width, height| NormalizeError::TooSmall {
        stage,
        width,
        height,
        min_width: constraints.min_width,
        min_height: constraints.min_height,
    };
    if width == 0 || height == 0 {
        return Err(too_small("image", width, height));
    }

    let ratio = width as f64 / height as f64;
    if (ratio - constraints.target_ratio).abs() < constraints.tolerance {
        if width < constraints.min_width || height < constraints.min_height {
            return Err(too_small("image", width, height));
        }
        return Ok(CropPlan::Keep { width, height });
    }

    let crop = if ratio > constraints.target_ratio {
        let new_width = ((height as f64 * constraints.target_ratio) as u32).min(width);
        CropBox {
            left: (width - new_width) / 2,
            top: 0,
            width: new_width,
            height,
        }
    } else {
        let new_height = ((width as f64 / constraints.target_ratio) as u32).min(height);
        CropBox {
            left: 0,
            top: (height - new_height) / 2,
            width,
            height: new_height,
        }
    };

    if crop.width < constraints.min_width || crop.height < constraints.min_height {
        return Err(too_small("cropped", crop.width, crop.height));
    }
    Ok(CropPlan::Crop {
        width,
        height,
        crop,
    })
}

/// Crops `path` in place to the target ratio.
///
/// Rejections happen before anything is written. The backup, when enabled,
/// is a byte copy of the original and is never replaced once it exists.
pub fn normalize_image(
    path: &Path,
    options: &NormalizeOptions,
) -> Result<NormalizeOutcome, NormalizeError> {
    if !path.is_file() {
        return Err(NormalizeError::NotFound(path.to_path_buf()));
    }
    let image = open_image(path)?;
    let (width, height) = image.dimensions();

    let crop = match plan_crop(width, height, &options.constraints)? {
        CropPlan::Keep { width, height } => {
            return Ok(NormalizeOutcome::Unchanged { width, height });
        }
        CropPlan::Crop { crop, .. } => crop,
    };

    let cropped = image.crop_imm(crop.left, crop.top, crop.width, crop.height);

    let backup = if options.backup {
        let backup_path = backup_path_for(path);
        if backup_path.exists() {
            Backup::AlreadyPresent(backup_path)
        } else {
            fs::copy(path, &backup_path)?;
            Backup::Written(backup_path)
        }
    } else {
        Backup::Skipped
    };

    write_image(path, &cropped, options.jpeg_quality)?;

    Ok(NormalizeOutcome::Cropped {
        original_width: width,
        original_height: height,
        crop,
        backup,
    })
}

/// Re-encodes a (possibly transparent) PNG as an opaque JPEG next to it.
pub fn flatten_to_jpeg(
    png_path: &Path,
    background: Background,
    quality: u8,
) -> Result<FlattenOutcome, NormalizeError> {
    let jpg_path = png_path.with_extension("jpg");
    if jpg_path.exists() {
        return Ok(FlattenOutcome::AlreadyPresent(jpg_path));
    }
    if !png_path.is_file() {
        return Err(NormalizeError::NotFound(png_path.to_path_buf()));
    }

    let image = open_image(png_path)?;
    let had_alpha = image.color().has_alpha();
    let rgb = if had_alpha {
        composite_over(&image.to_rgba8(), background)
    } else {
        image.to_rgb8()
    };
    write_image(&jpg_path, &DynamicImage::ImageRgb8(rgb), quality)?;

    Ok(FlattenOutcome::Converted {
        path: jpg_path,
        had_alpha,
    })
}

/// `idle.jpg` wins over `idle.png`.
pub fn find_start_frame(assets_dir: &Path) -> Result<StartFrameSource, NormalizeError> {
    let jpg = assets_dir.join("idle.jpg");
    let png = assets_dir.join("idle.png");
    if jpg.is_file() {
        return Ok(StartFrameSource::Jpeg(jpg));
    }
    if png.is_file() {
        return Ok(StartFrameSource::Png(png));
    }
    Err(NormalizeError::StartFrameMissing { jpg, png })
}

pub fn parse_background(raw: &str) -> Result<Background, NormalizeError> {
    let hex = raw.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(NormalizeError::InvalidColor(raw.to_string()));
    }
    let channel = |idx: usize| {
        u8::from_str_radix(&hex[idx..idx + 2], 16)
            .map_err(|_| NormalizeError::InvalidColor(raw.to_string()))
    };
    Ok(Rgb([channel(0)?, channel(2)?, channel(4)?]))
}

/// `idle.jpg` -> `idle_original.jpg`.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("image");
    let name = match path.extension().and_then(|value| value.to_str()) {
        Some(ext) => format!("{stem}_original.{ext}"),
        None => format!("{stem}_original"),
    };
    path.with_file_name(name)
}

/// Decodes by content, so a PNG saved as `idle.jpg` still loads.
fn open_image(path: &Path) -> Result<DynamicImage, NormalizeError> {
    Ok(ImageReader::open(path)?.with_guessed_format()?.decode()?)
}

fn composite_over(rgba: &RgbaImage, background: Background) -> RgbImage {
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let pixel = rgba.get_pixel(x, y);
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8, back: u8| -> u8 {
            (((u16::from(channel) * alpha) + (u16::from(back) * (255 - alpha))) / 255) as u8
        };
        Rgb([
            blend(pixel[0], background[0]),
            blend(pixel[1], background[1]),
            blend(pixel[2], background[2]),
        ])
    })
}

fn is_jpeg_path(path: &Path) -> bool {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "jpg" | "jpeg"))
        .unwrap_or(false)
}

fn write_image(path: &Path, image: &DynamicImage, quality: u8) -> Result<(), NormalizeError> {
    if is_jpeg_path(path) {
        let mut writer = BufWriter::new(File::create(path)?);
        JpegEncoder::new_with_quality(&mut writer, quality).encode_image(&image.to_rgb8())?;
        writer.flush()?;
    } else {
        image.save(path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    use super::*;

    fn constraints() -> AspectConstraints {
        AspectConstraints::default()
    }

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 0])
        })
    }

    #[test]
    fn ratio_within_tolerance_is_kept() -> anyhow::Result<()> {
        for (width, height) in [(360, 640), (720, 1280), (1080, 1920), (1000, 1770)] {
            let plan = plan_crop(width, height, &constraints())?;
            assert_eq!(plan, CropPlan::Keep { width, height });
        }
        Ok(())
    }

    #[test]
    fn target_ratio_below_minimum_is_rejected() {
        let err = plan_crop(180, 320, &constraints()).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::TooSmall {
                stage: "image",
                width: 180,
                height: 320,
                ..
            }
        ));
    }

    #[test]
    fn square_image_crops_width_centered() -> anyhow::Result<()> {
        let plan = plan_crop(1000, 1000, &constraints())?;
        assert_eq!(
            plan,
            CropPlan::Crop {
                width: 1000,
                height: 1000,
                crop: CropBox {
                    left: 219,
                    top: 0,
                    width: 562,
                    height: 1000,
                },
            }
        );
        Ok(())
    }

    #[test]
    fn wide_images_only_lose_width() -> anyhow::Result<()> {
        for (width, height) in [(1920, 1080), (800, 800), (4000, 3000), (700, 1000)] {
            let CropPlan::Crop { crop, .. } = plan_crop(width, height, &constraints())? else {
                panic!("expected a crop for {width}x{height}");
            };
            assert_eq!(crop.height, height);
            assert_eq!(crop.top, 0);
            assert!(crop.width < width);
            let ratio = crop.width as f64 / crop.height as f64;
            assert!((ratio - TARGET_ASPECT_RATIO).abs() < 1.0 / height as f64);
        }
        Ok(())
    }

    #[test]
    fn tall_images_only_lose_height() -> anyhow::Result<()> {
        for (width, height) in [(1000, 2000), (400, 1000), (1080, 2400)] {
            let CropPlan::Crop { crop, .. } = plan_crop(width, height, &constraints())? else {
                panic!("expected a crop for {width}x{height}");
            };
            assert_eq!(crop.width, width);
            assert_eq!(crop.left, 0);
            assert!(crop.height < height);
            assert_eq!(crop.top, (height - crop.height) / 2);
        }
        let CropPlan::Crop { crop, .. } = plan_crop(1000, 2000, &constraints())? else {
            panic!("expected a crop");
        };
        assert_eq!((crop.height, crop.top), (1777, 111));
        Ok(())
    }

    #[test]
    fn crop_landing_exactly_on_minimum_is_accepted() -> anyhow::Result<()> {
        let CropPlan::Crop { crop, .. } = plan_crop(500, 640, &constraints())? else {
            panic!("expected a crop");
        };
        assert_eq!((crop.width, crop.height), (360, 640));
        Ok(())
    }

    #[test]
    fn crop_below_minimum_is_rejected() {
        let err = plan_crop(300, 300, &constraints()).unwrap_err();
        assert!(matches!(
            err,
            NormalizeError::TooSmall {
                stage: "cropped",
                width: 168,
                height: 300,
                min_width: 360,
                min_height: 640,
            }
        ));
        assert!(err.to_string().contains("at least 360x640"));
    }

    #[test]
    fn mislabelled_png_start_frame_is_decoded_by_content() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("idle.jpg");
        let mut png_bytes = Vec::new();
        gradient(1000, 1000)
            .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;
        fs::write(&path, &png_bytes)?;

        let outcome = normalize_image(&path, &NormalizeOptions::default())?;

        assert!(matches!(outcome, NormalizeOutcome::Cropped { .. }));
        assert_eq!(fs::read(temp.path().join("idle_original.jpg"))?, png_bytes);
        let rewritten = fs::read(&path)?;
        assert_eq!(&rewritten[..2], &[0xff, 0xd8]);
        assert_eq!(image::open(&path)?.dimensions(), (562, 1000));
        Ok(())
    }

    #[test]
    fn normalize_crops_in_place_and_backs_up_original() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("idle.png");
        gradient(1000, 1000).save(&path)?;

        let outcome = normalize_image(&path, &NormalizeOptions::default())?;
        let backup_path = temp.path().join("idle_original.png");
        assert_eq!(
            outcome,
            NormalizeOutcome::Cropped {
                original_width: 1000,
                original_height: 1000,
                crop: CropBox {
                    left: 219,
                    top: 0,
                    width: 562,
                    height: 1000,
                },
                backup: Backup::Written(backup_path.clone()),
            }
        );

        let cropped = image::open(&path)?;
        assert_eq!(cropped.dimensions(), (562, 1000));
        assert_eq!(cropped.to_rgb8().get_pixel(0, 5)[0], 219);
        assert_eq!(image::open(&backup_path)?.dimensions(), (1000, 1000));

        let again = normalize_image(&path, &NormalizeOptions::default())?;
        assert_eq!(
            again,
            NormalizeOutcome::Unchanged {
                width: 562,
                height: 1000
            }
        );
        Ok(())
    }

    #[test]
    fn existing_backup_is_never_overwritten() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("idle.png");
        let backup_path = temp.path().join("idle_original.png");
        gradient(1200, 1000).save(&path)?;
        fs::write(&backup_path, b"first original")?;

        let outcome = normalize_image(&path, &NormalizeOptions::default())?;
        let NormalizeOutcome::Cropped { backup, .. } = outcome else {
            panic!("expected a crop");
        };
        assert_eq!(backup, Backup::AlreadyPresent(backup_path.clone()));
        assert_eq!(fs::read(&backup_path)?, b"first original");
        Ok(())
    }

    #[test]
    fn backup_can_be_disabled() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("idle.jpg");
        gradient(1000, 1000).save(&path)?;
        let options = NormalizeOptions {
            backup: false,
            ..NormalizeOptions::default()
        };

        let outcome = normalize_image(&path, &options)?;
        assert!(matches!(
            outcome,
            NormalizeOutcome::Cropped {
                backup: Backup::Skipped,
                ..
            }
        ));
        assert!(!temp.path().join("idle_original.jpg").exists());
        assert_eq!(image::open(&path)?.dimensions(), (562, 1000));
        Ok(())
    }

    #[test]
    fn rejected_crop_leaves_file_untouched() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("idle.png");
        gradient(300, 300).save(&path)?;
        let before = fs::read(&path)?;

        let err = normalize_image(&path, &NormalizeOptions::default()).unwrap_err();
        assert!(matches!(err, NormalizeError::TooSmall { .. }));
        assert_eq!(fs::read(&path)?, before);
        assert!(!temp.path().join("idle_original.png").exists());
        Ok(())
    }

    #[test]
    fn missing_image_is_not_found() {
        let temp = tempfile::tempdir().unwrap();
        let err = normalize_image(&temp.path().join("nope.jpg"), &NormalizeOptions::default())
            .unwrap_err();
        assert!(matches!(err, NormalizeError::NotFound(_)));
    }

    #[test]
    fn flatten_composites_alpha_over_background() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let png = temp.path().join("idle.png");
        let mut rgba = RgbaImage::from_pixel(64, 64, Rgba([255, 0, 0, 0]));
        for x in 32..64 {
            for y in 0..64 {
                rgba.put_pixel(x, y, Rgba([255, 0, 0, 255]));
            }
        }
        rgba.save(&png)?;

        let outcome = flatten_to_jpeg(&png, Rgb([0, 0, 255]), JPEG_QUALITY)?;
        let jpg = temp.path().join("idle.jpg");
        assert_eq!(
            outcome,
            FlattenOutcome::Converted {
                path: jpg.clone(),
                had_alpha: true,
            }
        );

        let decoded = image::open(&jpg)?;
        assert!(!decoded.color().has_alpha());
        let rgb = decoded.to_rgb8();
        let transparent = rgb.get_pixel(8, 32);
        let opaque = rgb.get_pixel(56, 32);
        assert!(transparent[2] > 230 && transparent[0] < 25);
        assert!(opaque[0] > 230 && opaque[2] < 25);
        Ok(())
    }

    #[test]
    fn flatten_reuses_existing_jpeg() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let png = temp.path().join("idle.png");
        let jpg = temp.path().join("idle.jpg");
        gradient(16, 16).save(&png)?;
        fs::write(&jpg, b"already converted")?;

        let outcome = flatten_to_jpeg(&png, Rgb([0, 0, 0]), JPEG_QUALITY)?;
        assert_eq!(outcome, FlattenOutcome::AlreadyPresent(jpg.clone()));
        assert_eq!(fs::read(&jpg)?, b"already converted");
        Ok(())
    }

    #[test]
    fn start_frame_prefers_jpeg() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let err = find_start_frame(temp.path()).unwrap_err();
        assert!(err.to_string().contains("idle.jpg"));

        gradient(8, 8).save(temp.path().join("idle.png"))?;
        assert_eq!(
            find_start_frame(temp.path())?,
            StartFrameSource::Png(temp.path().join("idle.png"))
        );

        gradient(8, 8).save(temp.path().join("idle.jpg"))?;
        assert_eq!(
            find_start_frame(temp.path())?,
            StartFrameSource::Jpeg(temp.path().join("idle.jpg"))
        );
        Ok(())
    }

    #[test]
    fn background_parses_hex_with_or_without_hash() -> anyhow::Result<()> {
        assert_eq!(parse_background("000000")?, Rgb([0, 0, 0]));
        assert_eq!(parse_background("#1a2B3c")?, Rgb([0x1a, 0x2b, 0x3c]));
        assert!(parse_background("fff").is_err());
        assert!(parse_background("zzzzzz").is_err());
        Ok(())
    }

    #[test]
    fn backup_name_keeps_extension() {
        assert_eq!(
            backup_path_for(Path::new("/a/assets/idle.jpg")),
            PathBuf::from("/a/assets/idle_original.jpg")
        );
        assert_eq!(
            backup_path_for(Path::new("frame")),
            PathBuf::from("frame_original")
        );
    }
}
