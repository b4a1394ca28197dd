use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use pdf_writer::{Filter, Pdf, Ref};

use crate::config::Config;
use crate::model::DocBlock;

enum Pixels {
    /// Baseline JPEG stored as-is and decoded by the viewer.
    Jpeg { data: Vec<u8>, gray: bool },
    Raw { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

pub(crate) struct LoadedImage {
    pub(crate) width_px: u32,
    pub(crate) height_px: u32,
    pixels: Pixels,
}

impl LoadedImage {
    /// Height over width; 0 for degenerate images.
    pub(crate) fn aspect(&self) -> f32 {
        if self.width_px == 0 {
            0.0
        } else {
            self.height_px as f32 / self.width_px as f32
        }
    }

    fn decode(path: &Path) -> Result<Self, String> {
        let bytes = std::fs::read(path).map_err(|e| e.to_string())?;
        let reader = image::ImageReader::new(Cursor::new(&bytes))
            .with_guessed_format()
            .map_err(|e| e.to_string())?;
        let format = reader.format();
        let decoded = reader.decode().map_err(|e| e.to_string())?;
        let (width_px, height_px) = (decoded.width(), decoded.height());

        let passthrough = match (format, decoded.color()) {
            (Some(image::ImageFormat::Jpeg), image::ColorType::Rgb8) => Some(false),
            (Some(image::ImageFormat::Jpeg), image::ColorType::L8) => Some(true),
            _ => None,
        };
        let pixels = match passthrough {
            Some(gray) => Pixels::Jpeg { data: bytes, gray },
            None => {
                let rgba = decoded.to_rgba8();
                let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);
                let rgb = rgba.pixels().flat_map(|p| [p.0[0], p.0[1], p.0[2]]).collect();
                let alpha = has_alpha.then(|| rgba.pixels().map(|p| p.0[3]).collect());
                Pixels::Raw { rgb, alpha }
            }
        };
        Ok(Self {
            width_px,
            height_px,
            pixels,
        })
    }
}

/// Every raster image of a build, decoded once before the render passes.
#[derive(Default)]
pub struct ImageStore {
    images: Vec<LoadedImage>,
    by_path: BTreeMap<PathBuf, usize>,
}

impl ImageStore {
    /// Load the images referenced by `blocks` and the header/footer images.
    /// Unreadable files are logged and later drawn as placeholders.
    pub fn load(blocks: &[DocBlock], config: &Config) -> Self {
        let t0 = std::time::Instant::now();
        let mut paths = Vec::new();
        collect_paths(blocks, &mut paths);
        paths.extend(config.header.image.iter().cloned());
        paths.extend(config.footer.image.iter().cloned());

        let mut store = Self::default();
        let mut failed = 0usize;
        for path in paths {
            if store.by_path.contains_key(&path) {
                continue;
            }
            match LoadedImage::decode(&path) {
                Ok(img) => {
                    store.by_path.insert(path, store.images.len());
                    store.images.push(img);
                }
                Err(e) => {
                    failed += 1;
                    log::warn!("Cannot load image {}: {e}", path.display());
                }
            }
        }
        log::info!(
            "Images: {} loaded, {} unreadable in {:.1}ms",
            store.images.len(),
            failed,
            t0.elapsed().as_secs_f64() * 1000.0,
        );
        store
    }

    pub(crate) fn get(&self, path: &Path) -> Option<(usize, &LoadedImage)> {
        let id = *self.by_path.get(path)?;
        Some((id, &self.images[id]))
    }

    pub(crate) fn resource_name(id: usize) -> String {
        format!("Im{}", id + 1)
    }

    /// Write one image XObject per loaded image, in load order.
    pub(crate) fn embed(&self, pdf: &mut Pdf, alloc: &mut impl FnMut() -> Ref) -> Vec<(String, Ref)> {
        let mut out = Vec::with_capacity(self.images.len());
        for (id, img) in self.images.iter().enumerate() {
            let xobj_ref = alloc();
            let (w, h) = (img.width_px as i32, img.height_px as i32);
            match &img.pixels {
                Pixels::Jpeg { data, gray } => {
                    let mut xobj = pdf.image_xobject(xobj_ref, data);
                    xobj.filter(Filter::DctDecode);
                    xobj.width(w);
                    xobj.height(h);
                    if *gray {
                        xobj.color_space().device_gray();
                    } else {
                        xobj.color_space().device_rgb();
                    }
                    xobj.bits_per_component(8);
                }
                Pixels::Raw { rgb, alpha } => {
                    let smask_ref = alpha.as_ref().map(|alpha| {
                        let compressed = miniz_oxide::deflate::compress_to_vec_zlib(alpha, 6);
                        let mask_ref = alloc();
                        let mut mask = pdf.image_xobject(mask_ref, &compressed);
                        mask.filter(Filter::FlateDecode);
                        mask.width(w);
                        mask.height(h);
                        mask.color_space().device_gray();
                        mask.bits_per_component(8);
                        mask_ref
                    });
                    let compressed = miniz_oxide::deflate::compress_to_vec_zlib(rgb, 6);
                    let mut xobj = pdf.image_xobject(xobj_ref, &compressed);
                    xobj.filter(Filter::FlateDecode);
                    xobj.width(w);
                    xobj.height(h);
                    xobj.color_space().device_rgb();
                    xobj.bits_per_component(8);
                    if let Some(mask_ref) = smask_ref {
                        xobj.s_mask(mask_ref);
                    }
                }
            }
            out.push((Self::resource_name(id), xobj_ref));
        }
        out
    }
}

/// Images are only drawn at the top level; quotes skip them.
fn collect_paths(blocks: &[DocBlock], out: &mut Vec<PathBuf>) {
    out.extend(blocks.iter().filter_map(|block| match block {
        DocBlock::Image(img) => Some(img.path.clone()),
        _ => None,
    }));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Blockquote, ImageBlock};

    #[test]
    fn loads_png_and_skips_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("dot.png");
        image::RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 128]))
            .save(&png)
            .unwrap();

        let blocks = vec![
            DocBlock::Image(ImageBlock {
                path: png.clone(),
                ..ImageBlock::default()
            }),
            DocBlock::Blockquote(Blockquote {
                content: vec![DocBlock::Image(ImageBlock {
                    path: dir.path().join("missing.png"),
                    ..ImageBlock::default()
                })],
            }),
        ];
        let store = ImageStore::load(&blocks, &Config::default());
        let (id, img) = store.get(&png).unwrap();
        assert_eq!(id, 0);
        assert!((img.aspect() - 0.5).abs() < 1e-6);
        assert!(matches!(img.pixels, Pixels::Raw { alpha: Some(_), .. }));
        assert!(store.get(&dir.path().join("missing.png")).is_none());
    }

    #[test]
    fn images_inside_quotes_are_not_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("quoted.png");
        image::RgbImage::from_pixel(8, 8, image::Rgb([0, 0, 0]))
            .save(&png)
            .unwrap();

        let blocks = vec![DocBlock::Blockquote(Blockquote {
            content: vec![DocBlock::Image(ImageBlock {
                path: png.clone(),
                ..ImageBlock::default()
            })],
        })];
        let store = ImageStore::load(&blocks, &Config::default());
        assert!(store.get(&png).is_none());
        assert!(store.images.is_empty());
    }
}
