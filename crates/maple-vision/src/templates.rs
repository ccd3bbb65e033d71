use anyhow::{Context, Result};
use image::GrayImage;
use maple_capture::regions;
use std::path::Path;
use tracing::info;

use crate::config::HsvRange;
use crate::error::VisionError;
use crate::matching::{filter_color, Template};

pub const MINIMAP_TEMPLATE: &str = "minimap_template.png";
pub const PLAYER_TEMPLATE: &str = "player_template.png";
pub const RUNE_TEMPLATE: &str = "rune_template.png";
pub const ELITE_TEMPLATE: &str = "elite_template.png";

/// Reference images for every detector
#[derive(Debug, Clone)]
pub struct Templates {
    /// Bottom-right corner of the minimap
    pub minimap: Template,
    /// The player's dot on the minimap
    pub player: Template,
    /// The rune icon, already color-filtered like the minimap it is matched against
    pub rune: Template,
    /// The elite boss warning banner
    pub elite: Template,
}

impl Templates {
    /// Load all templates from `assets_dir`. Any missing or unusable image is
    /// an error; the capture loop cannot run without the full set.
    pub fn load(assets_dir: &Path, rune_ranges: &[HsvRange]) -> Result<Self> {
        let minimap = load_gray(&assets_dir.join(MINIMAP_TEMPLATE))?;
        let player = load_gray(&assets_dir.join(PLAYER_TEMPLATE))?;
        let elite = load_gray(&assets_dir.join(ELITE_TEMPLATE))?;

        let rune_path = assets_dir.join(RUNE_TEMPLATE);
        let rune_rgba = image::open(&rune_path)
            .with_context(|| format!("Failed to open {}", rune_path.display()))?
            .to_rgba8();
        let rune_gray = image::imageops::grayscale(&filter_color(&rune_rgba, rune_ranges));
        let rune = Template::new(&rune_gray)
            .with_context(|| format!("Unusable template {}", rune_path.display()))?;

        info!("Loaded detector templates from {}", assets_dir.display());

        Ok(Self {
            minimap,
            player,
            rune,
            elite,
        })
    }

    pub fn from_images(
        minimap: &GrayImage,
        player: &GrayImage,
        rune: &GrayImage,
        elite: &GrayImage,
    ) -> Result<Self> {
        Ok(Self {
            minimap: Template::new(minimap).context("Unusable minimap template")?,
            player: Template::new(player).context("Unusable player template")?,
            rune: Template::new(rune).context("Unusable rune template")?,
            elite: Template::new(elite).context("Unusable elite template")?,
        })
    }

    /// Check every detector's template against the area it is matched in:
    /// the elite banner against the center of a `frame` sized screen, the
    /// player and rune against a `minimap` sized crop.
    pub fn check_fit(&self, frame: (u32, u32), minimap: (u32, u32)) -> Result<(), VisionError> {
        let center = regions::center().to_pixels(frame.0, frame.1);
        let areas = [
            (&self.elite, (center.width, center.height)),
            (&self.player, minimap),
            (&self.rune, minimap),
        ];
        for (template, area) in areas {
            let (tw, th) = template.dimensions();
            if tw > area.0 || th > area.1 {
                return Err(VisionError::TemplateTooLarge {
                    template: (tw, th),
                    frame: area,
                });
            }
        }
        Ok(())
    }
}

/// Open an image file as a grayscale template
fn load_gray(path: &Path) -> Result<Template> {
    let img = image::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Template::new(&img.to_luma8()).with_context(|| format!("Unusable template {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_assets_dir_fails() {
        let err = Templates::load(Path::new("/nonexistent/assets"), &[]).unwrap_err();
        assert!(format!("{:#}", err).contains(MINIMAP_TEMPLATE));
    }

    #[test]
    fn test_load_from_disk() {
        let dir = std::env::temp_dir().join(format!("maple_templates_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let pattern = |x: u32, y: u32| image::Luma([((x * 37 + y * 91) % 200) as u8]);
        for name in [MINIMAP_TEMPLATE, PLAYER_TEMPLATE, ELITE_TEMPLATE] {
            GrayImage::from_fn(8, 8, pattern).save(dir.join(name)).unwrap();
        }
        // Rune: in-range magenta dots on black
        image::RgbaImage::from_fn(6, 6, |x, y| {
            if (x + y) % 2 == 0 {
                image::Rgba([232, 100, 250, 255])
            } else {
                image::Rgba([0, 0, 0, 255])
            }
        })
        .save(dir.join(RUNE_TEMPLATE))
        .unwrap();

        let templates = Templates::load(&dir, &[([141, 148, 245], [146, 158, 255])]).unwrap();
        assert_eq!(templates.minimap.dimensions(), (8, 8));
        assert_eq!(templates.rune.dimensions(), (6, 6));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_check_fit() {
        let pattern = |x: u32, y: u32| image::Luma([((x * 37 + y * 91) % 200) as u8]);
        let small = GrayImage::from_fn(8, 8, pattern);
        let wide = GrayImage::from_fn(300, 8, pattern);

        let templates = Templates::from_images(&small, &small, &small, &wide).unwrap();
        // Center of 960x540 is 480x270
        assert!(templates.check_fit((960, 540), (100, 50)).is_ok());
        assert_eq!(
            templates.check_fit((400, 300), (100, 50)),
            Err(VisionError::TemplateTooLarge {
                template: (300, 8),
                frame: (200, 150),
            })
        );

        let templates = Templates::from_images(&small, &wide, &small, &small).unwrap();
        assert!(matches!(
            templates.check_fit((960, 540), (100, 50)),
            Err(VisionError::TemplateTooLarge { template: (300, 8), .. })
        ));
    }
}
