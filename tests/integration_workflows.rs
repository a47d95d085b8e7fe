//! Integration tests for complete matte workflows
//!
//! These tests drive the public API end to end against scratch asset
//! directories, using an in-test segmentation service instead of a real
//! external program.

use card_matte::{
    AssetManifest, AssetState, AssetVersionStore, BatchRunner, DefaultStrategyFactory,
    FailureKind, ImageIOService, MatteConfig, Result, SegmentationService, StrategyDescriptor,
    StrategyKind,
};
use image::{DynamicImage, Rgba, RgbaImage};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Card-like test image: white background, coloured subject, one highlight
fn create_card_image(width: u32, height: u32) -> RgbaImage {
    let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));
    for y in height / 4..height * 3 / 4 {
        for x in width / 4..width * 3 / 4 {
            image.put_pixel(x, y, Rgba([40, 110, 180, 255]));
        }
    }
    image.put_pixel(width / 2, height / 2, Rgba([252, 252, 252, 255]));
    image
}

fn write_card(store: &AssetVersionStore, key: &str) -> Result<Vec<u8>> {
    let bytes = ImageIOService::encode_png(&create_card_image(24, 16))?;
    ImageIOService::write_bytes(store.current_path(key), &bytes)?;
    Ok(bytes)
}

fn runner(store: &AssetVersionStore) -> BatchRunner {
    BatchRunner::new(
        store.clone(),
        Box::new(DefaultStrategyFactory::new()),
        MatteConfig::default(),
    )
}

/// Segmentation service returning a radial soft alpha
#[derive(Default)]
struct RadialSegmenter {
    calls: Mutex<Vec<(u32, u32)>>,
}

impl SegmentationService for RadialSegmenter {
    fn name(&self) -> &str {
        "radial"
    }

    fn segment(&self, image: &DynamicImage) -> Result<RgbaImage> {
        self.calls
            .lock()
            .unwrap()
            .push((image.width(), image.height()));

        let mut rgba = image.to_rgba8();
        let (cx, cy) = (rgba.width() as f32 / 2.0, rgba.height() as f32 / 2.0);
        let radius = cx.min(cy).max(1.0);
        for (x, y, pixel) in rgba.enumerate_pixels_mut() {
            let distance = ((x as f32 - cx).powi(2) + (y as f32 - cy).powi(2)).sqrt();
            pixel[3] = (255.0 * (1.0 - distance / radius).clamp(0.0, 1.0)) as u8;
        }
        Ok(rgba)
    }
}

#[test]
fn test_pixel_threshold_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    let original = write_card(&store, "fish_origami")?;

    let descriptor = StrategyDescriptor::new(StrategyKind::PixelThreshold);
    let report = runner(&store).run(&["fish_origami"], &descriptor)?;
    assert!(report.is_success());

    // Backup holds the original bytes, current holds the matte
    assert_eq!(std::fs::read(store.backup_path("fish_origami", "backup")).unwrap(), original);
    let matted = ImageIOService::load_image(store.current_path("fish_origami"))?.to_rgba8();
    assert_eq!(matted.get_pixel(0, 0), &Rgba([255, 255, 255, 0]));
    assert_eq!(matted.get_pixel(8, 6), &Rgba([40, 110, 180, 255]));
    // The pixel strategy has no neighbourhood, so the highlight becomes a hole
    assert_eq!(matted.get_pixel(12, 8)[3], 0);

    assert_eq!(store.state("fish_origami", "backup")?, AssetState::Matted);
    Ok(())
}

#[test]
fn test_morphological_workflow_fills_highlight() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    write_card(&store, "crab_origami")?;

    let descriptor = StrategyDescriptor::new(StrategyKind::MorphologicalThreshold);
    let report = runner(&store).run(&["crab_origami"], &descriptor)?;
    assert!(report.is_success());

    let matted = ImageIOService::load_image(store.current_path("crab_origami"))?.to_rgba8();
    assert!(matted.pixels().all(|p| p[3] == 0 || p[3] == 255));
    assert_eq!(matted.get_pixel(12, 8)[3], 255);
    assert_eq!(matted.get_pixel(0, 0)[3], 0);
    Ok(())
}

#[test]
fn test_repeated_runs_are_safe() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    let original = write_card(&store, "shark_origami")?;

    let pixel = StrategyDescriptor::new(StrategyKind::PixelThreshold);
    let morph = StrategyDescriptor::new(StrategyKind::MorphologicalThreshold);
    let runner = runner(&store);

    runner.run(&["shark_origami"], &pixel)?;
    runner.run(&["shark_origami"], &pixel)?;
    runner.run(&["shark_origami"], &morph)?;
    let after_first_morph = std::fs::read(store.current_path("shark_origami")).unwrap();
    runner.run(&["shark_origami"], &morph)?;

    // Shared backup tag: taken once, never overwritten
    assert_eq!(
        std::fs::read(store.backup_path("shark_origami", "backup")).unwrap(),
        original
    );
    // Pristine-source strategy output does not drift between runs
    assert_eq!(
        std::fs::read(store.current_path("shark_origami")).unwrap(),
        after_first_morph
    );
    Ok(())
}

#[test]
fn test_external_segmentation_workflow() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    write_card(&store, "seagull_origami")?;
    write_card(&store, "whale_origami")?;

    let segmenter = Arc::new(RadialSegmenter::default());
    let factory = DefaultStrategyFactory::new().with_segmenter(segmenter.clone());
    let runner = BatchRunner::new(store.clone(), Box::new(factory), MatteConfig::default());

    let descriptor = StrategyDescriptor::new(StrategyKind::ExternalSegmentation);
    let report = runner.run(&["seagull_origami", "whale_origami"], &descriptor)?;
    assert_eq!(report.succeeded(), 2);
    assert_eq!(segmenter.calls.lock().unwrap().as_slice(), [(24, 16), (24, 16)]);

    assert!(store.backup_path("seagull_origami", "before_rembg").exists());
    let matted = ImageIOService::load_image(store.current_path("seagull_origami"))?.to_rgba8();
    assert!(matted.pixels().any(|p| p[3] > 0 && p[3] < 255));
    Ok(())
}

#[test]
fn test_restore_after_matte() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    let original = write_card(&store, "octopus_origami")?;

    let descriptor = StrategyDescriptor::new(StrategyKind::PixelThreshold);
    runner(&store).run(&["octopus_origami"], &descriptor)?;
    assert_eq!(store.state("octopus_origami", "backup")?, AssetState::Matted);

    store.restore("octopus_origami", "backup")?;
    assert_eq!(std::fs::read(store.current_path("octopus_origami")).unwrap(), original);
    assert_eq!(store.state("octopus_origami", "backup")?, AssetState::BackedUp);
    Ok(())
}

#[test]
fn test_manifest_driven_batch() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let cards_dir = temp_dir.path().join("cards");
    std::fs::create_dir(&cards_dir).unwrap();
    let store = AssetVersionStore::new(&cards_dir);
    for key in ["fish_origami", "crab_origami", "shark_origami"] {
        write_card(&store, key)?;
    }
    // Leftover backup from an earlier run must not become an asset
    write_card(&store, "fish_origami_backup")?;

    let manifest_path = temp_dir.path().join("cards.json");
    std::fs::write(
        &manifest_path,
        r#"{
            "assets_dir": "cards",
            "assets": ["penguin_origami"],
            "pattern": "*.png",
            "strategy": {"kind": "morphological-threshold"},
            "matte": {"threshold": 235}
        }"#,
    )
    .unwrap();

    let manifest = AssetManifest::load(&manifest_path)?;
    let keys = manifest.asset_keys()?;
    assert_eq!(
        keys,
        vec!["penguin_origami", "crab_origami", "fish_origami", "shark_origami"]
    );

    let runner = BatchRunner::new(
        manifest.store(),
        Box::new(DefaultStrategyFactory::new()),
        manifest.matte_config(),
    );
    let report = runner.run(&keys, &manifest.descriptor())?;

    assert_eq!(report.succeeded(), 3);
    assert_eq!(report.failed(), 1);
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.asset_key, "penguin_origami");
    assert_eq!(
        failure.failure.as_ref().unwrap().kind,
        FailureKind::MissingAssetError
    );

    let report_path = temp_dir.path().join("report.json");
    report.write_json(&report_path)?;
    let json = std::fs::read_to_string(&report_path).unwrap();
    assert!(json.contains("morphological-threshold"));
    assert!(json.contains("penguin_origami"));
    Ok(())
}

#[test]
fn test_lossless_round_trip_of_matte() -> Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let store = AssetVersionStore::new(temp_dir.path());
    write_card(&store, "turtle_origami")?;

    let descriptor = StrategyDescriptor::new(StrategyKind::MorphologicalThreshold);
    runner(&store).run(&["turtle_origami"], &descriptor)?;

    let first = ImageIOService::load_image(store.current_path("turtle_origami"))?.to_rgba8();
    let bytes = ImageIOService::encode_png(&first)?;
    let second = ImageIOService::load_from_bytes(&bytes)?.to_rgba8();
    assert_eq!(first, second);
    Ok(())
}
