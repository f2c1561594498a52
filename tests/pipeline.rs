use anyhow::anyhow;
use bokeh::{
    BackgroundBlur, BlurError, BlurLevel, FixedMask, Segment, Segmentation, SegmentationModel,
    Stage,
};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// Model that answers with whatever segments it was given
struct Canned(Segmentation);

impl SegmentationModel for Canned {
    fn segment(&mut self, _image: &RgbImage) -> anyhow::Result<Segmentation> {
        Ok(self.0.clone())
    }
}

struct Unavailable;

impl SegmentationModel for Unavailable {
    fn segment(&mut self, _image: &RgbImage) -> anyhow::Result<Segmentation> {
        Err(anyhow!("weights not found").context("Failed to load model"))
    }
}

fn centered_square(size: u32, inner: u32) -> GrayImage {
    let start = (size - inner) / 2;
    let end = start + inner;
    GrayImage::from_fn(size, size, |x, y| {
        let inside = (start..end).contains(&x) && (start..end).contains(&y);
        Luma([if inside { 255 } else { 0 }])
    })
}

fn grid(size: u32, cell: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |x, y| {
        if ((x / cell) + (y / cell)) % 2 == 0 {
            Rgb([230, 40, 40])
        } else {
            Rgb([30, 30, 200])
        }
    })
}

fn fixed(mask: GrayImage) -> BackgroundBlur<FixedMask> {
    BackgroundBlur::new(FixedMask::new(DynamicImage::ImageLuma8(mask)))
}

fn close(a: &Rgb<u8>, b: &Rgb<u8>, tolerance: u8) -> bool {
    a.0.iter().zip(b.0.iter()).all(|(x, y)| x.abs_diff(*y) <= tolerance)
}

#[test]
fn red_square_scenario() {
    let red = Rgb([255, 0, 0]);
    let image = RgbImage::from_pixel(100, 100, red);
    let mut pipeline = fixed(centered_square(100, 40));

    let out = pipeline
        .process(&image, BlurLevel::new(10).unwrap())
        .expect("pipeline should succeed");

    assert_eq!(out.dimensions(), (100, 100));
    assert_eq!(*out.get_pixel(50, 50), red);
    // blurring a flat colour leaves it red
    assert!(close(out.get_pixel(5, 5), &red, 1));
    assert!(close(out.get_pixel(90, 50), &red, 1));

    // the transition ring hugs the square's border
    let mask = pipeline.refined_mask(&image).unwrap();
    for (x, y, pixel) in mask.enumerate_pixels() {
        let near_edge = [30i64, 70].iter().any(|&edge| {
            ((x as i64 - edge).abs() <= 2 && (28..=72).contains(&(y as i64)))
                || ((y as i64 - edge).abs() <= 2 && (28..=72).contains(&(x as i64)))
        });
        if !near_edge {
            assert!(
                pixel[0] < 0.001 || pixel[0] > 0.999,
                "pixel ({x}, {y}) = {} away from the boundary",
                pixel[0]
            );
        }
    }
    assert!(mask.get_pixel(30, 50)[0] > 0.5 && mask.get_pixel(30, 50)[0] < 1.0);
    assert!(mask.get_pixel(29, 50)[0] > 0.0 && mask.get_pixel(29, 50)[0] < 0.5);
}

#[test]
fn textured_background_is_softened_and_subject_is_not() {
    let image = grid(100, 4);
    let out = fixed(centered_square(100, 40))
        .process(&image, BlurLevel::new(10).unwrap())
        .unwrap();

    for (x, y) in [(45, 45), (50, 50), (60, 40)] {
        assert_eq!(out.get_pixel(x, y), image.get_pixel(x, y));
    }
    let softened = [(5, 5), (10, 90), (90, 20)]
        .iter()
        .filter(|&&(x, y)| !close(out.get_pixel(x, y), image.get_pixel(x, y), 10))
        .count();
    assert_eq!(softened, 3);
}

#[test]
fn level_zero_returns_input() {
    let image = grid(64, 3);
    let out = fixed(centered_square(64, 20))
        .process(&image, BlurLevel::NONE)
        .unwrap();
    assert_eq!(out, image);
}

#[test]
fn output_matches_input_dimensions() {
    for (width, height) in [(3, 2), (17, 5), (64, 33)] {
        let image = RgbImage::from_pixel(width, height, Rgb([10, 200, 90]));
        let mask = GrayImage::from_fn(width, height, |x, _| Luma([if x % 2 == 0 { 255 } else { 0 }]));
        let out = fixed(mask).process(&image, BlurLevel::new(3).unwrap()).unwrap();
        assert_eq!(out.dimensions(), (width, height));
    }
}

#[test]
fn missing_mask_key_is_reported() {
    let mut segment = Segment::default().labeled("person").scored(0.98);
    segment.layers.insert(
        "heatmap".to_string(),
        DynamicImage::ImageLuma8(GrayImage::new(8, 8)),
    );

    let failure = BackgroundBlur::new(Canned(vec![segment]))
        .process(&RgbImage::new(8, 8), BlurLevel::default())
        .unwrap_err();

    assert_eq!(failure.stage, Stage::Segmentation);
    assert!(matches!(failure.source, BlurError::MissingMask { ref key } if key == "mask"));
    assert!(!failure.diagnostic().is_empty());
}

#[test]
fn unavailable_model_is_reported_not_raised() {
    let failure = BackgroundBlur::new(Unavailable)
        .process(&RgbImage::new(8, 8), BlurLevel::default())
        .unwrap_err();
    assert!(failure.source.is_oracle_failure());
    assert_eq!(
        failure.diagnostic(),
        "segmentation stage: segmentation failed: Failed to load model: weights not found"
    );
}

#[test]
fn calls_are_independent() {
    let image = grid(48, 4);
    let mut pipeline = fixed(centered_square(48, 16));
    let level = BlurLevel::new(6).unwrap();
    let first = pipeline.process(&image, level).unwrap();
    let _ = pipeline.process(&grid(48, 2), BlurLevel::new(20).unwrap());
    let again = pipeline.process(&image, level).unwrap();
    assert_eq!(first, again);
}

#[test]
fn boxed_models_are_accepted() {
    let model: Box<dyn SegmentationModel> =
        Box::new(FixedMask::new(DynamicImage::ImageLuma8(centered_square(16, 8))));
    let out = BackgroundBlur::new(model)
        .process(&RgbImage::new(16, 16), BlurLevel::new(2).unwrap())
        .unwrap();
    assert_eq!(out.dimensions(), (16, 16));
}
