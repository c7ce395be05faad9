//! Pipeline behavior independent of the HTTP layer

use bg_removal_api::{
    config::ProcessingConfig,
    detection::{ContentClassifier, ContentType},
    pipeline::{BackgroundRemover, ModelHint, RemovalOptions},
    segmentation::{mock::MockSessionFactory, SessionCache},
};
use image::{ImageFormat, RgbImage};
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use crate::common::{encode, human_classifier};

fn remover(classifier: ContentClassifier) -> BackgroundRemover {
    let preference = vec!["u2net".to_string(), "isnet-general-use".to_string(), "u2netp".to_string()];
    let sessions = Arc::new(SessionCache::new(Arc::new(MockSessionFactory::new()), preference));
    BackgroundRemover::new(sessions, Arc::new(classifier), ProcessingConfig::default(), "u2netp")
}

fn noise(width: u32, height: u32, seed: u64) -> RgbImage {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    RgbImage::from_fn(width, height, |_, _| image::Rgb([rng.gen(), rng.gen(), rng.gen()]))
}

#[tokio::test]
async fn test_noise_image_still_yields_png() {
    let remover = remover(ContentClassifier::disabled());
    let bytes = encode(noise(300, 200, 7), ImageFormat::Png);

    let output = remover
        .remove_background(bytes, RemovalOptions::from_config(&ProcessingConfig::default()))
        .await
        .unwrap();

    let decoded = image::load_from_memory_with_format(&output.png, ImageFormat::Png).unwrap();
    assert_eq!(decoded.width(), 300);
    assert_eq!(decoded.height(), 200);
    assert_eq!(output.detection.unwrap().primary_type, ContentType::General);
}

#[tokio::test]
async fn test_every_option_combination_produces_png() {
    let remover = remover(human_classifier());
    let bytes = encode(noise(120, 160, 11), ImageFormat::Jpeg);

    for enhance_quality in [false, true] {
        for refine_edges in [false, true] {
            for alpha_matting in [None, Some(Default::default())] {
                let options = RemovalOptions {
                    model_hint: ModelHint::Auto,
                    enhance_quality,
                    refine_edges,
                    alpha_matting,
                };
                let output = remover.remove_background(bytes.clone(), options).await.unwrap();
                assert_eq!(&output.png[..4], b"\x89PNG");
                // Portrait with a face
                assert_eq!(output.model_used, "birefnet-portrait");
            }
        }
    }
}

#[tokio::test]
async fn test_cutout_is_transparent_outside_subject() {
    let remover = remover(ContentClassifier::disabled());
    let bytes = encode(noise(90, 90, 3), ImageFormat::Png);

    let output = remover
        .remove_background(
            bytes,
            RemovalOptions {
                model_hint: ModelHint::Model("u2net"),
                enhance_quality: false,
                refine_edges: true,
                alpha_matting: None,
            },
        )
        .await
        .unwrap();

    let rgba = image::load_from_memory(&output.png).unwrap().to_rgba8();
    assert_eq!(rgba.get_pixel(0, 0)[3], 0);
    assert_eq!(rgba.get_pixel(45, 45)[3], 255);
}
