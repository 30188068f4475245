use std::{collections::HashMap, sync::Arc, time::Instant};

use image::DynamicImage;
use mask::GeometryExtractor;

use crate::{
    error::DispatchError,
    implementations::{ExampleAlgorithm, OtsuThreshold, Stardist, StardistBackend},
    output::AlgoOutput,
    params::ParameterMap,
    registry::{AlgoKind, AlgoRegistry},
    traits::Algorithm,
};

/// Resolves an algorithm to its implementation, runs it and derives
/// features from any returned mask.
pub struct Dispatcher {
    registry: Arc<AlgoRegistry>,
    implementations: HashMap<AlgoKind, Arc<dyn Algorithm>>,
    extractor: GeometryExtractor,
}

impl Dispatcher {
    /// Create a new dispatcher builder
    pub fn builder(registry: Arc<AlgoRegistry>) -> DispatcherBuilder {
        DispatcherBuilder::new(registry)
    }

    pub fn registry(&self) -> &AlgoRegistry {
        &self.registry
    }

    /// Run `algorithm` once, without retries.
    ///
    /// When the result carries a mask but no features, features are extracted
    /// from the mask; features an implementation supplies itself are kept as is.
    pub fn run(
        &self,
        algorithm: AlgoKind,
        pixels: &DynamicImage,
        params: &ParameterMap,
    ) -> Result<AlgoOutput, DispatchError> {
        let implementation = self
            .implementations
            .get(&algorithm)
            .ok_or(DispatchError::NotImplemented(algorithm))?;

        let started = Instant::now();
        let mut output = implementation.invoke(pixels, params).map_err(|source| {
            tracing::error!(%algorithm, error = %source, "algorithm failed");
            DispatchError::ExecutionFailure { algorithm, source }
        })?;

        if let Some(descriptor) = self.registry.describe_kind(algorithm) {
            for key in output.keys() {
                if !descriptor.declares(key) {
                    tracing::warn!(%algorithm, %key, "algorithm returned an undeclared output");
                }
            }
        }

        if output.features.is_none() {
            if let Some(mask) = output.mask.as_ref() {
                let features = self.extractor.extract(mask).map_err(|source| {
                    tracing::error!(%algorithm, error = %source, "feature extraction failed");
                    DispatchError::ExecutionFailure { algorithm, source: source.into() }
                })?;
                output.features = Some(features);
            }
        }

        tracing::info!(
            %algorithm,
            elapsed_ms = started.elapsed().as_millis() as u64,
            outputs = ?output.keys(),
            "algorithm finished"
        );
        Ok(output)
    }
}

/// Builder binding algorithm kinds to implementations
pub struct DispatcherBuilder {
    registry: Arc<AlgoRegistry>,
    implementations: HashMap<AlgoKind, Arc<dyn Algorithm>>,
}

impl DispatcherBuilder {
    pub fn new(registry: Arc<AlgoRegistry>) -> Self {
        Self {
            registry,
            implementations: HashMap::new(),
        }
    }

    /// Bind an implementation (replaces any existing one for `kind`)
    pub fn register<A>(mut self, kind: AlgoKind, algorithm: A) -> Self
    where
        A: Algorithm + 'static,
    {
        self.implementations.insert(kind, Arc::new(algorithm));
        self
    }

    /// Bind the implementations shipped with this crate
    pub fn with_builtin(self, stardist: Option<StardistBackend>) -> Self {
        self.register(AlgoKind::Example, ExampleAlgorithm)
            .register(AlgoKind::Stardist, Stardist::new(stardist))
            .register(AlgoKind::OtsuThreshold, OtsuThreshold)
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher {
            registry: self.registry,
            implementations: self.implementations,
            extractor: GeometryExtractor::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AlgorithmError;
    use image::{GrayImage, Luma};
    use mask::{LabelMask, PolygonFeature};

    fn stub<F>(f: F) -> F
    where
        F: Fn(&DynamicImage, &ParameterMap) -> crate::error::Result<AlgoOutput> + Send + Sync,
    {
        f
    }

    fn registry() -> Arc<AlgoRegistry> {
        Arc::new(AlgoRegistry::builtin().expect("registry"))
    }

    fn two_label_mask() -> LabelMask {
        let mut mask = LabelMask::new(12, 12);
        for y in 1..4 {
            for x in 1..4 {
                mask.put_pixel(x, y, Luma([1]));
                mask.put_pixel(x + 6, y + 6, Luma([2]));
            }
        }
        mask
    }

    fn pixels() -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(12, 12))
    }

    #[test]
    fn test_mask_result_gains_features() {
        let dispatcher = Dispatcher::builder(registry())
            .register(AlgoKind::OtsuThreshold, stub(|_, _| {
                Ok(AlgoOutput::default().with_mask(two_label_mask()))
            }))
            .build();

        let output = dispatcher
            .run(AlgoKind::OtsuThreshold, &pixels(), &ParameterMap::new())
            .expect("run");
        assert_eq!(output.mask, Some(two_label_mask()));
        let features = output.features.expect("features");
        let labels: Vec<u32> = features.iter().map(PolygonFeature::label).collect();
        assert_eq!(labels, vec![1, 2]);
    }

    #[test]
    fn test_supplied_features_not_overwritten() {
        let dispatcher = Dispatcher::builder(registry())
            .register(AlgoKind::Stardist, stub(|_, _| {
                let mut feature = PolygonFeature::new(1, vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [0.0, 0.0]]);
                feature.properties.detection_probability = Some(0.93);
                Ok(AlgoOutput::default()
                    .with_mask(two_label_mask())
                    .with_features(vec![feature]))
            }))
            .build();

        let output = dispatcher
            .run(AlgoKind::Stardist, &pixels(), &ParameterMap::new())
            .expect("run");
        let features = output.features.expect("features");
        assert_eq!(features.len(), 1);
        assert_eq!(features[0].properties.detection_probability, Some(0.93));
    }

    #[test]
    fn test_image_only_result_has_no_features() {
        let dispatcher = Dispatcher::builder(registry())
            .register(AlgoKind::Example, stub(|pixels, _| {
                Ok(AlgoOutput::default().with_image(pixels.clone()))
            }))
            .build();

        let output = dispatcher
            .run(AlgoKind::Example, &pixels(), &ParameterMap::new())
            .expect("run");
        assert!(output.features.is_none());
        assert!(output.image.is_some());
    }

    #[test]
    fn test_failure_carries_cause() {
        let dispatcher = Dispatcher::builder(registry())
            .register(AlgoKind::Example, stub(|_, _| {
                Err(AlgorithmError::UnsupportedInput("wrong dimensionality".into()))
            }))
            .build();

        match dispatcher.run(AlgoKind::Example, &pixels(), &ParameterMap::new()) {
            Err(DispatchError::ExecutionFailure { algorithm, source }) => {
                assert_eq!(algorithm, AlgoKind::Example);
                assert!(source.to_string().contains("wrong dimensionality"));
            }
            other => panic!("expected execution failure, got {other:?}"),
        }
    }

    #[test]
    fn test_unbound_algorithm() {
        let dispatcher = Dispatcher::builder(registry()).build();
        assert!(matches!(
            dispatcher.run(AlgoKind::Stardist, &pixels(), &ParameterMap::new()),
            Err(DispatchError::NotImplemented(AlgoKind::Stardist))
        ));
    }

    #[test]
    fn test_builtin_otsu_end_to_end() {
        let mut gray = GrayImage::from_pixel(20, 20, Luma([10u8]));
        for y in 5..12 {
            for x in 5..12 {
                gray.put_pixel(x, y, Luma([240]));
            }
        }

        let dispatcher = Dispatcher::builder(registry()).with_builtin(None).build();
        let output = dispatcher
            .run(AlgoKind::OtsuThreshold, &DynamicImage::ImageLuma8(gray), &ParameterMap::new())
            .expect("run");

        let features = output.features.expect("features");
        assert_eq!(features.len(), 1);
        assert!((features[0].area() - 48.5).abs() < 1e-9);
    }
}
