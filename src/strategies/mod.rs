//! Matte strategies and the factory that builds them
//!
//! Every strategy turns a decoded image into an RGBA image whose alpha
//! channel is the matte. The two threshold strategies are implemented here;
//! external segmentation is a thin adapter over an injected
//! [`SegmentationService`].

pub mod external;
pub mod morphology;
pub mod pixel;

#[cfg(test)]
pub mod test_utils;

pub use external::{CommandSegmenter, ExternalSegmentationStrategy, SegmentationService};
pub use morphology::MorphologicalThresholdStrategy;
pub use pixel::PixelThresholdStrategy;

use crate::{
    config::{MatteConfig, StrategyDescriptor, StrategyKind},
    error::{MatteError, Result},
};
use image::{DynamicImage, RgbaImage};
use std::sync::Arc;

/// A matte algorithm
pub trait MatteStrategy: Send + Sync {
    /// Metadata naming the algorithm and how its source file is chosen
    fn descriptor(&self) -> &StrategyDescriptor;

    /// Produce an RGBA image of the same size whose alpha is the matte
    ///
    /// # Errors
    /// - `StrategyFailed` when the algorithm cannot produce a matte
    fn apply(&self, image: &DynamicImage) -> Result<RgbaImage>;
}

/// Factory trait for creating matte strategies
pub trait StrategyFactory: Send + Sync {
    /// Create a strategy instance for `descriptor`
    ///
    /// # Errors
    ///
    /// Returns `MatteError::InvalidConfig` for:
    /// - Strategy kinds this factory cannot build
    /// - Invalid backup tags or matte parameters
    fn create_strategy(
        &self,
        descriptor: &StrategyDescriptor,
        config: &MatteConfig,
    ) -> Result<Box<dyn MatteStrategy>>;

    /// List strategy kinds this factory can build
    fn available_strategies(&self) -> Vec<StrategyKind>;
}

/// Default strategy factory
///
/// Builds both threshold strategies. External segmentation is only available
/// once a service has been injected with [`DefaultStrategyFactory::with_segmenter`].
#[derive(Default)]
pub struct DefaultStrategyFactory {
    segmenter: Option<Arc<dyn SegmentationService>>,
}

impl DefaultStrategyFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject the service backing [`StrategyKind::ExternalSegmentation`]
    #[must_use]
    pub fn with_segmenter(mut self, segmenter: Arc<dyn SegmentationService>) -> Self {
        self.segmenter = Some(segmenter);
        self
    }
}

impl std::fmt::Debug for DefaultStrategyFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DefaultStrategyFactory")
            .field(
                "segmenter",
                &self.segmenter.as_ref().map(|s| s.name().to_string()),
            )
            .finish()
    }
}

impl StrategyFactory for DefaultStrategyFactory {
    fn create_strategy(
        &self,
        descriptor: &StrategyDescriptor,
        config: &MatteConfig,
    ) -> Result<Box<dyn MatteStrategy>> {
        descriptor.validate()?;
        config.validate()?;

        match descriptor.kind {
            StrategyKind::PixelThreshold => Ok(Box::new(PixelThresholdStrategy::new(
                descriptor.clone(),
                config.threshold,
            ))),
            StrategyKind::MorphologicalThreshold => Ok(Box::new(
                MorphologicalThresholdStrategy::new(descriptor.clone(), config.clone()),
            )),
            StrategyKind::ExternalSegmentation => match &self.segmenter {
                Some(segmenter) => Ok(Box::new(ExternalSegmentationStrategy::new(
                    descriptor.clone(),
                    Arc::clone(segmenter),
                ))),
                None => Err(MatteError::invalid_config(
                    "External segmentation not available: no segmentation service configured. Must be injected by frontend.",
                )),
            },
        }
    }

    fn available_strategies(&self) -> Vec<StrategyKind> {
        let mut kinds = vec![
            StrategyKind::PixelThreshold,
            StrategyKind::MorphologicalThreshold,
        ];
        if self.segmenter.is_some() {
            kinds.push(StrategyKind::ExternalSegmentation);
        }
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_utils::MockSegmenter;

    #[test]
    fn test_default_factory_available_strategies() {
        let factory = DefaultStrategyFactory::new();
        assert_eq!(
            factory.available_strategies(),
            vec![
                StrategyKind::PixelThreshold,
                StrategyKind::MorphologicalThreshold
            ]
        );

        let factory = DefaultStrategyFactory::new().with_segmenter(Arc::new(MockSegmenter::new()));
        assert_eq!(factory.available_strategies(), StrategyKind::ALL.to_vec());
    }

    #[test]
    fn test_create_local_strategies() {
        let factory = DefaultStrategyFactory::new();
        let config = MatteConfig::default();

        for kind in [
            StrategyKind::PixelThreshold,
            StrategyKind::MorphologicalThreshold,
        ] {
            let descriptor = StrategyDescriptor::new(kind);
            let strategy = factory.create_strategy(&descriptor, &config).unwrap();
            assert_eq!(strategy.descriptor(), &descriptor);
        }
    }

    #[test]
    fn test_external_requires_injected_service() {
        let descriptor = StrategyDescriptor::new(StrategyKind::ExternalSegmentation);
        let config = MatteConfig::default();

        let err = DefaultStrategyFactory::new()
            .create_strategy(&descriptor, &config)
            .err()
            .unwrap();
        assert!(matches!(err, MatteError::InvalidConfig(_)));
        assert!(err.to_string().contains("Must be injected"));

        let factory = DefaultStrategyFactory::new().with_segmenter(Arc::new(MockSegmenter::new()));
        assert!(factory.create_strategy(&descriptor, &config).is_ok());
    }

    #[test]
    fn test_factory_rejects_invalid_parameters() {
        let factory = DefaultStrategyFactory::new();
        let descriptor = StrategyDescriptor::new(StrategyKind::MorphologicalThreshold);
        let bad_config = MatteConfig {
            kernel_size: 2,
            ..MatteConfig::default()
        };
        assert!(factory.create_strategy(&descriptor, &bad_config).is_err());

        let bad_tag = descriptor.with_backup_tag("a/b");
        assert!(factory
            .create_strategy(&bad_tag, &MatteConfig::default())
            .is_err());
    }

    #[test]
    fn test_factory_debug_formatting() {
        let factory = DefaultStrategyFactory::new().with_segmenter(Arc::new(MockSegmenter::new()));
        let debug_str = format!("{:?}", factory);
        assert!(debug_str.contains("DefaultStrategyFactory"));
        assert!(debug_str.contains("mock"));
    }
}
