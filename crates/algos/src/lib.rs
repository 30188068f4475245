//! # Analysis Algorithms
//!
//! Static catalogue of the image analysis algorithms the server exposes,
//! their parameter descriptors, and the dispatcher that runs them.
//!
//! - [`AlgoRegistry`] holds one [`AlgoDescriptor`] per [`AlgoKind`], checked
//!   for consistency when built
//! - [`ParameterValidator`] answers whether a parameter map covers an
//!   algorithm's required parameters (presence only)
//! - [`Dispatcher`] binds kinds to [`Algorithm`] implementations and turns a
//!   returned label mask into polygon features
//!
//! ```rust
//! use std::sync::Arc;
//! use algos::{AlgoKind, AlgoRegistry, Dispatcher, ParameterMap};
//! use image::{DynamicImage, GrayImage};
//!
//! let registry = Arc::new(AlgoRegistry::builtin()?);
//! assert_eq!(registry.names(), vec!["example", "stardist", "otsu_threshold"]);
//!
//! let dispatcher = Dispatcher::builder(registry).with_builtin(None).build();
//! let pixels = DynamicImage::ImageLuma8(GrayImage::new(48, 48));
//! let output = dispatcher
//!     .run(AlgoKind::Example, &pixels, &ParameterMap::new())
//!     .expect("example run");
//! assert_eq!(output.features.map(|f| f.len()), Some(3));
//! # Ok::<(), algos::RegistryError>(())
//! ```

pub mod dispatcher;
pub mod error;
pub mod implementations;
pub mod output;
pub mod params;
pub mod registry;
pub mod traits;

pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::{AlgorithmError, DispatchError, RegistryError, Result};
pub use implementations::{ExampleAlgorithm, OtsuThreshold, Stardist, StardistBackend};
pub use output::{AlgoOutput, ResultKey, ResultValue};
pub use params::{ParamValue, ParameterMap, ParameterSpec, ParameterType, ParameterValidator};
pub use registry::{AlgoDescriptor, AlgoKind, AlgoRegistry, InputDataFormat};
pub use traits::Algorithm;
