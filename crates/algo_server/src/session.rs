//! The single mutable record of the server: loaded image, selected algorithm,
//! parameters and the last result.
//!
//! Every operation takes the session lock for its whole state transition.
//! [`Session::process`] releases it while the algorithm runs and re-takes it to
//! commit; a result whose selection epoch no longer matches is discarded.

use std::sync::Arc;

use algos::{
    AlgoKind, AlgoOutput, AlgoRegistry, Dispatcher, ParameterMap, ParameterValidator, ResultKey,
    ResultValue,
};
use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use schemars::JsonSchema;
use serde::Serialize;
use strum::Display;
use ts_rs::TS;

use crate::error::{Result, SessionError};

/// Lifecycle position, derived from what the session currently holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema, TS, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Empty,
    ImageLoaded,
    AlgoSelected,
    ParametersSet,
    Resulted,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, TS)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema, TS)]
#[ts(export)]
pub struct SessionStatus {
    pub state: SessionState,
    pub algorithm: Option<AlgoKind>,
    pub image: Option<ImageDimensions>,
    pub parameters: Option<ParameterMap>,
    pub results: Vec<ResultKey>,
}

#[derive(Default)]
struct SessionInner {
    image: Option<Arc<DynamicImage>>,
    algorithm: Option<AlgoKind>,
    parameters: Option<ParameterMap>,
    result: Option<AlgoOutput>,
    /// Bumped whenever the selection or parameters change, or on clear
    epoch: u64,
}

impl SessionInner {
    fn state(&self) -> SessionState {
        if self.result.is_some() {
            SessionState::Resulted
        } else if self.parameters.is_some() {
            SessionState::ParametersSet
        } else if self.algorithm.is_some() {
            SessionState::AlgoSelected
        } else if self.image.is_some() {
            SessionState::ImageLoaded
        } else {
            SessionState::Empty
        }
    }
}

pub struct Session {
    inner: Mutex<SessionInner>,
    dispatcher: Arc<Dispatcher>,
}

impl Session {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            inner: Mutex::new(SessionInner::default()),
            dispatcher,
        }
    }

    pub fn registry(&self) -> &AlgoRegistry {
        self.dispatcher.registry()
    }

    /// Store the pixels to analyse. Selection, parameters and result are kept.
    pub fn set_image(&self, pixels: DynamicImage) {
        let (width, height) = pixels.dimensions();
        self.inner.lock().image = Some(Arc::new(pixels));
        tracing::info!(width, height, "image loaded");
    }

    /// Select an algorithm, resetting parameters and any result
    pub fn select_algorithm(&self, name: &str) -> Result<AlgoKind> {
        let algorithm = self
            .registry()
            .resolve(name)
            .ok_or_else(|| SessionError::UnknownAlgorithm(name.to_string()))?;

        let mut inner = self.inner.lock();
        inner.algorithm = Some(algorithm);
        inner.parameters = None;
        inner.result = None;
        inner.epoch += 1;
        tracing::info!(%algorithm, "algorithm selected");
        Ok(algorithm)
    }

    /// Store `params` verbatim for the selected algorithm, clearing any result.
    ///
    /// Only the presence of the required names is checked.
    pub fn set_parameters(&self, params: ParameterMap) -> Result<()> {
        let mut inner = self.inner.lock();
        let algorithm = inner.algorithm.ok_or(SessionError::NoAlgorithmSelected)?;
        self.check_parameters(algorithm, Some(&params))?;

        tracing::debug!(%algorithm, ?params, "parameters set");
        inner.parameters = Some(params);
        inner.result = None;
        inner.epoch += 1;
        Ok(())
    }

    /// Run the selected algorithm on the loaded image and store its result.
    ///
    /// Returns the populated result keys. On failure the session keeps its
    /// previous state, previous result included. If the selection, parameters
    /// or session were changed while the algorithm ran, the result is dropped
    /// with [`SessionError::StaleResult`].
    pub async fn process(&self) -> Result<Vec<ResultKey>> {
        let (algorithm, image, params, epoch) = {
            let inner = self.inner.lock();
            let image = inner.image.clone().ok_or(SessionError::NoImageLoaded)?;
            let algorithm = inner.algorithm.ok_or(SessionError::NoAlgorithmSelected)?;
            self.check_parameters(algorithm, inner.parameters.as_ref())?;
            let params = inner.parameters.clone().unwrap_or_default();
            (algorithm, image, params, inner.epoch)
        };

        tracing::info!(%algorithm, epoch, "processing");
        let dispatcher = Arc::clone(&self.dispatcher);
        let output = tokio::task::spawn_blocking(move || dispatcher.run(algorithm, &image, &params))
            .await
            .map_err(|e| SessionError::TaskAborted(e.to_string()))?
            .map_err(|source| SessionError::AlgorithmExecutionFailure { algorithm, source })?;

        let mut inner = self.inner.lock();
        if inner.epoch != epoch {
            tracing::warn!(%algorithm, started = epoch, current = inner.epoch, "discarding stale result");
            return Err(SessionError::StaleResult { algorithm });
        }

        let keys = output.keys();
        inner.result = Some(output);
        tracing::info!(%algorithm, ?keys, "result stored");
        Ok(keys)
    }

    pub fn result(&self, key: ResultKey) -> Result<ResultValue> {
        self.inner
            .lock()
            .result
            .as_ref()
            .and_then(|output| output.get(key))
            .ok_or(SessionError::NoResultAvailable { key })
    }

    /// Back to the empty state. Always succeeds.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        let epoch = inner.epoch + 1;
        *inner = SessionInner {
            epoch,
            ..SessionInner::default()
        };
        tracing::info!("session cleared");
    }

    pub fn selected_algorithm(&self) -> Option<AlgoKind> {
        self.inner.lock().algorithm
    }

    pub fn parameters(&self) -> Option<ParameterMap> {
        self.inner.lock().parameters.clone()
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().state()
    }

    pub fn status(&self) -> SessionStatus {
        let inner = self.inner.lock();
        SessionStatus {
            state: inner.state(),
            algorithm: inner.algorithm,
            image: inner.image.as_ref().map(|image| ImageDimensions {
                width: image.width(),
                height: image.height(),
                channels: image.color().channel_count(),
            }),
            parameters: inner.parameters.clone(),
            results: inner.result.as_ref().map(AlgoOutput::keys).unwrap_or_default(),
        }
    }

    /// Algorithms without required parameters accept an absent map
    fn check_parameters(&self, algorithm: AlgoKind, params: Option<&ParameterMap>) -> Result<()> {
        let missing = self
            .registry()
            .describe_kind(algorithm)
            .map(|descriptor| ParameterValidator::missing(descriptor, params))
            .unwrap_or_default();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SessionError::InvalidParameters { algorithm, missing })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use algos::{AlgorithmError, ParamValue};
    use image::{GrayImage, Luma};
    use mask::LabelMask;
    use std::sync::Barrier;

    fn stub<F>(f: F) -> F
    where
        F: Fn(&DynamicImage, &ParameterMap) -> algos::Result<AlgoOutput> + Send + Sync,
    {
        f
    }

    fn label_mask() -> LabelMask {
        let mut mask = LabelMask::new(16, 16);
        for y in 2..5 {
            for x in 2..5 {
                mask.put_pixel(x, y, Luma([1]));
                mask.put_pixel(x + 8, y, Luma([4]));
                mask.put_pixel(x, y + 8, Luma([9]));
            }
        }
        mask
    }

    fn pixels(width: u32) -> DynamicImage {
        DynamicImage::ImageLuma8(GrayImage::new(width, 16))
    }

    fn registry() -> Arc<AlgoRegistry> {
        Arc::new(AlgoRegistry::builtin().expect("registry"))
    }

    /// Session whose parameterless algorithm returns a fixed mask, failing
    /// on images narrower than 2 pixels
    fn mask_session() -> Session {
        let dispatcher = Dispatcher::builder(registry())
            .with_builtin(None)
            .register(
                AlgoKind::OtsuThreshold,
                stub(|pixels, _| {
                    if pixels.width() < 2 {
                        return Err(AlgorithmError::UnsupportedInput("image too narrow".into()));
                    }
                    Ok(AlgoOutput::default().with_mask(label_mask()))
                }),
            )
            .build();
        Session::new(Arc::new(dispatcher))
    }

    fn builtin_session() -> Session {
        Session::new(Arc::new(Dispatcher::builder(registry()).with_builtin(None).build()))
    }

    /// Defaults plus a choice for every list parameter
    fn complete_params(session: &Session, name: &str, choice: &str) -> ParameterMap {
        let mut params = session.registry().defaults(name);
        for spec in session.registry().required_parameters(name) {
            params
                .entry(spec.name.clone())
                .or_insert_with(|| ParamValue::from(choice));
        }
        params
    }

    #[tokio::test]
    async fn test_round_trip_with_parameterless_algorithm() {
        let session = mask_session();
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        assert_eq!(session.state(), SessionState::AlgoSelected);

        let keys = session.process().await.unwrap();
        assert_eq!(keys, vec![ResultKey::Mask, ResultKey::Features]);
        assert_eq!(session.state(), SessionState::Resulted);

        assert_eq!(session.result(ResultKey::Mask).unwrap(), ResultValue::Mask(label_mask()));
        match session.result(ResultKey::Features).unwrap() {
            ResultValue::Features(features) => {
                let labels: Vec<u32> = features.iter().map(|f| f.label()).collect();
                assert_eq!(labels, vec![1, 4, 9]);
            }
            other => panic!("expected features, got {other:?}"),
        }
        assert!(matches!(
            session.result(ResultKey::Image),
            Err(SessionError::NoResultAvailable { key: ResultKey::Image })
        ));
    }

    #[tokio::test]
    async fn test_reselect_clears_result() {
        let session = mask_session();
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        session.process().await.unwrap();

        session.select_algorithm("otsu_threshold").unwrap();
        assert!(matches!(
            session.result(ResultKey::Mask),
            Err(SessionError::NoResultAvailable { .. })
        ));
        assert_eq!(session.state(), SessionState::AlgoSelected);
    }

    #[tokio::test]
    async fn test_set_parameters_clears_result() {
        let session = mask_session();
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        session.process().await.unwrap();

        session.set_parameters(ParameterMap::new()).unwrap();
        assert_eq!(session.state(), SessionState::ParametersSet);
        assert!(session.result(ResultKey::Mask).is_err());
    }

    #[tokio::test]
    async fn test_clear_from_any_state() {
        let session = mask_session();
        session.clear();
        assert_eq!(session.state(), SessionState::Empty);

        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        session.process().await.unwrap();

        session.clear();
        session.clear();
        assert_eq!(session.status().state, SessionState::Empty);
        assert_eq!(session.selected_algorithm(), None);
        assert!(matches!(session.process().await, Err(SessionError::NoImageLoaded)));
    }

    #[tokio::test]
    async fn test_process_precondition_order() {
        let session = builtin_session();
        // neither image nor selection: the image is reported first
        assert!(matches!(session.process().await, Err(SessionError::NoImageLoaded)));

        session.set_image(pixels(16));
        assert!(matches!(session.process().await, Err(SessionError::NoAlgorithmSelected)));

        session.select_algorithm("stardist").unwrap();
        match session.process().await {
            Err(SessionError::InvalidParameters { algorithm, missing }) => {
                assert_eq!(algorithm, AlgoKind::Stardist);
                assert_eq!(missing.len(), 6);
            }
            other => panic!("expected invalid parameters, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_algorithm_keeps_selection() {
        let session = builtin_session();
        session.select_algorithm("example").unwrap();
        session
            .set_parameters(complete_params(&session, "example", "Option A"))
            .unwrap();

        let error = session.select_algorithm("watershed").unwrap_err();
        assert!(matches!(error, SessionError::UnknownAlgorithm(ref name) if name == "watershed"));
        assert_eq!(session.selected_algorithm(), Some(AlgoKind::Example));
        assert_eq!(session.state(), SessionState::ParametersSet);
    }

    #[test]
    fn test_set_parameters_requires_selection() {
        let session = builtin_session();
        assert!(matches!(
            session.set_parameters(ParameterMap::new()),
            Err(SessionError::NoAlgorithmSelected)
        ));
    }

    #[test]
    fn test_parameter_presence_only() {
        let session = builtin_session();
        session.select_algorithm("example").unwrap();

        // list parameters have no default
        let mut params = session.registry().defaults("example");
        match session.set_parameters(params.clone()) {
            Err(SessionError::InvalidParameters { missing, .. }) => {
                assert_eq!(missing, vec!["choices".to_string()])
            }
            other => panic!("expected invalid parameters, got {other:?}"),
        }
        assert_eq!(session.parameters(), None);

        // falsy and wrongly typed values still count as present
        params.insert("choices".into(), ParamValue::Int(0));
        params.insert("boolean_value".into(), ParamValue::Bool(false));
        params.insert("string_value".into(), ParamValue::Text(String::new()));
        session.set_parameters(params.clone()).unwrap();
        assert_eq!(session.parameters(), Some(params));
    }

    #[tokio::test]
    async fn test_new_image_keeps_selection_and_result() {
        let session = mask_session();
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        session.process().await.unwrap();

        session.set_image(pixels(8));
        assert_eq!(session.state(), SessionState::Resulted);
        assert_eq!(session.status().image.map(|i| i.width), Some(8));
        session.process().await.unwrap();
    }

    #[tokio::test]
    async fn test_failure_leaves_previous_result() {
        let session = mask_session();
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        session.process().await.unwrap();

        session.set_image(pixels(1));
        match session.process().await {
            Err(error @ SessionError::AlgorithmExecutionFailure { .. }) => {
                assert_eq!(error.kind(), crate::error::ErrorKind::AlgorithmExecutionFailure);
                let cause = std::error::Error::source(&error).map(ToString::to_string);
                assert!(cause.is_some_and(|c| c.contains("image too narrow")));
            }
            other => panic!("expected execution failure, got {other:?}"),
        }

        assert_eq!(session.state(), SessionState::Resulted);
        assert_eq!(session.result(ResultKey::Mask).unwrap(), ResultValue::Mask(label_mask()));
    }

    #[tokio::test]
    async fn test_builtin_example_end_to_end() {
        let session = builtin_session();
        session.set_image(DynamicImage::ImageLuma8(GrayImage::from_pixel(48, 48, Luma([90]))));
        session.select_algorithm("example").unwrap();
        session
            .set_parameters(complete_params(&session, "example", "Option B"))
            .unwrap();

        let keys = session.process().await.unwrap();
        assert_eq!(keys, vec![ResultKey::Image, ResultKey::Features]);
        assert!(session.result(ResultKey::Mask).is_err());
        assert_eq!(session.status().results, keys);
    }

    #[tokio::test]
    async fn test_stardist_without_backend_fails() {
        let session = builtin_session();
        session.set_image(pixels(16));
        session.select_algorithm("stardist").unwrap();
        session
            .set_parameters(complete_params(&session, "stardist", "2D_versatile_fluo"))
            .unwrap();

        let error = session.process().await.unwrap_err();
        assert_eq!(error.kind(), crate::error::ErrorKind::AlgorithmExecutionFailure);
        assert_eq!(session.state(), SessionState::ParametersSet);
    }

    /// Session whose algorithm blocks between two barriers, so the caller can
    /// change the session while a `process()` is in flight
    fn gated_session() -> (Arc<Session>, Arc<Barrier>, Arc<Barrier>) {
        let entered = Arc::new(Barrier::new(2));
        let release = Arc::new(Barrier::new(2));

        let dispatcher = {
            let entered = Arc::clone(&entered);
            let release = Arc::clone(&release);
            Dispatcher::builder(registry())
                .register(
                    AlgoKind::OtsuThreshold,
                    stub(move |_, _| {
                        entered.wait();
                        release.wait();
                        Ok(AlgoOutput::default().with_mask(label_mask()))
                    }),
                )
                .build()
        };
        let session = Arc::new(Session::new(Arc::new(dispatcher)));
        session.set_image(pixels(16));
        session.select_algorithm("otsu_threshold").unwrap();
        (session, entered, release)
    }

    /// Start `process()`, run `change` once the algorithm is running, then
    /// let the algorithm finish and return its outcome
    async fn process_while(
        session: &Arc<Session>,
        entered: Arc<Barrier>,
        release: Arc<Barrier>,
        change: impl FnOnce(&Session),
    ) -> Result<Vec<ResultKey>> {
        let running = {
            let session = Arc::clone(session);
            tokio::spawn(async move { session.process().await })
        };

        tokio::task::spawn_blocking(move || entered.wait()).await.unwrap();
        change(session.as_ref());
        tokio::task::spawn_blocking(move || release.wait()).await.unwrap();

        running.await.unwrap()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_reselect_during_process_discards_result() {
        let (session, entered, release) = gated_session();

        let outcome = process_while(&session, entered, release, |session| {
            session.select_algorithm("otsu_threshold").unwrap();
        })
        .await;

        assert!(matches!(
            outcome,
            Err(SessionError::StaleResult { algorithm: AlgoKind::OtsuThreshold })
        ));
        assert!(session.result(ResultKey::Mask).is_err());
        assert_eq!(session.state(), SessionState::AlgoSelected);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_clear_during_process_discards_result() {
        let (session, entered, release) = gated_session();

        let outcome = process_while(&session, entered, release, Session::clear).await;

        assert!(matches!(outcome, Err(SessionError::StaleResult { .. })));
        assert_eq!(session.state(), SessionState::Empty);
        assert_eq!(session.selected_algorithm(), None);
        assert!(session.status().results.is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_set_parameters_during_process_discards_result() {
        let (session, entered, release) = gated_session();

        let outcome = process_while(&session, entered, release, |session| {
            session.set_parameters(ParameterMap::new()).unwrap();
        })
        .await;

        assert!(matches!(
            outcome,
            Err(SessionError::StaleResult { algorithm: AlgoKind::OtsuThreshold })
        ));
        assert_eq!(session.state(), SessionState::ParametersSet);
        assert!(session.result(ResultKey::Mask).is_err());
        assert_eq!(session.parameters(), Some(ParameterMap::new()));
    }
}
