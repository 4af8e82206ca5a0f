//! Generation lifecycle for one studio session.

use crate::credentials::{ensure_key_selected, CredentialHost, NoCredentialHost};
use crate::error::{GenStudioError, Result};
use crate::image::{DataUrl, GeneratedMedia, GenerationSettings, ImageProvider, SettingsForm};
use crate::session::history::History;
use crate::session::ticker::{StatusTicker, TickerStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::watch;
use uuid::Uuid;

/// Where the controller is in the generation lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No generation outstanding.
    Idle,
    /// A generation request is in flight.
    Submitting,
}

/// Result of a call to [`StudioController::submit`].
#[derive(Debug)]
pub enum SubmitOutcome {
    /// The prompt was blank; nothing happened.
    Skipped,
    /// A new image was added to history and displayed.
    Succeeded(Uuid),
    /// The generation failed; the user-visible message is set.
    Failed(GenStudioError),
}

/// Holds the controller in [`Phase::Submitting`] until dropped, including
/// when a `submit` future is dropped mid-request.
struct SubmittingGuard<'a>(&'a AtomicBool);

impl<'a> SubmittingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self(flag)
    }
}

impl Drop for SubmittingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl SubmitOutcome {
    /// Returns true for [`SubmitOutcome::Succeeded`].
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }
}

/// Owns all session state and drives submissions.
///
/// `submit` borrows the controller mutably for its whole duration, so at most
/// one generation can be outstanding and the form cannot change under it.
pub struct StudioController<P, C = NoCredentialHost> {
    provider: P,
    credentials: C,
    form: SettingsForm,
    history: History,
    error: Option<&'static str>,
    submitting: AtomicBool,
    ticker: StatusTicker,
}

impl<P: ImageProvider> StudioController<P> {
    /// Creates a controller for a host without credential selection.
    pub fn new(provider: P) -> Self {
        Self::with_credentials(provider, NoCredentialHost)
    }
}

impl<P: ImageProvider, C: CredentialHost> StudioController<P, C> {
    /// Creates a controller with a host credential capability.
    pub fn with_credentials(provider: P, credentials: C) -> Self {
        Self::with_ticker(provider, credentials, StatusTicker::new())
    }

    /// Creates a controller with a custom status ticker.
    pub fn with_ticker(provider: P, credentials: C, ticker: StatusTicker) -> Self {
        Self {
            provider,
            credentials,
            form: SettingsForm::default(),
            history: History::new(),
            error: None,
            submitting: AtomicBool::new(false),
            ticker,
        }
    }

    /// Current form state.
    pub fn form(&self) -> &SettingsForm {
        &self.form
    }

    /// Mutable access to the form.
    pub fn form_mut(&mut self) -> &mut SettingsForm {
        &mut self.form
    }

    /// Session history.
    pub fn history(&self) -> &History {
        &self.history
    }

    /// The image currently shown, if any.
    pub fn current(&self) -> Option<&GeneratedMedia> {
        self.history.displayed()
    }

    /// User-visible message from the last failed submission.
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> Phase {
        if self.submitting.load(Ordering::Acquire) {
            Phase::Submitting
        } else {
            Phase::Idle
        }
    }

    /// Current progress label while submitting.
    pub fn status(&self) -> Option<TickerStatus> {
        self.ticker.current()
    }

    /// Observes progress labels from another task while `submit` runs.
    pub fn status_updates(&self) -> watch::Receiver<Option<TickerStatus>> {
        self.ticker.subscribe()
    }

    /// Whether the submit action is enabled.
    pub fn can_submit(&self) -> bool {
        self.phase() == Phase::Idle && self.form.has_prompt()
    }

    /// Displays a history entry by id.
    pub fn select(&mut self, id: Uuid) -> bool {
        self.history.select(id)
    }

    /// Displays a history entry by 1-based position.
    pub fn select_position(&mut self, position: usize) -> Option<&GeneratedMedia> {
        self.history.select_position(position)
    }

    /// Submits the current form.
    ///
    /// A blank prompt is a no-op. Otherwise the previous error is cleared,
    /// the ticker runs until the provider answers, and the result either
    /// lands at the front of history or sets the error message.
    pub async fn submit(&mut self) -> SubmitOutcome {
        if !self.can_submit() {
            return SubmitOutcome::Skipped;
        }

        let settings = self.form.to_settings();
        self.error = None;

        let result = {
            let _phase = SubmittingGuard::enter(&self.submitting);
            let _ticker = self.ticker.start();
            self.generate(&settings).await
        };

        match result {
            Ok(url) => {
                let id = self.history.push(GeneratedMedia::new(url, &settings));
                tracing::info!(%id, model = %settings.model, "image generated");
                SubmitOutcome::Succeeded(id)
            }
            Err(err) => {
                tracing::warn!(model = %settings.model, "generation failed: {err}");
                self.error = Some(err.user_message());
                if err.requires_key_selection() {
                    self.credentials.open_key_selection().await;
                }
                SubmitOutcome::Failed(err)
            }
        }
    }

    async fn generate(&self, settings: &GenerationSettings) -> Result<DataUrl> {
        settings.validate()?;
        if settings.model.is_high_quality() {
            ensure_key_selected(&self.credentials).await;
        }
        self.provider.generate(settings).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{API_KEY_MESSAGE, GENERIC_FAILURE_MESSAGE};
    use crate::image::{ImageModel, ImageSize};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Provider that replays canned outcomes and records what it was asked.
    #[derive(Default)]
    struct ScriptedProvider {
        failures: Mutex<Vec<GenStudioError>>,
        seen: Mutex<Vec<GenerationSettings>>,
    }

    impl ScriptedProvider {
        fn failing(err: GenStudioError) -> Self {
            Self {
                failures: Mutex::new(vec![err]),
                ..Default::default()
            }
        }

        fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        async fn generate(&self, settings: &GenerationSettings) -> Result<DataUrl> {
            self.seen.lock().unwrap().push(settings.clone());
            match self.failures.lock().unwrap().pop() {
                Some(err) => Err(err),
                None => Ok(DataUrl::from_base64_png("iVBORw0KGgo=")),
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }

        async fn health_check(&self, _model: ImageModel) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        has_key: AtomicBool,
        opened: AtomicUsize,
    }

    #[async_trait]
    impl CredentialHost for RecordingHost {
        async fn has_selected_key(&self) -> bool {
            self.has_key.load(Ordering::SeqCst)
        }

        async fn open_key_selection(&self) {
            self.opened.fetch_add(1, Ordering::SeqCst);
            self.has_key.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_blank_prompt_is_noop() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut controller = StudioController::new(provider.clone());
        controller.form_mut().prompt = "   ".into();

        assert!(!controller.can_submit());
        assert!(matches!(controller.submit().await, SubmitOutcome::Skipped));
        assert_eq!(provider.calls(), 0);
        assert!(controller.history().is_empty());
        assert_eq!(controller.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_success_prepends_and_displays() {
        let mut controller = StudioController::new(ScriptedProvider::default());
        controller.form_mut().prompt = "first".into();
        controller.submit().await;
        controller.form_mut().prompt = "second".into();

        let outcome = controller.submit().await;
        let SubmitOutcome::Succeeded(id) = outcome else {
            panic!("expected success, got {outcome:?}");
        };

        assert_eq!(controller.history().len(), 2);
        assert_eq!(controller.history().iter().next().unwrap().id, id);
        assert_eq!(controller.current().unwrap().prompt, "second");
        assert_eq!(controller.error(), None);
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.status(), None);
    }

    #[tokio::test]
    async fn test_failure_leaves_history_unchanged() {
        let mut controller =
            StudioController::new(ScriptedProvider::failing(GenStudioError::NoResult));
        controller.form_mut().prompt = "a red cube".into();

        let outcome = controller.submit().await;
        assert!(matches!(outcome, SubmitOutcome::Failed(GenStudioError::NoResult)));
        assert!(controller.history().is_empty());
        assert_eq!(controller.error(), Some(GENERIC_FAILURE_MESSAGE));
        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.status(), None);
    }

    #[tokio::test]
    async fn test_next_submission_clears_error() {
        let mut controller =
            StudioController::new(ScriptedProvider::failing(GenStudioError::MissingImageData));
        controller.form_mut().prompt = "cat".into();

        controller.submit().await;
        assert!(controller.error().is_some());

        assert!(controller.submit().await.is_success());
        assert_eq!(controller.error(), None);
    }

    #[tokio::test]
    async fn test_fast_model_never_sends_size() {
        let provider = Arc::new(ScriptedProvider::default());
        let mut controller = StudioController::new(provider.clone());
        let form = controller.form_mut();
        form.prompt = "cat".into();
        form.image_size = ImageSize::FourK;

        controller.submit().await;
        assert_eq!(provider.seen.lock().unwrap()[0].image_size, None);

        controller.form_mut().model = ImageModel::Pro;
        controller.submit().await;
        assert_eq!(
            provider.seen.lock().unwrap()[1].image_size,
            Some(ImageSize::FourK)
        );
    }

    #[tokio::test]
    async fn test_pro_model_runs_preflight() {
        let host = Arc::new(RecordingHost::default());
        let mut controller =
            StudioController::with_credentials(ScriptedProvider::default(), host.clone());
        controller.form_mut().prompt = "cat".into();

        controller.submit().await;
        assert_eq!(host.opened.load(Ordering::SeqCst), 0);

        controller.form_mut().model = ImageModel::Pro;
        controller.submit().await;
        assert_eq!(host.opened.load(Ordering::SeqCst), 1);

        controller.submit().await;
        assert_eq!(host.opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_key_error_requests_reselection() {
        let host = Arc::new(RecordingHost::default());
        host.has_key.store(true, Ordering::SeqCst);
        let provider =
            ScriptedProvider::failing(GenStudioError::from_transport("Requested entity was not found."));
        let mut controller = StudioController::with_credentials(provider, host.clone());
        controller.form_mut().prompt = "cat".into();

        let outcome = controller.submit().await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Failed(GenStudioError::ApiKeyInvalid(_))
        ));
        assert_eq!(controller.error(), Some(API_KEY_MESSAGE));
        assert_eq!(host.opened.load(Ordering::SeqCst), 1);
        assert!(controller.history().is_empty());
    }

    #[tokio::test]
    async fn test_select_changes_displayed_only() {
        let mut controller = StudioController::new(ScriptedProvider::default());
        controller.form_mut().prompt = "first".into();
        let SubmitOutcome::Succeeded(first) = controller.submit().await else {
            panic!("expected success");
        };
        controller.form_mut().prompt = "second".into();
        controller.submit().await;

        assert!(controller.select(first));
        assert_eq!(controller.current().unwrap().prompt, "first");
        assert_eq!(controller.history().iter().next().unwrap().prompt, "second");
    }

    struct StalledProvider;

    #[async_trait]
    impl ImageProvider for StalledProvider {
        async fn generate(&self, _settings: &GenerationSettings) -> Result<DataUrl> {
            std::future::pending().await
        }

        fn name(&self) -> &str {
            "stalled"
        }

        async fn health_check(&self, _model: ImageModel) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_submit_returns_to_idle() {
        let mut controller = StudioController::new(StalledProvider);
        controller.form_mut().prompt = "cat".into();

        let abandoned =
            tokio::time::timeout(std::time::Duration::from_secs(10), controller.submit()).await;
        assert!(abandoned.is_err());

        assert_eq!(controller.phase(), Phase::Idle);
        assert_eq!(controller.status(), None);
        assert!(controller.can_submit());
        assert!(controller.history().is_empty());
    }
}
