use crate::auth::Authenticator;
use crate::config::Config;
use pdftool::{
    BlobStore, DocumentEngine, MistralOcr, OcrService, QpdfEngine, S3BlobStore, TransformInvoker,
    WorkArea,
};
use std::sync::Arc;
use thiserror::Error;

/// Failure to assemble the service from its configuration
#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to prepare work directory: {0}")]
    WorkDir(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] pdftool::StoreError),

    #[error(transparent)]
    Ocr(#[from] pdftool::OcrError),
}

/// Shared, read-only state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub invoker: TransformInvoker,
    pub work_area: Arc<WorkArea>,
    pub auth: Arc<Authenticator>,
    pub store: Option<Arc<dyn BlobStore>>,
    pub ocr: Option<Arc<dyn OcrService>>,
}

impl AppState {
    /// State with the given engine and no object store or OCR
    pub fn new(config: Config, engine: Arc<dyn DocumentEngine>) -> Result<Self, StateError> {
        let work_area = WorkArea::new(config.work_dir())?;
        let auth = Authenticator::new(
            config.api_key.clone(),
            config
                .account()
                .map(|(user, pass)| (user.to_string(), pass.to_string())),
            config.session_ttl,
        )
        .with_secure_cookies(config.session_secure);

        Ok(Self {
            config: Arc::new(config),
            invoker: TransformInvoker::new(engine),
            work_area: Arc::new(work_area),
            auth: Arc::new(auth),
            store: None,
            ocr: None,
        })
    }

    /// Production wiring: `qpdf`, plus S3 and Mistral OCR when configured
    pub fn from_config(config: Config) -> Result<Self, StateError> {
        let engine = Arc::new(QpdfEngine::with_program(config.qpdf_bin.clone()));
        let s3 = config.s3_settings();
        let ocr = match &config.mistral_key {
            Some(key) if !key.is_empty() => Some(MistralOcr::new(
                config.ocr_url.clone(),
                key.clone(),
                config.ocr_model.clone(),
                config.ocr_timeout,
            )?),
            _ => None,
        };

        let mut state = Self::new(config, engine)?;
        if let Some(settings) = s3 {
            state = state.with_store(Arc::new(S3BlobStore::connect(&settings)?));
        }
        if let Some(ocr) = ocr {
            state = state.with_ocr(Arc::new(ocr));
        }
        Ok(state)
    }

    pub fn with_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrService>) -> Self {
        self.ocr = Some(ocr);
        self
    }

    /// OCR needs both somewhere to put the upload and someone to read it
    pub fn ocr_enabled(&self) -> bool {
        self.store.is_some() && self.ocr.is_some()
    }
}
