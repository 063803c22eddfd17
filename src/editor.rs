use crate::annotate::model::PixelBuffer;
use crate::annotate::surface::AnnotationSurface;
use crate::error::{Result, RetouchError};
use crate::service::{EditRequest, EditService};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_APPLY_TIMEOUT_SECS: u64 = 60;

/// One AI-edited output in the caller-visible version list. Distinct from
/// the surface's undo history: history tracks mark-drawing within one
/// version, this list tracks outputs across apply operations.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageVersion {
    pub label: String,
    pub image: PixelBuffer,
    pub created_at: i64,
}

/// Ties the annotation surface to the remote edit service: validates,
/// captures mask and source, awaits the edit under a bounded wait, then
/// installs the result as the new base image and a new version.
pub struct RegionEditor {
    surface: AnnotationSurface,
    versions: Vec<ImageVersion>,
    service: Arc<dyn EditService>,
    timeout: Duration,
}

impl RegionEditor {
    pub fn new(service: Arc<dyn EditService>) -> Self {
        Self::with_timeout(service, Duration::from_secs(DEFAULT_APPLY_TIMEOUT_SECS))
    }

    pub fn with_timeout(service: Arc<dyn EditService>, timeout: Duration) -> Self {
        Self {
            surface: AnnotationSurface::new(),
            versions: Vec::new(),
            service,
            timeout,
        }
    }

    pub fn surface(&self) -> &AnnotationSurface {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut AnnotationSurface {
        &mut self.surface
    }

    pub fn versions(&self) -> &[ImageVersion] {
        &self.versions
    }

    pub fn current_image(&self) -> Option<&PixelBuffer> {
        self.surface.base_image()
    }

    /// Installs a base image and seeds the version list with it.
    pub fn load_image(&mut self, image: PixelBuffer) {
        self.surface.load_image(image.clone());
        self.versions = vec![version("Original", image)];
    }

    /// Edits the marked region per the instruction. Validation failures are
    /// reported before any network call with no state mutated; on success
    /// the result replaces the base image (resetting mark history) and is
    /// appended to the version list. Any failure leaves annotation state
    /// untouched.
    pub async fn apply(&mut self, instruction: &str) -> Result<()> {
        let instruction = instruction.trim();
        if instruction.is_empty() {
            return Err(RetouchError::Validation(
                "instruction must not be empty".into(),
            ));
        }
        let source = self
            .surface
            .source()
            .ok_or_else(|| RetouchError::Validation("no image loaded".into()))?;
        let mask = self
            .surface
            .mask()
            .ok_or_else(|| RetouchError::Validation("mark a region before applying".into()))?;

        let request = EditRequest::inpaint(source.encode_png()?, mask.encode_png()?, instruction);
        let edited = self.request(request).await?;
        self.install(edited);
        Ok(())
    }

    /// Whole-image cleanup: no mask, no instruction.
    pub async fn clean(&mut self) -> Result<()> {
        let source = self
            .surface
            .source()
            .ok_or_else(|| RetouchError::Validation("no image loaded".into()))?;

        let request = EditRequest::clean(source.encode_png()?);
        let edited = self.request(request).await?;
        self.install(edited);
        Ok(())
    }

    async fn request(&self, request: EditRequest) -> Result<PixelBuffer> {
        match tokio::time::timeout(self.timeout, self.service.edit(request)).await {
            Ok(outcome) => outcome,
            // Dropping the future cancels the outstanding call.
            Err(_) => Err(RetouchError::Timeout),
        }
    }

    fn install(&mut self, edited: PixelBuffer) {
        let label = format!("Edit {}", self.versions.len());
        tracing::info!(label = %label, "edit applied");
        self.surface.load_image(edited.clone());
        self.versions.push(version(&label, edited));
    }
}

fn version(label: &str, image: PixelBuffer) -> ImageVersion {
    ImageVersion {
        label: label.to_string(),
        image,
        created_at: chrono::Utc::now().timestamp(),
    }
}
