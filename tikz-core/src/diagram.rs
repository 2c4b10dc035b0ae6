use crate::render::RenderedImage;

/// Identifier the engine assigns to each queued pipeline job
pub type JobId = u64;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DiagramStatus {
    Pending,
    Rendered,
    Failed,
}

/// Where a version's source came from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Extracted from a model reply
    Generated,
    /// Applied by hand from the code editor
    Edited,
}

/// One diagram candidate. A new version replaces the current one; nothing
/// older than "current" is kept.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagramVersion {
    pub job: JobId,
    pub origin: Origin,
    pub tikz_source: String,
    pub rendered_image: Option<RenderedImage>,
    pub status: DiagramStatus,
}

impl DiagramVersion {
    pub fn pending(job: JobId, origin: Origin, tikz_source: impl Into<String>) -> Self {
        Self {
            job,
            origin,
            tikz_source: tikz_source.into(),
            rendered_image: None,
            status: DiagramStatus::Pending,
        }
    }

    pub fn mark_rendered(&mut self, image: RenderedImage) {
        self.rendered_image = Some(image);
        self.status = DiagramStatus::Rendered;
    }

    pub fn mark_failed(&mut self) {
        self.rendered_image = None;
        self.status = DiagramStatus::Failed;
    }
}
