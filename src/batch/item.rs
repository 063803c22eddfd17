use crate::annotate::model::PixelBuffer;
use serde::{Deserialize, Serialize};

/// One extracted slide as the extractor hands it over: a stable id, its
/// position in the deck and the rasterized page as PNG bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlidePage {
    pub id: String,
    pub page_number: u32,
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Error,
}

/// One unit of batch processing. Owned by the scheduler; callers observe it
/// through `items()` snapshots and the event stream.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub id: String,
    pub page_number: u32,
    pub source: Vec<u8>,
    pub status: WorkStatus,
    pub result: Option<PixelBuffer>,
    pub error: Option<String>,
}

impl WorkItem {
    pub fn from_page(page: SlidePage) -> Self {
        Self {
            id: page.id,
            page_number: page.page_number,
            source: page.image,
            status: WorkStatus::Pending,
            result: None,
            error: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub done: usize,
    pub total: usize,
}

/// One-way notifications from the scheduler. `generation` identifies the
/// work-list session the event belongs to.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Status {
        generation: u64,
        index: usize,
        id: String,
        status: WorkStatus,
        result: Option<PixelBuffer>,
        error: Option<String>,
    },
    Progress {
        generation: u64,
        progress: Option<Progress>,
    },
}
