mod batch;
mod captions;
mod library;

pub use batch::{BatchController, BatchEvent, BatchJob, BatchOutcome, BatchReport, StopHandle};
pub use captions::{load_captions, save_caption, CaptionSink, SidecarWriter};
pub use library::{list_directory, scan_images, DirEntryInfo};
