use crate::accumulator::PreviewImage;
use crate::event::{CleanBatch, Event};
use crate::mask::PixelMask;

/// Value written into preview pixels that the mask rejects.
pub const BLANKED: u8 = 0;

/// Cleaned output of one batch.
#[derive(Clone, Debug, PartialEq)]
pub struct FilteredBatch {
    pub preview: Option<PreviewImage>,
    pub events: CleanBatch,
}

/// Keep the events whose pixel is valid in `mask`, in their original order.
pub fn filter_events(batch: &[Event], mask: &PixelMask) -> CleanBatch {
    batch.iter().filter(|ev| mask.passes(ev)).collect()
}

/// Blank every preview pixel that `mask` rejects. Valid pixels are left as-is.
pub fn blank_preview(image: &mut PreviewImage, mask: &PixelMask) {
    assert_eq!(
        image.resolution(),
        mask.resolution(),
        "preview must match the mask resolution"
    );
    for (px, &valid) in image.as_mut_slice().iter_mut().zip(mask.as_slice()) {
        if !valid {
            *px = BLANKED;
        }
    }
}

/// Apply the combined mask to a batch and its preview.
///
/// Returns `None` when no event survives; the preview is dropped with it.
pub fn apply(
    batch: &[Event],
    mask: &PixelMask,
    mut preview: Option<PreviewImage>,
) -> Option<FilteredBatch> {
    if let Some(image) = preview.as_mut() {
        blank_preview(image, mask);
    }
    let events = filter_events(batch, mask);
    if events.is_empty() {
        return None;
    }
    Some(FilteredBatch { preview, events })
}
