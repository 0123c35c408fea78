use crate::decoder::{FrameBundle, RawFrame, StreamKind};
use crate::shared::constants::INFRARED_SLOTS;
use crate::utils::logger;

/// Per-iteration frame slots. Rebuilt from scratch for every bundle.
#[derive(Debug, Default)]
pub struct FrameSlots {
    pub color: Option<RawFrame>,
    pub depth: Option<RawFrame>,
    pub infrared: [Option<RawFrame>; INFRARED_SLOTS],
}

impl FrameSlots {
    pub fn is_empty(&self) -> bool {
        self.color.is_none() && self.depth.is_none() && self.infrared.iter().all(Option::is_none)
    }
}

/// Stream index 0 and 1 share slot 0, index 2 goes to slot 1.
pub fn infrared_slot(stream_index: u32) -> usize {
    if stream_index == 0 {
        0
    } else {
        (stream_index - 1) as usize
    }
}

/// Sorts the frames of a bundle into their slots. Streams missing from the
/// bundle simply leave their slot empty.
pub fn extract(bundle: FrameBundle) -> FrameSlots {
    let mut slots = FrameSlots::default();

    for frame in bundle.frames {
        match frame.stream.kind {
            StreamKind::Color => slots.color = Some(frame),
            StreamKind::Depth => slots.depth = Some(frame),
            StreamKind::Infrared => {
                let slot = infrared_slot(frame.stream.index);
                if slot < INFRARED_SLOTS {
                    slots.infrared[slot] = Some(frame);
                } else {
                    logger::warn(&format!(
                        "dropping frame {} of {}: no infrared slot for stream index {}",
                        frame.frame_number,
                        frame.stream.stream_name(),
                        frame.stream.index
                    ));
                }
            }
        }
    }

    slots
}
