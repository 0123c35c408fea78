use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bag::BagPlayback;
use crate::core::extractor::{self, FrameSlots};
use crate::core::options::ConversionOptions;
use crate::core::source::CaptureSource;
use crate::core::writer::ImageWriter;
use crate::decoder::{self, CanonicalImage, RawFrame};
use crate::renderer::{HeadlessPreview, PreviewSink, WindowPreview};
use crate::shared::constants;
use crate::utils::{file_utils, logger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Running,
    Draining,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Playback looped back to the start.
    EndOfRecording,
    /// The source had nothing more to deliver.
    EndOfStream,
    UserQuit,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::EndOfRecording => "end of recording",
            StopReason::EndOfStream => "end of stream",
            StopReason::UserQuit => "quit by user",
        };
        write!(f, "{}", text)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub bundles: u64,
    /// Images written, keyed by stream name.
    pub frames: BTreeMap<String, u64>,
    pub stop_reason: StopReason,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} bundles, stopped on {}", self.bundles, self.stop_reason)?;
        for (name, count) in &self.frames {
            write!(f, "\n  {}: {} images", name, count)?;
        }
        Ok(())
    }
}

/// True when the position dropped, read as a signed difference so a counter
/// wrapping past `u64::MAX` still counts as moving forward.
pub fn position_went_backward(previous: u64, current: u64) -> bool {
    (current.wrapping_sub(previous) as i64) < 0
}

/// Decoded images of one bundle, next to the frames they came from.
struct DecodedSlots<'a> {
    color: Option<(&'a RawFrame, CanonicalImage)>,
    depth: Option<(&'a RawFrame, CanonicalImage)>,
    infrared: [Option<(&'a RawFrame, CanonicalImage)>; constants::INFRARED_SLOTS],
}

impl<'a> DecodedSlots<'a> {
    fn decode(slots: &'a FrameSlots) -> Result<Self> {
        Ok(Self {
            color: decode_slot(&slots.color)?,
            depth: decode_slot(&slots.depth)?,
            infrared: [decode_slot(&slots.infrared[0])?, decode_slot(&slots.infrared[1])?],
        })
    }
}

fn decode_slot(slot: &Option<RawFrame>) -> Result<Option<(&RawFrame, CanonicalImage)>> {
    slot.as_ref()
        .map(|frame| -> Result<_> { Ok((frame, decoder::decode(frame)?)) })
        .transpose()
}

/// Drives one conversion: pull, extract, decode, preview, write, until the
/// recording ends or the user quits.
pub struct Session<S: CaptureSource, P: PreviewSink> {
    source: S,
    preview: P,
    writer: ImageWriter,
    state: SessionState,
    bundles: u64,
    frames: BTreeMap<String, u64>,
}

impl<S: CaptureSource, P: PreviewSink> Session<S, P> {
    pub fn new(source: S, preview: P, writer: ImageWriter) -> Self {
        Self {
            source,
            preview,
            writer,
            state: SessionState::Initializing,
            bundles: 0,
            frames: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs to completion. Windows are closed and the source stopped even
    /// when processing fails; the processing error wins over a cleanup error.
    pub fn run(&mut self) -> Result<SessionSummary> {
        let result = self.start().and_then(|_| self.pump());

        self.state = SessionState::Draining;
        let closed = self.preview.close();
        self.source.stop();
        self.state = SessionState::Terminated;

        let stop_reason = result?;
        closed?;
        Ok(SessionSummary {
            bundles: self.bundles,
            frames: self.frames.clone(),
            stop_reason,
        })
    }

    fn start(&mut self) -> Result<()> {
        let enabled = self.source.streams().to_vec();
        self.source.start(&enabled)?;
        self.state = SessionState::Running;
        Ok(())
    }

    fn pump(&mut self) -> Result<StopReason> {
        let mut last_position = self.source.position();
        loop {
            let Some(bundle) = self.source.next_bundle()? else {
                return Ok(StopReason::EndOfStream);
            };
            self.bundles += 1;
            self.process(extractor::extract(bundle))?;

            if self.preview.poll_quit()? {
                return Ok(StopReason::UserQuit);
            }

            let position = self.source.position();
            if position_went_backward(last_position, position) {
                return Ok(StopReason::EndOfRecording);
            }
            last_position = position;
        }
    }

    fn process(&mut self, slots: FrameSlots) -> Result<()> {
        if slots.is_empty() {
            logger::debug(&format!("bundle at {} had nothing to write", self.source.position()));
            return Ok(());
        }

        // decode every slot before anything is written, so a bad frame
        // leaves no partial bundle on disk
        let decoded = DecodedSlots::decode(&slots)?;

        if let Some((frame, image)) = &decoded.color {
            self.preview.show(&frame.stream.stream_name(), image)?;
        }
        if let Some((frame, image)) = &decoded.depth {
            if self.preview.is_visible() {
                // raw depth is too dark to look at
                let visual = decoder::rescale_depth(image)?;
                self.preview.show(&frame.stream.stream_name(), &visual)?;
            }
        }
        for (frame, image) in decoded.infrared.iter().flatten() {
            self.preview.show(&frame.stream.stream_name(), image)?;
        }

        if let Some((frame, image)) = &decoded.color {
            self.writer.write_color(image, frame.frame_number)?;
            self.count(frame);
        }
        if let Some((frame, image)) = &decoded.depth {
            self.writer.write_depth(image, frame.frame_number)?;
            self.count(frame);
        }
        for (frame, image) in decoded.infrared.iter().flatten() {
            self.writer
                .write_infrared(image, frame.stream.index, frame.frame_number)?;
            self.count(frame);
        }
        Ok(())
    }

    fn count(&mut self, frame: &RawFrame) {
        *self.frames.entry(frame.stream.stream_name()).or_insert(0) += 1;
    }
}

/// Opens the recording, prepares the output tree and runs a session over it.
pub fn run_conversion(options: &ConversionOptions) -> Result<SessionSummary> {
    println!("{} {}", constants::APP_NAME, constants::APP_VERSION);
    logger::info(&format!(
        "converting {} (scaling={} quality={} display={})",
        options.bag_path.display(),
        options.scaling,
        options.jpeg_quality,
        options.display
    ));

    let playback = BagPlayback::open(&options.bag_path)?;
    let names: Vec<String> = playback.streams().iter().map(|s| s.stream_name()).collect();
    if names.is_empty() {
        anyhow::bail!("no color, depth or infrared stream in {}", options.bag_path.display());
    }
    for name in &names {
        println!("{}", name);
    }

    let root = options.output_root();
    file_utils::create_output_dirs(&root, &names)?;

    let quit = Arc::new(AtomicBool::new(false));
    let flag = quit.clone();
    ctrlc::set_handler(move || {
        flag.store(true, Ordering::SeqCst);
    })
    .context("failed to install Ctrl+C handler")?;

    let writer = ImageWriter::new(root, options.jpeg_quality, options.scaling);
    let summary = if options.display {
        Session::new(playback, WindowPreview::new(quit), writer).run()?
    } else {
        Session::new(playback, HeadlessPreview::new(quit), writer).run()?
    };

    logger::info(&format!("conversion finished: {}", summary));
    println!("{}", summary);
    Ok(summary)
}
