// THEORY:
// The `pipeline` module is the top-level API of the engine. `CensusPipeline`
// owns every stage plus the two pieces of run-long state (the background model
// inside the preprocessor and the census counter), and pushes one frame at a
// time through them:
//
//   frame -> preprocess -> morphology -> contours -> classify -> count
//
// Data only ever flows downstream and no stage reads another stage's state.
// `process_frame` is the synchronous single-frame entry point; `run` drives a
// whole `FrameSource` into a `RenderSink`, polling a `StopHandle` once per
// frame so that a user can cancel cooperatively between frames.
//
// A run ends in one of three ways: the source is exhausted, a stop was
// requested, or an error escaped a stage (which is returned to the caller).

use crate::config::PipelineConfig;
use crate::core_modules::blob::Detection;
use crate::core_modules::census::{Counter, CounterTable, CountingPolicy};
use crate::core_modules::classifier::ClassifierProfile;
use crate::core_modules::contour_extractor::ContourExtractor;
use crate::core_modules::frame::{Frame, FrameSource, StageImages};
use crate::core_modules::morphology::MorphologyPlan;
use crate::core_modules::preprocess::Preprocessor;
use crate::core_modules::render::{Annotation, RenderRequest, RenderSink};
use crate::error::{CensusError, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A cloneable flag used to ask a running pipeline to stop after the current frame.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    requested: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// The outcome of processing a single frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    pub frame_index: u64,
    /// One entry per contour that survived the area filter, in extraction order.
    pub detections: Vec<Detection>,
    /// Counter snapshot taken after this frame.
    pub counts: CounterTable,
    pub stages: Option<StageImages>,
}

impl FrameReport {
    pub fn newly_counted(&self) -> impl Iterator<Item = &Detection> {
        self.detections.iter().filter(|d| d.newly_counted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    StreamExhausted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub counts: CounterTable,
    pub outcome: RunOutcome,
}

pub struct CensusPipeline {
    preprocessor: Preprocessor,
    morphology: MorphologyPlan,
    extractor: ContourExtractor,
    classifier: ClassifierProfile,
    counter: Counter,
    capture_stages: bool,
    frames_processed: u64,
}

impl CensusPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            preprocessor: Preprocessor::new(&config.preprocessing)?,
            morphology: MorphologyPlan::new(&config.morphology)?,
            extractor: ContourExtractor::new(&config.contours)?,
            classifier: config.classifier,
            counter: Counter::new(config.counting),
            capture_stages: config.capture_stages,
            frames_processed: 0,
        })
    }

    pub fn counting_policy(&self) -> CountingPolicy {
        self.counter.policy()
    }

    pub fn counts(&self) -> &CounterTable {
        self.counter.table()
    }

    /// Runs one frame through every stage and updates the counter.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameReport> {
        if frame.width() == 0 || frame.height() == 0 {
            return Err(CensusError::EmptyFrame);
        }

        let mut stages = self.capture_stages.then(StageImages::default);

        // --- 1. Mask ---
        let mask = self.preprocessor.apply(frame, stages.as_mut())?;
        let cleaned = self.morphology.apply(&mask);
        if let Some(stages) = stages.as_mut() {
            stages.push("cleaned", cleaned.clone());
        }

        // --- 2. Contours ---
        let contours = self.extractor.extract(&cleaned);

        // --- 3. Classify and count ---
        self.counter.begin_frame();
        let detections: Vec<Detection> = contours
            .iter()
            .map(|contour| {
                let category = self.classifier.classify(&contour.shape());
                let newly_counted = self.counter.record(contour.bounding_box, category);
                Detection {
                    category,
                    bounding_box: contour.bounding_box,
                    area: contour.area,
                    newly_counted,
                }
            })
            .collect();

        let frame_index = self.frames_processed;
        self.frames_processed += 1;

        log::debug!(
            "frame {}: {} contours, {} newly counted",
            frame_index,
            detections.len(),
            detections.iter().filter(|d| d.newly_counted).count()
        );

        Ok(FrameReport {
            frame_index,
            detections,
            counts: *self.counter.table(),
            stages,
        })
    }

    /// Boxes to draw for `report`: only detections that were counted on this frame.
    pub fn annotations(&self, report: &FrameReport) -> Vec<Annotation> {
        report
            .newly_counted()
            .map(|detection| Annotation {
                category: detection.category,
                label: self.classifier.display_name(detection.category),
                bounding_box: detection.bounding_box,
            })
            .collect()
    }

    /// One "Label: count" line per label of the active classifier profile.
    pub fn summary_lines(&self, counts: &CounterTable) -> Vec<String> {
        self.classifier
            .labels()
            .iter()
            .map(|category| format!("{}: {}", self.classifier.display_name(*category), counts.get(*category)))
            .collect()
    }

    /// Drives `source` to completion (or until `stop` is requested), rendering every frame.
    pub fn run<S, K>(&mut self, source: &mut S, sink: &mut K, stop: &StopHandle) -> Result<RunSummary>
    where
        S: FrameSource + ?Sized,
        K: RenderSink + ?Sized,
    {
        log::info!(
            "starting census on {} ({} preprocessing, {:?} counting)",
            source.describe(),
            self.preprocessor.strategy_name(),
            self.counter.policy()
        );

        let start = self.frames_processed;
        let outcome = loop {
            if stop.is_stop_requested() {
                log::info!("stop requested, ending run");
                break RunOutcome::Cancelled;
            }

            let Some(frame) = source.next_frame()? else {
                break RunOutcome::StreamExhausted;
            };

            let report = self.process_frame(&frame)?;
            let annotations = self.annotations(&report);
            let summary = self.summary_lines(&report.counts);
            sink.render(&RenderRequest {
                frame_index: report.frame_index,
                frame: &frame,
                annotations: &annotations,
                counts: &report.counts,
                summary: &summary,
                stages: report.stages.as_ref(),
            })?;
        };

        let summary = RunSummary {
            frames_processed: self.frames_processed - start,
            counts: *self.counter.table(),
            outcome,
        };
        log::info!(
            "census finished after {} frames ({:?}): {}",
            summary.frames_processed,
            summary.outcome,
            self.summary_lines(&summary.counts).join(", ")
        );
        Ok(summary)
    }
}
