//! Driving documents through a grid's training passes.

use crate::document::Document;
use crate::grid::Grid;
use crate::ranking::{CellRanker, RankingStrategy};
use crate::smoothing::GlobalStats;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Limits and reporting for a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOptions {
    /// Stop once this much wall-clock time has passed.
    pub max_time: Option<Duration>,
    /// Ingest at most this many documents per pass.
    pub max_docs: Option<usize>,
    /// Call the heartbeat every this many documents; 0 disables it.
    pub heartbeat_every: usize,
}

impl IngestOptions {
    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time = Some(max_time);
        self
    }

    pub fn with_max_docs(mut self, max_docs: usize) -> Self {
        self.max_docs = Some(max_docs);
        self
    }

    pub fn with_heartbeat_every(mut self, every: usize) -> Self {
        self.heartbeat_every = every;
        self
    }
}

/// Why a training run ended before seeing every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    TimeBudget,
    DocumentLimit,
}

/// Result of [`Trainer::train`]. Stopping early is not an error; the grid
/// is left holding whatever was ingested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    Completed {
        documents: usize,
    },
    StoppedEarly {
        documents: usize,
        pass: usize,
        reason: StopReason,
    },
}

impl IngestOutcome {
    pub fn is_complete(&self) -> bool {
        matches!(self, IngestOutcome::Completed { .. })
    }

    /// Documents handed to the grid, summed over passes.
    pub fn documents(&self) -> usize {
        match *self {
            IngestOutcome::Completed { documents } => documents,
            IngestOutcome::StoppedEarly { documents, .. } => documents,
        }
    }
}

/// Progress report passed to the heartbeat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub pass: usize,
    pub documents: usize,
    pub elapsed: Duration,
}

type Heartbeat = Box<dyn FnMut(&Progress)>;

/// Streams documents into a grid and the corpus-wide statistics, then
/// finalizes both.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use geotext::{build_grid, Config, Coord, Document, Lexicon, Trainer, WordCounts};
///
/// let mut lex = Lexicon::new();
/// let counts: WordCounts = [(lex.intern("bay"), 2)].into_iter().collect();
/// let docs = vec![Rc::new(Document::new("a", Some(Coord::new(37.8, -122.4)), counts))];
///
/// let mut trainer = Trainer::new(build_grid(&Config::default()).unwrap());
/// assert!(trainer.train(&docs).is_complete());
/// let model = trainer.finish();
/// assert_eq!(model.grid.num_nonempty_cells(), 1);
/// ```
pub struct Trainer {
    grid: Box<dyn Grid>,
    global: GlobalStats,
    options: IngestOptions,
    heartbeat: Option<Heartbeat>,
    trained: bool,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("grid", &self.grid)
            .field("options", &self.options)
            .field("trained", &self.trained)
            .finish_non_exhaustive()
    }
}

impl Trainer {
    pub fn new(grid: Box<dyn Grid>) -> Self {
        Self {
            grid,
            global: GlobalStats::new(),
            options: IngestOptions::default(),
            heartbeat: None,
            trained: false,
        }
    }

    pub fn with_options(mut self, options: IngestOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_heartbeat(mut self, heartbeat: impl FnMut(&Progress) + 'static) -> Self {
        self.heartbeat = Some(Box::new(heartbeat));
        self
    }

    /// Run every training pass the grid asks for.
    ///
    /// Training documents are noted in the global statistics once, during
    /// the first pass.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn train(&mut self, docs: &[Rc<Document>]) -> IngestOutcome {
        assert!(!self.trained, "Trainer::train called more than once");
        self.trained = true;

        let start = Instant::now();
        let mut documents = 0;
        let passes = self.grid.num_training_passes();

        for pass in 1..=passes {
            self.grid.begin_training_pass(pass);
            for (i, doc) in docs.iter().enumerate() {
                if let Some(reason) = self.should_stop(i, start) {
                    log::info!(
                        "Stopping early in pass {} after {} documents: {:?}",
                        pass,
                        documents,
                        reason
                    );
                    return IngestOutcome::StoppedEarly {
                        documents,
                        pass,
                        reason,
                    };
                }

                if pass == 1 && doc.is_training() {
                    self.global.note_counts(doc.counts());
                }
                self.grid.add_document_to_cell(doc);
                documents += 1;

                let every = self.options.heartbeat_every;
                if every > 0 && documents % every == 0 {
                    if let Some(heartbeat) = self.heartbeat.as_mut() {
                        heartbeat(&Progress {
                            pass,
                            documents,
                            elapsed: start.elapsed(),
                        });
                    }
                }
            }
        }

        log::info!(
            "Ingested {} documents over {} passes in {:.2?}",
            documents,
            passes,
            start.elapsed()
        );
        IngestOutcome::Completed { documents }
    }

    fn should_stop(&self, index_in_pass: usize, start: Instant) -> Option<StopReason> {
        if self
            .options
            .max_docs
            .is_some_and(|max| index_in_pass >= max)
        {
            return Some(StopReason::DocumentLimit);
        }
        if self
            .options
            .max_time
            .is_some_and(|max| start.elapsed() >= max)
        {
            return Some(StopReason::TimeBudget);
        }
        None
    }

    /// Finalize the global statistics, then the grid.
    pub fn finish(mut self) -> TrainedModel {
        self.global.finish_global_distribution();
        self.grid.initialize_cells(&self.global);
        TrainedModel {
            grid: self.grid,
            global: self.global,
        }
    }
}

/// A finalized grid with the statistics its models were smoothed against.
#[derive(Debug)]
pub struct TrainedModel {
    pub grid: Box<dyn Grid>,
    pub global: GlobalStats,
}

impl TrainedModel {
    pub fn ranker(&self, strategy: RankingStrategy) -> CellRanker<'_> {
        CellRanker::new(self.grid.as_ref(), &self.global, strategy)
    }
}
