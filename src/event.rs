use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::{
    converter::{OverwriteReport, ProjectionReport},
    error::BibnoteError,
};

/// Which way a conversion runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Bibliography changed: add missing sections to the document
    BibToDoc,
    /// Document changed: write notes back into entry comments
    DocToBib,
}

impl Display for Direction {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Direction::BibToDoc => write!(f, "bib -> doc"),
            Direction::DocToBib => write!(f, "doc -> bib"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncReport {
    Projection(ProjectionReport),
    Overwrite(OverwriteReport),
}

impl SyncReport {
    pub fn direction(&self) -> Direction {
        match self {
            SyncReport::Projection(_) => Direction::BibToDoc,
            SyncReport::Overwrite(_) => Direction::DocToBib,
        }
    }
}

/// Sync pairs are identified by their document path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// The document was missing and has been written from its template
    DocumentGenerated(PathBuf),
    PairEnabled(PathBuf),
    PairDisabled(PathBuf),
    Synced {
        pair: PathBuf,
        report: SyncReport,
    },
    SyncFailed {
        pair: PathBuf,
        direction: Direction,
        error: BibnoteError,
    },
}

impl Display for Event {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            Event::DocumentGenerated(path) => write!(f, "DocumentGenerated({path:?})"),
            Event::PairEnabled(path) => write!(f, "PairEnabled({path:?})"),
            Event::PairDisabled(path) => write!(f, "PairDisabled({path:?})"),
            Event::Synced { pair, report } => {
                write!(f, "Synced({pair:?}, {})", report.direction())
            }
            Event::SyncFailed {
                pair, direction, ..
            } => write!(f, "SyncFailed({pair:?}, {direction})"),
        }
    }
}
