use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Named state in the curation pipeline.
///
/// The declaration order follows the pipeline; [`WorkflowStep::rank`] is the
/// separate total order used to pick a canonical issue when two share a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WorkflowStep {
    #[default]
    Nil,
    UnfixableMetadataError,
    SftpUpload,
    ScanUpload,
    AwaitingProcessing,
    AwaitingPageReview,
    ReadyForMetadataEntry,
    AwaitingMetadataReview,
    ReadyForMetsXml,
    ReadyForBatching,
    ReadyForRebatching,
    AwaitingProdRemoval,
    InProduction,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown workflow step {0:?}")]
pub struct UnknownStep(pub String);

impl WorkflowStep {
    pub const ALL: [WorkflowStep; 13] = [
        WorkflowStep::Nil,
        WorkflowStep::UnfixableMetadataError,
        WorkflowStep::SftpUpload,
        WorkflowStep::ScanUpload,
        WorkflowStep::AwaitingProcessing,
        WorkflowStep::AwaitingPageReview,
        WorkflowStep::ReadyForMetadataEntry,
        WorkflowStep::AwaitingMetadataReview,
        WorkflowStep::ReadyForMetsXml,
        WorkflowStep::ReadyForBatching,
        WorkflowStep::ReadyForRebatching,
        WorkflowStep::AwaitingProdRemoval,
        WorkflowStep::InProduction,
    ];

    /// Certainty of an issue's metadata. Lower ranks lose duplicate conflicts.
    ///
    /// `AwaitingProcessing` sits above batching so an issue whose move job is
    /// still running never gets flagged against its own upload folder.
    pub fn rank(self) -> u32 {
        match self {
            WorkflowStep::Nil => 0,
            WorkflowStep::UnfixableMetadataError => 10,
            WorkflowStep::SftpUpload | WorkflowStep::ScanUpload => 20,
            WorkflowStep::AwaitingPageReview => 30,
            WorkflowStep::ReadyForMetadataEntry => 40,
            WorkflowStep::AwaitingMetadataReview => 50,
            WorkflowStep::ReadyForMetsXml
            | WorkflowStep::ReadyForBatching
            | WorkflowStep::ReadyForRebatching => 60,
            WorkflowStep::AwaitingProdRemoval => 70,
            WorkflowStep::AwaitingProcessing => 100,
            WorkflowStep::InProduction => u32::MAX,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WorkflowStep::Nil => "Nil",
            WorkflowStep::UnfixableMetadataError => "UnfixableMetadataError",
            WorkflowStep::SftpUpload => "SftpUpload",
            WorkflowStep::ScanUpload => "ScanUpload",
            WorkflowStep::AwaitingProcessing => "AwaitingProcessing",
            WorkflowStep::AwaitingPageReview => "AwaitingPageReview",
            WorkflowStep::ReadyForMetadataEntry => "ReadyForMetadataEntry",
            WorkflowStep::AwaitingMetadataReview => "AwaitingMetadataReview",
            WorkflowStep::ReadyForMetsXml => "ReadyForMetsXml",
            WorkflowStep::ReadyForBatching => "ReadyForBatching",
            WorkflowStep::ReadyForRebatching => "ReadyForRebatching",
            WorkflowStep::AwaitingProdRemoval => "AwaitingProdRemoval",
            WorkflowStep::InProduction => "InProduction",
        }
    }

    /// Steps for issues still sitting in an upload tree.
    pub fn is_upload(self) -> bool {
        matches!(self, WorkflowStep::SftpUpload | WorkflowStep::ScanUpload)
    }

    /// Steps stored in the workflow database that have not gone live yet.
    pub fn is_in_process(self) -> bool {
        !matches!(
            self,
            WorkflowStep::Nil
                | WorkflowStep::SftpUpload
                | WorkflowStep::ScanUpload
                | WorkflowStep::InProduction
        )
    }
}

impl fmt::Display for WorkflowStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WorkflowStep {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WorkflowStep::ALL
            .iter()
            .copied()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| UnknownStep(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::WorkflowStep;

    #[test]
    fn string_form_round_trips_for_every_step() {
        for step in WorkflowStep::ALL {
            assert_eq!(step.as_str().parse::<WorkflowStep>(), Ok(step));
        }
        assert!("ReadyForLunch".parse::<WorkflowStep>().is_err());
    }

    #[test]
    fn production_outranks_everything() {
        for step in WorkflowStep::ALL {
            if step != WorkflowStep::InProduction {
                assert!(step.rank() < WorkflowStep::InProduction.rank(), "{step}");
            }
        }
    }
}
